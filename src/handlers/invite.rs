//! Invite first-time contributors into the organization.
//!
//! GitHub has no "merged" event; a merge arrives as `pull_request` with
//! `action: closed` and `pull_request.merged: true`. The first time a user's
//! PR is merged, they are invited to the org and welcomed with a comment.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::github::GitHubClient;
use crate::membership::{MembershipStore, StoreError};
use crate::webhooks::{EventHandler, WebhookEvent, lookup, lookup_str};

/// The comment posted on the merged PR after an invitation is sent.
pub fn welcome_message(username: &str, org: &str) -> String {
    format!(
        "Hey @{username}, it looks like that was the first time we merged one of your PRs! \
         Thanks so much! :tada:\n\n\
         If you want to keep contributing, we'd love to have you, so I just sent you an \
         invitation to join the {org} organization. If you accept:\n\n\
         * GitHub will subscribe you to notifications on the org's repositories \
         (you can unsubscribe if you don't want them).\n\n\
         * You'll be able to help triage issues and review and merge pull requests.\n\n\
         * You'll get a member badge next to your name here.\n\n\
         You're also free to decline or ignore the invitation. You can keep contributing \
         as much or as little as you like, and I won't ask again. If you change your mind \
         later, just let us know.\n\n\
         If you have any questions, please post a comment here and someone will help you out!"
    )
}

/// What an org membership lookup found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberState {
    /// `active` or `pending`, as reported by GitHub.
    Existing(String),
    /// No membership and no outstanding invitation.
    None,
}

/// Looks up `username`'s membership in `org`; a 404 means none.
pub async fn member_state(
    client: &GitHubClient,
    org: &str,
    username: &str,
) -> anyhow::Result<MemberState> {
    match client.get(&format!("/orgs/{org}/memberships/{username}")).await {
        Ok(membership) => Ok(MemberState::Existing(
            lookup_str(&membership, "state").unwrap_or("unknown").to_string(),
        )),
        Err(e) if e.is_not_found() => Ok(MemberState::None),
        Err(e) => Err(e).context("looking up org membership"),
    }
}

/// Sends an org invitation the first time someone's PR is merged.
pub struct InviteOnFirstMerge {
    store: Arc<dyn MembershipStore>,
}

impl InviteOnFirstMerge {
    pub fn new(store: Arc<dyn MembershipStore>) -> Self {
        Self { store }
    }

    /// Runs a store operation on the blocking pool; file stores fsync.
    async fn with_store<T, F>(&self, op: F) -> anyhow::Result<T>
    where
        F: FnOnce(&dyn MembershipStore) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        let result = tokio::task::spawn_blocking(move || op(store.as_ref()))
            .await
            .context("membership store task failed")?;
        Ok(result?)
    }

    async fn recorded(&self, user: &str) -> anyhow::Result<bool> {
        let user = user.to_string();
        self.with_store(move |store| store.contains(&user)).await
    }

    async fn record(&self, user: &str) -> anyhow::Result<()> {
        let user = user.to_string();
        self.with_store(move |store| store.add(&user)).await
    }
}

#[async_trait]
impl EventHandler for InviteOnFirstMerge {
    async fn handle(&self, event: &WebhookEvent, client: &GitHubClient) -> anyhow::Result<()> {
        let payload = &event.payload;
        if lookup(payload, "pull_request.merged").and_then(|v| v.as_bool()) != Some(true) {
            info!("pull request closed without merging; nothing to do");
            return Ok(());
        }
        let creator = lookup_str(payload, "pull_request.user.login")
            .context("payload has no pull_request.user.login")?;
        let org = lookup_str(payload, "organization.login")
            .context("payload has no organization.login")?;
        info!(%creator, %org, "pull request merged");

        if self.recorded(creator).await? {
            info!(%creator, "already invited or a member");
            return Ok(());
        }

        if let MemberState::Existing(state) = member_state(client, org, creator).await? {
            self.record(creator).await?;
            info!(%creator, %state, "already has a membership; not inviting");
            return Ok(());
        }

        let comments_url = lookup_str(payload, "pull_request.comments_url")
            .context("payload has no pull_request.comments_url")?;

        info!(%creator, %org, "sending invitation");
        client
            .put(
                &format!("/orgs/{org}/memberships/{creator}"),
                &json!({"role": "member"}),
            )
            .await
            .context("sending org invitation")?;
        self.record(creator).await?;

        client
            .post(comments_url, &json!({"body": welcome_message(creator, org)}))
            .await
            .context("posting welcome comment")?;
        Ok(())
    }

    fn name(&self) -> &str {
        "invite-on-first-merge"
    }
}
