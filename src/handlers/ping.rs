//! `@bot ping` → `pong`.

use anyhow::Context;
use async_trait::async_trait;
use serde_json::json;

use crate::commands::{CommandHandler, ParsedCommand};
use crate::github::GitHubClient;
use crate::webhooks::{WebhookEvent, reply_url};

/// Replies `pong` wherever the command was written.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ping;

#[async_trait]
impl CommandHandler for Ping {
    async fn handle(
        &self,
        _command: &ParsedCommand,
        event: &WebhookEvent,
        client: &GitHubClient,
    ) -> anyhow::Result<()> {
        let url = reply_url(&event.event_type, &event.payload)
            .with_context(|| format!("no reply target for {} events", event.event_type))?;
        client.post(&url, &json!({"body": "pong"})).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::{TimeDelta, Utc};
    use http::Method;

    use crate::commands::CommandRouter;
    use crate::github::HttpResponse;
    use crate::test_utils::{MockReply, MockTransport, test_broker, token_response};
    use crate::webhooks::EventRouter;

    #[tokio::test]
    async fn ping_replies_pong_on_issue() {
        let transport = MockTransport::new(|req, _| {
            MockReply::now(if req.url.ends_with("/access_tokens") {
                token_response("tok", Utc::now() + TimeDelta::hours(1))
            } else {
                HttpResponse::json(201, &json!({"id": 1}))
            })
        });
        let mut router = EventRouter::with_consistency_delay(
            test_broker(std::sync::Arc::clone(&transport)),
            Duration::ZERO,
        );
        let mut commands = CommandRouter::new("snekomatic");
        commands.register("ping", Ping);
        commands.install(&mut router).unwrap();

        let comments_url = "https://api.github.test/repos/o/r/issues/4/comments";
        let event = WebhookEvent::new(
            "issue_comment",
            json!({
                "action": "created",
                "installation": {"id": 8},
                "issue": {"comments_url": comments_url},
                "comment": {"body": "@snekomatic ping"}
            }),
        );
        router.dispatch(&event).await.unwrap();

        let replies: Vec<_> = transport
            .requests()
            .into_iter()
            .filter(|r| r.url == comments_url)
            .collect();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].method, Method::POST);
        let body: serde_json::Value = serde_json::from_slice(&replies[0].body).unwrap();
        assert_eq!(body, json!({"body": "pong"}));
    }
}
