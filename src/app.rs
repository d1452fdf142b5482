//! Wiring: turns configuration into a ready-to-serve [`AppState`].

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::auth::CredentialBroker;
use crate::commands::CommandRouter;
use crate::config::AppConfig;
use crate::github::Transport;
use crate::handlers::{InviteOnFirstMerge, Ping};
use crate::membership::{FileMembershipStore, InMemoryMembershipStore, MembershipStore};
use crate::server::AppState;
use crate::webhooks::{EventRouter, Restrictions};

/// Opens the configured membership store.
pub fn open_membership_store(config: &AppConfig) -> anyhow::Result<Arc<dyn MembershipStore>> {
    Ok(match &config.membership_store_path {
        Some(path) => {
            info!(path = %path.display(), "using file membership store");
            Arc::new(FileMembershipStore::open(path).context("opening membership store")?)
        }
        None => {
            info!("MEMBERSHIP_STORE_PATH not set; membership is not persisted");
            Arc::new(InMemoryMembershipStore::new())
        }
    })
}

/// Builds the broker, registers every handler, and returns the server state.
pub fn assemble(config: &AppConfig, transport: Arc<dyn Transport>) -> anyhow::Result<AppState> {
    let broker = Arc::new(CredentialBroker::from_config(config, transport)?);
    let mut router = EventRouter::with_consistency_delay(broker, config.consistency_delay);

    let store = open_membership_store(config)?;
    router.register(
        InviteOnFirstMerge::new(store),
        "pull_request",
        Restrictions::none().with("action", "closed"),
    )?;

    let mut commands = CommandRouter::new(&config.bot_mention);
    commands.register("ping", Ping);
    commands.install(&mut router)?;

    Ok(AppState::new(router, config.webhook_secret.as_bytes()))
}
