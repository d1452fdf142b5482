//! Per-command fan-out on top of the event router.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::parser::parse_commands;
use super::types::ParsedCommand;
use crate::github::GitHubClient;
use crate::webhooks::{EventHandler, EventRouter, Restrictions, RouterError, WebhookEvent, lookup_str};

/// Event types that carry commands, with the action that creates them and
/// the payload field holding the text.
pub const COMMAND_SOURCES: [(&str, &str, &str); 4] = [
    ("issues", "opened", "issue.body"),
    ("pull_request", "opened", "pull_request.body"),
    ("issue_comment", "created", "comment.body"),
    ("pull_request_review_comment", "created", "comment.body"),
];

/// Handles one named command.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(
        &self,
        command: &ParsedCommand,
        event: &WebhookEvent,
        client: &GitHubClient,
    ) -> anyhow::Result<()>;
}

/// Routes mention-prefixed commands to handlers by command name.
pub struct CommandRouter {
    mention: String,
    handlers: HashMap<String, Arc<dyn CommandHandler>>,
}

impl CommandRouter {
    pub fn new(mention: impl Into<String>) -> Self {
        Self {
            mention: mention.into(),
            handlers: HashMap::new(),
        }
    }

    pub fn mention(&self) -> &str {
        &self.mention
    }

    /// Registers `handler` for commands named `name`, replacing any previous one.
    pub fn register<H: CommandHandler + 'static>(&mut self, name: &str, handler: H) {
        self.handlers.insert(name.to_string(), Arc::new(handler));
    }

    /// Registers this router on `router` for every event that can carry a
    /// command.
    pub fn install(self, router: &mut EventRouter) -> Result<(), RouterError> {
        let shared: Arc<dyn EventHandler> = Arc::new(self);
        for (event_type, action, _) in COMMAND_SOURCES {
            router.register_shared(
                Arc::clone(&shared),
                event_type,
                Restrictions::none().with("action", action),
            )?;
        }
        Ok(())
    }
}

fn command_text(event: &WebhookEvent) -> Option<&str> {
    COMMAND_SOURCES
        .iter()
        .find(|(event_type, _, _)| *event_type == event.event_type)
        .and_then(|(_, _, path)| lookup_str(&event.payload, path))
}

#[async_trait]
impl EventHandler for CommandRouter {
    async fn handle(&self, event: &WebhookEvent, client: &GitHubClient) -> anyhow::Result<()> {
        for command in parse_commands(command_text(event), &self.mention) {
            let Some(name) = command.name() else {
                info!("empty command; ignoring");
                continue;
            };
            let Some(handler) = self.handlers.get(name) else {
                info!(command = name, "unknown command; ignoring");
                continue;
            };
            debug!(command = %command, "running command");
            handler.handle(&command, event, client).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "commands"
    }
}
