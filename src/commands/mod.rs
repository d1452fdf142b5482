//! Mention-prefixed bot commands.
//!
//! Users talk to the bot by starting a line of an issue, pull request or
//! comment with its mention:
//!
//! ```text
//! Looks good to me.
//! @snekomatic ping
//! ```
//!
//! [`parse_commands`] extracts those lines; [`CommandRouter`] dispatches them
//! by command name and plugs into an [`EventRouter`](crate::webhooks::EventRouter)
//! like any other event handler.

mod parser;
mod router;
mod types;

pub use parser::parse_commands;
pub use router::{COMMAND_SOURCES, CommandHandler, CommandRouter};
pub use types::ParsedCommand;
