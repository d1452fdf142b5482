//! snekomatic - a GitHub App bot.
//!
//! The bot receives signed webhook deliveries, authenticates to GitHub as
//! each installation with short-lived access tokens, and routes every event
//! to the handlers registered for it.
//!
//! - [`auth`]: app assertions and the installation token broker
//! - [`github`]: the HTTP transport seam and the request-signing client
//! - [`webhooks`]: signature checks, event decoding and the event router
//! - [`commands`]: `@bot <command>` lines in issue, PR and comment bodies
//! - [`handlers`]: the bot's behaviour (org invitations, `ping`)
//! - [`server`]: the axum HTTP front end

pub mod app;
pub mod auth;
pub mod commands;
pub mod config;
pub mod github;
pub mod handlers;
pub mod membership;
pub mod server;
pub mod types;
pub mod webhooks;

#[cfg(test)]
mod test_utils;
