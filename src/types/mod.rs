//! Core domain types shared across the bot.

pub mod ids;

pub use ids::{DeliveryId, InstallationId};
