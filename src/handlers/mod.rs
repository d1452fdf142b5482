//! The bot's built-in behaviour.

pub mod invite;
pub mod ping;

pub use invite::{InviteOnFirstMerge, MemberState, member_state, welcome_message};
pub use ping::Ping;
