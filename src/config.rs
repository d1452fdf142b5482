//! Process configuration.
//!
//! Everything the bot needs to start comes from environment variables. The
//! lookup function is injectable so tests never touch the real environment.
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `GITHUB_APP_ID` | yes | |
//! | `GITHUB_PRIVATE_KEY` | yes | |
//! | `GITHUB_WEBHOOK_SECRET` | yes | |
//! | `GITHUB_USER_AGENT` | yes | |
//! | `GITHUB_API_URL` | no | `https://api.github.com` |
//! | `PORT` | no | `8000` |
//! | `BOT_MENTION` | no | last `/` segment of the user agent's first word |
//! | `MEMBERSHIP_STORE_PATH` | no | in-memory store |
//! | `CONSISTENCY_DELAY_MS` | no | `1000` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default GitHub REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Default HTTP port (Heroku-style deployments override it via `PORT`).
pub const DEFAULT_PORT: u16 = 8000;

/// Default delay before dispatching a webhook, absorbing GitHub's
/// read-after-write lag.
pub const DEFAULT_CONSISTENCY_DELAY: Duration = Duration::from_secs(1);

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "snekomatic=debug";

/// Errors raised while assembling configuration or key material.
///
/// All of these are fatal at startup; none is retried.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required value was not provided.
    #[error("missing required configuration value {0}")]
    MissingValue(&'static str),

    /// A value was provided but could not be interpreted.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },

    /// The app private key is not a usable RSA PEM key.
    #[error("invalid GitHub App private key: {0}")]
    InvalidPrivateKey(#[source] jsonwebtoken::errors::Error),
}

/// Fully resolved process configuration.
#[derive(Clone)]
pub struct AppConfig {
    pub app_id: String,
    pub private_key: String,
    pub webhook_secret: String,
    pub user_agent: String,
    pub api_url: String,
    pub bind_addr: SocketAddr,
    pub bot_mention: String,
    pub membership_store_path: Option<PathBuf>,
    pub consistency_delay: Duration,
}

impl AppConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through an arbitrary lookup function.
    ///
    /// Empty values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigurationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let require = |name: &'static str| get(name).ok_or(ConfigurationError::MissingValue(name));

        let app_id = require("GITHUB_APP_ID")?;
        // Keys pasted into single-line env vars usually carry literal "\n".
        let private_key = require("GITHUB_PRIVATE_KEY")?.replace("\\n", "\n");
        let webhook_secret = require("GITHUB_WEBHOOK_SECRET")?;
        let user_agent = require("GITHUB_USER_AGENT")?;

        let api_url = get("GITHUB_API_URL")
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigurationError::InvalidValue {
                    name: "PORT",
                    reason: e.to_string(),
                })?,
            None => DEFAULT_PORT,
        };

        let consistency_delay = match get("CONSISTENCY_DELAY_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ConfigurationError::InvalidValue {
                    name: "CONSISTENCY_DELAY_MS",
                    reason: e.to_string(),
                })?,
            None => DEFAULT_CONSISTENCY_DELAY,
        };

        let bot_mention = match get("BOT_MENTION") {
            Some(raw) => {
                let mention = raw.trim();
                if mention.contains(char::is_whitespace) || mention.trim_start_matches('@').is_empty() {
                    return Err(ConfigurationError::InvalidValue {
                        name: "BOT_MENTION",
                        reason: format!("{mention:?} is not a single word"),
                    });
                }
                mention.to_string()
            }
            None => mention_from_user_agent(&user_agent),
        };

        Ok(AppConfig {
            app_id,
            private_key,
            webhook_secret,
            user_agent,
            api_url,
            bind_addr: SocketAddr::from(([0, 0, 0, 0], port)),
            bot_mention,
            membership_store_path: get("MEMBERSHIP_STORE_PATH").map(PathBuf::from),
            consistency_delay,
        })
    }
}

/// Commands are matched one word at a time, so `python-trio/snekomatic testing`
/// becomes `snekomatic`.
fn mention_from_user_agent(user_agent: &str) -> String {
    let product = user_agent.split_whitespace().next().unwrap_or_default();
    product.rsplit('/').find(|s| !s.is_empty()).unwrap_or(product).to_string()
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("app_id", &self.app_id)
            .field("user_agent", &self.user_agent)
            .field("api_url", &self.api_url)
            .field("bind_addr", &self.bind_addr)
            .field("bot_mention", &self.bot_mention)
            .field("membership_store_path", &self.membership_store_path)
            .field("consistency_delay", &self.consistency_delay)
            .finish_non_exhaustive()
    }
}
