use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

/// What `get_or_create_direct_conversation` does when the pair already shares
/// a direct conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DirectConversationPolicy {
    /// Every call opens a fresh thread.
    #[default]
    AlwaysCreate,
    /// Return the oldest existing direct thread for the pair, if any.
    ReuseExisting,
}

impl FromStr for DirectConversationPolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "always-create" => Ok(Self::AlwaysCreate),
            "reuse-existing" => Ok(Self::ReuseExisting),
            other => bail!("unknown direct conversation policy '{}'", other),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    pub direct_conversations: DirectConversationPolicy,
    pub busy_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("chatroom.db"),
            direct_conversations: DirectConversationPolicy::default(),
            busy_timeout: Duration::from_millis(5000),
        }
    }
}

impl DbConfig {
    /// Load from the environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let path = lookup("CHATROOM_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.path);

        let direct_conversations = match lookup("CHATROOM_DIRECT_CONVERSATIONS") {
            Some(v) => v.parse().context("CHATROOM_DIRECT_CONVERSATIONS")?,
            None => defaults.direct_conversations,
        };

        let busy_timeout = match lookup("CHATROOM_BUSY_TIMEOUT_MS") {
            Some(v) => Duration::from_millis(
                v.trim()
                    .parse()
                    .with_context(|| format!("invalid CHATROOM_BUSY_TIMEOUT_MS '{}'", v))?,
            ),
            None => defaults.busy_timeout,
        };

        Ok(Self {
            path,
            direct_conversations,
            busy_timeout,
        })
    }
}
