use std::env;

use thiserror::Error;

const DEFAULT_API_BASE: &str = "https://api.twitter.com/2";
const DEFAULT_ASKED_COUNT_MAX: i64 = 5;
const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{key} must be {expected}, got {value:?}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Names of the document collections. Dev deployments point these at
/// `-dev` suffixed collections so they never touch production data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionNames {
    pub videos: String,
    pub users: String,
    pub banned: String,
    pub reply_intents: String,
}

impl Default for CollectionNames {
    fn default() -> Self {
        Self {
            videos: "videos".to_string(),
            users: "users".to_string(),
            banned: "banned".to_string(),
            reply_intents: "reply_intents".to_string(),
        }
    }
}

/// Bot configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Twitter
    pub twitter_bearer_token: String,
    pub twitter_user_token: String,
    pub twitter_api_base: String,
    pub track: String,

    // Replies
    pub url_prefix: String,
    pub asked_count_max: i64,

    // Storage
    pub database_url: Option<String>,
    pub collections: CollectionNames,

    // Worker
    pub queue_capacity: usize,
}

impl Config {
    /// Load from the process environment, reading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let queue_capacity: usize =
            parse_or(&lookup, "QUEUE_CAPACITY", DEFAULT_QUEUE_CAPACITY, "a positive integer")?;
        if queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "QUEUE_CAPACITY",
                expected: "a positive integer",
                value: "0".to_string(),
            });
        }

        let defaults = CollectionNames::default();
        Ok(Self {
            twitter_bearer_token: required("TWITTER_BEARER_TOKEN")?,
            twitter_user_token: required("TWITTER_USER_TOKEN")?,
            twitter_api_base: or_default("TWITTER_API_BASE", DEFAULT_API_BASE),
            track: required("TRACK")?,
            url_prefix: required("URL_PREFIX")?,
            asked_count_max: parse_or(&lookup, "ASKED_COUNT_MAX", DEFAULT_ASKED_COUNT_MAX, "an integer")?,
            database_url: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            collections: CollectionNames {
                videos: or_default("VIDEOS_COLLECTION", &defaults.videos),
                users: or_default("USERS_COLLECTION", &defaults.users),
                banned: or_default("BANNED_COLLECTION", &defaults.banned),
                reply_intents: or_default("REPLY_INTENTS_COLLECTION", &defaults.reply_intents),
            },
            queue_capacity,
        })
    }

    /// Log the loaded configuration with secrets truncated.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.char_indices().nth(5).map(|(i, _)| i).unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  TWITTER_BEARER_TOKEN: {}", preview(&self.twitter_bearer_token));
        tracing::info!("  TWITTER_USER_TOKEN: {}", preview(&self.twitter_user_token));
        tracing::info!("  TWITTER_API_BASE: {}", self.twitter_api_base);
        tracing::info!("  TRACK: {}", self.track);
        tracing::info!("  URL_PREFIX: {}", self.url_prefix);
        tracing::info!("  ASKED_COUNT_MAX: {}", self.asked_count_max);
        tracing::info!(
            "  DATABASE_URL: {}",
            self.database_url.as_deref().map(preview).unwrap_or_else(|| "<not set, in-memory store>".to_string())
        );
        tracing::info!(
            videos = %self.collections.videos,
            users = %self.collections.users,
            banned = %self.collections.banned,
            reply_intents = %self.collections.reply_intents,
            "  collections"
        );
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T, expected: &'static str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            expected,
            value,
        }),
    }
}
