//! Process configuration, read once at start-up from the environment.
//!
//! | Variable                           | Default        |
//! |------------------------------------|----------------|
//! | `SLACK_SIGNING_SECRET`             | required       |
//! | `SLACK_BOT_USER_ID`                | unset          |
//! | `EVENT_GATE_BIND_ADDR`             | `0.0.0.0:8000` |
//! | `EVENT_GATE_CACHE_CAPACITY`        | `1000`         |
//! | `EVENT_GATE_CACHE_TTL_SECS`        | `3600`         |
//! | `EVENT_GATE_CLEANUP_INTERVAL_SECS` | `300`          |
//! | `EVENT_GATE_HANDLED_EVENTS`        | `app_mention`  |
//! | `EVENT_GATE_MAX_BODY_BYTES`        | `1048576`      |

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::admission::{DEFAULT_HANDLED_EVENT_TYPE, PipelineConfig};
use crate::dedupe::{CacheConfig, DEFAULT_CAPACITY, DEFAULT_CLEANUP_INTERVAL, DEFAULT_TTL};

pub const ENV_SIGNING_SECRET: &str = "SLACK_SIGNING_SECRET";
pub const ENV_BOT_USER_ID: &str = "SLACK_BOT_USER_ID";
pub const ENV_BIND_ADDR: &str = "EVENT_GATE_BIND_ADDR";
pub const ENV_CACHE_CAPACITY: &str = "EVENT_GATE_CACHE_CAPACITY";
pub const ENV_CACHE_TTL_SECS: &str = "EVENT_GATE_CACHE_TTL_SECS";
pub const ENV_CLEANUP_INTERVAL_SECS: &str = "EVENT_GATE_CLEANUP_INTERVAL_SECS";
pub const ENV_HANDLED_EVENTS: &str = "EVENT_GATE_HANDLED_EVENTS";
pub const ENV_MAX_BODY_BYTES: &str = "EVENT_GATE_MAX_BODY_BYTES";

/// Default listen address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Default request body limit. Slack event payloads are a few KiB.
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Errors from reading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// A variable is set but does not parse.
    #[error("invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Everything the binary needs to start.
#[derive(Clone)]
pub struct GateConfig {
    pub signing_secret: Vec<u8>,
    pub bind_addr: SocketAddr,
    pub cache: CacheConfig,
    pub pipeline: PipelineConfig,
    pub max_body_bytes: usize,
}

impl GateConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Treat set-but-blank the same as unset
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let signing_secret = get(ENV_SIGNING_SECRET)
            .ok_or(ConfigError::Missing(ENV_SIGNING_SECRET))?
            .into_bytes();

        let bind_addr = match get(ENV_BIND_ADDR) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
                name: ENV_BIND_ADDR,
                value: raw,
                reason: "expected host:port",
            })?,
            None => DEFAULT_BIND_ADDR
                .parse()
                .map_err(|_| ConfigError::Invalid {
                    name: ENV_BIND_ADDR,
                    value: DEFAULT_BIND_ADDR.to_string(),
                    reason: "expected host:port",
                })?,
        };

        let capacity = parse_positive_usize(get(ENV_CACHE_CAPACITY), ENV_CACHE_CAPACITY)?
            .unwrap_or(DEFAULT_CAPACITY);
        let ttl = parse_positive(get(ENV_CACHE_TTL_SECS), ENV_CACHE_TTL_SECS)?
            .map_or(DEFAULT_TTL, Duration::from_secs);
        let cleanup_interval =
            parse_positive(get(ENV_CLEANUP_INTERVAL_SECS), ENV_CLEANUP_INTERVAL_SECS)?
                .map_or(DEFAULT_CLEANUP_INTERVAL, Duration::from_secs);
        let max_body_bytes = parse_positive_usize(get(ENV_MAX_BODY_BYTES), ENV_MAX_BODY_BYTES)?
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        let handled_event_types = match get(ENV_HANDLED_EVENTS) {
            Some(raw) => {
                let types: HashSet<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
                if types.is_empty() {
                    return Err(ConfigError::Invalid {
                        name: ENV_HANDLED_EVENTS,
                        value: raw,
                        reason: "expected a comma-separated list of event types",
                    });
                }
                types
            }
            None => HashSet::from([DEFAULT_HANDLED_EVENT_TYPE.to_string()]),
        };

        let bot_user_id = get(ENV_BOT_USER_ID).map(|id| id.trim().to_string());

        Ok(GateConfig {
            signing_secret,
            bind_addr,
            cache: CacheConfig {
                capacity,
                ttl,
                cleanup_interval,
            },
            pipeline: PipelineConfig {
                handled_event_types,
                bot_user_id,
            },
            max_body_bytes,
        })
    }
}

impl fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateConfig")
            .field("signing_secret", &"[REDACTED]")
            .field("bind_addr", &self.bind_addr)
            .field("cache", &self.cache)
            .field("pipeline", &self.pipeline)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

/// Parses an optional strictly positive integer.
fn parse_positive(raw: Option<String>, name: &'static str) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "must be greater than zero",
        }),
        Ok(n) => Ok(Some(n)),
        Err(_) => Err(ConfigError::Invalid {
            name,
            value: raw,
            reason: "expected a positive integer",
        }),
    }
}

/// Like [`parse_positive`], for sizes that must also fit in `usize`.
fn parse_positive_usize(
    raw: Option<String>,
    name: &'static str,
) -> Result<Option<usize>, ConfigError> {
    let value = raw.clone();
    parse_positive(raw, name)?
        .map(|n| {
            usize::try_from(n).map_err(|_| ConfigError::Invalid {
                name,
                value: value.unwrap_or_default(),
                reason: "too large for this platform",
            })
        })
        .transpose()
}
