use std::env;

pub const DEFAULT_ALIAS_ATTEMPTS: usize = 20;
pub const DEFAULT_CLICK_QUEUE_CAPACITY: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Expected {0} as an environment variable")]
    Missing(&'static str),
    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Mongo { url: String, database: String },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheBackend {
    Redis { url: String },
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub storage: StorageBackend,
    pub cache: CacheBackend,
    pub alias_attempts: usize,
    /// Pending clicks held before new ones are dropped.
    pub click_queue_capacity: usize,
    /// Prefix for composed short URLs. Falls back to the long URL's host.
    pub public_base_url: Option<String>,
}

impl Config {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("PORT") {
            Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value,
            })?,
            None => 5000,
        };

        let storage = match get("STORAGE_BACKEND").as_deref() {
            None | Some("mongodb") => StorageBackend::Mongo {
                url: get("MONGODB_URL").ok_or(ConfigError::Missing("MONGODB_URL"))?,
                database: get("MONGODB_DATABASE").unwrap_or_else(|| "shortener".to_owned()),
            },
            Some("memory") => StorageBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "STORAGE_BACKEND",
                    value: other.to_owned(),
                });
            }
        };

        let cache = match get("CACHE_BACKEND").as_deref() {
            None | Some("redis") => CacheBackend::Redis {
                url: get("REDIS_URL").unwrap_or_else(|| {
                    let host = get("REDIS_HOST").unwrap_or_else(|| "localhost".to_owned());
                    format!("redis://{host}:6379")
                }),
            },
            Some("memory") => CacheBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "CACHE_BACKEND",
                    value: other.to_owned(),
                });
            }
        };

        let alias_attempts = match get("ALIAS_MAX_ATTEMPTS") {
            Some(value) => match value.parse::<usize>() {
                Ok(attempts) if attempts > 0 => attempts,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "ALIAS_MAX_ATTEMPTS",
                        value,
                    });
                }
            },
            None => DEFAULT_ALIAS_ATTEMPTS,
        };

        let click_queue_capacity = match get("CLICK_QUEUE_CAPACITY") {
            Some(value) => match value.parse::<usize>() {
                Ok(capacity) if capacity > 0 => capacity,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "CLICK_QUEUE_CAPACITY",
                        value,
                    });
                }
            },
            None => DEFAULT_CLICK_QUEUE_CAPACITY,
        };

        let public_base_url = get("PUBLIC_BASE_URL").map(|url| url.trim_end_matches('/').to_owned());

        Ok(Self {
            port,
            storage,
            cache,
            alias_attempts,
            click_queue_capacity,
            public_base_url,
        })
    }
}
