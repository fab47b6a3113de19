use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::lexicon::Lexicon;

/// Main configuration structure for the moderation service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub redis: RedisConfig,
    pub groq: GroqConfig,
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub lexicon: Lexicon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub version: String,
    pub bind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub database: u8,
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_size: usize,
    pub timeout_seconds: u64,
    pub create_timeout_seconds: u64,
    pub recycle_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroqConfig {
    pub api_key: String,
    pub model: String,
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Username moderation messages are authored under. Excluded from
    /// participation tallies.
    pub ai_username: String,
    /// Hard cap on raw request content, before preprocessing.
    pub max_content_length: usize,
}

impl Config {
    /// Load configuration from file with environment variable overrides
    /// ALWAYS returns a valid config - never fails
    pub fn load() -> Self {
        // Load environment variables from .env files
        let env_paths = ["../.env", ".env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!(
                "No .env file found in any expected location - continuing with env vars only"
            );
        }

        let config_path =
            env::var("AGORA_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        // Load config from file if it exists
        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration - log warnings but don't fail
        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Server overrides
        if let Ok(name) = env::var("AGORA_SERVER_NAME") {
            self.server.name = name;
        }
        if let Ok(bind) = env::var("AGORA_HTTP_BIND") {
            self.server.bind = bind;
        }

        // Redis overrides
        if let Ok(host) = env::var("REDIS_HOST") {
            self.redis.host = host;
        }
        if let Ok(port) = env::var("REDIS_PORT") {
            if let Ok(port_num) = port.parse() {
                self.redis.port = port_num;
            }
        }
        if let Ok(db) = env::var("REDIS_DB") {
            if let Ok(db_num) = db.parse() {
                self.redis.database = db_num;
            }
        }
        if let Ok(pool_size) = env::var("AGORA_REDIS_POOL_SIZE") {
            if let Ok(size) = pool_size.parse() {
                self.redis.pool.max_size = size;
            }
        }

        // Groq overrides
        if let Ok(api_key) = env::var("GROQ_API_KEY") {
            self.groq.api_key = api_key;
        }
        if let Ok(model) = env::var("GROQ_MODEL") {
            self.groq.model = model;
        }
        if let Ok(timeout) = env::var("AGORA_GROQ_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.groq.request_timeout_seconds = secs;
            }
        }

        // Moderation overrides
        if let Ok(username) = env::var("AGORA_AI_USERNAME") {
            self.moderation.ai_username = username;
        }
    }

    /// Validate configuration
    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        if self.redis.port == 0 {
            return Err("Redis port cannot be 0".into());
        }

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("Invalid bind address: {}", self.server.bind).into());
        }

        if self.groq.api_key == "PLACEHOLDER_GROQ_API_KEY" || self.groq.api_key.is_empty() {
            return Err("GROQ_API_KEY environment variable must be set".into());
        }

        if self.groq.request_timeout_seconds == 0 {
            return Err("Groq request timeout cannot be 0".into());
        }

        if self.moderation.ai_username.is_empty() {
            return Err("Moderation AI username cannot be empty".into());
        }

        if self.moderation.max_content_length < 8 {
            return Err("max_content_length below the quality-gate minimum".into());
        }

        if self.lexicon.evidence_markers.is_empty()
            || self.lexicon.logic_connectors.is_empty()
            || self.lexicon.hedge_words.is_empty()
        {
            return Err("Lexicon vocabulary lists cannot be empty".into());
        }

        Ok(())
    }

    /// Get Redis URL with password from environment
    pub fn get_redis_url(&self) -> String {
        let password = env::var("REDIS_PASSWORD")
            .or_else(|_| env::var("REDIS_PASS"))
            .unwrap_or_else(|_| {
                tracing::warn!(
                    "REDIS_PASSWORD not set, assuming no password for local development."
                );
                "".to_string()
            });

        if password.is_empty() {
            format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.database
            )
        } else {
            format!(
                "redis://:{}@{}:{}/{}",
                password, self.redis.host, self.redis.port, self.redis.database
            )
        }
    }

    /// Get pool timeout as Duration
    pub fn get_pool_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.timeout_seconds)
    }

    /// Get pool create timeout as Duration
    pub fn get_pool_create_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.create_timeout_seconds)
    }

    /// Get pool recycle timeout as Duration
    pub fn get_pool_recycle_timeout(&self) -> Duration {
        Duration::from_secs(self.redis.pool.recycle_timeout_seconds)
    }

    /// Get Groq request timeout as Duration
    pub fn get_groq_timeout(&self) -> Duration {
        Duration::from_secs(self.groq.request_timeout_seconds)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "agora-moderator".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                bind: "127.0.0.1:8788".to_string(),
            },
            redis: RedisConfig {
                host: "localhost".to_string(),
                port: 6379,
                database: 0,
                pool: PoolConfig {
                    max_size: 16,
                    timeout_seconds: 5,
                    create_timeout_seconds: 5,
                    recycle_timeout_seconds: 5,
                },
            },
            groq: GroqConfig {
                api_key: env::var("GROQ_API_KEY").unwrap_or_else(|_| {
                    tracing::warn!("GROQ_API_KEY not set, using placeholder");
                    "PLACEHOLDER_GROQ_API_KEY".to_string()
                }),
                model: "llama-3.1-8b-instant".to_string(),
                request_timeout_seconds: 30,
            },
            moderation: ModerationConfig {
                ai_username: "moderator".to_string(),
                max_content_length: 4000,
            },
            lexicon: Lexicon::default(),
        }
    }
}
