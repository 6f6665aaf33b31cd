use std::env;
use std::fmt;

/// Which document store backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Mongo,
    Memory,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "{} must be set", key),
            ConfigError::Invalid { key, value } => write!(f, "{} has an invalid value: {:?}", key, value),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct Config {
    pub store_backend: StoreBackend,
    pub mongo_uri: Option<String>,
    pub database_name: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub bind_addr: String,
    pub frontend_origin: String,
    pub due_soon_days: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let store_backend = match env::var("STORE_BACKEND")
            .unwrap_or_else(|_| "mongo".to_string())
            .to_lowercase()
            .as_str()
        {
            "mongo" | "mongodb" => StoreBackend::Mongo,
            "memory" => StoreBackend::Memory,
            other => {
                return Err(ConfigError::Invalid { key: "STORE_BACKEND", value: other.to_string() })
            }
        };

        let mongo_uri = env::var("MONGO_URI").ok();
        if store_backend == StoreBackend::Mongo && mongo_uri.is_none() {
            return Err(ConfigError::Missing("MONGO_URI"));
        }

        Ok(Self {
            store_backend,
            mongo_uri,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| "taskboard".to_string()),
            jwt_secret: env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?,
            token_ttl_hours: parse_var("TOKEN_TTL_HOURS", 24)?,
            bcrypt_cost: parse_var("BCRYPT_COST", bcrypt::DEFAULT_COST)?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            frontend_origin: env::var("FRONTEND_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            due_soon_days: parse_var("DUE_SOON_DAYS", 3)?,
        })
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// In-memory configuration with a cheap bcrypt cost.
    pub fn for_tests() -> Self {
        Self {
            store_backend: StoreBackend::Memory,
            mongo_uri: None,
            database_name: "taskboard_test".to_string(),
            jwt_secret: "test-secret".to_string(),
            token_ttl_hours: 1,
            bcrypt_cost: 4,
            bind_addr: "127.0.0.1:0".to_string(),
            frontend_origin: "http://localhost:3000".to_string(),
            due_soon_days: 3,
        }
    }
}
