use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Where clearance requests are persisted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    /// One JSON array in a file, rewritten on every change.
    File(PathBuf),
    Postgres(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub jwt_secret: String,
    pub storage: StorageBackend,
    pub catalog_path: Option<PathBuf>,
    pub log_dir: PathBuf,
    pub log_level: tracing::Level,
    pub request_timeout: Duration,
}

impl Config {
    /// ✅ Load environment variables and set defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &'static str, default: &str| {
            lookup(name)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let invalid = |name: &'static str, value: String| ConfigError::Invalid { name, value };

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;

        let bind_raw = var("BIND_ADDR", "127.0.0.1:3000");
        let bind_addr: SocketAddr = bind_raw
            .parse()
            .map_err(|_| invalid("BIND_ADDR", bind_raw.clone()))?;

        let storage = match var("STORAGE_BACKEND", "file").to_ascii_lowercase().as_str() {
            "memory" => StorageBackend::Memory,
            "file" => StorageBackend::File(PathBuf::from(var(
                "STORE_PATH",
                "data/clearance_requests.json",
            ))),
            "postgres" => StorageBackend::Postgres(
                lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            ),
            other => return Err(invalid("STORAGE_BACKEND", other.to_string())),
        };

        let level_raw = var("LOG_LEVEL", "info");
        let log_level: tracing::Level = level_raw
            .parse()
            .map_err(|_| invalid("LOG_LEVEL", level_raw.clone()))?;

        let timeout_raw = var("REQUEST_TIMEOUT_SECS", "30");
        let request_timeout = timeout_raw
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .ok_or_else(|| invalid("REQUEST_TIMEOUT_SECS", timeout_raw.clone()))?;

        Ok(Self {
            bind_addr,
            jwt_secret,
            storage,
            catalog_path: lookup("CATALOG_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            log_dir: PathBuf::from(var("LOG_DIR", "logs")),
            log_level,
            request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(
            config.storage,
            StorageBackend::File(PathBuf::from("data/clearance_requests.json"))
        );
        assert_eq!(config.log_level, tracing::Level::INFO);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn secret_is_required() {
        assert!(matches!(config(&[]), Err(ConfigError::Missing("JWT_SECRET"))));
    }

    #[test]
    fn postgres_needs_database_url() {
        let err = config(&[("JWT_SECRET", "x"), ("STORAGE_BACKEND", "postgres")]).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));

        let ok = config(&[
            ("JWT_SECRET", "x"),
            ("STORAGE_BACKEND", "Postgres"),
            ("DATABASE_URL", "postgres://localhost/clearance"),
        ])
        .unwrap();
        assert_eq!(
            ok.storage,
            StorageBackend::Postgres("postgres://localhost/clearance".into())
        );
    }

    #[test]
    fn bad_values_are_reported() {
        for (name, value) in [
            ("STORAGE_BACKEND", "redis"),
            ("BIND_ADDR", "localhost"),
            ("LOG_LEVEL", "loud"),
            ("REQUEST_TIMEOUT_SECS", "0"),
        ] {
            let err = config(&[("JWT_SECRET", "x"), (name, value)]).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{name}");
        }
    }
}
