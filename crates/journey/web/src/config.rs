//! Configuration for journey services

use axum::http::StatusCode;
use journey_store::{InMemoryJourneyStore, JourneyInstanceStore};
use journey_types::JourneyResult;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JourneyConfig {
    /// Instance store
    #[serde(default)]
    pub store: StoreConfig,

    /// HTTP server
    #[serde(default)]
    pub web: WebConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Instance store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-memory storage (for development/testing)
    #[default]
    Memory,

    /// PostgreSQL storage
    Postgres {
        /// Connection URL
        url: String,

        /// Maximum connections in pool
        #[serde(default = "default_pool_size")]
        max_connections: u32,

        /// Connection timeout in seconds
        #[serde(default = "default_connection_timeout")]
        connect_timeout_secs: u64,
    },
}

impl StoreConfig {
    /// Open the configured store
    pub async fn connect(&self) -> JourneyResult<Arc<dyn JourneyInstanceStore>> {
        match self {
            StoreConfig::Memory => {
                tracing::info!("Using in-memory journey store");
                Ok(Arc::new(InMemoryJourneyStore::new()))
            }
            #[cfg(feature = "postgres")]
            StoreConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
            } => {
                let store = journey_store::PostgresJourneyStore::connect_with_options(
                    url,
                    *max_connections,
                    *connect_timeout_secs,
                )
                .await?;
                tracing::info!(max_connections, "Using PostgreSQL journey store");
                Ok(Arc::new(store))
            }
            #[cfg(not(feature = "postgres"))]
            StoreConfig::Postgres { .. } => Err(journey_types::JourneyError::Backend(
                "postgres store requested but journey-web was built without the `postgres` feature"
                    .to_string(),
            )),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Listen address
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Status returned by routes that require an instance when none is found
    #[serde(default = "default_missing_instance_status")]
    pub missing_instance_status: u16,
}

impl WebConfig {
    pub fn missing_instance_status(&self) -> StatusCode {
        StatusCode::from_u16(self.missing_instance_status).unwrap_or(StatusCode::BAD_REQUEST)
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            missing_instance_status: default_missing_instance_status(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level, overridden by `RUST_LOG`
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_listen_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::LOCALHOST, 8080))
}

fn default_missing_instance_status() -> u16 {
    400
}

fn default_pool_size() -> u32 {
    10
}

fn default_connection_timeout() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

impl JourneyConfig {
    /// Load configuration: defaults, then the optional file, then `JOURNEY_*`
    /// environment variables (`JOURNEY_WEB__LISTEN_ADDR=0.0.0.0:8080`)
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Self::defaults()?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("JOURNEY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    fn defaults(
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        let defaults = config::Config::try_from(&JourneyConfig::default())?;
        Ok(config::Config::builder().add_source(defaults))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> JourneyConfig {
        JourneyConfig::defaults()
            .unwrap()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = JourneyConfig::default();
        assert_eq!(config.web.listen_addr.port(), 8080);
        assert_eq!(config.web.missing_instance_status(), StatusCode::BAD_REQUEST);
        assert!(matches!(config.store, StoreConfig::Memory));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let config = from_toml(
            r#"
            [store]
            type = "postgres"
            url = "postgres://localhost/journeys"

            [web]
            missing_instance_status = 410

            [logging]
            json = true
            "#,
        );

        match config.store {
            StoreConfig::Postgres {
                url,
                max_connections,
                connect_timeout_secs,
            } => {
                assert_eq!(url, "postgres://localhost/journeys");
                assert_eq!(max_connections, 10);
                assert_eq!(connect_timeout_secs, 5);
            }
            other => panic!("expected postgres store, got {other:?}"),
        }
        assert_eq!(config.web.missing_instance_status(), StatusCode::GONE);
        assert_eq!(config.web.listen_addr.port(), 8080);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_status_falls_back() {
        let web = WebConfig {
            missing_instance_status: 42,
            ..WebConfig::default()
        };
        assert_eq!(web.missing_instance_status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_memory_store_connects() {
        let store = StoreConfig::Memory.connect().await.unwrap();
        let id = journey_types::JourneyInstanceId::new("j");
        let shape = journey_types::StateShape::new("S");
        assert!(store.get(&id, &shape).await.unwrap().is_none());
    }
}
