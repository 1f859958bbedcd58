//! Consumer configuration
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (avro-consumer.toml)
//! - Environment variables (AVRO_CONSUMER__*)
//! - An explicit key/value mapping supplied by the host
//!
//! Exactly one of `schema_path` and `schema_uri_format` selects the resolver.
//!
//! ## Example config file (avro-consumer.toml):
//! ```toml
//! schema_uri_format = "http://schemas.internal/avro/{}.avsc"
//!
//! [http]
//! fetch_mode = "async"
//! timeout_secs = 10
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, SchemaError};

/// Main configuration for a consumer's schema handling
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Directory of `{type_name}.avsc` files (local resolver)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_path: Option<PathBuf>,

    /// URI format with one `{}` slot for the type name (remote resolver)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_uri_format: Option<String>,

    /// HTTP settings for the remote resolver
    #[serde(default)]
    pub http: HttpConfig,
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// How a fetch waits for the response
    #[serde(default)]
    pub fetch_mode: FetchMode,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with schema requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

/// Whether remote fetches suspend the task or block a worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Async,
    Blocking,
}

/// The validated resolver selection
#[derive(Debug, Clone)]
pub enum ResolverSettings {
    Local { schema_path: PathBuf },
    Remote { uri_format: String, http: HttpConfig },
}

// Default value functions
fn default_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("avro-consumer/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            fetch_mode: FetchMode::default(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ConsumerConfig {
    /// Load configuration from default locations
    pub fn load() -> std::result::Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a specific file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "avro-consumer.toml",
            ".avro-consumer.toml",
            "config/avro-consumer.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) =
            directories::ProjectDirs::from("dev", "familiar", "avro-consumer")
        {
            let xdg_config = config_dir.config_dir().join("avro-consumer.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // AVRO_CONSUMER__SCHEMA_PATH, AVRO_CONSUMER__HTTP__TIMEOUT_SECS, ...
        builder = builder.add_source(
            Environment::with_prefix("AVRO_CONSUMER")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Build configuration from a host-supplied settings mapping.
    ///
    /// Keys use dotted paths for nested values, e.g. `http.timeout_secs`.
    pub fn from_settings<I, K, V>(settings: I) -> std::result::Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<config_crate::Value>,
    {
        let mut builder = Config::builder();
        for (key, value) in settings {
            builder = builder.set_override(key.as_ref(), value)?;
        }
        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Validate the resolver options and return the selected resolver.
    ///
    /// Empty values count as unset. Setting both options, or neither, is a
    /// configuration error.
    pub fn resolver_settings(&self) -> Result<ResolverSettings> {
        let schema_path = self
            .schema_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty());
        let uri_format = self
            .schema_uri_format
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty());

        match (schema_path, uri_format) {
            (Some(schema_path), None) => Ok(ResolverSettings::Local {
                schema_path: schema_path.clone(),
            }),
            (None, Some(uri_format)) => Ok(ResolverSettings::Remote {
                uri_format: uri_format.to_string(),
                http: self.http.clone(),
            }),
            (Some(_), Some(_)) => Err(SchemaError::Configuration(
                "schema_path and schema_uri_format are mutually exclusive".to_string(),
            )),
            (None, None) => Err(SchemaError::Configuration(
                "one of schema_path or schema_uri_format must be set".to_string(),
            )),
        }
    }
}
