//! Schema Resolution
//!
//! A resolver turns a type name into a parsed [`Schema`]. Two strategies are
//! provided and selected once, from configuration:
//!
//! - [`LocalResolver`] reads `{schema_path}/{type_name}.avsc`
//! - [`RemoteResolver`] fetches the definition from a templated URI
//!
//! Each resolver owns a [`SchemaCache`], so a type name is read or fetched
//! at most once per successful resolution.

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::SchemaCache;
use crate::config::{ConsumerConfig, FetchMode, ResolverSettings};
use crate::error::Result;
use crate::schema::Schema;

pub mod fetch;
pub mod local;
pub mod remote;

pub use fetch::{AsyncHttpFetcher, BlockingHttpFetcher, FetchError, SchemaFetcher};
pub use local::LocalResolver;
pub use remote::{RemoteResolver, UriTemplate};

/// Resolves type names to schemas
#[async_trait]
pub trait SchemaResolver: Send + Sync {
    /// Resolve `type_name`, serving from the cache when possible
    async fn resolve(&self, type_name: &str) -> Result<Arc<Schema>>;

    /// The cache backing this resolver
    fn cache(&self) -> &SchemaCache;
}

/// Build the resolver selected by `config`.
///
/// Fails with [`SchemaError::Configuration`](crate::SchemaError::Configuration)
/// when neither or both resolver options are set, or when the chosen
/// option is invalid.
pub fn from_config(config: &ConsumerConfig) -> Result<Arc<dyn SchemaResolver>> {
    match config.resolver_settings()? {
        ResolverSettings::Local { schema_path } => {
            tracing::info!(schema_path = %schema_path.display(), "using local schema resolver");
            Ok(Arc::new(LocalResolver::new(schema_path)?))
        }
        ResolverSettings::Remote { uri_format, http } => {
            tracing::info!(
                uri_format = %uri_format,
                fetch_mode = ?http.fetch_mode,
                "using remote schema resolver"
            );
            let fetcher: Arc<dyn SchemaFetcher> = match http.fetch_mode {
                FetchMode::Async => Arc::new(AsyncHttpFetcher::new(&http)?),
                FetchMode::Blocking => Arc::new(BlockingHttpFetcher::new(&http)),
            };
            Ok(Arc::new(RemoteResolver::new(&uri_format, fetcher)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use tempfile::tempdir;

    #[test]
    fn test_from_config_requires_a_resolver() {
        let err = from_config(&ConsumerConfig::default()).err().unwrap();
        assert!(matches!(err, SchemaError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_from_config_local() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("greeting.v1.avsc"), r#""string""#).unwrap();

        let config = ConsumerConfig {
            schema_path: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        let resolver = from_config(&config).unwrap();
        let schema = resolver.resolve("greeting.v1").await.unwrap();
        assert_eq!(schema.canonical_form(), r#""string""#);
        assert_eq!(resolver.cache().len(), 1);
    }

    #[test]
    fn test_from_config_remote_blocking() {
        let mut config = ConsumerConfig {
            schema_uri_format: Some("http://registry.local/schemas/{}.avsc".to_string()),
            ..Default::default()
        };
        config.http.fetch_mode = FetchMode::Blocking;
        let resolver = from_config(&config).unwrap();
        assert!(resolver.cache().is_empty());
    }
}
