//! Remote schema resolution over HTTP

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::SchemaCache;
use crate::error::{Result, SchemaError};
use crate::schema::Schema;

use super::fetch::SchemaFetcher;
use super::SchemaResolver;

/// Substitution slots accepted in a URI format
const SLOTS: [&str; 2] = ["{0}", "{}"];

/// A URI format with exactly one slot for the type name,
/// e.g. `http://registry/avro/schemas/{}.avsc`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UriTemplate {
    prefix: String,
    suffix: String,
}

impl UriTemplate {
    pub fn parse(format: &str) -> Result<Self> {
        let format = format.trim();
        if format.is_empty() {
            return Err(SchemaError::Configuration("schema_uri_format is not set".to_string()));
        }

        let mut slots: Vec<(usize, &str)> = SLOTS
            .iter()
            .flat_map(|slot| format.match_indices(*slot))
            .collect();
        if slots.len() != 1 {
            return Err(SchemaError::Configuration(format!(
                "schema_uri_format must contain exactly one {{}} slot, found {}: {}",
                slots.len(),
                format
            )));
        }

        let (at, slot) = slots.remove(0);
        Ok(Self {
            prefix: format[..at].to_string(),
            suffix: format[at + slot.len()..].to_string(),
        })
    }

    /// Substitute `type_name` into the slot as a single percent-encoded
    /// path segment
    pub fn expand(&self, type_name: &str) -> String {
        format!("{}{}{}", self.prefix, urlencoding::encode(type_name), self.suffix)
    }
}

impl fmt::Display for UriTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{{}}{}", self.prefix, self.suffix)
    }
}

/// Resolves schemas from a remote endpoint
pub struct RemoteResolver {
    template: UriTemplate,
    fetcher: Arc<dyn SchemaFetcher>,
    cache: SchemaCache,
}

impl RemoteResolver {
    /// Create a resolver for `uri_format`.
    ///
    /// The format is validated here; an empty format or one without exactly
    /// one slot is a configuration error.
    pub fn new(uri_format: &str, fetcher: Arc<dyn SchemaFetcher>) -> Result<Self> {
        Ok(Self {
            template: UriTemplate::parse(uri_format)?,
            fetcher,
            cache: SchemaCache::new(),
        })
    }

    pub fn template(&self) -> &UriTemplate {
        &self.template
    }

    async fn fetch_schema(&self, type_name: String) -> Result<Schema> {
        let uri = self.template.expand(&type_name);
        tracing::debug!(type_name = %type_name, uri = %uri, "fetching schema");

        let definition = self.fetcher.fetch(&uri).await.map_err(|e| {
            tracing::warn!(type_name = %type_name, uri = %uri, error = %e, "schema fetch failed");
            SchemaError::SchemaFetch {
                uri: uri.clone(),
                status: e.status(),
                reason: e.to_string(),
            }
        })?;

        let schema = Schema::parse(type_name, &definition)?;
        tracing::info!(
            type_name = schema.type_name(),
            uri = %uri,
            checksum = schema.checksum().short(),
            "fetched schema"
        );
        Ok(schema)
    }
}

#[async_trait]
impl SchemaResolver for RemoteResolver {
    async fn resolve(&self, type_name: &str) -> Result<Arc<Schema>> {
        self.cache
            .get_or_resolve_async(type_name, |name| self.fetch_schema(name))
            .await
    }

    fn cache(&self) -> &SchemaCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::fetch::FetchError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves canned responses and counts requests
    #[derive(Default)]
    struct StubFetcher {
        responses: HashMap<String, std::result::Result<String, u16>>,
        calls: AtomicUsize,
    }

    impl StubFetcher {
        fn with(mut self, uri: &str, response: std::result::Result<&str, u16>) -> Self {
            self.responses
                .insert(uri.to_string(), response.map(str::to_string));
            self
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SchemaFetcher for StubFetcher {
        async fn fetch(&self, uri: &str) -> std::result::Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.responses.get(uri) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(status)) => Err(FetchError::Status {
                    status: *status,
                    body: String::new(),
                }),
                None => Err(FetchError::Transport("connection refused".to_string())),
            }
        }
    }

    const URI_FORMAT: &str = "http://registry.local/avro/{0}.avsc";
    const GREETING_URI: &str = "http://registry.local/avro/greeting.v1.avsc";

    #[test]
    fn test_template_expand() {
        let template = UriTemplate::parse(URI_FORMAT).unwrap();
        assert_eq!(template.expand("push.apns.v1"), "http://registry.local/avro/push.apns.v1.avsc");
        assert_eq!(template.to_string(), "http://registry.local/avro/{}.avsc");

        let bare = UriTemplate::parse("http://registry.local/{}").unwrap();
        assert_eq!(bare.expand("a"), "http://registry.local/a");
    }

    #[test]
    fn test_template_encodes_type_name() {
        let template = UriTemplate::parse(URI_FORMAT).unwrap();
        assert_eq!(
            template.expand("push apns#v1?x=1"),
            "http://registry.local/avro/push%20apns%23v1%3Fx%3D1.avsc"
        );
        assert_eq!(template.expand("../secret"), "http://registry.local/avro/..%2Fsecret.avsc");
    }

    #[tokio::test]
    async fn test_resolve_fetches_encoded_uri() {
        let encoded_uri = "http://registry.local/avro/greeting%23v1.avsc";
        let fetcher = Arc::new(StubFetcher::default().with(encoded_uri, Ok(r#""string""#)));
        let resolver = RemoteResolver::new(URI_FORMAT, fetcher.clone()).unwrap();

        let schema = resolver.resolve("greeting#v1").await.unwrap();
        assert_eq!(schema.type_name(), "greeting#v1");
        assert_eq!(fetcher.calls(), 1);
    }

    #[test]
    fn test_template_rejects_bad_formats() {
        let formats = [
            "",
            "   ",
            "http://registry.local/schema.avsc",
            "http://r/{}/{0}",
            "http://r/{}/{}",
        ];
        for format in formats {
            let err = UriTemplate::parse(format).unwrap_err();
            assert!(matches!(err, SchemaError::Configuration(_)), "accepted {:?}", format);
        }
    }

    #[tokio::test]
    async fn test_resolve_caches_schema() {
        let fetcher = Arc::new(
            StubFetcher::default().with(GREETING_URI, Ok(r#""string""#)),
        );
        let resolver = RemoteResolver::new(URI_FORMAT, fetcher.clone()).unwrap();

        let first = resolver.resolve("greeting.v1").await.unwrap();
        let second = resolver.resolve("greeting.v1").await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_fetch_error() {
        let fetcher = Arc::new(StubFetcher::default().with(GREETING_URI, Err(500)));
        let resolver = RemoteResolver::new(URI_FORMAT, fetcher.clone()).unwrap();

        let err = resolver.resolve("greeting.v1").await.unwrap_err();
        match err {
            SchemaError::SchemaFetch { uri, status, .. } => {
                assert_eq!(uri, GREETING_URI);
                assert_eq!(status, Some(500));
            }
            other => panic!("Expected SchemaFetch, got {:?}", other),
        }

        // Failures are retried on the next lookup
        resolver.resolve("greeting.v1").await.unwrap_err();
        assert_eq!(fetcher.calls(), 2);
        assert!(resolver.cache().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_is_fetch_error() {
        let resolver = RemoteResolver::new(URI_FORMAT, Arc::new(StubFetcher::default())).unwrap();
        let err = resolver.resolve("greeting.v1").await.unwrap_err();
        assert!(matches!(err, SchemaError::SchemaFetch { status: None, .. }));
    }

    #[tokio::test]
    async fn test_unparseable_body_is_not_found() {
        let fetcher = Arc::new(
            StubFetcher::default().with(GREETING_URI, Ok("<html>oops</html>")),
        );
        let resolver = RemoteResolver::new(URI_FORMAT, fetcher).unwrap();
        let err = resolver.resolve("greeting.v1").await.unwrap_err();
        assert!(matches!(err, SchemaError::SchemaNotFound { .. }));
    }
}
