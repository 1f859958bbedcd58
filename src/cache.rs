//! Schema Cache
//!
//! Maps type names to resolved schemas for the lifetime of one resolver.
//! Entries are only ever added; removal happens through explicit
//! invalidation or a full reset.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::schema::Schema;

/// In-memory mapping from type name to parsed schema
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<Schema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a cached schema without resolving
    pub fn get(&self, type_name: &str) -> Option<Arc<Schema>> {
        self.entries.read().get(type_name).cloned()
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.read().contains_key(type_name)
    }

    /// Return the cached schema for `type_name`, calling `resolve` on a miss.
    ///
    /// A failed resolution is returned to the caller and not remembered, so
    /// the next lookup of the same name tries again.
    pub fn get_or_resolve<F>(&self, type_name: &str, resolve: F) -> Result<Arc<Schema>>
    where
        F: FnOnce(&str) -> Result<Schema>,
    {
        if let Some(schema) = self.get(type_name) {
            tracing::debug!(type_name, "schema cache hit");
            return Ok(schema);
        }

        tracing::debug!(type_name, "schema cache miss");
        let schema = resolve(type_name)?;
        Ok(self.store(type_name, schema))
    }

    /// Async form of [`get_or_resolve`](Self::get_or_resolve).
    ///
    /// The lock is not held while `resolve` is pending. Concurrent misses for
    /// the same name may therefore resolve more than once; the first stored
    /// schema is kept and handed to every caller.
    pub async fn get_or_resolve_async<F, Fut>(
        &self,
        type_name: &str,
        resolve: F,
    ) -> Result<Arc<Schema>>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<Schema>>,
    {
        if let Some(schema) = self.get(type_name) {
            tracing::debug!(type_name, "schema cache hit");
            return Ok(schema);
        }

        tracing::debug!(type_name, "schema cache miss");
        let schema = resolve(type_name.to_string()).await?;
        Ok(self.store(type_name, schema))
    }

    /// Drop one entry; the next lookup resolves it again
    pub fn invalidate(&self, type_name: &str) -> bool {
        self.entries.write().remove(type_name).is_some()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn store(&self, type_name: &str, schema: Schema) -> Arc<Schema> {
        let mut entries = self.entries.write();
        entries
            .entry(type_name.to_string())
            .or_insert_with(|| Arc::new(schema))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn string_schema(type_name: &str) -> Result<Schema> {
        Schema::parse(type_name, r#""string""#)
    }

    #[test]
    fn test_hit_returns_same_schema() {
        let cache = SchemaCache::new();
        let calls = Cell::new(0);
        let resolve = |name: &str| {
            calls.set(calls.get() + 1);
            string_schema(name)
        };

        let first = cache.get_or_resolve("greeting.v1", resolve).unwrap();
        let second = cache.get_or_resolve("greeting.v1", resolve).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let cache = SchemaCache::new();
        let err = cache
            .get_or_resolve("greeting.v1", |name| Err(SchemaError::not_found(name, "offline")))
            .unwrap_err();
        assert!(matches!(err, SchemaError::SchemaNotFound { .. }));
        assert!(cache.is_empty());

        let schema = cache.get_or_resolve("greeting.v1", string_schema).unwrap();
        assert_eq!(schema.type_name(), "greeting.v1");
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = SchemaCache::new();
        cache.get_or_resolve("a", string_schema).unwrap();
        cache.get_or_resolve("b", string_schema).unwrap();

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert!(!cache.contains("a"));
        assert!(cache.contains("b"));

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_first_stored_schema_wins() {
        let cache = SchemaCache::new();
        let first = cache.store("a", string_schema("a").unwrap());
        let second = cache.store("a", Schema::parse("a", r#""long""#).unwrap());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.canonical_form(), r#""string""#);
    }

    #[tokio::test]
    async fn test_async_resolution_is_cached() {
        let cache = SchemaCache::new();
        let calls = AtomicUsize::new(0);
        let resolve = |name: String| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { string_schema(&name) }
        };

        let first = cache.get_or_resolve_async("a", resolve).await.unwrap();
        let second = cache.get_or_resolve_async("a", resolve).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
