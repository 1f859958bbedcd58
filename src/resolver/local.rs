//! Local schema resolution from a directory of `.avsc` files

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::SchemaCache;
use crate::error::{Result, SchemaError};
use crate::schema::Schema;

use super::SchemaResolver;

/// Resolves schemas from `{root}/{type_name}.avsc`
#[derive(Debug)]
pub struct LocalResolver {
    root: PathBuf,
    cache: SchemaCache,
}

impl LocalResolver {
    /// Create a resolver rooted at `path`.
    ///
    /// The directory must exist and be readable when the resolver is
    /// created; schema files themselves are read on first use.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref();
        if root.as_os_str().is_empty() {
            return Err(SchemaError::Configuration("schema_path is not set".to_string()));
        }

        let metadata = fs::metadata(root).map_err(|e| {
            SchemaError::Configuration(format!(
                "schema_path {} is not accessible: {}",
                root.display(),
                e
            ))
        })?;
        if !metadata.is_dir() {
            return Err(SchemaError::Configuration(format!(
                "schema_path {} is not a directory",
                root.display()
            )));
        }
        fs::read_dir(root).map_err(|e| {
            SchemaError::Configuration(format!(
                "schema_path {} is not readable: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            root: root.to_path_buf(),
            cache: SchemaCache::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Synchronous resolution, for hosts without an async runtime
    pub fn resolve_blocking(&self, type_name: &str) -> Result<Arc<Schema>> {
        self.cache.get_or_resolve(type_name, |name| self.read_schema(name))
    }

    fn read_schema(&self, type_name: &str) -> Result<Schema> {
        let path = self.schema_file(type_name)?;
        let definition = fs::read_to_string(&path).map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::NotFound => format!("no schema file at {}", path.display()),
                _ => format!("failed to read {}: {}", path.display(), e),
            };
            SchemaError::not_found(type_name, reason)
        })?;

        let schema = Schema::parse(type_name, &definition)?;
        tracing::info!(
            type_name,
            path = %path.display(),
            checksum = schema.checksum().short(),
            "loaded schema"
        );
        Ok(schema)
    }

    /// Path of the schema file for `type_name`, refusing names that would
    /// leave the schema directory
    fn schema_file(&self, type_name: &str) -> Result<PathBuf> {
        let escapes = type_name.is_empty()
            || type_name.contains(['/', '\\'])
            || type_name.starts_with("..");
        if escapes {
            return Err(SchemaError::not_found(type_name, "invalid type name"));
        }
        Ok(self.root.join(Schema::filename(type_name)))
    }
}

#[async_trait]
impl SchemaResolver for LocalResolver {
    async fn resolve(&self, type_name: &str) -> Result<Arc<Schema>> {
        self.resolve_blocking(type_name)
    }

    fn cache(&self) -> &SchemaCache {
        &self.cache
    }
}
