//! Resolved schema type

use std::fmt;

use apache_avro::Schema as AvroSchema;

use crate::checksum::Checksum;
use crate::error::{Result, SchemaError};

/// File extension for Avro schema definitions
pub const SCHEMA_FILE_EXTENSION: &str = "avsc";

/// An immutable, parsed Avro schema keyed by its type name.
///
/// The type name is the application-level identifier carried in message
/// properties (e.g. `push.apns.v1`); it is not required to match the Avro
/// record's full name.
#[derive(Clone)]
pub struct Schema {
    type_name: String,
    inner: AvroSchema,
    raw: String,
    checksum: Checksum,
}

impl Schema {
    /// Parse a schema definition for `type_name`.
    ///
    /// A definition that is not a valid Avro schema is reported as
    /// [`SchemaError::SchemaNotFound`]: from the consumer's point of view
    /// there is no usable schema for the type.
    pub fn parse(type_name: impl Into<String>, definition: &str) -> Result<Self> {
        let type_name = type_name.into();
        let inner = AvroSchema::parse_str(definition)
            .map_err(|e| SchemaError::not_found(&type_name, format!("malformed schema: {}", e)))?;
        let checksum = Checksum::of_schema(&inner);

        Ok(Self {
            type_name,
            inner,
            raw: definition.to_string(),
            checksum,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The parsed Avro schema
    pub fn avro(&self) -> &AvroSchema {
        &self.inner
    }

    /// The definition text this schema was parsed from
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Fingerprint of the parsing canonical form
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    pub fn canonical_form(&self) -> String {
        self.inner.canonical_form()
    }

    /// Full name of the top-level named type, if the schema has one
    pub fn full_name(&self) -> Option<String> {
        self.inner.name().map(|n| n.fullname(None))
    }

    /// Get the filename for this schema in a schema directory
    pub fn filename(type_name: &str) -> String {
        format!("{}.{}", type_name, SCHEMA_FILE_EXTENSION)
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("type_name", &self.type_name)
            .field("checksum", &self.checksum.short())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{
        "type": "record",
        "name": "Notification",
        "namespace": "push.apns",
        "fields": [{"name": "token", "type": "string"}]
    }"#;

    #[test]
    fn test_parse_record() {
        let schema = Schema::parse("push.apns.v1", RECORD).unwrap();
        assert_eq!(schema.type_name(), "push.apns.v1");
        assert_eq!(schema.full_name().as_deref(), Some("push.apns.Notification"));
        assert_eq!(schema.raw(), RECORD);
        assert!(schema.canonical_form().contains("push.apns.Notification"));
    }

    #[test]
    fn test_malformed_definition_is_not_found() {
        let err = Schema::parse("push.apns.v1", "{\"type\": \"recor").unwrap_err();
        assert!(matches!(
            err,
            SchemaError::SchemaNotFound { ref type_name, .. } if type_name == "push.apns.v1"
        ));
    }

    #[test]
    fn test_filename() {
        assert_eq!(Schema::filename("push.apns.v1"), "push.apns.v1.avsc");
    }
}
