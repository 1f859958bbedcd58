//! Error types for schema resolution and datum coding

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema resolution, codec and routing errors
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Invalid consumer configuration. Raised only while constructing a
    /// resolver or handler, never while processing a message.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Schema not found: {type_name} ({reason})")]
    SchemaNotFound { type_name: String, reason: String },

    #[error("Schema fetch failed for {uri}: {reason}")]
    SchemaFetch {
        uri: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("Decode error for {type_name}: {reason}")]
    Decode { type_name: String, reason: String },

    #[error("Encode error for {type_name}: {reason}")]
    Encode { type_name: String, reason: String },

    #[error("Unroutable message: content type {content_type} requires a type name")]
    UnroutableMessage { content_type: String },

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Invalid message body: {0}")]
    InvalidBody(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn not_found(type_name: &str, reason: impl ToString) -> Self {
        SchemaError::SchemaNotFound {
            type_name: type_name.to_string(),
            reason: reason.to_string(),
        }
    }

    /// The coarse category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            SchemaError::Configuration(_) => ErrorKind::Configuration,
            SchemaError::SchemaNotFound { .. } => ErrorKind::SchemaNotFound,
            SchemaError::SchemaFetch { .. } => ErrorKind::SchemaFetch,
            SchemaError::Decode { .. } => ErrorKind::Decode,
            SchemaError::Encode { .. } => ErrorKind::Encode,
            SchemaError::UnroutableMessage { .. } => ErrorKind::UnroutableMessage,
            SchemaError::UnsupportedContentType(_) => ErrorKind::UnsupportedContentType,
            SchemaError::InvalidBody(_) => ErrorKind::InvalidBody,
        }
    }
}

/// Error categories, used by hosts to pick a retry or dead-letter policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    SchemaNotFound,
    SchemaFetch,
    Decode,
    Encode,
    UnroutableMessage,
    UnsupportedContentType,
    InvalidBody,
}

/// Failure to process a single message.
///
/// Every per-message error is re-signaled as this type at the handler
/// boundary, so the hosting consumer sees one failure class regardless of
/// which resolver or codec path produced it.
#[derive(Error, Debug)]
#[error("Message processing failed: {source}")]
pub struct ProcessingError {
    #[source]
    source: SchemaError,
}

impl ProcessingError {
    /// The underlying error
    pub fn cause(&self) -> &SchemaError {
        &self.source
    }

    /// Consume the wrapper and return the underlying error
    pub fn into_cause(self) -> SchemaError {
        self.source
    }

    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }

    /// Whether processing the same message again could succeed.
    ///
    /// Only registry fetch failures are transient; a missing schema, a bad
    /// payload or an unroutable message fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::SchemaFetch
    }
}

impl From<SchemaError> for ProcessingError {
    fn from(source: SchemaError) -> Self {
        Self { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_error_wraps_cause() {
        let err = ProcessingError::from(SchemaError::not_found("push.apns.v2", "no such file"));
        assert_eq!(err.kind(), ErrorKind::SchemaNotFound);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("push.apns.v2"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_only_fetch_errors_are_retryable() {
        let fetch = ProcessingError::from(SchemaError::SchemaFetch {
            uri: "http://registry/push.apns.v1".to_string(),
            status: Some(503),
            reason: "HTTP 503".to_string(),
        });
        assert!(fetch.is_retryable());

        let unroutable = ProcessingError::from(SchemaError::UnroutableMessage {
            content_type: "application/vnd.apache.avro.datum".to_string(),
        });
        assert!(!unroutable.is_retryable());
    }
}
