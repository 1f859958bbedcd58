//! Avro Consumer
//!
//! Schema-resolving Avro datum codec for message consumers. Given a
//! message's content type and declared type name, resolves the schema,
//! decodes the payload into a JSON value, and encodes values back into
//! datums for publishing.
//!
//! ## Features
//!
//! - **Local Schemas**: `{schema_path}/{type_name}.avsc`, read on first use
//! - **Remote Schemas**: fetched from a URI template, async or blocking HTTP
//! - **Per-Resolver Cache**: each type name is resolved once; failures are retried
//! - **Uniform Failures**: every per-message error surfaces as [`ProcessingError`]
//!
//! ## Architecture
//!
//! ```text
//! Message ──► MessageHandler ──► SchemaResolver ──► SchemaCache
//!                  │              (Local | Remote)      │ miss
//!                  │                                    ▼
//!                  │                          .avsc file / HTTP GET
//!                  ▼
//!             DatumCodec ──► serde_json::Value
//! ```

pub mod cache;
pub mod checksum;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod resolver;
pub mod schema;

pub use cache::SchemaCache;
pub use checksum::Checksum;
pub use codec::DatumCodec;
pub use config::{ConsumerConfig, FetchMode, HttpConfig, ResolverSettings};
pub use error::{ErrorKind, ProcessingError, Result, SchemaError};
pub use handler::{
    ContentType, Message, MessageHandler, OutboundBody, OutboundMessage, Properties,
    AVRO_DATUM_CONTENT_TYPE, JSON_CONTENT_TYPE,
};
pub use resolver::{
    AsyncHttpFetcher, BlockingHttpFetcher, FetchError, LocalResolver, RemoteResolver,
    SchemaFetcher, SchemaResolver, UriTemplate,
};
pub use schema::Schema;
