//! Message Handler
//!
//! Dispatches on a message's content type. Avro datums are decoded with
//! the schema named by the message's type; JSON bodies are parsed as-is;
//! everything else is rejected. Publishing runs the inverse path.
//!
//! Every failure leaves the handler as a [`ProcessingError`], which the
//! hosting consumer turns into its own retry or dead-letter decision.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::codec::DatumCodec;
use crate::config::ConsumerConfig;
use crate::error::{ProcessingError, Result, SchemaError};
use crate::resolver::{self, SchemaResolver};
use crate::schema::Schema;

/// Content type of a binary Avro datum
pub const AVRO_DATUM_CONTENT_TYPE: &str = "application/vnd.apache.avro.datum";

/// Content type of a JSON document
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Content types the handler distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    AvroDatum,
    Json,
    Other(String),
}

impl ContentType {
    /// Classify a content-type header value.
    ///
    /// Only the media type is compared, case-insensitively; parameters such
    /// as `charset` are ignored.
    pub fn parse(value: &str) -> Self {
        let essence = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        match essence.as_str() {
            AVRO_DATUM_CONTENT_TYPE => ContentType::AvroDatum,
            JSON_CONTENT_TYPE => ContentType::Json,
            _ => ContentType::Other(value.to_string()),
        }
    }

    fn of(value: Option<&str>) -> Option<Self> {
        value.map(Self::parse)
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentType::AvroDatum => f.write_str(AVRO_DATUM_CONTENT_TYPE),
            ContentType::Json => f.write_str(JSON_CONTENT_TYPE),
            ContentType::Other(other) => f.write_str(other),
        }
    }
}

/// An inbound message as delivered by the hosting consumer
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub content_type: Option<String>,
    /// Application type name selecting the schema, e.g. `push.apns.v1`
    pub type_name: Option<String>,
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
}

impl Message {
    /// An Avro datum message of `type_name`
    pub fn avro(type_name: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: Some(AVRO_DATUM_CONTENT_TYPE.to_string()),
            type_name: Some(type_name.into()),
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// A JSON message
    pub fn json(body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
            type_name: None,
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Properties attached to an outbound message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    pub content_type: Option<String>,
    pub type_name: Option<String>,
    pub headers: HashMap<String, String>,
}

impl Properties {
    /// Properties requesting Avro encoding as `type_name`
    pub fn avro(type_name: impl Into<String>) -> Self {
        Self {
            content_type: Some(AVRO_DATUM_CONTENT_TYPE.to_string()),
            type_name: Some(type_name.into()),
            headers: HashMap::new(),
        }
    }

    pub fn json() -> Self {
        Self {
            content_type: Some(JSON_CONTENT_TYPE.to_string()),
            ..Default::default()
        }
    }
}

/// Body of an outbound message
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    /// Encoded Avro datum
    Avro(Vec<u8>),
    /// The caller's value, unchanged
    Passthrough(Value),
}

/// A message ready to hand to the transport
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    pub exchange: String,
    pub routing_key: String,
    pub properties: Option<Properties>,
    pub body: OutboundBody,
}

/// Decodes inbound messages and encodes outbound ones
pub struct MessageHandler {
    resolver: Arc<dyn SchemaResolver>,
    codec: DatumCodec,
}

impl MessageHandler {
    pub fn new(resolver: Arc<dyn SchemaResolver>) -> Self {
        Self {
            resolver,
            codec: DatumCodec::new(),
        }
    }

    /// Create a handler with the resolver selected by `config`.
    ///
    /// Configuration errors are returned here, before any message is seen.
    pub fn from_config(config: &ConsumerConfig) -> Result<Self> {
        Ok(Self::new(resolver::from_config(config)?))
    }

    pub fn resolver(&self) -> &Arc<dyn SchemaResolver> {
        &self.resolver
    }

    /// Decode an inbound message into a structured value
    pub async fn decode(&self, message: &Message) -> std::result::Result<Value, ProcessingError> {
        self.decode_body(message).await.map_err(|e| {
            tracing::warn!(
                content_type = message.content_type.as_deref().unwrap_or("<none>"),
                type_name = message.type_name.as_deref().unwrap_or("<none>"),
                kind = ?e.kind(),
                error = %e,
                "failed to decode message"
            );
            ProcessingError::from(e)
        })
    }

    /// Prepare an outbound message.
    ///
    /// Values are Avro-encoded only when `properties` ask for the Avro datum
    /// content type; otherwise the value is passed through unchanged.
    pub async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        properties: Option<Properties>,
        value: Value,
    ) -> std::result::Result<OutboundMessage, ProcessingError> {
        let content_type = properties
            .as_ref()
            .and_then(|props| ContentType::of(props.content_type.as_deref()));
        let body = match &properties {
            Some(props) if content_type == Some(ContentType::AvroDatum) => {
                let bytes = self.encode_body(props, &value).await.map_err(|e| {
                    tracing::warn!(
                        exchange,
                        routing_key,
                        type_name = props.type_name.as_deref().unwrap_or("<none>"),
                        kind = ?e.kind(),
                        error = %e,
                        "failed to encode message"
                    );
                    ProcessingError::from(e)
                })?;
                OutboundBody::Avro(bytes)
            }
            _ => OutboundBody::Passthrough(value),
        };

        Ok(OutboundMessage {
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
            properties,
            body,
        })
    }

    async fn decode_body(&self, message: &Message) -> Result<Value> {
        match ContentType::of(message.content_type.as_deref()) {
            Some(ContentType::AvroDatum) => {
                let schema = self.schema_for(message.type_name.as_deref()).await?;
                self.codec.decode(&message.body, &schema)
            }
            Some(ContentType::Json) => Ok(serde_json::from_slice(&message.body)?),
            Some(ContentType::Other(other)) => Err(SchemaError::UnsupportedContentType(other)),
            None => Err(SchemaError::UnsupportedContentType("<none>".to_string())),
        }
    }

    async fn encode_body(&self, properties: &Properties, value: &Value) -> Result<Vec<u8>> {
        let schema = self.schema_for(properties.type_name.as_deref()).await?;
        self.codec.encode(value, &schema)
    }

    async fn schema_for(&self, type_name: Option<&str>) -> Result<Arc<Schema>> {
        match type_name.map(str::trim).filter(|t| !t.is_empty()) {
            Some(type_name) => self.resolver.resolve(type_name).await,
            None => Err(SchemaError::UnroutableMessage {
                content_type: AVRO_DATUM_CONTENT_TYPE.to_string(),
            }),
        }
    }
}
