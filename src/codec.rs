//! Avro datum codec
//!
//! Converts between raw Avro datums (no container header, no embedded
//! schema) and JSON values. The schema always comes from the caller.
//!
//! ## JSON mapping
//!
//! | Avro                       | JSON                                  |
//! |----------------------------|---------------------------------------|
//! | `int`, `long`, `date`, ... | integer, range-checked on encode      |
//! | `float`, `double`          | number                                |
//! | `bytes`, `fixed`, `decimal`| base64 string (standard alphabet)     |
//! | `enum`                     | symbol string                         |
//! | `uuid`                     | string                                |
//! | union                      | the branch value, unwrapped           |
//! | record, map                | object                                |
//!
//! The mapping is symmetric: anything `decode` produces, `encode` accepts
//! and writes back to the same bytes.

use std::collections::HashMap;

use apache_avro::schema::{Name, ResolvedSchema, Schema as AvroSchema};
use apache_avro::{from_avro_datum, to_avro_datum, types::Value as AvroValue, Decimal};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::{Result, SchemaError};
use crate::schema::Schema;

type Names<'s> = HashMap<Name, &'s AvroSchema>;
type Conversion<T> = std::result::Result<T, String>;

/// Stateless datum encoder/decoder
#[derive(Debug, Clone, Copy, Default)]
pub struct DatumCodec;

impl DatumCodec {
    pub fn new() -> Self {
        Self
    }

    /// Decode one datum written with `schema`.
    ///
    /// Truncated input, bytes that do not conform to the schema, and bytes
    /// left over after the datum are all decode errors.
    pub fn decode(&self, payload: &[u8], schema: &Schema) -> Result<JsonValue> {
        let decode_error = |reason: String| SchemaError::Decode {
            type_name: schema.type_name().to_string(),
            reason,
        };

        let mut reader = payload;
        let value = from_avro_datum(schema.avro(), &mut reader, None)
            .map_err(|e| decode_error(e.to_string()))?;
        if !reader.is_empty() {
            return Err(decode_error(format!("{} trailing bytes after datum", reader.len())));
        }

        avro_to_json(value).map_err(decode_error)
    }

    /// Encode `value` as a datum of `schema`.
    ///
    /// Absent record fields take their declared defaults and a union takes
    /// the first branch the value fits. Numbers outside the range of the
    /// declared type are rejected, never truncated.
    pub fn encode(&self, value: &JsonValue, schema: &Schema) -> Result<Vec<u8>> {
        let encode_error = |reason: String| SchemaError::Encode {
            type_name: schema.type_name().to_string(),
            reason,
        };

        let resolved =
            ResolvedSchema::try_from(schema.avro()).map_err(|e| encode_error(e.to_string()))?;
        let avro = json_to_avro(value, schema.avro(), resolved.get_names()).map_err(encode_error)?;
        to_avro_datum(schema.avro(), avro).map_err(|e| encode_error(e.to_string()))
    }
}

fn json_to_avro(json: &JsonValue, schema: &AvroSchema, names: &Names<'_>) -> Conversion<AvroValue> {
    match (schema, json) {
        (AvroSchema::Ref { name }, _) => {
            let named = names
                .get(name)
                .ok_or_else(|| format!("unknown named type {}", name.fullname(None)))?;
            json_to_avro(json, named, names)
        }

        (AvroSchema::Null, JsonValue::Null) => Ok(AvroValue::Null),
        (AvroSchema::Boolean, JsonValue::Bool(b)) => Ok(AvroValue::Boolean(*b)),
        (AvroSchema::Int, JsonValue::Number(n)) => Ok(AvroValue::Int(to_i32(n)?)),
        (AvroSchema::Long, JsonValue::Number(n)) => Ok(AvroValue::Long(to_i64(n)?)),
        (AvroSchema::Float, JsonValue::Number(n)) => {
            let f = to_f64(n)?;
            let narrowed = f as f32;
            if f.is_finite() && !narrowed.is_finite() {
                return Err(format!("{} is out of float range", n));
            }
            Ok(AvroValue::Float(narrowed))
        }
        (AvroSchema::Double, JsonValue::Number(n)) => Ok(AvroValue::Double(to_f64(n)?)),
        (AvroSchema::String, JsonValue::String(s)) => Ok(AvroValue::String(s.clone())),
        (AvroSchema::Bytes, JsonValue::String(s)) => Ok(AvroValue::Bytes(from_base64(s)?)),

        (AvroSchema::Fixed(fixed), JsonValue::String(s)) => {
            let bytes = from_base64(s)?;
            if bytes.len() != fixed.size {
                return Err(format!(
                    "fixed size mismatch: expected {}, got {}",
                    fixed.size,
                    bytes.len()
                ));
            }
            Ok(AvroValue::Fixed(fixed.size, bytes))
        }

        (AvroSchema::Decimal(decimal), JsonValue::String(s)) => {
            let bytes = from_base64(s)?;
            if let AvroSchema::Fixed(fixed) = decimal.inner.as_ref() {
                if bytes.len() != fixed.size {
                    return Err(format!(
                        "decimal size mismatch: expected {}, got {}",
                        fixed.size,
                        bytes.len()
                    ));
                }
            }
            Ok(AvroValue::Decimal(Decimal::from(bytes)))
        }

        (AvroSchema::Enum(enum_schema), JsonValue::String(s)) => enum_schema
            .symbols
            .iter()
            .position(|symbol| symbol == s)
            .map(|pos| AvroValue::Enum(pos as u32, s.clone()))
            .ok_or_else(|| format!("invalid enum symbol: {}", s)),

        (AvroSchema::Array(items), JsonValue::Array(arr)) => arr
            .iter()
            .map(|item| json_to_avro(item, items, names))
            .collect::<Conversion<Vec<_>>>()
            .map(AvroValue::Array),

        (AvroSchema::Map(values), JsonValue::Object(obj)) => {
            let mut map = HashMap::with_capacity(obj.len());
            for (key, value) in obj {
                let converted =
                    json_to_avro(value, values, names).map_err(|e| format!("{}: {}", key, e))?;
                map.insert(key.clone(), converted);
            }
            Ok(AvroValue::Map(map))
        }

        (AvroSchema::Union(union_schema), _) => union_schema
            .variants()
            .iter()
            .enumerate()
            .find_map(|(idx, variant)| {
                json_to_avro(json, variant, names)
                    .ok()
                    .map(|v| AvroValue::Union(idx as u32, Box::new(v)))
            })
            .ok_or_else(|| format!("no union branch matches {}", json)),

        (AvroSchema::Record(record), JsonValue::Object(obj)) => {
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let value = match (obj.get(&field.name), &field.default) {
                    (Some(value), _) | (None, Some(value)) => {
                        json_to_avro(value, &field.schema, names)
                            .map_err(|e| format!("{}: {}", field.name, e))?
                    }
                    (None, None) => return Err(format!("missing required field: {}", field.name)),
                };
                fields.push((field.name.clone(), value));
            }
            Ok(AvroValue::Record(fields))
        }

        (AvroSchema::Uuid, JsonValue::String(s)) => AvroValue::String(s.clone())
            .resolve(schema)
            .map_err(|e| e.to_string()),
        (AvroSchema::Date, JsonValue::Number(n)) => Ok(AvroValue::Date(to_i32(n)?)),
        (AvroSchema::TimeMillis, JsonValue::Number(n)) => Ok(AvroValue::TimeMillis(to_i32(n)?)),
        (AvroSchema::TimeMicros, JsonValue::Number(n)) => Ok(AvroValue::TimeMicros(to_i64(n)?)),
        (AvroSchema::TimestampMillis, JsonValue::Number(n)) => {
            Ok(AvroValue::TimestampMillis(to_i64(n)?))
        }
        (AvroSchema::TimestampMicros, JsonValue::Number(n)) => {
            Ok(AvroValue::TimestampMicros(to_i64(n)?))
        }

        (_, _) if is_primary(schema) => {
            Err(format!("expected {}, got {}", schema.canonical_form(), json))
        },

        // Remaining logical types (local timestamps, duration)
        (_, JsonValue::Number(n)) => {
            to_i64(n)?;
            AvroValue::from(json.clone()).resolve(schema).map_err(|e| e.to_string())
        }
        _ => AvroValue::from(json.clone()).resolve(schema).map_err(|e| e.to_string()),
    }
}

/// Schema kinds with a dedicated JSON mapping above
fn is_primary(schema: &AvroSchema) -> bool {
    matches!(
        schema,
        AvroSchema::Null
            | AvroSchema::Boolean
            | AvroSchema::Int
            | AvroSchema::Long
            | AvroSchema::Float
            | AvroSchema::Double
            | AvroSchema::String
            | AvroSchema::Bytes
            | AvroSchema::Fixed(_)
            | AvroSchema::Decimal(_)
            | AvroSchema::Enum(_)
            | AvroSchema::Array(_)
            | AvroSchema::Map(_)
            | AvroSchema::Record(_)
            | AvroSchema::Uuid
            | AvroSchema::Date
            | AvroSchema::TimeMillis
            | AvroSchema::TimeMicros
            | AvroSchema::TimestampMillis
            | AvroSchema::TimestampMicros
    )
}

fn avro_to_json(value: AvroValue) -> Conversion<JsonValue> {
    match value {
        AvroValue::Null => Ok(JsonValue::Null),
        AvroValue::Boolean(b) => Ok(JsonValue::Bool(b)),
        AvroValue::Int(i) | AvroValue::Date(i) | AvroValue::TimeMillis(i) => Ok(i.into()),
        AvroValue::Long(l)
        | AvroValue::TimeMicros(l)
        | AvroValue::TimestampMillis(l)
        | AvroValue::TimestampMicros(l) => Ok(l.into()),
        AvroValue::Float(f) => finite(f64::from(f)),
        AvroValue::Double(d) => finite(d),
        AvroValue::String(s) | AvroValue::Enum(_, s) => Ok(JsonValue::String(s)),
        AvroValue::Bytes(bytes) | AvroValue::Fixed(_, bytes) => {
            Ok(JsonValue::String(STANDARD.encode(bytes)))
        }
        AvroValue::Decimal(decimal) => {
            let bytes = Vec::<u8>::try_from(&decimal).map_err(|e| e.to_string())?;
            Ok(JsonValue::String(STANDARD.encode(bytes)))
        }
        AvroValue::Uuid(uuid) => Ok(JsonValue::String(uuid.to_string())),
        AvroValue::Union(_, inner) => avro_to_json(*inner),
        AvroValue::Array(items) => items
            .into_iter()
            .map(avro_to_json)
            .collect::<Conversion<Vec<_>>>()
            .map(JsonValue::Array),
        AvroValue::Map(entries) => entries
            .into_iter()
            .map(|(k, v)| avro_to_json(v).map(|v| (k, v)))
            .collect::<Conversion<Map<_, _>>>()
            .map(JsonValue::Object),
        AvroValue::Record(fields) => fields
            .into_iter()
            .map(|(k, v)| avro_to_json(v).map(|v| (k, v)))
            .collect::<Conversion<Map<_, _>>>()
            .map(JsonValue::Object),
        other => JsonValue::try_from(other).map_err(|e| e.to_string()),
    }
}

fn to_i64(n: &Number) -> Conversion<i64> {
    n.as_i64().ok_or_else(|| format!("{} is not a 64-bit integer", n))
}

fn to_i32(n: &Number) -> Conversion<i32> {
    let i = to_i64(n)?;
    i32::try_from(i).map_err(|_| format!("{} is out of int range", i))
}

fn to_f64(n: &Number) -> Conversion<f64> {
    n.as_f64().ok_or_else(|| format!("{} is not a number", n))
}

fn finite(f: f64) -> Conversion<JsonValue> {
    Number::from_f64(f)
        .map(JsonValue::Number)
        .ok_or_else(|| format!("{} has no JSON representation", f))
}

fn from_base64(s: &str) -> Conversion<Vec<u8>> {
    STANDARD.decode(s).map_err(|e| format!("invalid base64: {}", e))
}
