//! Conversion between `serde_json` values and Firestore's typed values.

use super::models::{ArrayValue, MapValue, Value, ValueType};
use super::FirestoreError;
use serde::de::Error as _;
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::HashMap;

pub(crate) fn fields_to_json(fields: HashMap<String, Value>) -> Result<JsonValue, FirestoreError> {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert(key, value_to_json(value)?);
    }
    Ok(JsonValue::Object(map))
}

pub(crate) fn value_to_json(value: Value) -> Result<JsonValue, FirestoreError> {
    Ok(match value.value_type {
        ValueType::StringValue(s)
        | ValueType::TimestampValue(s)
        | ValueType::BytesValue(s)
        | ValueType::ReferenceValue(s) => JsonValue::String(s),
        ValueType::IntegerValue(s) => {
            let i: i64 = s.parse().map_err(|e| {
                serde_json::Error::custom(format!("invalid integer value '{}': {}", s, e))
            })?;
            JsonValue::from(i)
        }
        ValueType::DoubleValue(d) => serde_json::Number::from_f64(d)
            .map(JsonValue::Number)
            .ok_or_else(|| serde_json::Error::custom(format!("non-finite double value: {}", d)))?,
        ValueType::BooleanValue(b) => JsonValue::Bool(b),
        ValueType::MapValue(map) => fields_to_json(map.fields)?,
        ValueType::ArrayValue(array) => JsonValue::Array(
            array
                .values
                .into_iter()
                .map(value_to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        ValueType::NullValue(()) => JsonValue::Null,
        ValueType::GeoPointValue(gp) => json!({ "latitude": gp.latitude, "longitude": gp.longitude }),
    })
}

/// Encodes a serializable struct or map as document fields.
pub(crate) fn to_fields<T: Serialize + ?Sized>(
    value: &T,
) -> Result<HashMap<String, Value>, FirestoreError> {
    match serde_json::to_value(value)? {
        JsonValue::Object(map) => map
            .into_iter()
            .map(|(k, v)| json_to_value(v).map(|v| (k, v)))
            .collect(),
        other => Err(FirestoreError::SerializationError(serde_json::Error::custom(
            format!("documents must serialize to an object, got {}", other),
        ))),
    }
}

pub(crate) fn json_to_value(value: JsonValue) -> Result<Value, FirestoreError> {
    let value_type = match value {
        JsonValue::Null => ValueType::NullValue(()),
        JsonValue::Bool(b) => ValueType::BooleanValue(b),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                ValueType::IntegerValue(i.to_string())
            } else if n.is_u64() {
                // Firestore integers are signed 64-bit.
                return Err(FirestoreError::SerializationError(serde_json::Error::custom(
                    format!("integer {} does not fit in a signed 64-bit integer", n),
                )));
            } else if let Some(f) = n.as_f64() {
                ValueType::DoubleValue(f)
            } else {
                return Err(FirestoreError::SerializationError(serde_json::Error::custom(
                    format!("unsupported number: {}", n),
                )));
            }
        }
        JsonValue::String(s) => ValueType::StringValue(s),
        JsonValue::Array(items) => ValueType::ArrayValue(ArrayValue {
            values: items
                .into_iter()
                .map(json_to_value)
                .collect::<Result<Vec<_>, _>>()?,
        }),
        JsonValue::Object(map) => ValueType::MapValue(MapValue {
            fields: map
                .into_iter()
                .map(|(k, v)| json_to_value(v).map(|v| (k, v)))
                .collect::<Result<HashMap<_, _>, _>>()?,
        }),
    };
    Ok(Value { value_type })
}
