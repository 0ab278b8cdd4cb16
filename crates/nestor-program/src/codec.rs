use nestor_utils::error::ArgumentError;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::serializer::{StrictError, StrictSerializer};

/// Deepest container nesting an argument mapping may have.
///
/// serde_json's decoder refuses the 128th nested container, so anything deeper
/// would encode fine here and fail on the executor.
pub const MAX_ARGUMENT_DEPTH: usize = 127;

/// Arguments of a nested program: argument name to JSON value.
///
/// serde_json's `Map` keeps keys sorted, so two equal mappings always encode to
/// the same text.
pub type Arguments = Map<String, Value>;

/// Validation and wire encoding of nested program arguments.
pub struct ArgumentCodec;

impl ArgumentCodec {
    /// Check that every leaf of `arguments` survives transport.
    ///
    /// `serde_json::Value` already restricts leaves to the closed JSON set, so
    /// this walks the tree for the properties the type cannot express: finite
    /// numbers and bounded nesting.
    pub fn validate(arguments: &Arguments) -> Result<(), ArgumentError> {
        for (key, value) in arguments {
            check_value(value, key, 1)?;
        }
        Ok(())
    }

    /// Convert any serializable value into arguments.
    ///
    /// The value must serialize to a mapping (a struct, a map, or a
    /// `serde_json::Value::Object`). Leaves that would not survive a JSON round
    /// trip are rejected with the path of the first offender.
    pub fn to_arguments<T: ?Sized + Serialize>(value: &T) -> Result<Arguments, ArgumentError> {
        let root = StrictSerializer::root();
        match value.serialize(root).map_err(|e| e.at("$").0)? {
            Value::Object(map) => Ok(map),
            other => Err(ArgumentError::NotAMapping {
                found: kind(&other).to_string(),
            }),
        }
    }

    /// Convert one serializable value stored under `key`.
    pub fn to_value<T: ?Sized + Serialize>(key: &str, value: &T) -> Result<Value, ArgumentError> {
        let ser = StrictSerializer::argument(key);
        let path = ser.path().to_string();
        value
            .serialize(ser)
            .map_err(|e: StrictError| e.at(&path).0)
    }

    /// Encode arguments for the wire.
    ///
    /// Output is compact JSON with sorted keys. An empty mapping encodes as `{}`.
    pub fn encode(arguments: &Arguments) -> Result<String, ArgumentError> {
        Self::validate(arguments)?;
        serde_json::to_string(arguments).map_err(|e| ArgumentError::Encode(e.to_string()))
    }

    /// Decode arguments produced by [`encode`](Self::encode).
    pub fn decode(text: &str) -> Result<Arguments, ArgumentError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ArgumentError::Decode(e.to_string()))?;
        match value {
            Value::Object(map) => {
                Self::validate(&map)?;
                Ok(map)
            }
            other => Err(ArgumentError::NotAMapping {
                found: kind(&other).to_string(),
            }),
        }
    }
}

fn check_value(value: &Value, path: &str, depth: usize) -> Result<(), ArgumentError> {
    match value {
        Value::Number(n) => {
            if n.as_f64().is_some_and(|f| !f.is_finite()) {
                return Err(ArgumentError::NotSerializable {
                    path: path.to_string(),
                    reason: format!("non-finite number {n}"),
                });
            }
            Ok(())
        }
        Value::Array(items) => {
            enter(path, depth)?;
            for (index, item) in items.iter().enumerate() {
                check_value(item, &format!("{path}[{index}]"), depth + 1)?;
            }
            Ok(())
        }
        Value::Object(map) => {
            enter(path, depth)?;
            for (key, item) in map {
                check_value(item, &format!("{path}.{key}"), depth + 1)?;
            }
            Ok(())
        }
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
    }
}

fn enter(path: &str, depth: usize) -> Result<(), ArgumentError> {
    if depth >= MAX_ARGUMENT_DEPTH {
        return Err(ArgumentError::TooDeep {
            path: path.to_string(),
            limit: MAX_ARGUMENT_DEPTH,
        });
    }
    Ok(())
}

pub(crate) fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
