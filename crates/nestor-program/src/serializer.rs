//! Strict `serde::Serializer` producing transport-safe argument values.
//!
//! `serde_json::to_value` quietly turns NaN into `null` and byte buffers into
//! arrays of integers. Neither survives a round trip unchanged, so this
//! serializer rejects them instead, along with non-string map keys, integers
//! outside the 64-bit range and over-deep nesting.

use std::fmt;

use nestor_utils::error::ArgumentError;
use serde::ser::{self, Serialize};
use serde_json::{Map, Number, Value};

use crate::codec::MAX_ARGUMENT_DEPTH;

#[derive(Debug)]
pub(crate) struct StrictError(pub(crate) ArgumentError);

impl StrictError {
    fn not_serializable(path: &str, reason: impl Into<String>) -> Self {
        Self(ArgumentError::NotSerializable {
            path: path.to_string(),
            reason: reason.into(),
        })
    }

    /// Errors raised through `ser::Error::custom` carry no path; fill it in
    /// from the innermost location that observed them.
    pub(crate) fn at(self, path: &str) -> Self {
        match self.0 {
            ArgumentError::NotSerializable { path: p, reason } if p.is_empty() => {
                Self::not_serializable(path, reason)
            }
            other => Self(other),
        }
    }
}

impl fmt::Display for StrictError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for StrictError {}

impl ser::Error for StrictError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Self::not_serializable("", msg.to_string())
    }
}

/// Serializer for one value at `path`, `depth` containers below the root.
#[derive(Clone)]
pub(crate) struct StrictSerializer {
    path: String,
    depth: usize,
}

impl StrictSerializer {
    pub(crate) fn root() -> Self {
        Self {
            path: String::new(),
            depth: 0,
        }
    }

    pub(crate) fn path(&self) -> &str {
        if self.path.is_empty() { "$" } else { &self.path }
    }

    /// Serializer for the value stored under `key` of the top-level mapping.
    pub(crate) fn argument(key: &str) -> Self {
        Self::root().key(key)
    }

    fn key(&self, key: &str) -> Self {
        let path = if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{key}", self.path)
        };
        Self {
            path,
            depth: self.depth + 1,
        }
    }

    fn index(&self, index: usize) -> Self {
        Self {
            path: format!("{}[{index}]", self.path),
            depth: self.depth + 1,
        }
    }

    fn enter(&self) -> Result<(), StrictError> {
        if self.depth >= MAX_ARGUMENT_DEPTH {
            return Err(StrictError(ArgumentError::TooDeep {
                path: self.path().to_string(),
                limit: MAX_ARGUMENT_DEPTH,
            }));
        }
        Ok(())
    }

    fn serialize_child<T: ?Sized + Serialize>(
        child: Self,
        value: &T,
    ) -> Result<Value, StrictError> {
        let path = child.path().to_string();
        value.serialize(child).map_err(|e| e.at(&path))
    }

    fn integer_i128(&self, v: i128) -> Result<Value, StrictError> {
        if let Ok(small) = i64::try_from(v) {
            Ok(Value::Number(small.into()))
        } else if let Ok(unsigned) = u64::try_from(v) {
            Ok(Value::Number(unsigned.into()))
        } else {
            Err(StrictError::not_serializable(
                self.path(),
                format!("integer {v} is outside the 64-bit range JSON numbers carry"),
            ))
        }
    }

    fn float(&self, v: f64) -> Result<Value, StrictError> {
        Number::from_f64(v).map(Value::Number).ok_or_else(|| {
            StrictError::not_serializable(self.path(), format!("non-finite float {v}"))
        })
    }
}

impl ser::Serializer for StrictSerializer {
    type Ok = Value;
    type Error = StrictError;

    type SerializeSeq = SeqCollector;
    type SerializeTuple = SeqCollector;
    type SerializeTupleStruct = SeqCollector;
    type SerializeTupleVariant = SeqCollector;
    type SerializeMap = MapCollector;
    type SerializeStruct = MapCollector;
    type SerializeStructVariant = MapCollector;

    fn serialize_bool(self, v: bool) -> Result<Value, StrictError> {
        Ok(Value::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Value, StrictError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<Value, StrictError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<Value, StrictError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<Value, StrictError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_i128(self, v: i128) -> Result<Value, StrictError> {
        self.integer_i128(v)
    }

    fn serialize_u8(self, v: u8) -> Result<Value, StrictError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<Value, StrictError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<Value, StrictError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<Value, StrictError> {
        Ok(Value::Number(v.into()))
    }

    fn serialize_u128(self, v: u128) -> Result<Value, StrictError> {
        match u64::try_from(v) {
            Ok(small) => Ok(Value::Number(small.into())),
            Err(_) => Err(StrictError::not_serializable(
                self.path(),
                format!("integer {v} is outside the 64-bit range JSON numbers carry"),
            )),
        }
    }

    fn serialize_f32(self, v: f32) -> Result<Value, StrictError> {
        self.float(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Value, StrictError> {
        self.float(v)
    }

    fn serialize_char(self, v: char) -> Result<Value, StrictError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Value, StrictError> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Value, StrictError> {
        Err(StrictError::not_serializable(
            self.path(),
            format!(
                "raw byte buffer of {} bytes is not a JSON value; convert it to a list or encode it as a string",
                v.len()
            ),
        ))
    }

    fn serialize_none(self) -> Result<Value, StrictError> {
        Ok(Value::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Value, StrictError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Value, StrictError> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Value, StrictError> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<Value, StrictError> {
        Ok(Value::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Value, StrictError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Value, StrictError> {
        self.enter()?;
        let inner = Self::serialize_child(self.key(variant), value)?;
        let mut map = Map::new();
        map.insert(variant.to_string(), inner);
        Ok(Value::Object(map))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqCollector, StrictError> {
        self.enter()?;
        Ok(SeqCollector {
            items: Vec::with_capacity(len.unwrap_or(0)),
            variant: None,
            ser: self,
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqCollector, StrictError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqCollector, StrictError> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<SeqCollector, StrictError> {
        self.enter()?;
        let inner = self.key(variant);
        inner.enter()?;
        Ok(SeqCollector {
            items: Vec::with_capacity(len),
            variant: Some(variant),
            ser: inner,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapCollector, StrictError> {
        self.enter()?;
        Ok(MapCollector {
            map: Map::new(),
            next_key: None,
            variant: None,
            ser: self,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapCollector, StrictError> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        _len: usize,
    ) -> Result<MapCollector, StrictError> {
        self.enter()?;
        let inner = self.key(variant);
        inner.enter()?;
        Ok(MapCollector {
            map: Map::new(),
            next_key: None,
            variant: Some(variant),
            ser: inner,
        })
    }
}

fn wrap_variant(variant: Option<&'static str>, value: Value) -> Value {
    match variant {
        Some(name) => {
            let mut outer = Map::new();
            outer.insert(name.to_string(), value);
            Value::Object(outer)
        }
        None => value,
    }
}

pub(crate) struct SeqCollector {
    ser: StrictSerializer,
    items: Vec<Value>,
    variant: Option<&'static str>,
}

impl SeqCollector {
    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), StrictError> {
        let child = self.ser.index(self.items.len());
        let item = StrictSerializer::serialize_child(child, value)?;
        self.items.push(item);
        Ok(())
    }

    fn finish(self) -> Value {
        wrap_variant(self.variant, Value::Array(self.items))
    }
}

impl ser::SerializeSeq for SeqCollector {
    type Ok = Value;
    type Error = StrictError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), StrictError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, StrictError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SeqCollector {
    type Ok = Value;
    type Error = StrictError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), StrictError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, StrictError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SeqCollector {
    type Ok = Value;
    type Error = StrictError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), StrictError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, StrictError> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleVariant for SeqCollector {
    type Ok = Value;
    type Error = StrictError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), StrictError> {
        self.push(value)
    }

    fn end(self) -> Result<Value, StrictError> {
        Ok(self.finish())
    }
}

pub(crate) struct MapCollector {
    ser: StrictSerializer,
    map: Map<String, Value>,
    next_key: Option<String>,
    variant: Option<&'static str>,
}

impl MapCollector {
    fn insert<T: ?Sized + Serialize>(&mut self, key: String, value: &T) -> Result<(), StrictError> {
        let child = self.ser.key(&key);
        let item = StrictSerializer::serialize_child(child, value)?;
        self.map.insert(key, item);
        Ok(())
    }

    fn finish(self) -> Value {
        wrap_variant(self.variant, Value::Object(self.map))
    }
}

impl ser::SerializeMap for MapCollector {
    type Ok = Value;
    type Error = StrictError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), StrictError> {
        // Keys go through the same serializer; only string-shaped results are
        // accepted, so integer and composite keys are rejected.
        match key.serialize(self.ser.clone())? {
            Value::String(key) => {
                self.next_key = Some(key);
                Ok(())
            }
            other => Err(StrictError::not_serializable(
                self.ser.path(),
                format!("mapping key {other} is not a string"),
            )),
        }
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), StrictError> {
        let key = self
            .next_key
            .take()
            .ok_or_else(|| StrictError::not_serializable(self.ser.path(), "value without a key"))?;
        self.insert(key, value)
    }

    fn end(self) -> Result<Value, StrictError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStruct for MapCollector {
    type Ok = Value;
    type Error = StrictError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), StrictError> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, StrictError> {
        Ok(self.finish())
    }
}

impl ser::SerializeStructVariant for MapCollector {
    type Ok = Value;
    type Error = StrictError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), StrictError> {
        self.insert(key.to_string(), value)
    }

    fn end(self) -> Result<Value, StrictError> {
        Ok(self.finish())
    }
}
