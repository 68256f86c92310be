//! Renders a serde-serializable payload as ordered AMI fields.
//!
//! A flat struct becomes one `Name: Value` pair per field, in declaration
//! order. Use `#[serde(rename = "...")]` for wire names and
//! `skip_serializing_if` to omit empty optional fields; `Option::None` is
//! always omitted. A sequence renders as the same name repeated once per
//! element, which is how AMI spells `Variable` lists.
//!
//! ```
//! use serde::Serialize;
//! use asterisk_ami_tokio::fields::to_fields;
//!
//! #[derive(Serialize)]
//! struct Redirect {
//!     #[serde(rename = "Channel")]
//!     channel: String,
//!     #[serde(rename = "ExtraChannel", skip_serializing_if = "Option::is_none")]
//!     extra_channel: Option<String>,
//!     #[serde(rename = "Priority")]
//!     priority: u32,
//! }
//!
//! let fields = to_fields(&Redirect {
//!     channel: "PJSIP/100-00000001".into(),
//!     extra_channel: None,
//!     priority: 1,
//! }).unwrap();
//! assert_eq!(fields, vec![
//!     ("Channel".to_string(), "PJSIP/100-00000001".to_string()),
//!     ("Priority".to_string(), "1".to_string()),
//! ]);
//! ```

use serde::ser::{self, Impossible, Serialize};
use std::fmt;

use crate::error::{AmiError, AmiResult};

/// Render `payload` as `(name, value)` pairs.
pub fn to_fields<T: Serialize + ?Sized>(payload: &T) -> AmiResult<Vec<(String, String)>> {
    payload
        .serialize(FieldsSerializer)
        .map_err(|e| AmiError::Encode(e.0))
}

#[derive(Debug)]
struct EncodeError(String);

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for EncodeError {}

impl ser::Error for EncodeError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        EncodeError(msg.to_string())
    }
}

fn unsupported<T>(what: &str) -> Result<T, EncodeError> {
    Err(EncodeError(format!(
        "payload must be a struct or map of scalar fields, found {what}"
    )))
}

/// Top level: a struct or map whose entries become fields.
struct FieldsSerializer;

struct FieldsCollector {
    out: Vec<(String, String)>,
    key: Option<String>,
}

impl FieldsCollector {
    fn new() -> Self {
        Self {
            out: Vec::new(),
            key: None,
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, name: &str, value: &T) -> Result<(), EncodeError> {
        for v in value.serialize(ValueSerializer)? {
            self.out
                .push((name.to_string(), v));
        }
        Ok(())
    }
}

impl ser::Serializer for FieldsSerializer {
    type Ok = Vec<(String, String)>;
    type Error = EncodeError;
    type SerializeSeq = Impossible<Self::Ok, EncodeError>;
    type SerializeTuple = Impossible<Self::Ok, EncodeError>;
    type SerializeTupleStruct = Impossible<Self::Ok, EncodeError>;
    type SerializeTupleVariant = Impossible<Self::Ok, EncodeError>;
    type SerializeMap = FieldsCollector;
    type SerializeStruct = FieldsCollector;
    type SerializeStructVariant = Impossible<Self::Ok, EncodeError>;

    fn serialize_bool(self, _: bool) -> Result<Self::Ok, EncodeError> {
        unsupported("bool")
    }
    fn serialize_i8(self, _: i8) -> Result<Self::Ok, EncodeError> {
        unsupported("integer")
    }
    fn serialize_i16(self, _: i16) -> Result<Self::Ok, EncodeError> {
        unsupported("integer")
    }
    fn serialize_i32(self, _: i32) -> Result<Self::Ok, EncodeError> {
        unsupported("integer")
    }
    fn serialize_i64(self, _: i64) -> Result<Self::Ok, EncodeError> {
        unsupported("integer")
    }
    fn serialize_u8(self, _: u8) -> Result<Self::Ok, EncodeError> {
        unsupported("integer")
    }
    fn serialize_u16(self, _: u16) -> Result<Self::Ok, EncodeError> {
        unsupported("integer")
    }
    fn serialize_u32(self, _: u32) -> Result<Self::Ok, EncodeError> {
        unsupported("integer")
    }
    fn serialize_u64(self, _: u64) -> Result<Self::Ok, EncodeError> {
        unsupported("integer")
    }
    fn serialize_f32(self, _: f32) -> Result<Self::Ok, EncodeError> {
        unsupported("float")
    }
    fn serialize_f64(self, _: f64) -> Result<Self::Ok, EncodeError> {
        unsupported("float")
    }
    fn serialize_char(self, _: char) -> Result<Self::Ok, EncodeError> {
        unsupported("char")
    }
    fn serialize_str(self, _: &str) -> Result<Self::Ok, EncodeError> {
        unsupported("string")
    }
    fn serialize_bytes(self, _: &[u8]) -> Result<Self::Ok, EncodeError> {
        unsupported("bytes")
    }
    fn serialize_none(self) -> Result<Self::Ok, EncodeError> {
        Ok(Vec::new())
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Self::Ok, EncodeError> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<Self::Ok, EncodeError> {
        Ok(Vec::new())
    }
    fn serialize_unit_struct(self, _: &'static str) -> Result<Self::Ok, EncodeError> {
        Ok(Vec::new())
    }
    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
    ) -> Result<Self::Ok, EncodeError> {
        unsupported("enum variant")
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<Self::Ok, EncodeError> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: &T,
    ) -> Result<Self::Ok, EncodeError> {
        unsupported("enum variant")
    }
    fn serialize_seq(self, _: Option<usize>) -> Result<Self::SerializeSeq, EncodeError> {
        unsupported("sequence")
    }
    fn serialize_tuple(self, _: usize) -> Result<Self::SerializeTuple, EncodeError> {
        unsupported("tuple")
    }
    fn serialize_tuple_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleStruct, EncodeError> {
        unsupported("tuple struct")
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, EncodeError> {
        unsupported("enum variant")
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, EncodeError> {
        Ok(FieldsCollector::new())
    }
    fn serialize_struct(
        self,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStruct, EncodeError> {
        Ok(FieldsCollector::new())
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, EncodeError> {
        unsupported("enum variant")
    }
}

impl ser::SerializeStruct for FieldsCollector {
    type Ok = Vec<(String, String)>;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.push(key, value)
    }

    fn end(self) -> Result<Self::Ok, EncodeError> {
        Ok(self.out)
    }
}

impl ser::SerializeMap for FieldsCollector {
    type Ok = Vec<(String, String)>;
    type Error = EncodeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EncodeError> {
        let mut names = key.serialize(ValueSerializer)?;
        if names.len() != 1 {
            return Err(EncodeError("map key must be a single scalar".into()));
        }
        self.key = names.pop();
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        let key = self
            .key
            .take()
            .ok_or_else(|| EncodeError("map value without key".into()))?;
        self.push(&key, value)
    }

    fn end(self) -> Result<Self::Ok, EncodeError> {
        Ok(self.out)
    }
}

/// Field value: zero values (omitted), one, or several (repeated line).
struct ValueSerializer;

struct ValueList(Vec<String>);

impl ValueList {
    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.0
            .extend(value.serialize(ValueSerializer)?);
        Ok(())
    }
}

fn one(s: impl ToString) -> Result<Vec<String>, EncodeError> {
    Ok(vec![s.to_string()])
}

impl ser::Serializer for ValueSerializer {
    type Ok = Vec<String>;
    type Error = EncodeError;
    type SerializeSeq = ValueList;
    type SerializeTuple = ValueList;
    type SerializeTupleStruct = ValueList;
    type SerializeTupleVariant = Impossible<Self::Ok, EncodeError>;
    type SerializeMap = Impossible<Self::Ok, EncodeError>;
    type SerializeStruct = Impossible<Self::Ok, EncodeError>;
    type SerializeStructVariant = Impossible<Self::Ok, EncodeError>;

    fn serialize_bool(self, v: bool) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_i8(self, v: i8) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_i16(self, v: i16) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_i32(self, v: i32) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_i64(self, v: i64) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_u8(self, v: u8) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_u16(self, v: u16) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_u32(self, v: u32) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_u64(self, v: u64) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_f32(self, v: f32) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_f64(self, v: f64) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_char(self, v: char) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_str(self, v: &str) -> Result<Self::Ok, EncodeError> {
        one(v)
    }
    fn serialize_bytes(self, _: &[u8]) -> Result<Self::Ok, EncodeError> {
        Err(EncodeError("raw bytes are not a field value".into()))
    }
    fn serialize_none(self) -> Result<Self::Ok, EncodeError> {
        Ok(Vec::new())
    }
    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Self::Ok, EncodeError> {
        value.serialize(self)
    }
    fn serialize_unit(self) -> Result<Self::Ok, EncodeError> {
        Ok(Vec::new())
    }
    fn serialize_unit_struct(self, _: &'static str) -> Result<Self::Ok, EncodeError> {
        Ok(Vec::new())
    }
    fn serialize_unit_variant(
        self,
        _: &'static str,
        _: u32,
        variant: &'static str,
    ) -> Result<Self::Ok, EncodeError> {
        one(variant)
    }
    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        value: &T,
    ) -> Result<Self::Ok, EncodeError> {
        value.serialize(self)
    }
    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        value: &T,
    ) -> Result<Self::Ok, EncodeError> {
        value.serialize(self)
    }
    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, EncodeError> {
        Ok(ValueList(Vec::with_capacity(len.unwrap_or(0))))
    }
    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, EncodeError> {
        Ok(ValueList(Vec::with_capacity(len)))
    }
    fn serialize_tuple_struct(
        self,
        _: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, EncodeError> {
        Ok(ValueList(Vec::with_capacity(len)))
    }
    fn serialize_tuple_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeTupleVariant, EncodeError> {
        Err(EncodeError("tuple variants are not field values".into()))
    }
    fn serialize_map(self, _: Option<usize>) -> Result<Self::SerializeMap, EncodeError> {
        Err(EncodeError("nested maps are not field values".into()))
    }
    fn serialize_struct(
        self,
        name: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStruct, EncodeError> {
        Err(EncodeError(format!("nested struct {name} is not a field value")))
    }
    fn serialize_struct_variant(
        self,
        _: &'static str,
        _: u32,
        _: &'static str,
        _: usize,
    ) -> Result<Self::SerializeStructVariant, EncodeError> {
        Err(EncodeError("struct variants are not field values".into()))
    }
}

impl ser::SerializeSeq for ValueList {
    type Ok = Vec<String>;
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, EncodeError> {
        Ok(self.0)
    }
}

impl ser::SerializeTuple for ValueList {
    type Ok = Vec<String>;
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, EncodeError> {
        Ok(self.0)
    }
}

impl ser::SerializeTupleStruct for ValueList {
    type Ok = Vec<String>;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Self::Ok, EncodeError> {
        Ok(self.0)
    }
}
