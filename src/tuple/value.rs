use std::fmt;

use bytes::{Buf, BufMut};

use super::DataType;

/// Represents a typed value that can be stored in a tuple field.
/// Each variant corresponds to a DataType and holds the actual data.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value
    Boolean(bool),

    /// 8-bit signed integer
    TinyInt(i8),

    /// 16-bit signed integer
    SmallInt(i16),

    /// 32-bit signed integer
    Integer(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// String value (stored as Char)
    String(String),

    /// Timestamp value (microseconds since Unix epoch)
    Timestamp(i64),
}

impl Value {
    /// Returns true if this value may be stored in a field of the given type.
    pub fn conforms_to(&self, data_type: &DataType) -> bool {
        match (self, data_type) {
            (Value::Boolean(_), DataType::Boolean)
            | (Value::TinyInt(_), DataType::TinyInt)
            | (Value::SmallInt(_), DataType::SmallInt)
            | (Value::Integer(_), DataType::Integer)
            | (Value::BigInt(_), DataType::BigInt)
            | (Value::Float(_), DataType::Float)
            | (Value::Double(_), DataType::Double)
            | (Value::Timestamp(_), DataType::Timestamp) => true,
            // NUL is the padding byte, so it cannot appear in stored text
            (Value::String(s), DataType::Char(n)) => {
                s.len() <= *n as usize && !s.contains('\0')
            }
            _ => false,
        }
    }

    /// Short name of the variant, used in type mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "BOOLEAN",
            Value::TinyInt(_) => "TINYINT",
            Value::SmallInt(_) => "SMALLINT",
            Value::Integer(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "FLOAT",
            Value::Double(_) => "DOUBLE",
            Value::String(_) => "STRING",
            Value::Timestamp(_) => "TIMESTAMP",
        }
    }

    /// Writes the fixed-width encoding of this value.
    /// Returns false, writing nothing, if the value does not conform to the type.
    pub fn encode<B: BufMut>(&self, data_type: &DataType, buf: &mut B) -> bool {
        if !self.conforms_to(data_type) {
            return false;
        }

        match self {
            Value::Boolean(b) => buf.put_u8(u8::from(*b)),
            Value::TinyInt(v) => buf.put_i8(*v),
            Value::SmallInt(v) => buf.put_i16_le(*v),
            Value::Integer(v) => buf.put_i32_le(*v),
            Value::BigInt(v) => buf.put_i64_le(*v),
            Value::Float(v) => buf.put_f32_le(*v),
            Value::Double(v) => buf.put_f64_le(*v),
            Value::Timestamp(v) => buf.put_i64_le(*v),
            Value::String(s) => {
                buf.put_slice(s.as_bytes());
                buf.put_bytes(0, data_type.byte_size() - s.len());
            }
        }
        true
    }

    /// Reads a value of the given type, consuming exactly its byte size.
    /// Returns None if the buffer is too short.
    pub fn decode<B: Buf>(data_type: &DataType, buf: &mut B) -> Option<Self> {
        if buf.remaining() < data_type.byte_size() {
            return None;
        }

        let value = match data_type {
            DataType::Boolean => Value::Boolean(buf.get_u8() != 0),
            DataType::TinyInt => Value::TinyInt(buf.get_i8()),
            DataType::SmallInt => Value::SmallInt(buf.get_i16_le()),
            DataType::Integer => Value::Integer(buf.get_i32_le()),
            DataType::BigInt => Value::BigInt(buf.get_i64_le()),
            DataType::Float => Value::Float(buf.get_f32_le()),
            DataType::Double => Value::Double(buf.get_f64_le()),
            DataType::Timestamp => Value::Timestamp(buf.get_i64_le()),
            DataType::Char(n) => {
                let mut raw = vec![0u8; *n as usize];
                buf.copy_to_slice(&mut raw);
                let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                raw.truncate(end);
                Value::String(String::from_utf8_lossy(&raw).into_owned())
            }
        };
        Some(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::TinyInt(v) => write!(f, "{}", v),
            Value::SmallInt(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::String(s) => write!(f, "{}", s),
            Value::Timestamp(v) => write!(f, "{}", v),
        }
    }
}

// Convenience conversions
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::TinyInt(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::SmallInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
