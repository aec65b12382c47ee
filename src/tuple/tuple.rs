use std::fmt;
use std::sync::Arc;

use bytes::BufMut;

use super::{Schema, Value};
use crate::common::{HeapDbError, RecordId, Result};

/// Represents a single row bound to a schema.
///
/// Fields start out unset and are written one at a time with
/// [`Tuple::set_field`], which rejects values whose type does not match the
/// schema. The record id is assigned by the storage layer on insert.
///
/// ## Tuple Binary Format
///
/// ```text
/// +-----------+-----------+-----+-----------+
/// | Field 0   | Field 1   | ... | Field N-1 |
/// +-----------+-----------+-----+-----------+
/// ```
///
/// Each field occupies exactly its type's byte size, so the image is always
/// `schema.byte_size()` bytes long.
#[derive(Debug, Clone)]
pub struct Tuple {
    /// The schema describing this tuple
    schema: Arc<Schema>,

    /// The values for each field (in schema order), None while unset
    values: Vec<Option<Value>>,

    /// Location on disk, once stored
    record_id: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple with every field unset.
    pub fn new(schema: Arc<Schema>) -> Self {
        let count = schema.field_count();
        Self {
            schema,
            values: vec![None; count],
            record_id: None,
        }
    }

    /// Creates a tuple and sets every field from `values`, in order.
    pub fn with_values(schema: Arc<Schema>, values: Vec<Value>) -> Result<Self> {
        if values.len() != schema.field_count() {
            return Err(HeapDbError::Db(format!(
                "{} values given for {} fields",
                values.len(),
                schema.field_count()
            )));
        }

        let mut tuple = Self::new(schema);
        for (i, value) in values.into_iter().enumerate() {
            tuple.set_field(i, value)?;
        }
        Ok(tuple)
    }

    /// Returns the schema of this tuple.
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Replaces the schema without touching the stored values.
    /// The caller keeps the values consistent with the new schema.
    pub fn reset_schema(&mut self, schema: Arc<Schema>) {
        if self.values.len() < schema.field_count() {
            self.values.resize(schema.field_count(), None);
        }
        self.schema = schema;
    }

    /// Returns the value at the given index, or None if it is unset.
    pub fn field(&self, index: usize) -> Result<Option<&Value>> {
        self.check_index(index)?;
        Ok(self.values[index].as_ref())
    }

    /// Sets the value at the given index.
    pub fn set_field(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.check_index(index)?;

        let value = value.into();
        let expected = *self.schema.field_type(index)?;
        if !value.conforms_to(&expected) {
            return Err(HeapDbError::TypeMismatch {
                index,
                expected,
                found: value.type_name().to_string(),
            });
        }

        self.values[index] = Some(value);
        Ok(())
    }

    /// Returns an iterator over the field values, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = Option<&Value>> {
        self.values[..self.schema.field_count()]
            .iter()
            .map(Option::as_ref)
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }

    fn check_index(&self, index: usize) -> Result<()> {
        let len = self.schema.field_count();
        if index >= len {
            return Err(HeapDbError::IndexOutOfRange { index, len });
        }
        Ok(())
    }

    /// Appends the fixed-width image of this tuple to `buf`.
    /// Every field must be set.
    pub fn encode_into<B: BufMut>(&self, buf: &mut B) -> Result<()> {
        for (i, col) in self.schema.columns().enumerate() {
            let value = self.values[i]
                .as_ref()
                .ok_or_else(|| HeapDbError::Db(format!("field {} is unset", i)))?;

            if !value.encode(col.data_type(), buf) {
                return Err(HeapDbError::TypeMismatch {
                    index: i,
                    expected: *col.data_type(),
                    found: value.type_name().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Returns the fixed-width image of this tuple.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.schema.byte_size());
        self.encode_into(&mut bytes)?;
        Ok(bytes)
    }

    /// Decodes a tuple image produced by [`Tuple::encode_into`].
    pub fn from_bytes(schema: Arc<Schema>, mut data: &[u8]) -> Result<Self> {
        if data.len() < schema.byte_size() {
            return Err(HeapDbError::Db(format!(
                "tuple image is {} bytes, schema needs {}",
                data.len(),
                schema.byte_size()
            )));
        }

        let mut values = Vec::with_capacity(schema.field_count());
        for col in schema.columns() {
            let value = Value::decode(col.data_type(), &mut data)
                .ok_or_else(|| HeapDbError::Db("truncated tuple image".to_string()))?;
            values.push(Some(value));
        }

        Ok(Self {
            schema,
            values,
            record_id: None,
        })
    }
}

/// Compares schema and values; the record id is not part of a row's value.
impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.fields().eq(other.fields())
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, value) in self.fields().enumerate() {
            if i > 0 {
                write!(f, "\t")?;
            }
            match value {
                Some(v) => write!(f, "{}", v)?,
                None => write!(f, "NULL")?,
            }
        }
        writeln!(f)
    }
}
