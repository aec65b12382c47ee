use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use super::DataType;
use crate::common::{HeapDbError, Result};

/// Represents a single field of a tuple descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Field name, absent for anonymous fields
    name: Option<String>,

    /// Field data type
    data_type: DataType,
}

impl Column {
    /// Creates a new column definition.
    pub fn new(name: Option<String>, data_type: DataType) -> Self {
        Self { name, data_type }
    }

    /// Returns the column name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the column data type.
    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name().unwrap_or(""), self.data_type)
    }
}

/// Describes the shape of a tuple: an ordered, non-empty list of typed,
/// optionally named fields.
///
/// Two schemas are equal when their type sequences are equal; names are
/// ignored.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Ordered list of columns
    columns: Vec<Column>,

    /// Total encoded width of a tuple
    byte_size: usize,
}

impl Schema {
    /// Creates a schema from parallel sequences of types and names.
    pub fn new(types: Vec<DataType>, names: Option<Vec<Option<String>>>) -> Result<Self> {
        if types.is_empty() {
            return Err(HeapDbError::InvalidSchema(
                "a schema needs at least one field".to_string(),
            ));
        }

        let names = match names {
            Some(names) if names.len() != types.len() => {
                return Err(HeapDbError::InvalidSchema(format!(
                    "{} names given for {} types",
                    names.len(),
                    types.len()
                )));
            }
            Some(names) => names,
            None => vec![None; types.len()],
        };

        let columns = types
            .into_iter()
            .zip(names)
            .map(|(data_type, name)| Column::new(name, data_type))
            .collect();

        Ok(Self::from_columns(columns))
    }

    /// Creates a schema whose fields are all anonymous.
    pub fn anonymous(types: Vec<DataType>) -> Result<Self> {
        Self::new(types, None)
    }

    /// Creates a schema builder for fluent construction.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    fn from_columns(columns: Vec<Column>) -> Self {
        let byte_size = columns.iter().map(|c| c.data_type.byte_size()).sum();
        Self { columns, byte_size }
    }

    /// Concatenates two schemas: `a`'s fields followed by `b`'s.
    pub fn merge(a: &Schema, b: &Schema) -> Schema {
        let columns = a.columns.iter().chain(b.columns.iter()).cloned().collect();
        Self::from_columns(columns)
    }

    /// Returns the number of fields.
    pub fn field_count(&self) -> usize {
        self.columns.len()
    }

    /// Returns the column at the given index.
    pub fn column(&self, index: usize) -> Result<&Column> {
        self.columns.get(index).ok_or(HeapDbError::IndexOutOfRange {
            index,
            len: self.columns.len(),
        })
    }

    /// Returns the type of the field at the given index.
    pub fn field_type(&self, index: usize) -> Result<&DataType> {
        self.column(index).map(Column::data_type)
    }

    /// Returns the (possibly absent) name of the field at the given index.
    pub fn field_name(&self, index: usize) -> Result<Option<&str>> {
        self.column(index).map(Column::name)
    }

    /// Returns the index of the first field with the given name.
    pub fn index_of(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name() == Some(name))
            .ok_or_else(|| HeapDbError::NotFound(format!("no field named '{}'", name)))
    }

    /// Returns an iterator over all columns.
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Returns the encoded size of one tuple of this schema.
    pub fn byte_size(&self) -> usize {
        self.byte_size
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| a.data_type == b.data_type)
    }
}

impl Eq for Schema {}

impl Hash for Schema {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for col in &self.columns {
            col.data_type.hash(state);
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", col)?;
        }
        Ok(())
    }
}

/// Builder for constructing schemas fluently.
pub struct SchemaBuilder {
    columns: Vec<Column>,
}

impl SchemaBuilder {
    /// Creates a new schema builder.
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Adds a named column.
    pub fn column(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.columns.push(Column::new(Some(name.into()), data_type));
        self
    }

    /// Adds an anonymous column.
    pub fn anonymous_column(mut self, data_type: DataType) -> Self {
        self.columns.push(Column::new(None, data_type));
        self
    }

    /// Builds the schema.
    pub fn build(self) -> Result<Schema> {
        if self.columns.is_empty() {
            return Err(HeapDbError::InvalidSchema(
                "a schema needs at least one field".to_string(),
            ));
        }
        Ok(Schema::from_columns(self.columns))
    }

    /// Builds the schema wrapped in an Arc for shared ownership.
    pub fn build_arc(self) -> Result<Arc<Schema>> {
        self.build().map(Arc::new)
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}
