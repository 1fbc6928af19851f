//! Field values and the schemas that describe rows.

use std::{cmp::Ordering, fmt::Display, str::FromStr};

use crate::{
    error::{DbError, DbResult},
    predicate::CompareOp,
};

/// Width of an encoded integer, and of the length prefix of an encoded string.
pub const INT_BYTES: usize = 4;

/// Fixed number of payload bytes reserved for every string field.
pub const STRING_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Int,
    String,
}

impl FieldType {
    /// Number of bytes this type occupies inside a row slot
    pub fn byte_len(&self) -> usize {
        match self {
            FieldType::Int => INT_BYTES,
            FieldType::String => INT_BYTES + STRING_LEN,
        }
    }
}

impl Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Int => write!(f, "int"),
            FieldType::String => write!(f, "string"),
        }
    }
}

impl FromStr for FieldType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "int" => Ok(FieldType::Int),
            "string" => Ok(FieldType::String),
            other => Err(DbError::schema_mismatch(format!("unknown type {other}"))),
        }
    }
}

/// A single typed value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    String(String),
}

impl Field {
    pub fn field_type(&self) -> FieldType {
        match self {
            Field::Int(_) => FieldType::Int,
            Field::String(_) => FieldType::String,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(n) => Some(*n),
            Field::String(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Int(_) => None,
            Field::String(s) => Some(s),
        }
    }

    /// Parse a textual value as the given type
    pub fn parse(field_type: FieldType, text: &str) -> DbResult<Self> {
        match field_type {
            FieldType::Int => text
                .trim()
                .parse::<i32>()
                .map(Field::Int)
                .map_err(|e| DbError::schema_mismatch(format!("{text:?} is not an int: {e}"))),
            FieldType::String => Ok(Field::String(text.to_string())),
        }
    }

    /// Evaluate `self <op> other`.
    ///
    /// Values of different types never compare true. For ints `LIKE` is plain equality, for
    /// strings it tests whether `other` occurs inside `self`.
    pub fn compare(&self, op: CompareOp, other: &Field) -> bool {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => match op {
                CompareOp::Like => a == b,
                _ => op.holds(a.cmp(b)),
            },
            (Field::String(a), Field::String(b)) => match op {
                CompareOp::Like => a.contains(b.as_str()),
                _ => op.holds(a.as_str().cmp(b.as_str())),
            },
            _ => false,
        }
    }
}

impl PartialOrd for Field {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Field::Int(a), Field::Int(b)) => Some(a.cmp(b)),
            (Field::String(a), Field::String(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Int(n) => write!(f, "{n}"),
            Field::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<i32> for Field {
    fn from(value: i32) -> Self {
        Field::Int(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::String(value.to_string())
    }
}

/// Name and type of one schema column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDesc {
    pub name: String,
    pub field_type: FieldType,
}

impl FieldDesc {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// The ordered column list of a table or operator output.
///
/// A schema always has at least one field. Names are informational and may repeat, e.g. after
/// a join on two columns with the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldDesc>,
}

impl Schema {
    pub fn new(fields: Vec<FieldDesc>) -> DbResult<Self> {
        if fields.is_empty() {
            return Err(DbError::schema_mismatch(
                "a schema needs at least one field",
            ));
        }
        Ok(Self { fields })
    }

    /// Build a schema from `(name, type)` pairs
    pub fn from_pairs<I, S>(pairs: I) -> DbResult<Self>
    where
        I: IntoIterator<Item = (S, FieldType)>,
        S: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(name, field_type)| FieldDesc::new(name, field_type))
                .collect(),
        )
    }

    /// Concatenate two schemas, keeping every column of both
    pub fn merge(left: &Schema, right: &Schema) -> Schema {
        let fields = left
            .fields
            .iter()
            .chain(right.fields.iter())
            .cloned()
            .collect();
        Self { fields }
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[FieldDesc] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> DbResult<&FieldDesc> {
        self.fields.get(index).ok_or_else(|| {
            DbError::not_found(format!(
                "field index {index} (schema has {} fields)",
                self.fields.len()
            ))
        })
    }

    pub fn field_type(&self, index: usize) -> DbResult<FieldType> {
        Ok(self.field(index)?.field_type)
    }

    pub fn field_name(&self, index: usize) -> DbResult<&str> {
        Ok(&self.field(index)?.name)
    }

    /// Index of the first field called `name`
    pub fn index_of(&self, name: &str) -> DbResult<usize> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .ok_or_else(|| DbError::not_found(format!("field {name}")))
    }

    /// Bytes needed to store one row of this schema
    pub fn row_width(&self) -> usize {
        self.fields.iter().map(|f| f.field_type.byte_len()).sum()
    }

    /// Two schemas are layout compatible when their types line up, whatever the names.
    pub fn same_types(&self, other: &Schema) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a.field_type == b.field_type)
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let columns: Vec<String> = self
            .fields
            .iter()
            .map(|field| format!("{}({})", field.name, field.field_type))
            .collect();
        write!(f, "{}", columns.join(", "))
    }
}
