//! Rows and their storage locations.

use std::{fmt::Display, sync::Arc};

use crate::{
    error::{DbError, DbResult},
    page::PageId,
    types::{Field, Schema},
};

/// Where a row lives on disk: a page plus the slot inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

impl Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot)
    }
}

/// One record. The fields always agree with the schema in count and type.
///
/// A row read from a page carries its [`RecordId`]; that tag is a plain value used to find the
/// row again through the buffer pool and never a reference into a cached page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    schema: Arc<Schema>,
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Row {
    pub fn new(schema: Arc<Schema>, fields: Vec<Field>) -> DbResult<Self> {
        if fields.len() != schema.num_fields() {
            return Err(DbError::schema_mismatch(format!(
                "row has {} fields but schema {} has {}",
                fields.len(),
                schema,
                schema.num_fields()
            )));
        }
        for (i, field) in fields.iter().enumerate() {
            let expected = schema.field_type(i)?;
            if field.field_type() != expected {
                return Err(DbError::schema_mismatch(format!(
                    "field {i} is {} but schema expects {expected}",
                    field.field_type()
                )));
            }
        }
        Ok(Self {
            schema,
            fields,
            record_id: None,
        })
    }

    /// Field-wise concatenation of `left` then `right` under an already merged schema
    pub fn concat(schema: Arc<Schema>, left: &Row, right: &Row) -> Self {
        debug_assert_eq!(
            schema.num_fields(),
            left.fields.len() + right.fields.len()
        );
        let fields = left
            .fields
            .iter()
            .chain(right.fields.iter())
            .cloned()
            .collect();
        Self {
            schema,
            fields,
            record_id: None,
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }

    pub fn set_field(&mut self, index: usize, value: Field) -> DbResult<()> {
        let expected = self.schema.field_type(index)?;
        if value.field_type() != expected {
            return Err(DbError::schema_mismatch(format!(
                "cannot store a {} in {expected} field {index}",
                value.field_type()
            )));
        }
        self.fields[index] = value;
        Ok(())
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }
}

impl Display for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let values: Vec<String> = self.fields.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", values.join("\t"))
    }
}
