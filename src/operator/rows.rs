use std::sync::Arc;

use crate::{
    error::DbResult,
    operator::{Cursor, Operator},
    row::Row,
    types::Schema,
};

/// Serves a fixed, in-memory list of rows.
pub struct RowIterator {
    schema: Arc<Schema>,
    rows: Vec<Row>,
    position: usize,
    cursor: Cursor,
}

impl RowIterator {
    pub fn new(schema: Arc<Schema>, rows: Vec<Row>) -> Self {
        Self {
            schema,
            rows,
            position: 0,
            cursor: Cursor::default(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Operator for RowIterator {
    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    fn open_inner(&mut self) -> DbResult<()> {
        self.position = 0;
        Ok(())
    }

    fn fetch_next(&mut self) -> DbResult<Option<Row>> {
        let row = self.rows.get(self.position).cloned();
        if row.is_some() {
            self.position += 1;
        }
        Ok(row)
    }

    fn rewind_inner(&mut self) -> DbResult<()> {
        self.position = 0;
        Ok(())
    }

    fn close_inner(&mut self) {
        self.position = 0;
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
