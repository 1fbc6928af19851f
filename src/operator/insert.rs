use std::sync::Arc;

use tracing::debug;

use crate::{
    buffer_pool::BufferPool,
    error::{DbError, DbResult},
    operator::{Cursor, OpIterator, Operator},
    page::TableId,
    row::Row,
    transaction::TransactionId,
    types::{Field, FieldType, Schema},
};

/// Single-column schema of the row reporting how many rows a write touched.
pub(crate) fn count_schema() -> DbResult<Arc<Schema>> {
    Ok(Arc::new(Schema::from_pairs([("count", FieldType::Int)])?))
}

/// Writes every child row into a table.
///
/// The writes happen when the operator is opened. Afterwards it yields exactly one row holding
/// the number of rows inserted; rewinding yields that row again without writing anything.
pub struct Insert {
    tid: TransactionId,
    pool: Arc<BufferPool>,
    child: Box<dyn OpIterator>,
    table_id: TableId,
    schema: Arc<Schema>,
    result: Option<Row>,
    served: bool,
    cursor: Cursor,
}

impl Insert {
    pub fn new(
        tid: TransactionId,
        pool: Arc<BufferPool>,
        child: Box<dyn OpIterator>,
        table_id: TableId,
    ) -> DbResult<Self> {
        let table_schema = pool.catalog().schema(table_id)?;
        if !child.schema().same_types(&table_schema) {
            return Err(DbError::schema_mismatch(format!(
                "cannot insert rows of ({}) into table {table_id} of ({table_schema})",
                child.schema()
            )));
        }
        Ok(Self {
            tid,
            pool,
            child,
            table_id,
            schema: count_schema()?,
            result: None,
            served: false,
            cursor: Cursor::default(),
        })
    }
}

impl Operator for Insert {
    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    fn open_inner(&mut self) -> DbResult<()> {
        self.child.open()?;
        let mut count = 0;
        while self.child.has_next()? {
            let mut row = self.child.next()?;
            self.pool.insert_row(self.tid, self.table_id, &mut row)?;
            count += 1;
        }
        debug!(table_id = self.table_id, count, "inserted rows");
        self.result = Some(Row::new(
            Arc::clone(&self.schema),
            vec![Field::Int(count)],
        )?);
        self.served = false;
        Ok(())
    }

    fn fetch_next(&mut self) -> DbResult<Option<Row>> {
        if self.served {
            return Ok(None);
        }
        self.served = true;
        Ok(self.result.clone())
    }

    fn rewind_inner(&mut self) -> DbResult<()> {
        self.served = false;
        Ok(())
    }

    fn close_inner(&mut self) {
        self.child.close();
        self.result = None;
        self.served = false;
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
