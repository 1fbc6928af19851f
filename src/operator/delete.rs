use std::sync::Arc;

use tracing::debug;

use crate::{
    buffer_pool::BufferPool,
    error::DbResult,
    operator::{insert::count_schema, Cursor, OpIterator, Operator},
    row::Row,
    transaction::TransactionId,
    types::{Field, Schema},
};

/// Removes every child row from the table it was read from, found through the row's location
/// tag. Like [`Insert`](super::Insert) it does the work on open and then reports the count once.
pub struct Delete {
    tid: TransactionId,
    pool: Arc<BufferPool>,
    child: Box<dyn OpIterator>,
    schema: Arc<Schema>,
    result: Option<Row>,
    served: bool,
    cursor: Cursor,
}

impl Delete {
    pub fn new(
        tid: TransactionId,
        pool: Arc<BufferPool>,
        child: Box<dyn OpIterator>,
    ) -> DbResult<Self> {
        Ok(Self {
            tid,
            pool,
            child,
            schema: count_schema()?,
            result: None,
            served: false,
            cursor: Cursor::default(),
        })
    }
}

impl Operator for Delete {
    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    fn open_inner(&mut self) -> DbResult<()> {
        self.child.open()?;
        let mut count = 0;
        while self.child.has_next()? {
            let row = self.child.next()?;
            self.pool.delete_row(self.tid, &row)?;
            count += 1;
        }
        debug!(count, "deleted rows");
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
