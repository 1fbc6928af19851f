use std::{collections::VecDeque, sync::Arc};

use tracing::trace;

use crate::{
    buffer_pool::BufferPool,
    error::DbResult,
    operator::{Cursor, Operator},
    page::{PageId, TableId},
    row::Row,
    transaction::{Permissions, TransactionId},
    types::Schema,
};

/// Sequential scan over every live row of a table, in (page, slot) order.
///
/// Pages are fetched through the buffer pool one at a time, so rows inserted or deleted through
/// the pool are visible even before they are flushed. The page count is taken when the scan is
/// opened; pages appended after that are not visited until the scan is rewound or reopened.
pub struct HeapScan {
    tid: TransactionId,
    pool: Arc<BufferPool>,
    table_id: TableId,
    schema: Arc<Schema>,
    cursor: Cursor,
    num_pages: usize,
    next_page: usize,
    rows: VecDeque<Row>,
}

impl HeapScan {
    pub fn new(tid: TransactionId, pool: Arc<BufferPool>, table_id: TableId) -> DbResult<Self> {
        let schema = pool.catalog().schema(table_id)?;
        Ok(Self {
            tid,
            pool,
            table_id,
            schema,
            cursor: Cursor::default(),
            num_pages: 0,
            next_page: 0,
            rows: VecDeque::new(),
        })
    }

    pub fn table_id(&self) -> TableId {
        self.table_id
    }
}

impl Operator for HeapScan {
    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    fn open_inner(&mut self) -> DbResult<()> {
        let file = self.pool.catalog().database_file(self.table_id)?;
        self.num_pages = file.num_pages()?;
        self.next_page = 0;
        self.rows.clear();
        Ok(())
    }

    fn fetch_next(&mut self) -> DbResult<Option<Row>> {
        loop {
            if let Some(row) = self.rows.pop_front() {
                return Ok(Some(row));
            }
            if self.next_page >= self.num_pages {
                return Ok(None);
            }
            let pid = PageId::new(self.table_id, self.next_page);
            let handle = self.pool.get_page(self.tid, pid, Permissions::ReadOnly)?;
            let rows = handle.read().rows()?;
            trace!(%pid, rows = rows.len(), "scan moved to page");
            self.rows.extend(rows);
            self.next_page += 1;
        }
    }

    fn rewind_inner(&mut self) -> DbResult<()> {
        self.close_inner();
        self.open_inner()
    }

    fn close_inner(&mut self) {
        self.num_pages = 0;
        self.next_page = 0;
        self.rows.clear();
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}
