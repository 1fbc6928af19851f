//! A table stored as an unordered sequence of fixed-size pages in one file.

mod scan;

pub use scan::HeapScan;

use std::{
    fs::{File, OpenOptions},
    hash::{Hash, Hasher},
    io::{self, Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use fnv::FnvHasher;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::{
    buffer_pool::{BufferPool, PageHandle},
    error::{DbError, DbResult},
    page::{HeapPage, PageId, TableId},
    row::Row,
    transaction::{Permissions, TransactionId},
    types::Schema,
};

/// The storage of one table. A heap file never caches pages itself; every page it hands out on
/// the insert and delete paths comes from the [`BufferPool`].
#[derive(Debug)]
pub struct HeapFile {
    path: PathBuf,
    table_id: TableId,
    schema: Arc<Schema>,
    page_size: usize,
    file: Mutex<File>,
}

impl HeapFile {
    /// Open (creating if needed) the heap file at `path`
    pub fn open<P: AsRef<Path>>(path: P, schema: Schema, page_size: usize) -> DbResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.as_ref())?;
        let path = std::fs::canonicalize(path.as_ref())?;
        let table_id = table_id_for_path(&path);
        debug!(path = %path.display(), table_id, "opened heap file");
        Ok(Self {
            path,
            table_id,
            schema: Arc::new(schema),
            page_size,
            file: Mutex::new(file),
        })
    }

    pub fn id(&self) -> TableId {
        self.table_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages in the file. A trailing partial page counts as a page.
    pub fn num_pages(&self) -> DbResult<usize> {
        let len = self.file.lock().metadata()?.len() as usize;
        Ok(len.div_ceil(self.page_size))
    }

    /// Read one page straight from disk
    pub fn read_page(&self, pid: PageId) -> DbResult<HeapPage> {
        self.check_table(pid)?;
        let num_pages = self.num_pages()?;
        if pid.page_no >= num_pages {
            return Err(DbError::not_found(format!(
                "page {pid} (table has {num_pages} pages)"
            )));
        }

        let mut bytes = vec![0u8; self.page_size];
        {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start((pid.page_no * self.page_size) as u64))?;
            let mut filled = 0;
            while filled < bytes.len() {
                match file.read(&mut bytes[filled..]) {
                    Ok(0) => break,
                    Ok(n) => filled += n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            }
        }
        trace!(%pid, "read page");
        HeapPage::new(pid, Arc::clone(&self.schema), bytes, self.page_size)
    }

    /// Write the full page back to its offset, extending the file if needed
    pub fn write_page(&self, page: &HeapPage) -> DbResult<()> {
        let pid = page.id();
        self.check_table(pid)?;
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start((pid.page_no * self.page_size) as u64))?;
        file.write_all(page.page_data())?;
        file.flush()?;
        trace!(%pid, "wrote page");
        Ok(())
    }

    /// Place `row` in the first page with a free slot, growing the file by one page if every
    /// page is full. Returns the page that was modified.
    pub fn insert_row(
        &self,
        tid: TransactionId,
        pool: &BufferPool,
        row: &mut Row,
    ) -> DbResult<Vec<PageHandle>> {
        if !row.schema().same_types(&self.schema) {
            return Err(DbError::schema_mismatch(format!(
                "cannot insert a row of ({}) into table {} of ({})",
                row.schema(),
                self.table_id,
                self.schema
            )));
        }

        for page_no in 0..self.num_pages()? {
            let pid = PageId::new(self.table_id, page_no);
            let handle = pool.get_page(tid, pid, Permissions::ReadWrite)?;
            {
                let mut page = handle.write();
                if page.num_empty_slots() == 0 {
                    continue;
                }
                page.insert_row(row)?;
                page.mark_dirty(true, Some(tid));
            }
            return Ok(vec![handle]);
        }

        let pid = PageId::new(self.table_id, self.num_pages()?);
        self.write_page(&HeapPage::empty(
            pid,
            Arc::clone(&self.schema),
            self.page_size,
        )?)?;
        debug!(%pid, "heap file grew by one page");

        let handle = pool.get_page(tid, pid, Permissions::ReadWrite)?;
        {
            let mut page = handle.write();
            page.insert_row(row)?;
            page.mark_dirty(true, Some(tid));
        }
        Ok(vec![handle])
    }

    /// Free the slot named by the row's location tag. Returns the page that was modified.
    pub fn delete_row(
        &self,
        tid: TransactionId,
        pool: &BufferPool,
        row: &Row,
    ) -> DbResult<Vec<PageHandle>> {
        let record_id = row
            .record_id()
            .ok_or_else(|| DbError::not_found("record id on row to delete"))?;
        self.check_table(record_id.page_id)?;

        let handle = pool.get_page(tid, record_id.page_id, Permissions::ReadWrite)?;
        {
            let mut page = handle.write();
            page.delete_row(row)?;
            page.mark_dirty(true, Some(tid));
        }
        Ok(vec![handle])
    }

    fn check_table(&self, pid: PageId) -> DbResult<()> {
        if pid.table_id != self.table_id {
            return Err(DbError::not_found(format!(
                "page {pid} in table {}",
                self.table_id
            )));
        }
        Ok(())
    }
}

/// Stable table id derived from the file's absolute path
fn table_id_for_path(path: &Path) -> TableId {
    let mut hasher = FnvHasher::default();
    path.to_string_lossy().hash(&mut hasher);
    let hash = hasher.finish();
    (hash ^ (hash >> 32)) as TableId
}
