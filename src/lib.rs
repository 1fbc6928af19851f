//! A single-node relational storage engine: heap files of fixed-size pages, a bounded buffer
//! pool with FIFO eviction, and pull-based query operators running on top of them.

pub mod buffer_pool;
pub mod catalog;
pub mod config;
pub mod error;
pub mod heap_file;
pub mod operator;
pub mod page;
pub mod predicate;
mod replacement;
pub mod row;
#[doc(hidden)]
pub mod test_utils;
pub mod transaction;
pub mod types;

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

pub use buffer_pool::{BufferPool, BufferStats, PageHandle};
pub use catalog::Catalog;
pub use config::DbConfig;
pub use error::{DbError, DbResult};
pub use heap_file::{HeapFile, HeapScan};
pub use operator::{
    Aggregate, AggregateOp, Delete, Filter, Insert, Join, OpIterator, Operator, RowIterator,
};
pub use page::{HeapPage, PageId, TableId};
pub use predicate::{CompareOp, JoinPredicate, Predicate};
pub use row::{RecordId, Row};
pub use transaction::{Permissions, TransactionId};
pub use types::{Field, FieldDesc, FieldType, Schema};

use test_utils::TestDir;

/// The database struct: one catalog and one buffer pool over a data directory
pub struct Database {
    config: DbConfig,
    data_dir: PathBuf,
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPool>,
}

impl Database {
    pub fn new<P: AsRef<Path>>(data_dir: P, config: DbConfig) -> DbResult<Self> {
        config.validate()?;
        fs::create_dir_all(data_dir.as_ref())?;
        let catalog = Arc::new(Catalog::new());
        let buffer_pool = Arc::new(BufferPool::new(Arc::clone(&catalog), &config)?);
        Ok(Self {
            config,
            data_dir: data_dir.as_ref().to_path_buf(),
            catalog,
            buffer_pool,
        })
    }

    /// A database in a fresh scratch directory that is removed when the returned [`TestDir`]
    /// is dropped
    #[doc(hidden)]
    pub fn new_for_test(page_size: usize, pool_pages: usize) -> (Self, TestDir) {
        let test_dir = TestDir::new(std::env::temp_dir().join(test_utils::generate_filename()));
        let config = DbConfig::default()
            .with_page_size(page_size)
            .with_pool_pages(pool_pages);
        let db = Self::new(&test_dir, config).unwrap();
        (db, test_dir)
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPool> {
        &self.buffer_pool
    }

    /// Create (or reopen) the heap file `<data_dir>/<name>.dat` and register it
    pub fn create_table(&self, name: &str, schema: Schema) -> DbResult<TableId> {
        let file = HeapFile::open(
            self.data_dir.join(format!("{name}.dat")),
            schema,
            self.config.page_size,
        )?;
        self.catalog.add_table(file, name, "")
    }

    /// Register every table listed in a schema file
    pub fn load_schema<P: AsRef<Path>>(&self, path: P) -> DbResult<Vec<TableId>> {
        self.catalog.load_schema(path, self.config.page_size)
    }

    /// A sequential scan over a table, not yet opened
    pub fn scan(&self, tid: TransactionId, table_id: TableId) -> DbResult<HeapScan> {
        HeapScan::new(tid, Arc::clone(&self.buffer_pool), table_id)
    }
}
