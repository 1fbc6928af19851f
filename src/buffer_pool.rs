//! The bounded page cache shared by every operator.
//!
//! The pool maps [`PageId`]s to cached [`HeapPage`]s. A miss reads the page from the owning
//! [`HeapFile`](crate::heap_file::HeapFile), found through the [`Catalog`]. When the pool is full
//! the [`PolicyState`] picks a victim, which is flushed if dirty and then dropped. Every public
//! method runs under one pool-wide mutex.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::{
    catalog::Catalog,
    config::DbConfig,
    error::{DbError, DbResult},
    page::{HeapPage, PageId, TableId},
    replacement::PolicyState,
    row::Row,
    transaction::{Permissions, TransactionId},
};

/// Shared handle to a cached page. Holders must not keep the page locked across calls back
/// into the pool.
pub type PageHandle = Arc<RwLock<HeapPage>>;

#[derive(Debug)]
pub struct BufferStats {
    pub hits: AtomicUsize,
    pub misses: AtomicUsize,
}

impl Default for BufferStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BufferStats {
    pub fn new() -> Self {
        Self {
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    pub fn get(&self) -> (usize, usize) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }

    /// Fraction of page requests served from the cache, as a percentage
    pub fn hit_rate(&self) -> f64 {
        let (hits, misses) = self.get();
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }
}

#[derive(Debug)]
struct PoolState {
    pages: HashMap<PageId, PageHandle>,
    policy: PolicyState,
}

#[derive(Debug)]
pub struct BufferPool {
    catalog: Arc<Catalog>,
    page_size: usize,
    capacity: usize,
    state: Mutex<PoolState>,
    stats: BufferStats,
}

impl BufferPool {
    pub fn new(catalog: Arc<Catalog>, config: &DbConfig) -> DbResult<Self> {
        config.validate()?;
        Ok(Self {
            catalog,
            page_size: config.page_size,
            capacity: config.pool_pages,
            state: Mutex::new(PoolState {
                pages: HashMap::with_capacity(config.pool_pages),
                policy: PolicyState::new(),
            }),
            stats: BufferStats::new(),
        })
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of pages currently cached
    pub fn len(&self) -> usize {
        self.state.lock().pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, pid: &PageId) -> bool {
        self.state.lock().pages.contains_key(pid)
    }

    pub fn stats(&self) -> &BufferStats {
        &self.stats
    }

    /// Fetch a page, reading it from disk on a miss.
    ///
    /// `perm` is accepted so callers already state their intent; it is not enforced.
    pub fn get_page(
        &self,
        tid: TransactionId,
        pid: PageId,
        perm: Permissions,
    ) -> DbResult<PageHandle> {
        let mut state = self.state.lock();
        if let Some(handle) = state.pages.get(&pid) {
            let handle = Arc::clone(handle);
            state.policy.record_hit(&pid);
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            trace!(%pid, %tid, ?perm, "buffer pool hit");
            return Ok(handle);
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        debug!(%pid, %tid, ?perm, "buffer pool miss");
        let page = self.catalog.database_file(pid.table_id)?.read_page(pid)?;
        self.make_room(&mut state)?;
        let handle = Arc::new(RwLock::new(page));
        state.pages.insert(pid, Arc::clone(&handle));
        state.policy.on_page_admitted(pid);
        Ok(handle)
    }

    /// Give up `tid`'s claim on a page.
    pub fn release_page(&self, _tid: TransactionId, _pid: PageId) {}

    // TODO: answer from a per-page lock table once get_page acquires locks.
    pub fn holds_lock(&self, _tid: TransactionId, _pid: PageId) -> bool {
        false
    }

    /// Insert `row` into the table and cache the page it landed on
    pub fn insert_row(
        &self,
        tid: TransactionId,
        table_id: TableId,
        row: &mut Row,
    ) -> DbResult<()> {
        let file = self.catalog.database_file(table_id)?;
        let dirtied = file.insert_row(tid, self, row)?;
        self.absorb(dirtied)
    }

    /// Delete the row named by `row`'s location tag and cache the page it was removed from
    pub fn delete_row(&self, tid: TransactionId, row: &Row) -> DbResult<()> {
        let record_id = row
            .record_id()
            .ok_or_else(|| DbError::not_found("record id on row to delete"))?;
        let file = self.catalog.database_file(record_id.page_id.table_id)?;
        let dirtied = file.delete_row(tid, self, row)?;
        self.absorb(dirtied)
    }

    /// Put pages changed by a heap file back into the cache, replacing any copy already cached
    /// under the same id. The page may have been evicted while it was being changed, in which
    /// case room is made for it again.
    fn absorb(&self, dirtied: Vec<PageHandle>) -> DbResult<()> {
        let mut state = self.state.lock();
        for handle in dirtied {
            let pid = handle.read().id();
            if !state.pages.contains_key(&pid) {
                self.make_room(&mut state)?;
            }
            state.pages.insert(pid, handle);
            state.policy.on_page_admitted(pid);
        }
        Ok(())
    }

    /// Write every dirty cached page to disk
    pub fn flush_all(&self) -> DbResult<()> {
        let state = self.state.lock();
        for handle in state.pages.values() {
            self.flush_handle(handle)?;
        }
        Ok(())
    }

    /// Write one page to disk if it is cached and dirty
    pub fn flush_page(&self, pid: PageId) -> DbResult<()> {
        let state = self.state.lock();
        match state.pages.get(&pid) {
            Some(handle) => self.flush_handle(handle),
            None => Ok(()),
        }
    }

    /// Write every cached page last dirtied by `tid`
    pub fn flush_pages(&self, tid: TransactionId) -> DbResult<()> {
        let state = self.state.lock();
        for handle in state.pages.values() {
            if handle.read().dirtied_by() == Some(tid) {
                self.flush_handle(handle)?;
            }
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it
    pub fn discard(&self, pid: PageId) {
        let mut state = self.state.lock();
        if state.pages.remove(&pid).is_some() {
            state.policy.remove(&pid);
            debug!(%pid, "discarded page");
        }
    }

    fn flush_handle(&self, handle: &PageHandle) -> DbResult<()> {
        let mut page = handle.write();
        if !page.is_dirty() {
            return Ok(());
        }
        self.catalog
            .database_file(page.id().table_id)?
            .write_page(&page)?;
        page.mark_dirty(false, None);
        Ok(())
    }

    /// Evict until there is room for one more page
    fn make_room(&self, state: &mut PoolState) -> DbResult<()> {
        while state.pages.len() >= self.capacity {
            let victim = state
                .policy
                .evict_candidate()
                .ok_or_else(|| DbError::not_found("page to evict"))?;
            if let Some(handle) = state.pages.get(&victim) {
                if let Err(source) = self.flush_handle(handle) {
                    state.policy.restore_candidate(victim);
                    return Err(DbError::EvictionFailure {
                        page_id: victim,
                        source: Box::new(source),
                    });
                }
            }
            state.pages.remove(&victim);
            debug!(pid = %victim, "evicted page");
        }
        Ok(())
    }
}
