//! Process-wide storage configuration.
//!
//! The default page size is fixed at compile time through Cargo features, the same way the
//! on-disk format is selected for a release build. Individual databases (tests in particular)
//! may still override both the page size and the buffer pool capacity through [`DbConfig`].

use crate::error::{DbError, DbResult};

#[cfg(any(
    all(feature = "page-4k", feature = "page-8k"),
    all(feature = "page-4k", feature = "page-1m"),
    all(feature = "page-8k", feature = "page-1m"),
))]
compile_error!("Enable only one page size feature (`page-4k`, `page-8k` or `page-1m`)");

// Compile-time default page size, selected via Cargo features.
#[cfg(feature = "page-4k")]
pub const DEFAULT_PAGE_SIZE: usize = 4096;
#[cfg(feature = "page-8k")]
pub const DEFAULT_PAGE_SIZE: usize = 8192;
#[cfg(feature = "page-1m")]
pub const DEFAULT_PAGE_SIZE: usize = 1024 * 1024;

#[cfg(not(any(feature = "page-4k", feature = "page-8k", feature = "page-1m")))]
compile_error!(
    "One of `page-4k`, `page-8k`, or `page-1m` features must be enabled to select a page size."
);

/// Default number of pages held by the buffer pool.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Sizes fixed at buffer pool construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbConfig {
    /// Bytes per page, including the occupancy bitmap.
    pub page_size: usize,
    /// Maximum number of pages cached by the buffer pool.
    pub pool_pages: usize,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            pool_pages: DEFAULT_POOL_PAGES,
        }
    }
}

impl DbConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_pool_pages(mut self, pool_pages: usize) -> Self {
        self.pool_pages = pool_pages;
        self
    }

    /// Reject configurations the pool cannot run with
    pub fn validate(&self) -> DbResult<()> {
        if self.page_size == 0 {
            return Err(DbError::config("page size must be greater than zero"));
        }
        if self.pool_pages == 0 {
            return Err(DbError::config(
                "buffer pool must hold at least one page",
            ));
        }
        Ok(())
    }
}
