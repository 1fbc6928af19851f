//! Errors raised by the storage layer and the query operators.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::page::PageId;

/// Result type for every fallible operation in the crate.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// An operator was used while it was not open.
    #[error("operator is not open")]
    NotOpen,

    /// `next` was called after the operator ran out of rows.
    #[error("no more rows")]
    NoSuchElement,

    /// The underlying file read or write failed.
    #[error("storage I/O error: {source}")]
    StorageIo {
        #[from]
        source: io::Error,
    },

    /// A dirty page could not be flushed before it was evicted.
    #[error("failed to flush page {page_id} before eviction: {source}")]
    EvictionFailure {
        page_id: PageId,
        #[source]
        source: Box<DbError>,
    },

    /// A row or field does not agree with the schema it is used against.
    #[error("schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// A table, page, field or row location that does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// A malformed line in a schema file.
    #[error("invalid schema file {path:?} line {line}: {reason}")]
    InvalidSchemaFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Configuration values the engine cannot run with.
    #[error("configuration error: {message}")]
    Config { message: String },
}

impl DbError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    pub fn schema_mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Storage failures end the operation that hit them; nothing retries them.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageIo { .. } | Self::EvictionFailure { .. })
    }
}
