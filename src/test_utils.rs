//! Helpers shared by unit tests, integration tests and benchmarks.

use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{
    error::DbResult,
    operator::OpIterator,
    row::Row,
    types::{Field, FieldType, Schema},
};

/// A scratch directory removed when dropped
pub struct TestDir {
    path: PathBuf,
}

impl TestDir {
    pub fn new<P>(path: P) -> Self
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path).unwrap();
        Self { path }
    }
}

impl Drop for TestDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

impl AsRef<Path> for TestDir {
    fn as_ref(&self) -> &Path {
        self.path.as_ref()
    }
}

static FILE_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A name no other call in this process returns
pub fn generate_filename() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    let thread_id = std::thread::current().id();
    let n = FILE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test_{}_{:?}_{}", timestamp, thread_id, n).replace(['(', ')'], "")
}

/// Schema of `width` int columns named `f0`, `f1`, ...
pub fn int_schema(width: usize) -> Schema {
    Schema::from_pairs((0..width).map(|i| (format!("f{i}"), FieldType::Int))).unwrap()
}

pub fn int_row(schema: &Arc<Schema>, values: &[i32]) -> Row {
    Row::new(Arc::clone(schema), values.iter().copied().map(Field::Int).collect()).unwrap()
}

pub fn int_rows<const N: usize>(schema: &Arc<Schema>, values: &[[i32; N]]) -> Vec<Row> {
    values.iter().map(|v| int_row(schema, v)).collect()
}

/// Drain an open operator
pub fn collect_rows(op: &mut dyn OpIterator) -> DbResult<Vec<Row>> {
    let mut rows = Vec::new();
    while op.has_next()? {
        rows.push(op.next()?);
    }
    Ok(rows)
}

/// Drain an open operator, keeping one int column
pub fn collect_ints(op: &mut dyn OpIterator, field: usize) -> DbResult<Vec<i32>> {
    Ok(collect_rows(op)?
        .iter()
        .filter_map(|row| row.field(field).and_then(Field::as_int))
        .collect())
}
