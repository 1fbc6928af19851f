//! Pull-based query operators.
//!
//! Every operator follows the same lifecycle: it starts `Closed`, `open` moves it to `Open`,
//! and `close` moves it back. `has_next`, `next` and `rewind` are only valid while open and
//! fail with [`DbError::NotOpen`] otherwise. Calling `next` once the operator is exhausted fails
//! with [`DbError::NoSuchElement`].
//!
//! Concrete operators implement [`Operator`], which only asks for the operator-specific steps;
//! the lifecycle checks and the one-row lookahead behind `has_next` come from the blanket
//! [`OpIterator`] implementation.

mod aggregate;
mod delete;
mod filter;
mod insert;
mod join;
mod rows;

pub use aggregate::{Aggregate, AggregateOp};
pub use delete::Delete;
pub use filter::Filter;
pub use insert::Insert;
pub use join::Join;
pub use rows::RowIterator;

use std::sync::Arc;

use crate::{
    error::{DbError, DbResult},
    row::Row,
    types::Schema,
};

/// The interface every node of an operator tree exposes to its parent.
pub trait OpIterator {
    fn open(&mut self) -> DbResult<()>;

    /// Whether `next` would return a row. May pull from children.
    fn has_next(&mut self) -> DbResult<bool>;

    fn next(&mut self) -> DbResult<Row>;

    /// Restart from the first row without closing
    fn rewind(&mut self) -> DbResult<()>;

    fn close(&mut self);

    fn schema(&self) -> &Arc<Schema>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OpState {
    #[default]
    Closed,
    Open,
}

/// Lifecycle state plus the row fetched ahead by `has_next`.
#[derive(Debug, Default)]
pub struct Cursor {
    state: OpState,
    lookahead: Option<Row>,
}

impl Cursor {
    pub fn state(&self) -> OpState {
        self.state
    }

    fn ensure_open(&self) -> DbResult<()> {
        match self.state {
            OpState::Open => Ok(()),
            OpState::Closed => Err(DbError::NotOpen),
        }
    }
}

/// The operator-specific half of an [`OpIterator`].
pub trait Operator {
    fn cursor(&mut self) -> &mut Cursor;

    /// Open children and do any eager work
    fn open_inner(&mut self) -> DbResult<()>;

    /// Produce the next output row, or `None` once exhausted
    fn fetch_next(&mut self) -> DbResult<Option<Row>>;

    fn rewind_inner(&mut self) -> DbResult<()>;

    fn close_inner(&mut self);

    fn output_schema(&self) -> &Arc<Schema>;
}

impl<T: Operator> OpIterator for T {
    fn open(&mut self) -> DbResult<()> {
        self.open_inner()?;
        let cursor = self.cursor();
        cursor.state = OpState::Open;
        cursor.lookahead = None;
        Ok(())
    }

    fn has_next(&mut self) -> DbResult<bool> {
        self.cursor().ensure_open()?;
        if self.cursor().lookahead.is_none() {
            let row = self.fetch_next()?;
            self.cursor().lookahead = row;
        }
        Ok(self.cursor().lookahead.is_some())
    }

    fn next(&mut self) -> DbResult<Row> {
        if !self.has_next()? {
            return Err(DbError::NoSuchElement);
        }
        self.cursor().lookahead.take().ok_or(DbError::NoSuchElement)
    }

    fn rewind(&mut self) -> DbResult<()> {
        self.cursor().ensure_open()?;
        self.rewind_inner()?;
        self.cursor().lookahead = None;
        Ok(())
    }

    fn close(&mut self) {
        self.close_inner();
        let cursor = self.cursor();
        cursor.state = OpState::Closed;
        cursor.lookahead = None;
    }

    fn schema(&self) -> &Arc<Schema> {
        self.output_schema()
    }
}

#[cfg(test)]
mod operator_tests {
    use super::*;
    use crate::test_utils::{int_rows, int_schema};

    #[test]
    fn test_lifecycle() {
        let schema = Arc::new(int_schema(1));
        let mut op = RowIterator::new(Arc::clone(&schema), int_rows(&schema, &[[1], [2]]));
        assert_eq!(op.cursor().state(), OpState::Closed);
        assert!(matches!(op.has_next(), Err(DbError::NotOpen)));
        assert!(matches!(op.next(), Err(DbError::NotOpen)));
        assert!(matches!(op.rewind(), Err(DbError::NotOpen)));

        op.open().unwrap();
        assert_eq!(op.cursor().state(), OpState::Open);
        // has_next is idempotent
        assert!(op.has_next().unwrap());
        assert!(op.has_next().unwrap());
        assert_eq!(op.next().unwrap().fields()[0].as_int(), Some(1));
        assert_eq!(op.next().unwrap().fields()[0].as_int(), Some(2));
        assert!(!op.has_next().unwrap());
        assert!(matches!(op.next(), Err(DbError::NoSuchElement)));

        op.rewind().unwrap();
        assert_eq!(op.next().unwrap().fields()[0].as_int(), Some(1));

        op.close();
        assert!(matches!(op.next(), Err(DbError::NotOpen)));
        op.open().unwrap();
        assert_eq!(op.next().unwrap().fields()[0].as_int(), Some(1));
    }

    #[test]
    fn test_rewind_drops_lookahead() {
        let schema = Arc::new(int_schema(1));
        let mut op = RowIterator::new(Arc::clone(&schema), int_rows(&schema, &[[1], [2]]));
        op.open().unwrap();
        op.next().unwrap();
        assert!(op.has_next().unwrap());
        op.rewind().unwrap();
        assert_eq!(op.next().unwrap().fields()[0].as_int(), Some(1));
    }

    #[test]
    fn test_boxed_operators() {
        let schema = Arc::new(int_schema(1));
        let mut op: Box<dyn OpIterator> = Box::new(RowIterator::new(
            Arc::clone(&schema),
            int_rows(&schema, &[[7]]),
        ));
        op.open().unwrap();
        assert_eq!(op.schema().num_fields(), 1);
        assert_eq!(op.next().unwrap().fields()[0].as_int(), Some(7));
    }
}
