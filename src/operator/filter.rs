use std::sync::Arc;

use crate::{
    error::DbResult,
    operator::{Cursor, OpIterator, Operator},
    predicate::Predicate,
    row::Row,
    types::Schema,
};

/// Passes through the child rows that satisfy a predicate. Rows keep their location tags, so
/// a filter can feed a [`Delete`](super::Delete).
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    cursor: Cursor,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> DbResult<Self> {
        predicate.validate(child.schema())?;
        Ok(Self {
            predicate,
            child,
            cursor: Cursor::default(),
        })
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }
}

impl Operator for Filter {
    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    fn open_inner(&mut self) -> DbResult<()> {
        self.child.open()
    }

    fn fetch_next(&mut self) -> DbResult<Option<Row>> {
        while self.child.has_next()? {
            let row = self.child.next()?;
            if self.predicate.matches(&row) {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    fn rewind_inner(&mut self) -> DbResult<()> {
        self.child.rewind()
    }

    fn close_inner(&mut self) {
        self.child.close();
    }

    fn output_schema(&self) -> &Arc<Schema> {
        self.child.schema()
    }
}

#[cfg(test)]
mod filter_tests {
    use super::*;
    use crate::{
        error::DbError,
        operator::RowIterator,
        predicate::CompareOp,
        test_utils::{collect_ints, int_rows, int_schema},
    };

    fn child(values: &[[i32; 2]]) -> Box<dyn OpIterator> {
        let schema = Arc::new(int_schema(2));
        Box::new(RowIterator::new(Arc::clone(&schema), int_rows(&schema, values)))
    }

    #[test]
    fn test_filter_keeps_matching_rows() {
        let mut filter = Filter::new(
            Predicate::new(1, CompareOp::GreaterThanOrEq, 20),
            child(&[[1, 10], [2, 20], [3, 30], [4, 5]]),
        )
        .unwrap();
        filter.open().unwrap();
        assert_eq!(collect_ints(&mut filter, 0).unwrap(), vec![2, 3]);
        assert_eq!(filter.schema().num_fields(), 2);

        filter.rewind().unwrap();
        assert_eq!(collect_ints(&mut filter, 0).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_filter_with_no_matches() {
        let mut filter = Filter::new(
            Predicate::new(0, CompareOp::LessThan, 0),
            child(&[[1, 10], [2, 20]]),
        )
        .unwrap();
        filter.open().unwrap();
        assert!(!filter.has_next().unwrap());
        assert!(matches!(filter.next(), Err(DbError::NoSuchElement)));
    }

    #[test]
    fn test_filter_rejects_bad_predicate() {
        assert!(matches!(
            Filter::new(Predicate::new(5, CompareOp::Equals, 1), child(&[])),
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            Filter::new(Predicate::new(0, CompareOp::Equals, "a"), child(&[])),
            Err(DbError::SchemaMismatch { .. })
        ));
    }
}
