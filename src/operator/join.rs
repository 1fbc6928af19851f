use std::sync::Arc;

use crate::{
    error::DbResult,
    operator::{Cursor, OpIterator, Operator},
    predicate::JoinPredicate,
    row::Row,
    types::Schema,
};

/// Nested-loop join. Output rows are the outer row's fields followed by the inner row's, with
/// both join columns kept.
pub struct Join {
    predicate: JoinPredicate,
    outer: Box<dyn OpIterator>,
    inner: Box<dyn OpIterator>,
    schema: Arc<Schema>,
    /// Outer row whose inner scan is still in progress
    pending_outer: Option<Row>,
    cursor: Cursor,
}

impl Join {
    pub fn new(
        predicate: JoinPredicate,
        outer: Box<dyn OpIterator>,
        inner: Box<dyn OpIterator>,
    ) -> DbResult<Self> {
        predicate.validate(outer.schema(), inner.schema())?;
        let schema = Arc::new(Schema::merge(outer.schema(), inner.schema()));
        Ok(Self {
            predicate,
            outer,
            inner,
            schema,
            pending_outer: None,
            cursor: Cursor::default(),
        })
    }

    pub fn predicate(&self) -> &JoinPredicate {
        &self.predicate
    }
}

impl Operator for Join {
    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    fn open_inner(&mut self) -> DbResult<()> {
        self.outer.open()?;
        self.inner.open()?;
        self.pending_outer = None;
        Ok(())
    }

    fn fetch_next(&mut self) -> DbResult<Option<Row>> {
        loop {
            let outer = match self.pending_outer.take() {
                Some(row) => row,
                None => {
                    if !self.outer.has_next()? {
                        return Ok(None);
                    }
                    self.outer.next()?
                }
            };

            while self.inner.has_next()? {
                let inner = self.inner.next()?;
                if self.predicate.matches(&outer, &inner) {
                    let joined = Row::concat(Arc::clone(&self.schema), &outer, &inner);
                    self.pending_outer = Some(outer);
                    return Ok(Some(joined));
                }
            }
            self.inner.rewind()?;
        }
    }

    fn rewind_inner(&mut self) -> DbResult<()> {
        self.outer.rewind()?;
        self.inner.rewind()?;
        self.pending_outer = None;
        Ok(())
    }

    fn close_inner(&mut self) {
        self.outer.close();
        self.inner.close();
        self.pending_outer = None;
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

#[cfg(test)]
mod join_tests {
    use super::*;
    use crate::{
        error::DbError,
        operator::RowIterator,
        predicate::CompareOp,
        test_utils::{collect_rows, int_rows, int_schema},
        types::{Field, FieldType},
    };

    fn source(values: &[[i32; 2]]) -> Box<dyn OpIterator> {
        let schema = Arc::new(int_schema(2));
        Box::new(RowIterator::new(Arc::clone(&schema), int_rows(&schema, values)))
    }

    fn ints(rows: &[Row]) -> Vec<Vec<i32>> {
        rows.iter()
            .map(|r| r.fields().iter().filter_map(Field::as_int).collect())
            .collect()
    }

    #[test]
    fn test_equi_join_emits_every_match() {
        let mut join = Join::new(
            JoinPredicate::new(0, CompareOp::Equals, 0),
            source(&[[1, 10], [2, 20], [3, 30]]),
            source(&[[2, 200], [1, 100], [2, 201], [4, 400]]),
        )
        .unwrap();
        join.open().unwrap();
        assert_eq!(join.schema().num_fields(), 4);
        let rows = collect_rows(&mut join).unwrap();
        assert_eq!(
            ints(&rows),
            vec![
                vec![1, 10, 1, 100],
                vec![2, 20, 2, 200],
                vec![2, 20, 2, 201],
            ]
        );
    }

    #[test]
    fn test_always_true_is_cross_product() {
        let outer = [[1, 0], [2, 0], [3, 0]];
        let inner = [[5, 0], [6, 0]];
        // every second column is 0, so equality on it always holds
        let mut join = Join::new(
            JoinPredicate::new(1, CompareOp::Equals, 1),
            source(&outer),
            source(&inner),
        )
        .unwrap();
        join.open().unwrap();
        let rows = collect_rows(&mut join).unwrap();
        assert_eq!(rows.len(), outer.len() * inner.len());
        assert_eq!(ints(&rows)[0], vec![1, 0, 5, 0]);
        assert_eq!(ints(&rows)[5], vec![3, 0, 6, 0]);
    }

    #[test]
    fn test_always_false_is_empty() {
        let mut join = Join::new(
            JoinPredicate::new(1, CompareOp::NotEquals, 1),
            source(&[[1, 0], [2, 0]]),
            source(&[[5, 0]]),
        )
        .unwrap();
        join.open().unwrap();
        assert!(!join.has_next().unwrap());
    }

    #[test]
    fn test_rewind_restarts_join() {
        let mut join = Join::new(
            JoinPredicate::new(0, CompareOp::LessThan, 0),
            source(&[[1, 0], [2, 0]]),
            source(&[[2, 0], [3, 0]]),
        )
        .unwrap();
        join.open().unwrap();
        let first = collect_rows(&mut join).unwrap();
        assert_eq!(first.len(), 3);
        join.rewind().unwrap();
        join.next().unwrap();
        join.rewind().unwrap();
        assert_eq!(ints(&collect_rows(&mut join).unwrap()), ints(&first));
    }

    #[test]
    fn test_empty_sides() {
        let mut join = Join::new(
            JoinPredicate::new(0, CompareOp::Equals, 0),
            source(&[]),
            source(&[[1, 1]]),
        )
        .unwrap();
        join.open().unwrap();
        assert!(!join.has_next().unwrap());

        let mut join = Join::new(
            JoinPredicate::new(0, CompareOp::Equals, 0),
            source(&[[1, 1]]),
            source(&[]),
        )
        .unwrap();
        join.open().unwrap();
        assert!(!join.has_next().unwrap());
    }

    #[test]
    fn test_construction_checks_fields() {
        assert!(matches!(
            Join::new(
                JoinPredicate::new(2, CompareOp::Equals, 0),
                source(&[]),
                source(&[]),
            ),
            Err(DbError::NotFound { .. })
        ));

        let strings = Arc::new(Schema::from_pairs([("s", FieldType::String)]).unwrap());
        let inner: Box<dyn OpIterator> = Box::new(RowIterator::new(strings, Vec::new()));
        assert!(matches!(
            Join::new(JoinPredicate::new(0, CompareOp::Equals, 0), source(&[]), inner),
            Err(DbError::SchemaMismatch { .. })
        ));
    }
}
