use std::{fmt::Display, str::FromStr, sync::Arc};

use fnv::FnvBuildHasher;
use indexmap::IndexMap;
use tracing::debug;

use crate::{
    error::{DbError, DbResult},
    operator::{Cursor, OpIterator, Operator, RowIterator},
    row::Row,
    types::{Field, FieldDesc, FieldType, Schema},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl Display for AggregateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Count => "count",
        };
        write!(f, "{name}")
    }
}

impl FromStr for AggregateOp {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "min" => Ok(AggregateOp::Min),
            "max" => Ok(AggregateOp::Max),
            "sum" => Ok(AggregateOp::Sum),
            "avg" => Ok(AggregateOp::Avg),
            "count" => Ok(AggregateOp::Count),
            other => Err(DbError::not_found(format!("aggregate operator {other}"))),
        }
    }
}

/// Running state of one group. The variant is fixed by the type of the aggregated column:
/// int columns support every operator, string columns can only be counted.
#[derive(Debug, Clone, Copy)]
enum Accumulator {
    Integer {
        count: i64,
        sum: i64,
        min: i32,
        max: i32,
    },
    Count {
        count: i64,
    },
}

impl Accumulator {
    fn for_type(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Int => Accumulator::Integer {
                count: 0,
                sum: 0,
                min: i32::MAX,
                max: i32::MIN,
            },
            FieldType::String => Accumulator::Count { count: 0 },
        }
    }

    fn fold(&mut self, value: &Field) {
        match (self, value) {
            (
                Accumulator::Integer {
                    count,
                    sum,
                    min,
                    max,
                },
                Field::Int(n),
            ) => {
                *count += 1;
                *sum += i64::from(*n);
                *min = (*min).min(*n);
                *max = (*max).max(*n);
            }
            (Accumulator::Count { count }, _) => *count += 1,
            (Accumulator::Integer { .. }, Field::String(_)) => {}
        }
    }

    /// Averages use integer division, truncating toward zero. A count or sum that does not fit
    /// the int output column is a [`DbError::SchemaMismatch`] rather than a wrapped value.
    fn result(&self, op: AggregateOp) -> DbResult<i32> {
        let wide = match (*self, op) {
            (Accumulator::Integer { count, .. }, AggregateOp::Count)
            | (Accumulator::Count { count }, _) => count,
            (Accumulator::Integer { sum, .. }, AggregateOp::Sum) => sum,
            (Accumulator::Integer { sum, count, .. }, AggregateOp::Avg) => {
                if count == 0 {
                    0
                } else {
                    sum / count
                }
            }
            (Accumulator::Integer { min, .. }, AggregateOp::Min) => i64::from(min),
            (Accumulator::Integer { max, .. }, AggregateOp::Max) => i64::from(max),
        };
        i32::try_from(wide)
            .map_err(|_| DbError::schema_mismatch(format!("{op} result {wide} overflows int")))
    }
}

/// Reduces one column, optionally per group.
///
/// All input is consumed when the operator is opened. The results are kept in memory and
/// rewinding serves them again without touching the child. Groups come out in the order their
/// key was first seen. An empty input produces no rows, with or without grouping.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    agg_field: usize,
    group_field: Option<usize>,
    op: AggregateOp,
    agg_type: FieldType,
    schema: Arc<Schema>,
    results: Option<RowIterator>,
    cursor: Cursor,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn OpIterator>,
        agg_field: usize,
        group_field: Option<usize>,
        op: AggregateOp,
    ) -> DbResult<Self> {
        let child_schema = child.schema();
        let agg_desc = child_schema.field(agg_field)?;
        if agg_desc.field_type == FieldType::String && op != AggregateOp::Count {
            return Err(DbError::schema_mismatch(format!(
                "{op} is not defined on string field {}",
                agg_desc.name
            )));
        }

        let value_desc = FieldDesc::new(format!("{op}({})", agg_desc.name), FieldType::Int);
        let fields = match group_field {
            Some(index) => vec![child_schema.field(index)?.clone(), value_desc],
            None => vec![value_desc],
        };
        let schema = Arc::new(Schema::new(fields)?);
        let agg_type = agg_desc.field_type;

        Ok(Self {
            child,
            agg_field,
            group_field,
            op,
            agg_type,
            schema,
            results: None,
            cursor: Cursor::default(),
        })
    }

    pub fn op(&self) -> AggregateOp {
        self.op
    }

    pub fn agg_field(&self) -> usize {
        self.agg_field
    }

    pub fn group_field(&self) -> Option<usize> {
        self.group_field
    }

    fn materialize(&mut self) -> DbResult<Vec<Row>> {
        let mut groups: IndexMap<Option<Field>, Accumulator, FnvBuildHasher> =
            IndexMap::default();
        while self.child.has_next()? {
            let row = self.child.next()?;
            let key = match self.group_field {
                Some(index) => Some(
                    row.field(index)
                        .cloned()
                        .ok_or_else(|| DbError::not_found(format!("group field {index}")))?,
                ),
                None => None,
            };
            let agg_field = self.agg_field;
            let value = row
                .field(agg_field)
                .ok_or_else(|| DbError::not_found(format!("aggregate field {agg_field}")))?;
            groups
                .entry(key)
                .or_insert_with(|| Accumulator::for_type(self.agg_type))
                .fold(value);
        }

        let mut rows = Vec::with_capacity(groups.len());
        for (key, accumulator) in groups {
            let value = Field::Int(accumulator.result(self.op)?);
            let fields = match key {
                Some(key) => vec![key, value],
                None => vec![value],
            };
            rows.push(Row::new(Arc::clone(&self.schema), fields)?);
        }
        Ok(rows)
    }
}

impl Operator for Aggregate {
    fn cursor(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    fn open_inner(&mut self) -> DbResult<()> {
        self.child.open()?;
        let rows = self.materialize()?;
        debug!(op = %self.op, groups = rows.len(), "aggregate materialized");
        let mut results = RowIterator::new(Arc::clone(&self.schema), rows);
        results.open()?;
        self.results = Some(results);
        Ok(())
    }

    fn fetch_next(&mut self) -> DbResult<Option<Row>> {
        let Some(results) = self.results.as_mut() else {
            return Ok(None);
        };
        if results.has_next()? {
            Ok(Some(results.next()?))
        } else {
            Ok(None)
        }
    }

    fn rewind_inner(&mut self) -> DbResult<()> {
        match self.results.as_mut() {
            Some(results) => results.rewind(),
            None => Ok(()),
        }
    }

    fn close_inner(&mut self) {
        self.results = None;
        self.child.close();
    }

    fn output_schema(&self) -> &Arc<Schema> {
        &self.schema
    }
}

#[cfg(test)]
mod aggregate_tests {
    use super::*;
    use crate::test_utils::{collect_rows, int_rows, int_schema};

    fn ints(values: &[[i32; 2]]) -> Box<dyn OpIterator> {
        let schema = Arc::new(int_schema(2));
        Box::new(RowIterator::new(Arc::clone(&schema), int_rows(&schema, values)))
    }

    fn keyed(values: &[(&str, i32)]) -> Box<dyn OpIterator> {
        let schema = Arc::new(
            Schema::from_pairs([("key", FieldType::String), ("value", FieldType::Int)]).unwrap(),
        );
        let rows = values
            .iter()
            .map(|(k, v)| {
                Row::new(Arc::clone(&schema), vec![Field::from(*k), Field::Int(*v)]).unwrap()
            })
            .collect();
        Box::new(RowIterator::new(schema, rows))
    }

    fn single_value(op: AggregateOp, values: &[[i32; 2]]) -> i32 {
        let mut agg = Aggregate::new(ints(values), 1, None, op).unwrap();
        agg.open().unwrap();
        let rows = collect_rows(&mut agg).unwrap();
        assert_eq!(rows.len(), 1);
        rows[0].fields()[0].as_int().unwrap()
    }

    #[test]
    fn test_ungrouped_operators() {
        let values = [[0, 2], [0, 4], [0, 6]];
        assert_eq!(single_value(AggregateOp::Count, &values), 3);
        assert_eq!(single_value(AggregateOp::Sum, &values), 12);
        assert_eq!(single_value(AggregateOp::Avg, &values), 4);
        assert_eq!(single_value(AggregateOp::Min, &values), 2);
        assert_eq!(single_value(AggregateOp::Max, &values), 6);
    }

    #[test]
    fn test_avg_truncates() {
        assert_eq!(single_value(AggregateOp::Avg, &[[0, 1], [0, 2]]), 1);
        assert_eq!(single_value(AggregateOp::Avg, &[[0, -1], [0, -2]]), -1);
    }

    #[test]
    fn test_sum_past_int_range_fails() {
        let mut agg =
            Aggregate::new(ints(&[[0, i32::MAX], [0, 1]]), 1, None, AggregateOp::Sum).unwrap();
        assert!(matches!(agg.open(), Err(DbError::SchemaMismatch { .. })));

        assert_eq!(
            single_value(AggregateOp::Avg, &[[0, i32::MAX], [0, i32::MAX]]),
            i32::MAX
        );
        assert_eq!(
            single_value(AggregateOp::Sum, &[[0, i32::MAX], [0, 1], [0, -1]]),
            i32::MAX
        );
    }

    #[test]
    fn test_output_schema_names() {
        let agg = Aggregate::new(ints(&[]), 1, None, AggregateOp::Sum).unwrap();
        assert_eq!(agg.schema().num_fields(), 1);
        assert_eq!(agg.schema().field_name(0).unwrap(), "sum(f1)");

        let agg = Aggregate::new(keyed(&[]), 1, Some(0), AggregateOp::Max).unwrap();
        assert_eq!(agg.schema().field_name(0).unwrap(), "key");
        assert_eq!(agg.schema().field_type(0).unwrap(), FieldType::String);
        assert_eq!(agg.schema().field_name(1).unwrap(), "max(value)");
    }

    #[test]
    fn test_grouped_sum() {
        let mut agg = Aggregate::new(
            keyed(&[("x", 1), ("x", 3), ("y", 5)]),
            1,
            Some(0),
            AggregateOp::Sum,
        )
        .unwrap();
        agg.open().unwrap();
        let mut rows: Vec<(String, i32)> = collect_rows(&mut agg)
            .unwrap()
            .into_iter()
            .map(|r| {
                (
                    r.fields()[0].as_str().unwrap().to_string(),
                    r.fields()[1].as_int().unwrap(),
                )
            })
            .collect();
        rows.sort();
        assert_eq!(rows, vec![("x".to_string(), 4), ("y".to_string(), 5)]);
    }

    #[test]
    fn test_count_of_strings() {
        let mut agg = Aggregate::new(
            keyed(&[("a", 1), ("b", 2), ("a", 3)]),
            0,
            Some(0),
            AggregateOp::Count,
        )
        .unwrap();
        agg.open().unwrap();
        let rows = collect_rows(&mut agg).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fields(), &[Field::from("a"), Field::Int(2)]);
        assert_eq!(rows[1].fields(), &[Field::from("b"), Field::Int(1)]);
    }

    #[test]
    fn test_strings_only_support_count() {
        assert!(matches!(
            Aggregate::new(keyed(&[]), 0, None, AggregateOp::Sum),
            Err(DbError::SchemaMismatch { .. })
        ));
        assert!(matches!(
            Aggregate::new(ints(&[]), 9, None, AggregateOp::Sum),
            Err(DbError::NotFound { .. })
        ));
        assert!(matches!(
            Aggregate::new(ints(&[]), 0, Some(9), AggregateOp::Sum),
            Err(DbError::NotFound { .. })
        ));
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        let mut agg = Aggregate::new(ints(&[]), 1, None, AggregateOp::Count).unwrap();
        agg.open().unwrap();
        assert!(!agg.has_next().unwrap());
    }

    #[test]
    fn test_rewind_reserves_results() {
        let mut agg = Aggregate::new(
            ints(&[[1, 10], [2, 20], [1, 30]]),
            1,
            Some(0),
            AggregateOp::Avg,
        )
        .unwrap();
        agg.open().unwrap();
        let first = collect_rows(&mut agg).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].fields(), &[Field::Int(1), Field::Int(20)]);
        agg.rewind().unwrap();
        assert_eq!(collect_rows(&mut agg).unwrap(), first);
    }

    #[test]
    fn test_parse_op() {
        assert_eq!("AVG".parse::<AggregateOp>().unwrap(), AggregateOp::Avg);
        assert_eq!(AggregateOp::Count.to_string(), "count");
        assert!("median".parse::<AggregateOp>().is_err());
    }
}
