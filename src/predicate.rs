//! Comparison predicates used by [`Filter`](crate::operator::Filter) and
//! [`Join`](crate::operator::Join).

use std::{cmp::Ordering, fmt::Display, str::FromStr};

use crate::{
    error::{DbError, DbResult},
    row::Row,
    types::{Field, Schema},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    Like,
}

impl CompareOp {
    /// Whether an ordering between two values satisfies this operator. `Like` is handled by the
    /// caller since it is not an ordering relation.
    pub(crate) fn holds(&self, ordering: Ordering) -> bool {
        match self {
            CompareOp::Equals | CompareOp::Like => ordering == Ordering::Equal,
            CompareOp::NotEquals => ordering != Ordering::Equal,
            CompareOp::GreaterThan => ordering == Ordering::Greater,
            CompareOp::GreaterThanOrEq => ordering != Ordering::Less,
            CompareOp::LessThan => ordering == Ordering::Less,
            CompareOp::LessThanOrEq => ordering != Ordering::Greater,
        }
    }
}

impl Display for CompareOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            CompareOp::Equals => "=",
            CompareOp::NotEquals => "<>",
            CompareOp::GreaterThan => ">",
            CompareOp::GreaterThanOrEq => ">=",
            CompareOp::LessThan => "<",
            CompareOp::LessThanOrEq => "<=",
            CompareOp::Like => "LIKE",
        };
        write!(f, "{symbol}")
    }
}

impl FromStr for CompareOp {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "=" | "==" => Ok(CompareOp::Equals),
            "<>" | "!=" => Ok(CompareOp::NotEquals),
            ">" => Ok(CompareOp::GreaterThan),
            ">=" => Ok(CompareOp::GreaterThanOrEq),
            "<" => Ok(CompareOp::LessThan),
            "<=" => Ok(CompareOp::LessThanOrEq),
            "LIKE" => Ok(CompareOp::Like),
            other => Err(DbError::not_found(format!("comparison operator {other}"))),
        }
    }
}

/// `row[field] <op> operand`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    field: usize,
    op: CompareOp,
    operand: Field,
}

impl Predicate {
    pub fn new(field: usize, op: CompareOp, operand: impl Into<Field>) -> Self {
        Self {
            field,
            op,
            operand: operand.into(),
        }
    }

    pub fn field(&self) -> usize {
        self.field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub fn operand(&self) -> &Field {
        &self.operand
    }

    /// Check that the predicate can be evaluated against rows of `schema`
    pub(crate) fn validate(&self, schema: &Schema) -> DbResult<()> {
        let field_type = schema.field_type(self.field)?;
        if field_type != self.operand.field_type() {
            return Err(DbError::schema_mismatch(format!(
                "cannot compare {} field {} with a {} constant",
                field_type,
                self.field,
                self.operand.field_type()
            )));
        }
        Ok(())
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.field(self.field)
            .is_some_and(|value| value.compare(self.op, &self.operand))
    }
}

/// `left[left_field] <op> right[right_field]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinPredicate {
    left_field: usize,
    op: CompareOp,
    right_field: usize,
}

impl JoinPredicate {
    pub fn new(left_field: usize, op: CompareOp, right_field: usize) -> Self {
        Self {
            left_field,
            op,
            right_field,
        }
    }

    pub fn left_field(&self) -> usize {
        self.left_field
    }

    pub fn right_field(&self) -> usize {
        self.right_field
    }

    pub fn op(&self) -> CompareOp {
        self.op
    }

    pub(crate) fn validate(&self, left: &Schema, right: &Schema) -> DbResult<()> {
        let left_type = left.field_type(self.left_field)?;
        let right_type = right.field_type(self.right_field)?;
        if left_type != right_type {
            return Err(DbError::schema_mismatch(format!(
                "cannot join {left_type} field {} with {right_type} field {}",
                self.left_field, self.right_field
            )));
        }
        Ok(())
    }

    pub fn matches(&self, left: &Row, right: &Row) -> bool {
        match (left.field(self.left_field), right.field(self.right_field)) {
            (Some(l), Some(r)) => l.compare(self.op, r),
            _ => false,
        }
    }
}
