//! Declarative record filters.

use crate::record::{FieldValue, Record};
use std::cmp::Ordering;

/// Comparison operator used by [`Predicate::Compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Less than.
    Lt,
    /// Less than or equal.
    Le,
    /// Greater than.
    Gt,
    /// Greater than or equal.
    Ge,
}

impl Comparison {
    fn accepts(self, ordering: Ordering) -> bool {
        match self {
            Comparison::Eq => ordering == Ordering::Equal,
            Comparison::Ne => ordering != Ordering::Equal,
            Comparison::Lt => ordering == Ordering::Less,
            Comparison::Le => ordering != Ordering::Greater,
            Comparison::Gt => ordering == Ordering::Greater,
            Comparison::Ge => ordering != Ordering::Less,
        }
    }
}

/// A boolean filter expression over record fields.
///
/// Predicates are plain data so they can be sent to a remote store. The
/// store evaluates them; [`Predicate::matches`] is the reference semantics.
///
/// # Example
///
/// ```rust
/// use skysync_remote::Predicate;
///
/// let open_high = Predicate::eq("done", false).and(Predicate::ge("priority", 3i64));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every record.
    All,
    /// Compares a field against a value.
    Compare {
        /// Field name.
        field: String,
        /// Operator.
        op: Comparison,
        /// Right-hand side.
        value: FieldValue,
    },
    /// The field is present and not null.
    Exists(String),
    /// A list field contains the value, or a text field contains the text.
    Contains {
        /// Field name.
        field: String,
        /// Element or substring to look for.
        value: FieldValue,
    },
    /// Every sub-predicate matches.
    And(Vec<Predicate>),
    /// At least one sub-predicate matches.
    Or(Vec<Predicate>),
    /// The sub-predicate does not match.
    Not(Box<Predicate>),
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::All
    }
}

impl Predicate {
    fn compare(field: impl Into<String>, op: Comparison, value: impl Into<FieldValue>) -> Self {
        Predicate::Compare {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    /// `field == value`
    pub fn eq(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Eq, value)
    }

    /// `field != value`
    pub fn ne(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Ne, value)
    }

    /// `field < value`
    pub fn lt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Lt, value)
    }

    /// `field <= value`
    pub fn le(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Le, value)
    }

    /// `field > value`
    pub fn gt(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Gt, value)
    }

    /// `field >= value`
    pub fn ge(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self::compare(field, Comparison::Ge, value)
    }

    /// The field is set.
    pub fn exists(field: impl Into<String>) -> Self {
        Predicate::Exists(field.into())
    }

    /// The field contains `value`.
    pub fn contains(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Predicate::Contains {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Conjunction. Nested conjunctions are flattened.
    #[must_use]
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut parts) => {
                parts.push(other);
                Predicate::And(parts)
            }
            first => Predicate::And(vec![first, other]),
        }
    }

    /// Disjunction. Nested disjunctions are flattened.
    #[must_use]
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut parts) => {
                parts.push(other);
                Predicate::Or(parts)
            }
            first => Predicate::Or(vec![first, other]),
        }
    }

    /// Negation.
    #[must_use]
    pub fn negate(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Evaluates the predicate against a record.
    ///
    /// Comparisons against a missing field or a value of an unrelated kind
    /// are false, except `Ne`, which is true.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Compare { field, op, value } => match record.get(field) {
                Some(actual) => match actual.compare(value) {
                    Some(ordering) => op.accepts(ordering),
                    None => *op == Comparison::Ne,
                },
                None => *op == Comparison::Ne,
            },
            Predicate::Exists(field) => record.get(field).is_some_and(|v| !v.is_null()),
            Predicate::Contains { field, value } => match (record.get(field), value) {
                (Some(FieldValue::List(items)), needle) => items.contains(needle),
                (Some(FieldValue::Text(text)), FieldValue::Text(needle)) => {
                    text.contains(needle.as_str())
                }
                _ => false,
            },
            Predicate::And(parts) => parts.iter().all(|p| p.matches(record)),
            Predicate::Or(parts) => parts.iter().any(|p| p.matches(record)),
            Predicate::Not(inner) => !inner.matches(record),
        }
    }
}

/// A query for records of one type.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Record type to search.
    pub record_type: String,
    /// Filter applied to every candidate.
    pub predicate: Predicate,
}

impl Query {
    /// Creates a query.
    pub fn new(record_type: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            record_type: record_type.into(),
            predicate,
        }
    }

    /// Returns true if `record` is a result of this query.
    pub fn matches(&self, record: &Record) -> bool {
        record.record_type() == self.record_type && self.predicate.matches(record)
    }
}
