//! Predicates scoping which rows a collection mirrors.
//!
//! The same filter is used for the bulk read, for the subscription, and for
//! checking incoming events locally, so a collection never holds a row the
//! filter rejects.

use crate::record::{OwnerId, Record};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Row predicate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    /// Every row of the table.
    All,
    /// Rows owned by one user.
    Owner(OwnerId),
    /// Rows whose column equals a value.
    FieldEq { field: String, value: Value },
    /// Rows matching every inner predicate.
    And(Vec<Filter>),
}

impl Filter {
    /// Rows owned by `owner`.
    pub fn owner(owner: OwnerId) -> Self {
        Filter::Owner(owner)
    }

    /// Rows where `field == value`.
    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::FieldEq {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Combine with another predicate.
    pub fn and(self, other: Filter) -> Self {
        match (self, other) {
            (Filter::All, other) => other,
            (this, Filter::All) => this,
            (Filter::And(mut parts), Filter::And(more)) => {
                parts.extend(more);
                Filter::And(parts)
            }
            (Filter::And(mut parts), other) => {
                parts.push(other);
                Filter::And(parts)
            }
            (this, other) => Filter::And(vec![this, other]),
        }
    }

    /// Check whether a record satisfies the predicate.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Owner(owner) => record.is_owned_by(owner),
            Filter::FieldEq { field, value } => {
                record.field(field).unwrap_or(&Value::Null) == value
            }
            Filter::And(parts) => parts.iter().all(|part| part.matches(record)),
        }
    }

    /// The owner this predicate pins, if any.
    ///
    /// Inserts issued through an owner-scoped collection are stamped with it.
    pub fn pinned_owner(&self) -> Option<&OwnerId> {
        match self {
            Filter::Owner(owner) => Some(owner),
            Filter::And(parts) => parts.iter().find_map(Filter::pinned_owner),
            Filter::All | Filter::FieldEq { .. } => None,
        }
    }
}

impl Default for Filter {
    fn default() -> Self {
        Filter::All
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::All => write!(f, "*"),
            Filter::Owner(owner) => write!(f, "user_id=eq.{}", owner),
            Filter::FieldEq { field, value } => write!(f, "{}=eq.{}", field, value),
            Filter::And(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, "&")?;
                    }
                    write!(f, "{}", part)?;
                }
                Ok(())
            }
        }
    }
}
