//! Description of the table slice a collection mirrors.

use crate::filter::Filter;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Sort direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

/// What records are sorted by.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKey {
    /// The store-assigned modification time.
    Version,
    /// A column value.
    Field(String),
}

/// Ordering of a collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub key: OrderKey,
    pub direction: Direction,
}

impl OrderBy {
    /// Most recently modified first.
    pub fn newest_first() -> Self {
        Self {
            key: OrderKey::Version,
            direction: Direction::Desc,
        }
    }

    /// Sort by a column.
    pub fn field(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            key: OrderKey::Field(name.into()),
            direction,
        }
    }

    /// Compare two records under this ordering.
    ///
    /// Equal keys compare equal; callers rely on stable placement to keep
    /// arrival order among ties.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        let ord = match &self.key {
            OrderKey::Version => a.version.cmp(&b.version),
            OrderKey::Field(name) => compare_values(a.field(name), b.field(name)),
        };
        match self.direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    }
}

/// Rank of a JSON value type; nulls sort first.
fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        // RFC 3339 timestamps sort correctly as strings.
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// A filtered, optionally ordered and bounded slice of a table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub table: String,
    pub filter: Filter,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    /// All rows of `table`, unordered and unbounded.
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: Filter::All,
            order_by: None,
            limit: None,
        }
    }

    /// Set the row predicate.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the ordering.
    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by = Some(order_by);
        self
    }

    /// Order by modification time, newest first.
    pub fn newest_first(self) -> Self {
        self.order_by(OrderBy::newest_first())
    }

    /// Bound the number of mirrored rows.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Apply filter, ordering and limit to a set of rows, as the store does
    /// for a bulk read.
    pub fn select<'a>(&self, rows: impl IntoIterator<Item = &'a Record>) -> Vec<Record> {
        let mut selected: Vec<Record> = rows
            .into_iter()
            .filter(|record| self.filter.matches(record))
            .cloned()
            .collect();
        if let Some(order) = &self.order_by {
            selected.sort_by(|a, b| order.compare(a, b));
        }
        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}
