//! Query descriptions for live subscriptions.
//!
//! Only the filter kinds the application actually issues are modelled:
//! field equality, array membership and single-field ordering with an
//! optional result cap.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::value::{Fields, Value};

/// A single query filter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Filter {
    /// `field == value`
    Eq(String, Value),
    /// `field` is an array containing `value`
    ArrayContains(String, Value),
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq(field.into(), value.into())
    }

    pub fn array_contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::ArrayContains(field.into(), value.into())
    }

    /// Whether the given document fields satisfy this filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        match self {
            Self::Eq(field, value) => fields.get(field) == Some(value),
            Self::ArrayContains(field, value) => fields
                .get(field)
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(value)),
        }
    }
}

/// Single-field ordering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// A subscription query: filters, ordering and an optional result cap.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_asc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending: false,
        });
        self
    }

    pub fn order_desc(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Whether the given fields satisfy every filter.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|f| f.matches(fields))
    }

    /// Compare two documents under this query's ordering.
    ///
    /// Documents missing the order field sort last regardless of
    /// direction, so freshly created documents without a resolved server
    /// timestamp do not jump ahead of real data.
    pub fn compare(&self, a: &Fields, b: &Fields) -> Ordering {
        let Some(order) = &self.order_by else {
            return Ordering::Equal;
        };
        match (a.get(&order.field), b.get(&order.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(va), Some(vb)) => {
                let ord = compare_values(va, vb);
                if order.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        }
    }
}

/// Total-enough ordering over the value kinds used as order keys.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn fields(pairs: &[(&str, Value)]) -> Fields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn eq_and_array_contains() {
        let f = fields(&[
            ("category", Value::from("Villa")),
            (
                "participants",
                Value::Array(vec![Value::from("u1"), Value::from("u2")]),
            ),
        ]);
        assert!(Filter::eq("category", "Villa").matches(&f));
        assert!(!Filter::eq("category", "Land").matches(&f));
        assert!(Filter::array_contains("participants", "u2").matches(&f));
        assert!(!Filter::array_contains("participants", "u3").matches(&f));
        assert!(!Filter::array_contains("category", "Villa").matches(&f));
    }

    #[test]
    fn descending_timestamps_put_newest_first() {
        let t1 = Utc.timestamp_opt(1_000, 0).unwrap();
        let t2 = Utc.timestamp_opt(2_000, 0).unwrap();
        let q = Query::new().order_desc("createdAt");
        let older = fields(&[("createdAt", Value::Timestamp(t1))]);
        let newer = fields(&[("createdAt", Value::Timestamp(t2))]);
        assert_eq!(q.compare(&newer, &older), Ordering::Less);
    }

    #[test]
    fn missing_order_field_sorts_last() {
        let q = Query::new().order_desc("createdAt");
        let with = fields(&[("createdAt", Value::Timestamp(Utc::now()))]);
        let without = fields(&[]);
        assert_eq!(q.compare(&with, &without), Ordering::Less);
    }
}
