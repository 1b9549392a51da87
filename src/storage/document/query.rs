//! Filter, update and aggregation vocabulary understood by every [`DocumentStore`].
//!
//! [`DocumentStore`]: super::DocumentStore

use super::{Document, ID_FIELD};
use serde_json::Value as JsonValue;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    /// Exact JSON equality of a top-level field.
    Eq { field: String, value: JsonValue },
    /// Case-insensitive substring match on a string field. An empty fragment matches
    /// every document whose field is a string.
    ContainsIgnoreCase { field: String, fragment: String },
    /// Numeric field strictly greater than `value`. Non-numeric fields never match.
    GreaterThan { field: String, value: f64 },
    /// Numeric field strictly less than `value`. Non-numeric fields never match.
    LessThan { field: String, value: f64 },
    And(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn id(id: impl Into<String>) -> Self {
        Filter::Eq {
            field: ID_FIELD.to_string(),
            value: JsonValue::String(id.into()),
        }
    }

    pub fn eq(field: impl Into<String>, value: JsonValue) -> Self {
        Filter::Eq {
            field: field.into(),
            value,
        }
    }

    pub fn contains_ignore_case(field: impl Into<String>, fragment: impl Into<String>) -> Self {
        Filter::ContainsIgnoreCase {
            field: field.into(),
            fragment: fragment.into(),
        }
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Filter::And(mut filters) => {
                filters.push(other);
                Filter::And(filters)
            }
            first => Filter::And(vec![first, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Filter::Not(Box::new(self))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Overwrites the given top-level fields, leaving the others untouched.
    Set(Document),
    /// Atomically appends `value` to the array at `field`, creating it when absent.
    Push { field: String, value: JsonValue },
}

/// One step of an aggregation pipeline. Stages run in order over the collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(Filter),
    /// Left join: sets `as_field` to the array of documents in `from` whose `_id`
    /// equals this document's `local_field` (empty array when none).
    Lookup {
        from: String,
        local_field: String,
        as_field: String,
    },
    /// Sets `as_field` to the average of `value_field` over the elements of the
    /// array `array_field`, rounded to `places` decimals; `0` when there is nothing
    /// numeric to average (including an absent array).
    Average {
        array_field: String,
        value_field: String,
        as_field: String,
        places: u32,
    },
    /// Orders by a numeric field; documents without one sort last. Ties keep the
    /// previous order.
    Sort { field: String, descending: bool },
    Limit(u32),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(mut self, stage: Stage) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn and_flattens_chained_filters() {
        let f = Filter::id("a")
            .and(Filter::eq("name", json!("x")))
            .and(Filter::All);
        match f {
            Filter::And(parts) => assert_eq!(parts.len(), 3),
            other => panic!("expected And, got {:?}", other),
        }
    }

    #[test]
    fn pipeline_keeps_stage_order() {
        let p = Pipeline::new()
            .stage(Stage::Match(Filter::All))
            .stage(Stage::Limit(3));
        assert_eq!(p.stages().len(), 2);
        assert_eq!(p.stages()[1], Stage::Limit(3));
    }
}
