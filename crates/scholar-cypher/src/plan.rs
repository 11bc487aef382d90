//! Typed query intent.
//!
//! A [`QueryPlan`] describes one pattern match between two entity kinds plus
//! filters, `count` aggregations, ordering, and a limit. It deserializes from
//! the JSON an agent produces:
//!
//! ```json
//! {
//!   "match": {"source_kind": "Author", "relationship_kind": "WORK_AUTHORED_BY",
//!             "target_kind": "Work", "direction": "OUT"},
//!   "filters": [{"field": "title", "operator": "CONTAINS", "value": "Healthcare"}],
//!   "return_fields": ["a.name", "b.title"],
//!   "limit": 25
//! }
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    #[serde(rename = "match")]
    pub pattern: MatchPattern,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub aggregations: Vec<Aggregation>,
    pub return_fields: Vec<String>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
    #[serde(default)]
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPattern {
    pub source_kind: String,
    pub relationship_kind: String,
    pub target_kind: String,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_source_var")]
    pub source_var: String,
    #[serde(default = "default_target_var")]
    pub target_var: String,
}

fn default_source_var() -> String {
    "a".to_string()
}

fn default_target_var() -> String {
    "b".to_string()
}

/// Relationship direction, read from source to target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Out,
    In,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// `var.property`, or a bare property of the target variable.
    pub field: String,
    pub operator: FilterOp,
    pub value: FilterValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "CONTAINS", alias = "contains")]
    Contains,
}

impl FilterOp {
    pub fn as_cypher(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Contains => "CONTAINS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Int(i64),
    Str(String),
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    pub function: AggregateFunction,
    pub variable: String,
    pub alias: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    #[serde(alias = "COUNT")]
    Count,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl MatchPattern {
    pub fn new(source_kind: &str, relationship_kind: &str, target_kind: &str) -> Self {
        Self {
            source_kind: source_kind.to_string(),
            relationship_kind: relationship_kind.to_string(),
            target_kind: target_kind.to_string(),
            direction: Direction::Out,
            source_var: default_source_var(),
            target_var: default_target_var(),
        }
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn vars(mut self, source: &str, target: &str) -> Self {
        self.source_var = source.to_string();
        self.target_var = target.to_string();
        self
    }
}

impl QueryPlan {
    pub fn new(pattern: MatchPattern) -> Self {
        Self {
            pattern,
            filters: Vec::new(),
            aggregations: Vec::new(),
            return_fields: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: &str, operator: FilterOp, value: impl Into<FilterValue>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            operator,
            value: value.into(),
        });
        self
    }

    pub fn count(mut self, variable: &str, alias: &str) -> Self {
        self.aggregations.push(Aggregation {
            function: AggregateFunction::Count,
            variable: variable.to_string(),
            alias: alias.to_string(),
        });
        self
    }

    pub fn returning<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.return_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn order_by(mut self, field: &str, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }
}
