//! Request parsing: flat wire payload to typed request.
//!
//! Inbound payloads are loosely typed maps following lexical key
//! conventions (`search_by_<col>`, `order_by_<col>`, `group_bies`, ...).
//! Everything stringly-typed is resolved here, once, into enum-tagged terms
//! the planner can match exhaustively. Parsing is tolerant by contract:
//! malformed individual entries are dropped with a warning, never fatal.

use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::sql::SortDir;

/// Result type for request parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Errors for payloads that cannot be parsed at all.
///
/// Individual bad entries inside a valid payload are dropped, not errored.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("request payload must be a JSON object, got {got}")]
    NotAnObject { got: &'static str },
}

// =============================================================================
// Filter / order terms
// =============================================================================

/// Lexical reading of a `search_by_*` key suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    /// `search_by_<col>`: type-dispatched comparison.
    Equality,
    /// `search_by_<col>_min`: inclusive lower bound (numeric columns).
    RangeMin,
    /// `search_by_<col>_max`: inclusive upper bound (numeric columns).
    RangeMax,
    /// `search_by_<col>_from`: inclusive day lower bound (date columns).
    DateFrom,
    /// `search_by_<col>_to`: inclusive day upper bound (date columns).
    DateTo,
}

impl FilterOp {
    /// The key suffix this op was parsed from, for reconstructing the
    /// literal column name when the schema says the suffix was part of it.
    pub fn suffix(self) -> &'static str {
        match self {
            FilterOp::Equality => "",
            FilterOp::RangeMin => "_min",
            FilterOp::RangeMax => "_max",
            FilterOp::DateFrom => "_from",
            FilterOp::DateTo => "_to",
        }
    }
}

/// One parsed `search_by_*` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterTerm {
    /// Column name with the op suffix lexically stripped. A column that
    /// genuinely ends in `_min`/`_max`/`_from`/`_to` is restored by the
    /// filter compiler against the reflected schema.
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

/// One parsed `order_by_*` entry, in payload encounter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: String,
    pub dir: SortDir,
}

// =============================================================================
// Group specs
// =============================================================================

/// Aggregate operation requested in a group config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateOp {
    pub fn name(self) -> &'static str {
        match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Avg => "avg",
            AggregateOp::Max => "max",
            AggregateOp::Min => "min",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "count" => Some(AggregateOp::Count),
            "sum" => Some(AggregateOp::Sum),
            "avg" => Some(AggregateOp::Avg),
            "max" => Some(AggregateOp::Max),
            "min" => Some(AggregateOp::Min),
            _ => None,
        }
    }
}

/// One aggregation request: an operation over a named column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub op: AggregateOp,
    pub column: String,
}

/// Per-group configuration attached to a `group_bies` entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupConfig {
    pub limit: Option<u64>,
    pub page: Option<u64>,
    pub order_by: Option<String>,
    pub order_direction: Option<SortDir>,
    /// LIKE filter applied to the group column before partitioning.
    pub search: Option<String>,
    pub aggregations: Vec<Aggregation>,
}

impl GroupConfig {
    /// A limit without a page requests top-N rows within each group,
    /// which needs a window-function rewrite.
    pub fn wants_window_limit(&self) -> bool {
        self.limit.is_some() && self.page.is_none()
    }
}

/// One entry of `group_bies`: a column or dotted relation path, with
/// optional configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub target: String,
    pub config: Option<GroupConfig>,
}

impl GroupSpec {
    pub fn bare(target: &str) -> Self {
        Self {
            target: target.into(),
            config: None,
        }
    }

    pub fn with_config(target: &str, config: GroupConfig) -> Self {
        Self {
            target: target.into(),
            config: Some(config),
        }
    }
}

// =============================================================================
// Parsed request
// =============================================================================

/// The fully parsed request: the planner's sole input besides the entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRequest {
    pub filters: Vec<FilterTerm>,
    pub orders: Vec<OrderTerm>,
    pub group_bies: Vec<GroupSpec>,
    pub hierarchical: bool,
    pub is_all: bool,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

impl ParsedRequest {
    /// Parse a JSON payload into a typed request.
    ///
    /// Key encounter order is preserved for filters and orders. Individual
    /// malformed entries are dropped with a warning.
    pub fn parse(payload: &Value) -> ParseResult<Self> {
        let map = payload.as_object().ok_or(ParseError::NotAnObject {
            got: json_type_name(payload),
        })?;

        let mut request = ParsedRequest::default();

        for (key, value) in map {
            if let Some(column_key) = key.strip_prefix("search_by_") {
                if let Some(term) = parse_filter_term(column_key, value) {
                    request.filters.push(term);
                }
            } else if let Some(column) = key.strip_prefix("order_by_") {
                if let Some(term) = parse_order_term(column, value) {
                    request.orders.push(term);
                }
            } else {
                match key.as_str() {
                    "group_bies" => request.group_bies = parse_group_bies(value),
                    "hierarchical" => request.hierarchical = truthy(value),
                    "is_all" => request.is_all = truthy(value),
                    "page" => request.page = parse_u64(value),
                    "limit" => request.limit = parse_u64(value),
                    _ => {}
                }
            }
        }

        Ok(request)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Entry parsers
// =============================================================================

fn parse_filter_term(column_key: &str, value: &Value) -> Option<FilterTerm> {
    if is_skippable(value) {
        return None;
    }

    let (column, op) = if let Some(base) = column_key.strip_suffix("_min") {
        (base, FilterOp::RangeMin)
    } else if let Some(base) = column_key.strip_suffix("_max") {
        (base, FilterOp::RangeMax)
    } else if let Some(base) = column_key.strip_suffix("_from") {
        (base, FilterOp::DateFrom)
    } else if let Some(base) = column_key.strip_suffix("_to") {
        (base, FilterOp::DateTo)
    } else {
        (column_key, FilterOp::Equality)
    };

    if column.is_empty() {
        warn!(key = column_key, "ignoring search key with empty column name");
        return None;
    }

    Some(FilterTerm {
        column: column.to_string(),
        op,
        value: value.clone(),
    })
}

fn parse_order_term(column: &str, value: &Value) -> Option<OrderTerm> {
    let dir_text = value.as_str()?;
    let dir = SortDir::parse(dir_text)?;
    if column.is_empty() {
        return None;
    }
    Some(OrderTerm {
        column: column.to_string(),
        dir,
    })
}

fn parse_group_bies(value: &Value) -> Vec<GroupSpec> {
    let mut specs = Vec::new();

    match value {
        Value::Array(entries) => {
            for entry in entries {
                match entry {
                    Value::String(target) if !target.is_empty() => {
                        specs.push(GroupSpec::bare(target));
                    }
                    Value::Object(map) => {
                        // Tolerate a config object appearing inside the array.
                        for (target, config) in map {
                            specs.push(parse_group_entry(target, config));
                        }
                    }
                    other => {
                        warn!(entry = %other, "ignoring malformed group_bies entry");
                    }
                }
            }
        }
        Value::Object(map) => {
            for (target, config) in map {
                specs.push(parse_group_entry(target, config));
            }
        }
        other => {
            warn!(value = %other, "group_bies must be an array or object, ignoring");
        }
    }

    specs
}

fn parse_group_entry(target: &str, config: &Value) -> GroupSpec {
    match config {
        Value::Object(map) => {
            let mut cfg = GroupConfig::default();

            for (key, value) in map {
                match key.as_str() {
                    "limit" => cfg.limit = parse_u64(value),
                    "page" => cfg.page = parse_u64(value),
                    "order_by" => {
                        if let Some(column) = value.as_str() {
                            cfg.order_by = Some(column.to_string());
                        }
                    }
                    "order_direction" => {
                        cfg.order_direction = value.as_str().and_then(SortDir::parse);
                    }
                    "search" => {
                        if let Some(text) = value.as_str() {
                            if !text.is_empty() {
                                cfg.search = Some(text.to_string());
                            }
                        }
                    }
                    "aggregations" => cfg.aggregations = parse_aggregations(value),
                    other => {
                        // Inline shorthand: order_by_<col>: "asc"|"desc".
                        if let Some(column) = other.strip_prefix("order_by_") {
                            if let Some(dir) = value.as_str().and_then(SortDir::parse) {
                                cfg.order_by = Some(column.to_string());
                                cfg.order_direction = Some(dir);
                            }
                        }
                    }
                }
            }

            GroupSpec::with_config(target, cfg)
        }
        // A null or scalar config reads as a bare grouping.
        _ => GroupSpec::bare(target),
    }
}

fn parse_aggregations(value: &Value) -> Vec<Aggregation> {
    let mut aggregations = Vec::new();

    let Some(map) = value.as_object() else {
        warn!("aggregations must be an object of op -> column(s), ignoring");
        return aggregations;
    };

    for (key, columns) in map {
        let Some(op) = AggregateOp::from_key(key) else {
            warn!(op = %key, "unknown aggregation operation, ignoring");
            continue;
        };

        match columns {
            Value::String(column) if !column.is_empty() => {
                aggregations.push(Aggregation {
                    op,
                    column: column.clone(),
                });
            }
            Value::Array(entries) => {
                for entry in entries {
                    if let Some(column) = entry.as_str() {
                        if !column.is_empty() {
                            aggregations.push(Aggregation {
                                op,
                                column: column.to_string(),
                            });
                        }
                    }
                }
            }
            // count: true means count rows; column is the synthetic "*".
            Value::Bool(true) if op == AggregateOp::Count => {
                aggregations.push(Aggregation {
                    op,
                    column: "*".into(),
                });
            }
            _ => {}
        }
    }

    aggregations
}

// =============================================================================
// Value coercion
// =============================================================================

/// Whether a filter value should be treated as absent.
///
/// Explicit falsy values `0`, `0.0`, `false` and `"0"` are meaningful filter
/// inputs and are kept; only null, empty strings and empty arrays skip.
pub fn is_skippable(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}

fn parse_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
