//! Filter compiler: typed predicates and ordering from parsed terms.
//!
//! Every term was already lexically parsed; this pass resolves each one
//! against the reflected column types and picks the comparison the type
//! calls for. Strings match by substring, numerics and booleans by
//! equality, dates by truncated day. Unknown columns are ignored, never
//! errors, so stale client payloads cannot break a request.

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::warn;

use super::plan::QueryPlan;
use crate::request::{FilterOp, FilterTerm, OrderTerm};
use crate::schema::{ColumnTypeMap, SemanticType};
use crate::sql::expr::{self, Expr, ExprExt};

/// Apply every `search_by_*` term to the plan.
pub fn apply_search(plan: &mut QueryPlan, types: &ColumnTypeMap, filters: &[FilterTerm]) {
    for term in filters {
        apply_filter_term(plan, types, term);
    }
}

/// Apply every `order_by_*` term, in encounter order. Columns the schema
/// does not know are skipped.
pub fn apply_order(plan: &mut QueryPlan, types: &ColumnTypeMap, orders: &[OrderTerm]) {
    for term in orders {
        if types.contains_key(&term.column) {
            plan.add_order(&term.column, term.dir);
        }
    }
}

fn apply_filter_term(plan: &mut QueryPlan, types: &ColumnTypeMap, term: &FilterTerm) {
    match term.op {
        FilterOp::Equality => {
            if let Some(semantic) = types.get(&term.column) {
                apply_equality(plan, &term.column, *semantic, &term.value);
            }
        }
        FilterOp::RangeMin | FilterOp::RangeMax => {
            apply_suffixed(plan, types, term, |plan, column, value| {
                let Some(bound) = numeric_literal(value) else {
                    warn!(column, "non-numeric range bound, skipping");
                    return;
                };
                let qualified = expr::table_col(plan.table(), column);
                plan.add_predicate(match term.op {
                    FilterOp::RangeMin => qualified.gte(bound),
                    _ => qualified.lte(bound),
                });
            });
        }
        FilterOp::DateFrom | FilterOp::DateTo => {
            apply_suffixed(plan, types, term, |plan, column, value| {
                let Some(day) = day_literal(value) else {
                    warn!(column, "unparseable date bound, skipping");
                    return;
                };
                let truncated = expr::date_of(Some(plan.table()), column);
                plan.add_predicate(match term.op {
                    FilterOp::DateFrom => truncated.gte(expr::lit_str(&day)),
                    _ => truncated.lte(expr::lit_str(&day)),
                });
            });
        }
    }
}

/// Resolve a suffixed term against the schema.
///
/// `search_by_price_min` usually means a lower bound on `price`, but a table
/// may genuinely have a column named `price_min`. The schema decides: if the
/// stripped column exists with a compatible type, the bound applies; if only
/// the literal suffixed column exists, the term is re-read as an equality
/// filter on it.
fn apply_suffixed<F>(plan: &mut QueryPlan, types: &ColumnTypeMap, term: &FilterTerm, bound: F)
where
    F: FnOnce(&mut QueryPlan, &str, &Value),
{
    if let Some(semantic) = types.get(&term.column) {
        let compatible = match term.op {
            FilterOp::RangeMin | FilterOp::RangeMax => semantic.supports_range(),
            _ => semantic.supports_date_window(),
        };
        if compatible {
            bound(plan, &term.column, &term.value);
            return;
        }
        warn!(
            column = %term.column,
            op = ?term.op,
            "range/date bound on incompatible column type, skipping"
        );
        return;
    }

    // The suffix may be part of the column name itself.
    let literal = format!("{}{}", term.column, term.op.suffix());
    if let Some(semantic) = types.get(&literal) {
        apply_equality(plan, &literal, *semantic, &term.value);
    }
}

fn apply_equality(plan: &mut QueryPlan, column: &str, semantic: SemanticType, value: &Value) {
    let table = plan.table().to_string();

    match semantic {
        SemanticType::String => {
            let text = text_of(value);
            plan.add_predicate(expr::like_contains(expr::table_col(&table, column), &text));
        }
        SemanticType::Json => {
            warn!(column, "equality filter on a json column, skipping");
        }
        SemanticType::Integer | SemanticType::Numeric => {
            let Some(literal) = numeric_literal(value) else {
                warn!(column, "non-numeric value for numeric column, skipping");
                return;
            };
            plan.add_predicate(expr::table_col(&table, column).eq(literal));
        }
        SemanticType::Boolean => {
            let Some(flag) = bool_of(value) else {
                warn!(column, "unrecognized boolean value, skipping");
                return;
            };
            plan.add_predicate(expr::table_col(&table, column).eq(expr::lit_bool(flag)));
        }
        SemanticType::Date => {
            let Some(day) = day_literal(value) else {
                warn!(column, "unparseable date value, skipping");
                return;
            };
            plan.add_predicate(expr::date_of(Some(table.as_str()), column).eq(expr::lit_str(&day)));
        }
    }
}

// =============================================================================
// Value coercion
// =============================================================================

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn numeric_literal(value: &Value) -> Option<Expr> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(expr::lit_int(i))
            } else {
                n.as_f64().and_then(finite_float)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                Some(expr::lit_int(i))
            } else {
                trimmed.parse::<f64>().ok().and_then(finite_float)
            }
        }
        // Booleans reach numeric columns as 1/0.
        Value::Bool(b) => Some(expr::lit_int(i64::from(*b))),
        _ => None,
    }
}

// "nan"/"inf" parse as f64 but have no SQL literal form.
fn finite_float(f: f64) -> Option<Expr> {
    f.is_finite().then(|| expr::lit_float(f))
}

fn bool_of(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Normalize a date or datetime value to its `YYYY-MM-DD` day.
fn day_literal(value: &Value) -> Option<String> {
    let text = value.as_str()?.trim();

    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(day.format("%Y-%m-%d").to_string());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(moment) = NaiveDateTime::parse_from_str(text, format) {
            return Some(moment.date().format("%Y-%m-%d").to_string());
        }
    }
    None
}
