//! SQLite SQL dialect.
//!
//! SQLite differences from ANSI:
//! - ANSI identifier quoting (`"`)
//! - No native boolean type; stores 1/0
//! - Date/time stored as TEXT/REAL/INTEGER; DATE() normalizes to YYYY-MM-DD
//! - Window functions require SQLite 3.25+

use super::helpers;
use super::SqlDialect;

/// SQLite SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct Sqlite;

impl SqlDialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_double(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn emit_date_of(&self, quoted_column: &str) -> String {
        format!("DATE({})", quoted_column)
    }
}
