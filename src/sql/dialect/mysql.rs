//! MySQL SQL dialect.
//!
//! MySQL differences from ANSI:
//! - Backtick identifier quoting (`` `name` ``)
//! - Boolean is TINYINT(1), returns 1/0
//! - LIMIT ... OFFSET ... for pagination
//! - DATE() for date truncation
//! - Window functions require MySQL 8.0+

use super::helpers;
use super::SqlDialect;

/// MySQL SQL dialect.
#[derive(Debug, Clone, Copy)]
pub struct MySql;

impl SqlDialect for MySql {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        helpers::quote_backtick(ident)
    }

    fn format_bool(&self, b: bool) -> &'static str {
        helpers::format_bool_numeric(b)
    }

    // Uses default emit_limit_offset (LIMIT ... OFFSET ...)

    fn emit_date_of(&self, quoted_column: &str) -> String {
        format!("DATE({})", quoted_column)
    }
}
