//! Schema reflection: vendor column types normalized to semantic types.
//!
//! Every database engine reports column types in its own vocabulary
//! (`varchar(255)`, `nvarchar`, `tinyint(1)`, `timestamptz`, ...). The
//! planner only cares about a handful of semantic categories, because the
//! category decides the comparison operator: strings get LIKE, numerics get
//! equality and range bounds, dates get day-truncated matching. This module
//! owns that normalization plus the two-tier cache in front of live
//! introspection.

pub mod cache;
pub mod introspect;
pub mod reflect;

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

pub use cache::{DistributedCache, SchemaCache};
pub use introspect::{Driver, IntrospectError, Introspector, RawColumn};
pub use reflect::SchemaReflector;

/// Map of column name to its semantic type.
///
/// BTreeMap keeps iteration deterministic, which keeps generated SQL and
/// cache payloads stable across runs.
pub type ColumnTypeMap = BTreeMap<String, SemanticType>;

/// The semantic category of a column, driving filter operator selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    /// Text-like columns. Filters compile to LIKE '%value%'.
    String,
    /// Integer columns. Filters compile to exact equality.
    Integer,
    /// Fixed/floating point columns. Equality plus min/max range bounds.
    Numeric,
    /// Boolean columns (including MySQL's tinyint(1)).
    Boolean,
    /// Date and datetime columns. Equality is day-truncated; from/to bounds.
    Date,
    /// JSON document columns. Equality filters do not apply; terms against
    /// them are skipped.
    Json,
}

impl SemanticType {
    /// Whether min/max range suffixes apply to this type.
    pub fn supports_range(self) -> bool {
        matches!(self, SemanticType::Integer | SemanticType::Numeric)
    }

    /// Whether from/to date-window suffixes apply to this type.
    pub fn supports_date_window(self) -> bool {
        self == SemanticType::Date
    }
}

// =============================================================================
// Vendor type normalization
// =============================================================================

static INTEGER_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "int", "integer", "bigint", "smallint", "mediumint", "tinyint", "serial", "bigserial",
        "smallserial", "int2", "int4", "int8", "year",
    ]
});

static NUMERIC_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "decimal", "numeric", "float", "double", "double precision", "real", "money",
        "smallmoney", "float4", "float8",
    ]
});

static DATE_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "date",
        "datetime",
        "datetime2",
        "datetimeoffset",
        "smalldatetime",
        "timestamp",
        "timestamptz",
        "timestamp with time zone",
        "timestamp without time zone",
    ]
});

static STRING_KEYWORDS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "char", "varchar", "nchar", "nvarchar", "text", "tinytext", "mediumtext", "longtext",
        "ntext", "character", "character varying", "citext", "enum", "set", "uuid",
        "uniqueidentifier", "clob",
    ]
});

static BOOLEAN_KEYWORDS: Lazy<Vec<&'static str>> =
    Lazy::new(|| vec!["bool", "boolean", "bit"]);

/// Normalize a vendor-reported column type into a semantic type.
///
/// The vendor string is lowercased and stripped of its length/precision
/// suffix, then matched against exact keyword sets with substring fallbacks
/// for vendor variants the sets do not enumerate. One exception runs first:
/// MySQL's `tinyint(1)` is conventionally a boolean and must be classified
/// before any integer rule sees `tinyint`.
pub fn normalize_type(vendor_type: &str) -> SemanticType {
    let lowered = vendor_type.trim().to_lowercase();

    // tinyint(1) is MySQL's boolean; check before stripping the suffix.
    if lowered.starts_with("tinyint(1)") {
        return SemanticType::Boolean;
    }

    // "decimal(10,2)" -> "decimal", "int(10) unsigned" -> "int"
    let base = lowered
        .split('(')
        .next()
        .unwrap_or(&lowered)
        .trim()
        .to_string();
    let base = base.strip_suffix(" unsigned").unwrap_or(&base).trim();

    if BOOLEAN_KEYWORDS.iter().any(|k| *k == base) {
        return SemanticType::Boolean;
    }
    if DATE_KEYWORDS.iter().any(|k| *k == base) {
        return SemanticType::Date;
    }
    if INTEGER_KEYWORDS.iter().any(|k| *k == base) {
        return SemanticType::Integer;
    }
    if NUMERIC_KEYWORDS.iter().any(|k| *k == base) {
        return SemanticType::Numeric;
    }
    if STRING_KEYWORDS.iter().any(|k| *k == base) {
        return SemanticType::String;
    }

    // Substring fallbacks for vendor variants (jsonb, mediumint, varchar2).
    if base.contains("json") {
        return SemanticType::Json;
    }
    if base.contains("int") {
        return SemanticType::Integer;
    }
    if base.contains("char") || base.contains("text") {
        return SemanticType::String;
    }
    if base.contains("date") || base.contains("timestamp") {
        return SemanticType::Date;
    }
    if base.contains("dec") || base.contains("num") || base.contains("float") {
        return SemanticType::Numeric;
    }

    // Anything else filters as text, the most permissive reading.
    SemanticType::String
}
