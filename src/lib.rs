//! # Quarry
//!
//! A dynamic query-construction engine: loosely-typed request payloads in,
//! safe multi-dialect SQL and reshaped results out.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │              Request Payload (flat key-value)            │
//! │   search_by_*, order_by_*, group_bies, page/limit        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [request parser]
//! ┌─────────────────────────────────────────────────────────┐
//! │            ParsedRequest (typed terms)                   │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [planner]            ┌──────────────────┐
//! ┌──────────────────────────────────────────┐    │ Schema Reflector │
//! │   QueryPlan (joins, predicates,          │◄───│ (column types,   │
//! │   grouping, window rewrites)             │    │  two-tier cache) │
//! └──────────────────────────────────────────┘    └──────────────────┘
//!                          │
//!                          ▼ [sql lowering]
//! ┌─────────────────────────────────────────────────────────┐
//! │     SQL Query (MySQL / Postgres / SQLite / T-SQL)        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ execution (external), then [hierarchy]
//! ┌─────────────────────────────────────────────────────────┐
//! │        GroupedResult (flat list or nested tree)          │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod dispatch;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod planner;
pub mod request;
pub mod schema;
pub mod sql;

pub use error::{EngineError, EngineResult};

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::dispatch::{DispatchOutcome, Dispatcher, Job, JobQueue, QueueError};
    pub use crate::error::{EngineError, EngineResult};
    pub use crate::hierarchy::{
        BuildOptions, EntitySerializer, GroupData, GroupNode, GroupedResult, HierarchyBuilder,
        JsonSerializer,
    };
    pub use crate::model::{Cardinality, EntityDescriptor, ModelRegistry, RelationDescriptor};
    pub use crate::planner::{BuiltQuery, QueryEngine, DEFAULT_PER_PAGE};
    pub use crate::request::{GroupConfig, GroupSpec, ParsedRequest};
    pub use crate::schema::{
        DistributedCache, Driver, Introspector, SchemaCache, SchemaReflector, SemanticType,
    };
    pub use crate::sql::{Dialect, Query, SortDir, SqlDialect};
}
