//! Query planner: request terms to an executable query.
//!
//! [`QueryEngine`] is the facade: given an entity name and a parsed request
//! it runs the filter compiler, relation resolver and group planner over one
//! request-owned [`plan::QueryPlan`], then lowers the plan to a
//! [`crate::sql::Query`] plus the side products the caller needs (eager-load
//! paths, resolved groups for reshaping).

pub mod filter;
pub mod group;
pub mod plan;
pub mod relation;

use std::sync::Arc;

use serde_json::Value;

pub use group::ResolvedGroup;
pub use plan::{QueryPlan, RowFilter, WindowPlan};
pub use relation::{ResolveError, ResolvedPath};

use crate::error::{EngineError, EngineResult};
use crate::model::ModelRegistry;
use crate::request::ParsedRequest;
use crate::schema::SchemaReflector;
use crate::sql::Query;

/// Rows per page when the request asks for neither `is_all` nor a limit.
pub const DEFAULT_PER_PAGE: u64 = 15;

/// Everything the caller needs to execute and reshape one request.
#[derive(Debug)]
pub struct BuiltQuery {
    pub query: Query,
    /// Deduplicated relation paths to eager-load before serialization.
    pub eager_loads: Vec<String>,
    /// Resolved grouping levels, in request order.
    pub groups: Vec<ResolvedGroup>,
    /// Whether the caller asked for hierarchical reshaping.
    pub hierarchical: bool,
}

/// The query-construction facade.
pub struct QueryEngine {
    registry: Arc<ModelRegistry>,
    reflector: Arc<SchemaReflector>,
    default_per_page: u64,
}

impl QueryEngine {
    pub fn new(registry: Arc<ModelRegistry>, reflector: Arc<SchemaReflector>) -> Self {
        Self {
            registry,
            reflector,
            default_per_page: DEFAULT_PER_PAGE,
        }
    }

    #[must_use]
    pub fn with_default_per_page(mut self, per_page: u64) -> Self {
        self.default_per_page = per_page;
        self
    }

    /// Parse a raw payload and build in one step.
    pub fn build_from_payload(&self, entity: &str, payload: &Value) -> EngineResult<BuiltQuery> {
        let request = ParsedRequest::parse(payload)?;
        self.build(entity, &request)
    }

    /// Build the query for `entity` described by `request`.
    pub fn build(&self, entity: &str, request: &ParsedRequest) -> EngineResult<BuiltQuery> {
        let descriptor = self
            .registry
            .get(entity)
            .ok_or_else(|| EngineError::UnknownEntity {
                name: entity.to_string(),
            })?;

        let types = self.reflector.column_types(&descriptor);
        let mut plan = QueryPlan::new(&descriptor.table);

        filter::apply_search(&mut plan, &types, &request.filters);
        filter::apply_order(&mut plan, &types, &request.orders);
        let groups = group::apply_grouping(
            &mut plan,
            &self.registry,
            &descriptor,
            &types,
            &request.group_bies,
        );

        if !request.is_all {
            let per_page = request.limit.unwrap_or(self.default_per_page).max(1);
            let page = request.page.unwrap_or(1).max(1);
            // Saturate: page/limit come off the wire and can be anything.
            let offset = page.saturating_sub(1).saturating_mul(per_page);
            plan.set_pagination(per_page, offset);
        }

        let eager_loads = plan.eager_loads().to_vec();

        Ok(BuiltQuery {
            query: plan.into_query(),
            eager_loads,
            groups,
            hierarchical: request.hierarchical,
        })
    }
}
