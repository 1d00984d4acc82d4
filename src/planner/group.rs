//! Group-by planner: grouping specs to GROUP BY or window rewrites.
//!
//! Each spec is classified as a direct column or a relation path, resolved,
//! and then the request as a whole picks one of three shapes:
//!
//! 1. top-N-per-group: some spec asked for a within-group `limit` (no page).
//!    ROW_NUMBER() partitions on that spec's column; rows keep `rn <= N`.
//! 2. deterministic representative: plain grouping plus an explicit order
//!    preference. ROW_NUMBER() over all group columns, keeping `rn = 1`.
//! 3. plain GROUP BY: no ordering preference. Which row's non-grouped
//!    columns are returned is engine-chosen; known limitation.
//!
//! At most one spec per request may carry a window limit; the first wins
//! and later ones are dropped with a warning.

use tracing::warn;

use super::plan::{QueryPlan, RowFilter, WindowPlan};
use super::relation::{self, ResolvedPath};
use crate::model::{EntityDescriptor, ModelRegistry};
use crate::request::GroupSpec;
use crate::schema::ColumnTypeMap;
use crate::sql::expr::{self, Expr, WindowOrderBy};
use crate::sql::query::SelectExpr;
use crate::sql::SortDir;

/// A grouping spec that survived resolution, with everything the
/// hierarchy builder needs to reshape flat rows.
#[derive(Debug, Clone)]
pub struct ResolvedGroup {
    pub spec: GroupSpec,
    /// Key of the group value in flat result rows: the column name for
    /// direct columns, the path with dots flattened for relation paths
    /// (`block.manager_id` -> `block_manager_id`).
    pub key_alias: String,
    /// Dotted relation prefix when grouping followed a relation path.
    pub relation_prefix: Option<String>,
}

struct Classified {
    group: ResolvedGroup,
    column: Expr,
    /// Table owning the group column, for group-level search predicates.
    table: String,
    column_name: String,
}

/// Apply `specs` to the plan. Invalid specs are dropped with a warning;
/// the returned list holds the survivors in request order.
pub fn apply_grouping(
    plan: &mut QueryPlan,
    registry: &ModelRegistry,
    entity: &EntityDescriptor,
    types: &ColumnTypeMap,
    specs: &[GroupSpec],
) -> Vec<ResolvedGroup> {
    let mut classified = Vec::with_capacity(specs.len());

    for spec in specs {
        match classify(plan, registry, entity, types, spec) {
            Some(entry) => classified.push(entry),
            None => continue,
        }
    }

    if classified.is_empty() {
        return Vec::new();
    }

    // Group-level search narrows rows before any partition is computed.
    for entry in &classified {
        if let Some(search) = entry
            .group
            .spec
            .config
            .as_ref()
            .and_then(|cfg| cfg.search.as_deref())
        {
            plan.add_predicate(expr::like_contains(
                expr::table_col(&entry.table, &entry.column_name),
                search,
            ));
        }
    }

    // One window limit per request: first wins, the rest are dropped.
    let mut window_index = None;
    for (index, entry) in classified.iter().enumerate() {
        let wants = entry
            .group
            .spec
            .config
            .as_ref()
            .is_some_and(|cfg| cfg.wants_window_limit());
        if !wants {
            continue;
        }
        if window_index.is_none() {
            window_index = Some(index);
        } else {
            warn!(
                target_path = %entry.group.spec.target,
                "only one group may limit rows per group; dropping extra limit"
            );
        }
    }

    if let Some(index) = window_index {
        let entry = &classified[index];
        let cfg = entry.group.spec.config.as_ref();
        let limit = cfg.and_then(|c| c.limit).unwrap_or(1);

        plan.set_window(WindowPlan {
            partition_by: vec![entry.column.clone()],
            order_by: vec![window_order(entity, types, cfg)],
            filter: RowFilter::TopN(limit),
        });
    } else if let Some(order) = classified.iter().find_map(|entry| {
        let cfg = entry.group.spec.config.as_ref()?;
        cfg.order_by.as_ref()?;
        Some(window_order(entity, types, Some(cfg)))
    }) {
        // Explicit order preference without a limit: pick one deterministic
        // representative row per group instead of a plain GROUP BY.
        plan.set_window(WindowPlan {
            partition_by: classified.iter().map(|e| e.column.clone()).collect(),
            order_by: vec![order],
            filter: RowFilter::First,
        });
    } else {
        for entry in &classified {
            plan.add_group_column(entry.column.clone());
        }
    }

    classified.into_iter().map(|entry| entry.group).collect()
}

fn classify(
    plan: &mut QueryPlan,
    registry: &ModelRegistry,
    entity: &EntityDescriptor,
    types: &ColumnTypeMap,
    spec: &GroupSpec,
) -> Option<Classified> {
    if spec.target.contains('.') {
        let resolved = match relation::resolve(registry, entity, &spec.target) {
            Ok(resolved) => resolved,
            Err(err) => {
                warn!(target_path = %spec.target, %err, "dropping unresolvable grouping");
                return None;
            }
        };
        Some(install_path(plan, spec, resolved))
    } else {
        if !types.contains_key(&spec.target) && !entity.has_column(&spec.target) {
            warn!(
                column = %spec.target,
                entity = %entity.name,
                "dropping grouping on unknown column"
            );
            return None;
        }
        Some(Classified {
            group: ResolvedGroup {
                spec: spec.clone(),
                key_alias: spec.target.clone(),
                relation_prefix: None,
            },
            column: expr::table_col(&entity.table, &spec.target),
            table: entity.table.clone(),
            column_name: spec.target.clone(),
        })
    }
}

fn install_path(plan: &mut QueryPlan, spec: &GroupSpec, resolved: ResolvedPath) -> Classified {
    for step in &resolved.joins {
        plan.add_left_join(&step.table, step.on.clone());
    }
    plan.add_eager_load(&resolved.eager_load);

    // The joined column is not covered by the base star; select it under a
    // flattened alias so reshaping can key on it.
    let key_alias = spec.target.replace('.', "_");
    plan.add_select(SelectExpr::new(resolved.qualified()).with_alias(&key_alias));

    Classified {
        group: ResolvedGroup {
            spec: spec.clone(),
            key_alias,
            relation_prefix: Some(resolved.eager_load.clone()),
        },
        column: resolved.qualified(),
        table: resolved.table,
        column_name: resolved.column,
    }
}

/// The ORDER BY inside the OVER clause. An explicit preference is validated
/// against the schema; otherwise ranking falls back to the primary key so
/// the window stays syntactically valid on every dialect.
fn window_order(
    entity: &EntityDescriptor,
    types: &ColumnTypeMap,
    cfg: Option<&crate::request::GroupConfig>,
) -> WindowOrderBy {
    if let Some(cfg) = cfg {
        if let Some(column) = cfg.order_by.as_deref() {
            if types.contains_key(column) || entity.has_column(column) {
                let expr = expr::table_col(&entity.table, column);
                return match cfg.order_direction.unwrap_or(SortDir::Asc) {
                    SortDir::Asc => WindowOrderBy::asc(expr),
                    SortDir::Desc => WindowOrderBy::desc(expr),
                };
            }
            warn!(column, "order preference on unknown column, using primary key");
        }
    }
    WindowOrderBy::asc(expr::table_col(&entity.table, &entity.primary_key))
}
