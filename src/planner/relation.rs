//! Relation resolver: dotted paths to join plans and eager-load paths.

use thiserror::Error;

use crate::model::{Cardinality, EntityDescriptor, ModelRegistry};
use crate::sql::expr::{self, Expr, ExprExt};

/// Result type for relation resolution.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Why a dotted path failed to resolve. Callers drop the offending spec
/// with a warning; resolution failures are never fatal to a request.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("entity '{entity}' declares no relation named '{relation}'")]
    UnknownRelation { entity: String, relation: String },

    #[error("relation target entity '{name}' is not registered")]
    UnknownEntity { name: String },

    #[error("column '{column}' does not exist on entity '{entity}'")]
    UnknownColumn { entity: String, column: String },

    #[error("path '{path}' is empty or has no terminal column")]
    MalformedPath { path: String },
}

/// One LEFT JOIN required by a resolved path.
#[derive(Debug, Clone)]
pub struct JoinStep {
    pub table: String,
    pub on: Expr,
}

/// A fully validated relation path.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    /// Joins to apply, in hop order. The plan deduplicates tables.
    pub joins: Vec<JoinStep>,
    /// Table owning the terminal column.
    pub table: String,
    /// The terminal column name.
    pub column: String,
    /// Dotted relation prefix for eager loading (`block`, `block.manager`).
    pub eager_load: String,
}

impl ResolvedPath {
    /// The terminal column qualified with its owning table.
    pub fn qualified(&self) -> Expr {
        expr::table_col(&self.table, &self.column)
    }
}

/// Resolve `dotted` (e.g. `block.manager.id`) starting from `entity`.
///
/// Every segment except the last must name a declared relation on the
/// current entity; the terminal segment must be a column on the final
/// entity. Join orientation follows foreign key placement: a belongs-to
/// holds the key locally, has-one/has-many place it on the target.
pub fn resolve(
    registry: &ModelRegistry,
    entity: &EntityDescriptor,
    dotted: &str,
) -> ResolveResult<ResolvedPath> {
    let segments: Vec<&str> = dotted.split('.').filter(|s| !s.is_empty()).collect();
    let Some((&column, hops)) = segments.split_last() else {
        return Err(ResolveError::MalformedPath {
            path: dotted.to_string(),
        });
    };
    if hops.is_empty() {
        return Err(ResolveError::MalformedPath {
            path: dotted.to_string(),
        });
    }

    let mut joins = Vec::with_capacity(hops.len());
    let mut current = entity.clone();

    for &hop in hops {
        let relation = current
            .relation(hop)
            .ok_or_else(|| ResolveError::UnknownRelation {
                entity: current.name.clone(),
                relation: hop.to_string(),
            })?
            .clone();

        let target = registry
            .get(&relation.target)
            .ok_or_else(|| ResolveError::UnknownEntity {
                name: relation.target.clone(),
            })?;

        let on = match relation.cardinality {
            // This table holds the foreign key pointing at the target.
            Cardinality::BelongsTo => expr::table_col(&current.table, &relation.foreign_key)
                .eq(expr::table_col(&target.table, &relation.owner_key)),
            // The target holds the foreign key pointing back here.
            Cardinality::HasOne | Cardinality::HasMany => {
                expr::table_col(&target.table, &relation.foreign_key)
                    .eq(expr::table_col(&current.table, &relation.owner_key))
            }
        };

        joins.push(JoinStep {
            table: target.table.clone(),
            on,
        });
        current = (*target).clone();
    }

    // Terminal column must exist on the final entity. Entities that declare
    // no column list cannot be checked and are taken on trust.
    if !current.columns.is_empty() && !current.has_column(column) {
        return Err(ResolveError::UnknownColumn {
            entity: current.name.clone(),
            column: column.to_string(),
        });
    }

    Ok(ResolvedPath {
        joins,
        table: current.table.clone(),
        column: column.to_string(),
        eager_load: hops.join("."),
    })
}
