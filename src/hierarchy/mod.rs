//! Hierarchical response builder: flat rows to nested group trees.
//!
//! Reshaping is pure in-memory work over rows the query already fetched.
//! Levels follow the resolved grouping order: each level partitions its
//! slice by the level's key, emits one node per distinct value, and recurses
//! into the remaining levels. The terminal level serializes leaf entities
//! with group-implied relations stripped.

use serde::Serialize;
use serde_json::{Map, Number, Value};
use tracing::warn;

use crate::planner::ResolvedGroup;
use crate::request::{AggregateOp, Aggregation};

// =============================================================================
// Serializer seam
// =============================================================================

/// Per-entity serialization, with relation exclusion.
///
/// The engine never defines what an entity looks like on the wire; the host
/// application does. The one capability the tree builder needs beyond plain
/// serialization is omitting named relations from the output.
pub trait EntitySerializer: Send + Sync {
    /// The row's field map, with `exclude_relations` keys omitted.
    fn serialize(&self, row: &Value, exclude_relations: &[String]) -> Value;

    /// The serialized related entity at dotted `path`, if present on the row.
    fn relation(&self, row: &Value, path: &str) -> Option<Value> {
        let mut current = row;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        if current.is_null() {
            None
        } else {
            Some(current.clone())
        }
    }
}

/// Passthrough serializer for rows that are already JSON maps.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl EntitySerializer for JsonSerializer {
    fn serialize(&self, row: &Value, exclude_relations: &[String]) -> Value {
        match row {
            Value::Object(map) => Value::Object(
                map.iter()
                    .filter(|(key, _)| !exclude_relations.iter().any(|e| e == *key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

// =============================================================================
// Result shapes
// =============================================================================

/// Pagination metadata attached to a sliced list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationMeta {
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

/// The contents of one group node: deeper groups or leaf entities.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GroupData {
    Groups(Vec<GroupNode>),
    Leaves(Vec<Value>),
}

/// One node of the hierarchical tree.
#[derive(Debug, Clone, Serialize)]
pub struct GroupNode {
    pub group: Value,
    pub data: GroupData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
}

/// The reshaped result: untouched flat rows, or a grouped tree.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum GroupedResult {
    Flat(Vec<Value>),
    Tree {
        groups: Vec<GroupNode>,
        #[serde(skip_serializing_if = "Option::is_none")]
        pagination: Option<PaginationMeta>,
    },
}

/// Caller-controlled reshaping options.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub hierarchical: bool,
    /// Paginate the top-level groups. Independent of per-group pagination;
    /// the builder never infers one from the other.
    pub paginate: bool,
    pub page: u64,
    pub per_page: u64,
    /// Relations to keep on leaves even when a grouping implies them.
    pub include_relations: Vec<String>,
}

// =============================================================================
// Builder
// =============================================================================

/// Builds the hierarchical tree from flat query results.
pub struct HierarchyBuilder<S: EntitySerializer> {
    serializer: S,
}

impl<S: EntitySerializer> HierarchyBuilder<S> {
    pub fn new(serializer: S) -> Self {
        Self { serializer }
    }

    pub fn build(
        &self,
        rows: Vec<Value>,
        groups: &[ResolvedGroup],
        options: &BuildOptions,
    ) -> GroupedResult {
        let excluded = implied_relations(groups, &options.include_relations);

        if !options.hierarchical || groups.is_empty() {
            return GroupedResult::Flat(
                rows.iter()
                    .map(|row| self.serializer.serialize(row, &excluded))
                    .collect(),
            );
        }

        let mut nodes = self.build_level(rows, groups, 0, &excluded);

        let mut pagination = None;
        if options.paginate && options.per_page > 0 {
            let total = nodes.len() as u64;
            let page = options.page.max(1);
            let start = page.saturating_sub(1).saturating_mul(options.per_page);
            nodes = nodes
                .into_iter()
                .skip(usize::try_from(start).unwrap_or(usize::MAX))
                .take(options.per_page as usize)
                .collect();
            pagination = Some(PaginationMeta {
                page,
                per_page: options.per_page,
                total,
            });
        }

        GroupedResult::Tree {
            groups: nodes,
            pagination,
        }
    }

    fn build_level(
        &self,
        rows: Vec<Value>,
        groups: &[ResolvedGroup],
        level: usize,
        excluded: &[String],
    ) -> Vec<GroupNode> {
        let group = &groups[level];
        let buckets = partition(rows, &group.key_alias);

        buckets
            .into_iter()
            .map(|(key_value, mut bucket)| {
                let metadata = self.group_metadata(group, &key_value, &bucket);
                let config = group.spec.config.as_ref();

                let aggregations = config
                    .map(|cfg| cfg.aggregations.as_slice())
                    .filter(|aggs| !aggs.is_empty())
                    .map(|aggs| compute_aggregations(&bucket, aggs));

                // Per-group pagination: page and limit together slice the
                // rows inside this group.
                let mut pagination = None;
                if let Some(cfg) = config {
                    if let (Some(page), Some(limit)) = (cfg.page, cfg.limit) {
                        let total = bucket.len() as u64;
                        let page = page.max(1);
                        let start = page.saturating_sub(1).saturating_mul(limit);
                        bucket = bucket
                            .into_iter()
                            .skip(usize::try_from(start).unwrap_or(usize::MAX))
                            .take(limit as usize)
                            .collect();
                        pagination = Some(PaginationMeta {
                            page,
                            per_page: limit,
                            total,
                        });
                    }
                }

                let data = if level + 1 < groups.len() {
                    GroupData::Groups(self.build_level(bucket, groups, level + 1, excluded))
                } else {
                    GroupData::Leaves(
                        bucket
                            .iter()
                            .map(|row| self.serializer.serialize(row, excluded))
                            .collect(),
                    )
                };

                GroupNode {
                    group: metadata,
                    data,
                    pagination,
                    aggregations,
                }
            })
            .collect()
    }

    /// Group metadata: the serialized related entity for relation paths,
    /// `{column: value}` for direct columns.
    fn group_metadata(&self, group: &ResolvedGroup, key_value: &Value, bucket: &[Value]) -> Value {
        if let Some(prefix) = &group.relation_prefix {
            if let Some(first) = bucket.first() {
                if let Some(entity) = self.serializer.relation(first, prefix) {
                    return entity;
                }
            }
            warn!(
                relation = %prefix,
                "related entity not loaded on grouped rows, using raw key"
            );
        }

        let mut map = Map::new();
        map.insert(group.key_alias.clone(), key_value.clone());
        Value::Object(map)
    }
}

/// Partition rows by the value under `key`, preserving first-encounter
/// order of distinct values. Rows with a null or missing key are discarded.
fn partition(rows: Vec<Value>, key: &str) -> Vec<(Value, Vec<Value>)> {
    let mut buckets: Vec<(Value, Vec<Value>)> = Vec::new();

    for row in rows {
        let Some(value) = row.get(key) else { continue };
        if value.is_null() {
            continue;
        }
        let value = value.clone();

        match buckets.iter_mut().find(|(existing, _)| *existing == value) {
            Some((_, bucket)) => bucket.push(row),
            None => buckets.push((value, vec![row])),
        }
    }

    buckets
}

// =============================================================================
// Implied relations
// =============================================================================

/// Relations implied by the grouping, minus the caller's include-list.
///
/// Grouping by `object_id` implies relation `object`; grouping by
/// `block.manager_id` implies `block`. Implied relations are stripped from
/// leaves so ancestor `group` nodes stay the single source of that data.
fn implied_relations(groups: &[ResolvedGroup], include: &[String]) -> Vec<String> {
    let mut implied = Vec::new();

    for group in groups {
        let candidate = match &group.relation_prefix {
            Some(prefix) => prefix
                .split('.')
                .next()
                .unwrap_or(prefix.as_str())
                .to_string(),
            None => match group.key_alias.strip_suffix("_id") {
                Some(base) if !base.is_empty() => base.to_string(),
                _ => continue,
            },
        };

        if !include.contains(&candidate) && !implied.contains(&candidate) {
            implied.push(candidate);
        }
    }

    implied
}

// =============================================================================
// Aggregations
// =============================================================================

/// Compute the requested aggregations over a group's rows, in memory.
fn compute_aggregations(rows: &[Value], aggregations: &[Aggregation]) -> Value {
    let mut out = Map::new();

    for aggregation in aggregations {
        let label = if aggregation.op == AggregateOp::Count && aggregation.column == "*" {
            "count".to_string()
        } else {
            format!("{}_{}", aggregation.op.name(), aggregation.column)
        };

        let value = match aggregation.op {
            AggregateOp::Count => {
                let count = if aggregation.column == "*" {
                    rows.len()
                } else {
                    rows.iter()
                        .filter(|row| {
                            row.get(&aggregation.column)
                                .is_some_and(|v| !v.is_null())
                        })
                        .count()
                };
                Value::Number(Number::from(count as u64))
            }
            AggregateOp::Sum => number_value(column_numbers(rows, &aggregation.column).sum()),
            AggregateOp::Avg => {
                let values: Vec<f64> = column_numbers(rows, &aggregation.column).collect();
                if values.is_empty() {
                    Value::Null
                } else {
                    number_value(values.iter().sum::<f64>() / values.len() as f64)
                }
            }
            AggregateOp::Max => fold_value(rows, &aggregation.column, f64::max),
            AggregateOp::Min => fold_value(rows, &aggregation.column, f64::min),
        };

        out.insert(label, value);
    }

    Value::Object(out)
}

fn column_numbers<'a>(rows: &'a [Value], column: &'a str) -> impl Iterator<Item = f64> + 'a {
    rows.iter()
        .filter_map(move |row| row.get(column))
        .filter_map(|value| match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
}

fn fold_value(rows: &[Value], column: &str, pick: fn(f64, f64) -> f64) -> Value {
    column_numbers(rows, column)
        .reduce(pick)
        .map(number_value)
        .unwrap_or(Value::Null)
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}
