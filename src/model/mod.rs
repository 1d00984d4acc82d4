//! Static entity model: tables, keys, and declared relations.
//!
//! The registry is the engine's source of structural truth. Schema
//! reflection discovers column *types* at runtime; the model declares what
//! entities exist, which table backs each one, and how entities relate.
//! Relation declarations drive both join planning and hierarchy reshaping.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use inflector::Inflector;

/// How a relation traverses the key pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// This entity holds the foreign key pointing at the target's key.
    BelongsTo,
    /// The target holds the foreign key; at most one row matches.
    HasOne,
    /// The target holds the foreign key; many rows may match.
    HasMany,
}

/// A declared relation from one entity to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationDescriptor {
    /// Name of the target entity in the registry.
    pub target: String,
    /// Foreign key column. Lives on this entity's table for `BelongsTo`,
    /// on the target's table for `HasOne`/`HasMany`.
    pub foreign_key: String,
    /// The key column the foreign key points at (usually the primary key).
    pub owner_key: String,
    pub cardinality: Cardinality,
}

impl RelationDescriptor {
    /// A belongs-to relation following the `<target>_id` convention.
    pub fn belongs_to(target: &str) -> Self {
        Self {
            target: target.into(),
            foreign_key: format!("{}_id", target.to_snake_case()),
            owner_key: "id".into(),
            cardinality: Cardinality::BelongsTo,
        }
    }

    /// A has-one relation; the foreign key defaults to `<owner>_id` once the
    /// relation is attached to an entity (see [`EntityDescriptor::with_relation`]).
    pub fn has_one(target: &str) -> Self {
        Self {
            target: target.into(),
            foreign_key: String::new(),
            owner_key: "id".into(),
            cardinality: Cardinality::HasOne,
        }
    }

    /// A has-many relation; foreign key defaulting as for [`Self::has_one`].
    pub fn has_many(target: &str) -> Self {
        Self {
            target: target.into(),
            foreign_key: String::new(),
            owner_key: "id".into(),
            cardinality: Cardinality::HasMany,
        }
    }

    pub fn with_foreign_key(mut self, foreign_key: &str) -> Self {
        self.foreign_key = foreign_key.into();
        self
    }

    pub fn with_owner_key(mut self, owner_key: &str) -> Self {
        self.owner_key = owner_key.into();
        self
    }
}

/// One entity: its backing table, keys, columns, and relations.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "descriptors have no effect until registered"]
pub struct EntityDescriptor {
    pub name: String,
    /// Backing table, defaulted from the entity name (`LineItem` -> `line_items`).
    pub table: String,
    pub primary_key: String,
    /// Declared columns, used when reflection is unavailable and for
    /// disambiguating filter-key suffixes.
    pub columns: Vec<String>,
    /// Relations keyed by relation name as it appears in request paths.
    pub relations: BTreeMap<String, RelationDescriptor>,
}

impl EntityDescriptor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            table: name.to_table_case(),
            primary_key: "id".into(),
            columns: Vec::new(),
            relations: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, table: &str) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_primary_key(mut self, primary_key: &str) -> Self {
        self.primary_key = primary_key.into();
        self
    }

    pub fn with_columns(mut self, columns: Vec<&str>) -> Self {
        self.columns = columns.into_iter().map(String::from).collect();
        self
    }

    /// Attach a relation under `name`. Empty foreign keys on has-one /
    /// has-many relations default to `<this entity>_id`.
    pub fn with_relation(mut self, name: &str, mut relation: RelationDescriptor) -> Self {
        if relation.foreign_key.is_empty() {
            relation.foreign_key = format!("{}_id", self.name.to_snake_case());
        }
        self.relations.insert(name.to_string(), relation);
        self
    }

    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.get(name)
    }

    /// Whether `column` is declared on this entity.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Thread-safe registry of entity descriptors, keyed by entity name.
#[derive(Default)]
pub struct ModelRegistry {
    entities: DashMap<String, Arc<EntityDescriptor>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, entity: EntityDescriptor) {
        self.entities.insert(entity.name.clone(), Arc::new(entity));
    }

    pub fn get(&self, name: &str) -> Option<Arc<EntityDescriptor>> {
        self.entities.get(name).map(|e| e.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }
}
