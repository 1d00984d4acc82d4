//! Schema reflection: normalization, caching tiers, and degradation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quarry::prelude::*;
use quarry::schema::introspect::{IntrospectError, IntrospectResult, RawColumn};
use quarry::schema::normalize_type;

struct CountingIntrospector {
    calls: AtomicUsize,
}

impl CountingIntrospector {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }
}

impl Introspector for CountingIntrospector {
    fn driver(&self) -> Driver {
        Driver::MySql
    }

    fn columns(&self, _table: &str) -> IntrospectResult<Vec<RawColumn>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![
            RawColumn::new("id", "int(10) unsigned"),
            RawColumn::new("name", "varchar(255)"),
            RawColumn::new("price", "decimal(10,2)"),
            RawColumn::new("active", "tinyint(1)"),
            RawColumn::new("created_at", "timestamp"),
            RawColumn::new("meta", "json"),
        ])
    }
}

struct FailingIntrospector;

impl Introspector for FailingIntrospector {
    fn driver(&self) -> Driver {
        Driver::Other
    }

    fn columns(&self, table: &str) -> IntrospectResult<Vec<RawColumn>> {
        Err(IntrospectError::QueryFailed {
            table: table.to_string(),
            message: "connection refused".into(),
        })
    }
}

#[derive(Default)]
struct MapCache {
    entries: Mutex<std::collections::HashMap<String, String>>,
    tag_capable: bool,
}

impl DistributedCache for MapCache {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn put(&self, key: &str, value: &str, _ttl: Duration) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn forget(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }

    fn supports_tags(&self) -> bool {
        self.tag_capable
    }
}

fn item_entity() -> EntityDescriptor {
    EntityDescriptor::new("Item").with_columns(vec!["id", "name", "price"])
}

#[test]
fn vendor_types_normalize_to_semantic_types() {
    let reflector = SchemaReflector::new(
        Arc::new(CountingIntrospector::new()),
        SchemaCache::new(None),
    );

    let types = reflector.column_types(&item_entity());
    assert_eq!(types["id"], SemanticType::Integer);
    assert_eq!(types["name"], SemanticType::String);
    assert_eq!(types["price"], SemanticType::Numeric);
    assert_eq!(types["active"], SemanticType::Boolean);
    assert_eq!(types["created_at"], SemanticType::Date);
    assert_eq!(types["meta"], SemanticType::Json);
}

#[test]
fn repeated_reflection_hits_the_cache() {
    let introspector = Arc::new(CountingIntrospector::new());
    let reflector = SchemaReflector::new(introspector.clone(), SchemaCache::new(None));

    let entity = item_entity();
    reflector.column_types(&entity);
    reflector.column_types(&entity);
    reflector.column_types(&entity);
    assert_eq!(introspector.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn distributed_entry_skips_live_introspection() {
    let store = Arc::new(MapCache::default());

    // Warm the store through one reflector, then read it from a fresh one.
    let introspector = Arc::new(CountingIntrospector::new());
    let first = SchemaReflector::new(introspector.clone(), SchemaCache::new(Some(store.clone())));
    first.column_types(&item_entity());
    assert_eq!(introspector.calls.load(Ordering::SeqCst), 1);

    let second_introspector = Arc::new(CountingIntrospector::new());
    let second = SchemaReflector::new(
        second_introspector.clone(),
        SchemaCache::new(Some(store)),
    );
    let types = second.column_types(&item_entity());
    assert_eq!(types["price"], SemanticType::Numeric);
    assert_eq!(
        second_introspector.calls.load(Ordering::SeqCst),
        0,
        "distributed hit must skip the catalog"
    );
}

#[test]
fn invalidation_forces_a_fresh_catalog_read() {
    let introspector = Arc::new(CountingIntrospector::new());
    let reflector = SchemaReflector::new(introspector.clone(), SchemaCache::new(None));

    let entity = item_entity();
    reflector.column_types(&entity);
    reflector.invalidate(&entity);
    reflector.column_types(&entity);
    assert_eq!(introspector.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn reflection_failure_degrades_to_string_for_declared_columns() {
    let reflector = SchemaReflector::new(Arc::new(FailingIntrospector), SchemaCache::new(None));

    let types = reflector.column_types(&item_entity());
    assert_eq!(types.len(), 3);
    assert!(types.values().all(|t| *t == SemanticType::String));
}

#[test]
fn tag_invalidation_degrades_gracefully_without_support() {
    // Must not panic or error when the store cannot do tags.
    let cache = SchemaCache::new(Some(Arc::new(MapCache::default())));
    cache.invalidate_tag("schema");
}

#[test]
fn cache_key_includes_entity_and_table() {
    assert_eq!(SchemaCache::key("Item", "items"), "Item_items_column_types");
}

#[test]
fn driver_specific_metadata_queries() {
    assert_eq!(Driver::MySql.metadata_query("items"), "DESCRIBE `items`");
    assert_eq!(
        Driver::Sqlite.metadata_query("items"),
        "PRAGMA table_info(\"items\")"
    );
    assert!(Driver::Postgres
        .metadata_query("items")
        .contains("information_schema.columns"));
    assert!(Driver::SqlServer
        .metadata_query("items")
        .contains("INFORMATION_SCHEMA.COLUMNS"));
}

#[test]
fn normalization_edge_cases() {
    assert_eq!(normalize_type("tinyint(1)"), SemanticType::Boolean);
    assert_eq!(normalize_type("tinyint(4)"), SemanticType::Integer);
    assert_eq!(normalize_type("NVARCHAR(MAX)"), SemanticType::String);
    assert_eq!(normalize_type("timestamp with time zone"), SemanticType::Date);
    assert_eq!(normalize_type("jsonb"), SemanticType::Json);
    assert_eq!(normalize_type("geometry"), SemanticType::String);
}
