//! Engine facade: pagination, dialect coverage, and full payloads.

use std::sync::Arc;

use quarry::prelude::*;
use quarry::schema::introspect::{IntrospectResult, RawColumn};
use serde_json::json;

struct ItemsIntrospector;

impl Introspector for ItemsIntrospector {
    fn driver(&self) -> Driver {
        Driver::MySql
    }

    fn columns(&self, _table: &str) -> IntrospectResult<Vec<RawColumn>> {
        Ok(vec![
            RawColumn::new("id", "int(11)"),
            RawColumn::new("name", "varchar(255)"),
            RawColumn::new("price", "decimal(10,2)"),
            RawColumn::new("block_id", "int(11)"),
            RawColumn::new("created_at", "datetime"),
        ])
    }
}

fn engine() -> QueryEngine {
    let registry = Arc::new(ModelRegistry::new());
    registry.register(
        EntityDescriptor::new("Item")
            .with_columns(vec!["id", "name", "price", "block_id", "created_at"])
            .with_relation("block", RelationDescriptor::belongs_to("Block")),
    );
    registry.register(
        EntityDescriptor::new("Block").with_columns(vec!["id", "label", "manager_id"]),
    );
    let reflector = Arc::new(SchemaReflector::new(
        Arc::new(ItemsIntrospector),
        SchemaCache::new(None),
    ));
    QueryEngine::new(registry, reflector)
}

#[test]
fn default_page_size_applies_when_unspecified() {
    let built = engine().build_from_payload("Item", &json!({})).unwrap();
    let sql = built.query.to_sql(Dialect::MySql);
    assert!(sql.contains(&format!("LIMIT {}", DEFAULT_PER_PAGE)), "got: {}", sql);
    assert!(sql.contains("OFFSET 0"));
}

#[test]
fn page_and_limit_compute_the_offset() {
    let built = engine()
        .build_from_payload("Item", &json!({"page": 3, "limit": 25}))
        .unwrap();
    let sql = built.query.to_sql(Dialect::MySql);
    assert!(sql.contains("LIMIT 25"), "got: {}", sql);
    assert!(sql.contains("OFFSET 50"), "got: {}", sql);
}

#[test]
fn is_all_returns_everything() {
    let built = engine()
        .build_from_payload("Item", &json!({"is_all": true, "page": 3, "limit": 25}))
        .unwrap();
    let sql = built.query.to_sql(Dialect::MySql);
    assert!(!sql.contains("LIMIT"), "got: {}", sql);
    assert!(!sql.contains("OFFSET"), "got: {}", sql);
}

#[test]
fn tsql_pagination_without_order_gets_a_placeholder() {
    // OFFSET/FETCH needs an ORDER BY on SQL Server.
    let built = engine().build_from_payload("Item", &json!({"limit": 10})).unwrap();
    let sql = built.query.to_sql(Dialect::SqlServer);
    assert!(sql.contains("ORDER BY (SELECT NULL)"), "got: {}", sql);
    assert!(sql.contains("OFFSET 0 ROWS"), "got: {}", sql);
    assert!(sql.contains("FETCH NEXT 10 ROWS ONLY"), "got: {}", sql);
}

#[test]
fn tsql_pagination_with_order_uses_it() {
    let built = engine()
        .build_from_payload("Item", &json!({"limit": 10, "order_by_price": "desc"}))
        .unwrap();
    let sql = built.query.to_sql(Dialect::SqlServer);
    assert!(sql.contains("ORDER BY [items].[price] DESC"), "got: {}", sql);
    assert!(!sql.contains("(SELECT NULL)"), "got: {}", sql);
}

#[test]
fn huge_page_numbers_saturate_the_offset() {
    let built = engine()
        .build_from_payload("Item", &json!({"page": u64::MAX, "limit": 2}))
        .unwrap();
    let sql = built.query.to_sql(Dialect::MySql);
    assert!(sql.contains(&format!("OFFSET {}", u64::MAX)), "got: {}", sql);
}

#[test]
fn unknown_entity_is_an_error() {
    let err = engine().build_from_payload("Ghost", &json!({})).unwrap_err();
    assert!(matches!(err, EngineError::UnknownEntity { .. }));
}

#[test]
fn non_object_payload_is_a_parse_error() {
    let err = engine()
        .build_from_payload("Item", &json!(["not", "a", "map"]))
        .unwrap_err();
    assert!(matches!(err, EngineError::Parse(_)));
}

#[test]
fn full_payload_composes_every_stage() {
    let built = engine()
        .build_from_payload(
            "Item",
            &json!({
                "search_by_name": "chair",
                "search_by_price_min": 100,
                "order_by_created_at": "desc",
                "group_bies": {
                    "block.manager_id": {"limit": 3, "order_by": "price", "order_direction": "desc"}
                },
                "hierarchical": true,
                "page": 2,
                "limit": 20,
            }),
        )
        .unwrap();

    assert!(built.hierarchical);
    assert_eq!(built.eager_loads, ["block"]);
    assert_eq!(built.groups.len(), 1);
    assert_eq!(built.groups[0].key_alias, "block_manager_id");

    let sql = built.query.to_sql(Dialect::MySql);
    assert!(sql.contains("LIKE '%chair%'"), "got: {}", sql);
    assert!(sql.contains("`items`.`price` >= 100"), "got: {}", sql);
    assert!(sql.contains("LEFT JOIN `blocks`"), "got: {}", sql);
    assert!(sql.contains("ROW_NUMBER() OVER (PARTITION BY `blocks`.`manager_id`"), "got: {}", sql);
    assert!(sql.contains("`ranked`.`rn` <= 3"), "got: {}", sql);
    assert!(sql.contains("ORDER BY `ranked`.`created_at` DESC"), "got: {}", sql);
    assert!(sql.contains("LIMIT 20"), "got: {}", sql);
    assert!(sql.contains("OFFSET 20"), "got: {}", sql);
}

#[test]
fn the_same_plan_serializes_for_all_four_dialects() {
    let built = engine()
        .build_from_payload("Item", &json!({"search_by_name": "desk", "limit": 5}))
        .unwrap();

    for dialect in [
        Dialect::MySql,
        Dialect::Postgres,
        Dialect::Sqlite,
        Dialect::SqlServer,
    ] {
        let sql = built.query.to_sql(dialect);
        assert!(sql.contains("%desk%"), "{:?} lost the filter: {}", dialect, sql);
        assert!(sql.starts_with("SELECT"), "{:?}: {}", dialect, sql);
    }
}
