//! Relation-path resolution through the public build pipeline.

use std::sync::Arc;

use quarry::prelude::*;
use quarry::schema::introspect::{IntrospectResult, RawColumn};
use serde_json::json;

struct ItemsIntrospector;

impl Introspector for ItemsIntrospector {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    fn columns(&self, table: &str) -> IntrospectResult<Vec<RawColumn>> {
        let columns = match table {
            "items" => vec![
                RawColumn::new("id", "integer"),
                RawColumn::new("name", "varchar(255)"),
                RawColumn::new("block_id", "integer"),
            ],
            "blocks" => vec![
                RawColumn::new("id", "integer"),
                RawColumn::new("label", "varchar(255)"),
                RawColumn::new("manager_id", "integer"),
            ],
            _ => vec![],
        };
        Ok(columns)
    }
}

fn engine() -> QueryEngine {
    let registry = Arc::new(ModelRegistry::new());
    registry.register(
        EntityDescriptor::new("Item")
            .with_columns(vec!["id", "name", "block_id"])
            .with_relation("block", RelationDescriptor::belongs_to("Block")),
    );
    registry.register(
        EntityDescriptor::new("Block")
            .with_columns(vec!["id", "label", "manager_id"])
            .with_relation("manager", RelationDescriptor::belongs_to("Manager"))
            .with_relation("items", RelationDescriptor::has_many("Item")),
    );
    registry.register(EntityDescriptor::new("Manager").with_columns(vec!["id", "name"]));

    let reflector = Arc::new(SchemaReflector::new(
        Arc::new(ItemsIntrospector),
        SchemaCache::new(None),
    ));
    QueryEngine::new(registry, reflector)
}

#[test]
fn relation_path_grouping_adds_left_join() {
    let built = engine()
        .build_from_payload("Item", &json!({"group_bies": ["block.manager_id"]}))
        .unwrap();

    let sql = built.query.to_sql(Dialect::Postgres);
    assert!(
        sql.contains("LEFT JOIN \"blocks\" ON \"items\".\"block_id\" = \"blocks\".\"id\""),
        "got: {}",
        sql
    );
    assert!(sql.contains("GROUP BY \"blocks\".\"manager_id\""), "got: {}", sql);
}

#[test]
fn joined_table_is_never_joined_twice() {
    let built = engine()
        .build_from_payload(
            "Item",
            &json!({"group_bies": ["block.manager_id", "block.label"]}),
        )
        .unwrap();

    let sql = built.query.to_sql(Dialect::Postgres);
    assert_eq!(sql.matches("LEFT JOIN").count(), 1, "got: {}", sql);
}

#[test]
fn nested_paths_join_every_hop() {
    let built = engine()
        .build_from_payload("Item", &json!({"group_bies": ["block.manager.name"]}))
        .unwrap();

    let sql = built.query.to_sql(Dialect::Postgres);
    assert!(sql.contains("LEFT JOIN \"blocks\""), "got: {}", sql);
    assert!(sql.contains("LEFT JOIN \"managers\""), "got: {}", sql);
    assert_eq!(built.eager_loads, ["block.manager"]);
}

#[test]
fn invalid_paths_are_dropped_not_fatal() {
    let built = engine()
        .build_from_payload(
            "Item",
            &json!({"group_bies": ["warehouse.id", "block.ghost", "block.label"]}),
        )
        .unwrap();

    assert_eq!(built.groups.len(), 1);
    assert_eq!(built.groups[0].key_alias, "block_label");

    let sql = built.query.to_sql(Dialect::Postgres);
    assert!(!sql.contains("warehouse"));
    assert!(!sql.contains("ghost"));
}

#[test]
fn eager_loads_are_deduplicated() {
    let built = engine()
        .build_from_payload(
            "Item",
            &json!({"group_bies": ["block.manager_id", "block.label"]}),
        )
        .unwrap();

    assert_eq!(built.eager_loads, ["block"]);
}

#[test]
fn has_many_joins_orient_by_foreign_key_placement() {
    let built = engine()
        .build_from_payload("Block", &json!({"group_bies": ["items.name"]}))
        .unwrap();

    let sql = built.query.to_sql(Dialect::Postgres);
    assert!(
        sql.contains("LEFT JOIN \"items\" ON \"items\".\"block_id\" = \"blocks\".\"id\""),
        "got: {}",
        sql
    );
}

#[test]
fn path_column_is_selected_under_flattened_alias() {
    let built = engine()
        .build_from_payload("Item", &json!({"group_bies": ["block.manager_id"]}))
        .unwrap();

    let sql = built.query.to_sql(Dialect::Postgres);
    assert!(
        sql.contains("\"blocks\".\"manager_id\" AS \"block_manager_id\""),
        "got: {}",
        sql
    );
}
