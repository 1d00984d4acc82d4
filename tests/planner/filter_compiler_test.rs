//! End-to-end filter compilation: payload in, dialect SQL out.

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
            RawColumn::new("stock", "int(11)"),
            RawColumn::new("active", "tinyint(1)"),
            RawColumn::new("created_at", "datetime"),
            RawColumn::new("meta", "json"),
        ])
    }
}

fn engine() -> QueryEngine {
    let registry = Arc::new(ModelRegistry::new());
    registry.register(
        EntityDescriptor::new("Item")
            .with_columns(vec![
                "id",
                "name",
                "price",
                "stock",
                "active",
                "created_at",
                "meta",
            ]),
    );
    let reflector = Arc::new(SchemaReflector::new(
        Arc::new(ItemsIntrospector),
        SchemaCache::new(None),
    ));
    QueryEngine::new(registry, reflector)
}

fn sql(payload: serde_json::Value, dialect: Dialect) -> String {
    engine()
        .build_from_payload("Item", &payload)
        .unwrap()
        .query
        .to_sql(dialect)
}

#[test]
fn string_filter_compiles_to_substring_like() {
    let sql = sql(json!({"search_by_name": "chair"}), Dialect::MySql);
    assert!(sql.contains("`items`.`name` LIKE '%chair%'"), "got: {}", sql);
}

#[test]
fn like_wildcards_in_user_input_are_escaped() {
    let sql = sql(json!({"search_by_name": "50%_off"}), Dialect::MySql);
    assert!(sql.contains("%50\\%\\_off%"), "got: {}", sql);
}

#[test]
fn inclusive_price_range() {
    // 100 <= price <= 500, both bounds inclusive.
    let sql = sql(
        json!({"search_by_price_min": 100, "search_by_price_max": 500}),
        Dialect::Postgres,
    );
    assert!(sql.contains("\"items\".\"price\" >= 100"), "got: {}", sql);
    assert!(sql.contains("\"items\".\"price\" <= 500"), "got: {}", sql);
}

#[test]
fn zero_and_false_still_filter() {
    let sql = sql(
        json!({"search_by_stock": 0, "search_by_active": false}),
        Dialect::MySql,
    );
    assert!(sql.contains("`items`.`stock` = 0"), "got: {}", sql);
    assert!(sql.contains("`items`.`active` = 0"), "got: {}", sql);
}

#[test]
fn empty_values_produce_no_predicates() {
    let sql = sql(
        json!({"search_by_name": "", "search_by_price": null}),
        Dialect::MySql,
    );
    assert!(!sql.contains("WHERE"), "got: {}", sql);
}

#[test]
fn date_equality_matches_the_day_per_dialect() {
    let payload = json!({"search_by_created_at": "2024-03-05 14:22:09"});

    let mysql = sql(payload.clone(), Dialect::MySql);
    assert!(
        mysql.contains("DATE(`items`.`created_at`) = '2024-03-05'"),
        "got: {}",
        mysql
    );

    let postgres = sql(payload.clone(), Dialect::Postgres);
    assert!(
        postgres.contains("CAST(\"items\".\"created_at\" AS DATE) = '2024-03-05'"),
        "got: {}",
        postgres
    );

    let tsql = sql(payload, Dialect::SqlServer);
    assert!(
        tsql.contains("CAST([items].[created_at] AS DATE) = '2024-03-05'"),
        "got: {}",
        tsql
    );
}

#[test]
fn date_window_bounds_are_inclusive() {
    let sql = sql(
        json!({
            "search_by_created_at_from": "2024-01-01",
            "search_by_created_at_to": "2024-12-31",
        }),
        Dialect::MySql,
    );
    assert!(sql.contains("DATE(`items`.`created_at`) >= '2024-01-01'"));
    assert!(sql.contains("DATE(`items`.`created_at`) <= '2024-12-31'"));
}

#[test]
fn boolean_renders_per_dialect() {
    let payload = json!({"search_by_active": true});

    assert!(sql(payload.clone(), Dialect::MySql).contains("= 1"));
    assert!(sql(payload.clone(), Dialect::Postgres).contains("= true"));
    assert!(sql(payload, Dialect::SqlServer).contains("= 1"));
}

#[test]
fn non_finite_numeric_values_are_dropped() {
    // "nan" and "inf" parse as f64 but must never reach SQL serialization.
    let sql = sql(
        json!({"search_by_price": "nan", "search_by_stock": "inf", "search_by_name": "desk"}),
        Dialect::MySql,
    );
    assert!(!sql.contains("price"), "got: {}", sql);
    assert!(!sql.contains("stock"), "got: {}", sql);
    assert!(sql.contains("%desk%"), "got: {}", sql);
}

#[test]
fn non_finite_range_bounds_are_dropped() {
    let sql = sql(json!({"search_by_price_min": "-inf"}), Dialect::MySql);
    assert!(!sql.contains("WHERE"), "got: {}", sql);
}

#[test]
fn json_columns_do_not_take_equality_filters() {
    let sql = sql(
        json!({"search_by_meta": "warranty", "search_by_name": "desk"}),
        Dialect::MySql,
    );
    assert!(!sql.contains("meta"), "got: {}", sql);
    assert!(sql.contains("%desk%"), "got: {}", sql);
}

#[test]
fn unknown_columns_are_silently_ignored() {
    let sql = sql(
        json!({"search_by_warehouse": "west", "search_by_name": "desk"}),
        Dialect::MySql,
    );
    assert!(!sql.contains("warehouse"));
    assert!(sql.contains("%desk%"));
}

#[test]
fn order_terms_compose_in_encounter_order() {
    let sql = sql(
        json!({"order_by_price": "desc", "order_by_name": "asc"}),
        Dialect::Postgres,
    );
    assert!(
        sql.contains("ORDER BY \"items\".\"price\" DESC, \"items\".\"name\" ASC"),
        "got: {}",
        sql
    );
}

#[test]
fn bad_order_direction_is_ignored() {
    let sql = sql(json!({"order_by_price": "sideways"}), Dialect::Postgres);
    assert!(!sql.contains("ORDER BY"), "got: {}", sql);
}
