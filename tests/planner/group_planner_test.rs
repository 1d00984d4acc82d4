//! Grouping shapes: plain GROUP BY, deterministic representatives, and
//! top-N-per-group window rewrites.

use std::sync::Arc;

use quarry::prelude::*;
use quarry::schema::introspect::{IntrospectResult, RawColumn};
use serde_json::json;

struct ItemsIntrospector;

impl Introspector for ItemsIntrospector {
    fn driver(&self) -> Driver {
        Driver::Postgres
    }

    fn columns(&self, _table: &str) -> IntrospectResult<Vec<RawColumn>> {
        Ok(vec![
            RawColumn::new("id", "integer"),
            RawColumn::new("name", "varchar(255)"),
            RawColumn::new("price", "numeric(10,2)"),
            RawColumn::new("block_id", "integer"),
            RawColumn::new("object_id", "integer"),
        ])
    }
}

fn engine() -> QueryEngine {
    let registry = Arc::new(ModelRegistry::new());
    registry.register(
        EntityDescriptor::new("Item")
            .with_columns(vec!["id", "name", "price", "block_id", "object_id"]),
    );
    let reflector = Arc::new(SchemaReflector::new(
        Arc::new(ItemsIntrospector),
        SchemaCache::new(None),
    ));
    QueryEngine::new(registry, reflector)
}

fn sql(payload: serde_json::Value) -> String {
    engine()
        .build_from_payload("Item", &payload)
        .unwrap()
        .query
        .to_sql(Dialect::Postgres)
}

#[test]
fn bare_grouping_emits_plain_group_by() {
    // One representative row per distinct object_id; which row is
    // engine-chosen when no ordering preference is given.
    let sql = sql(json!({"group_bies": ["object_id"], "is_all": true}));
    assert!(sql.contains("GROUP BY \"items\".\"object_id\""), "got: {}", sql);
    assert!(!sql.contains("ROW_NUMBER"));
}

#[test]
fn top_n_per_group_rewrites_to_ranked_subquery() {
    // Three highest-priced items per block.
    let sql = sql(json!({
        "group_bies": {
            "block_id": {"limit": 3, "order_by": "price", "order_direction": "desc"}
        },
        "is_all": true,
    }));

    assert!(
        sql.contains(
            "ROW_NUMBER() OVER (PARTITION BY \"items\".\"block_id\" ORDER BY \"items\".\"price\" DESC)"
        ),
        "got: {}",
        sql
    );
    assert!(sql.contains("\"ranked\".\"rn\" <= 3"), "got: {}", sql);
    assert!(!sql.contains("GROUP BY"), "window rewrite replaces GROUP BY: {}", sql);
}

#[test]
fn order_preference_without_limit_picks_first_row_deterministically() {
    let sql = sql(json!({
        "group_bies": {
            "object_id": {"order_by": "price", "order_direction": "desc"}
        },
        "is_all": true,
    }));

    assert!(
        sql.contains("PARTITION BY \"items\".\"object_id\" ORDER BY \"items\".\"price\" DESC"),
        "got: {}",
        sql
    );
    assert!(sql.contains("\"ranked\".\"rn\" = 1"), "got: {}", sql);
}

#[test]
fn only_the_first_window_limit_is_honored() {
    let sql = sql(json!({
        "group_bies": {
            "block_id": {"limit": 3, "order_by": "price", "order_direction": "desc"},
            "object_id": {"limit": 5}
        },
        "is_all": true,
    }));

    assert!(sql.contains("PARTITION BY \"items\".\"block_id\""), "got: {}", sql);
    assert!(sql.contains("<= 3"));
    assert!(!sql.contains("<= 5"));
}

#[test]
fn group_search_narrows_before_partition() {
    let sql = sql(json!({
        "group_bies": {
            "name": {"limit": 2, "order_by": "price", "order_direction": "desc", "search": "north"}
        },
        "is_all": true,
    }));

    // The LIKE predicate must sit inside the ranked subquery, before the
    // rn filter of the outer query.
    let like_pos = sql.find("LIKE '%north%'").unwrap();
    let rn_pos = sql.find("\"ranked\".\"rn\"").unwrap();
    assert!(like_pos < rn_pos, "got: {}", sql);
}

#[test]
fn group_limit_with_page_is_in_memory_not_sql() {
    // page+limit inside a group config paginates leaves during reshaping;
    // no window rewrite happens.
    let sql = sql(json!({
        "group_bies": {"block_id": {"limit": 10, "page": 2}},
        "is_all": true,
    }));

    assert!(!sql.contains("ROW_NUMBER"), "got: {}", sql);
    assert!(sql.contains("GROUP BY \"items\".\"block_id\""), "got: {}", sql);
}

#[test]
fn window_sql_renders_on_every_dialect() {
    let built = engine()
        .build_from_payload(
            "Item",
            &json!({
                "group_bies": {
                    "block_id": {"limit": 2, "order_by": "price", "order_direction": "desc"}
                },
                "is_all": true,
            }),
        )
        .unwrap();

    let mysql = built.query.to_sql(Dialect::MySql);
    assert!(mysql.contains("PARTITION BY `items`.`block_id`"), "got: {}", mysql);

    let tsql = built.query.to_sql(Dialect::SqlServer);
    assert!(tsql.contains("PARTITION BY [items].[block_id]"), "got: {}", tsql);

    let sqlite = built.query.to_sql(Dialect::Sqlite);
    assert!(sqlite.contains("PARTITION BY \"items\".\"block_id\""), "got: {}", sqlite);
}

#[test]
fn resolved_groups_surface_in_request_order() {
    let built = engine()
        .build_from_payload(
            "Item",
            &json!({"group_bies": ["block_id", "object_id"], "is_all": true}),
        )
        .unwrap();

    let aliases: Vec<&str> = built.groups.iter().map(|g| g.key_alias.as_str()).collect();
    assert_eq!(aliases, ["block_id", "object_id"]);
}
