//! Query plan: the per-request accumulator the compilers write into.
//!
//! A plan is owned by exactly one request. The filter compiler, relation
//! resolver and group planner all append to it; lowering happens once at the
//! end, producing either a plain SELECT or a ranked-subquery wrap when a
//! window rewrite was planned.

use std::collections::BTreeSet;

use crate::sql::expr::{self, Expr, ExprExt, WindowOrderBy};
use crate::sql::query::{Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, TableRef};
use crate::sql::{Dialect, SortDir};

/// Alias of the ranked derived table in window rewrites.
const RANKED_ALIAS: &str = "ranked";
/// Alias of the ROW_NUMBER() column.
const ROW_NUMBER_ALIAS: &str = "rn";

/// How the ranked subquery filters row numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFilter {
    /// `WHERE rn <= n`: top-N rows per partition.
    TopN(u64),
    /// `WHERE rn = 1`: one deterministic representative per partition.
    First,
}

/// A planned ROW_NUMBER() rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowPlan {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<WindowOrderBy>,
    pub filter: RowFilter,
}

/// The accumulated joins, predicates, grouping and ordering for one request.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    table: String,
    extra_selects: Vec<SelectExpr>,
    joins: Vec<Join>,
    joined_tables: BTreeSet<String>,
    predicates: Vec<Expr>,
    group_columns: Vec<Expr>,
    orders: Vec<(String, SortDir)>,
    eager_loads: Vec<String>,
    window: Option<WindowPlan>,
    limit_offset: Option<LimitOffset>,
}

impl QueryPlan {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.into(),
            extra_selects: Vec::new(),
            joins: Vec::new(),
            joined_tables: BTreeSet::new(),
            predicates: Vec::new(),
            group_columns: Vec::new(),
            orders: Vec::new(),
            eager_loads: Vec::new(),
            window: None,
            limit_offset: None,
        }
    }

    /// The base table this plan selects from.
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn add_predicate(&mut self, predicate: Expr) {
        self.predicates.push(predicate);
    }

    /// Add a LEFT JOIN unless the table is already joined.
    pub fn add_left_join(&mut self, table: &str, on: Expr) {
        if table == self.table || !self.joined_tables.insert(table.to_string()) {
            return;
        }
        self.joins.push(Join {
            join_type: JoinType::Left,
            table: TableRef::new(table),
            on,
        });
    }

    pub fn is_joined(&self, table: &str) -> bool {
        self.joined_tables.contains(table)
    }

    /// Select an extra expression alongside the base star, typically a
    /// relation-path group column aliased for reshaping.
    pub fn add_select(&mut self, select: SelectExpr) {
        if !self.extra_selects.contains(&select) {
            self.extra_selects.push(select);
        }
    }

    pub fn add_group_column(&mut self, column: Expr) {
        if !self.group_columns.contains(&column) {
            self.group_columns.push(column);
        }
    }

    pub fn group_columns(&self) -> &[Expr] {
        &self.group_columns
    }

    /// Append an ORDER BY term on a base-table column.
    pub fn add_order(&mut self, column: &str, dir: SortDir) {
        self.orders.push((column.to_string(), dir));
    }

    pub fn add_eager_load(&mut self, path: &str) {
        if !self.eager_loads.iter().any(|p| p == path) {
            self.eager_loads.push(path.to_string());
        }
    }

    pub fn eager_loads(&self) -> &[String] {
        &self.eager_loads
    }

    /// Install the window rewrite. The last caller wins; the group planner
    /// guarantees at most one is installed per request.
    pub fn set_window(&mut self, window: WindowPlan) {
        self.window = Some(window);
    }

    pub fn has_window(&self) -> bool {
        self.window.is_some()
    }

    pub fn set_pagination(&mut self, limit: u64, offset: u64) {
        self.limit_offset = Some(LimitOffset {
            limit: Some(limit),
            offset: Some(offset),
        });
    }

    /// Lower the plan to an executable query.
    pub fn into_query(self) -> Query {
        let mut selects = vec![SelectExpr::new(expr::table_star(&self.table))];
        selects.extend(self.extra_selects);

        let where_clause = self
            .predicates
            .into_iter()
            .reduce(|acc, predicate| acc.and(predicate));

        match self.window {
            None => {
                let mut query = Query::new();
                query.select = selects;
                query.from = Some(crate::sql::query::FromClause::Table(TableRef::new(
                    &self.table,
                )));
                query.joins = self.joins;
                query.where_clause = where_clause;
                query.group_by = self.group_columns;
                query.order_by = self
                    .orders
                    .into_iter()
                    .map(|(column, dir)| OrderByExpr {
                        expr: expr::table_col(&self.table, &column),
                        dir,
                    })
                    .collect();
                query.limit_offset = self.limit_offset;
                query
            }
            Some(window) => {
                // Ranked inner query: predicates and joins apply before the
                // partition is computed; grouping is replaced by the window.
                selects.push(
                    SelectExpr::new(Expr::WindowFunction {
                        function: Box::new(expr::row_number()),
                        partition_by: window.partition_by,
                        order_by: window.order_by,
                    })
                    .with_alias(ROW_NUMBER_ALIAS),
                );

                let mut inner = Query::new();
                inner.select = selects;
                inner.from = Some(crate::sql::query::FromClause::Table(TableRef::new(
                    &self.table,
                )));
                inner.joins = self.joins;
                inner.where_clause = where_clause;

                let rank_predicate = match window.filter {
                    RowFilter::TopN(n) => expr::table_col(RANKED_ALIAS, ROW_NUMBER_ALIAS)
                        .lte(expr::lit_int(n as i64)),
                    RowFilter::First => {
                        expr::table_col(RANKED_ALIAS, ROW_NUMBER_ALIAS).eq(expr::lit_int(1))
                    }
                };

                let mut outer = Query::new()
                    .select_star()
                    .from_subquery(inner, RANKED_ALIAS)
                    .filter(rank_predicate);
                outer.order_by = self
                    .orders
                    .into_iter()
                    .map(|(column, dir)| OrderByExpr {
                        expr: expr::table_col(RANKED_ALIAS, &column),
                        dir,
                    })
                    .collect();
                outer.limit_offset = self.limit_offset;
                outer
            }
        }
    }

    /// Lower and serialize in one step.
    pub fn to_sql(self, dialect: Dialect) -> String {
        self.into_query().to_sql(dialect)
    }
}
