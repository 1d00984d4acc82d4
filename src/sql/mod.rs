//! SQL generation layer.
//!
//! Queries are represented as token streams rather than strings: the planner
//! builds a [`query::Query`] out of [`expr::Expr`] nodes, and the final SQL
//! text is produced by serializing the tokens against a [`dialect::Dialect`].
//! Identifier quoting, boolean literals, pagination syntax and date
//! truncation all resolve at serialization time, so one plan renders for
//! every supported engine.

pub mod dialect;
pub mod expr;
pub mod query;
pub mod token;

pub use dialect::{Dialect, SqlDialect};
pub use expr::{Expr, ExprExt, Literal, SortDir, WindowOrderBy};
pub use query::{
    FromClause, Join, JoinType, LimitOffset, OrderByExpr, Query, SelectExpr, SelectExprExt,
    TableRef,
};
pub use token::{Token, TokenStream};
