//! Typed SQL fragments for the relation fan-out
//!
//! Queries are assembled from these nodes and rendered to parameterized SQL in
//! exactly one place ([`UnionAll::render`]). Identifiers can only be created
//! through [`Ident::new`], which rejects anything that is not a plain SQL
//! identifier; every value is emitted as a `?` placeholder with a matching
//! entry in [`RenderedQuery::binds`].

use objrel_common::{Error, Result};
use serde::{Serialize, Serializer};
use sqlx::sqlite::{Sqlite, SqliteArguments};
use std::fmt;

const MAX_IDENT_LEN: usize = 64;

/// Validated SQL identifier (table, alias or column name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ident(String);

impl Ident {
    /// Validate an identifier: ASCII letter or underscore first, then ASCII
    /// alphanumerics or underscores, at most 64 characters
    pub fn new(name: &str) -> Result<Self> {
        let mut chars = name.chars();
        let valid_start = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_');
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');

        if !valid_start || !valid_rest || name.len() > MAX_IDENT_LEN {
            return Err(Error::Config(format!("Invalid SQL identifier: {:?}", name)));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Ident {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Int(i64),
    Text(String),
}

/// Scalar expression
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// `table.column`
    Column { table: Ident, column: Ident },
    /// `NULL` placeholder for columns a branch does not own
    Null,
    /// The empty string literal
    EmptyText,
    /// Bound parameter
    Param(BindValue),
    /// `(a || b || ...)`
    Concat(Vec<Expr>),
    /// `COALESCE(a, b, ...)`
    Coalesce(Vec<Expr>),
    /// `NULLIF(TRIM(x), '')`
    NullIfBlank(Box<Expr>),
}

impl Expr {
    pub fn col(table: &Ident, column: &Ident) -> Self {
        Expr::Column {
            table: table.clone(),
            column: column.clone(),
        }
    }

    pub fn int(value: i64) -> Self {
        Expr::Param(BindValue::Int(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Expr::Param(BindValue::Text(value.into()))
    }
}

/// Boolean condition; a list of predicates is joined with `AND`
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq(Expr, Expr),
    /// `x NOT IN (?, ...)`; always true for an empty list
    NotIn(Expr, Vec<i64>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: Ident,
    pub alias: Ident,
    pub on: Vec<Predicate>,
}

/// `expr AS alias`
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Ident,
}

/// One SELECT branch
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub items: Vec<SelectItem>,
    pub from_table: Ident,
    pub from_alias: Ident,
    pub joins: Vec<Join>,
    pub filters: Vec<Predicate>,
}

impl Select {
    /// Output column names in order
    pub fn column_names(&self) -> Vec<&Ident> {
        self.items.iter().map(|item| &item.alias).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

/// `branch UNION ALL branch ... ORDER BY ...`
///
/// Construction checks that every branch yields the same column names in the
/// same order; a heterogeneous union is rejected rather than reshaped.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionAll {
    columns: Vec<Ident>,
    branches: Vec<Select>,
    order_by: Vec<(Ident, SortDirection)>,
}

impl UnionAll {
    pub fn new(branches: Vec<Select>, order_by: Vec<(Ident, SortDirection)>) -> Result<Self> {
        let first = branches
            .first()
            .ok_or_else(|| Error::Config("Union requires at least one branch".to_string()))?;
        let columns: Vec<Ident> = first.column_names().into_iter().cloned().collect();

        for (index, branch) in branches.iter().enumerate().skip(1) {
            let names = branch.column_names();
            if names.len() != columns.len() || names.iter().zip(&columns).any(|(a, b)| *a != b) {
                return Err(Error::Config(format!(
                    "Union branch {} columns differ from branch 0 ({} vs {} columns)",
                    index,
                    names.len(),
                    columns.len()
                )));
            }
        }

        for (column, _) in &order_by {
            if !columns.contains(column) {
                return Err(Error::Config(format!(
                    "ORDER BY column {} is not part of the union",
                    column
                )));
            }
        }

        Ok(Self {
            columns,
            branches,
            order_by,
        })
    }

    pub fn columns(&self) -> &[Ident] {
        &self.columns
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    /// Render to SQL text plus positional binds
    pub fn render(&self) -> RenderedQuery {
        let mut out = Renderer::default();

        for (index, branch) in self.branches.iter().enumerate() {
            if index > 0 {
                out.sql.push_str("\nUNION ALL\n");
            }
            out.select(branch);
        }

        if !self.order_by.is_empty() {
            out.sql.push_str("\nORDER BY ");
            let terms: Vec<String> = self
                .order_by
                .iter()
                .map(|(column, direction)| match direction {
                    SortDirection::Asc => format!("{} ASC", column),
                    SortDirection::Desc => format!("{} DESC", column),
                })
                .collect();
            out.sql.push_str(&terms.join(", "));
        }

        RenderedQuery {
            sql: out.sql,
            binds: out.binds,
        }
    }
}

/// Rendered SQL and its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub binds: Vec<BindValue>,
}

impl RenderedQuery {
    /// sqlx query with every parameter bound in placeholder order
    pub fn query(&self) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for bind in &self.binds {
            query = match bind {
                BindValue::Int(value) => query.bind(*value),
                BindValue::Text(value) => query.bind(value.clone()),
            };
        }
        query
    }
}

#[derive(Default)]
struct Renderer {
    sql: String,
    binds: Vec<BindValue>,
}

impl Renderer {
    fn select(&mut self, select: &Select) {
        self.sql.push_str("SELECT ");
        for (index, item) in select.items.iter().enumerate() {
            if index > 0 {
                self.sql.push_str(", ");
            }
            self.expr(&item.expr);
            self.sql.push_str(" AS ");
            self.sql.push_str(item.alias.as_str());
        }

        self.sql.push_str(&format!(
            "\nFROM {} AS {}",
            select.from_table, select.from_alias
        ));

        for join in &select.joins {
            let keyword = match join.kind {
                JoinKind::Inner => "INNER JOIN",
                JoinKind::Left => "LEFT JOIN",
            };
            self.sql
                .push_str(&format!("\n{} {} AS {} ON ", keyword, join.table, join.alias));
            self.predicates(&join.on);
        }

        if !select.filters.is_empty() {
            self.sql.push_str("\nWHERE ");
            self.predicates(&select.filters);
        }
    }

    fn predicates(&mut self, predicates: &[Predicate]) {
        if predicates.is_empty() {
            self.sql.push_str("1 = 1");
            return;
        }
        for (index, predicate) in predicates.iter().enumerate() {
            if index > 0 {
                self.sql.push_str(" AND ");
            }
            self.predicate(predicate);
        }
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::Eq(left, right) => {
                self.expr(left);
                self.sql.push_str(" = ");
                self.expr(right);
            }
            Predicate::NotIn(_, ids) if ids.is_empty() => self.sql.push_str("1 = 1"),
            Predicate::NotIn(expr, ids) => {
                self.expr(expr);
                self.sql.push_str(" NOT IN (");
                for (index, id) in ids.iter().enumerate() {
                    if index > 0 {
                        self.sql.push_str(", ");
                    }
                    self.param(BindValue::Int(*id));
                }
                self.sql.push(')');
            }
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Column { table, column } => {
                self.sql.push_str(&format!("{}.{}", table, column));
            }
            Expr::Null => self.sql.push_str("NULL"),
            Expr::EmptyText => self.sql.push_str("''"),
            Expr::Param(value) => self.param(value.clone()),
            Expr::Concat(parts) if parts.is_empty() => self.sql.push_str("''"),
            Expr::Concat(parts) => {
                self.sql.push('(');
                for (index, part) in parts.iter().enumerate() {
                    if index > 0 {
                        self.sql.push_str(" || ");
                    }
                    self.expr(part);
                }
                self.sql.push(')');
            }
            Expr::Coalesce(parts) => {
                self.sql.push_str("COALESCE(");
                for (index, part) in parts.iter().enumerate() {
                    if index > 0 {
                        self.sql.push_str(", ");
                    }
                    self.expr(part);
                }
                self.sql.push(')');
            }
            Expr::NullIfBlank(inner) => {
                self.sql.push_str("NULLIF(TRIM(");
                self.expr(inner);
                self.sql.push_str("), '')");
            }
        }
    }

    fn param(&mut self, value: BindValue) {
        self.sql.push('?');
        self.binds.push(value);
    }
}
