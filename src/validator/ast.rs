//! Layer 3: AST inspection (spec §4.7). Parses exactly one statement,
//! requires the root to be a `SELECT` or a set operation over `SELECT`
//! arms, and walks the full tree (including CTEs) rejecting any
//! write-shaped node.

use sqlparser::ast::{SetExpr, Statement, Visit, Visitor};
use sqlparser::dialect::{Dialect as SqlParserDialect, GenericDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use std::ops::ControlFlow;

use crate::dialect::DialectProfile;
use crate::models::Dialect;

pub fn check(sql: &str, dialect_profile: &dyn DialectProfile) -> Result<Statement, String> {
    let sqlparser_dialect = sqlparser_dialect_for(dialect_profile.dialect());
    let statements = Parser::parse_sql(sqlparser_dialect.as_ref(), sql).map_err(|e| format!("parse error: {e}"))?;

    if statements.len() != 1 {
        return Err(format!("expected exactly one statement, found {}", statements.len()));
    }
    let statement = statements.into_iter().next().unwrap();

    require_select_rooted(&statement)?;

    let mut visitor = WriteNodeVisitor::default();
    let _ = statement.visit(&mut visitor);
    if let Some(found) = visitor.found {
        return Err(format!("query contains a disallowed node: {found}"));
    }

    Ok(statement)
}

fn require_select_rooted(statement: &Statement) -> Result<(), String> {
    match statement {
        Statement::Query(query) => require_select_rooted_expr(&query.body),
        other => Err(format!("statement root must be a query, found {}", root_kind_name(other))),
    }
}

fn require_select_rooted_expr(body: &SetExpr) -> Result<(), String> {
    match body {
        SetExpr::Select(_) => Ok(()),
        SetExpr::SetOperation { left, right, .. } => {
            require_select_rooted_expr(left)?;
            require_select_rooted_expr(right)
        },
        SetExpr::Query(query) => require_select_rooted_expr(&query.body),
        other => Err(format!("query body must be a SELECT or set operation over SELECTs, found {other}")),
    }
}

fn root_kind_name(statement: &Statement) -> &'static str {
    match statement {
        Statement::Insert { .. } => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete { .. } => "DELETE",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::Drop { .. } => "DROP",
        Statement::AlterTable { .. } => "ALTER TABLE",
        _ => "non-query statement",
    }
}

#[derive(Default)]
struct WriteNodeVisitor {
    found: Option<&'static str>,
}

impl Visitor for WriteNodeVisitor {
    type Break = ();

    fn pre_visit_statement(&mut self, statement: &Statement) -> ControlFlow<Self::Break> {
        let name = match statement {
            Statement::Insert { .. } => Some("INSERT"),
            Statement::Update { .. } => Some("UPDATE"),
            Statement::Delete { .. } => Some("DELETE"),
            Statement::CreateTable { .. } => Some("CREATE TABLE"),
            Statement::CreateView { .. } => Some("CREATE VIEW"),
            Statement::Drop { .. } => Some("DROP"),
            Statement::AlterTable { .. } => Some("ALTER TABLE"),
            Statement::Truncate { .. } => Some("TRUNCATE"),
            Statement::Grant { .. } => Some("GRANT"),
            Statement::Revoke { .. } => Some("REVOKE"),
            Statement::Merge { .. } => Some("MERGE"),
            _ => None,
        };
        if let Some(name) = name {
            self.found = Some(name);
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    }
}

fn sqlparser_dialect_for(dialect: Dialect) -> Box<dyn SqlParserDialect> {
    match dialect {
        Dialect::Postgres => Box::new(PostgreSqlDialect {}),
        Dialect::Oracle => Box::new(GenericDialect {}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresProfile;

    #[test]
    fn accepts_plain_select() {
        assert!(check("SELECT id FROM orders", &PostgresProfile::new()).is_ok());
    }

    #[test]
    fn accepts_union_of_selects() {
        assert!(check("SELECT id FROM a UNION ALL SELECT id FROM b", &PostgresProfile::new()).is_ok());
    }

    #[test]
    fn rejects_insert_masquerading_behind_cte() {
        let sql = "WITH x AS (SELECT 1) INSERT INTO orders SELECT * FROM x";
        assert!(check(sql, &PostgresProfile::new()).is_err());
    }

    #[test]
    fn rejects_non_query_root() {
        assert!(check("CREATE TABLE t (id INT)", &PostgresProfile::new()).is_err());
    }
}
