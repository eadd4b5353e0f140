//! Layer 4: re-emit the parsed AST through the target dialect's `Display`
//! impl (spec §4.7). `sqlparser`'s generic `Display` does not rewrite
//! `LIMIT n` to `FETCH FIRST n ROWS ONLY` for Oracle, so that rewrite is
//! implemented here directly over the `Query.limit` AST node.

use sqlparser::ast::{Query, Statement};

use crate::dialect::DialectProfile;
use crate::models::Dialect;

pub fn transpile(statement: &Statement, dialect_profile: &dyn DialectProfile) -> Result<String, String> {
    let Statement::Query(query) = statement else {
        return Err("transpile target must be a query".to_string());
    };

    if dialect_profile.dialect() != Dialect::Oracle {
        return Ok(statement.to_string());
    }

    let mut rewritten = (**query).clone();
    rewrite_limit_to_fetch(&mut rewritten);
    Ok(Statement::Query(Box::new(rewritten)).to_string())
}

fn rewrite_limit_to_fetch(query: &mut Query) {
    match query.limit_clause.take() {
        Some(sqlparser::ast::LimitClause::LimitOffset { limit: Some(limit_expr), offset, limit_by }) => {
            query.limit_clause = Some(sqlparser::ast::LimitClause::LimitOffset { limit: None, offset, limit_by });
            query.fetch = Some(sqlparser::ast::Fetch { with_ties: false, percent: false, quantity: Some(limit_expr) });
        }
        other => query.limit_clause = other,
    }
}
