//! SQLValidator (C7): four independent layers a generated candidate must
//! clear before execution (spec §4.7).

pub mod ast;
pub mod keyword;
pub mod pattern;
pub mod transpile;

use crate::dialect::DialectProfile;
use crate::models::ValidationLayerKind;

/// Re-exported under the name the rest of the crate's error plumbing
/// expects (`error.rs` forward-declares `crate::validator::ValidatorLayer`).
pub type ValidatorLayer = ValidationLayerKind;

#[derive(Debug, Clone)]
pub struct ValidationRejection {
    pub layer: ValidatorLayer,
    pub message: String,
}

/// Runs all four layers in order, short-circuiting on the first rejection.
/// Returns the dialect-transpiled SQL text on success (layer 4's output).
pub fn validate(sql: &str, dialect_profile: &dyn DialectProfile) -> Result<String, ValidationRejection> {
    keyword::check(sql, dialect_profile).map_err(|message| {
        tracing::debug!(layer = ?ValidatorLayer::Keyword, snippet = %truncate(sql), "validator rejected");
        ValidationRejection { layer: ValidatorLayer::Keyword, message }
    })?;

    pattern::check(sql, dialect_profile).map_err(|message| {
        tracing::debug!(layer = ?ValidatorLayer::Pattern, snippet = %truncate(sql), "validator rejected");
        ValidationRejection { layer: ValidatorLayer::Pattern, message }
    })?;

    let statement = ast::check(sql, dialect_profile).map_err(|message| {
        tracing::debug!(layer = ?ValidatorLayer::Ast, snippet = %truncate(sql), "validator rejected");
        ValidationRejection { layer: ValidatorLayer::Ast, message }
    })?;

    transpile::transpile(&statement, dialect_profile).map_err(|message| {
        tracing::debug!(layer = ?ValidatorLayer::Transpile, snippet = %truncate(sql), "validator rejected");
        ValidationRejection { layer: ValidatorLayer::Transpile, message }
    })
}

fn truncate(sql: &str) -> String {
    sql.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresProfile;

    #[test]
    fn validate_accepts_plain_select() {
        let profile = PostgresProfile::new();
        assert!(validate("SELECT id FROM orders", &profile).is_ok());
    }

    #[test]
    fn validate_rejects_write_statement_at_keyword_layer() {
        let profile = PostgresProfile::new();
        let err = validate("DELETE FROM orders", &profile).unwrap_err();
        assert_eq!(err.layer, ValidatorLayer::Keyword);
    }
}
