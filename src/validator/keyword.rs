//! Layer 1: token-boundaried keyword deny-list (spec §4.7).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::dialect::DialectProfile;

static DENY_LIST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(INSERT|UPDATE|DELETE|DROP|ALTER|CREATE|TRUNCATE|GRANT|REVOKE|EXEC|EXECUTE|MERGE)\b").unwrap()
});

static ORACLE_PACKAGE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(DBMS_|UTL_)\w*").unwrap());

pub fn check(sql: &str, dialect_profile: &dyn DialectProfile) -> Result<(), String> {
    if let Some(m) = DENY_LIST.find(sql) {
        return Err(format!("disallowed keyword: {}", m.as_str()));
    }

    if dialect_profile.dialect() == crate::models::Dialect::Oracle {
        if let Some(m) = ORACLE_PACKAGE_PREFIX.find(sql) {
            return Err(format!("disallowed package reference: {}", m.as_str()));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{OracleProfile, PostgresProfile};

    #[test]
    fn rejects_insert_as_a_whole_word() {
        assert!(check("INSERT INTO orders VALUES (1)", &PostgresProfile::new()).is_err());
    }

    #[test]
    fn does_not_reject_substring_matches() {
        assert!(check("SELECT * FROM insertions", &PostgresProfile::new()).is_ok());
    }

    #[test]
    fn rejects_oracle_dbms_package_references() {
        assert!(check("SELECT dbms_lock.sleep(1) FROM dual", &OracleProfile::new()).is_err());
    }
}
