//! Layer 2: literal-aware pattern deny-list (spec §4.7), grounded on
//! pondpilot-flowscope's `linter::document` token-walking approach so a
//! `--` inside a string literal is never mistaken for a comment.

use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};

use crate::dialect::DialectProfile;

/// `xp_` is SQL Server's prefix for extended stored procedures (`xp_cmdshell`
/// and friends); denying the prefix rather than a fixed name list catches
/// user-defined ones too.
const EXTENDED_PROCEDURE_PREFIX: &str = "xp_";

/// Functions that write to a system catalog or the filesystem instead of
/// returning rows, grouped under the dialects that expose them (spec §4.7
/// layer 2).
const SYSTEM_CATALOG_WRITE_FUNCTIONS: &[&str] = &[
    "pg_terminate_backend",
    "pg_cancel_backend",
    "lo_import",
    "lo_export",
    "dblink_exec",
    "dblink_connect",
    "set_config",
    "pg_reload_conf",
    "pg_read_binary_file",
    "pg_ls_dir",
    "utl_file",
    "dbms_scheduler",
];

/// Denies statement stacking (a second statement after a `;`), comment-based
/// truncation (`--`, `/* ... */`) outside string literals, file-writing
/// clauses (`INTO OUTFILE`/`INTO DUMPFILE`), `xp_`-prefixed extended
/// procedures, and calls into functions that write to a system catalog
/// (spec §4.7 layer 2).
pub fn check(sql: &str, dialect_profile: &dyn DialectProfile) -> Result<(), String> {
    let sqlparser_dialect = sqlparser_dialect_for(dialect_profile);
    let tokens = Tokenizer::new(sqlparser_dialect.as_ref(), sql)
        .tokenize()
        .map_err(|e| format!("tokenizer error: {e}"))?;

    let mut seen_semicolon_with_more = false;
    let mut saw_comment = false;

    for (idx, token) in tokens.iter().enumerate() {
        match token {
            Token::SemiColon => {
                let has_more_content = tokens[idx + 1..]
                    .iter()
                    .any(|t| !matches!(t, Token::Whitespace(_) | Token::SemiColon));
                if has_more_content {
                    seen_semicolon_with_more = true;
                }
            },
            Token::Whitespace(Whitespace::SingleLineComment { .. }) => saw_comment = true,
            Token::Whitespace(Whitespace::MultiLineComment(_)) => saw_comment = true,
            _ => {},
        }
    }

    if seen_semicolon_with_more {
        return Err("multiple statements are not allowed".to_string());
    }
    if saw_comment {
        return Err("SQL comments are not allowed in generated queries".to_string());
    }

    let words: Vec<&str> = tokens
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) => Some(w.value.as_str()),
            _ => None,
        })
        .collect();

    for pair in words.windows(2) {
        if pair[0].eq_ignore_ascii_case("into") && (pair[1].eq_ignore_ascii_case("outfile") || pair[1].eq_ignore_ascii_case("dumpfile")) {
            return Err("writing query output to a file is not allowed".to_string());
        }
    }

    for word in &words {
        if word.to_ascii_lowercase().starts_with(EXTENDED_PROCEDURE_PREFIX) {
            return Err(format!("extended procedure `{word}` is not allowed"));
        }
        if SYSTEM_CATALOG_WRITE_FUNCTIONS.iter().any(|denied| word.eq_ignore_ascii_case(denied)) {
            return Err(format!("function `{word}` writes to a system catalog and is not allowed"));
        }
    }

    Ok(())
}

fn sqlparser_dialect_for(dialect_profile: &dyn DialectProfile) -> Box<dyn sqlparser::dialect::Dialect> {
    match dialect_profile.dialect() {
        crate::models::Dialect::Postgres => Box::new(sqlparser::dialect::PostgreSqlDialect {}),
        crate::models::Dialect::Oracle => Box::new(sqlparser::dialect::GenericDialect {}),
    }
}
