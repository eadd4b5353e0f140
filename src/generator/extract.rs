//! Extracts a candidate SQL statement from a raw LLM completion, and
//! detects refusal (spec §4.6 step 4, §9's conservative-refusal decision
//! recorded in DESIGN.md).

const SQL_VERBS: &[&str] = &["select", "with"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedSql {
    pub sql: String,
    pub refused: bool,
}

/// Extracts SQL from a completion: prefers a fenced ```sql block, falls
/// back to the longest substring anchored at a recognized SQL verb.
/// Refusal fires only when extraction yields nothing.
pub fn extract(raw: &str) -> ExtractedSql {
    if let Some(fenced) = extract_fenced_block(raw) {
        if !fenced.trim().is_empty() {
            return ExtractedSql { sql: fenced.trim().to_string(), refused: false };
        }
    }

    if let Some(verb_anchored) = extract_verb_anchored(raw) {
        return ExtractedSql { sql: verb_anchored, refused: false };
    }

    ExtractedSql { sql: String::new(), refused: true }
}

fn extract_fenced_block(raw: &str) -> Option<String> {
    let start = raw.find("```")?;
    let after_fence = &raw[start + 3..];
    let after_fence = after_fence.strip_prefix("sql").unwrap_or(after_fence);
    let end = after_fence.find("```")?;
    Some(after_fence[..end].to_string())
}

fn extract_verb_anchored(raw: &str) -> Option<String> {
    let lower = raw.to_lowercase();
    let mut best: Option<(usize, usize)> = None;

    for verb in SQL_VERBS {
        let pattern = format!("{verb} ");
        if let Some(pos) = lower.find(&pattern) {
            let len = raw.len() - pos;
            if best.is_none_or(|(_, best_len)| len > best_len) {
                best = Some((pos, len));
            }
        }
    }

    best.map(|(pos, _)| raw[pos..].trim().trim_end_matches(';').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_fenced_sql_block() {
        let raw = "Here is the query:\n```sql\nSELECT * FROM orders\n```\nDone.";
        let extracted = extract(raw);
        assert_eq!(extracted.sql, "SELECT * FROM orders");
        assert!(!extracted.refused);
    }

    #[test]
    fn falls_back_to_verb_anchored_substring() {
        let raw = "I think the answer is SELECT count(*) FROM orders;";
        let extracted = extract(raw);
        assert_eq!(extracted.sql, "SELECT count(*) FROM orders");
        assert!(!extracted.refused);
    }

    #[test]
    fn detects_refusal_when_no_sql_verb_present() {
        let extracted = extract("I can't help with that request.");
        assert!(extracted.refused);
        assert!(extracted.sql.is_empty());
    }
}
