//! String cleanup helpers shared across the pipeline components.

/// Trim a string and collapse empty results to `None`.
#[inline]
pub fn clean_optional_string(s: Option<&String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub trait StringExt {
    /// Trim and return `None` for an empty (or whitespace-only) string.
    fn clean(&self) -> Option<String>;

    /// Trim into an owned `String`.
    fn trimmed(&self) -> String;
}

impl StringExt for str {
    #[inline]
    fn clean(&self) -> Option<String> {
        let trimmed = self.trim();
        if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
    }

    #[inline]
    fn trimmed(&self) -> String {
        self.trim().to_string()
    }
}

impl StringExt for String {
    #[inline]
    fn clean(&self) -> Option<String> {
        self.as_str().clean()
    }

    #[inline]
    fn trimmed(&self) -> String {
        self.as_str().trimmed()
    }
}

impl<T: AsRef<str>> StringExt for Option<T> {
    #[inline]
    fn clean(&self) -> Option<String> {
        self.as_ref().and_then(|s| s.as_ref().clean())
    }

    #[inline]
    fn trimmed(&self) -> String {
        self.as_ref().map(|s| s.as_ref().trim().to_string()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_drops_whitespace_only_strings() {
        assert_eq!("   ".clean(), None);
        assert_eq!(" hi ".clean(), Some("hi".to_string()));
    }
}
