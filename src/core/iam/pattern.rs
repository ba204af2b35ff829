//! Pattern matching for scope resources and actions
//!
//! Supports a single wildcard form:
//! - `*` - Matches any string at all
//! - `prefix*` - Matches any string starting with `prefix` (literal comparison)
//!
//! Any other pattern, including one with a `*` somewhere other than the end,
//! matches only the identical string. Matching is case-sensitive and covers the
//! whole string.

/// Pattern matcher for resource and action names
pub struct PatternMatcher;

impl PatternMatcher {
    /// Check if a value matches a pattern
    ///
    /// # Examples
    /// ```
    /// use bastion_iam::PatternMatcher;
    ///
    /// assert!(PatternMatcher::matches("*", "anything"));
    /// assert!(PatternMatcher::matches("orders*", "orders/42"));
    /// assert!(PatternMatcher::matches("orders", "orders"));
    /// assert!(!PatternMatcher::matches("orders", "Orders"));
    /// ```
    pub fn matches(pattern: &str, value: &str) -> bool {
        if pattern == "*" {
            return true;
        }

        match pattern.strip_suffix('*') {
            Some(prefix) => value.starts_with(prefix),
            None => pattern == value,
        }
    }

    /// Whether a pattern ends in a wildcard
    pub fn is_wildcard(pattern: &str) -> bool {
        pattern.ends_with('*')
    }

    /// Check if any pattern in the list matches the value
    pub fn any_matches<S: AsRef<str>>(patterns: &[S], value: &str) -> bool {
        patterns
            .iter()
            .any(|pattern| Self::matches(pattern.as_ref(), value))
    }
}
