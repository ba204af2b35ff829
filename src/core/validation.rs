//! Input validation for identifiers, namespaces and policy patterns
//!
//! Everything here runs before any collaborator round trip, so malformed
//! input always surfaces as `InvalidArgument` and never as `NotFound`.

use crate::core::error::{IamError, Result};
use crate::core::iam::Scope;
use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

/// Pattern for non-global namespace names
///
/// Letters, digits, `_`, `.` and `-`; must start and end with a letter or digit.
/// The empty string is the global namespace and is handled separately.
const NAMESPACE_PATTERN: &str = r"^[A-Za-z0-9]([A-Za-z0-9_.-]*[A-Za-z0-9])?$";

/// Maximum namespace length
pub const MAX_NAMESPACE_LENGTH: usize = 128;

/// Maximum length of identity/policy display names and logins
pub const MAX_NAME_LENGTH: usize = 256;

/// Maximum length of a single resource or action pattern
pub const MAX_PATTERN_LENGTH: usize = 1024;

fn namespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NAMESPACE_PATTERN).expect("namespace pattern is a valid regex"))
}

/// Validate a namespace name (`""` is the global namespace)
///
/// # Examples
///
/// ```
/// use bastion_iam::core::validation::validate_namespace;
///
/// assert!(validate_namespace("").is_ok());
/// assert!(validate_namespace("tenant-a").is_ok());
/// assert!(validate_namespace("bad namespace").is_err());
/// assert!(validate_namespace("a:b").is_err());
/// ```
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.is_empty() {
        return Ok(());
    }

    if namespace.len() > MAX_NAMESPACE_LENGTH {
        return Err(IamError::invalid_argument(format!(
            "namespace too long (max {} characters)",
            MAX_NAMESPACE_LENGTH
        )));
    }

    if !namespace_regex().is_match(namespace) {
        return Err(IamError::invalid_argument(format!(
            "namespace '{}' may only contain letters, digits, '_', '.' and '-'",
            namespace
        )));
    }

    Ok(())
}

/// Parse a textual identifier, rejecting malformed input
pub fn parse_uuid(field: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value.trim())
        .map_err(|_| IamError::invalid_argument(format!("{} '{}' is not a valid uuid", field, value)))
}

/// Validate a display name or login
pub fn validate_name(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(IamError::invalid_argument(format!("{} cannot be empty", field)));
    }
    if value.len() > MAX_NAME_LENGTH {
        return Err(IamError::invalid_argument(format!(
            "{} too long (max {} characters)",
            field, MAX_NAME_LENGTH
        )));
    }
    Ok(())
}

/// Validate a policy's resource or action pattern list
///
/// A policy must grant at least one pattern per list and no pattern may be empty.
pub fn validate_patterns(field: &str, patterns: &[String]) -> Result<()> {
    if patterns.is_empty() {
        return Err(IamError::invalid_argument(format!(
            "{} must contain at least one pattern",
            field
        )));
    }

    for (i, pattern) in patterns.iter().enumerate() {
        if pattern.is_empty() {
            return Err(IamError::invalid_argument(format!(
                "{}[{}] cannot be empty",
                field, i
            )));
        }
        if pattern.len() > MAX_PATTERN_LENGTH {
            return Err(IamError::invalid_argument(format!(
                "{}[{}] too long (max {} characters)",
                field, i, MAX_PATTERN_LENGTH
            )));
        }
    }

    Ok(())
}

/// Validate requested scopes (namespaces only; empty lists are legal)
pub fn validate_scopes(scopes: &[Scope]) -> Result<()> {
    for scope in scopes {
        validate_namespace(&scope.namespace)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_namespaces() {
        assert!(validate_namespace("").is_ok());
        assert!(validate_namespace("a").is_ok());
        assert!(validate_namespace("tenant_1.prod-eu").is_ok());
        assert!(validate_namespace("UPPER123").is_ok());
    }

    #[test]
    fn test_invalid_namespaces() {
        assert!(validate_namespace("-leading").is_err());
        assert!(validate_namespace("trailing-").is_err());
        assert!(validate_namespace("has space").is_err());
        assert!(validate_namespace("colon:sep").is_err());
        assert!(validate_namespace(&"a".repeat(MAX_NAMESPACE_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_parse_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid("uuid", &id.to_string()).unwrap(), id);

        let err = parse_uuid("uuid", "not-a-uuid").unwrap_err();
        assert!(matches!(err, IamError::InvalidArgument(_)));
        assert!(parse_uuid("uuid", "").is_err());
    }

    #[test]
    fn test_names() {
        assert!(validate_name("name", "alice").is_ok());
        assert!(validate_name("name", "   ").is_err());
        assert!(validate_name("name", &"x".repeat(MAX_NAME_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_patterns() {
        assert!(validate_patterns("resources", &["res*".to_string()]).is_ok());
        assert!(validate_patterns("resources", &[]).is_err());
        assert!(validate_patterns("actions", &["read".to_string(), String::new()]).is_err());
    }

    #[test]
    fn test_scopes() {
        let ok = vec![Scope::new("", vec!["r".into()], vec!["a".into()])];
        assert!(validate_scopes(&ok).is_ok());

        let bad = vec![Scope::new("bad ns", vec![], vec![])];
        assert!(validate_scopes(&bad).is_err());
    }
}
