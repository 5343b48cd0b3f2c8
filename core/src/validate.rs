//! Validation of migration identifiers and slugs.
//!
//! The id format is load-bearing: lexicographic order must equal
//! chronological order, so the timestamp is fixed-width and the slug is
//! restricted to characters that sort predictably on every filesystem.

use thiserror::Error;

use crate::types::ID_PREFIX;

/// Problems with a migration id or slug.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// Id does not start with `m_`.
    #[error("migration id must start with '{ID_PREFIX}'")]
    MissingPrefix,
    /// Timestamp portion is not exactly 14 digits.
    #[error("migration id timestamp must be 14 digits (YYYYMMDDHHMMSS)")]
    InvalidTimestamp,
    /// Slug portion is empty.
    #[error("migration id slug cannot be empty")]
    EmptySlug,
    /// Slug contains a character outside `[a-z0-9_]`.
    #[error("invalid character '{0}' in migration slug")]
    InvalidSlugChar(char),
}

/// Checks a full id string against the `m_<14 digits>_<slug>` format.
pub(crate) fn validate_id(raw: &str) -> Result<(), IdError> {
    let rest = raw.strip_prefix(ID_PREFIX).ok_or(IdError::MissingPrefix)?;
    if rest.len() < 15 || !rest.as_bytes()[..14].iter().all(u8::is_ascii_digit) {
        return Err(IdError::InvalidTimestamp);
    }
    let (_, slug) = rest.split_at(14);
    let slug = slug.strip_prefix('_').ok_or(IdError::InvalidTimestamp)?;
    validate_slug(slug)
}

/// Checks that a slug is non-empty lowercase ASCII alphanumerics and
/// underscores.
///
/// # Examples
///
/// ```
/// use schema_migrate_core::validate_slug;
///
/// assert!(validate_slug("create_users").is_ok());
/// assert!(validate_slug("Create Users").is_err());
/// ```
pub fn validate_slug(slug: &str) -> Result<(), IdError> {
    if slug.is_empty() {
        return Err(IdError::EmptySlug);
    }
    for ch in slug.chars() {
        if !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_') {
            return Err(IdError::InvalidSlugChar(ch));
        }
    }
    Ok(())
}

/// Normalizes a free-form migration name into a valid slug.
///
/// Uppercase letters are lowercased, runs of other characters collapse to a
/// single underscore, and leading/trailing underscores are trimmed. An input
/// with no usable characters becomes `"migration"`.
///
/// # Examples
///
/// ```
/// use schema_migrate_core::sanitize_slug;
///
/// assert_eq!(sanitize_slug("Create Users"), "create_users");
/// assert_eq!(sanitize_slug("add-email!!"), "add_email");
/// assert_eq!(sanitize_slug("---"), "migration");
/// ```
pub fn sanitize_slug(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_sep = false;
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if ch == '_' {
                if !last_was_sep && !out.is_empty() {
                    out.push('_');
                }
                last_was_sep = true;
            } else {
                out.push(ch.to_ascii_lowercase());
                last_was_sep = false;
            }
        } else if !last_was_sep && !out.is_empty() {
            out.push('_');
            last_was_sep = true;
        } else {
            last_was_sep = true;
        }
    }
    let cleaned = out.trim_matches('_');
    if cleaned.is_empty() {
        "migration".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_id_accepts_canonical() {
        assert!(validate_id("m_20250101120000_create_users").is_ok());
        assert!(validate_id("m_19991231235959_a").is_ok());
    }

    #[test]
    fn test_validate_id_rejects_missing_prefix() {
        assert_eq!(
            validate_id("20250101120000_create_users"),
            Err(IdError::MissingPrefix)
        );
    }

    #[test]
    fn test_validate_id_rejects_short_timestamp() {
        assert_eq!(
            validate_id("m_20250101_create_users"),
            Err(IdError::InvalidTimestamp)
        );
    }

    #[test]
    fn test_validate_id_rejects_missing_separator() {
        assert_eq!(
            validate_id("m_20250101120000create"),
            Err(IdError::InvalidTimestamp)
        );
    }

    #[test]
    fn test_validate_slug_rejects_uppercase_and_spaces() {
        assert_eq!(validate_slug("Users"), Err(IdError::InvalidSlugChar('U')));
        assert_eq!(
            validate_slug("create users"),
            Err(IdError::InvalidSlugChar(' '))
        );
        assert_eq!(validate_slug(""), Err(IdError::EmptySlug));
    }

    #[test]
    fn test_sanitize_slug_collapses_separators() {
        assert_eq!(sanitize_slug("Create  Users"), "create_users");
        assert_eq!(sanitize_slug("add--email"), "add_email");
        assert_eq!(sanitize_slug("__padded__"), "padded");
    }

    #[test]
    fn test_sanitize_slug_empty_fallback() {
        assert_eq!(sanitize_slug(""), "migration");
        assert_eq!(sanitize_slug("!!!"), "migration");
    }

    #[test]
    fn test_sanitize_then_validate() {
        for raw in ["Create Users", "weird//name", "UPPER", "ok_already"] {
            assert!(validate_slug(&sanitize_slug(raw)).is_ok(), "raw: {raw}");
        }
    }
}
