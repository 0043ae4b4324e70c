//! Key validation and security utilities.
//!
//! Object keys are `/`-separated strings. Backends that map keys onto a real
//! filesystem (or onto a configured root prefix) must make sure a key can
//! never escape that root.

use crate::error::{ErrorKind, Result};

/// Validates an object key for security and correctness.
///
/// Empty and `.` segments are dropped and `..` segments are resolved, but a
/// key may never climb above the storage root. Null bytes are rejected.
///
/// # Examples
///
/// ```
/// use logsift_storage::validate_key;
/// assert_eq!(validate_key("logs/2024-01-01/app.txt").unwrap(), "logs/2024-01-01/app.txt");
/// assert_eq!(validate_key("logs//./app.txt").unwrap(), "logs/app.txt");
/// assert_eq!(validate_key("a/../b.txt").unwrap(), "b.txt");
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("a\0b").is_err());
/// assert!(validate_key("/").is_err());
/// ```
pub fn validate(key: &str) -> Result<String> {
    let segments = segments(key)?;
    if segments.is_empty() {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    Ok(segments.join("/"))
}

/// Validates a listing prefix.
///
/// Same rules as [`validate`], except that an empty prefix is allowed (list
/// everything) and a trailing `/` is preserved, since `logs/2024` and
/// `logs/2024/` select different objects.
///
/// ```
/// use logsift_storage::validate_prefix;
/// assert_eq!(validate_prefix("").unwrap(), "");
/// assert_eq!(validate_prefix("logs/2024/").unwrap(), "logs/2024/");
/// assert_eq!(validate_prefix("/logs//2024").unwrap(), "logs/2024");
/// assert!(validate_prefix("logs/../../x/").is_err());
/// ```
pub fn validate_prefix(prefix: &str) -> Result<String> {
    let segments = segments(prefix)?;
    let mut normalized = segments.join("/");
    if !normalized.is_empty() && prefix.ends_with('/') {
        normalized.push('/');
    }
    Ok(normalized)
}

fn segments(key: &str) -> Result<Vec<&str>> {
    if key.contains('\0') {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    let mut segments = Vec::new();
    for segment in key.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                }
            },
            s => segments.push(s),
        }
    }
    Ok(segments)
}
