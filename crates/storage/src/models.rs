//! Storage models.

use time::OffsetDateTime;

/// Object metadata returned by storage backends when listing.
///
/// The `key` is relative to the backend's configured root (S3 key prefix or
/// local directory), always uses `/` as separator, and is what gets reported
/// back to clients alongside matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Key relative to the storage root
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modified timestamp, when the backend reports one
    pub modified: Option<OffsetDateTime>,
}
impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: u64, modified: Option<OffsetDateTime>) -> Self {
        Self { key: key.into(), size, modified }
    }

    /// Whether the key ends with `suffix` (case-sensitive, like S3 keys).
    pub fn has_suffix(&self, suffix: &str) -> bool {
        self.key.ends_with(suffix)
    }
}
