//! Envelope fields shared by every stored document
//!
//! Each collection embeds this under `metadata`; reads filter on
//! `metadata.is_deleted` so soft-deleted records never surface.

use bson::DateTime;
use serde::{Deserialize, Serialize};

/// Lifecycle timestamps plus the soft-delete flag
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Metadata {
    #[serde(default)]
    pub is_deleted: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime>,
}

impl Metadata {
    /// Envelope for a record being inserted now
    pub fn new() -> Self {
        let now = DateTime::now();
        Self {
            is_deleted: false,
            deleted_at: None,
            updated_at: Some(now),
            created_at: Some(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_metadata_is_live() {
        let metadata = Metadata::new();
        assert!(!metadata.is_deleted);
        assert!(metadata.deleted_at.is_none());
        assert_eq!(metadata.created_at, metadata.updated_at);
    }

    #[test]
    fn deleted_at_omitted_until_set() {
        let json = serde_json::to_value(Metadata::new()).unwrap();
        assert!(json.get("deleted_at").is_none());
        assert_eq!(json["is_deleted"], false);
    }
}
