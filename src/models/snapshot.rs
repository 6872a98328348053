use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{EntryId, TagId};

/// A tag as the store sends it.
///
/// `entries` and `total_entries` are informational; the graph derives both
/// from the entries' categories on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub id: TagId,
    pub name: String,
    #[serde(default)]
    pub children: Vec<TagId>,
    #[serde(default)]
    pub entries: Vec<EntryId>,
    #[serde(default)]
    pub total_entries: usize,
    #[serde(default, with = "super::timestamp::option")]
    pub modified_at: Option<OffsetDateTime>,
}

impl TagRecord {
    /// Record for a freshly created, childless tag.
    pub fn new(id: TagId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            children: Vec::new(),
            entries: Vec::new(),
            total_entries: 0,
            modified_at: None,
        }
    }
}

/// An entry as the store sends it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: EntryId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(with = "super::timestamp")]
    pub created_at: OffsetDateTime,
    #[serde(with = "super::timestamp")]
    pub modified_at: OffsetDateTime,
    pub category: TagId,
}

/// The fetch-all payload: every tag and every entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tags: Vec<TagRecord>,
    pub entries: Vec<EntryRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn deserializes_store_payload() {
        let json = r#"{
            "tags": [
                {"id": 1, "name": "main", "children": [2], "entries": [], "total_entries": 1,
                 "modified_at": "2020-05-01 10:00:00"},
                {"id": 2, "name": "rust", "children": []}
            ],
            "entries": [
                {"id": 7, "title": "Borrowing", "content": "shared xor mutable",
                 "created_at": "2020-04-01 09:00:00", "modified_at": "2020-05-01 10:00:00",
                 "category": 2}
            ]
        }"#;

        let snapshot: Snapshot = serde_json::from_str(json).unwrap();

        assert_eq!(snapshot.tags.len(), 2);
        assert_eq!(snapshot.tags[0].children, vec![TagId::new(2)]);
        assert_eq!(
            snapshot.tags[0].modified_at,
            Some(datetime!(2020-05-01 10:00:00 UTC))
        );
        assert!(snapshot.tags[1].modified_at.is_none());
        assert_eq!(snapshot.entries[0].category, TagId::new(2));
    }

    #[test]
    fn null_modified_at_is_none() {
        let json = r#"{"id": 3, "name": "empty", "children": [], "modified_at": null}"#;
        let tag: TagRecord = serde_json::from_str(json).unwrap();
        assert!(tag.modified_at.is_none());
    }

    #[test]
    fn serializes_timestamps_in_store_format() {
        let entry = EntryRecord {
            id: EntryId::new(1),
            title: "t".into(),
            content: String::new(),
            created_at: datetime!(2021-02-03 04:05:06 UTC),
            modified_at: datetime!(2021-02-03 04:05:06 UTC),
            category: TagId::new(1),
        };

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["created_at"], "2021-02-03 04:05:06");
    }
}
