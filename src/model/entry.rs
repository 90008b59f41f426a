//! The gallery entry record.
//!
//! An entry is one image reference with an optional caption, stamped by the
//! store when it is appended. The JSON form is camelCase so the HTTP API,
//! the sync client and any browser front end speak the same shape.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque entry identifier, assigned by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for EntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A stored gallery entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Store-assigned identifier.
    pub id: EntryId,

    /// URL of the image content.
    pub image_ref: String,

    /// Optional caption. `None` and `Some("")` are distinct.
    pub caption: Option<String>,

    /// Insertion timestamp, non-decreasing in insertion order.
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// Caption text for display, if there is a non-empty one.
    pub fn display_caption(&self) -> Option<&str> {
        self.caption.as_deref().filter(|c| !c.is_empty())
    }

    /// Date formatted the way the gallery shows it, e.g. "Mar 4, 2026 09:15".
    pub fn display_date(&self) -> String {
        self.created_at.format("%b %-d, %Y %H:%M").to_string()
    }
}

/// Body of `POST /entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntry {
    /// Missing and empty are both rejected by the store.
    #[serde(default)]
    pub image_ref: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// Body of `GET /entries`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryList {
    pub entries: Vec<Entry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entry {
        Entry {
            id: "2f1c7a52-4d3b-4c1e-9a55-0a2b3c4d5e6f".parse().unwrap(),
            image_ref: "https://x/y.jpg".to_string(),
            caption: Some("hi".to_string()),
            created_at: DateTime::parse_from_rfc3339("2026-03-04T09:15:00Z")
                .unwrap()
                .with_timezone(&Utc),
        }
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let json = serde_json::to_value(sample()).unwrap();

        assert_eq!(json["id"], "2f1c7a52-4d3b-4c1e-9a55-0a2b3c4d5e6f");
        assert_eq!(json["imageRef"], "https://x/y.jpg");
        assert_eq!(json["caption"], "hi");
        assert!(json["createdAt"].as_str().unwrap().starts_with("2026-03-04T09:15:00"));
    }

    #[test]
    fn test_absent_caption_is_null_not_empty() {
        let mut entry = sample();
        entry.caption = None;
        let json = serde_json::to_value(&entry).unwrap();
        assert!(json["caption"].is_null());

        entry.caption = Some(String::new());
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["caption"], "");
    }

    #[test]
    fn test_new_entry_accepts_missing_fields() {
        let body: NewEntry = serde_json::from_str("{}").unwrap();
        assert_eq!(body.image_ref, None);
        assert_eq!(body.caption, None);

        let body: NewEntry =
            serde_json::from_str(r#"{"imageRef":"https://x/y.jpg","caption":"hi"}"#).unwrap();
        assert_eq!(body.image_ref.as_deref(), Some("https://x/y.jpg"));
        assert_eq!(body.caption.as_deref(), Some("hi"));
    }

    #[test]
    fn test_display_helpers() {
        let entry = sample();
        assert_eq!(entry.display_date(), "Mar 4, 2026 09:15");
        assert_eq!(entry.display_caption(), Some("hi"));

        let blank = Entry { caption: Some(String::new()), ..entry };
        assert_eq!(blank.display_caption(), None);
    }
}
