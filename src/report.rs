// SPDX-License-Identifier: GPL-3.0-only

//! Boundary with the report being composed
//!
//! The report keeps its media as a list of image records. Older reports
//! store plain URL strings; current ones store `{url, isDeleted}` objects.
//! Both shapes are accepted on input and only the record shape is emitted.
//! Nothing outside this module sees either shape.

use crate::media::{EntryId, MediaOrigin, Payload};
use crate::store::PendingMediaStore;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Image record as stored on a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportImage {
    pub url: String,
    #[serde(default)]
    pub is_deleted: bool,
}

impl ReportImage {
    pub fn live(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_deleted: false,
        }
    }

    pub fn deleted(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            is_deleted: true,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredImage {
    Url(String),
    Record(ReportImage),
}

impl From<StoredImage> for ReportImage {
    fn from(stored: StoredImage) -> Self {
        match stored {
            StoredImage::Url(url) => ReportImage::live(url),
            StoredImage::Record(record) => record,
        }
    }
}

/// Parse a report's image list in either stored shape
pub fn parse_report_images(json: &str) -> Result<Vec<ReportImage>, serde_json::Error> {
    let stored: Vec<StoredImage> = serde_json::from_str(json)?;
    Ok(stored.into_iter().map(ReportImage::from).collect())
}

/// One item of a finalized submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionItem {
    /// Local media the backend has not seen yet
    Upload {
        id: EntryId,
        name: String,
        content_type: String,
        data: Bytes,
        origin: MediaOrigin,
    },
    /// Media the report already references
    Existing { url: String },
}

/// Ordered, validated media list handed to submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    pub items: Vec<SubmissionItem>,
    /// Previously attached URLs the user removed
    pub removed: Vec<String>,
}

impl Submission {
    pub fn upload_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, SubmissionItem::Upload { .. }))
            .count()
    }
}

/// Build the submission list from the store, in store order
pub fn finalize(store: &PendingMediaStore) -> Submission {
    let items = store
        .entries()
        .map(|entry| match entry.payload() {
            Payload::Inline { data, content_type } => SubmissionItem::Upload {
                id: entry.id().clone(),
                name: entry.name().to_string(),
                content_type: content_type.clone(),
                data: data.clone(),
                origin: entry.origin(),
            },
            Payload::Remote { url } => SubmissionItem::Existing { url: url.clone() },
        })
        .collect();

    Submission {
        items,
        removed: store.removed_urls().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_both_shapes() {
        let images = parse_report_images(
            r#"["https://cdn/a.jpg", {"url": "https://cdn/b.jpg", "isDeleted": true}, {"url": "https://cdn/c.jpg"}]"#,
        )
        .unwrap();
        assert_eq!(
            images,
            vec![
                ReportImage::live("https://cdn/a.jpg"),
                ReportImage::deleted("https://cdn/b.jpg"),
                ReportImage::live("https://cdn/c.jpg"),
            ]
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_string(&ReportImage::deleted("u")).unwrap();
        assert_eq!(json, r#"{"url":"u","isDeleted":true}"#);
    }
}
