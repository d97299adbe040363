// SPDX-License-Identifier: GPL-3.0-only

//! In-session capture roll
//!
//! Stills and recordings taken during a session wait here, each with a
//! thumbnail preview, until the user finishes or cancels the session.

use crate::constants::capture::FILENAME_TIMESTAMP_FORMAT;
use crate::media::{IncomingFile, MediaOrigin, PreviewHandle, PreviewRegistry};
use bytes::Bytes;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::debug;

/// Kind of captured media
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Photo,
    Video,
}

impl CaptureKind {
    fn origin(self) -> MediaOrigin {
        match self {
            CaptureKind::Photo => MediaOrigin::CapturedPhoto,
            CaptureKind::Video => MediaOrigin::CapturedVideo,
        }
    }

    fn stem(self) -> &'static str {
        match self {
            CaptureKind::Photo => "photo",
            CaptureKind::Video => "video",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            CaptureKind::Photo => "jpeg",
            CaptureKind::Video => "mp4",
        }
    }
}

/// One capture awaiting hand-off
#[derive(Debug)]
pub struct CapturedItem {
    pub kind: CaptureKind,
    pub content_type: String,
    pub data: Bytes,
    pub captured_at: DateTime<Local>,
    thumbnail: PreviewHandle,
}

impl CapturedItem {
    pub fn thumbnail_url(&self) -> &str {
        self.thumbnail.url()
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Ordered captures of the current session
pub struct CaptureRoll {
    items: Vec<CapturedItem>,
    previews: Arc<dyn PreviewRegistry>,
}

impl CaptureRoll {
    pub fn new(previews: Arc<dyn PreviewRegistry>) -> Self {
        Self {
            items: Vec::new(),
            previews,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CapturedItem] {
        &self.items
    }

    /// Append a capture and return its index
    pub fn push(&mut self, kind: CaptureKind, data: Bytes, content_type: &str) -> usize {
        let thumbnail = PreviewHandle::allocate(&self.previews, content_type, &data);
        self.items.push(CapturedItem {
            kind,
            content_type: content_type.to_string(),
            data,
            captured_at: Local::now(),
            thumbnail,
        });
        debug!(kind = ?kind, index = self.items.len() - 1, "Capture added to roll");
        self.items.len() - 1
    }

    /// Delete a capture, revoking its thumbnail
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.items.len() {
            return false;
        }
        let item = self.items.remove(index);
        debug!(kind = ?item.kind, index, "Capture removed from roll");
        true
    }

    /// Drop every capture
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Turn the roll into files for ingestion
    ///
    /// Names are `{timestamp}-photo{index}.jpeg` and
    /// `{timestamp}-video{index}.mp4`, indexed by position in the roll.
    /// Thumbnails are revoked as the items are consumed.
    pub fn take_files(&mut self) -> Vec<IncomingFile> {
        let timestamp = Local::now().format(FILENAME_TIMESTAMP_FORMAT).to_string();
        self.items
            .drain(..)
            .enumerate()
            .map(|(index, item)| {
                let name = format!(
                    "{}-{}{}.{}",
                    timestamp,
                    item.kind.stem(),
                    index,
                    item.kind.extension()
                );
                IncomingFile::new(name, item.content_type, item.data, item.kind.origin())
            })
            .collect()
    }
}

impl std::fmt::Debug for CaptureRoll {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureRoll")
            .field("items", &self.items)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ObjectUrlRegistry;

    #[test]
    fn test_take_files_names_and_revokes() {
        let registry = ObjectUrlRegistry::shared();
        let mut roll = CaptureRoll::new(registry.clone());

        roll.push(CaptureKind::Photo, Bytes::from_static(b"a"), "image/jpeg");
        roll.push(CaptureKind::Video, Bytes::from_static(b"bb"), "video/mp4");
        roll.push(CaptureKind::Photo, Bytes::from_static(b"c"), "image/jpeg");
        assert!(roll.remove(0));
        assert!(!roll.remove(5));
        assert_eq!(registry.stats().revoked, 1);

        let files = roll.take_files();
        assert!(roll.is_empty());
        assert_eq!(files.len(), 2);
        assert!(files[0].name.ends_with("-video0.mp4"));
        assert_eq!(files[0].origin, MediaOrigin::CapturedVideo);
        assert!(files[1].name.ends_with("-photo1.jpeg"));
        assert_eq!(files[1].name.len(), "20260101000000-photo1.jpeg".len());
        assert!(registry.stats().is_balanced());
    }
}
