// SPDX-License-Identifier: GPL-3.0-only

//! Media entries flowing through capture, ingestion and the pending store
//!
//! An entry is created when a file first enters the pipeline and is mutated
//! only by the resize step. Its state moves forward only:
//!
//! ```text
//! PendingValidation ──▶ Resizing ──▶ Ready
//!        │
//!        └────────────▶ Rejected
//! ```

pub mod preview;

pub use preview::{ObjectUrlRegistry, PreviewHandle, PreviewRegistry, PreviewStats};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::warn;

/// Stable identity of an entry within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryId(String);

impl EntryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaOrigin {
    Picked,
    Dropped,
    CapturedPhoto,
    CapturedVideo,
    /// Already attached to the report before this session
    Preloaded,
}

impl std::fmt::Display for MediaOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MediaOrigin::Picked => "picked",
            MediaOrigin::Dropped => "dropped",
            MediaOrigin::CapturedPhoto => "captured-photo",
            MediaOrigin::CapturedVideo => "captured-video",
            MediaOrigin::Preloaded => "preloaded",
        };
        f.write_str(s)
    }
}

/// Processing state of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    PendingValidation,
    Resizing,
    Ready,
    Rejected,
}

impl EntryState {
    pub fn is_terminal(self) -> bool {
        matches!(self, EntryState::Ready | EntryState::Rejected)
    }

    /// Whether `self → next` is a legal transition
    pub fn can_transition_to(self, next: EntryState) -> bool {
        matches!(
            (self, next),
            (EntryState::PendingValidation, EntryState::Resizing)
                | (EntryState::PendingValidation, EntryState::Rejected)
                | (EntryState::Resizing, EntryState::Ready)
        )
    }
}

/// Content of an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Bytes held locally
    Inline { data: Bytes, content_type: String },
    /// Media already stored by the backend
    Remote { url: String },
}

impl Payload {
    pub fn len(&self) -> u64 {
        match self {
            Payload::Inline { data, .. } => data.len() as u64,
            Payload::Remote { .. } => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn content_type(&self) -> Option<&str> {
        match self {
            Payload::Inline { content_type, .. } => Some(content_type),
            Payload::Remote { .. } => None,
        }
    }
}

/// A file offered to the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub name: String,
    /// Declared content type
    pub content_type: String,
    pub data: Bytes,
    pub origin: MediaOrigin,
}

impl IncomingFile {
    pub fn new(
        name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
        origin: MediaOrigin,
    ) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
            origin,
        }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Read a file from disk, deriving its content type from the extension
    pub async fn from_path(path: &Path, origin: MediaOrigin) -> std::io::Result<Self> {
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, content_type_for_path(path), data, origin))
    }
}

/// Guess a content type from a file extension
pub fn content_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" | "m4v" => "video/mp4",
        "mpeg" | "mpg" => "video/mpeg",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mov" => "video/quicktime",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// One unit of media in the pipeline
#[derive(Debug)]
pub struct MediaEntry {
    id: EntryId,
    name: String,
    payload: Payload,
    size_bytes: u64,
    preview: Option<PreviewHandle>,
    origin: MediaOrigin,
    state: EntryState,
}

impl MediaEntry {
    /// New entry for an incoming file, awaiting validation
    pub fn pending(id: EntryId, file: IncomingFile) -> Self {
        let size_bytes = file.size();
        Self {
            id,
            name: file.name,
            payload: Payload::Inline {
                data: file.data,
                content_type: file.content_type,
            },
            size_bytes,
            preview: None,
            origin: file.origin,
            state: EntryState::PendingValidation,
        }
    }

    /// Ready entry for media the report already references
    pub fn remote(id: EntryId, url: String) -> Self {
        Self {
            id,
            name: url.rsplit('/').next().unwrap_or_default().to_string(),
            payload: Payload::Remote { url },
            size_bytes: 0,
            preview: None,
            origin: MediaOrigin::Preloaded,
            state: EntryState::Ready,
        }
    }

    pub fn id(&self) -> &EntryId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn origin(&self) -> MediaOrigin {
        self.origin
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    /// URL a display surface or the report uses for this entry
    pub fn reference_url(&self) -> Option<&str> {
        match &self.payload {
            Payload::Remote { url } => Some(url),
            Payload::Inline { .. } => self.preview.as_ref().map(|p| p.url()),
        }
    }

    fn transition(&mut self, next: EntryState) -> bool {
        if !self.state.can_transition_to(next) {
            warn!(entry = %self.id, from = ?self.state, to = ?next, "Illegal entry transition");
            return false;
        }
        self.state = next;
        true
    }

    /// Move to resizing (also taken by entries that need no resize)
    pub fn begin_resize(&mut self) -> bool {
        self.transition(EntryState::Resizing)
    }

    /// Swap in a resized payload; only legal while resizing
    pub fn replace_payload(&mut self, data: Bytes, content_type: String) -> bool {
        if self.state != EntryState::Resizing {
            warn!(entry = %self.id, state = ?self.state, "Payload change outside resize");
            return false;
        }
        self.size_bytes = data.len() as u64;
        self.payload = Payload::Inline { data, content_type };
        true
    }

    /// Finish processing and attach a preview
    pub fn mark_ready(&mut self, registry: &std::sync::Arc<dyn PreviewRegistry>) -> bool {
        if !self.transition(EntryState::Ready) {
            return false;
        }
        if let Payload::Inline { data, content_type } = &self.payload {
            self.preview = Some(PreviewHandle::allocate(registry, content_type, data));
        }
        true
    }

    pub fn reject(&mut self) -> bool {
        self.transition(EntryState::Rejected)
    }

    /// Release the preview now rather than at drop
    pub fn release_preview(&mut self) {
        self.preview = None;
    }
}

/// Hands out unique entry identities
///
/// The first file with a given name keeps the plain name; later ones get a
/// `#n` suffix. Identities are never reused, even after removal.
#[derive(Debug, Default)]
pub struct IdentityAllocator {
    counters: HashMap<String, u32>,
    issued: HashSet<String>,
}

impl IdentityAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, name: &str) -> EntryId {
        let counter = self.counters.entry(name.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = if *counter == 1 {
                name.to_string()
            } else {
                format!("{}#{}", name, counter)
            };
            if self.issued.insert(candidate.clone()) {
                return EntryId(candidate);
            }
        }
    }
}
