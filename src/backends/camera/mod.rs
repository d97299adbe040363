// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! This module defines the platform boundary for live capture. A backend
//! enumerates devices and hands out exclusively owned live streams; a stream
//! grabs stills, applies torch constraints and attaches recorders.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureSession    │  ← State machine, hardware release on every exit
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← Enumeration, stream acquisition
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │  LiveStream Trait   │  ← Still frames, torch, recorder, track stop
//! └─────────────────────┘
//! ```

pub mod slots;
pub mod types;

pub use slots::CameraSlots;
pub use types::*;

use crate::errors::BackendResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

/// Platform camera backend
///
/// Implementations must not keep a reference to streams they hand out: once
/// acquired, a stream is owned by its caller until its tracks are stopped.
#[async_trait]
pub trait CameraBackend: Send + Sync {
    /// Enumerate available cameras and their capabilities
    async fn enumerate_devices(&self) -> BackendResult<Vec<CameraCapability>>;

    /// Acquire a live video stream
    ///
    /// If the returned future is dropped before completion, any partially
    /// acquired hardware must be released by the backend.
    ///
    /// # Returns
    /// * `Ok(stream)` - Stream acquired, tracks running
    /// * `Err(BackendError::PermissionDenied)` - Access refused
    /// * `Err(BackendError::DeviceNotFound)` - Requested device absent
    async fn acquire_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> BackendResult<Box<dyn LiveStream>>;

    /// Backend identifier for logs
    fn name(&self) -> &'static str;
}

/// A live camera stream with one video track
#[async_trait]
pub trait LiveStream: Send {
    /// Settings of the active video track
    fn settings(&self) -> TrackSettings;

    /// Whether the tracks are still running
    fn is_active(&self) -> bool;

    /// Grab the current frame as RGBA
    async fn grab_frame(&mut self) -> BackendResult<CameraFrame>;

    /// Apply a torch constraint to the active track
    async fn apply_torch(&mut self, on: bool) -> BackendResult<()>;

    /// Attach a recorder to the stream
    fn start_recorder(&mut self, content_type: &str) -> BackendResult<RecorderHandle>;

    /// Stop every track and release the hardware
    ///
    /// Must be idempotent.
    fn stop_all_tracks(&mut self);
}

/// Control side of an attached recorder
#[async_trait]
pub trait RecorderControl: Send {
    /// Request finalization
    ///
    /// The chunk stream yields its remaining data and then ends.
    async fn stop(&mut self) -> BackendResult<()>;

    /// Stop immediately; unflushed data is dropped
    fn abort(&mut self);
}

/// A recorder attached to a live stream
///
/// Chunks arrive on `chunks` while recording; the stream ends after
/// [`RecorderControl::stop`] has flushed the final chunk.
pub struct RecorderHandle {
    pub content_type: String,
    pub chunks: BoxStream<'static, BackendResult<Bytes>>,
    pub control: Box<dyn RecorderControl>,
}

impl std::fmt::Debug for RecorderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecorderHandle")
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}
