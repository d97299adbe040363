// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture session
//!
//! A [`CaptureSession`] owns one live stream at a time and walks this state
//! machine:
//!
//! ```text
//! Closed ──open──▶ Opening ──▶ Live ──take_photo──▶ CapturingStill ──▶ Live
//!   ▲                 │          │
//!   │                 │          ├──start_recording──▶ Recording ──stop──▶ Live
//!   │                 │          │
//!   └──── failure ────┘          └──switch_facing──▶ Opening ──▶ Live
//!   ▲
//!   └──── done / cancel / drop (from any state)
//! ```
//!
//! The stream's tracks are stopped on every path back to `Closed`, including
//! failures and drop. Captures accumulate in a [`CaptureRoll`] and are handed
//! off on [`CaptureSession::done`] or discarded on [`CaptureSession::cancel`].

mod recording;
pub mod roll;

pub use roll::{CaptureKind, CaptureRoll, CapturedItem};

use crate::backends::camera::{CameraBackend, CameraSlots, Facing, LiveStream, TrackSettings};
use crate::config::CaptureSettings;
use crate::constants::capture::VIDEO_CONTENT_TYPE;
use crate::errors::{CaptureError, IngestError};
use crate::media::{IncomingFile, PreviewRegistry};
use crate::pipelines::ingest::{BatchOutcome, MediaIngestor};
use crate::pipelines::photo::StillEncoder;
use recording::ActiveRecording;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Capture session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Opening,
    Live,
    /// Transient while a still is grabbed and encoded
    CapturingStill,
    Recording,
}

/// Requests the session to close from outside its owner
///
/// Aborts an acquisition in progress (open or facing switch). Any stream
/// acquired after the request is released immediately.
#[derive(Debug, Clone)]
pub struct SessionCloser {
    tx: Arc<watch::Sender<bool>>,
}

impl SessionCloser {
    pub fn close(&self) {
        self.tx.send_replace(true);
    }
}

pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    settings: CaptureSettings,
    encoder: StillEncoder,
    /// Resolved on first open, kept until the session closes
    slots: Option<CameraSlots>,
    facing: Facing,
    state: SessionState,
    stream: Option<Box<dyn LiveStream>>,
    has_torch: bool,
    torch_on: bool,
    recording: Option<ActiveRecording>,
    roll: CaptureRoll,
    close_tx: Arc<watch::Sender<bool>>,
}

impl CaptureSession {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        settings: CaptureSettings,
        previews: Arc<dyn PreviewRegistry>,
    ) -> Self {
        let (close_tx, _) = watch::channel(false);
        Self {
            backend,
            encoder: StillEncoder::new(settings.still_jpeg_quality),
            facing: settings.default_facing,
            settings,
            slots: None,
            state: SessionState::Closed,
            stream: None,
            has_torch: false,
            torch_on: false,
            recording: None,
            roll: CaptureRoll::new(previews),
            close_tx: Arc::new(close_tx),
        }
    }

    /// Current state
    ///
    /// `Opening` and `CapturingStill` only exist while the operation that set
    /// them holds the session mutably, so a cancelled operation is reported
    /// as the state it settles to.
    pub fn state(&self) -> SessionState {
        match self.state {
            SessionState::Opening | SessionState::CapturingStill if self.stream.is_none() => {
                SessionState::Closed
            }
            SessionState::CapturingStill => SessionState::Live,
            state => state,
        }
    }

    pub fn facing(&self) -> Facing {
        self.facing
    }

    /// Whether the active track supports a torch
    pub fn has_torch(&self) -> bool {
        self.has_torch
    }

    pub fn torch_on(&self) -> bool {
        self.torch_on
    }

    pub fn slots(&self) -> Option<&CameraSlots> {
        self.slots.as_ref()
    }

    pub fn track_settings(&self) -> Option<TrackSettings> {
        self.stream.as_ref().map(|s| s.settings())
    }

    pub fn captures(&self) -> &[CapturedItem] {
        self.roll.items()
    }

    pub fn recording_elapsed(&self) -> Option<Duration> {
        self.recording.as_ref().map(ActiveRecording::elapsed)
    }

    pub fn closer(&self) -> SessionCloser {
        SessionCloser {
            tx: Arc::clone(&self.close_tx),
        }
    }

    /// Open the camera with the default facing
    ///
    /// # Returns
    /// * `Ok(())` - Session is `Live` (or already open)
    /// * `Err(CaptureError::DeviceUnavailable)` - No camera granted access;
    ///   the session stays `Closed`
    /// * `Err(CaptureError::Aborted)` - Closed while opening
    pub async fn open(&mut self) -> Result<(), CaptureError> {
        self.recover_transient();
        if self.state != SessionState::Closed {
            debug!(state = ?self.state, "Session already open");
            return Ok(());
        }

        self.close_tx.send_replace(false);
        self.state = SessionState::Opening;
        self.facing = self.settings.default_facing;

        if self.slots.is_none() {
            self.slots = Some(self.resolve_slots().await);
        }

        match self.acquire().await {
            Ok(stream) => {
                self.attach(stream);
                info!(backend = self.backend.name(), facing = %self.facing, "Capture session live");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to open capture session");
                self.teardown();
                Err(e)
            }
        }
    }

    async fn resolve_slots(&self) -> CameraSlots {
        match self.backend.enumerate_devices().await {
            Ok(devices) => {
                info!(count = devices.len(), "Enumerated cameras");
                CameraSlots::resolve(&devices)
            }
            Err(e) => {
                warn!(error = %e, "Camera enumeration failed, requesting by facing only");
                CameraSlots::default()
            }
        }
    }

    /// Acquire a stream for the current facing, abortable by the closer
    async fn acquire(&self) -> Result<Box<dyn LiveStream>, CaptureError> {
        let slots = self.slots.clone().unwrap_or_default();
        let constraints = slots.constraints_for(self.facing, &self.settings);
        debug!(constraints = %constraints, "Acquiring camera stream");

        let mut close_rx = self.close_tx.subscribe();
        let close_requested = async move {
            loop {
                if *close_rx.borrow_and_update() {
                    return;
                }
                if close_rx.changed().await.is_err() {
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            result = self.backend.acquire_stream(&constraints) => {
                let mut stream = result
                    .map_err(|e| CaptureError::DeviceUnavailable(e.to_string()))?;
                if *self.close_tx.borrow() {
                    stream.stop_all_tracks();
                    info!("Session closed during acquisition, stream released");
                    return Err(CaptureError::Aborted);
                }
                Ok(stream)
            }
            _ = close_requested => {
                info!("Camera acquisition aborted");
                Err(CaptureError::Aborted)
            }
        }
    }

    fn attach(&mut self, stream: Box<dyn LiveStream>) {
        let settings = stream.settings();
        self.has_torch = settings.torch_supported;
        self.torch_on = false;
        self.stream = Some(stream);
        self.state = SessionState::Live;
        debug!(
            device = %settings.device_id,
            width = settings.width,
            height = settings.height,
            torch = settings.torch_supported,
            "Stream attached"
        );
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let device = stream.settings().device_id;
            stream.stop_all_tracks();
            info!(device = %device, "Camera released");
        }
        self.has_torch = false;
        self.torch_on = false;
    }

    /// Stop everything and return to `Closed`; the roll is untouched
    fn teardown(&mut self) {
        if self.recording.take().is_some() {
            warn!("Recording discarded on close");
        }
        self.release_stream();
        self.slots = None;
        self.state = SessionState::Closed;
    }

    /// Settle a state left behind by a cancelled operation
    ///
    /// An interrupted still leaves the stream live. An interrupted open or
    /// switch never attached a stream, so the session is closed.
    fn recover_transient(&mut self) {
        match self.state {
            SessionState::CapturingStill => {
                self.state = if self.stream.is_some() {
                    SessionState::Live
                } else {
                    SessionState::Closed
                };
            }
            SessionState::Opening if self.stream.is_none() => {
                debug!("Acquisition was cancelled, closing session");
                self.teardown();
            }
            _ => {}
        }
    }

    /// Switch to the other camera slot
    ///
    /// The current stream is fully released before the new one is requested.
    /// Captures are kept. On failure the session closes.
    pub async fn switch_facing(&mut self) -> Result<(), CaptureError> {
        self.recover_transient();
        match self.state {
            SessionState::Live => {}
            SessionState::Recording => return Err(CaptureError::RecordingInProgress),
            _ => return Err(CaptureError::NotLive),
        }

        self.release_stream();
        self.state = SessionState::Opening;
        self.facing = self.facing.opposite();

        match self.acquire().await {
            Ok(stream) => {
                self.attach(stream);
                info!(facing = %self.facing, "Switched camera");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, facing = %self.facing, "Failed to switch camera");
                self.teardown();
                Err(e)
            }
        }
    }

    /// Toggle the torch on the active track
    ///
    /// Never fails: if the constraint is rejected the previous state is
    /// restored. Returns the resulting torch state.
    pub async fn toggle_torch(&mut self) -> bool {
        self.recover_transient();
        if !self.has_torch {
            debug!("Torch not available on active camera");
            return false;
        }
        let Some(stream) = self.stream.as_mut() else {
            return false;
        };

        let target = !self.torch_on;
        self.torch_on = target;
        if let Err(e) = stream.apply_torch(target).await {
            warn!(error = %e, target, "Torch constraint failed, reverting");
            self.torch_on = !target;
        } else {
            info!(on = target, "Torch toggled");
        }
        self.torch_on
    }

    /// Grab a still and append it to the roll
    ///
    /// Returns the index of the new capture.
    pub async fn take_photo(&mut self) -> Result<usize, CaptureError> {
        self.recover_transient();
        match self.state {
            SessionState::Live => {}
            SessionState::Recording => return Err(CaptureError::RecordingInProgress),
            _ => return Err(CaptureError::NotLive),
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::NotLive);
        };

        self.state = SessionState::CapturingStill;
        let grabbed = stream.grab_frame().await;
        let stream_lost = !stream.is_active();

        let frame = match grabbed {
            Ok(frame) => frame,
            Err(e) => {
                if stream_lost {
                    error!(error = %e, "Stream lost while capturing");
                    self.teardown();
                } else {
                    self.state = SessionState::Live;
                }
                return Err(CaptureError::DeviceUnavailable(e.to_string()));
            }
        };

        let encoded = self.encoder.encode(frame).await;
        self.state = SessionState::Live;
        let still = encoded?;

        let index = self.roll.push(CaptureKind::Photo, still.data, still.content_type);
        info!(index, width = still.width, height = still.height, "Photo captured");
        Ok(index)
    }

    /// Attach a recorder to the live stream
    ///
    /// Failures leave the session in its current state.
    pub fn start_recording(&mut self) -> Result<(), CaptureError> {
        self.recover_transient();
        if self.state == SessionState::Recording {
            return Err(CaptureError::RecordingInProgress);
        }
        let Some(stream) = self.stream.as_mut() else {
            warn!(state = ?self.state, "No stream available, can't start recording");
            return Err(CaptureError::RecordingFailed(
                "No stream available, can't start recording".to_string(),
            ));
        };

        let handle = stream.start_recorder(VIDEO_CONTENT_TYPE).map_err(|e| {
            warn!(error = %e, "Could not start recording");
            CaptureError::RecordingFailed(e.to_string())
        })?;

        let recording = ActiveRecording::start(handle).map_err(|e| {
            warn!(error = %e, "Could not start recording");
            e
        })?;
        self.recording = Some(recording);
        self.state = SessionState::Recording;
        info!("Recording started");
        Ok(())
    }

    /// Finalize the recording into one video capture
    ///
    /// The session returns to `Live` whether or not finalization succeeds.
    pub async fn stop_recording(&mut self) -> Result<usize, CaptureError> {
        let Some(recording) = self.recording.take() else {
            return Err(CaptureError::NotRecording);
        };
        self.state = SessionState::Live;

        let content_type = recording.content_type().to_string();
        let duration = recording.elapsed();
        let data = recording.finish().await.map_err(|e| {
            warn!(error = %e, "Recording failed");
            e
        })?;

        let size = data.len();
        let index = self.roll.push(CaptureKind::Video, data, &content_type);
        info!(index, size, duration_ms = duration.as_millis() as u64, "Recording saved");
        Ok(index)
    }

    /// Delete a capture from the roll
    pub fn remove_capture(&mut self, index: usize) -> bool {
        self.roll.remove(index)
    }

    /// Close the session and hand over the captures
    ///
    /// An unfinished recording is discarded.
    pub fn done(&mut self) -> Vec<IncomingFile> {
        self.teardown();
        let files = self.roll.take_files();
        info!(count = files.len(), "Capture session done");
        files
    }

    /// Close the session and pass the captures to an ingestor
    pub async fn done_into(&mut self, ingestor: &MediaIngestor) -> Result<BatchOutcome, IngestError> {
        let files = self.done();
        ingestor.add_batch(files).await
    }

    /// Close the session and discard the captures
    pub fn cancel(&mut self) {
        self.close_tx.send_replace(true);
        self.teardown();
        let discarded = self.roll.len();
        self.roll.clear();
        info!(discarded, "Capture session cancelled");
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.recording = None;
        self.release_stream();
    }
}

impl std::fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureSession")
            .field("backend", &self.backend.name())
            .field("state", &self.state)
            .field("facing", &self.facing)
            .field("torch_on", &self.torch_on)
            .field("captures", &self.roll.len())
            .finish_non_exhaustive()
    }
}
