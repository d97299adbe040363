// SPDX-License-Identifier: GPL-3.0-only

//! Virtual camera backend
//!
//! An in-process camera that produces synthetic frames (or frames scaled from
//! a still image) and synthetic recordings. It keeps a ledger of every stream
//! it hands out so callers can check that hardware locks are released, and it
//! can be told to fail in the ways a real device does.
//!
//! # Architecture
//!
//! ```text
//! VirtualCameraBackend ──acquire──▶ VirtualStream ──start_recorder──▶ chunk stream
//!          │                              │
//!          └──────── LockLedger ◀─────────┘  (acquired / released / leaked)
//! ```

use crate::backends::camera::{
    CameraBackend, CameraCapability, CameraFrame, Facing, LiveStream, RecorderControl,
    RecorderHandle, StreamConstraints, TrackSettings,
};
use crate::config::ResolutionRange;
use crate::constants::capture::RECORDER_TIMESLICE;
use crate::errors::{BackendError, BackendResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use image::{Rgba, RgbaImage, imageops::FilterType};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Leading bytes of every synthetic recording
const RECORDING_HEADER: &[u8] = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00mp42isom";

/// Failures the virtual device should simulate
#[derive(Debug, Clone, Default)]
pub struct FaultPlan {
    /// Refuse every acquisition
    pub deny_access: bool,
    /// Delay before an acquisition completes
    pub acquire_delay: Option<Duration>,
    /// Reject torch constraints
    pub fail_torch: bool,
    /// Refuse to attach recorders
    pub fail_recorder_start: bool,
    /// Fail recorder finalization
    pub fail_recorder_stop: bool,
}

/// Hardware lock events, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockEvent {
    Acquired(String),
    Released(String),
}

#[derive(Debug, Default)]
struct LockLedger {
    events: Vec<LockEvent>,
    open: usize,
    leaked: usize,
    /// End flags of streams still holding hardware
    live: Vec<Arc<StreamFlags>>,
}

#[derive(Debug, Default)]
struct StreamFlags {
    /// Tracks stopped by the owner
    stopped: AtomicBool,
    /// Stream lost underneath the owner
    ended: AtomicBool,
}

struct Shared {
    devices: Vec<CameraCapability>,
    faults: Mutex<FaultPlan>,
    ledger: Mutex<LockLedger>,
    source: Option<RgbaImage>,
}

impl Shared {
    fn ledger(&self) -> MutexGuard<'_, LockLedger> {
        self.ledger.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn faults(&self) -> FaultPlan {
        self.faults.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

/// Synthetic camera backend
#[derive(Clone)]
pub struct VirtualCameraBackend {
    shared: Arc<Shared>,
}

impl VirtualCameraBackend {
    /// Back camera with torch plus a front camera without
    pub fn new() -> Self {
        Self::with_devices(default_devices())
    }

    /// Use a custom device list
    pub fn with_devices(devices: Vec<CameraCapability>) -> Self {
        Self {
            shared: Arc::new(Shared {
                devices,
                faults: Mutex::new(FaultPlan::default()),
                ledger: Mutex::new(LockLedger::default()),
                source: None,
            }),
        }
    }

    /// Serve frames scaled from an image file instead of a test pattern
    pub fn with_source_image(path: &Path) -> BackendResult<Self> {
        let image = image::open(path)
            .map_err(|e| BackendError::Other(format!("Failed to load {}: {}", path.display(), e)))?
            .to_rgba8();
        info!(path = %path.display(), width = image.width(), height = image.height(), "Loaded virtual camera source");

        Ok(Self {
            shared: Arc::new(Shared {
                devices: default_devices(),
                faults: Mutex::new(FaultPlan::default()),
                ledger: Mutex::new(LockLedger::default()),
                source: Some(image),
            }),
        })
    }

    /// Replace the simulated failure plan
    pub fn set_faults(&self, faults: FaultPlan) {
        *self.shared.faults.lock().unwrap_or_else(|e| e.into_inner()) = faults;
    }

    /// Every lock event so far, in order
    pub fn events(&self) -> Vec<LockEvent> {
        self.shared.ledger().events.clone()
    }

    /// Streams currently holding hardware
    pub fn open_streams(&self) -> usize {
        self.shared.ledger().open
    }

    /// Streams dropped without their tracks being stopped
    pub fn leaked_streams(&self) -> usize {
        self.shared.ledger().leaked
    }

    /// Simulate the platform ending every live stream
    pub fn interrupt_all(&self) {
        let ledger = self.shared.ledger();
        for flags in &ledger.live {
            flags.ended.store(true, Ordering::SeqCst);
        }
        warn!(streams = ledger.live.len(), "Virtual camera streams interrupted");
    }
}

impl Default for VirtualCameraBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn default_devices() -> Vec<CameraCapability> {
    let width = ResolutionRange {
        min: 320,
        ideal: 640,
        max: 640,
    };
    let height = ResolutionRange {
        min: 240,
        ideal: 480,
        max: 480,
    };
    vec![
        CameraCapability {
            device_id: "virtual-back".to_string(),
            label: "Virtual Back Camera".to_string(),
            facing: Some(Facing::Environment),
            has_torch: true,
            width,
            height,
        },
        CameraCapability {
            device_id: "virtual-front".to_string(),
            label: "Virtual Front Camera".to_string(),
            facing: Some(Facing::User),
            has_torch: false,
            width,
            height,
        },
    ]
}

#[async_trait]
impl CameraBackend for VirtualCameraBackend {
    async fn enumerate_devices(&self) -> BackendResult<Vec<CameraCapability>> {
        Ok(self.shared.devices.clone())
    }

    async fn acquire_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> BackendResult<Box<dyn LiveStream>> {
        let faults = self.shared.faults();

        if let Some(delay) = faults.acquire_delay {
            tokio::time::sleep(delay).await;
        }

        if faults.deny_access {
            return Err(BackendError::PermissionDenied(
                "virtual camera access denied".to_string(),
            ));
        }

        let device = match &constraints.device_id {
            Some(id) => self
                .shared
                .devices
                .iter()
                .find(|d| &d.device_id == id)
                .ok_or_else(|| BackendError::DeviceNotFound(id.clone()))?,
            None => self
                .shared
                .devices
                .iter()
                .find(|d| d.facing == Some(constraints.facing))
                .or_else(|| self.shared.devices.first())
                .ok_or_else(|| BackendError::DeviceNotFound("no virtual devices".to_string()))?,
        }
        .clone();

        let settings = TrackSettings {
            device_id: device.device_id.clone(),
            facing: device.facing.unwrap_or(constraints.facing),
            width: device.width.clamp(constraints.ideal_width()),
            height: device.height.clamp(constraints.ideal_height()),
            torch_supported: device.has_torch,
        };

        let flags = Arc::new(StreamFlags::default());
        {
            let mut ledger = self.shared.ledger();
            ledger.events.push(LockEvent::Acquired(device.device_id.clone()));
            ledger.open += 1;
            ledger.live.push(Arc::clone(&flags));
        }

        info!(device = %device.device_id, width = settings.width, height = settings.height, "Virtual stream acquired");

        Ok(Box::new(VirtualStream {
            shared: Arc::clone(&self.shared),
            settings,
            flags,
            torch: false,
            sequence: 0,
        }))
    }

    fn name(&self) -> &'static str {
        "virtual"
    }
}

/// Stream handed out by [`VirtualCameraBackend`]
struct VirtualStream {
    shared: Arc<Shared>,
    settings: TrackSettings,
    flags: Arc<StreamFlags>,
    torch: bool,
    sequence: u32,
}

impl VirtualStream {
    fn check_running(&self) -> BackendResult<()> {
        if self.flags.stopped.load(Ordering::SeqCst) || self.flags.ended.load(Ordering::SeqCst) {
            Err(BackendError::StreamEnded)
        } else {
            Ok(())
        }
    }

    fn render(&self) -> RgbaImage {
        let (width, height) = (self.settings.width, self.settings.height);
        match &self.shared.source {
            Some(source) => image::imageops::resize(source, width, height, FilterType::Triangle),
            None => {
                let shift = self.sequence.wrapping_mul(16) as u8;
                let torch_boost = if self.torch { 64 } else { 0 };
                RgbaImage::from_fn(width, height, |x, y| {
                    let r = (x * 255 / width.max(1)) as u8;
                    let g = (y * 255 / height.max(1)) as u8;
                    Rgba([r.saturating_add(torch_boost), g, shift, 255])
                })
            }
        }
    }
}

#[async_trait]
impl LiveStream for VirtualStream {
    fn settings(&self) -> TrackSettings {
        self.settings.clone()
    }

    fn is_active(&self) -> bool {
        self.check_running().is_ok()
    }

    async fn grab_frame(&mut self) -> BackendResult<CameraFrame> {
        self.check_running()?;
        self.sequence = self.sequence.wrapping_add(1);
        let image = self.render();
        Ok(CameraFrame {
            width: image.width(),
            height: image.height(),
            data: Bytes::from(image.into_raw()),
            captured_at: Instant::now(),
        })
    }

    async fn apply_torch(&mut self, on: bool) -> BackendResult<()> {
        self.check_running()?;
        if !self.settings.torch_supported {
            return Err(BackendError::ConstraintRejected(
                "torch not supported".to_string(),
            ));
        }
        if self.shared.faults().fail_torch {
            return Err(BackendError::ConstraintRejected(
                "torch constraint failed".to_string(),
            ));
        }
        self.torch = on;
        debug!(device = %self.settings.device_id, on, "Virtual torch applied");
        Ok(())
    }

    fn start_recorder(&mut self, content_type: &str) -> BackendResult<RecorderHandle> {
        self.check_running()?;
        let faults = self.shared.faults();
        if faults.fail_recorder_start {
            return Err(BackendError::Recorder(
                "recorder could not be attached".to_string(),
            ));
        }

        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let flags = Arc::clone(&self.flags);

        let chunks = async_stream::stream! {
            let mut ticker = tokio::time::interval(RECORDER_TIMESLICE);
            ticker.tick().await;
            yield Ok(Bytes::from_static(RECORDING_HEADER));

            let mut sequence: u32 = 0;
            loop {
                let stopping = tokio::select! {
                    _ = &mut stop_rx => true,
                    _ = ticker.tick() => false,
                };
                if flags.ended.load(Ordering::SeqCst) {
                    yield Err(BackendError::StreamEnded);
                    break;
                }
                sequence += 1;
                yield Ok(synthetic_chunk(sequence));
                if stopping {
                    break;
                }
            }
        };

        debug!(device = %self.settings.device_id, content_type, "Virtual recorder attached");

        Ok(RecorderHandle {
            content_type: content_type.to_string(),
            chunks: chunks.boxed(),
            control: Box::new(VirtualRecorderControl {
                stop_tx: Some(stop_tx),
                fail_stop: faults.fail_recorder_stop,
            }),
        })
    }

    fn stop_all_tracks(&mut self) {
        if self.flags.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut ledger = self.shared.ledger();
        ledger
            .events
            .push(LockEvent::Released(self.settings.device_id.clone()));
        ledger.open = ledger.open.saturating_sub(1);
        ledger.live.retain(|f| !Arc::ptr_eq(f, &self.flags));
        info!(device = %self.settings.device_id, "Virtual stream released");
    }
}

impl Drop for VirtualStream {
    fn drop(&mut self) {
        if !self.flags.stopped.load(Ordering::SeqCst) {
            let mut ledger = self.shared.ledger();
            ledger.leaked += 1;
            warn!(device = %self.settings.device_id, "Virtual stream dropped without stopping tracks");
        }
    }
}

fn synthetic_chunk(sequence: u32) -> Bytes {
    let mut chunk = Vec::with_capacity(64);
    chunk.extend_from_slice(b"moof");
    chunk.extend_from_slice(&sequence.to_be_bytes());
    chunk.resize(64, (sequence % 251) as u8);
    Bytes::from(chunk)
}

struct VirtualRecorderControl {
    stop_tx: Option<oneshot::Sender<()>>,
    fail_stop: bool,
}

#[async_trait]
impl RecorderControl for VirtualRecorderControl {
    async fn stop(&mut self) -> BackendResult<()> {
        let tx = self
            .stop_tx
            .take()
            .ok_or_else(|| BackendError::Recorder("recorder already stopped".to_string()))?;
        if self.fail_stop {
            drop(tx);
            return Err(BackendError::Recorder(
                "recorder failed to finalize".to_string(),
            ));
        }
        let _ = tx.send(());
        Ok(())
    }

    fn abort(&mut self) {
        self.stop_tx = None;
    }
}
