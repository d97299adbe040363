// SPDX-License-Identifier: GPL-3.0-only

//! Active recording state
//!
//! Chunks flushed by the recorder are collected on a background task. Stopping
//! waits for the final flush and joins the chunks into one file; dropping a
//! recording without finishing it aborts the recorder and discards whatever
//! was buffered.

use crate::backends::camera::{RecorderControl, RecorderHandle};
use crate::errors::{BackendError, BackendResult, CaptureError};
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A recorder attached to the live stream
pub(crate) struct ActiveRecording {
    started_at: Instant,
    content_type: String,
    control: Box<dyn RecorderControl>,
    collector: JoinHandle<BackendResult<Vec<Bytes>>>,
    finished: bool,
}

impl ActiveRecording {
    /// Start collecting chunks from a recorder
    ///
    /// The collector needs a tokio runtime; without one the recorder is
    /// aborted and `RecordingFailed` is returned.
    pub(crate) fn start(handle: RecorderHandle) -> Result<Self, CaptureError> {
        let RecorderHandle {
            content_type,
            mut chunks,
            mut control,
        } = handle;

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                control.abort();
                return Err(CaptureError::RecordingFailed(format!(
                    "No async runtime to collect recording: {}",
                    e
                )));
            }
        };

        let collector = runtime.spawn(async move {
            let mut collected = Vec::new();
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk?;
                if !chunk.is_empty() {
                    collected.push(chunk);
                }
            }
            Ok::<_, BackendError>(collected)
        });

        Ok(Self {
            started_at: Instant::now(),
            content_type,
            control,
            collector,
            finished: false,
        })
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub(crate) fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Stop the recorder and assemble the recording
    pub(crate) async fn finish(mut self) -> Result<Bytes, CaptureError> {
        if let Err(e) = self.control.stop().await {
            return Err(CaptureError::RecordingFailed(e.to_string()));
        }
        self.finished = true;

        let chunks = (&mut self.collector)
            .await
            .map_err(|e| CaptureError::RecordingFailed(format!("Recorder task error: {}", e)))?
            .map_err(|e| CaptureError::RecordingFailed(e.to_string()))?;

        if chunks.is_empty() {
            return Err(CaptureError::RecordingFailed(
                "recorder produced no data".to_string(),
            ));
        }

        let mut data = BytesMut::with_capacity(chunks.iter().map(Bytes::len).sum());
        for chunk in &chunks {
            data.extend_from_slice(chunk);
        }

        debug!(
            chunks = chunks.len(),
            size = data.len(),
            duration_ms = self.elapsed().as_millis() as u64,
            "Recording assembled"
        );
        Ok(data.freeze())
    }
}

impl Drop for ActiveRecording {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                duration_ms = self.elapsed().as_millis() as u64,
                "Recording discarded"
            );
            self.control.abort();
        }
        self.collector.abort();
    }
}
