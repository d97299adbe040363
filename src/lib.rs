// SPDX-License-Identifier: GPL-3.0-only

//! Field Capture - media capture and ingestion for field reports
//!
//! This library owns the client-side media path of a report: a live camera
//! session producing stills and recordings, and an ingest pipeline that
//! validates, resizes and stages files for submission.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera backend abstraction and the virtual camera
//! - [`capture`]: Capture session state machine and capture roll
//! - [`pipelines`]: Still encoding and the ingest pipeline
//! - [`media`]: Media entries, identities and preview handles
//! - [`store`]: Pending media store with limits and change publication
//! - [`report`]: Boundary with the report being composed
//! - [`config`]: User configuration handling
//!
//! # Example
//!
//! ```ignore
//! let registry = ObjectUrlRegistry::shared();
//! let store = store::shared(PendingMediaStore::new(config.constraints.clone()));
//! let ingestor = MediaIngestor::new(store, config.resize.clone(), Arc::new(HalvingResizer), registry.clone());
//!
//! let mut session = CaptureSession::new(Arc::new(VirtualCameraBackend::new()), config.capture.clone(), registry);
//! session.open().await?;
//! session.take_photo().await?;
//! let outcome = session.done_into(&ingestor).await?;
//! ```

pub mod backends;
pub mod capture;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod report;
pub mod store;

// Re-export commonly used types
pub use capture::{CaptureSession, SessionState};
pub use config::Config;
pub use errors::{AppError, AppResult, CaptureError, IngestError};
pub use media::{EntryId, IncomingFile, MediaEntry, MediaOrigin};
pub use pipelines::ingest::{BatchOutcome, MediaIngestor};
pub use store::PendingMediaStore;
