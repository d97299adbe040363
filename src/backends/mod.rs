// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for camera capture
//!
//! # Architecture
//!
//! The backend layer abstracts hardware access, providing a consistent API
//! regardless of the underlying platform:
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               CaptureSession                │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │  CameraBackend   │  │ Virtual Camera  │  │
//! │  │     (traits)     │◀─│   (synthetic)   │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Backend traits, device types and slot resolution
//! - [`virtual_camera`]: In-process camera with fault injection

pub mod camera;
pub mod virtual_camera;
