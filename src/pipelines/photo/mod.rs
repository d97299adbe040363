// SPDX-License-Identifier: GPL-3.0-only

//! Still photo pipeline
//!
//! ```text
//! LiveStream::grab_frame → StillEncoder (blocking pool) → CaptureRoll
//!       ↓
//! Stream keeps running
//! ```

pub mod encoding;

pub use encoding::{EncodedStill, StillEncoder};
