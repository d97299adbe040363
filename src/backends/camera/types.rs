// SPDX-License-Identifier: GPL-3.0-only
// Shared types for camera backend abstraction

//! Shared types for camera backends

use crate::config::ResolutionRange;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Direction a camera points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    /// Front camera (selfie)
    User,
    /// Back camera
    #[default]
    Environment,
}

impl Facing {
    /// The other facing
    pub fn opposite(self) -> Self {
        match self {
            Facing::User => Facing::Environment,
            Facing::Environment => Facing::User,
        }
    }
}

impl std::fmt::Display for Facing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facing::User => write!(f, "user"),
            Facing::Environment => write!(f, "environment"),
        }
    }
}

impl std::str::FromStr for Facing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" | "front" => Ok(Facing::User),
            "environment" | "back" => Ok(Facing::Environment),
            other => Err(format!("unknown facing '{other}'")),
        }
    }
}

/// Capabilities of one physical camera
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraCapability {
    pub device_id: String,
    /// Human readable label (may be empty before permission is granted)
    pub label: String,
    /// Reported facing, if the platform knows it
    pub facing: Option<Facing>,
    pub has_torch: bool,
    pub width: ResolutionRange,
    pub height: ResolutionRange,
}

/// Constraints passed to stream acquisition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: Facing,
    /// Exact device to open; `None` lets the platform pick by facing
    pub device_id: Option<String>,
    pub width: ResolutionRange,
    pub height: ResolutionRange,
}

impl StreamConstraints {
    pub fn ideal_width(&self) -> u32 {
        self.width.ideal
    }

    pub fn ideal_height(&self) -> u32 {
        self.height.ideal
    }
}

impl std::fmt::Display for StreamConstraints {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}x{}",
            self.facing,
            self.ideal_width(),
            self.ideal_height()
        )?;
        if let Some(id) = &self.device_id {
            write!(f, " [{}]", id)?;
        }
        Ok(())
    }
}

/// Settings reported by the active video track
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSettings {
    pub device_id: String,
    pub facing: Facing,
    pub width: u32,
    pub height: u32,
    pub torch_supported: bool,
}

/// A single still frame grabbed from a live stream
///
/// Pixel data is packed RGBA, 4 bytes per pixel, no row padding.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Bytes,
    /// When the frame was grabbed
    pub captured_at: Instant,
}

impl CameraFrame {
    /// Expected length of `data` for the frame dimensions
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}
