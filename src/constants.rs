// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// One mebibyte in bytes
pub const MIB: u64 = 1024 * 1024;

/// Batch admission limits
pub mod limits {
    use super::MIB;

    /// Maximum number of pending media entries for one report
    pub const MAX_FILE_COUNT: usize = 50;

    /// Maximum combined size of all pending media (200 MB)
    pub const MAX_TOTAL_BYTES: u64 = 200 * MIB;

    /// Maximum size of a single file (70 MB)
    pub const MAX_SINGLE_FILE_BYTES: u64 = 70 * MIB;

    /// Content types accepted from any entry point
    pub const ACCEPTED_TYPES: &[&str] = &[
        "image/jpeg",
        "image/jpg",
        "image/png",
        "video/mp4",
        "video/mpeg",
        "video/webm",
        "video/x-matroska",
        "video/quicktime",
        "application/pdf",
    ];
}

/// Client-side image resize parameters
pub mod resize {
    use super::MIB;

    /// Images larger than this are downscaled before admission (2 MB)
    pub const THRESHOLD_BYTES: u64 = 2 * MIB;

    /// Raster types the resizer can decode and re-encode
    pub const RESIZABLE_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png"];

    /// Each linear dimension is divided by this factor
    pub const SCALE_DIVISOR: u32 = 2;

    /// JPEG quality for resized images (0-100)
    pub const JPEG_QUALITY: u8 = 88;
}

/// Camera session parameters
pub mod capture {
    use super::Duration;

    /// Minimum requested stream width
    pub const MIN_WIDTH: u32 = 1280;
    /// Ideal requested stream width
    pub const IDEAL_WIDTH: u32 = 1980;
    /// Maximum requested stream width
    pub const MAX_WIDTH: u32 = 8192;

    /// Minimum requested stream height
    pub const MIN_HEIGHT: u32 = 720;
    /// Ideal requested stream height
    pub const IDEAL_HEIGHT: u32 = 1980;
    /// Maximum requested stream height
    pub const MAX_HEIGHT: u32 = 8192;

    /// JPEG quality for still captures (0-100)
    pub const STILL_JPEG_QUALITY: u8 = 90;

    /// Container type produced by the recorder
    pub const VIDEO_CONTENT_TYPE: &str = "video/mp4";

    /// Content type of still captures
    pub const STILL_CONTENT_TYPE: &str = "image/jpeg";

    /// Interval between recorder chunk flushes
    pub const RECORDER_TIMESLICE: Duration = Duration::from_millis(250);

    /// Timestamp format used in capture file names
    pub const FILENAME_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";
}

/// Size unit labels for [`bytes_to_size`]
const SIZE_UNITS: [&str; 9] = ["Bytes", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Format a byte count for display (e.g., "200 MB" or "1.5 KB")
///
/// Uses base 1024 and drops trailing zeros from the two-decimal value.
pub fn bytes_to_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let k = 1024f64;
    let value = bytes as f64;
    let exponent = ((value.ln() / k.ln()).floor() as usize).min(SIZE_UNITS.len() - 1);
    let scaled = value / k.powi(exponent as i32);
    let rounded = (scaled * 100.0).round() / 100.0;

    format!("{} {}", rounded, SIZE_UNITS[exponent])
}
