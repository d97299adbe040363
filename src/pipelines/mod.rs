// SPDX-License-Identifier: GPL-3.0-only

//! Processing pipelines for captured and ingested media
//!
//! Heavy work runs on the blocking pool so neither the live stream nor
//! other batches stall while it happens.
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Camera Frame │ ──▶ │  Photo Pipeline   │ ──▶ │  JPEG still  │
//! │   (RGBA)     │     │  - RGBA→RGB       │     │              │
//! │              │     │  - JPEG encoding  │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//!
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ File batch   │ ──▶ │  Ingest Pipeline  │ ──▶ │ Pending store│
//! │ (pick/drop/  │     │  - Limits & types │     │  (in order)  │
//! │  capture)    │     │  - Resize         │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`photo`]: Still encoding for captured frames
//! - [`ingest`]: Batch validation, resizing and ordered admission

pub mod ingest;
pub mod photo;
