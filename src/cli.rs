// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Ingesting files into a staged report
//! - Running a capture session and ingesting its output
//! - Inspecting the configuration

use field_capture::backends::camera::{CameraBackend, Facing};
use field_capture::backends::virtual_camera::VirtualCameraBackend;
use field_capture::capture::CaptureSession;
use field_capture::config::Config;
use field_capture::constants::bytes_to_size;
use field_capture::errors::AppResult;
use field_capture::media::{IncomingFile, MediaOrigin, ObjectUrlRegistry};
use field_capture::pipelines::ingest::{BatchOutcome, HalvingResizer, MediaIngestor};
use field_capture::report::{self, parse_report_images};
use field_capture::store::{self, PendingMediaStore, lock_store};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Options for the `capture` command
pub struct CaptureRequest {
    pub photos: usize,
    pub video_secs: Option<u64>,
    pub facing: Facing,
    pub torch: bool,
    pub source: Option<PathBuf>,
}

/// Load configuration from an explicit path or the default location
pub fn load_config(path: Option<&Path>) -> AppResult<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

fn virtual_backend(source: Option<PathBuf>) -> AppResult<VirtualCameraBackend> {
    Ok(match source {
        Some(path) => VirtualCameraBackend::with_source_image(&path)?,
        None => VirtualCameraBackend::new(),
    })
}

fn build_ingestor(config: &Config, registry: Arc<ObjectUrlRegistry>) -> MediaIngestor {
    MediaIngestor::new(
        store::shared(PendingMediaStore::new(config.constraints.clone())),
        config.resize.clone(),
        Arc::new(HalvingResizer::new()),
        registry,
    )
}

/// List all available cameras
pub fn list_cameras(source: Option<PathBuf>) -> CliResult {
    let backend = virtual_backend(source)?;
    let rt = tokio::runtime::Runtime::new()?;
    let cameras = rt.block_on(backend.enumerate_devices())?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras ({}):", backend.name());
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        println!("  [{}] {} ({})", index, camera.label, camera.device_id);
        let facing = camera
            .facing
            .map(|f| f.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        println!(
            "      Facing: {}, torch: {}, max {}x{}",
            facing,
            if camera.has_torch { "yes" } else { "no" },
            camera.width.max,
            camera.height.max
        );
        println!();
    }

    Ok(())
}

/// Ingest files from disk and print the staged report
pub fn ingest_files(
    config: &Config,
    paths: Vec<PathBuf>,
    dropped: bool,
    existing: Option<PathBuf>,
) -> CliResult {
    let origin = if dropped {
        MediaOrigin::Dropped
    } else {
        MediaOrigin::Picked
    };

    let registry = ObjectUrlRegistry::shared();
    let ingestor = build_ingestor(config, registry.clone());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Some(path) = existing {
            let text = tokio::fs::read_to_string(&path).await?;
            let images = parse_report_images(&text)?;
            let added = lock_store(ingestor.store()).preload(&images);
            println!("Loaded {} existing image(s) from {}", added, path.display());
        }

        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            files.push(IncomingFile::from_path(path, origin).await?);
        }

        let total = files.len();
        let outcome = ingestor
            .add_batch_with_progress(files, |p| {
                println!("Processing {}/{}", p.processed, p.total);
            })
            .await;

        match outcome {
            Ok(outcome) => print_outcome(&outcome),
            Err(e) => println!("Batch of {} file(s) rejected: {}", total, e),
        }
        print_store(&ingestor)?;
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    ingestor.remove_all();
    drop(ingestor);
    let stats = registry.stats();
    println!(
        "Previews: {} allocated, {} revoked",
        stats.allocated, stats.revoked
    );
    Ok(())
}

/// Run a virtual capture session and ingest its captures
pub fn capture(config: &Config, request: CaptureRequest) -> CliResult {
    let backend = virtual_backend(request.source)?;
    let mut settings = config.capture.clone();
    settings.default_facing = request.facing;

    let registry = ObjectUrlRegistry::shared();
    let ingestor = build_ingestor(config, registry.clone());

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        let mut session = CaptureSession::new(Arc::new(backend), settings, registry.clone());
        session.open().await?;

        if let Some(track) = session.track_settings() {
            println!(
                "Using camera: {} ({}x{}, facing {})",
                track.device_id,
                track.width,
                track.height,
                session.facing()
            );
        }

        if request.torch {
            let on = session.toggle_torch().await;
            println!("Torch: {}", if on { "on" } else { "unavailable" });
        }

        for _ in 0..request.photos {
            let index = session.take_photo().await?;
            let item = &session.captures()[index];
            println!("Captured photo {} ({})", index, bytes_to_size(item.size()));
        }

        if let Some(secs) = request.video_secs {
            session.start_recording()?;
            println!("Recording for {} second(s)...", secs);
            tokio::time::sleep(Duration::from_secs(secs)).await;
            let index = session.stop_recording().await?;
            let item = &session.captures()[index];
            println!("Captured video {} ({})", index, bytes_to_size(item.size()));
        }

        let outcome = session.done_into(&ingestor).await?;
        print_outcome(&outcome);
        print_store(&ingestor)?;
        Ok::<_, Box<dyn std::error::Error>>(())
    })?;

    Ok(())
}

/// Print the active configuration, optionally writing defaults first
pub fn show_config(config: &Config, path: Option<&Path>, write_defaults: bool) -> CliResult {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => Config::default_path()?,
    };

    if write_defaults {
        Config::default().save_to(&path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }

    println!("Configuration ({}):", path.display());
    println!("{}", serde_json::to_string_pretty(config)?);
    println!();
    println!(
        "Limits: {} files, {} total, {} per file",
        config.constraints.max_file_count,
        bytes_to_size(config.constraints.max_total_bytes),
        bytes_to_size(config.constraints.max_single_file_bytes)
    );
    Ok(())
}

fn print_outcome(outcome: &BatchOutcome) {
    for id in &outcome.admitted {
        println!("  + {}", id);
    }
    for reason in &outcome.rejected {
        println!("  - {}", reason);
    }
    for reason in &outcome.degraded {
        println!("  ~ {}", reason);
    }
}

fn print_store(ingestor: &MediaIngestor) -> Result<(), Box<dyn std::error::Error>> {
    let store = lock_store(ingestor.store());
    println!();
    println!("Pending media: {}", store.summary());
    for entry in store.entries() {
        println!(
            "  {} [{}] {}",
            entry.id(),
            entry.origin(),
            bytes_to_size(entry.size_bytes())
        );
    }

    let submission = report::finalize(&store);
    println!(
        "Ready to submit: {} upload(s), {} existing, {} removed",
        submission.upload_count(),
        submission.items.len() - submission.upload_count(),
        submission.removed.len()
    );
    println!("{}", serde_json::to_string_pretty(&store.report_images())?);
    Ok(())
}
