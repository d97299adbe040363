// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the capture session against the virtual camera

use field_capture::backends::camera::Facing;
use field_capture::backends::virtual_camera::{FaultPlan, LockEvent, VirtualCameraBackend};
use field_capture::capture::{CaptureKind, CaptureSession, SessionState};
use field_capture::config::{BatchConstraints, CaptureSettings, ResizeSettings};
use field_capture::errors::CaptureError;
use field_capture::media::{MediaOrigin, ObjectUrlRegistry};
use field_capture::pipelines::ingest::{HalvingResizer, MediaIngestor};
use field_capture::store::{self, PendingMediaStore, lock_store};
use std::sync::Arc;
use std::time::Duration;

fn session(backend: &VirtualCameraBackend) -> (CaptureSession, Arc<ObjectUrlRegistry>) {
    let registry = ObjectUrlRegistry::shared();
    let session = CaptureSession::new(
        Arc::new(backend.clone()),
        CaptureSettings::default(),
        registry.clone(),
    );
    (session, registry)
}

fn acquired(id: &str) -> LockEvent {
    LockEvent::Acquired(id.to_string())
}

fn released(id: &str) -> LockEvent {
    LockEvent::Released(id.to_string())
}

#[tokio::test]
async fn test_open_reads_torch_from_back_camera() {
    let backend = VirtualCameraBackend::new();
    let (mut session, _) = session(&backend);

    session.open().await.unwrap();

    assert_eq!(session.state(), SessionState::Live);
    assert_eq!(session.facing(), Facing::Environment);
    assert!(session.has_torch());
    let slots = session.slots().unwrap();
    assert_eq!(slots.front.as_ref().unwrap().device_id, "virtual-front");
    assert_eq!(backend.events(), vec![acquired("virtual-back")]);
}

#[tokio::test]
async fn test_switch_releases_before_acquiring() {
    let backend = VirtualCameraBackend::new();
    let (mut session, _) = session(&backend);
    session.open().await.unwrap();
    session.take_photo().await.unwrap();

    session.switch_facing().await.unwrap();

    assert_eq!(session.facing(), Facing::User);
    assert!(!session.has_torch());
    assert_eq!(session.captures().len(), 1, "captures survive a switch");
    assert_eq!(
        backend.events(),
        vec![
            acquired("virtual-back"),
            released("virtual-back"),
            acquired("virtual-front"),
        ]
    );
    assert_eq!(backend.open_streams(), 1);
}

#[tokio::test]
async fn test_recording_without_stream_fails_softly() {
    let backend = VirtualCameraBackend::new();
    let (mut session, _) = session(&backend);

    let result = session.start_recording();

    assert!(matches!(result, Err(CaptureError::RecordingFailed(_))));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(backend.events().is_empty());
}

#[tokio::test]
async fn test_record_and_stop_produces_video() {
    let backend = VirtualCameraBackend::new();
    let (mut session, _) = session(&backend);
    session.open().await.unwrap();

    session.start_recording().unwrap();
    assert_eq!(session.state(), SessionState::Recording);
    assert!(matches!(
        session.switch_facing().await,
        Err(CaptureError::RecordingInProgress)
    ));
    tokio::time::sleep(Duration::from_millis(300)).await;

    let index = session.stop_recording().await.unwrap();

    assert_eq!(session.state(), SessionState::Live);
    let video = &session.captures()[index];
    assert_eq!(video.kind, CaptureKind::Video);
    assert_eq!(video.content_type, "video/mp4");
    assert_eq!(&video.data[4..8], b"ftyp");
    assert!(matches!(
        session.stop_recording().await,
        Err(CaptureError::NotRecording)
    ));
}

#[tokio::test]
async fn test_recorder_failures_keep_session_live() {
    let backend = VirtualCameraBackend::new();
    let (mut session, _) = session(&backend);
    session.open().await.unwrap();

    backend.set_faults(FaultPlan {
        fail_recorder_start: true,
        ..FaultPlan::default()
    });
    assert!(matches!(
        session.start_recording(),
        Err(CaptureError::RecordingFailed(_))
    ));
    assert_eq!(session.state(), SessionState::Live);

    backend.set_faults(FaultPlan {
        fail_recorder_stop: true,
        ..FaultPlan::default()
    });
    session.start_recording().unwrap();
    assert!(matches!(
        session.stop_recording().await,
        Err(CaptureError::RecordingFailed(_))
    ));
    assert_eq!(session.state(), SessionState::Live);
    assert!(session.captures().is_empty());

    // The stream is still usable
    session.take_photo().await.unwrap();
    assert_eq!(backend.open_streams(), 1);
}

#[tokio::test]
async fn test_torch_failure_reverts_without_error() {
    let backend = VirtualCameraBackend::new();
    let (mut session, _) = session(&backend);
    session.open().await.unwrap();

    assert!(session.toggle_torch().await);
    assert!(session.torch_on());

    backend.set_faults(FaultPlan {
        fail_torch: true,
        ..FaultPlan::default()
    });
    assert!(session.toggle_torch().await, "failed toggle keeps torch on");
    assert!(session.torch_on());

    backend.set_faults(FaultPlan::default());
    session.switch_facing().await.unwrap();
    assert!(!session.torch_on());
    assert!(!session.toggle_torch().await, "front camera has no torch");
}

#[tokio::test]
async fn test_denied_access_leaves_session_closed() {
    let backend = VirtualCameraBackend::new();
    backend.set_faults(FaultPlan {
        deny_access: true,
        ..FaultPlan::default()
    });
    let (mut session, _) = session(&backend);

    let result = session.open().await;

    assert!(matches!(result, Err(CaptureError::DeviceUnavailable(_))));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(backend.open_streams(), 0);

    // Retry after the user grants access
    backend.set_faults(FaultPlan::default());
    session.open().await.unwrap();
    assert_eq!(session.state(), SessionState::Live);
}

#[tokio::test]
async fn test_close_while_opening_aborts_acquisition() {
    let backend = VirtualCameraBackend::new();
    backend.set_faults(FaultPlan {
        acquire_delay: Some(Duration::from_millis(200)),
        ..FaultPlan::default()
    });
    let (mut session, _) = session(&backend);

    let closer = session.closer();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        closer.close();
    });

    let result = session.open().await;

    assert_eq!(result, Err(CaptureError::Aborted));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(backend.open_streams(), 0);
    assert_eq!(backend.leaked_streams(), 0);
}

#[tokio::test]
async fn test_cancel_while_recording_discards_everything() {
    let backend = VirtualCameraBackend::new();
    let (mut session, registry) = session(&backend);
    session.open().await.unwrap();
    session.take_photo().await.unwrap();
    session.start_recording().unwrap();

    session.cancel();

    assert_eq!(session.state(), SessionState::Closed);
    assert!(session.captures().is_empty());
    assert_eq!(backend.open_streams(), 0);
    assert_eq!(backend.leaked_streams(), 0);
    assert!(registry.stats().is_balanced());
}

#[tokio::test]
async fn test_lost_stream_closes_session() {
    let backend = VirtualCameraBackend::new();
    let (mut session, _) = session(&backend);
    session.open().await.unwrap();

    backend.interrupt_all();
    let result = session.take_photo().await;

    assert!(matches!(result, Err(CaptureError::DeviceUnavailable(_))));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(backend.open_streams(), 0);
}

#[tokio::test]
async fn test_drop_releases_hardware() {
    let backend = VirtualCameraBackend::new();
    let (mut session, _) = session(&backend);
    session.open().await.unwrap();
    session.start_recording().unwrap();

    drop(session);

    assert_eq!(backend.open_streams(), 0);
    assert_eq!(backend.leaked_streams(), 0);
}

#[tokio::test]
async fn test_reopen_resets_facing() {
    let backend = VirtualCameraBackend::new();
    let (mut session, _) = session(&backend);
    session.open().await.unwrap();
    session.switch_facing().await.unwrap();
    assert_eq!(session.facing(), Facing::User);

    let files = session.done();
    assert!(files.is_empty());
    session.open().await.unwrap();

    assert_eq!(session.facing(), Facing::Environment);
}

#[tokio::test]
async fn test_done_hands_captures_to_ingestor() {
    let backend = VirtualCameraBackend::new();
    let (mut session, registry) = session(&backend);
    let ingestor = MediaIngestor::new(
        store::shared(PendingMediaStore::new(BatchConstraints::default())),
        ResizeSettings::default(),
        Arc::new(HalvingResizer::new()),
        registry.clone(),
    );

    session.open().await.unwrap();
    session.take_photo().await.unwrap();
    session.take_photo().await.unwrap();
    session.take_photo().await.unwrap();
    assert!(session.remove_capture(1));

    let outcome = session.done_into(&ingestor).await.unwrap();

    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(backend.open_streams(), 0);
    assert_eq!(outcome.admitted.len(), 2);
    {
        let store = lock_store(ingestor.store());
        let names: Vec<_> = store.entries().map(|e| e.name().to_string()).collect();
        assert!(names[0].ends_with("-photo0.jpeg"));
        assert!(names[1].ends_with("-photo1.jpeg"));
        assert!(
            store
                .entries()
                .all(|e| e.origin() == MediaOrigin::CapturedPhoto)
        );
    }

    // Thumbnails were revoked on hand-off; only store previews remain
    assert_eq!(registry.stats().live, 2);
    ingestor.remove_all();
    assert!(registry.stats().is_balanced());
}

#[tokio::test]
async fn test_open_dropped_mid_acquire_leaves_session_closed() {
    let backend = VirtualCameraBackend::new();
    backend.set_faults(FaultPlan {
        acquire_delay: Some(Duration::from_millis(200)),
        ..FaultPlan::default()
    });
    let (mut session, _) = session(&backend);

    let timed_out = tokio::time::timeout(Duration::from_millis(20), session.open()).await;

    assert!(timed_out.is_err());
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(backend.open_streams(), 0);
    assert!(matches!(
        session.take_photo().await,
        Err(CaptureError::NotLive)
    ));

    backend.set_faults(FaultPlan::default());
    session.open().await.unwrap();
    assert_eq!(session.state(), SessionState::Live);
    session.take_photo().await.unwrap();
    assert_eq!(backend.open_streams(), 1);
}

#[tokio::test]
async fn test_switch_dropped_mid_acquire_can_reopen() {
    let backend = VirtualCameraBackend::new();
    let (mut session, _) = session(&backend);
    session.open().await.unwrap();
    session.take_photo().await.unwrap();

    backend.set_faults(FaultPlan {
        acquire_delay: Some(Duration::from_millis(200)),
        ..FaultPlan::default()
    });
    let timed_out = tokio::time::timeout(Duration::from_millis(20), session.switch_facing()).await;

    assert!(timed_out.is_err());
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(backend.open_streams(), 0);
    assert_eq!(session.captures().len(), 1);

    backend.set_faults(FaultPlan::default());
    session.open().await.unwrap();
    assert_eq!(session.state(), SessionState::Live);
}

#[test]
fn test_recording_outside_runtime_fails_softly() {
    let backend = VirtualCameraBackend::new();
    let (mut session, registry) = session(&backend);
    let rt = tokio::runtime::Runtime::new().unwrap();
    rt.block_on(session.open()).unwrap();

    let result = session.start_recording();

    assert!(matches!(result, Err(CaptureError::RecordingFailed(_))));
    assert_eq!(session.state(), SessionState::Live);
    assert_eq!(session.recording_elapsed(), None);

    // The stream is still usable from inside the runtime
    rt.block_on(async {
        session.take_photo().await.unwrap();
        session.start_recording().unwrap();
        tokio::time::sleep(Duration::from_millis(250)).await;
        session.stop_recording().await.unwrap();
    });
    assert_eq!(session.captures().len(), 2);

    session.cancel();
    assert_eq!(backend.open_streams(), 0);
    assert!(registry.stats().is_balanced());
}
