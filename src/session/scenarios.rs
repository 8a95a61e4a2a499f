//! End-to-end engine scenarios against the simulated platform

use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::*;
use crate::config::Config;
use crate::device::{CameraSelection, DevicePosition, VideoQuality};
use crate::error::CaptureError;
use crate::orientation::{DeviceOrientation, VideoOrientation};
use crate::platform::simulated::{PromptBehavior, SimulatedRig};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    rig: SimulatedRig,
    handle: CameraHandle,
    events: mpsc::UnboundedReceiver<CameraEvent>,
    dir: TempDir,
}

fn test_config(dir: &Path) -> Config {
    let mut config = Config::default();
    config.recording.output_directory = Some(dir.to_path_buf());
    config.recording.duration_sample_interval_ms = 10;
    config
}

fn spawn_with(rig: &SimulatedRig, configure: impl FnOnce(&mut Config)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    configure(&mut config);
    let (handle, events) = spawn_session(config, rig.platform());
    Harness {
        rig: rig.clone(),
        handle,
        events,
        dir,
    }
}

async fn running_with(configure: impl FnOnce(&mut Config)) -> Harness {
    let rig = SimulatedRig::new();
    let harness = spawn_with(&rig, configure);
    wait_for_state(&harness.handle, SessionState::Running).await;
    harness
}

async fn running() -> Harness {
    running_with(|_| {}).await
}

async fn wait_for_state(handle: &CameraHandle, state: SessionState) -> SessionSnapshot {
    timeout(WAIT, handle.wait_for(|s| s.state == state))
        .await
        .expect("timed out waiting for state")
        .expect("engine exited")
}

async fn eventually(mut check: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never held");
}

/// Next event other than a duration sample
async fn next_event(events: &mut mpsc::UnboundedReceiver<CameraEvent>) -> CameraEvent {
    loop {
        let event = timeout(WAIT, events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed");
        if !matches!(event, CameraEvent::RecordedDuration(_)) {
            return event;
        }
    }
}

/// Shut the engine down and return every event it still emitted
async fn shutdown_and_drain(harness: &mut Harness) -> Vec<CameraEvent> {
    harness.handle.shutdown();
    timeout(WAIT, harness.handle.closed())
        .await
        .expect("engine did not stop");
    let mut rest = Vec::new();
    while let Some(event) = harness.events.recv().await {
        rest.push(event);
    }
    rest
}

async fn record_once(harness: &mut Harness) -> std::path::PathBuf {
    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    harness.handle.stop_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishRecording(_)
    ));
    match next_event(&mut harness.events).await {
        CameraEvent::DidFinishProcessing(path) => path,
        other => panic!("expected finished file, got {:?}", other),
    }
}

#[tokio::test]
async fn test_activation_prompts_then_runs() {
    let harness = running().await;

    let snapshot = harness.handle.snapshot();
    assert_eq!(snapshot.authorization, AuthorizationState::Authorized);
    assert!(snapshot.is_running);
    assert!(!snapshot.is_recording);
    assert_eq!(snapshot.current_camera, CameraSelection::Rear);
    assert_eq!(harness.rig.prompts_shown(), 1);
    assert!(harness.rig.is_running());
    assert!(harness.rig.preview_attached());
    assert!(harness.rig.audio_session_configured());
    assert_eq!(harness.rig.video_inputs().len(), 1);
    assert_eq!(harness.rig.audio_inputs().len(), 1);
}

#[tokio::test]
async fn test_background_audio_disabled_skips_audio_session() {
    let harness = running_with(|c| c.camera.allow_background_audio = false).await;
    assert!(!harness.rig.audio_session_configured());
}

#[tokio::test]
async fn test_record_audio_disabled_attaches_video_only() {
    let harness = running_with(|c| c.recording.record_audio = false).await;
    assert_eq!(harness.rig.video_inputs().len(), 1);
    assert!(harness.rig.audio_inputs().is_empty());
}

#[tokio::test]
async fn test_intents_queue_behind_permission_prompt() {
    let rig = SimulatedRig::new();
    rig.set_prompt_behavior(PromptBehavior::Manual);
    let mut harness = spawn_with(&rig, |_| {});

    wait_for_state(&harness.handle, SessionState::AwaitingAuthorization).await;
    harness.handle.start_recording();
    eventually(|| rig.prompts_shown() == 1).await;
    assert!(rig.answer_prompt(true));

    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(CameraSelection::Rear)
    );
    assert_eq!(rig.prompts_shown(), 1);
}

#[tokio::test]
async fn test_sessions_share_one_permission_prompt() {
    let rig = SimulatedRig::new();
    rig.set_prompt_behavior(PromptBehavior::Manual);
    let first = spawn_with(&rig, |_| {});
    let second = spawn_with(&rig, |_| {});

    wait_for_state(&first.handle, SessionState::AwaitingAuthorization).await;
    wait_for_state(&second.handle, SessionState::AwaitingAuthorization).await;
    eventually(|| rig.prompts_shown() == 1).await;
    assert!(rig.answer_prompt(true));

    for harness in [&first, &second] {
        timeout(
            WAIT,
            harness
                .handle
                .wait_for(|s| s.authorization == AuthorizationState::Authorized),
        )
        .await
        .expect("session never authorized")
        .expect("engine exited");
    }
    assert_eq!(rig.prompts_shown(), 1);
}

#[tokio::test]
async fn test_repeated_start_stops_recording() {
    let mut harness = running().await;

    harness.handle.start_recording();
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(CameraSelection::Rear)
    );
    assert!(wait_for_state(&harness.handle, SessionState::Recording).await.is_recording);

    harness.handle.start_recording();
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishRecording(CameraSelection::Rear)
    );
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishProcessing(_)
    ));

    let snapshot = wait_for_state(&harness.handle, SessionState::Running).await;
    assert!(!snapshot.is_recording);
    assert!(!harness.rig.is_recording());
}

#[tokio::test]
async fn test_finished_file_matches_recording_and_durations_grow() {
    let mut harness = running().await;

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    tokio::time::sleep(Duration::from_millis(80)).await;
    harness.handle.stop_recording();

    let mut durations = Vec::new();
    let path = loop {
        let event = timeout(WAIT, harness.events.recv()).await.unwrap().unwrap();
        match event {
            CameraEvent::RecordedDuration(formatted) => durations.push(formatted),
            CameraEvent::DidFinishRecording(_) => {}
            CameraEvent::DidFinishProcessing(path) => break path,
            other => panic!("unexpected event {:?}", other),
        }
    };

    assert!(!durations.is_empty());
    assert!(durations.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(durations.iter().all(|d| d.len() == 5 && &d[2..3] == ":"));

    assert_eq!(path.parent(), Some(harness.dir.path()));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("mov"));
    assert!(path.exists());
}

#[tokio::test]
async fn test_each_recording_gets_a_fresh_file() {
    let mut harness = running().await;

    let first = record_once(&mut harness).await;
    let second = record_once(&mut harness).await;

    assert_ne!(first, second);
    assert!(first.exists());
    assert!(second.exists());
}

#[tokio::test]
async fn test_stop_without_recording_is_silent() {
    let mut harness = running().await;

    harness.handle.stop_recording();
    // Anything the stop emitted would arrive before the switch event
    harness.handle.switch_camera();

    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidSwitchCamera(CameraSelection::Front)
    );
}

#[tokio::test]
async fn test_switch_keeps_single_video_input() {
    let mut harness = running().await;

    harness.handle.switch_camera();
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidSwitchCamera(CameraSelection::Front)
    );
    let video = harness.rig.video_inputs();
    assert_eq!(video.len(), 1);
    assert_eq!(video[0].device.position, DevicePosition::Front);
    assert!(harness.rig.audio_inputs().len() <= 1);
    assert_eq!(harness.handle.current_camera(), CameraSelection::Front);
    assert!(harness.rig.is_running());

    harness.handle.switch_camera();
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidSwitchCamera(CameraSelection::Rear)
    );
    let video = harness.rig.video_inputs();
    assert_eq!(video.len(), 1);
    assert_eq!(video[0].device.position, DevicePosition::Back);
    assert_eq!(harness.handle.current_camera(), CameraSelection::Rear);
}

#[tokio::test]
async fn test_switch_while_recording_is_ignored() {
    let mut harness = running().await;

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    let inputs_before = harness.rig.inputs();

    harness.handle.switch_camera();
    harness.handle.stop_recording();

    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishRecording(CameraSelection::Rear)
    );
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishProcessing(_)
    ));
    assert_eq!(harness.rig.inputs(), inputs_before);
    assert_eq!(harness.handle.current_camera(), CameraSelection::Rear);
}

#[tokio::test]
async fn test_double_tap_switches_camera() {
    let mut harness = running().await;

    harness.handle.double_tap();
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidSwitchCamera(CameraSelection::Front)
    );
}

#[tokio::test]
async fn test_double_tap_disabled_is_ignored() {
    let mut harness = running_with(|c| c.camera.double_tap_camera_switch = false).await;

    harness.handle.double_tap();
    harness.handle.switch_camera();

    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidSwitchCamera(CameraSelection::Front)
    );
    let rest = shutdown_and_drain(&mut harness).await;
    assert!(!rest
        .iter()
        .any(|e| matches!(e, CameraEvent::DidSwitchCamera(_))));
}

#[tokio::test]
async fn test_denied_never_records() {
    let rig = SimulatedRig::new();
    rig.set_prompt_behavior(PromptBehavior::Deny);
    let mut harness = spawn_with(&rig, |_| {});

    harness.handle.start_recording();
    let snapshot = wait_for_state(&harness.handle, SessionState::Stopped(StopReason::Denied)).await;
    assert_eq!(snapshot.authorization, AuthorizationState::Denied);
    harness.handle.start_recording();

    let events = shutdown_and_drain(&mut harness).await;
    assert_eq!(
        events,
        vec![CameraEvent::DidError(CaptureError::NotAuthorized.user_message())]
    );
    assert!(!rig.is_running());
    assert!(rig.video_inputs().is_empty());
}

#[tokio::test]
async fn test_previously_denied_fails_without_prompt() {
    let rig = SimulatedRig::new();
    rig.set_permission(AuthorizationState::Denied);
    let mut harness = spawn_with(&rig, |_| {});

    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidError(CaptureError::NotAuthorized.user_message())
    );
    assert_eq!(rig.prompts_shown(), 0);
}

#[tokio::test]
async fn test_configuration_failure_reports_error() {
    let rig = SimulatedRig::new();
    rig.refuse_video_inputs(true);
    let mut harness = spawn_with(&rig, |_| {});

    wait_for_state(
        &harness.handle,
        SessionState::Stopped(StopReason::ConfigurationFailed),
    )
    .await;
    harness.handle.start_recording();
    harness.handle.switch_camera();

    let events = shutdown_and_drain(&mut harness).await;
    assert_eq!(
        events,
        vec![CameraEvent::DidError("Unable to capture video".to_string())]
    );
    assert!(!rig.is_running());
}

#[tokio::test]
async fn test_missing_rear_camera_fails_configuration() {
    let rig = SimulatedRig::new();
    rig.remove_camera(DevicePosition::Back);
    let harness = spawn_with(&rig, |_| {});

    let snapshot = wait_for_state(
        &harness.handle,
        SessionState::Stopped(StopReason::ConfigurationFailed),
    )
    .await;
    assert!(!snapshot.is_running);
}

#[tokio::test]
async fn test_switch_failure_stops_session() {
    let mut harness = running().await;
    harness.rig.remove_camera(DevicePosition::Front);

    harness.handle.switch_camera();
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidError("Unable to capture video".to_string())
    );

    let snapshot = wait_for_state(&harness.handle, SessionState::Stopped(StopReason::SwitchFailed)).await;
    assert!(!snapshot.is_running);
    // The selection reflects the camera the switch was asked for
    assert_eq!(snapshot.current_camera, CameraSelection::Front);
    assert!(!harness.rig.is_running());
    assert!(harness.rig.video_inputs().is_empty());

    // A stopped session ignores further intents
    harness.handle.start_recording();
    let rest = shutdown_and_drain(&mut harness).await;
    assert!(rest.is_empty());
}

#[tokio::test]
async fn test_front_camera_uses_high_compatibility_preset() {
    let harness = running_with(|c| {
        c.camera.default_camera = CameraSelection::Front;
        c.camera.video_quality = VideoQuality::Resolution3840x2160;
    })
    .await;

    assert_eq!(
        harness.rig.preset().as_deref(),
        Some(VideoQuality::High.preset_token())
    );
}

#[tokio::test]
async fn test_rear_camera_uses_requested_preset() {
    let harness = running_with(|c| c.camera.video_quality = VideoQuality::Resolution1920x1080).await;

    assert_eq!(
        harness.rig.preset().as_deref(),
        Some(VideoQuality::Resolution1920x1080.preset_token())
    );
}

#[tokio::test]
async fn test_front_flash_only_applies_after_switching_to_rear() {
    let mut harness = running_with(|c| c.camera.default_camera = CameraSelection::Front).await;

    harness.handle.set_flash(true);
    harness.handle.start_recording();
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(CameraSelection::Front)
    );
    assert!(!harness.rig.torch_on());
    assert!(!harness.handle.snapshot().torch_on);

    harness.handle.stop_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishRecording(_)
    ));
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishProcessing(_)
    ));

    harness.handle.switch_camera();
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidSwitchCamera(CameraSelection::Rear)
    );

    harness.handle.start_recording();
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(CameraSelection::Rear)
    );
    assert!(harness.rig.torch_on());
    assert!(harness.handle.snapshot().torch_on);

    harness.handle.stop_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishRecording(_)
    ));
    assert!(!harness.rig.torch_on());
}

#[tokio::test]
async fn test_flash_toggled_during_rear_recording() {
    let mut harness = running().await;

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    assert!(!harness.rig.torch_on());

    harness.handle.set_flash(true);
    timeout(WAIT, harness.handle.wait_for(|s| s.torch_on))
        .await
        .unwrap()
        .unwrap();
    assert!(harness.rig.torch_on());

    harness.handle.set_flash(false);
    timeout(WAIT, harness.handle.wait_for(|s| !s.torch_on))
        .await
        .unwrap()
        .unwrap();
    assert!(!harness.rig.torch_on());
}

#[tokio::test]
async fn test_recording_orientation_fixed_at_start() {
    let rig = SimulatedRig::new();
    rig.rotate(DeviceOrientation::LandscapeLeft);
    let mut harness = spawn_with(&rig, |c| c.camera.use_device_orientation = true);
    wait_for_state(&harness.handle, SessionState::Running).await;

    assert_eq!(rig.preview_orientation(), Some(VideoOrientation::LandscapeLeft));
    assert_eq!(rig.rotation_subscribers(), 1);

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    let first = rig.last_recording_orientation().unwrap();
    assert_eq!(first.orientation, VideoOrientation::LandscapeRight);
    assert!(!first.mirrored);

    rig.rotate(DeviceOrientation::PortraitUpsideDown);
    eventually(|| rig.preview_orientation() == Some(VideoOrientation::PortraitUpsideDown)).await;
    // Still the orientation chosen at start
    assert_eq!(rig.last_recording_orientation(), Some(first));

    harness.handle.stop_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishRecording(_)
    ));

    // Flat readings keep the previous sample
    rig.rotate(DeviceOrientation::FaceUp);
    harness.handle.start_recording();
    loop {
        if let CameraEvent::DidBeginRecording(_) = next_event(&mut harness.events).await {
            break;
        }
    }
    assert_eq!(
        rig.last_recording_orientation().unwrap().orientation,
        VideoOrientation::PortraitUpsideDown
    );
}

#[tokio::test]
async fn test_front_recording_is_mirrored() {
    let mut harness = running_with(|c| c.camera.default_camera = CameraSelection::Front).await;

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));

    let orientation = harness.rig.last_recording_orientation().unwrap();
    assert!(orientation.mirrored);
    assert_eq!(orientation.orientation, VideoOrientation::Portrait);
}

#[tokio::test]
async fn test_layout_orientation_used_without_tracking() {
    let mut harness = running().await;
    assert_eq!(harness.rig.rotation_subscribers(), 0);

    harness.handle.layout_changed(DeviceOrientation::LandscapeRight);
    let rig = harness.rig.clone();
    eventually(|| rig.preview_orientation() == Some(VideoOrientation::LandscapeRight)).await;

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    assert_eq!(
        rig.last_recording_orientation().unwrap().orientation,
        VideoOrientation::LandscapeRight
    );

    // Unknown layout falls back to portrait
    harness.handle.layout_changed(DeviceOrientation::Unknown);
    eventually(|| rig.preview_orientation() == Some(VideoOrientation::Portrait)).await;
}

#[tokio::test]
async fn test_background_allowance_released_on_stop() {
    let mut harness = running().await;

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    assert_eq!(harness.rig.active_background_tasks(), 1);

    harness.handle.stop_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishRecording(_)
    ));
    assert_eq!(harness.rig.active_background_tasks(), 0);
}

#[tokio::test]
async fn test_records_without_background_allowance() {
    let rig = SimulatedRig::new();
    rig.deny_background_tasks();
    let mut harness = spawn_with(&rig, |_| {});
    wait_for_state(&harness.handle, SessionState::Running).await;

    let path = record_once(&mut harness).await;
    assert!(path.exists());
}

#[tokio::test]
async fn test_interrupted_recording_reports_failure() {
    let mut harness = running().await;

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    harness.rig.interrupt_recording("disk full");

    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishRecording(CameraSelection::Rear)
    );
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFailToRecord("disk full".to_string())
    );

    let snapshot = wait_for_state(&harness.handle, SessionState::Running).await;
    assert!(!snapshot.is_recording);
    assert_eq!(harness.rig.active_background_tasks(), 0);
    assert_eq!(std::fs::read_dir(harness.dir.path()).unwrap().count(), 0);

    // The session can record again
    let path = record_once(&mut harness).await;
    assert!(path.exists());
}

#[tokio::test]
async fn test_stop_after_sink_stopped_on_its_own() {
    let mut harness = running().await;
    harness.rig.delay_finalize(Duration::from_millis(200));

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    harness.rig.interrupt_recording("device unplugged");
    harness.handle.stop_recording();

    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishRecording(CameraSelection::Rear)
    );
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFailToRecord("device unplugged".to_string())
    );
    assert_eq!(harness.rig.idle_stops(), 0);
    assert_eq!(harness.rig.active_background_tasks(), 0);
}

#[tokio::test]
async fn test_failed_finalize_hides_file() {
    let mut harness = running().await;
    harness.rig.fail_next_recording("encoder error");

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    harness.handle.stop_recording();

    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFinishRecording(_)
    ));
    assert_eq!(
        next_event(&mut harness.events).await,
        CameraEvent::DidFailToRecord("encoder error".to_string())
    );
    assert_eq!(std::fs::read_dir(harness.dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_teardown_stops_active_recording() {
    let mut harness = running_with(|c| c.camera.use_device_orientation = true).await;
    harness.handle.set_flash(true);

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));
    assert!(harness.rig.torch_on());

    let rest = shutdown_and_drain(&mut harness).await;
    let lifecycle: Vec<_> = rest
        .into_iter()
        .filter(|e| !matches!(e, CameraEvent::RecordedDuration(_)))
        .collect();
    assert_eq!(lifecycle.len(), 2);
    assert_eq!(lifecycle[0], CameraEvent::DidFinishRecording(CameraSelection::Rear));
    assert!(matches!(lifecycle[1], CameraEvent::DidFinishProcessing(_)));

    assert!(!harness.rig.is_running());
    assert!(!harness.rig.is_recording());
    assert!(!harness.rig.torch_on());
    assert_eq!(harness.rig.rotation_subscribers(), 0);
    assert_eq!(harness.rig.active_background_tasks(), 0);
    assert_eq!(
        harness.handle.snapshot().state,
        SessionState::Stopped(StopReason::Teardown)
    );
}

#[tokio::test]
async fn test_teardown_waits_for_delayed_finalize() {
    let mut harness = running().await;
    harness.rig.delay_finalize(Duration::from_millis(300));

    harness.handle.start_recording();
    assert!(matches!(
        next_event(&mut harness.events).await,
        CameraEvent::DidBeginRecording(_)
    ));

    let rest: Vec<_> = shutdown_and_drain(&mut harness)
        .await
        .into_iter()
        .filter(|e| !matches!(e, CameraEvent::RecordedDuration(_)))
        .collect();
    assert_eq!(rest.len(), 2);
    assert_eq!(rest[0], CameraEvent::DidFinishRecording(CameraSelection::Rear));
    match &rest[1] {
        CameraEvent::DidFinishProcessing(path) => assert!(path.exists()),
        other => panic!("expected finished file, got {:?}", other),
    }
}

#[tokio::test]
async fn test_dropping_handles_tears_down() {
    let Harness {
        rig,
        handle,
        mut events,
        dir: _dir,
    } = running_with(|c| c.camera.use_device_orientation = true).await;
    let mut snapshots = handle.snapshots();
    let second = handle.clone();

    drop(handle);
    second.switch_camera();
    assert_eq!(
        next_event(&mut events).await,
        CameraEvent::DidSwitchCamera(CameraSelection::Front)
    );
    drop(second);

    // The event channel closes once the engine is gone
    timeout(WAIT, async { while events.recv().await.is_some() {} })
        .await
        .unwrap();
    assert!(!rig.is_running());
    assert_eq!(rig.rotation_subscribers(), 0);

    use futures::StreamExt;
    let mut last = None;
    while let Some(snapshot) = snapshots.next().await {
        last = Some(snapshot);
    }
    assert_eq!(
        last.map(|s| s.state),
        Some(SessionState::Stopped(StopReason::Teardown))
    );
}
