//! Capture session engine
//!
//! Owns the capture session and runs the session state machine. All
//! mutations of the session, its inputs, the torch and the recording state
//! happen on the engine task, one intent at a time. Results leave the
//! engine as `CameraEvent`s and as published `SessionSnapshot`s.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use super::{
    format_duration, AttachedDevices, AuthorizationGate, AuthorizationState, CameraEvent,
    RecordingSession, RecordingTimer, SessionCommand, SessionConfigurator, SessionSnapshot,
    SessionState, StopReason,
};
use crate::config::Config;
use crate::device::{CameraSelection, DeviceSelector};
use crate::error::CaptureError;
use crate::orientation::{DeviceOrientation, OrientationTracker};
use crate::platform::{
    BackgroundTasks, FileOutputFinished, Platform, PreviewSink, RotationSource, SessionBackend,
};

/// How long teardown waits for the sink to finalize stopped recordings
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);

/// The capture session state machine
pub struct CameraEngine {
    /// Configuration
    config: Config,
    /// Platform capture session
    backend: Box<dyn SessionBackend>,
    /// Preview surface
    preview: Box<dyn PreviewSink>,
    background: Arc<dyn BackgroundTasks>,
    rotation: Arc<dyn RotationSource>,
    gate: AuthorizationGate,
    configurator: SessionConfigurator,
    orientation: OrientationTracker,
    /// Command receiver
    cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
    /// Event sender (one observer)
    event_tx: mpsc::UnboundedSender<CameraEvent>,
    /// Snapshot publisher
    snapshot_tx: watch::Sender<SessionSnapshot>,
    /// Completion callbacks from the output sink
    file_tx: mpsc::UnboundedSender<FileOutputFinished>,
    file_rx: mpsc::UnboundedReceiver<FileOutputFinished>,
    /// Active rotation subscription
    rotation_rx: Option<mpsc::UnboundedReceiver<DeviceOrientation>>,
    state: SessionState,
    authorization: AuthorizationState,
    camera: CameraSelection,
    /// Devices attached by the last successful configuration batch
    attached: Option<AttachedDevices>,
    /// Torch wanted for rear camera recordings
    flash_requested: bool,
    torch_on: bool,
    /// Recording currently being written
    recording: Option<RecordingSession>,
    /// Stopped recordings waiting for the sink to finalize, by file
    finalizing: HashMap<PathBuf, RecordingSession>,
    /// Duration sampler (only while recording)
    timer: Option<RecordingTimer>,
    output_dir: PathBuf,
}

impl CameraEngine {
    /// Create a new engine around the given platform
    pub fn new(
        config: Config,
        platform: Platform,
        cmd_rx: mpsc::UnboundedReceiver<SessionCommand>,
        event_tx: mpsc::UnboundedSender<CameraEvent>,
        snapshot_tx: watch::Sender<SessionSnapshot>,
    ) -> Self {
        let selector = DeviceSelector::new(platform.discovery.clone());
        let configurator = SessionConfigurator::new(
            selector,
            config.camera.video_quality,
            config.recording.record_audio,
        );
        let output_dir = config.recording.output_dir();
        let (file_tx, file_rx) = mpsc::unbounded_channel();

        Self {
            camera: config.camera.default_camera,
            flash_requested: config.camera.flash_enabled,
            backend: platform.backend,
            preview: platform.preview,
            background: platform.background,
            rotation: platform.rotation,
            gate: platform.authorization,
            configurator,
            orientation: OrientationTracker::new(false),
            cmd_rx,
            event_tx,
            snapshot_tx,
            file_tx,
            file_rx,
            rotation_rx: None,
            state: SessionState::Idle,
            authorization: AuthorizationState::Undetermined,
            attached: None,
            torch_on: false,
            recording: None,
            finalizing: HashMap::new(),
            timer: None,
            output_dir,
            config,
        }
    }

    /// Run the engine until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!("Camera engine starting ({} camera)", self.camera);

        // Intents queue up on the channel while activation waits on the
        // permission prompt
        self.activate().await;

        loop {
            tokio::select! {
                // Handle commands
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Shutdown) => {
                            info!("Shutdown command received");
                            break;
                        }
                        Some(cmd) => self.handle_command(cmd),
                        None => {
                            info!("All camera handles dropped");
                            break;
                        }
                    }
                }

                // Output sink finished a file
                Some(finished) = self.file_rx.recv() => {
                    self.handle_file_finished(finished);
                }

                // Device rotation (only while subscribed)
                Some(reading) = next_rotation(&mut self.rotation_rx) => {
                    self.handle_rotation(reading);
                }

                // Recorded duration (only while recording)
                _ = next_tick(&mut self.timer) => {
                    self.sample_duration();
                }
            }
        }

        self.teardown();
        self.await_finalizing().await;

        info!("Camera engine stopped");
    }

    /// Deliver the completion of every stopped recording, up to a deadline
    async fn await_finalizing(&mut self) {
        let deadline = tokio::time::Instant::now() + FINALIZE_TIMEOUT;
        while !self.finalizing.is_empty() {
            match tokio::time::timeout_at(deadline, self.file_rx.recv()).await {
                Ok(Some(finished)) => self.handle_file_finished(finished),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Gave up waiting on {} unfinalized recording(s)",
                        self.finalizing.len()
                    );
                    break;
                }
            }
        }
    }

    /// idle -> awaitingAuthorization -> configuring -> running
    async fn activate(&mut self) {
        self.transition(SessionState::AwaitingAuthorization);

        self.authorization = self.gate.check_and_request().await;
        if self.authorization != AuthorizationState::Authorized {
            self.stop_with_error(StopReason::Denied, CaptureError::NotAuthorized);
            return;
        }

        self.transition(SessionState::Configuring);

        if self.config.camera.allow_background_audio {
            if let Err(e) = self.backend.configure_audio_session() {
                warn!("Failed to configure shared audio session: {}", e);
            }
        }

        match self
            .configurator
            .apply_configuration(self.backend.as_mut(), self.camera)
        {
            Ok(attached) => {
                info!(
                    "Session configured with {} at {}",
                    attached.video.name,
                    attached.preset.preset_token()
                );
                self.attached = Some(attached);
            }
            Err(e) => {
                self.stop_with_error(StopReason::ConfigurationFailed, e);
                return;
            }
        }

        if self.config.camera.use_device_orientation {
            self.rotation_rx = Some(self.rotation.subscribe());
            self.orientation.begin_tracking(self.rotation.current());
            debug!("Subscribed to device rotation");
        }

        self.backend.start_running();
        if !self.backend.is_running() {
            self.stop_with_error(
                StopReason::ConfigurationFailed,
                CaptureError::ConfigurationFailed("session did not start running".to_string()),
            );
            return;
        }

        self.preview.attach(self.backend.preview_handle());
        self.refresh_preview();
        self.transition(SessionState::Running);
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        if self.state.is_stopped() {
            debug!("Ignoring {:?}, session is {}", cmd, self.state);
            return;
        }

        debug!("Handling {:?} while {}", cmd, self.state);
        match cmd {
            SessionCommand::StartRecording => {
                if self.state == SessionState::Recording {
                    // A repeated start stops the active recording
                    self.stop_recording();
                } else {
                    self.start_recording();
                }
            }
            SessionCommand::StopRecording => self.stop_recording(),
            SessionCommand::SwitchCamera => self.switch_camera(),
            SessionCommand::DoubleTap => {
                if self.config.camera.double_tap_camera_switch {
                    self.switch_camera();
                } else {
                    debug!("Double tap camera switch disabled");
                }
            }
            SessionCommand::SetFlash(enabled) => self.set_flash(enabled),
            SessionCommand::LayoutChanged(ambient) => {
                self.orientation.set_ambient(ambient);
                self.refresh_preview();
            }
            // Handled by the run loop
            SessionCommand::Shutdown => {}
        }
    }

    /// running -> recording
    fn start_recording(&mut self) {
        if self.state != SessionState::Running
            || !self.backend.is_running()
            || !self.backend.has_output()
        {
            debug!("Ignoring start recording while {}", self.state);
            return;
        }

        let path = match self.next_output_path() {
            Ok(path) => path,
            Err(e) => {
                error!("Failed to prepare recording output: {}", e);
                self.emit(CameraEvent::DidFailToRecord(
                    CaptureError::RecordingFailed(e.to_string()).user_message(),
                ));
                return;
            }
        };

        if self.camera == CameraSelection::Rear && self.flash_requested {
            self.set_torch(true);
        }

        let orientation = self.orientation.recording_snapshot(self.camera);

        let background_task = self.background.begin();
        if background_task.is_none() {
            debug!("No background execution allowance granted");
        }

        if let Err(e) = self
            .backend
            .start_recording(&path, orientation, self.file_tx.clone())
        {
            error!("Failed to start recording: {}", e);
            self.set_torch(false);
            if let Some(task) = background_task {
                self.background.end(task);
            }
            self.emit(CameraEvent::DidFailToRecord(
                CaptureError::RecordingFailed(e.to_string()).user_message(),
            ));
            return;
        }

        info!(
            "Recording started to {:?} ({:?}, mirrored: {})",
            path, orientation.orientation, orientation.mirrored
        );
        self.recording = Some(RecordingSession::new(
            path,
            self.camera,
            orientation,
            background_task,
        ));
        self.timer = Some(RecordingTimer::start(
            self.config.recording.sample_interval(),
        ));
        self.transition(SessionState::Recording);
        self.emit(CameraEvent::DidBeginRecording(self.camera));
    }

    /// recording -> running, explicit stop
    fn stop_recording(&mut self) {
        let Some(mut session) = self.recording.take() else {
            debug!("No active recording to stop");
            return;
        };

        let elapsed = chrono::Utc::now() - session.started_at;
        info!(
            "Stopping recording {:?} after {}ms",
            session.output_path,
            elapsed.num_milliseconds()
        );
        if self.backend.is_recording() {
            self.backend.stop_recording();
        } else {
            debug!("Output sink already stopped");
        }
        self.end_recording(&mut session);
        self.finalizing.insert(session.output_path.clone(), session);
    }

    /// Bookkeeping shared by an explicit stop and a sink-initiated finish
    fn end_recording(&mut self, session: &mut RecordingSession) {
        if session.ended {
            return;
        }
        session.ended = true;

        self.set_torch(false);
        self.timer = None;
        if let Some(task) = session.background_task.take() {
            self.background.end(task);
        }

        if self.state == SessionState::Recording {
            self.transition(SessionState::Running);
        }
        self.emit(CameraEvent::DidFinishRecording(session.camera));
    }

    fn handle_file_finished(&mut self, finished: FileOutputFinished) {
        let mut session = match self.recording.take() {
            Some(active) if active.output_path == finished.path => {
                warn!("Output sink finished {:?} on its own", finished.path);
                active
            }
            other => {
                self.recording = other;
                match self.finalizing.remove(&finished.path) {
                    Some(session) => session,
                    None => {
                        warn!("Completion for unknown recording {:?}", finished.path);
                        return;
                    }
                }
            }
        };
        self.end_recording(&mut session);

        match finished.error {
            None => {
                info!("Recording finalized at {:?}", session.output_path);
                self.emit(CameraEvent::DidFinishProcessing(session.output_path));
            }
            Some(detail) => {
                let err = CaptureError::RecordingFailed(detail);
                error!("Recording {:?} failed: {}", session.output_path, err);
                // A failed file is never handed out
                if let Err(e) = std::fs::remove_file(&session.output_path) {
                    debug!("Could not remove {:?}: {}", session.output_path, e);
                }
                self.emit(CameraEvent::DidFailToRecord(err.user_message()));
            }
        }
    }

    /// running -> switchingCamera -> running
    fn switch_camera(&mut self) {
        if self.state != SessionState::Running || !self.backend.is_running() {
            debug!("Ignoring camera switch while {}", self.state);
            return;
        }

        let target = self.camera.toggled();
        info!("Switching camera {} -> {}", self.camera, target);
        // The selection follows the intent even if reattaching fails
        self.camera = target;
        self.transition(SessionState::SwitchingCamera);
        self.backend.stop_running();

        match self
            .configurator
            .reconfigure_inputs(self.backend.as_mut(), target)
        {
            Ok(attached) => {
                self.attached = Some(attached);
            }
            Err(e) => {
                self.attached = None;
                self.stop_with_error(StopReason::SwitchFailed, e);
                return;
            }
        }

        self.backend.start_running();
        if !self.backend.is_running() {
            self.stop_with_error(
                StopReason::SwitchFailed,
                CaptureError::ConfigurationFailed("session did not restart".to_string()),
            );
            return;
        }

        self.refresh_preview();
        self.transition(SessionState::Running);
        self.emit(CameraEvent::DidSwitchCamera(target));
    }

    fn set_flash(&mut self, enabled: bool) {
        self.flash_requested = enabled;
        if self.camera == CameraSelection::Front {
            debug!("Flash preference stored, no torch on the front camera");
        } else if self.state == SessionState::Recording {
            self.set_torch(enabled);
        }
        self.publish();
    }

    /// Torch changes only ever apply to the rear camera
    fn set_torch(&mut self, on: bool) {
        if self.torch_on == on {
            return;
        }
        if on && self.camera != CameraSelection::Rear {
            return;
        }
        let Some(device) = self.attached.as_ref().map(|a| a.video.clone()) else {
            return;
        };

        match self.backend.set_torch(&device, on) {
            Ok(()) => {
                debug!("Torch {}", if on { "on" } else { "off" });
                self.torch_on = on;
                self.publish();
            }
            Err(e) => warn!("Failed to set torch on {}: {}", device.id, e),
        }
    }

    fn handle_rotation(&mut self, reading: DeviceOrientation) {
        if self.orientation.record_sample(reading) {
            debug!("Device orientation now {:?}", reading);
            self.refresh_preview();
        }
    }

    fn refresh_preview(&mut self) {
        let orientation = self.orientation.update_preview();
        self.preview.set_orientation(orientation);
    }

    fn sample_duration(&mut self) {
        let recorded = self.backend.recorded_duration();
        if let Some(timer) = self.timer.as_mut() {
            let duration = timer.sample(recorded);
            self.emit(CameraEvent::RecordedDuration(format_duration(duration)));
        }
    }

    /// Any state -> stopped
    fn teardown(&mut self) {
        info!("Tearing down capture session");
        self.stop_recording();
        self.set_torch(false);
        if self.backend.is_running() {
            self.backend.stop_running();
        }
        if self.rotation_rx.take().is_some() {
            self.orientation.end_tracking();
            debug!("Rotation subscription cancelled");
        }
        self.transition(SessionState::Stopped(StopReason::Teardown));
    }

    fn stop_with_error(&mut self, reason: StopReason, err: CaptureError) {
        error!("Capture session stopped ({:?}): {}", reason, err);
        self.set_torch(false);
        if self.backend.is_running() {
            self.backend.stop_running();
        }
        self.transition(SessionState::Stopped(reason));
        self.emit(CameraEvent::DidError(err.user_message()));
    }

    fn next_output_path(&self) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.output_dir)?;
        Ok(self.output_dir.join(format!(
            "{}.{}",
            uuid::Uuid::new_v4(),
            self.config.recording.file_extension
        )))
    }

    fn transition(&mut self, state: SessionState) {
        if self.state != state {
            info!("Session state: {} -> {}", self.state, state);
            self.state = state;
        }
        self.publish();
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(SessionSnapshot {
            state: self.state,
            authorization: self.authorization,
            is_running: self.backend.is_running(),
            is_recording: self.recording.is_some(),
            current_camera: self.camera,
            torch_on: self.torch_on,
        });
    }

    fn emit(&self, event: CameraEvent) {
        if self.event_tx.send(event).is_err() {
            debug!("No observer for camera events");
        }
    }
}

async fn next_rotation(
    rx: &mut Option<mpsc::UnboundedReceiver<DeviceOrientation>>,
) -> Option<DeviceOrientation> {
    match rx.as_mut() {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(timer: &mut Option<RecordingTimer>) {
    match timer.as_mut() {
        Some(timer) => timer.tick().await,
        None => std::future::pending().await,
    }
}

/// Create the channels connecting handles, the engine and the observer
pub fn create_session_channels() -> (
    mpsc::UnboundedSender<SessionCommand>,
    mpsc::UnboundedReceiver<SessionCommand>,
    mpsc::UnboundedSender<CameraEvent>,
    mpsc::UnboundedReceiver<CameraEvent>,
    watch::Sender<SessionSnapshot>,
    watch::Receiver<SessionSnapshot>,
) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(SessionSnapshot::default());
    (cmd_tx, cmd_rx, event_tx, event_rx, snapshot_tx, snapshot_rx)
}
