//! In-memory platform
//!
//! Backs the demo binary and the test suite. A `SimulatedRig` owns the
//! shared state; every collaborator it hands out reads and mutates that
//! state, and the rig exposes inspection and fault-injection hooks.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{
    BackgroundTaskId, BackgroundTasks, DeviceDiscovery, DeviceInput, DeviceModes,
    FileOutputFinished, PermissionService, Platform, PreviewHandle, PreviewSink, RotationSource,
    SessionBackend,
};
use crate::device::{CaptureDevice, DevicePosition, MediaKind, VideoQuality};
use crate::orientation::{DeviceOrientation, RecordingOrientation, VideoOrientation};
use crate::session::{AuthorizationGate, AuthorizationState};

/// How the simulated permission prompt answers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBehavior {
    Grant,
    Deny,
    /// Stay open until `SimulatedRig::answer_prompt`
    Manual,
}

struct ActiveRecording {
    path: PathBuf,
    started: Instant,
    finished: mpsc::UnboundedSender<FileOutputFinished>,
}

struct RigState {
    cameras: Vec<CaptureDevice>,
    microphone: Option<CaptureDevice>,

    running: bool,
    preset: Option<String>,
    unsupported_presets: HashSet<String>,
    inputs: Vec<DeviceInput>,
    output: bool,
    stabilization: bool,
    config_depth: u32,
    commits: u32,
    /// Stop calls that found nothing recording
    idle_stops: u32,
    refuse_video_inputs: bool,
    refuse_audio_inputs: bool,
    fail_device_lock: bool,
    configured_modes: Vec<(String, DeviceModes)>,
    audio_session_configured: bool,

    recording: Option<ActiveRecording>,
    last_duration: Duration,
    last_orientation: Option<RecordingOrientation>,
    fail_next_recording: Option<String>,
    finalize_delay: Option<Duration>,
    torch: bool,

    preview_attached: Option<PreviewHandle>,
    preview_orientation: Option<VideoOrientation>,

    next_task: u64,
    active_tasks: HashSet<u64>,
    grant_background: bool,

    orientation: DeviceOrientation,
    rotation_subscribers: Vec<mpsc::UnboundedSender<DeviceOrientation>>,

    permission: AuthorizationState,
    prompt_behavior: PromptBehavior,
    prompts: usize,
    pending_prompt: Option<oneshot::Sender<bool>>,
}

impl Default for RigState {
    fn default() -> Self {
        Self {
            cameras: vec![
                CaptureDevice::camera("sim-back-wide", "Back Camera", DevicePosition::Back),
                CaptureDevice::camera("sim-front-wide", "Front Camera", DevicePosition::Front),
            ],
            microphone: Some(CaptureDevice::microphone("sim-mic", "iPhone Microphone")),
            running: false,
            preset: None,
            unsupported_presets: HashSet::new(),
            inputs: Vec::new(),
            output: false,
            stabilization: false,
            config_depth: 0,
            commits: 0,
            idle_stops: 0,
            refuse_video_inputs: false,
            refuse_audio_inputs: false,
            fail_device_lock: false,
            configured_modes: Vec::new(),
            audio_session_configured: false,
            recording: None,
            last_duration: Duration::ZERO,
            last_orientation: None,
            fail_next_recording: None,
            finalize_delay: None,
            torch: false,
            preview_attached: None,
            preview_orientation: None,
            next_task: 1,
            active_tasks: HashSet::new(),
            grant_background: true,
            orientation: DeviceOrientation::Portrait,
            rotation_subscribers: Vec::new(),
            permission: AuthorizationState::Undetermined,
            prompt_behavior: PromptBehavior::Grant,
            prompts: 0,
            pending_prompt: None,
        }
    }
}

fn lock_state(state: &Mutex<RigState>) -> MutexGuard<'_, RigState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Shared simulated hardware
///
/// Every platform built from one rig (and its clones) shares a single
/// permission gate, like the sessions of one process.
#[derive(Clone)]
pub struct SimulatedRig {
    state: Arc<Mutex<RigState>>,
    id: String,
    authorization: AuthorizationGate,
}

impl SimulatedRig {
    pub fn new() -> Self {
        let state = Arc::new(Mutex::new(RigState::default()));
        let permissions = Arc::new(SimulatedPermissions {
            state: state.clone(),
        });
        Self {
            state,
            id: uuid::Uuid::new_v4().to_string(),
            authorization: AuthorizationGate::new(permissions),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RigState> {
        lock_state(&self.state)
    }

    /// Build a platform bundle backed by this rig
    pub fn platform(&self) -> Platform {
        Platform {
            backend: Box::new(SimulatedBackend { rig: self.clone() }),
            discovery: self.discovery(),
            authorization: self.authorization.clone(),
            background: Arc::new(SimulatedBackgroundTasks { rig: self.clone() }),
            preview: Box::new(SimulatedPreview { rig: self.clone() }),
            rotation: Arc::new(SimulatedRotation { rig: self.clone() }),
        }
    }

    pub fn discovery(&self) -> Arc<dyn DeviceDiscovery> {
        Arc::new(SimulatedDiscovery { rig: self.clone() })
    }

    // ---- fault injection -------------------------------------------------

    pub fn set_permission(&self, state: AuthorizationState) {
        self.lock().permission = state;
    }

    pub fn set_prompt_behavior(&self, behavior: PromptBehavior) {
        self.lock().prompt_behavior = behavior;
    }

    /// Resolve a prompt left open by `PromptBehavior::Manual`.
    /// Returns false when no prompt is pending.
    pub fn answer_prompt(&self, granted: bool) -> bool {
        let pending = self.lock().pending_prompt.take();
        match pending {
            Some(tx) => tx.send(granted).is_ok(),
            None => false,
        }
    }

    pub fn remove_camera(&self, position: DevicePosition) {
        self.lock().cameras.retain(|camera| camera.position != position);
    }

    pub fn remove_microphone(&self) {
        self.lock().microphone = None;
    }

    pub fn reject_preset(&self, quality: VideoQuality) {
        self.lock()
            .unsupported_presets
            .insert(quality.preset_token().to_string());
    }

    pub fn refuse_video_inputs(&self, refuse: bool) {
        self.lock().refuse_video_inputs = refuse;
    }

    pub fn refuse_audio_inputs(&self, refuse: bool) {
        self.lock().refuse_audio_inputs = refuse;
    }

    pub fn fail_device_lock(&self, fail: bool) {
        self.lock().fail_device_lock = fail;
    }

    pub fn fail_next_recording(&self, detail: impl Into<String>) {
        self.lock().fail_next_recording = Some(detail.into());
    }

    /// Deliver completion callbacks `delay` after the recording stops,
    /// the way an asynchronous sink does
    pub fn delay_finalize(&self, delay: Duration) {
        self.lock().finalize_delay = Some(delay);
    }

    pub fn deny_background_tasks(&self) {
        self.lock().grant_background = false;
    }

    /// Simulate a device rotation notification
    pub fn rotate(&self, orientation: DeviceOrientation) {
        let mut state = self.lock();
        state.orientation = orientation;
        state
            .rotation_subscribers
            .retain(|tx| tx.send(orientation).is_ok());
    }

    /// Finalize the active recording as if the sink hit an error mid-write
    pub fn interrupt_recording(&self, detail: impl Into<String>) {
        let mut state = self.lock();
        state.fail_next_recording = Some(detail.into());
        finish_recording(&mut state);
    }

    // ---- inspection ------------------------------------------------------

    pub fn inputs(&self) -> Vec<DeviceInput> {
        self.lock().inputs.clone()
    }

    pub fn video_inputs(&self) -> Vec<DeviceInput> {
        self.lock()
            .inputs
            .iter()
            .filter(|input| input.kind() == MediaKind::Video)
            .cloned()
            .collect()
    }

    pub fn audio_inputs(&self) -> Vec<DeviceInput> {
        self.lock()
            .inputs
            .iter()
            .filter(|input| input.kind() == MediaKind::Audio)
            .cloned()
            .collect()
    }

    pub fn preset(&self) -> Option<String> {
        self.lock().preset.clone()
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    pub fn has_output(&self) -> bool {
        self.lock().output
    }

    pub fn stabilization_enabled(&self) -> bool {
        self.lock().stabilization
    }

    pub fn commits(&self) -> u32 {
        self.lock().commits
    }

    pub fn idle_stops(&self) -> u32 {
        self.lock().idle_stops
    }

    pub fn configured_modes(&self, device_id: &str) -> Option<DeviceModes> {
        self.lock()
            .configured_modes
            .iter()
            .rev()
            .find(|(id, _)| id == device_id)
            .map(|(_, modes)| *modes)
    }

    pub fn audio_session_configured(&self) -> bool {
        self.lock().audio_session_configured
    }

    pub fn torch_on(&self) -> bool {
        self.lock().torch
    }

    pub fn is_recording(&self) -> bool {
        self.lock().recording.is_some()
    }

    pub fn last_recording_orientation(&self) -> Option<RecordingOrientation> {
        self.lock().last_orientation
    }

    pub fn active_background_tasks(&self) -> usize {
        self.lock().active_tasks.len()
    }

    pub fn preview_attached(&self) -> bool {
        self.lock().preview_attached.is_some()
    }

    pub fn preview_orientation(&self) -> Option<VideoOrientation> {
        self.lock().preview_orientation
    }

    pub fn rotation_subscribers(&self) -> usize {
        let mut state = self.lock();
        state.rotation_subscribers.retain(|tx| !tx.is_closed());
        state.rotation_subscribers.len()
    }

    pub fn prompts_shown(&self) -> usize {
        self.lock().prompts
    }
}

impl Default for SimulatedRig {
    fn default() -> Self {
        Self::new()
    }
}

fn finish_recording(state: &mut RigState) {
    let Some(recording) = state.recording.take() else {
        return;
    };
    state.last_duration = recording.started.elapsed();

    let error = state.fail_next_recording.take();
    if error.is_none() {
        let written = std::fs::OpenOptions::new()
            .append(true)
            .open(&recording.path)
            .and_then(|mut file| file.write_all(b"simulated movie data"));
        if let Err(e) = written {
            warn!("Simulated sink failed to write {:?}: {}", recording.path, e);
        }
    }

    debug!("Simulated sink finalized {:?} (error: {:?})", recording.path, error);
    let finished = FileOutputFinished {
        path: recording.path,
        error,
    };
    match state.finalize_delay {
        Some(delay) => {
            let tx = recording.finished;
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                let _ = tx.send(finished);
            });
        }
        None => {
            let _ = recording.finished.send(finished);
        }
    }
}

struct SimulatedBackend {
    rig: SimulatedRig,
}

impl SessionBackend for SimulatedBackend {
    fn begin_configuration(&mut self) {
        self.rig.lock().config_depth += 1;
    }

    fn commit_configuration(&mut self) {
        let mut state = self.rig.lock();
        state.config_depth = state.config_depth.saturating_sub(1);
        state.commits += 1;
    }

    fn can_set_preset(&self, token: &str) -> bool {
        !self.rig.lock().unsupported_presets.contains(token)
    }

    fn set_preset(&mut self, token: &str) {
        self.rig.lock().preset = Some(token.to_string());
    }

    fn configure_device(&mut self, device: &CaptureDevice, modes: DeviceModes) -> Result<()> {
        let mut state = self.rig.lock();
        if state.fail_device_lock {
            bail!("device {} is locked by another client", device.id);
        }
        state.configured_modes.push((device.id.clone(), modes));
        Ok(())
    }

    fn create_input(&mut self, device: &CaptureDevice) -> Result<DeviceInput> {
        let state = self.rig.lock();
        let present = match device.kind {
            MediaKind::Video => state.cameras.iter().any(|c| c.id == device.id),
            MediaKind::Audio => state.microphone.as_ref().is_some_and(|m| m.id == device.id),
        };
        if !present {
            bail!("device {} is no longer connected", device.id);
        }
        Ok(DeviceInput {
            device: device.clone(),
        })
    }

    fn can_add_input(&self, input: &DeviceInput) -> bool {
        let state = self.rig.lock();
        let refused = match input.kind() {
            MediaKind::Video => state.refuse_video_inputs,
            MediaKind::Audio => state.refuse_audio_inputs,
        };
        let occupied = state.inputs.iter().any(|i| i.kind() == input.kind());
        !refused && !occupied
    }

    fn add_input(&mut self, input: DeviceInput) {
        self.rig.lock().inputs.push(input);
    }

    fn remove_input(&mut self, input: &DeviceInput) {
        self.rig.lock().inputs.retain(|i| i != input);
    }

    fn inputs(&self) -> Vec<DeviceInput> {
        self.rig.lock().inputs.clone()
    }

    fn can_add_output(&self) -> bool {
        !self.rig.lock().output
    }

    fn add_output(&mut self) {
        self.rig.lock().output = true;
    }

    fn has_output(&self) -> bool {
        self.rig.lock().output
    }

    fn output_supports_stabilization(&self) -> bool {
        true
    }

    fn enable_output_stabilization(&mut self) {
        self.rig.lock().stabilization = true;
    }

    fn configure_audio_session(&mut self) -> Result<()> {
        self.rig.lock().audio_session_configured = true;
        Ok(())
    }

    fn start_running(&mut self) {
        let mut state = self.rig.lock();
        let has_video = state.inputs.iter().any(|i| i.kind() == MediaKind::Video);
        state.running = has_video;
    }

    fn stop_running(&mut self) {
        let mut state = self.rig.lock();
        if state.recording.is_some() {
            state
                .fail_next_recording
                .get_or_insert_with(|| "session stopped while recording".to_string());
            finish_recording(&mut state);
        }
        state.running = false;
    }

    fn is_running(&self) -> bool {
        self.rig.lock().running
    }

    fn start_recording(
        &mut self,
        path: &Path,
        orientation: RecordingOrientation,
        finished: mpsc::UnboundedSender<FileOutputFinished>,
    ) -> Result<()> {
        let mut state = self.rig.lock();
        if !state.running || !state.output {
            bail!("session is not ready to record");
        }
        if state.recording.is_some() {
            bail!("output is already recording");
        }
        std::fs::File::create(path)?;
        state.last_orientation = Some(orientation);
        state.recording = Some(ActiveRecording {
            path: path.to_path_buf(),
            started: Instant::now(),
            finished,
        });
        Ok(())
    }

    fn stop_recording(&mut self) {
        let mut state = self.rig.lock();
        if state.recording.is_none() {
            state.idle_stops += 1;
            return;
        }
        finish_recording(&mut state);
    }

    fn is_recording(&self) -> bool {
        self.rig.lock().recording.is_some()
    }

    fn recorded_duration(&self) -> Duration {
        let state = self.rig.lock();
        match &state.recording {
            Some(recording) => recording.started.elapsed(),
            None => state.last_duration,
        }
    }

    fn set_torch(&mut self, device: &CaptureDevice, on: bool) -> Result<()> {
        if !device.capabilities.torch {
            bail!("device {} has no torch", device.id);
        }
        self.rig.lock().torch = on;
        Ok(())
    }

    fn preview_handle(&self) -> PreviewHandle {
        PreviewHandle(self.rig.id.clone())
    }
}

struct SimulatedDiscovery {
    rig: SimulatedRig,
}

impl DeviceDiscovery for SimulatedDiscovery {
    fn devices(&self, kind: MediaKind) -> Vec<CaptureDevice> {
        let state = self.rig.lock();
        match kind {
            MediaKind::Video => state.cameras.clone(),
            MediaKind::Audio => state.microphone.iter().cloned().collect(),
        }
    }

    fn default_device(&self, kind: MediaKind) -> Option<CaptureDevice> {
        let state = self.rig.lock();
        match kind {
            MediaKind::Video => state
                .cameras
                .iter()
                .find(|c| c.position == DevicePosition::Back)
                .cloned(),
            MediaKind::Audio => state.microphone.clone(),
        }
    }
}

struct SimulatedPermissions {
    state: Arc<Mutex<RigState>>,
}

#[async_trait]
impl PermissionService for SimulatedPermissions {
    fn status(&self) -> AuthorizationState {
        lock_state(&self.state).permission
    }

    async fn request_access(&self) -> bool {
        let rx = {
            let mut state = lock_state(&self.state);
            state.prompts += 1;
            match state.prompt_behavior {
                PromptBehavior::Grant => {
                    state.permission = AuthorizationState::Authorized;
                    return true;
                }
                PromptBehavior::Deny => {
                    state.permission = AuthorizationState::Denied;
                    return false;
                }
                PromptBehavior::Manual => {
                    let (tx, rx) = oneshot::channel();
                    state.pending_prompt = Some(tx);
                    rx
                }
            }
        };

        let granted = rx.await.unwrap_or(false);
        lock_state(&self.state).permission = if granted {
            AuthorizationState::Authorized
        } else {
            AuthorizationState::Denied
        };
        granted
    }
}

struct SimulatedBackgroundTasks {
    rig: SimulatedRig,
}

impl BackgroundTasks for SimulatedBackgroundTasks {
    fn begin(&self) -> Option<BackgroundTaskId> {
        let mut state = self.rig.lock();
        if !state.grant_background {
            return None;
        }
        let id = state.next_task;
        state.next_task += 1;
        state.active_tasks.insert(id);
        Some(BackgroundTaskId(id))
    }

    fn end(&self, id: BackgroundTaskId) {
        self.rig.lock().active_tasks.remove(&id.0);
    }
}

struct SimulatedPreview {
    rig: SimulatedRig,
}

impl PreviewSink for SimulatedPreview {
    fn attach(&mut self, session: PreviewHandle) {
        self.rig.lock().preview_attached = Some(session);
    }

    fn set_orientation(&mut self, orientation: VideoOrientation) {
        self.rig.lock().preview_orientation = Some(orientation);
    }
}

struct SimulatedRotation {
    rig: SimulatedRig,
}

impl RotationSource for SimulatedRotation {
    fn current(&self) -> DeviceOrientation {
        self.rig.lock().orientation
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<DeviceOrientation> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.rig.lock().rotation_subscribers.push(tx);
        rx
    }
}
