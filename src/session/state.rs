//! Session state machine states and the published snapshot

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;

use super::AuthorizationState;
use crate::device::CameraSelection;
use crate::orientation::RecordingOrientation;
use crate::platform::BackgroundTaskId;

/// Why the session ended up stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Camera permission denied
    Denied,
    /// Initial configuration failed
    ConfigurationFailed,
    /// A camera switch could not reattach inputs. The snapshot keeps
    /// reporting the camera that was switched to.
    SwitchFailed,
    /// Owner tore the session down
    Teardown,
}

/// Capture session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    AwaitingAuthorization,
    Configuring,
    Running,
    Recording,
    SwitchingCamera,
    Stopped(StopReason),
}

impl SessionState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, SessionState::Stopped(_))
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::AwaitingAuthorization => write!(f, "awaiting-authorization"),
            SessionState::Configuring => write!(f, "configuring"),
            SessionState::Running => write!(f, "running"),
            SessionState::Recording => write!(f, "recording"),
            SessionState::SwitchingCamera => write!(f, "switching-camera"),
            SessionState::Stopped(reason) => write!(f, "stopped ({:?})", reason),
        }
    }
}

/// Read-only view published to the UI after each completed transition
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub authorization: AuthorizationState,
    pub is_running: bool,
    pub is_recording: bool,
    pub current_camera: CameraSelection,
    pub torch_on: bool,
}

/// A recording in progress (or awaiting finalization by the sink)
#[derive(Debug, Clone)]
pub struct RecordingSession {
    /// Freshly generated output file
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
    /// Camera that produced the recording
    pub camera: CameraSelection,
    /// Fixed for the whole recording
    pub orientation: RecordingOrientation,
    pub(crate) background_task: Option<BackgroundTaskId>,
    /// Set once the began/finished bookkeeping has run
    pub(crate) ended: bool,
}

impl RecordingSession {
    pub fn new(
        output_path: PathBuf,
        camera: CameraSelection,
        orientation: RecordingOrientation,
        background_task: Option<BackgroundTaskId>,
    ) -> Self {
        Self {
            output_path,
            started_at: Utc::now(),
            camera,
            orientation,
            background_task,
            ended: false,
        }
    }
}
