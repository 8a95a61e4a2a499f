//! Collaborator traits

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::device::{CaptureDevice, MediaKind};
use crate::orientation::{DeviceOrientation, RecordingOrientation, VideoOrientation};
use crate::session::AuthorizationState;

/// An input attached (or attachable) to the capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInput {
    pub device: CaptureDevice,
}

impl DeviceInput {
    pub fn kind(&self) -> MediaKind {
        self.device.kind
    }
}

/// Continuous modes applied while a device is locked for configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceModes {
    pub continuous_autofocus: bool,
    pub smooth_autofocus: bool,
    pub continuous_auto_exposure: bool,
    pub continuous_auto_white_balance: bool,
}

impl DeviceModes {
    pub fn is_empty(&self) -> bool {
        *self == DeviceModes::default()
    }
}

/// Reported by the output sink once a recording file is finalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutputFinished {
    pub path: PathBuf,
    /// Sink error, if finalizing failed
    pub error: Option<String>,
}

/// Opaque handle a preview surface uses to attach to the live session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewHandle(pub String);

/// Token for a granted background-execution allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub u64);

/// The platform capture session
///
/// All calls happen on the engine's serial context. Configuration calls
/// between `begin_configuration` and `commit_configuration` are applied as
/// one batch and are never observed partially by a running preview.
pub trait SessionBackend: Send {
    fn begin_configuration(&mut self);
    fn commit_configuration(&mut self);

    fn can_set_preset(&self, token: &str) -> bool;
    fn set_preset(&mut self, token: &str);

    /// Lock `device` for configuration and apply `modes`
    fn configure_device(&mut self, device: &CaptureDevice, modes: DeviceModes) -> Result<()>;

    fn create_input(&mut self, device: &CaptureDevice) -> Result<DeviceInput>;
    fn can_add_input(&self, input: &DeviceInput) -> bool;
    fn add_input(&mut self, input: DeviceInput);
    fn remove_input(&mut self, input: &DeviceInput);
    fn inputs(&self) -> Vec<DeviceInput>;

    /// Movie file output
    fn can_add_output(&self) -> bool;
    fn add_output(&mut self);
    fn has_output(&self) -> bool;
    fn output_supports_stabilization(&self) -> bool;
    fn enable_output_stabilization(&mut self);

    /// Shared play-and-record audio session that ducks other audio
    fn configure_audio_session(&mut self) -> Result<()>;

    fn start_running(&mut self);
    fn stop_running(&mut self);
    fn is_running(&self) -> bool;

    /// Begin writing to `path`. The sink reports finalization on `finished`.
    fn start_recording(
        &mut self,
        path: &Path,
        orientation: RecordingOrientation,
        finished: mpsc::UnboundedSender<FileOutputFinished>,
    ) -> Result<()>;
    fn stop_recording(&mut self);
    fn is_recording(&self) -> bool;
    fn recorded_duration(&self) -> Duration;

    fn set_torch(&mut self, device: &CaptureDevice, on: bool) -> Result<()>;

    fn preview_handle(&self) -> PreviewHandle;
}

/// Enumerates capture devices
pub trait DeviceDiscovery: Send + Sync {
    fn devices(&self, kind: MediaKind) -> Vec<CaptureDevice>;
    fn default_device(&self, kind: MediaKind) -> Option<CaptureDevice>;
}

/// Camera usage permission
#[async_trait]
pub trait PermissionService: Send + Sync {
    /// Current status without prompting
    fn status(&self) -> AuthorizationState;

    /// Show the platform prompt and wait for the user's answer
    async fn request_access(&self) -> bool;
}

/// Background-execution allowances. A grant is never guaranteed.
pub trait BackgroundTasks: Send + Sync {
    fn begin(&self) -> Option<BackgroundTaskId>;
    fn end(&self, id: BackgroundTaskId);
}

/// Passive preview surface
pub trait PreviewSink: Send {
    fn attach(&mut self, session: PreviewHandle);
    fn set_orientation(&mut self, orientation: VideoOrientation);
}

/// Device rotation notifications
pub trait RotationSource: Send + Sync {
    fn current(&self) -> DeviceOrientation;

    /// Dropping the receiver cancels the subscription
    fn subscribe(&self) -> mpsc::UnboundedReceiver<DeviceOrientation>;
}
