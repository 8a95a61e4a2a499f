//! Capture session controller
//!
//! One engine task owns the capture session and processes intents in the
//! order they arrive. Callers hold a `CameraHandle`, fire intents at it and
//! observe results through `CameraEvent`s and published snapshots.

mod authorization;
mod configurator;
mod engine;
mod handle;
mod observer;
mod state;
mod timer;

#[cfg(test)]
mod scenarios;

use std::path::PathBuf;

use crate::device::CameraSelection;
use crate::orientation::DeviceOrientation;

pub use authorization::{AuthorizationGate, AuthorizationState};
pub use configurator::{effective_preset, AttachedDevices, SessionConfigurator};
pub use engine::{create_session_channels, CameraEngine};
pub use handle::{spawn_session, CameraHandle};
pub use observer::{dispatch, pump_events, CameraObserver};
pub use state::{RecordingSession, SessionSnapshot, SessionState, StopReason};
pub use timer::{format_duration, RecordingTimer};

/// Intents sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Start recording; stops an active recording instead
    StartRecording,
    StopRecording,
    SwitchCamera,
    /// Preview double tap gesture
    DoubleTap,
    /// Torch preference for rear camera recordings
    SetFlash(bool),
    /// Layout pass with the interface orientation at that moment
    LayoutChanged(DeviceOrientation),
    /// Tear the session down and stop the engine
    Shutdown,
}

/// Lifecycle events delivered to the observer, in acceptance order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraEvent {
    DidBeginRecording(CameraSelection),
    DidFinishRecording(CameraSelection),
    /// Recorded duration as "MM:SS"
    RecordedDuration(String),
    /// Finalized file; ownership passes to the receiver
    DidFinishProcessing(PathBuf),
    DidFailToRecord(String),
    DidSwitchCamera(CameraSelection),
    DidError(String),
}
