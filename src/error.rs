//! Error taxonomy for the capture session
//!
//! Every failure the core can hit is surfaced to the UI as an event; these
//! variants classify them. Collaborator traits use `anyhow::Result` and are
//! converted into `CaptureError` at the configurator boundary.

use thiserror::Error;

use crate::device::{DevicePosition, MediaKind};

/// Failure classes surfaced by the capture core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Camera permission was denied. Terminal for the session's lifetime.
    #[error("camera access not authorized")]
    NotAuthorized,

    /// The device or session refused a required input or output
    #[error("session configuration failed: {0}")]
    ConfigurationFailed(String),

    /// No device matched the requested kind and position
    #[error("no {kind} device available at position {position}")]
    DeviceUnavailable {
        kind: MediaKind,
        position: DevicePosition,
    },

    /// The output sink reported an error when finishing the file
    #[error("recording failed: {0}")]
    RecordingFailed(String),
}

impl CaptureError {
    /// Message shown to the user through `didError`
    pub fn user_message(&self) -> String {
        match self {
            CaptureError::NotAuthorized => {
                "App doesn't have permission to use the camera, please change privacy settings"
                    .to_string()
            }
            CaptureError::ConfigurationFailed(_) | CaptureError::DeviceUnavailable { .. } => {
                "Unable to capture video".to_string()
            }
            CaptureError::RecordingFailed(detail) => detail.clone(),
        }
    }

    /// Missing video escalates to a configuration failure; audio absence
    /// never reaches this point because it degrades silently.
    pub fn into_configuration_failure(self) -> Self {
        match self {
            CaptureError::DeviceUnavailable { .. } => {
                CaptureError::ConfigurationFailed(self.to_string())
            }
            other => other,
        }
    }
}

pub type CaptureResult<T> = Result<T, CaptureError>;
