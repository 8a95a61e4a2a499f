//! Capture devices, camera selection and quality presets

mod selector;

pub use selector::DeviceSelector;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Media kind a device produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Physical position of a device on the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DevicePosition {
    Front,
    Back,
    /// Microphones and external devices
    Unspecified,
}

impl fmt::Display for DevicePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevicePosition::Front => write!(f, "front"),
            DevicePosition::Back => write!(f, "back"),
            DevicePosition::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Which of the two cameras is active
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraSelection {
    #[default]
    Rear,
    Front,
}

impl CameraSelection {
    /// The other camera
    pub fn toggled(self) -> Self {
        match self {
            CameraSelection::Rear => CameraSelection::Front,
            CameraSelection::Front => CameraSelection::Rear,
        }
    }

    pub fn position(self) -> DevicePosition {
        match self {
            CameraSelection::Rear => DevicePosition::Back,
            CameraSelection::Front => DevicePosition::Front,
        }
    }
}

impl fmt::Display for CameraSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraSelection::Rear => write!(f, "rear"),
            CameraSelection::Front => write!(f, "front"),
        }
    }
}

/// Quality tier of the capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoQuality {
    #[default]
    High,
    Medium,
    Low,
    #[serde(rename = "352x288")]
    Resolution352x288,
    #[serde(rename = "640x480")]
    Resolution640x480,
    #[serde(rename = "1280x720")]
    Resolution1280x720,
    #[serde(rename = "1920x1080")]
    Resolution1920x1080,
    #[serde(rename = "3840x2160")]
    Resolution3840x2160,
    #[serde(rename = "iframe-960x540")]
    IFrame960x540,
    #[serde(rename = "iframe-1280x720")]
    IFrame1280x720,
}

impl VideoQuality {
    /// Tier every camera is known to support; the front camera is pinned to it
    pub const HIGH_COMPATIBILITY: VideoQuality = VideoQuality::High;

    /// Platform token understood by the session backend
    pub fn preset_token(self) -> &'static str {
        match self {
            VideoQuality::High => "AVCaptureSessionPresetHigh",
            VideoQuality::Medium => "AVCaptureSessionPresetMedium",
            VideoQuality::Low => "AVCaptureSessionPresetLow",
            VideoQuality::Resolution352x288 => "AVCaptureSessionPreset352x288",
            VideoQuality::Resolution640x480 => "AVCaptureSessionPreset640x480",
            // 1280x720 capture goes through the iFrame preset
            VideoQuality::Resolution1280x720 => "AVCaptureSessionPresetiFrame1280x720",
            VideoQuality::Resolution1920x1080 => "AVCaptureSessionPreset1920x1080",
            VideoQuality::Resolution3840x2160 => "AVCaptureSessionPreset3840x2160",
            VideoQuality::IFrame960x540 => "AVCaptureSessionPresetiFrame960x540",
            VideoQuality::IFrame1280x720 => "AVCaptureSessionPresetiFrame1280x720",
        }
    }
}

/// A camera or microphone reported by device discovery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureDevice {
    /// Stable unique identifier
    pub id: String,
    /// Human readable name
    pub name: String,
    pub kind: MediaKind,
    pub position: DevicePosition,
    pub capabilities: DeviceCapabilities,
}

/// Optional features a device may support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceCapabilities {
    pub continuous_autofocus: bool,
    pub smooth_autofocus: bool,
    pub continuous_auto_exposure: bool,
    pub continuous_auto_white_balance: bool,
    pub torch: bool,
}

impl DeviceCapabilities {
    /// Capabilities of a typical phone camera
    pub fn full() -> Self {
        Self {
            continuous_autofocus: true,
            smooth_autofocus: true,
            continuous_auto_exposure: true,
            continuous_auto_white_balance: true,
            torch: true,
        }
    }
}

impl CaptureDevice {
    pub fn camera(id: impl Into<String>, name: impl Into<String>, position: DevicePosition) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: MediaKind::Video,
            position,
            capabilities: DeviceCapabilities::full(),
        }
    }

    pub fn microphone(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: MediaKind::Audio,
            position: DevicePosition::Unspecified,
            capabilities: DeviceCapabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: DeviceCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}
