//! Orientation mapping for the preview and the recording stream
//!
//! Raw device rotation readings are mapped independently for the preview
//! surface and for the recording connection. The sensor frame is rotated
//! relative to the display, so landscape left/right swap for recording.

use crate::device::CameraSelection;

/// Raw rotation reading from the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceOrientation {
    #[default]
    Unknown,
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
    FaceUp,
    FaceDown,
}

impl DeviceOrientation {
    /// Face up/down carry no usable rotation
    pub fn is_flat(self) -> bool {
        matches!(self, DeviceOrientation::FaceUp | DeviceOrientation::FaceDown)
    }

    /// Parse the names used by the demo binary
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "portrait" => Some(DeviceOrientation::Portrait),
            "upside-down" => Some(DeviceOrientation::PortraitUpsideDown),
            "landscape-left" => Some(DeviceOrientation::LandscapeLeft),
            "landscape-right" => Some(DeviceOrientation::LandscapeRight),
            "face-up" => Some(DeviceOrientation::FaceUp),
            "face-down" => Some(DeviceOrientation::FaceDown),
            "unknown" => Some(DeviceOrientation::Unknown),
            _ => None,
        }
    }
}

/// Orientation applied to a capture connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoOrientation {
    #[default]
    Portrait,
    PortraitUpsideDown,
    LandscapeLeft,
    LandscapeRight,
}

/// EXIF-style orientation for still-image metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOrientation {
    Up,
    Down,
    Left,
    Right,
    UpMirrored,
    DownMirrored,
    LeftMirrored,
    RightMirrored,
}

/// Orientation and mirroring fixed for the lifetime of one recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingOrientation {
    pub orientation: VideoOrientation,
    /// Mirror horizontally (front camera)
    pub mirrored: bool,
}

/// Preview surface orientation for a rotation reading
pub fn preview_orientation(device: DeviceOrientation) -> VideoOrientation {
    match device {
        DeviceOrientation::Portrait => VideoOrientation::Portrait,
        DeviceOrientation::LandscapeLeft => VideoOrientation::LandscapeLeft,
        DeviceOrientation::LandscapeRight => VideoOrientation::LandscapeRight,
        DeviceOrientation::PortraitUpsideDown => VideoOrientation::PortraitUpsideDown,
        DeviceOrientation::FaceUp | DeviceOrientation::FaceDown | DeviceOrientation::Unknown => {
            VideoOrientation::Portrait
        }
    }
}

/// Recording connection orientation for a rotation reading
pub fn recording_orientation(device: DeviceOrientation) -> VideoOrientation {
    match device {
        DeviceOrientation::LandscapeLeft => VideoOrientation::LandscapeRight,
        DeviceOrientation::LandscapeRight => VideoOrientation::LandscapeLeft,
        DeviceOrientation::PortraitUpsideDown => VideoOrientation::PortraitUpsideDown,
        _ => VideoOrientation::Portrait,
    }
}

/// Still-image orientation for `camera`; `None` means no tracked sample
pub fn image_orientation(device: Option<DeviceOrientation>, camera: CameraSelection) -> ImageOrientation {
    let rear = camera == CameraSelection::Rear;
    match device {
        Some(DeviceOrientation::LandscapeLeft) => {
            if rear {
                ImageOrientation::Up
            } else {
                ImageOrientation::DownMirrored
            }
        }
        Some(DeviceOrientation::LandscapeRight) => {
            if rear {
                ImageOrientation::Down
            } else {
                ImageOrientation::UpMirrored
            }
        }
        Some(DeviceOrientation::PortraitUpsideDown) => {
            if rear {
                ImageOrientation::Left
            } else {
                ImageOrientation::RightMirrored
            }
        }
        _ => {
            if rear {
                ImageOrientation::Right
            } else {
                ImageOrientation::LeftMirrored
            }
        }
    }
}

/// Latest orientation inputs seen by the session
#[derive(Debug, Clone, Default)]
pub struct OrientationTracker {
    tracking: bool,
    /// Last non-flat tracked reading
    sample: Option<DeviceOrientation>,
    /// Orientation reported by the layout pass
    ambient: DeviceOrientation,
    /// What the preview connection currently shows
    preview: VideoOrientation,
}

impl OrientationTracker {
    pub fn new(tracking: bool) -> Self {
        Self {
            tracking,
            ..Self::default()
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Seed the tracked sample when a rotation subscription starts
    pub fn begin_tracking(&mut self, current: DeviceOrientation) {
        self.tracking = true;
        self.sample = None;
        self.record_sample(current);
    }

    /// Drop the tracked sample when the subscription is cancelled
    pub fn end_tracking(&mut self) {
        self.tracking = false;
        self.sample = None;
    }

    /// Store a rotation reading. Flat readings keep the previous sample.
    /// Returns whether the sample changed.
    pub fn record_sample(&mut self, reading: DeviceOrientation) -> bool {
        if !self.tracking || reading.is_flat() {
            return false;
        }
        let changed = self.sample != Some(reading);
        self.sample = Some(reading);
        changed
    }

    pub fn set_ambient(&mut self, ambient: DeviceOrientation) {
        self.ambient = ambient;
    }

    pub fn sample(&self) -> Option<DeviceOrientation> {
        if self.tracking {
            self.sample
        } else {
            None
        }
    }

    fn effective(&self) -> DeviceOrientation {
        self.sample().unwrap_or(self.ambient)
    }

    /// Compute the preview orientation and remember it as the connection's
    pub fn update_preview(&mut self) -> VideoOrientation {
        self.preview = preview_orientation(self.effective());
        self.preview
    }

    pub fn preview(&self) -> VideoOrientation {
        self.preview
    }

    /// Snapshot for a recording about to start. Without a tracked sample the
    /// preview connection's orientation is reused.
    pub fn recording_snapshot(&self, camera: CameraSelection) -> RecordingOrientation {
        let orientation = match self.sample() {
            Some(sample) => recording_orientation(sample),
            None => self.preview,
        };
        RecordingOrientation {
            orientation,
            mirrored: camera == CameraSelection::Front,
        }
    }

    pub fn image_orientation(&self, camera: CameraSelection) -> ImageOrientation {
        image_orientation(self.sample(), camera)
    }
}
