//! Picks the capture device for a media kind and position

use std::sync::Arc;
use tracing::debug;

use super::{CaptureDevice, DevicePosition, MediaKind};
use crate::platform::DeviceDiscovery;

/// Selects devices from the enumeration service
#[derive(Clone)]
pub struct DeviceSelector {
    discovery: Arc<dyn DeviceDiscovery>,
}

impl DeviceSelector {
    pub fn new(discovery: Arc<dyn DeviceDiscovery>) -> Self {
        Self { discovery }
    }

    /// First enumerated device of `kind` at exactly `position`, or `None`.
    /// An empty result is a normal outcome, never an error.
    pub fn select(&self, kind: MediaKind, position: DevicePosition) -> Option<CaptureDevice> {
        let device = self
            .discovery
            .devices(kind)
            .into_iter()
            .find(|device| device.kind == kind && device.position == position);

        debug!(
            "Device selection {} @ {}: {:?}",
            kind,
            position,
            device.as_ref().map(|d| d.id.as_str())
        );
        device
    }

    /// Platform default microphone
    pub fn default_audio(&self) -> Option<CaptureDevice> {
        self.discovery.default_device(MediaKind::Audio)
    }
}
