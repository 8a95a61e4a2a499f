//! Session configuration batches
//!
//! Every change to the session's preset, inputs and output goes through
//! here, bracketed by begin/commit so a running preview never sees a
//! partial input set.

use tracing::{debug, info, warn};

use crate::device::{CameraSelection, CaptureDevice, DeviceSelector, MediaKind, VideoQuality};
use crate::error::{CaptureError, CaptureResult};
use crate::platform::{DeviceModes, SessionBackend};

/// What a successful batch attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedDevices {
    pub camera: CameraSelection,
    pub video: CaptureDevice,
    /// `None` when the session degraded to video-only
    pub audio: Option<CaptureDevice>,
    pub preset: VideoQuality,
}

/// Preset actually applied for `camera`.
///
/// The front camera is pinned to the high-compatibility tier. The rear camera
/// gets the requested tier unless the session cannot support it.
pub fn effective_preset(
    camera: CameraSelection,
    requested: VideoQuality,
    backend: &dyn SessionBackend,
) -> VideoQuality {
    match camera {
        CameraSelection::Front => VideoQuality::HIGH_COMPATIBILITY,
        CameraSelection::Rear if backend.can_set_preset(requested.preset_token()) => requested,
        CameraSelection::Rear => {
            warn!(
                "Session cannot use preset {}, falling back to {}",
                requested.preset_token(),
                VideoQuality::HIGH_COMPATIBILITY.preset_token()
            );
            VideoQuality::HIGH_COMPATIBILITY
        }
    }
}

/// Applies configuration batches to the capture session
pub struct SessionConfigurator {
    selector: DeviceSelector,
    quality: VideoQuality,
    wants_audio: bool,
}

impl SessionConfigurator {
    pub fn new(selector: DeviceSelector, quality: VideoQuality, wants_audio: bool) -> Self {
        Self {
            selector,
            quality,
            wants_audio,
        }
    }

    /// Full configuration: preset, inputs and, on first use, the movie output
    pub fn apply_configuration(
        &self,
        backend: &mut dyn SessionBackend,
        camera: CameraSelection,
    ) -> CaptureResult<AttachedDevices> {
        info!("Configuring session for {} camera", camera);

        backend.begin_configuration();
        let result = self.attach_inputs(backend, camera);
        if result.is_ok() && !backend.has_output() {
            attach_output(backend);
        }
        backend.commit_configuration();

        result
    }

    /// Replace every input with the ones for `target` in one batch.
    ///
    /// The old inputs are gone before the new ones are added, so the session
    /// never holds two video inputs. The output sink is left untouched.
    pub fn reconfigure_inputs(
        &self,
        backend: &mut dyn SessionBackend,
        target: CameraSelection,
    ) -> CaptureResult<AttachedDevices> {
        info!("Reattaching inputs for {} camera", target);

        backend.begin_configuration();
        for input in backend.inputs() {
            debug!("Removing input {}", input.device.id);
            backend.remove_input(&input);
        }
        let result = self.attach_inputs(backend, target);
        backend.commit_configuration();

        result
    }

    fn attach_inputs(
        &self,
        backend: &mut dyn SessionBackend,
        camera: CameraSelection,
    ) -> CaptureResult<AttachedDevices> {
        let preset = effective_preset(camera, self.quality, backend);
        backend.set_preset(preset.preset_token());

        let video = self.attach_video(backend, camera)?;

        let audio = if self.wants_audio {
            self.attach_audio(backend)
        } else {
            None
        };

        Ok(AttachedDevices {
            camera,
            video,
            audio,
            preset,
        })
    }

    fn attach_video(
        &self,
        backend: &mut dyn SessionBackend,
        camera: CameraSelection,
    ) -> CaptureResult<CaptureDevice> {
        let position = camera.position();
        let device = self
            .selector
            .select(MediaKind::Video, position)
            .ok_or(CaptureError::DeviceUnavailable {
                kind: MediaKind::Video,
                position,
            })
            .map_err(CaptureError::into_configuration_failure)?;

        let modes = continuous_modes(&device);
        if !modes.is_empty() {
            if let Err(e) = backend.configure_device(&device, modes) {
                warn!("Error locking {} for configuration: {}", device.id, e);
            }
        }

        let input = backend.create_input(&device).map_err(|e| {
            CaptureError::ConfigurationFailed(format!(
                "could not create video input for {}: {}",
                device.id, e
            ))
        })?;

        if !backend.can_add_input(&input) {
            return Err(CaptureError::ConfigurationFailed(format!(
                "session refused video input {}",
                device.id
            )));
        }
        backend.add_input(input);
        info!("Attached video input {} ({})", device.name, device.id);

        Ok(device)
    }

    fn attach_audio(&self, backend: &mut dyn SessionBackend) -> Option<CaptureDevice> {
        let Some(device) = self.selector.default_audio() else {
            warn!("No microphone available, recording video only");
            return None;
        };

        let input = match backend.create_input(&device) {
            Ok(input) => input,
            Err(e) => {
                warn!("Could not create audio input: {}", e);
                return None;
            }
        };

        if !backend.can_add_input(&input) {
            warn!("Could not add audio input {} to the session", device.id);
            return None;
        }
        backend.add_input(input);
        debug!("Attached audio input {}", device.id);

        Some(device)
    }
}

fn attach_output(backend: &mut dyn SessionBackend) {
    if !backend.can_add_output() {
        warn!("Session refused the movie file output");
        return;
    }
    backend.add_output();
    if backend.output_supports_stabilization() {
        backend.enable_output_stabilization();
    }
    debug!("Movie file output attached");
}

/// Continuous focus/exposure/white-balance modes the device supports
fn continuous_modes(device: &CaptureDevice) -> DeviceModes {
    let caps = device.capabilities;
    DeviceModes {
        continuous_autofocus: caps.continuous_autofocus,
        smooth_autofocus: caps.continuous_autofocus && caps.smooth_autofocus,
        continuous_auto_exposure: caps.continuous_auto_exposure,
        continuous_auto_white_balance: caps.continuous_auto_white_balance,
    }
}
