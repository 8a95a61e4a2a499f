//! camcorder
//!
//! Capture-session state machine for a two-camera device with one
//! microphone: permission gating, session configuration, recording,
//! camera switching, torch control and orientation tracking, all driven
//! from a single serial engine task.

pub mod config;
pub mod device;
pub mod error;
pub mod logging;
pub mod orientation;
pub mod platform;
pub mod session;

pub use config::Config;
pub use device::{CameraSelection, VideoQuality};
pub use error::{CaptureError, CaptureResult};
pub use platform::Platform;
pub use session::{spawn_session, CameraEvent, CameraHandle, CameraObserver, SessionSnapshot};
