//! Platform collaborators consumed by the capture core
//!
//! The core never talks to camera hardware directly. Everything it needs
//! from the platform goes through the traits in this module: the capture
//! session handle, device enumeration, the permission prompt, background
//! execution allowances, the preview surface and rotation notifications.

mod backend;
pub mod simulated;

pub use backend::*;

use std::sync::Arc;

use crate::session::AuthorizationGate;

/// Every collaborator the engine needs, bundled for construction
///
/// Build every `Platform` of a process from one `AuthorizationGate` (clones
/// share it) so all sessions wait on a single permission prompt.
pub struct Platform {
    pub backend: Box<dyn SessionBackend>,
    pub discovery: Arc<dyn DeviceDiscovery>,
    pub authorization: AuthorizationGate,
    pub background: Arc<dyn BackgroundTasks>,
    pub preview: Box<dyn PreviewSink>,
    pub rotation: Arc<dyn RotationSource>,
}
