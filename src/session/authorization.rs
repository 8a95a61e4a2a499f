//! Camera permission gate
//!
//! Session startup is serialized behind the permission decision. The first
//! caller on an undetermined permission shows the platform prompt; every
//! other caller (including clones of the gate) waits for that same answer.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::platform::PermissionService;

/// Camera usage permission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthorizationState {
    #[default]
    Undetermined,
    Authorized,
    Denied,
}

impl AuthorizationState {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, AuthorizationState::Undetermined)
    }
}

/// Resolves the permission at most once per gate family
#[derive(Clone)]
pub struct AuthorizationGate {
    service: Arc<dyn PermissionService>,
    resolved: Arc<OnceCell<AuthorizationState>>,
}

impl AuthorizationGate {
    pub fn new(service: Arc<dyn PermissionService>) -> Self {
        Self {
            service,
            resolved: Arc::new(OnceCell::new()),
        }
    }

    /// Last known state without prompting
    pub fn state(&self) -> AuthorizationState {
        match self.resolved.get() {
            Some(state) => *state,
            None => self.service.status(),
        }
    }

    /// Return the resolved permission, prompting exactly once if undetermined
    pub async fn check_and_request(&self) -> AuthorizationState {
        let service = self.service.clone();
        *self
            .resolved
            .get_or_init(|| async move {
                let status = service.status();
                if status.is_resolved() {
                    return status;
                }

                info!("Camera permission undetermined, requesting access...");
                if service.request_access().await {
                    info!("Camera access granted");
                    AuthorizationState::Authorized
                } else {
                    warn!("Camera access denied");
                    AuthorizationState::Denied
                }
            })
            .await
    }
}
