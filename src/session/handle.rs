//! UI-side handle to a running camera engine

use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tracing::debug;

use super::{create_session_channels, CameraEngine, CameraEvent, SessionCommand, SessionSnapshot};
use crate::config::Config;
use crate::device::CameraSelection;
use crate::orientation::DeviceOrientation;
use crate::platform::Platform;

/// Spawn the engine on the current runtime.
///
/// Returns the handle for intents and the receiver the single observer
/// drains. The engine tears the session down once every handle is dropped.
pub fn spawn_session(
    config: Config,
    platform: Platform,
) -> (CameraHandle, mpsc::UnboundedReceiver<CameraEvent>) {
    let (cmd_tx, cmd_rx, event_tx, event_rx, snapshot_tx, snapshot_rx) = create_session_channels();
    let engine = CameraEngine::new(config, platform, cmd_rx, event_tx, snapshot_tx);
    tokio::spawn(engine.run());

    (
        CameraHandle {
            cmd_tx,
            snapshot_rx,
        },
        event_rx,
    )
}

/// Fire-and-forget intents plus read-only session snapshots
#[derive(Clone)]
pub struct CameraHandle {
    cmd_tx: mpsc::UnboundedSender<SessionCommand>,
    snapshot_rx: watch::Receiver<SessionSnapshot>,
}

impl CameraHandle {
    fn send(&self, cmd: SessionCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            debug!("Camera engine already stopped, intent dropped");
        }
    }

    /// Start recording, or stop if a recording is active
    pub fn start_recording(&self) {
        self.send(SessionCommand::StartRecording);
    }

    pub fn stop_recording(&self) {
        self.send(SessionCommand::StopRecording);
    }

    pub fn switch_camera(&self) {
        self.send(SessionCommand::SwitchCamera);
    }

    pub fn double_tap(&self) {
        self.send(SessionCommand::DoubleTap);
    }

    pub fn set_flash(&self, enabled: bool) {
        self.send(SessionCommand::SetFlash(enabled));
    }

    pub fn layout_changed(&self, orientation: DeviceOrientation) {
        self.send(SessionCommand::LayoutChanged(orientation));
    }

    pub fn shutdown(&self) {
        self.send(SessionCommand::Shutdown);
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.snapshot_rx.borrow().is_running
    }

    pub fn is_recording(&self) -> bool {
        self.snapshot_rx.borrow().is_recording
    }

    pub fn current_camera(&self) -> CameraSelection {
        self.snapshot_rx.borrow().current_camera
    }

    /// Stream of snapshots, starting with the current one
    pub fn snapshots(&self) -> WatchStream<SessionSnapshot> {
        WatchStream::new(self.snapshot_rx.clone())
    }

    /// Wait until a published snapshot satisfies `predicate`.
    /// Returns `None` if the engine exits first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        let mut rx = self.snapshot_rx.clone();
        let result = rx.wait_for(|snapshot| predicate(snapshot)).await;
        result.ok().map(|snapshot| snapshot.clone())
    }

    /// Resolves once the engine has stopped
    pub async fn closed(&self) {
        self.cmd_tx.closed().await;
    }
}
