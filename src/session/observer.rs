//! Observer with optional handlers

use std::path::PathBuf;
use tokio::sync::mpsc;

use super::CameraEvent;
use crate::device::CameraSelection;

/// Receives camera events. Every handler defaults to a no-op.
pub trait CameraObserver: Send {
    fn did_begin_recording(&mut self, _camera: CameraSelection) {}

    fn did_finish_recording(&mut self, _camera: CameraSelection) {}

    fn recorded_duration(&mut self, _formatted: &str) {}

    /// The file now belongs to the observer
    fn did_finish_processing(&mut self, _file: PathBuf) {}

    fn did_fail_to_record(&mut self, _detail: &str) {}

    fn did_switch_camera(&mut self, _camera: CameraSelection) {}

    fn did_error(&mut self, _message: &str) {}
}

/// Route one event to the matching handler
pub fn dispatch(observer: &mut dyn CameraObserver, event: CameraEvent) {
    match event {
        CameraEvent::DidBeginRecording(camera) => observer.did_begin_recording(camera),
        CameraEvent::DidFinishRecording(camera) => observer.did_finish_recording(camera),
        CameraEvent::RecordedDuration(formatted) => observer.recorded_duration(&formatted),
        CameraEvent::DidFinishProcessing(file) => observer.did_finish_processing(file),
        CameraEvent::DidFailToRecord(detail) => observer.did_fail_to_record(&detail),
        CameraEvent::DidSwitchCamera(camera) => observer.did_switch_camera(camera),
        CameraEvent::DidError(message) => observer.did_error(&message),
    }
}

/// Drain events into `observer` until the engine goes away
pub async fn pump_events(
    mut events: mpsc::UnboundedReceiver<CameraEvent>,
    observer: &mut dyn CameraObserver,
) {
    while let Some(event) = events.recv().await {
        dispatch(observer, event);
    }
}
