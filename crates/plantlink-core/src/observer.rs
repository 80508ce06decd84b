//! Notifications from the cloud clients.

use log::{debug, error, info};

/// Receives cloud task notifications; every method defaults to a no-op.
pub trait TelemetryObserver {
    fn on_event(&mut self, task: &str, message: &str, code: i32) {
        let _ = (task, message, code);
    }

    fn on_debug(&mut self, task: &str, message: &str) {
        let _ = (task, message);
    }

    fn on_error(&mut self, task: &str, message: &str, code: i32) {
        let _ = (task, message, code);
    }

    fn on_payload(&mut self, task: &str, payload: &str) {
        let _ = (task, payload);
    }
}

/// Forwards every notification to the `log` facade.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogObserver;

impl TelemetryObserver for LogObserver {
    fn on_event(&mut self, task: &str, message: &str, code: i32) {
        info!("cloud: event task={} msg={} code={}", task, message, code);
    }

    fn on_debug(&mut self, task: &str, message: &str) {
        debug!("cloud: debug task={} msg={}", task, message);
    }

    fn on_error(&mut self, task: &str, message: &str, code: i32) {
        error!("cloud: error task={} msg={} code={}", task, message, code);
    }

    fn on_payload(&mut self, task: &str, payload: &str) {
        info!("cloud: task={} payload={}", task, payload);
    }
}
