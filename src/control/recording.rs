//! In-process supervisor that records calls instead of running anything

use std::sync::Mutex;

use super::{ControlError, Supervisor};

/// One recorded facade call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Launch { config: String },
    Control { config: String, args: Vec<String> },
    SpawnDetached { config: String, args: Vec<String> },
}

/// Mock supervisor for tests; every call returns `exit_code`
#[derive(Debug, Default)]
pub struct RecordingSupervisor {
    calls: Mutex<Vec<RecordedCall>>,
    exit_code: i32,
}

impl RecordingSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer launch/control calls with this status
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = code;
        self
    }

    /// Calls made so far, in order
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: RecordedCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Supervisor for RecordingSupervisor {
    fn launch(&self, config: &str) -> Result<i32, ControlError> {
        self.record(RecordedCall::Launch {
            config: config.to_string(),
        });
        Ok(self.exit_code)
    }

    fn control(&self, config: &str, args: &[String]) -> Result<i32, ControlError> {
        self.record(RecordedCall::Control {
            config: config.to_string(),
            args: args.to_vec(),
        });
        Ok(self.exit_code)
    }

    fn spawn_detached(&self, config: &str, args: &[String]) -> Result<(), ControlError> {
        self.record(RecordedCall::SpawnDetached {
            config: config.to_string(),
            args: args.to_vec(),
        });
        Ok(())
    }
}
