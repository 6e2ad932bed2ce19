// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Progress event stream for integrating user interfaces

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

/// Default capacity of the progress broadcast channel
pub const DEFAULT_PROGRESS_CAPACITY: usize = 1024;

/// Analysis phase reported by a progress event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Parse,
    Type,
    Cfg,
    Dataflow,
    Concurrency,
    Optimization,
    Verify,
    Aggregate,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Parse => "parse",
            Phase::Type => "type",
            Phase::Cfg => "cfg",
            Phase::Dataflow => "dataflow",
            Phase::Concurrency => "concurrency",
            Phase::Optimization => "optimization",
            Phase::Verify => "verify",
            Phase::Aggregate => "aggregate",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single progress record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub current: usize,
    pub total: usize,
    pub message: String,
}

/// Sender side of the progress stream
///
/// Emitting without subscribers is a no-op, so the engine can report
/// unconditionally.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    sender: Option<broadcast::Sender<ProgressEvent>>,
}

impl ProgressReporter {
    /// Create a reporter backed by a broadcast channel
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender: Some(sender) }
    }

    /// Create a reporter that drops every event
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Subscribe to the stream
    pub fn subscribe(&self) -> Option<broadcast::Receiver<ProgressEvent>> {
        self.sender.as_ref().map(|sender| sender.subscribe())
    }

    /// Emit an event
    pub fn emit(&self, phase: Phase, current: usize, total: usize, message: impl Into<String>) {
        if let Some(sender) = &self.sender {
            // A send error only means nobody is listening
            let _ = sender.send(ProgressEvent {
                phase,
                current,
                total,
                message: message.into(),
            });
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.sender.is_some()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_reach_subscribers() {
        let reporter = ProgressReporter::new(16);
        let mut receiver = reporter.subscribe().unwrap();

        reporter.emit(Phase::Parse, 1, 2, "main.go");
        reporter.emit(Phase::Aggregate, 2, 2, "done");

        let first = receiver.try_recv().unwrap();
        assert_eq!(first.phase, Phase::Parse);
        assert_eq!(first.message, "main.go");
        assert_eq!(receiver.try_recv().unwrap().phase, Phase::Aggregate);
    }

    #[test]
    fn test_disabled_reporter() {
        let reporter = ProgressReporter::disabled();
        assert!(reporter.subscribe().is_none());
        reporter.emit(Phase::Cfg, 0, 0, "ignored");
    }

    #[test]
    fn test_phase_serialization() {
        let event = ProgressEvent {
            phase: Phase::Dataflow,
            current: 3,
            total: 9,
            message: "main.f".to_string(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"phase\":\"dataflow\""));
    }
}
