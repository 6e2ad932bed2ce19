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

use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

/// Atomic cancellation signal shared between the driver and its workers
///
/// # Thread Safety
/// - Uses `AtomicBool` for the cancellation status
/// - `Mutex<Option<String>>` protects the cancellation reason
///
/// Workers poll the token between functions; an analysis already running
/// is allowed to finish.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    reason: Arc<Mutex<Option<String>>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation with an optional reason
    pub fn cancel(&self, reason: Option<&str>) {
        if let Some(reason) = reason {
            *self.reason.lock() = Some(reason.to_string());
        }
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Retrieves the cancellation reason if one was given
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancellationToken::new();
        let worker = token.clone();
        assert!(!worker.is_cancelled());

        token.cancel(Some("interrupted"));
        assert!(worker.is_cancelled());
        assert_eq!(worker.reason().as_deref(), Some("interrupted"));
    }

    #[test]
    fn test_cancel_without_reason() {
        let token = CancellationToken::new();
        token.cancel(None);
        assert!(token.is_cancelled());
        assert!(token.reason().is_none());
    }
}
