//! Operational-status publication.
//!
//! The manager reports every change of its `operational` flag through the
//! [`StatusSink`] seam. Deployments with a shared-memory status segment or
//! an RPC surface implement the trait against that transport; the built-in
//! [`ProcessStatus`] keeps the answer process-local.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Receiver for operational-status changes.
pub trait StatusSink: Send + Sync {
    /// Called on every change of the manager's `operational` flag.
    fn set_operational(&self, operational: bool);
}

/// Process-local status record.
#[derive(Debug, Default)]
pub struct ProcessStatus {
    operational: AtomicBool,
    last_change: Mutex<Option<DateTime<Utc>>>,
}

impl ProcessStatus {
    /// Creates a status record reporting non-operational.
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently published operational state.
    pub fn is_operational(&self) -> bool {
        self.operational.load(Ordering::Relaxed)
    }

    /// Timestamp of the last published change, if any.
    pub fn last_change(&self) -> Option<DateTime<Utc>> {
        *self
            .last_change
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl StatusSink for ProcessStatus {
    fn set_operational(&self, operational: bool) {
        self.operational.store(operational, Ordering::Relaxed);
        *self
            .last_change
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        tracing::debug!(operational, "status published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_non_operational() {
        let status = ProcessStatus::new();
        assert!(!status.is_operational());
        assert!(status.last_change().is_none());
    }

    #[test]
    fn test_publish_records_change() {
        let status = ProcessStatus::new();
        status.set_operational(true);
        assert!(status.is_operational());
        assert!(status.last_change().is_some());

        status.set_operational(false);
        assert!(!status.is_operational());
    }
}
