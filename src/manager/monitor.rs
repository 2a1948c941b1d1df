//! Bounded startup monitor.
//!
//! Until every DRNG instance is fully seeded, a background task
//! periodically nudges the sources' `monitor` hooks so slow collectors
//! keep pulling samples. The loop is bounded: after the configured budget
//! it gives up with a warning. Failing to reach full seeding here is not
//! fatal; later entropy arrivals can still promote through the normal
//! trigger path.

use std::sync::{Arc, PoisonError};

use crate::error::Error;
use crate::manager::Manager;

impl Manager {
    /// Spawns the startup monitor task. Returns
    /// [`Error::AlreadyInitialized`] if the monitor is already running.
    pub fn monitor_initialize(self: &Arc<Self>) -> Result<(), Error> {
        let mut slot = self
            .monitor_thread_cell()
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let mgr = Arc::clone(self);
        let handle = std::thread::Builder::new()
            .name("es-monitor".into())
            .spawn(move || mgr.monitor_loop())?;
        *slot = Some(handle);
        Ok(())
    }

    /// Monitor body: one iteration per quantum within the configured
    /// budget. The sleep quantum is coarse on purpose; the task polls the
    /// termination flag between iterations instead of being interruptible
    /// mid-sleep.
    fn monitor_loop(&self) {
        let quantum = self.config().monitor.quantum();
        let iterations = self.config().monitor.iterations();
        tracing::debug!(iterations, ?quantum, "full entropy monitor started");

        for _ in 0..iterations {
            if self.terminated() {
                return;
            }

            if self.state_all_nodes_seeded() {
                tracing::info!("stopping entropy monitor");
                return;
            }

            for es in self.registry().iter() {
                es.monitor();
            }

            std::thread::sleep(quantum);
        }

        tracing::warn!("entropy monitor terminated: did not collect sufficient entropy");
    }
}
