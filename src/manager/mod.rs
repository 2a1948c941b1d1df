//! Entropy source manager: lifecycle, seeding state, reseed coordination.
//!
//! The manager is the process-wide singleton owning the source registry,
//! the seed-level state machine and the reseed gate. It is created once by
//! [`Manager::initialize`], handed around as an explicit [`Arc`] handle,
//! and torn down by [`Manager::finalize`].

mod accounting;
mod monitor;
mod reseed;
mod state;

use std::sync::atomic::AtomicU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use zeroize::Zeroizing;

use crate::buffer::EntropyBuffer;
use crate::config::{Config, MAX_DIGEST_SIZE_BITS};
use crate::drng::DrngWorker;
use crate::error::Error;
use crate::sources::{AuxPool, EntropySource, SourceRegistry};
use crate::status::StatusSink;
use crate::wait::WaitQueue;

use state::SeedState;

// Bootstrap seed payload: one word per 64 bits of the largest digest.
const BOOTSTRAP_WORDS: usize = (MAX_DIGEST_SIZE_BITS as usize) / 64;

/// Process-wide entropy source manager.
pub struct Manager {
    config: Config,
    registry: SourceRegistry,
    aux: Arc<AuxPool>,
    drng: Arc<dyn DrngWorker>,
    status: Arc<dyn StatusSink>,
    state: SeedState,
    write_wakeup_bits: AtomicU32,
    init_wait: WaitQueue,
    writer_wait: WaitQueue,
    monitor_thread: Mutex<Option<JoinHandle<()>>>,
}

impl Manager {
    /// Creates the manager, runs every source's `init` hook and injects
    /// the bootstrap seed into the auxiliary pool.
    ///
    /// The first source whose `init` hook fails aborts initialization;
    /// later sources are not initialized.
    pub fn initialize(
        config: Config,
        sources: Vec<Box<dyn EntropySource>>,
        drng: Arc<dyn DrngWorker>,
        status: Arc<dyn StatusSink>,
    ) -> Result<Arc<Self>, Error> {
        config.validate()?;
        tracing::info!("initializing entropy source manager");

        let aux = Arc::new(AuxPool::new(config.aux.clone()));
        let registry = SourceRegistry::new(sources, Arc::clone(&aux));
        let write_wakeup_bits = AtomicU32::new(config.write_wakeup_bits());

        let mgr = Arc::new(Self {
            state: SeedState::new(),
            write_wakeup_bits,
            init_wait: WaitQueue::new(),
            writer_wait: WaitQueue::new(),
            monitor_thread: Mutex::new(None),
            config,
            registry,
            aux,
            drng,
            status,
        });

        mgr.set_entropy_thresh(mgr.seed_entropy_osr(false));

        for es in mgr.registry.iter() {
            tracing::debug!(source = es.name(), "initializing entropy source");
            if let Err(e) = es.init() {
                tracing::error!(
                    source = es.name(),
                    error = %e,
                    "entropy source initialization failed"
                );
                return Err(e);
            }
        }

        mgr.inject_bootstrap_seed();
        mgr.state.set_available(true);
        Ok(mgr)
    }

    /// Requests cooperative shutdown: sets the termination flag and
    /// releases every blocked waiter.
    pub fn request_shutdown(&self) {
        self.state.set_terminate();
        self.init_wait.wake_all();
        self.writer_wait.wake_all();
    }

    /// Tears the manager down: terminates background loops, joins the
    /// startup monitor, then runs every source's `fini` hook.
    pub fn finalize(&self) {
        tracing::info!("finalizing entropy source manager");
        self.request_shutdown();

        let handle = self
            .monitor_thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::warn!("startup monitor thread panicked");
            }
        }

        for es in self.registry.iter() {
            es.fini();
        }
    }

    /// Inserts externally-provided data into the auxiliary pool with the
    /// given entropy credit and re-runs the reseed trigger.
    pub fn insert_aux(&self, data: &[u8], entropy_bits: u32) {
        self.aux.insert(data, entropy_bits);
        self.add_entropy();
    }

    /// Blocks until the manager reports operational, up to `timeout`.
    pub fn wait_until_operational(&self, timeout: Duration) -> Result<(), Error> {
        let satisfied = self.init_wait.wait_timeout_for(
            || self.state_operational() || self.terminated(),
            timeout,
        );
        if self.terminated() {
            return Err(Error::Shutdown);
        }
        if !satisfied {
            return Err(Error::Timeout(timeout));
        }
        Ok(())
    }

    /// Logs a diagnostic when a named caller runs before the minimal seed
    /// level is reached.
    pub fn report_seedlevel(&self, name: &str) {
        if !self.state_min_seeded() {
            tracing::debug!(
                caller = name,
                available_bits = self.avail_entropy(),
                "called without reaching minimally seeded level"
            );
        }
    }

    /// Sum of per-slot entropy credits in a seed buffer; the
    /// authoritative figure for the reseed event the buffer belongs to.
    pub fn entropy_rate_eb(&self, eb: &EntropyBuffer) -> u32 {
        eb.credited_bits()
    }

    /// Number of registered sources, including the auxiliary pool.
    pub fn source_count(&self) -> usize {
        self.registry.len()
    }

    /// Whether the manager has been asked to terminate.
    pub fn terminated(&self) -> bool {
        self.state.terminate()
    }

    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub(crate) fn status(&self) -> &dyn StatusSink {
        self.status.as_ref()
    }

    pub(crate) fn seed_state(&self) -> &SeedState {
        &self.state
    }

    pub(crate) fn init_wait(&self) -> &WaitQueue {
        &self.init_wait
    }

    pub(crate) fn writer_wait(&self) -> &WaitQueue {
        &self.writer_wait
    }

    pub(crate) fn write_wakeup_bits_cell(&self) -> &AtomicU32 {
        &self.write_wakeup_bits
    }

    pub(crate) fn drng_worker(&self) -> &dyn DrngWorker {
        self.drng.as_ref()
    }

    pub(crate) fn monitor_thread_cell(&self) -> &Mutex<Option<JoinHandle<()>>> {
        &self.monitor_thread
    }

    /// Builds the bootstrap record `{wall time, N words}` and folds it
    /// into the auxiliary pool. The record is credited zero bits: it only
    /// guarantees the pool never starts from an all-zero state.
    fn inject_bootstrap_seed(&self) {
        let mut record = Zeroizing::new(Vec::with_capacity(8 + BOOTSTRAP_WORDS * 8));
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        record.extend_from_slice(&now_secs.to_ne_bytes());
        for _ in 0..BOOTSTRAP_WORDS {
            record.extend_from_slice(&bootstrap_word().to_ne_bytes());
        }
        self.insert_aux(&record, 0);
        tracing::debug!("bootstrap seed injected into aux pool");
    }
}

/// One bootstrap word: a CPU-random value when the instruction exists,
/// else the realtime clock's nanosecond field.
fn bootstrap_word() -> u64 {
    #[cfg(feature = "es-cpu")]
    if let Some(word) = crate::sources::cpu::random_word() {
        return word;
    }
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0)
}


#[cfg(test)]
mod tests {
    use super::testutil::manager_with;
    use super::*;
    use crate::sources::MockSource;

    #[test]
    fn test_initialize_sets_initial_threshold() {
        let fx = manager_with(vec![Box::new(MockSource::with_entropy("mock", 0))]);
        assert_eq!(
            fx.mgr.boot_entropy_thresh(),
            fx.mgr.seed_entropy_osr(false)
        );
        assert!(!fx.mgr.state_operational());
    }

    #[test]
    fn test_source_init_failure_aborts_and_short_circuits() {
        let drng = Arc::new(crate::drng::DrngPool::new(1));
        let status = Arc::new(crate::status::ProcessStatus::new());
        let after = Arc::new(MockSource::with_entropy("after", 10));

        let result = Manager::initialize(
            Config::default(),
            vec![
                Box::new(MockSource::failing_init("bad")),
                Box::new(Arc::clone(&after)),
            ],
            drng,
            status,
        );
        assert!(matches!(result, Err(Error::SourceInit { name: "bad", .. })));
        // Sources after the failing one were never initialized.
        assert_eq!(after.init_count(), 0);
    }

    #[test]
    fn test_bootstrap_seed_is_uncredited() {
        let fx = manager_with(vec![]);
        // Only the aux source is registered and the bootstrap record
        // carries no credit, so no entropy is available.
        assert_eq!(fx.mgr.avail_entropy(), 0);
        assert_eq!(fx.mgr.avail_entropy_aux(), 0);
    }

    #[test]
    fn test_finalize_sets_terminate_and_runs_fini() {
        let fx = manager_with(vec![Box::new(MockSource::with_entropy("mock", 0))]);
        assert!(!fx.mgr.terminated());
        fx.mgr.finalize();
        assert!(fx.mgr.terminated());
    }

    #[test]
    fn test_report_seedlevel_before_min_seeded() {
        let fx = manager_with(vec![Box::new(MockSource::with_entropy("mock", 0))]);
        // Diagnostic only; must not disturb state.
        fx.mgr.report_seedlevel("getrandom");
        assert!(!fx.mgr.state_min_seeded());
    }

    #[test]
    fn test_wait_until_operational_times_out() {
        let fx = manager_with(vec![Box::new(MockSource::with_entropy("mock", 0))]);
        let result = fx.mgr.wait_until_operational(Duration::from_millis(10));
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[test]
    fn test_wait_until_operational_observes_shutdown() {
        let fx = manager_with(vec![Box::new(MockSource::with_entropy("mock", 0))]);
        let mgr = Arc::clone(&fx.mgr);
        let waiter = std::thread::spawn(move || {
            mgr.wait_until_operational(Duration::from_secs(5))
        });
        std::thread::sleep(Duration::from_millis(20));
        fx.mgr.request_shutdown();
        assert!(matches!(waiter.join().unwrap(), Err(Error::Shutdown)));
    }
}
