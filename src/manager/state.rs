//! Seed-level state machine.
//!
//! The manager tracks the DRNG's progress through
//! `uninitialized → minimally seeded → fully seeded → operational`.
//! Promotions are one-way during normal operation: externally visible
//! seed guarantees never regress without an explicit demotion or reset.
//! After each promotion the reseed threshold escalates, so the next
//! reseed demands more entropy until steady state is reached.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::buffer::EntropyBuffer;
use crate::config::{FULL_SEED_ENTROPY_BITS, INIT_ENTROPY_BITS, MIN_SEED_ENTROPY_BITS};
use crate::drng::Drng;
use crate::manager::Manager;

/// Atomic seed-level record.
///
/// The seed booleans are only written by the reseed gate holder or by the
/// lifecycle paths; readers use relaxed loads. Promotions are monotonic,
/// so a stale read merely delays a promotion by one trigger cycle.
#[derive(Debug)]
pub(crate) struct SeedState {
    operational: AtomicBool,
    fully_seeded: AtomicBool,
    min_seeded: AtomicBool,
    all_nodes_seeded: AtomicBool,
    available: AtomicBool,
    boot_entropy_thresh: AtomicU32,
    reseed_in_progress: AtomicBool,
    terminate: AtomicBool,
}

impl SeedState {
    pub(crate) fn new() -> Self {
        Self {
            operational: AtomicBool::new(false),
            fully_seeded: AtomicBool::new(false),
            min_seeded: AtomicBool::new(false),
            all_nodes_seeded: AtomicBool::new(false),
            available: AtomicBool::new(false),
            boot_entropy_thresh: AtomicU32::new(FULL_SEED_ENTROPY_BITS),
            reseed_in_progress: AtomicBool::new(false),
            terminate: AtomicBool::new(false),
        }
    }

    pub(crate) fn operational(&self) -> bool {
        self.operational.load(Ordering::Relaxed)
    }

    pub(crate) fn set_operational_flag(&self, value: bool) {
        self.operational.store(value, Ordering::Relaxed);
    }

    pub(crate) fn fully_seeded(&self) -> bool {
        self.fully_seeded.load(Ordering::Relaxed)
    }

    pub(crate) fn set_fully_seeded(&self, value: bool) {
        self.fully_seeded.store(value, Ordering::Relaxed);
    }

    pub(crate) fn min_seeded(&self) -> bool {
        self.min_seeded.load(Ordering::Relaxed)
    }

    pub(crate) fn set_min_seeded(&self, value: bool) {
        self.min_seeded.store(value, Ordering::Relaxed);
    }

    pub(crate) fn all_nodes_seeded(&self) -> bool {
        self.all_nodes_seeded.load(Ordering::Relaxed)
    }

    pub(crate) fn set_all_nodes_seeded(&self, value: bool) {
        self.all_nodes_seeded.store(value, Ordering::Relaxed);
    }

    pub(crate) fn available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    pub(crate) fn set_available(&self, value: bool) {
        self.available.store(value, Ordering::Relaxed);
    }

    pub(crate) fn boot_entropy_thresh(&self) -> u32 {
        self.boot_entropy_thresh.load(Ordering::Relaxed)
    }

    pub(crate) fn set_boot_entropy_thresh(&self, bits: u32) {
        self.boot_entropy_thresh.store(bits, Ordering::Relaxed);
    }

    pub(crate) fn try_acquire_reseed(&self) -> bool {
        self.reseed_in_progress
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    pub(crate) fn release_reseed(&self) {
        self.reseed_in_progress.store(false, Ordering::Release);
    }

    pub(crate) fn terminate(&self) -> bool {
        self.terminate.load(Ordering::Relaxed)
    }

    pub(crate) fn set_terminate(&self) {
        self.terminate.store(true, Ordering::Relaxed);
    }
}

impl Manager {
    /// Whether the DRNG reached full security strength and is fit for
    /// use.
    pub fn state_operational(&self) -> bool {
        self.seed_state().operational()
    }

    /// Whether the DRNG has been seeded with full security strength.
    pub fn state_fully_seeded(&self) -> bool {
        self.seed_state().fully_seeded()
    }

    /// Whether the DRNG holds at least the minimal seed level.
    pub fn state_min_seeded(&self) -> bool {
        self.seed_state().min_seeded()
    }

    /// Whether every per-node DRNG instance is fully seeded.
    pub fn state_all_nodes_seeded(&self) -> bool {
        self.seed_state().all_nodes_seeded()
    }

    /// Records whether all DRNG instances are fully seeded.
    pub fn pool_all_nodes_seeded(&self, set: bool) {
        self.seed_state().set_all_nodes_seeded(set);
    }

    /// Current reseed trigger threshold in bits.
    pub fn boot_entropy_thresh(&self) -> u32 {
        self.seed_state().boot_entropy_thresh()
    }

    /// Sets the reseed trigger threshold.
    pub(crate) fn set_entropy_thresh(&self, bits: u32) {
        self.seed_state().set_boot_entropy_thresh(bits);
    }

    /// Evaluates the seed stages and performs at most one promotion.
    ///
    /// `seed_bits` is the per-slot credit sum when a seed buffer from the
    /// current reseed event is supplied, else the sources are polled for
    /// their present estimates. The threshold escalates after each
    /// promotion: a word of initial entropy arms the 128-bit trigger,
    /// minimal seeding arms the full-strength trigger.
    pub fn init_ops(&self, eb: Option<&EntropyBuffer>) {
        let state = self.seed_state();
        if state.operational() {
            return;
        }

        let requested_bits = self.seed_entropy_osr(state.all_nodes_seeded());
        let seed_bits = match eb {
            Some(eb) => eb.credited_bits(),
            None => self.avail_entropy(),
        };

        if state.fully_seeded() {
            self.set_operational();
            self.set_entropy_thresh(requested_bits);
        } else if self.fully_seeded_check(state.all_nodes_seeded(), seed_bits) {
            state.set_fully_seeded(true);
            self.set_operational();
            state.set_min_seeded(true);
            tracing::info!(seed_bits, "fully seeded");
            self.set_entropy_thresh(requested_bits);
        } else if !state.min_seeded() {
            if seed_bits >= MIN_SEED_ENTROPY_BITS {
                state.set_min_seeded(true);
                tracing::info!(seed_bits, "minimally seeded");
                self.set_entropy_thresh(requested_bits);
                self.init_wait().wake_all();
            } else if seed_bits >= INIT_ENTROPY_BITS {
                tracing::info!(seed_bits, "initial entropy level reached");
                self.set_entropy_thresh(MIN_SEED_ENTROPY_BITS);
            }
        }
    }

    /// Marks `drng` as no longer fully seeded.
    ///
    /// The demotion is asymmetric by design: any instance losing its seed
    /// clears `all_nodes_seeded`, but only the init instance demotes the
    /// manager itself — it is the fall-back for every insufficiently
    /// seeded node, so the whole manager becomes non-operational when it
    /// degrades, the status sink is notified, and a recovery reseed is
    /// dispatched immediately.
    pub fn unset_fully_seeded(&self, drng: &Drng) {
        drng.mark_not_fully_seeded();
        self.pool_all_nodes_seeded(false);

        if drng.is_init_instance() && self.state_operational() {
            tracing::debug!("manager set to non-operational");
            let state = self.seed_state();
            state.set_operational_flag(false);
            state.set_fully_seeded(false);

            self.status().set_operational(false);

            // If sufficient entropy is available, reseed now.
            self.add_entropy();
        }
    }

    /// Resets the seed-level accounting: every source with a `reset` hook
    /// is invoked and all seed flags are cleared. Data already collected
    /// in source pools is kept; it cannot harm and may help.
    pub fn reset_state(&self) {
        for es in self.registry().iter() {
            es.reset();
        }
        let state = self.seed_state();
        state.set_operational_flag(false);
        state.set_fully_seeded(false);
        state.set_min_seeded(false);
        state.set_all_nodes_seeded(false);
        tracing::debug!("manager state reset");
    }

    /// Promotes to operational once fully seeded, waking init waiters and
    /// publishing the status change.
    fn set_operational(&self) {
        let state = self.seed_state();
        if state.fully_seeded() {
            state.set_operational_flag(true);
            self.init_wait().wake_all();
            self.status().set_operational(true);
            tracing::info!("manager fully operational");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::MIN_SEED_ENTROPY_BITS;
    use crate::manager::testutil::manager_with;
    use crate::sources::MockSource;
    use std::sync::Arc;

    #[test]
    fn test_bootstrap_to_operational() {
        let source = Arc::new(MockSource::with_entropy("mock", 300));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);

        fx.mgr.add_entropy();

        assert!(fx.mgr.state_operational());
        assert!(fx.mgr.state_fully_seeded());
        assert!(fx.mgr.state_min_seeded());
        assert!(fx.status.is_operational());
        assert_eq!(source.fill_count(), 1);
    }

    #[test]
    fn test_two_step_seeding() {
        let source = Arc::new(MockSource::with_entropy("mock", 160));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);

        // 160 bits: enough for the minimal level, not for full strength.
        fx.mgr.init_ops(None);
        assert!(fx.mgr.state_min_seeded());
        assert!(!fx.mgr.state_fully_seeded());
        assert!(!fx.mgr.state_operational());
        assert_eq!(
            fx.mgr.boot_entropy_thresh(),
            fx.mgr.seed_entropy_osr(false)
        );

        // 256 bits on the second pass: full strength reached.
        source.set_entropy(256);
        fx.mgr.add_entropy();
        assert!(fx.mgr.state_fully_seeded());
        assert!(fx.mgr.state_operational());
    }

    #[test]
    fn test_initial_entropy_tightens_threshold_without_promotion() {
        let source = Arc::new(MockSource::with_entropy("mock", 48));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);

        fx.mgr.init_ops(None);
        assert!(!fx.mgr.state_min_seeded());
        assert_eq!(fx.mgr.boot_entropy_thresh(), MIN_SEED_ENTROPY_BITS);
    }

    #[test]
    fn test_init_ops_idempotent_with_unchanged_sources() {
        let source = Arc::new(MockSource::with_entropy("mock", 160));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);

        fx.mgr.init_ops(None);
        let thresh = fx.mgr.boot_entropy_thresh();
        let min = fx.mgr.state_min_seeded();
        let full = fx.mgr.state_fully_seeded();

        fx.mgr.init_ops(None);
        assert_eq!(fx.mgr.boot_entropy_thresh(), thresh);
        assert_eq!(fx.mgr.state_min_seeded(), min);
        assert_eq!(fx.mgr.state_fully_seeded(), full);
    }

    #[test]
    fn test_init_ops_noop_when_operational() {
        let source = Arc::new(MockSource::with_entropy("mock", 300));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);
        fx.mgr.add_entropy();
        assert!(fx.mgr.state_operational());

        let thresh = fx.mgr.boot_entropy_thresh();
        fx.mgr.init_ops(None);
        assert_eq!(fx.mgr.boot_entropy_thresh(), thresh);
    }

    #[test]
    fn test_threshold_never_decreases_across_promotions() {
        let source = Arc::new(MockSource::with_entropy("mock", 48));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);

        for bits in [48, 160, 300] {
            source.set_entropy(bits);
            let before = fx.mgr.boot_entropy_thresh();
            let level_before = (fx.mgr.state_min_seeded(), fx.mgr.state_fully_seeded());
            fx.mgr.init_ops(None);
            let level_after = (fx.mgr.state_min_seeded(), fx.mgr.state_fully_seeded());
            if level_after != level_before {
                assert!(fx.mgr.boot_entropy_thresh() >= before);
            }
        }
        assert!(fx.mgr.state_fully_seeded());
    }

    #[test]
    fn test_demotion_of_init_instance() {
        let source = Arc::new(MockSource::with_entropy("mock", 300));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);
        fx.mgr.add_entropy();
        assert!(fx.mgr.state_operational());
        let reseeds_before = fx.drng.init_instance().reseed_count();

        fx.mgr.unset_fully_seeded(fx.drng.init_instance());

        // Demotion recovery: a reseed was dispatched immediately and, with
        // entropy still available, restored the operational state.
        assert!(fx.drng.init_instance().reseed_count() > reseeds_before);
        assert!(fx.mgr.state_operational());
        assert!(fx.status.is_operational());
    }

    #[test]
    fn test_demotion_without_entropy_stays_down() {
        let source = Arc::new(MockSource::with_entropy("mock", 300));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);
        fx.mgr.add_entropy();
        assert!(fx.mgr.state_operational());

        // Entropy dries up, then the init instance degrades.
        source.set_entropy(0);
        fx.mgr.unset_fully_seeded(fx.drng.init_instance());

        assert!(!fx.mgr.state_operational());
        assert!(!fx.mgr.state_fully_seeded());
        assert!(!fx.mgr.state_all_nodes_seeded());
        assert!(!fx.status.is_operational());
        // Invariant: min-seeded survives the demotion.
        assert!(fx.mgr.state_min_seeded());
    }

    #[test]
    fn test_reset_state_clears_flags_and_resets_sources() {
        let source = Arc::new(MockSource::with_entropy("mock", 300));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);
        fx.mgr.add_entropy();
        assert!(fx.mgr.state_operational());

        fx.mgr.reset_state();

        assert!(!fx.mgr.state_operational());
        assert!(!fx.mgr.state_fully_seeded());
        assert!(!fx.mgr.state_min_seeded());
        assert!(!fx.mgr.state_all_nodes_seeded());
        assert_eq!(source.reset_count(), 1);
    }

    #[test]
    fn test_seed_level_implications() {
        // operational ⇒ fully seeded ⇒ min seeded, at every step.
        let source = Arc::new(MockSource::with_entropy("mock", 0));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);

        for bits in [0, 48, 160, 300] {
            source.set_entropy(bits);
            fx.mgr.init_ops(None);
            if fx.mgr.state_operational() {
                assert!(fx.mgr.state_fully_seeded());
            }
            if fx.mgr.state_fully_seeded() {
                assert!(fx.mgr.state_min_seeded());
            }
        }
    }
}
