//! Reseed coordination.
//!
//! Reading the sources to (re)seed the DRNG is a single-writer operation.
//! The gate is a compare-and-swap flag, never a sleeping lock: a caller
//! finding it taken knows a reseed is already in flight and returns to its
//! own work rather than queueing. Freshness-sensitive callers retry
//! through the normal trigger path.

use std::sync::atomic::Ordering;

use crate::buffer::EntropyBuffer;
use crate::manager::Manager;

impl Manager {
    /// Attempts to take the reseed gate. Returns whether the caller now
    /// holds it. Never blocks.
    pub fn pool_trylock(&self) -> bool {
        self.seed_state().try_acquire_reseed()
    }

    /// Releases the reseed gate. Must be called by whichever task
    /// obtained it.
    pub fn pool_unlock(&self) {
        self.seed_state().release_reseed();
    }

    /// Whether a reseed should be triggered: the manager is available,
    /// not every node is seeded yet, and the collected estimate has
    /// reached the boot threshold.
    pub fn reseed_wanted(&self) -> bool {
        if !self.seed_state().available() {
            return false;
        }

        // Once all DRNG instances are fully seeded, entropy arrivals no
        // longer cause reseeding.
        if self.state_all_nodes_seeded() {
            return false;
        }

        self.avail_entropy() >= self.boot_entropy_thresh()
    }

    /// Reseed trigger. When a reseed is wanted and the gate is free, the
    /// DRNG collaborator runs its seed work; it calls back into
    /// [`Manager::fill_seed_buffer`] and releases the gate. Contention is
    /// benign: a second caller returns immediately.
    pub fn add_entropy(&self) {
        if !self.reseed_wanted() {
            return;
        }

        if !self.pool_trylock() {
            return;
        }

        self.drng_worker().seed_work(self);
    }

    /// Fills the seed buffer from the sources in registry order.
    ///
    /// Only the gate holder may call this. A steady-state reseed refuses
    /// to draw when less than the required minimum is available: every
    /// slot's credit is zeroed and the sources are left untouched, so the
    /// pending entropy keeps accumulating for the next trigger. Writer
    /// waiters are woken on every exit.
    pub fn fill_seed_buffer(&self, eb: &mut EntropyBuffer, requested_bits: u32) {
        debug_assert_eq!(eb.len(), self.source_count());

        // Always reseed the DRNG with the current time stamp.
        eb.stamp_now();

        if self.state_fully_seeded() && self.avail_entropy() < self.required_reseed_entropy() {
            eb.zero_credits();
            tracing::debug!(
                available_bits = self.avail_entropy(),
                required_bits = self.required_reseed_entropy(),
                "reseed refused, insufficient entropy"
            );
            self.writer_wakeup();
            return;
        }

        // Concatenate the output of the entropy sources.
        let fully_seeded = self.state_fully_seeded();
        for (index, es) in self.registry().iter().enumerate() {
            es.get_ent(eb.slot_mut(index), requested_bits, fully_seeded);
        }

        self.writer_wakeup();
    }

    /// Current writer wakeup threshold in bits.
    pub fn get_write_wakeup_bits(&self) -> u32 {
        self.write_wakeup_bits_cell().load(Ordering::Relaxed)
    }

    /// Updates the writer wakeup threshold. Zero is rejected; the value
    /// is clamped to the OSR-discounted digest size.
    pub fn set_write_wakeup_bits(&self, bits: u32) {
        if bits == 0 {
            return;
        }
        let clamped = bits.min(self.reduce_by_osr(crate::config::MAX_DIGEST_SIZE_BITS));
        self.write_wakeup_bits_cell().store(clamped, Ordering::Relaxed);
    }

    /// Wakes tasks waiting to write into the auxiliary pool once it has
    /// drained below the wakeup threshold.
    fn writer_wakeup(&self) {
        if self.avail_entropy_aux() < self.get_write_wakeup_bits() {
            self.writer_wait().wake_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::EntropyBuffer;
    use crate::manager::testutil::manager_with;
    use crate::sources::MockSource;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_trylock_is_exclusive() {
        let fx = manager_with(vec![]);
        assert!(fx.mgr.pool_trylock());
        assert!(!fx.mgr.pool_trylock());
        fx.mgr.pool_unlock();
        assert!(fx.mgr.pool_trylock());
        fx.mgr.pool_unlock();
    }

    #[test]
    fn test_trylock_exclusive_across_threads() {
        let fx = manager_with(vec![]);
        let mgr = Arc::clone(&fx.mgr);

        let acquired: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let mgr = Arc::clone(&mgr);
                    s.spawn(move || mgr.pool_trylock())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(acquired.iter().filter(|&&a| a).count(), 1);
        fx.mgr.pool_unlock();
    }

    #[test]
    fn test_contending_caller_skips_without_state_change() {
        let source = Arc::new(MockSource::with_entropy("mock", 300));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);

        // Task A holds the gate; task B's trigger must not reseed.
        assert!(fx.mgr.pool_trylock());
        fx.mgr.add_entropy();
        assert_eq!(source.fill_count(), 0);
        assert!(!fx.mgr.state_operational());
        fx.mgr.pool_unlock();

        // After A releases, the next trigger succeeds.
        fx.mgr.add_entropy();
        assert_eq!(source.fill_count(), 1);
        assert!(fx.mgr.state_operational());
    }

    #[test]
    fn test_add_entropy_noop_when_not_wanted() {
        let source = Arc::new(MockSource::with_entropy("mock", 10));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);

        assert!(!fx.mgr.reseed_wanted());
        fx.mgr.add_entropy();

        assert_eq!(source.fill_count(), 0);
        assert!(!fx.mgr.state_min_seeded());
        // The gate was never taken.
        assert!(fx.mgr.pool_trylock());
        fx.mgr.pool_unlock();
    }

    #[test]
    fn test_no_reseed_once_all_nodes_seeded() {
        let source = Arc::new(MockSource::with_entropy("mock", 300));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);

        fx.mgr.add_entropy();
        assert!(fx.mgr.state_all_nodes_seeded());
        assert!(!fx.mgr.reseed_wanted());

        fx.mgr.add_entropy();
        assert_eq!(source.fill_count(), 1);
    }

    #[test]
    fn test_refusal_zeroes_credits_and_wakes_writers() {
        let source = Arc::new(MockSource::with_entropy("mock", 300));
        let fx = manager_with(vec![Box::new(Arc::clone(&source))]);

        fx.mgr.add_entropy();
        assert!(fx.mgr.state_fully_seeded());

        // Entropy collapses below the reseed minimum.
        source.set_entropy(64);

        // A writer blocked on the aux pool is released by the refusal.
        let mgr = Arc::clone(&fx.mgr);
        let evals = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let evals_in_writer = Arc::clone(&evals);
        let writer = std::thread::spawn(move || {
            mgr.writer_wait().wait_timeout_for(
                || {
                    evals_in_writer.fetch_add(1, std::sync::atomic::Ordering::Relaxed) >= 1
                },
                Duration::from_secs(5),
            )
        });
        while evals.load(std::sync::atomic::Ordering::Relaxed) == 0 {
            std::thread::yield_now();
        }
        std::thread::sleep(Duration::from_millis(20));

        let mut eb = EntropyBuffer::for_sources(fx.mgr.source_count());
        fx.mgr.fill_seed_buffer(&mut eb, 256);

        assert!(writer.join().unwrap(), "writer waiters were woken");

        assert!(eb.slots().iter().all(|slot| slot.e_bits == 0));
        // No source was drawn from.
        assert_eq!(source.fill_count(), 1);
        // Seed level is untouched.
        assert!(fx.mgr.state_fully_seeded());
        assert!(fx.mgr.state_operational());
    }

    #[test]
    fn test_fill_preserves_registry_order() {
        let a = Arc::new(MockSource::with_entropy("a", 40));
        let b = Arc::new(MockSource::with_entropy("b", 80));
        let fx = manager_with(vec![Box::new(Arc::clone(&a)), Box::new(Arc::clone(&b))]);

        let mut eb = EntropyBuffer::for_sources(fx.mgr.source_count());
        fx.mgr.fill_seed_buffer(&mut eb, 256);

        assert_eq!(eb.slots()[0].e_bits, 40);
        assert_eq!(eb.slots()[1].e_bits, 80);
        assert_eq!(fx.mgr.entropy_rate_eb(&eb), 120);
    }

    #[test]
    fn test_write_wakeup_bits_setter() {
        let fx = manager_with(vec![]);
        let initial = fx.mgr.get_write_wakeup_bits();
        assert_eq!(initial, crate::config::WRITE_WAKEUP_ENTROPY_BYTES << 3);

        // Zero is rejected.
        fx.mgr.set_write_wakeup_bits(0);
        assert_eq!(fx.mgr.get_write_wakeup_bits(), initial);

        // Large values clamp to the OSR-discounted digest size.
        fx.mgr.set_write_wakeup_bits(100_000);
        assert_eq!(
            fx.mgr.get_write_wakeup_bits(),
            crate::config::MAX_DIGEST_SIZE_BITS
        );

        fx.mgr.set_write_wakeup_bits(256);
        assert_eq!(fx.mgr.get_write_wakeup_bits(), 256);
    }
}
