//! ChaCha20-based deterministic random bit generators.
//!
//! The manager core treats the DRNG side as a collaborator behind the
//! [`DrngWorker`] seam: once the reseed gate is held, `seed_work` pulls a
//! seed buffer from the sources, conditions it, applies it to every
//! instance, and re-evaluates the seed-level state machine before
//! releasing the gate.
//!
//! Seed material supplements the existing state rather than replacing it:
//! the conditioned buffer digest is XOR-mixed with output of the previous
//! state, so a compromise of the sources alone cannot predict outputs.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand_chacha::ChaCha20Rng;
use rand_core::{RngCore, SeedableRng};
use zeroize::Zeroizing;

use crate::buffer::EntropyBuffer;
use crate::error::Error;
use crate::manager::Manager;

/// Reseed worker invoked by the manager once the reseed gate is held.
///
/// Implementations must call back into [`Manager::fill_seed_buffer`],
/// apply the result, run [`Manager::init_ops`] with the buffer, and
/// finally release the gate with [`Manager::pool_unlock`] on every path.
pub trait DrngWorker: Send + Sync {
    /// Performs one gated reseed cycle.
    fn seed_work(&self, mgr: &Manager);
}

/// A single DRNG instance.
pub struct Drng {
    inner: Mutex<ChaCha20Rng>,
    fully_seeded: AtomicBool,
    init_instance: bool,
    node: usize,
    reseed_count: AtomicU64,
    bytes_since_reseed: AtomicU64,
}

impl Drng {
    fn new(node: usize, init_instance: bool) -> Self {
        Self {
            // Start from OS entropy so the instance is never in a
            // predictable state, but credit nothing: the seed-level state
            // machine alone decides when output is trustworthy.
            inner: Mutex::new(ChaCha20Rng::from_entropy()),
            fully_seeded: AtomicBool::new(false),
            init_instance,
            node,
            reseed_count: AtomicU64::new(0),
            bytes_since_reseed: AtomicU64::new(0),
        }
    }

    /// Whether this is the bootstrap instance every other node falls back
    /// to.
    pub fn is_init_instance(&self) -> bool {
        self.init_instance
    }

    /// Node index this instance serves.
    pub fn node(&self) -> usize {
        self.node
    }

    /// Whether this instance has been reseeded with full security
    /// strength.
    pub fn is_fully_seeded(&self) -> bool {
        self.fully_seeded.load(Ordering::Relaxed)
    }

    /// Clears the fully-seeded marker. Called by the manager's demotion
    /// path.
    pub(crate) fn mark_not_fully_seeded(&self) {
        self.fully_seeded.store(false, Ordering::Relaxed);
    }

    /// Reseeds performed on this instance.
    pub fn reseed_count(&self) -> u64 {
        self.reseed_count.load(Ordering::Relaxed)
    }

    /// Bytes generated since the last reseed.
    pub fn bytes_since_reseed(&self) -> u64 {
        self.bytes_since_reseed.load(Ordering::Relaxed)
    }

    /// Mixes conditioned seed material into the instance state.
    fn apply_seed(&self, seed: &[u8; 32], fully_seeded_now: bool) {
        let mut rng = self.inner.lock().unwrap_or_else(PoisonError::into_inner);

        let mut mixed = Zeroizing::new([0u8; 32]);
        rng.fill_bytes(&mut *mixed);
        for (m, s) in mixed.iter_mut().zip(seed.iter()) {
            *m ^= s;
        }
        *rng = ChaCha20Rng::from_seed(*mixed);
        drop(rng);

        if fully_seeded_now {
            self.fully_seeded.store(true, Ordering::Relaxed);
        }
        self.reseed_count.fetch_add(1, Ordering::Relaxed);
        self.bytes_since_reseed.store(0, Ordering::Relaxed);
    }

    /// Fills `buf` with generator output regardless of seed level.
    pub fn generate(&self, buf: &mut [u8]) {
        let mut rng = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        rng.fill_bytes(buf);
        drop(rng);
        self.bytes_since_reseed
            .fetch_add(buf.len() as u64, Ordering::Relaxed);
    }
}

/// Fixed set of DRNG instances, one per node, instance 0 being the init
/// instance.
pub struct DrngPool {
    instances: Vec<Drng>,
}

impl DrngPool {
    /// Creates a pool with `nodes` instances (at least one).
    pub fn new(nodes: usize) -> Self {
        let instances = (0..nodes.max(1)).map(|n| Drng::new(n, n == 0)).collect();
        Self { instances }
    }

    /// The bootstrap instance.
    pub fn init_instance(&self) -> &Drng {
        &self.instances[0]
    }

    /// Instance serving `node`, falling back to the init instance.
    pub fn instance(&self, node: usize) -> &Drng {
        self.instances.get(node).unwrap_or(self.init_instance())
    }

    /// Iterates all instances.
    pub fn iter(&self) -> impl Iterator<Item = &Drng> {
        self.instances.iter()
    }

    /// Fills `buf` from the init instance without waiting for any seed
    /// level. Callers needing full security strength use
    /// [`DrngPool::generate_full`].
    pub fn generate(&self, buf: &mut [u8]) {
        self.init_instance().generate(buf);
    }

    /// Fills `buf` once the manager is operational, blocking up to
    /// `timeout`.
    pub fn generate_full(
        &self,
        mgr: &Manager,
        buf: &mut [u8],
        timeout: Duration,
    ) -> Result<(), Error> {
        mgr.wait_until_operational(timeout)?;
        self.generate(buf);
        Ok(())
    }
}

impl DrngWorker for DrngPool {
    fn seed_work(&self, mgr: &Manager) {
        let requested_bits = mgr.seed_entropy_osr(mgr.state_all_nodes_seeded());
        let mut eb = EntropyBuffer::for_sources(mgr.source_count());

        mgr.fill_seed_buffer(&mut eb, requested_bits);
        let collected = mgr.entropy_rate_eb(&eb);

        let seed = condition_buffer(&eb);
        for drng in &self.instances {
            let fully_seeded_now =
                mgr.fully_seeded_check(drng.is_fully_seeded(), collected);
            drng.apply_seed(&seed, fully_seeded_now);
            tracing::debug!(
                node = drng.node(),
                collected_bits = collected,
                fully_seeded = drng.is_fully_seeded(),
                "DRNG reseeded"
            );
        }

        let all_seeded = self.instances.iter().all(Drng::is_fully_seeded);
        mgr.pool_all_nodes_seeded(all_seeded);

        mgr.init_ops(Some(&eb));
        mgr.pool_unlock();
    }
}

/// Conditions a seed buffer into fixed-size DRNG seed material. The
/// timestamp and every slot are folded in regardless of credit; bytes
/// without credit cannot harm.
fn condition_buffer(eb: &EntropyBuffer) -> Zeroizing<[u8; 32]> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&eb.now.to_le_bytes());
    for (index, slot) in eb.slots().iter().enumerate() {
        hasher.update(&(index as u32).to_le_bytes());
        hasher.update(&slot.e_bits.to_le_bytes());
        hasher.update(&(slot.data.len() as u64).to_le_bytes());
        hasher.update(&slot.data);
    }
    Zeroizing::new(*hasher.finalize().as_bytes())
}
