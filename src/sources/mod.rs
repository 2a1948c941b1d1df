//! Entropy source capability interface and built-in sources.
//!
//! Every noise source presents the same narrow surface: a conservative
//! entropy estimate, a constant capacity, and a fill hook that deposits
//! bytes plus their credit into a seed-buffer slot. Sources are referenced
//! by their position in the registry, which also orders them in the seed
//! buffer.

mod aux_pool;
#[cfg(feature = "es-cpu")]
pub(crate) mod cpu;
#[cfg(feature = "es-jitter")]
mod jitter;
#[cfg(feature = "es-krng")]
mod krng;
mod registry;

pub use aux_pool::{AuxPool, AuxSource};
#[cfg(feature = "es-cpu")]
pub use cpu::CpuSource;
#[cfg(feature = "es-jitter")]
pub use jitter::JitterSource;
#[cfg(feature = "es-krng")]
pub use krng::KrngSource;
pub use registry::SourceRegistry;

use crate::buffer::SeedSlot;
use crate::config::Config;
use crate::error::Error;

/// Capability record implemented by every entropy source.
///
/// `curr_entropy` and `max_entropy` must be fast and safe to call
/// concurrently; `get_ent` may take as long as the source needs to gather
/// samples, bounded internally.
pub trait EntropySource: Send + Sync {
    /// Human-readable source name, stable for logging.
    fn name(&self) -> &'static str;

    /// One-time startup hook. A failure aborts manager initialization.
    fn init(&self) -> Result<(), Error> {
        Ok(())
    }

    /// Shutdown hook, called from `finalize`.
    fn fini(&self) {}

    /// Clears the source's entropy accounting. Collected data may remain
    /// in internal pools; it cannot harm and may help.
    fn reset(&self) {}

    /// Periodic nudge from the startup monitor, giving the source a
    /// chance to pull samples.
    fn monitor(&self) {}

    /// Conservative estimate of currently available entropy in bits,
    /// given the manager's per-source request ceiling.
    fn curr_entropy(&self, threshold_bits: u32) -> u32;

    /// Largest entropy credit this source can ever deliver, in bits.
    fn max_entropy(&self) -> u32;

    /// Fills `slot.data` with up to `requested_bits` worth of bytes and
    /// sets `slot.e_bits` to the credited entropy, never above the
    /// request. `fully_seeded` hints that this is a steady-state reseed
    /// rather than initial seeding.
    fn get_ent(&self, slot: &mut SeedSlot, requested_bits: u32, fully_seeded: bool);
}

/// Builds the compiled-in source set in canonical order. The auxiliary
/// pool is appended separately by the registry.
pub fn default_sources(config: &Config) -> Vec<Box<dyn EntropySource>> {
    let mut sources: Vec<Box<dyn EntropySource>> = Vec::new();
    #[cfg(feature = "es-jitter")]
    sources.push(Box::new(JitterSource::new(config.rates.jitter_bits)));
    #[cfg(feature = "es-cpu")]
    sources.push(Box::new(CpuSource::new(config.rates.cpu_bits)));
    #[cfg(feature = "es-krng")]
    sources.push(Box::new(KrngSource::new(config.rates.krng_bits)));
    #[cfg(not(any(feature = "es-jitter", feature = "es-cpu", feature = "es-krng")))]
    let _ = config;
    sources
}

/// Scriptable entropy source for tests and demonstrations.
///
/// Returns a fixed entropy figure until the scripted sequence (if any) is
/// exhausted, and counts hook invocations so tests can assert on them.
#[derive(Debug, Default)]
pub struct MockSource {
    name: &'static str,
    entropy_bits: std::sync::atomic::AtomicU32,
    script: std::sync::Mutex<std::collections::VecDeque<u32>>,
    inits: std::sync::atomic::AtomicU32,
    resets: std::sync::atomic::AtomicU32,
    monitors: std::sync::atomic::AtomicU32,
    fills: std::sync::atomic::AtomicU32,
    fail_init: bool,
}

impl MockSource {
    /// Creates a mock that always reports `entropy_bits`.
    pub fn with_entropy(name: &'static str, entropy_bits: u32) -> Self {
        Self {
            name,
            entropy_bits: std::sync::atomic::AtomicU32::new(entropy_bits),
            ..Self::default()
        }
    }

    /// Creates a mock that reports the scripted values in order, then
    /// sticks to the last one.
    pub fn with_script(name: &'static str, script: Vec<u32>) -> Self {
        let last = script.last().copied().unwrap_or(0);
        Self {
            name,
            entropy_bits: std::sync::atomic::AtomicU32::new(last),
            script: std::sync::Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// Creates a mock whose `init` hook fails.
    pub fn failing_init(name: &'static str) -> Self {
        Self {
            name,
            fail_init: true,
            ..Self::default()
        }
    }

    /// Changes the reported entropy figure.
    pub fn set_entropy(&self, bits: u32) {
        self.entropy_bits
            .store(bits, std::sync::atomic::Ordering::Relaxed);
    }

    /// Number of `init` invocations.
    pub fn init_count(&self) -> u32 {
        self.inits.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Number of `reset` invocations.
    pub fn reset_count(&self) -> u32 {
        self.resets.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Number of `monitor` invocations.
    pub fn monitor_count(&self) -> u32 {
        self.monitors.load(std::sync::atomic::Ordering::Relaxed)
    }

    /// Number of `get_ent` invocations.
    pub fn fill_count(&self) -> u32 {
        self.fills.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn next_entropy(&self) -> u32 {
        let mut script = self
            .script
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match script.pop_front() {
            Some(bits) => bits,
            None => self.entropy_bits.load(std::sync::atomic::Ordering::Relaxed),
        }
    }
}

impl EntropySource for MockSource {
    fn name(&self) -> &'static str {
        self.name
    }

    fn init(&self) -> Result<(), Error> {
        self.inits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if self.fail_init {
            return Err(Error::SourceInit {
                name: self.name,
                reason: "scripted failure".into(),
            });
        }
        Ok(())
    }

    fn reset(&self) {
        self.resets
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    fn monitor(&self) {
        self.monitors
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    fn curr_entropy(&self, threshold_bits: u32) -> u32 {
        self.entropy_bits
            .load(std::sync::atomic::Ordering::Relaxed)
            .min(threshold_bits)
    }

    fn max_entropy(&self) -> u32 {
        u32::MAX
    }

    fn get_ent(&self, slot: &mut SeedSlot, requested_bits: u32, _fully_seeded: bool) {
        self.fills.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let bits = self.next_entropy().min(requested_bits);
        slot.data = vec![0x5A; (requested_bits as usize).div_ceil(8)];
        slot.e_bits = bits;
    }
}

// Shared-handle form so tests and demos can keep inspecting a mock after
// handing it to the registry.
impl EntropySource for std::sync::Arc<MockSource> {
    fn name(&self) -> &'static str {
        self.as_ref().name()
    }

    fn init(&self) -> Result<(), Error> {
        self.as_ref().init()
    }

    fn fini(&self) {
        self.as_ref().fini()
    }

    fn reset(&self) {
        self.as_ref().reset()
    }

    fn monitor(&self) {
        self.as_ref().monitor()
    }

    fn curr_entropy(&self, threshold_bits: u32) -> u32 {
        self.as_ref().curr_entropy(threshold_bits)
    }

    fn max_entropy(&self) -> u32 {
        self.as_ref().max_entropy()
    }

    fn get_ent(&self, slot: &mut SeedSlot, requested_bits: u32, fully_seeded: bool) {
        self.as_ref().get_ent(slot, requested_bits, fully_seeded)
    }
}
