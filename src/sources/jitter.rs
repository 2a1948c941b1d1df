//! CPU timing-jitter entropy source.
//!
//! Samples the variation in high-resolution clock readbacks across short
//! memory-access loops and whitens the deltas through BLAKE3. The credited
//! rate is a configured ceiling, not a measurement; operators deploying on
//! hardware with known timer behavior set it accordingly.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use crate::buffer::SeedSlot;
use crate::sources::EntropySource;

// Timer readbacks per 32-byte output block. Generous oversampling keeps
// the per-bit credit conservative even on coarse timers.
const SAMPLES_PER_BLOCK: usize = 512;

/// Timing-jitter source.
pub struct JitterSource {
    entropy_rate_bits: u32,
    // Pre-collected whitened blocks, topped up by the monitor hook.
    cache: Mutex<Vec<u8>>,
    stuck_events: AtomicU32,
}

impl JitterSource {
    /// Creates a jitter source crediting at most `entropy_rate_bits` per
    /// request.
    pub fn new(entropy_rate_bits: u32) -> Self {
        Self {
            entropy_rate_bits,
            cache: Mutex::new(Vec::new()),
            stuck_events: AtomicU32::new(0),
        }
    }

    /// Number of collection rounds rejected by the stuck-sample check.
    pub fn stuck_events(&self) -> u32 {
        self.stuck_events.load(Ordering::Relaxed)
    }

    /// Collects one whitened 32-byte block. Returns `None` when the timer
    /// showed no variation at all, in which case nothing may be credited.
    fn collect_block(&self) -> Option<[u8; 32]> {
        let mut deltas = [0u64; SAMPLES_PER_BLOCK];
        let mut sink = 0u64;
        let mut prev = Instant::now();

        for delta in &mut deltas {
            // A short data-dependent loop perturbs the pipeline between
            // timer readbacks.
            for i in 0..(sink % 13 + 3) {
                sink = sink.wrapping_mul(2862933555777941757).wrapping_add(i);
            }
            let now = Instant::now();
            *delta = now.duration_since(prev).as_nanos() as u64;
            prev = now;
        }

        // Stuck-sample check: a timer without resolution yields identical
        // deltas and must not be credited.
        if deltas.windows(2).all(|w| w[0] == w[1]) {
            self.stuck_events.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let mut hasher = blake3::Hasher::new();
        for delta in &deltas {
            hasher.update(&delta.to_le_bytes());
        }
        hasher.update(&sink.to_le_bytes());
        Some(*hasher.finalize().as_bytes())
    }

    fn fill(&self, out: &mut Vec<u8>, len: usize) -> bool {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        while cache.len() < len {
            match self.collect_block() {
                Some(block) => cache.extend_from_slice(&block),
                None => return false,
            }
        }
        out.extend(cache.drain(..len));
        true
    }
}

impl EntropySource for JitterSource {
    fn name(&self) -> &'static str {
        "jitter"
    }

    fn init(&self) -> Result<(), crate::error::Error> {
        // Probe once so a resolution-free timer fails loudly at startup
        // instead of silently crediting nothing forever.
        if self.collect_block().is_none() {
            tracing::warn!("timer shows no jitter; source will deliver zero credit");
        }
        Ok(())
    }

    fn monitor(&self) {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if cache.len() >= 64 {
            return;
        }
        if let Some(block) = self.collect_block() {
            cache.extend_from_slice(&block);
        }
    }

    fn curr_entropy(&self, threshold_bits: u32) -> u32 {
        self.entropy_rate_bits.min(threshold_bits)
    }

    fn max_entropy(&self) -> u32 {
        self.entropy_rate_bits
    }

    fn get_ent(&self, slot: &mut SeedSlot, requested_bits: u32, _fully_seeded: bool) {
        let len = (requested_bits as usize).div_ceil(8);
        let mut data = Vec::new();
        if self.fill(&mut data, len) {
            slot.e_bits = self.entropy_rate_bits.min(requested_bits);
            slot.data = data;
        } else {
            slot.e_bits = 0;
            slot.data = Vec::new();
            tracing::warn!("jitter collection rejected by stuck-sample check");
        }
    }
}
