//! Entropy accounting.
//!
//! Pure functions over the seeding policy and current source estimates.
//! Nothing here mutates manager state; every function is safe to call
//! concurrently with a reseed in flight.

use crate::config::{MIN_SEED_ENTROPY_BITS, SECURITY_STRENGTH_BITS, SEED_BUFFER_INIT_ADD_BITS};
use crate::manager::Manager;

impl Manager {
    /// DRNG security strength in bits.
    pub fn security_strength(&self) -> u32 {
        SECURITY_STRENGTH_BITS
    }

    /// Entropy demanded for a seeding event to count as full, given
    /// whether the target already reached full seeding. Accounts for the
    /// oversampling ratio and, in SP800-90C mode before full seeding, the
    /// initial oversampling addition.
    pub fn seed_entropy_osr(&self, fully_seeded: bool) -> u32 {
        seed_entropy_osr(
            SECURITY_STRENGTH_BITS,
            self.oversampling_rate(),
            self.config().policy.sp80090c,
            fully_seeded,
        )
    }

    /// Discounts raw bits by the oversampling ratio.
    pub fn reduce_by_osr(&self, bits: u32) -> u32 {
        reduce_by_osr(bits, self.oversampling_rate())
    }

    /// Per-source request ceiling used when polling current estimates:
    /// the security strength plus, in SP800-90C mode while not every node
    /// is seeded, the initial oversampling addition.
    pub fn required_entropy_threshold(&self) -> u32 {
        let mut threshold = SECURITY_STRENGTH_BITS;
        if self.config().policy.sp80090c && !self.state_all_nodes_seeded() {
            threshold = threshold.saturating_add(SEED_BUFFER_INIT_ADD_BITS);
        }
        threshold
    }

    /// Available entropy across every registered source.
    pub fn avail_entropy(&self) -> u32 {
        let threshold = self.required_entropy_threshold();
        self.registry()
            .iter()
            .fold(0u32, |acc, es| acc.saturating_add(es.curr_entropy(threshold)))
    }

    /// Available entropy in the auxiliary pool alone.
    pub fn avail_entropy_aux(&self) -> u32 {
        self.registry()
            .aux()
            .curr_entropy(self.required_entropy_threshold())
    }

    /// Capacity of the auxiliary pool in bits.
    pub fn avail_poolsize_aux(&self) -> u32 {
        self.registry().aux().max_entropy()
    }

    /// Whether `collected_bits` of credited entropy completes a full
    /// seeding, given the target's current seeding state.
    pub fn fully_seeded_check(&self, fully_seeded: bool, collected_bits: u32) -> bool {
        collected_bits >= self.seed_entropy_osr(fully_seeded)
    }

    /// Minimum available entropy a steady-state reseed insists on before
    /// drawing from the sources.
    pub(crate) fn required_reseed_entropy(&self) -> u32 {
        SECURITY_STRENGTH_BITS.max(MIN_SEED_ENTROPY_BITS)
    }

    fn oversampling_rate(&self) -> u32 {
        self.config().policy.osr.max(1)
    }
}

fn seed_entropy_osr(strength: u32, osr: u32, sp80090c: bool, fully_seeded: bool) -> u32 {
    let mut bits = strength.saturating_mul(osr.max(1));
    if sp80090c && !fully_seeded {
        bits = bits.saturating_add(SEED_BUFFER_INIT_ADD_BITS);
    }
    bits
}

fn reduce_by_osr(bits: u32, osr: u32) -> u32 {
    bits / osr.max(1)
}
