//! Kernel RNG bridge.
//!
//! Pulls bytes from the operating system RNG through `getrandom`. The
//! kernel pool has its own seeding discipline the manager cannot audit, so
//! the credited rate is a policy figure, not a claim about the kernel.

use crate::buffer::SeedSlot;
use crate::error::Error;
use crate::sources::EntropySource;

/// Operating-system RNG source.
pub struct KrngSource {
    entropy_rate_bits: u32,
}

impl KrngSource {
    /// Creates a kernel RNG source crediting at most `entropy_rate_bits`
    /// per request.
    pub fn new(entropy_rate_bits: u32) -> Self {
        Self { entropy_rate_bits }
    }
}

impl EntropySource for KrngSource {
    fn name(&self) -> &'static str {
        "krng"
    }

    fn init(&self) -> Result<(), Error> {
        // One probe read: a kernel without a working RNG is fatal for
        // initialization rather than a silent zero-credit source.
        let mut probe = [0u8; 1];
        getrandom::getrandom(&mut probe).map_err(|e| Error::SourceInit {
            name: "krng",
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn curr_entropy(&self, threshold_bits: u32) -> u32 {
        self.entropy_rate_bits.min(threshold_bits)
    }

    fn max_entropy(&self) -> u32 {
        self.entropy_rate_bits
    }

    fn get_ent(&self, slot: &mut SeedSlot, requested_bits: u32, _fully_seeded: bool) {
        let len = (requested_bits as usize).div_ceil(8);
        let mut data = vec![0u8; len];
        match getrandom::getrandom(&mut data) {
            Ok(()) => {
                slot.e_bits = self.entropy_rate_bits.min(requested_bits);
                slot.data = data;
            }
            Err(e) => {
                tracing::warn!(error = %e, "kernel RNG read failed");
                slot.e_bits = 0;
                slot.data = Vec::new();
            }
        }
    }
}
