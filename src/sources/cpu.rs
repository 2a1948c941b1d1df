//! CPU instruction entropy source (RDSEED/RDRAND).
//!
//! Prefers RDSEED, which reads closer to the silicon noise source, and
//! falls back to RDRAND. Hardware RNG output is distrusted by policy: the
//! credited rate defaults to a small fraction of the delivered bytes.

use crate::buffer::SeedSlot;
use crate::sources::EntropySource;

const STEP_RETRIES: u32 = 10;

/// CPU hardware RNG source.
pub struct CpuSource {
    entropy_rate_bits: u32,
}

impl CpuSource {
    /// Creates a CPU source crediting at most `entropy_rate_bits` per
    /// request.
    pub fn new(entropy_rate_bits: u32) -> Self {
        Self { entropy_rate_bits }
    }

    /// Whether the running CPU offers a usable RNG instruction.
    pub fn available() -> bool {
        random_word().is_some()
    }
}

impl EntropySource for CpuSource {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn init(&self) -> Result<(), crate::error::Error> {
        if !Self::available() {
            tracing::info!("no CPU RNG instruction; source will deliver zero credit");
        }
        Ok(())
    }

    fn curr_entropy(&self, threshold_bits: u32) -> u32 {
        if Self::available() {
            self.entropy_rate_bits.min(threshold_bits)
        } else {
            0
        }
    }

    fn max_entropy(&self) -> u32 {
        self.entropy_rate_bits
    }

    fn get_ent(&self, slot: &mut SeedSlot, requested_bits: u32, _fully_seeded: bool) {
        let len = (requested_bits as usize).div_ceil(8);
        let mut data = Vec::with_capacity(len);
        while data.len() < len {
            match random_word() {
                Some(word) => {
                    let bytes = word.to_le_bytes();
                    let take = (len - data.len()).min(bytes.len());
                    data.extend_from_slice(&bytes[..take]);
                }
                None => {
                    slot.e_bits = 0;
                    slot.data = Vec::new();
                    return;
                }
            }
        }
        slot.e_bits = self.entropy_rate_bits.min(requested_bits);
        slot.data = data;
    }
}

/// Reads one word from the CPU RNG, preferring RDSEED over RDRAND.
/// Returns `None` when neither instruction is available or both stay
/// exhausted across the retry budget.
pub(crate) fn random_word() -> Option<u64> {
    #[cfg(target_arch = "x86_64")]
    {
        if std::arch::is_x86_feature_detected!("rdseed") {
            // SAFETY: feature presence verified at runtime.
            if let Some(word) = unsafe { rdseed64(STEP_RETRIES) } {
                return Some(word);
            }
        }
        if std::arch::is_x86_feature_detected!("rdrand") {
            // SAFETY: feature presence verified at runtime.
            if let Some(word) = unsafe { rdrand64(STEP_RETRIES) } {
                return Some(word);
            }
        }
        None
    }
    #[cfg(not(target_arch = "x86_64"))]
    {
        None
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "rdseed")]
unsafe fn rdseed64(retries: u32) -> Option<u64> {
    for _ in 0..retries {
        let mut value = 0u64;
        if std::arch::x86_64::_rdseed64_step(&mut value) == 1 {
            return Some(value);
        }
        std::hint::spin_loop();
    }
    None
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "rdrand")]
unsafe fn rdrand64(retries: u32) -> Option<u64> {
    for _ in 0..retries {
        let mut value = 0u64;
        if std::arch::x86_64::_rdrand64_step(&mut value) == 1 {
            return Some(value);
        }
        std::hint::spin_loop();
    }
    None
}
