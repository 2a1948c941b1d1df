//! Auxiliary entropy pool.
//!
//! The pool is both a sink and a source: external callers insert data with
//! an entropy credit, the reseed path drains conditioned output. All input
//! is folded into a rolling BLAKE3 digest, so the pool state never exceeds
//! one digest regardless of how much data was inserted; the credit
//! accounting is what is bounded by the configured capacity.

use std::sync::{Arc, Mutex, PoisonError};

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::buffer::SeedSlot;
use crate::config::{AuxPoolConfig, HashAlgorithm};
use crate::sources::EntropySource;

const DIGEST_BYTES: usize = 32;

// Domain separators for the rolling digest.
const LABEL_INSERT: &[u8] = b"aux-insert";
const LABEL_OUTPUT: &[u8] = b"aux-output";
const LABEL_FORWARD: &[u8] = b"aux-forward";

struct PoolInner {
    digest: [u8; DIGEST_BYTES],
    entropy_bits: u32,
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        self.digest.zeroize();
    }
}

/// Digest-backed auxiliary pool.
pub struct AuxPool {
    config: AuxPoolConfig,
    inner: Mutex<PoolInner>,
}

impl AuxPool {
    /// Creates an empty pool with the given capacity.
    pub fn new(config: AuxPoolConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(PoolInner {
                digest: [0u8; DIGEST_BYTES],
                entropy_bits: 0,
            }),
        }
    }

    /// Folds `data` into the pool, crediting `entropy_bits` of entropy.
    /// The credit is conservative: it is capped at the pool capacity and
    /// never exceeds the bit-length of the inserted data.
    pub fn insert(&self, data: &[u8], entropy_bits: u32) {
        let mut inner = self.lock();
        let data_bits = (data.len() as u32).saturating_mul(8);
        let credit = entropy_bits.min(data_bits);
        let folded = fold(self.config.algorithm, &inner.digest, LABEL_INSERT, data);
        inner.digest = folded;
        inner.entropy_bits = inner
            .entropy_bits
            .saturating_add(credit)
            .min(self.config.pool_bits);

        tracing::trace!(
            inserted_bytes = data.len(),
            credited_bits = credit,
            pool_bits = inner.entropy_bits,
            "aux pool insertion"
        );
    }

    /// Current entropy credit in bits.
    pub fn avail_entropy(&self) -> u32 {
        self.lock().entropy_bits
    }

    /// Pool capacity in bits.
    pub fn capacity_bits(&self) -> u32 {
        self.config.pool_bits
    }

    /// Clears the entropy accounting. The digest state is kept; data in
    /// the pool cannot harm and may help.
    pub fn reset_accounting(&self) {
        self.lock().entropy_bits = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Draws up to `requested_bits` of conditioned output, consuming the
    /// corresponding credit and ratcheting the digest forward.
    fn draw(&self, requested_bits: u32) -> (Vec<u8>, u32) {
        let mut inner = self.lock();
        let credit = inner.entropy_bits.min(requested_bits);
        let out_len = (requested_bits as usize).div_ceil(8);

        let mut out = Vec::with_capacity(out_len);
        let mut block_index = 0u32;
        while out.len() < out_len {
            let block = fold(
                self.config.algorithm,
                &inner.digest,
                LABEL_OUTPUT,
                &block_index.to_le_bytes(),
            );
            let take = (out_len - out.len()).min(DIGEST_BYTES);
            out.extend_from_slice(&block[..take]);
            block_index += 1;
        }

        // Ratchet so drawn output cannot be reconstructed from later state.
        let forwarded = fold(self.config.algorithm, &inner.digest, LABEL_FORWARD, &[]);
        inner.digest = forwarded;
        inner.entropy_bits -= credit;

        tracing::trace!(
            credited_bits = credit,
            remaining_bits = inner.entropy_bits,
            "aux pool drained"
        );
        (out, credit)
    }
}

fn fold(
    algorithm: HashAlgorithm,
    state: &[u8; DIGEST_BYTES],
    label: &[u8],
    data: &[u8],
) -> [u8; DIGEST_BYTES] {
    match algorithm {
        HashAlgorithm::Blake3 => {
            let mut hasher = blake3::Hasher::new();
            hasher.update(state);
            hasher.update(label);
            hasher.update(data);
            *hasher.finalize().as_bytes()
        }
        HashAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(state);
            hasher.update(label);
            hasher.update(data);
            let result = hasher.finalize();
            let mut out = [0u8; DIGEST_BYTES];
            out.copy_from_slice(&result);
            out
        }
    }
}

/// Registry adapter presenting the pool through the capability interface.
pub struct AuxSource {
    pool: Arc<AuxPool>,
}

impl AuxSource {
    /// Wraps a shared pool handle.
    pub fn new(pool: Arc<AuxPool>) -> Self {
        Self { pool }
    }
}

impl EntropySource for AuxSource {
    fn name(&self) -> &'static str {
        "aux"
    }

    fn reset(&self) {
        self.pool.reset_accounting();
    }

    fn curr_entropy(&self, threshold_bits: u32) -> u32 {
        self.pool.avail_entropy().min(threshold_bits)
    }

    fn max_entropy(&self) -> u32 {
        self.pool.capacity_bits()
    }

    fn get_ent(&self, slot: &mut SeedSlot, requested_bits: u32, _fully_seeded: bool) {
        let (data, credit) = self.pool.draw(requested_bits);
        slot.data = data;
        slot.e_bits = credit;
    }
}
