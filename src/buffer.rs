//! Seed buffer passed between the entropy sources and the DRNG.
//!
//! The buffer holds one slot per registered source, in registry order, so
//! that downstream mixing is deterministic given the source outputs. Seed
//! material is zeroized on every exit path, including drops on error paths.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Per-source slot: the delivered bytes and their credited entropy.
#[derive(Debug, Clone, Default, Zeroize)]
pub struct SeedSlot {
    /// Conservative entropy credit for `data`, in bits. Zero means the
    /// source delivered no entropy.
    pub e_bits: u32,
    /// Raw bytes delivered by the source.
    pub data: Vec<u8>,
}

/// Ordered collection of per-source seed slots plus a timestamp.
///
/// Owned by the caller requesting a reseed; the manager borrows it
/// exclusively while filling, the DRNG consumes it afterwards.
#[derive(Debug, Zeroize, ZeroizeOnDrop)]
pub struct EntropyBuffer {
    /// Wall-clock seconds stamped when the fill began. The DRNG mixes the
    /// timestamp in even when no entropy was credited.
    pub now: u64,
    slots: Vec<SeedSlot>,
}

impl EntropyBuffer {
    /// Creates a buffer with one empty slot per source.
    pub fn for_sources(count: usize) -> Self {
        let mut eb = Self {
            now: 0,
            slots: Vec::new(),
        };
        eb.allocate(count);
        eb
    }

    /// Sizes the slot vector. Re-allocating a live buffer is reported and
    /// ignored; the existing slots are kept.
    pub fn allocate(&mut self, count: usize) {
        if !self.slots.is_empty() {
            tracing::warn!("allocating an already allocated seed buffer");
            return;
        }
        self.slots = vec![SeedSlot::default(); count];
    }

    /// Stamps the buffer with the current wall-clock time.
    pub fn stamp_now(&mut self) {
        self.now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if the buffer has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Immutable slot access in registry order.
    pub fn slots(&self) -> &[SeedSlot] {
        &self.slots
    }

    /// Mutable access to a single slot.
    pub fn slot_mut(&mut self, index: usize) -> &mut SeedSlot {
        &mut self.slots[index]
    }

    /// Sum of per-slot entropy credits, in bits. This figure is
    /// authoritative for the reseed event it was collected in.
    pub fn credited_bits(&self) -> u32 {
        self.slots
            .iter()
            .fold(0u32, |acc, slot| acc.saturating_add(slot.e_bits))
    }

    /// Clears every slot's entropy credit, leaving the data bytes in
    /// place. Used by the refusal path: the bytes cannot harm, the credit
    /// must not be claimed.
    pub fn zero_credits(&mut self) {
        for slot in &mut self.slots {
            slot.e_bits = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credited_bits_is_slot_sum() {
        let mut eb = EntropyBuffer::for_sources(3);
        eb.slot_mut(0).e_bits = 100;
        eb.slot_mut(1).e_bits = 28;
        eb.slot_mut(2).e_bits = 0;
        assert_eq!(eb.credited_bits(), 128);
    }

    #[test]
    fn test_zero_credits_keeps_data() {
        let mut eb = EntropyBuffer::for_sources(2);
        eb.slot_mut(0).e_bits = 64;
        eb.slot_mut(0).data = vec![0xAB; 16];
        eb.zero_credits();
        assert_eq!(eb.credited_bits(), 0);
        assert_eq!(eb.slots()[0].data, vec![0xAB; 16]);
    }

    #[test]
    fn test_reallocate_is_ignored() {
        let mut eb = EntropyBuffer::for_sources(2);
        eb.slot_mut(1).e_bits = 7;
        eb.allocate(5);
        assert_eq!(eb.len(), 2);
        assert_eq!(eb.credited_bits(), 7);
    }

    #[test]
    fn test_explicit_zeroize() {
        let mut eb = EntropyBuffer::for_sources(1);
        eb.slot_mut(0).data = vec![0xFF; 32];
        eb.slot_mut(0).e_bits = 256;
        eb.zeroize();
        assert!(eb.is_empty());
    }

    #[test]
    fn test_credited_bits_saturates() {
        let mut eb = EntropyBuffer::for_sources(2);
        eb.slot_mut(0).e_bits = u32::MAX;
        eb.slot_mut(1).e_bits = 1000;
        assert_eq!(eb.credited_bits(), u32::MAX);
    }
}
