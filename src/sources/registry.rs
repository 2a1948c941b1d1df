//! Ordered registry of entropy sources.

use std::sync::Arc;

use super::aux_pool::{AuxPool, AuxSource};
use super::EntropySource;

/// Fixed, ordered collection of source handles.
///
/// The order is canonical: it determines the slot each source fills in the
/// seed buffer. The auxiliary pool is always the final entry, acting as
/// the sink for externally-injected entropy and the bootstrap seed. No
/// sources are added or removed after construction.
pub struct SourceRegistry {
    sources: Vec<Box<dyn EntropySource>>,
}

impl SourceRegistry {
    /// Builds a registry from the compiled-in sources, appending the
    /// auxiliary pool as the last entry.
    pub fn new(mut sources: Vec<Box<dyn EntropySource>>, aux: Arc<AuxPool>) -> Self {
        sources.push(Box::new(AuxSource::new(aux)));
        Self { sources }
    }

    /// Number of registered sources, including the auxiliary pool.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Returns true if the registry is empty. Never the case after
    /// construction; the auxiliary pool is always present.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Looks up a source by its stable index.
    pub fn get(&self, index: usize) -> Option<&dyn EntropySource> {
        self.sources.get(index).map(Box::as_ref)
    }

    /// Iterates the sources in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn EntropySource> {
        self.sources.iter().map(Box::as_ref)
    }

    /// The auxiliary source (always the last entry).
    pub fn aux(&self) -> &dyn EntropySource {
        self.sources
            .last()
            .map(Box::as_ref)
            .expect("registry always holds the aux source")
    }
}
