//! Explicit store for similarity matrices across repeated runs.
//!
//! Entries are keyed by a SHA-256 digest over the full content of both input
//! sets and the overlap rule, so updated source data always misses.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

use sha2::{Digest, Sha256};

use crate::series::SeriesSet;
use crate::similarity::{score_sets, ScoringConfig, SimilarityMatrix, SimilarityResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentKey([u8; 32]);

impl Display for ContentKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Digest of everything that determines a similarity matrix. Execution mode
/// is excluded since it does not change results.
pub fn content_key(
    candidates: &SeriesSet,
    references: &SeriesSet,
    config: &ScoringConfig,
) -> ContentKey {
    let mut hasher = Sha256::new();
    hasher.update((config.min_overlap as u64).to_le_bytes());
    for (tag, set) in [(b'C', candidates), (b'R', references)] {
        hasher.update([tag]);
        hasher.update((set.len() as u64).to_le_bytes());
        for (label, series) in set {
            hasher.update((label.len() as u64).to_le_bytes());
            hasher.update(label.as_bytes());
            hasher.update(series.first_period().map_or(-1, |p| p.ordinal()).to_le_bytes());
            hasher.update((series.len() as u64).to_le_bytes());
            for value in series.values() {
                match value {
                    Some(v) => {
                        hasher.update([1u8]);
                        hasher.update(v.to_bits().to_le_bytes());
                    }
                    None => hasher.update([0u8]),
                }
            }
        }
    }
    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    ContentKey(digest)
}

#[derive(Debug, Default)]
pub struct SimilarityCache {
    entries: HashMap<ContentKey, SimilarityMatrix>,
    hits: usize,
    misses: usize,
}

impl SimilarityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn get(&self, key: &ContentKey) -> Option<&SimilarityMatrix> {
        self.entries.get(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Returns the cached matrix for these inputs, scoring them on a miss.
    pub fn get_or_score(
        &mut self,
        candidates: &SeriesSet,
        references: &SeriesSet,
        config: &ScoringConfig,
    ) -> SimilarityResult<&SimilarityMatrix> {
        let key = content_key(candidates, references, config);
        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                self.hits += 1;
                tracing::debug!(%key, "similarity cache hit");
                Ok(&*entry.into_mut())
            }
            Entry::Vacant(entry) => {
                self.misses += 1;
                tracing::debug!(%key, "similarity cache miss");
                let matrix = score_sets(candidates, references, config)?;
                Ok(&*entry.insert(matrix))
            }
        }
    }
}
