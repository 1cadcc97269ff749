//! # Datasets
//!
//! Text classification and sequence tagging datasets that turn files into
//! packed integer instances, plus batching into tensors.

pub mod batch;
pub mod classification;
pub mod config;
pub mod tagging;

pub use batch::{batches, Batch, BatchTensors};
pub use classification::ClassificationDataset;
pub use config::{DatasetConfig, DatasetKind};
pub use tagging::TaggingDataset;

use std::path::Path;

use oorandom::Rand64;
use tracing::debug;

use crate::embedding::{EmbeddingLoader, EmbeddingMatrix};
use crate::error::Result;
use crate::vocab::Vocabulary;

/// One packed example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    /// Word ids, exactly `max_length` long.
    pub tokens: Vec<u32>,
    /// Number of ids in `tokens` that are not padding.
    pub len: usize,
    /// One class id (classification) or one label id per position (tagging).
    pub labels: Vec<u32>,
}

/// Common interface of every dataset.
pub trait TextDataset {
    /// Raw examples and their labels, in instance order.
    fn lines_labels(&self) -> (&[String], &[String]);

    fn num_classes(&self) -> usize;

    /// Names and descriptions of the fields each instance carries.
    fn emits_keys(&self) -> &'static [(&'static str, &'static str)];

    fn config(&self) -> &DatasetConfig;

    fn vocabulary(&self) -> &Vocabulary;

    fn instance(&self, idx: usize) -> Option<Instance>;

    fn len(&self) -> usize {
        self.lines_labels().0.len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Vectors for every vocabulary entry, as chosen by the configured
    /// embedding type. Fails when the type's width differs from the
    /// configured `embedding_dimension`.
    fn preloaded_word_embedding(&self, embeddings_dir: &Path) -> Result<EmbeddingMatrix> {
        let config = self.config();
        EmbeddingLoader::new(config.embedding_dimension())
            .with_seed(config.split.seed)
            .preload(config.embedding_type, self.vocabulary(), embeddings_dir)
    }

    /// Words of `ids` for display.
    fn display_sentence(&self, ids: &[u32]) -> String {
        self.vocabulary().decode(ids)
    }
}

/// Keep a seeded random `proportion` of `items` (at least one when any).
pub(crate) fn debug_subset<T>(items: Vec<T>, proportion: f64, seed: u64) -> Vec<T> {
    let total = items.len();
    let keep = ((proportion * total as f64).floor() as usize).clamp(total.min(1), total);

    let mut rng = Rand64::new(u128::from(seed));
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    let mut picked: Vec<usize> = (0..total).collect();
    for i in (1..total).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        picked.swap(i, j);
    }
    picked.truncate(keep);
    picked.sort_unstable();

    debug!(total, keep, "debug subset");
    picked.into_iter().filter_map(|i| slots[i].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_subset() {
        let items: Vec<u32> = (0..100).collect();
        let subset = debug_subset(items.clone(), 0.1, 1729);
        assert_eq!(subset.len(), 10);
        assert!(subset.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(subset, debug_subset(items, 0.1, 1729));

        assert_eq!(debug_subset(vec![1, 2, 3], 0.01, 1).len(), 1);
        assert!(debug_subset(Vec::<u32>::new(), 0.5, 1).is_empty());
    }
}
