//! Sequence tagging over CoNLL files.

use tracing::info;

use crate::conll::{read_sequences, ConllSequence};
use crate::dataset::config::{DatasetConfig, DatasetKind};
use crate::dataset::{debug_subset, Instance, TextDataset};
use crate::error::{Result, ScitagError};
use crate::pack::pack_to_length;
use crate::tagging::TagSet;
use crate::vocab::{SpecialTokens, Vocabulary};

const EMITS_KEYS: &[(&str, &str)] = &[
    ("tokens", "word ids padded to max_length"),
    ("len", "number of non-padding word ids"),
    ("label", "label id per position, padding positions carry the pad label"),
];

/// Token sequences with one tag each, read from one tag column.
///
/// Label ids follow the order of the [`TagSet`]; the id just past the last
/// label marks padding.
#[derive(Debug, Clone)]
pub struct TaggingDataset {
    config: DatasetConfig,
    tags: TagSet,
    lines: Vec<String>,
    labels: Vec<String>,
    sequences: Vec<ConllSequence>,
    vocab: Vocabulary,
}

impl TaggingDataset {
    /// Read `config.filename`, taking tag column `column`.
    pub fn from_file(config: DatasetConfig, tags: TagSet, column: usize) -> Result<Self> {
        let sequences = read_sequences(&config.filename, column)?;
        Self::from_sequences(config, tags, sequences)
    }

    pub fn from_sequences(
        config: DatasetConfig,
        tags: TagSet,
        sequences: Vec<ConllSequence>,
    ) -> Result<Self> {
        config.validate()?;

        for seq in &sequences {
            if let Some(unknown) = seq.tags.iter().find(|t| tags.index(t).is_none()) {
                return Err(ScitagError::Tagging(format!(
                    "tag {unknown:?} is not part of the tag set"
                )));
            }
        }

        let sequences = if config.debug {
            debug_subset(sequences, config.debug_dataset_proportion, config.split.seed)
        } else {
            sequences
        };

        let vocab_config = config.vocabulary_config();
        let vocab = match config.kind {
            DatasetKind::Train => {
                let words: Vec<Vec<&str>> = sequences
                    .iter()
                    .map(|s| s.tokens.iter().map(String::as_str).collect())
                    .collect();
                Vocabulary::load_or_build(&config.vocab_store_location, &words, &vocab_config)?
            }
            _ => Vocabulary::load(&config.vocab_store_location, &vocab_config)?,
        };

        let lines = sequences.iter().map(|s| s.tokens.join(" ")).collect();
        let labels = sequences.iter().map(|s| s.tags.join(" ")).collect();

        info!(
            kind = %config.kind,
            sequences = sequences.len(),
            tags = tags.len(),
            vocab = vocab.len(),
            "tagging dataset ready"
        );

        Ok(Self {
            config,
            tags,
            lines,
            labels,
            sequences,
            vocab,
        })
    }

    pub fn tag_set(&self) -> &TagSet {
        &self.tags
    }

    /// Label id used at padding positions.
    pub fn pad_label(&self) -> u32 {
        self.tags.len() as u32
    }

    pub fn sequences(&self) -> &[ConllSequence] {
        &self.sequences
    }

    /// Label names of `ids`, padding dropped.
    pub fn labels_from_indices(&self, ids: &[u32]) -> Vec<&str> {
        ids.iter()
            .filter_map(|&id| self.tags.label(id as usize))
            .collect()
    }
}

impl TextDataset for TaggingDataset {
    fn lines_labels(&self) -> (&[String], &[String]) {
        (&self.lines, &self.labels)
    }

    /// Every tag plus the pad label.
    fn num_classes(&self) -> usize {
        self.tags.len() + 1
    }

    fn emits_keys(&self) -> &'static [(&'static str, &'static str)] {
        EMITS_KEYS
    }

    fn config(&self) -> &DatasetConfig {
        &self.config
    }

    fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    fn instance(&self, idx: usize) -> Option<Instance> {
        let seq = self.sequences.get(idx)?;
        let max_length = self.config.max_length;
        let ids = self.vocab.encode(&seq.tokens);
        let label_ids = seq
            .tags
            .iter()
            .map(|t| self.tags.index(t).map(|i| i as u32))
            .collect::<Option<Vec<u32>>>()?;

        Some(Instance {
            tokens: pack_to_length(&ids, max_length, &SpecialTokens::PAD_ID, None),
            len: ids.len().min(max_length),
            labels: pack_to_length(&label_ids, max_length, &self.pad_label(), None),
        })
    }
}
