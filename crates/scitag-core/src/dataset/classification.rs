//! Text classification over `text###label` lines.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufRead, BufReader};

use tracing::{info, warn};

use crate::dataset::config::{DatasetConfig, DatasetKind};
use crate::dataset::{debug_subset, Instance, TextDataset};
use crate::error::{Result, ScitagError};
use crate::pack::pack_to_length;
use crate::tokenizer::WordTokenizer;
use crate::vocab::{SpecialTokens, Vocabulary};

/// Separator between the text and the label of a line.
pub const LABEL_SEP: &str = "###";

const EMITS_KEYS: &[(&str, &str)] = &[
    ("tokens", "word ids packed to max_length with start and end markers"),
    ("len", "number of non-padding word ids"),
    ("label", "class id of the line"),
];

/// One split of a stratified text classification corpus.
#[derive(Debug, Clone)]
pub struct ClassificationDataset {
    config: DatasetConfig,
    lines: Vec<String>,
    labels: Vec<String>,
    class_names: Vec<String>,
    words: Vec<Vec<String>>,
    vocab: Vocabulary,
}

impl ClassificationDataset {
    /// Read `config.filename` and select the split named by `config.kind`.
    pub fn from_file(config: DatasetConfig, tokenizer: &WordTokenizer) -> Result<Self> {
        let file = File::open(&config.filename)?;
        let raw = BufReader::new(file).lines().collect::<std::io::Result<Vec<_>>>()?;
        Self::from_lines(config, tokenizer, &raw)
    }

    pub fn from_lines<S: AsRef<str>>(
        config: DatasetConfig,
        tokenizer: &WordTokenizer,
        raw: &[S],
    ) -> Result<Self> {
        config.validate()?;

        let (all_lines, all_labels): (Vec<String>, Vec<String>) = raw
            .iter()
            .enumerate()
            .filter_map(|(idx, line)| {
                let line = line.as_ref().trim();
                if line.is_empty() {
                    return None;
                }
                match line.rsplit_once(LABEL_SEP) {
                    Some((text, label)) => Some((text.trim().to_string(), label.trim().to_string())),
                    None => {
                        warn!(line = idx + 1, "no {LABEL_SEP} separator; skipping line");
                        None
                    }
                }
            })
            .unzip();

        if all_lines.is_empty() {
            return Err(ScitagError::Config(format!(
                "{} holds no labeled lines",
                config.filename.display()
            )));
        }

        let class_names: Vec<String> = all_labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let split = config.split.split(all_lines, all_labels)?;
        let part = match config.kind {
            DatasetKind::Train => split.train,
            DatasetKind::Valid => split.valid,
            DatasetKind::Test => split.test,
        };
        let part = if config.debug {
            debug_subset(part, config.debug_dataset_proportion, config.split.seed)
        } else {
            part
        };
        let (lines, labels): (Vec<String>, Vec<String>) = part.into_iter().unzip();

        let words: Vec<Vec<String>> = lines.iter().map(|l| tokenizer.tokenize_words(l)).collect();
        let vocab_config = config.vocabulary_config();
        let vocab = match config.kind {
            DatasetKind::Train => {
                Vocabulary::load_or_build(&config.vocab_store_location, &words, &vocab_config)?
            }
            _ => Vocabulary::load(&config.vocab_store_location, &vocab_config)?,
        };

        info!(
            kind = %config.kind,
            lines = lines.len(),
            classes = class_names.len(),
            vocab = vocab.len(),
            "classification dataset ready"
        );

        Ok(Self {
            config,
            lines,
            labels,
            class_names,
            words,
            vocab,
        })
    }

    /// Class names in id order.
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn class_index(&self, name: &str) -> Option<u32> {
        self.class_names
            .binary_search_by(|c| c.as_str().cmp(name))
            .ok()
            .map(|idx| idx as u32)
    }

    pub fn class_names_from_indices(&self, indices: &[u32]) -> Vec<&str> {
        indices
            .iter()
            .filter_map(|&idx| self.class_names.get(idx as usize).map(String::as_str))
            .collect()
    }
}

impl TextDataset for ClassificationDataset {
    fn lines_labels(&self) -> (&[String], &[String]) {
        (&self.lines, &self.labels)
    }

    fn num_classes(&self) -> usize {
        self.class_names.len()
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
        let words = self.words.get(idx)?;
        let label = self.class_index(&self.labels[idx])?;
        let ids = self.vocab.encode(words);
        let max_length = self.config.max_length;

        Some(Instance {
            tokens: pack_to_length(
                &ids,
                max_length,
                &SpecialTokens::PAD_ID,
                Some((&SpecialTokens::START_ID, &SpecialTokens::END_ID)),
            ),
            len: (ids.len() + 2).min(max_length),
            labels: vec![label],
        })
    }
}
