//! Dataset configuration.

use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingType;
use crate::error::{Result, ScitagError};
use crate::split::StratifiedSplitter;
use crate::vocab::{SpecialTokens, VocabularyConfig};

/// Which portion of the data a dataset serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Train,
    Valid,
    Test,
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Train => "train",
            Self::Valid => "valid",
            Self::Test => "test",
        })
    }
}

impl FromStr for DatasetKind {
    type Err = ScitagError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Self::Train),
            "valid" => Ok(Self::Valid),
            "test" => Ok(Self::Test),
            _ => Err(ScitagError::Config(format!(
                "dataset kind must be one of train, valid, test; got {s:?}"
            ))),
        }
    }
}

fn default_max_num_words() -> usize {
    3000
}

fn default_max_length() -> usize {
    20
}

fn default_debug_proportion() -> f64 {
    0.1
}

/// Everything a dataset needs to turn a file into packed instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Source file of the examples.
    pub filename: PathBuf,
    pub kind: DatasetKind,
    /// Words kept in the vocabulary besides the reserved tokens.
    #[serde(default = "default_max_num_words")]
    pub max_num_words: usize,
    /// Every instance is packed to exactly this many tokens.
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    /// Where the vocabulary is stored (train) or read from (valid, test).
    pub vocab_store_location: PathBuf,
    /// Serve a random subset of the data.
    #[serde(default)]
    pub debug: bool,
    /// Share of the data kept when `debug` is set.
    #[serde(default = "default_debug_proportion")]
    pub debug_dataset_proportion: f64,
    #[serde(default)]
    pub embedding_type: EmbeddingType,
    /// Width the model expects. Defaults to the width of `embedding_type`.
    #[serde(default)]
    pub embedding_dimension: Option<usize>,
    #[serde(default)]
    pub special_tokens: SpecialTokens,
    #[serde(default)]
    pub split: StratifiedSplitter,
}

impl DatasetConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(
        filename: P,
        kind: DatasetKind,
        vocab_store_location: Q,
    ) -> Self {
        Self {
            filename: filename.into(),
            kind,
            max_num_words: default_max_num_words(),
            max_length: default_max_length(),
            vocab_store_location: vocab_store_location.into(),
            debug: false,
            debug_dataset_proportion: default_debug_proportion(),
            embedding_type: EmbeddingType::default(),
            embedding_dimension: None,
            special_tokens: SpecialTokens::default(),
            split: StratifiedSplitter::default(),
        }
    }

    /// Read a JSON config file and validate it.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config: Self = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_num_words(mut self, max_num_words: usize) -> Self {
        self.max_num_words = max_num_words;
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    /// Serve only `proportion` of the data.
    pub fn with_debug(mut self, proportion: f64) -> Self {
        self.debug = true;
        self.debug_dataset_proportion = proportion;
        self
    }

    pub fn with_embedding_type(mut self, embedding_type: EmbeddingType) -> Self {
        self.embedding_type = embedding_type;
        self
    }

    pub fn with_embedding_dimension(mut self, dimension: usize) -> Self {
        self.embedding_dimension = Some(dimension);
        self
    }

    /// Requested embedding width.
    pub fn embedding_dimension(&self) -> usize {
        self.embedding_dimension
            .unwrap_or_else(|| self.embedding_type.dimension())
    }

    pub fn with_special_tokens(mut self, special_tokens: SpecialTokens) -> Self {
        self.special_tokens = special_tokens;
        self
    }

    pub fn with_split(mut self, split: StratifiedSplitter) -> Self {
        self.split = split;
        self
    }

    /// The vocabulary configuration implied by this dataset.
    pub fn vocabulary_config(&self) -> VocabularyConfig {
        VocabularyConfig::new(self.max_num_words + SpecialTokens::COUNT)
            .with_special_tokens(self.special_tokens.clone())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(ScitagError::Config("max_length must be positive".into()));
        }
        if self.embedding_dimension == Some(0) {
            return Err(ScitagError::Config("embedding_dimension must be positive".into()));
        }
        if self.debug
            && !(self.debug_dataset_proportion > 0.0 && self.debug_dataset_proportion <= 1.0)
        {
            return Err(ScitagError::Config(format!(
                "debug_dataset_proportion must be in (0, 1], got {}",
                self.debug_dataset_proportion
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [DatasetKind::Train, DatasetKind::Valid, DatasetKind::Test] {
            assert_eq!(kind.to_string().parse::<DatasetKind>().unwrap(), kind);
        }
        assert!("dev".parse::<DatasetKind>().is_err());
    }

    #[test]
    fn test_config_from_json_defaults() {
        let json = r#"{
            "filename": "data/sectlabel.train.data",
            "kind": "valid",
            "vocab_store_location": "out/vocab.json",
            "embedding_type": "glove_6B_50"
        }"#;
        let config: DatasetConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.kind, DatasetKind::Valid);
        assert_eq!(config.max_num_words, 3000);
        assert_eq!(config.embedding_type, EmbeddingType::Glove6B(50));
        assert_eq!(config.embedding_dimension(), 50);
        assert_eq!(config.split.seed, 1729);
        assert_eq!(config.special_tokens.unk, "<UNK>");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_vocabulary_config_adds_reserved() {
        let config = DatasetConfig::new("a", DatasetKind::Train, "v.json").with_max_num_words(10);
        assert_eq!(config.vocabulary_config().max_size, 14);
    }

    #[test]
    fn test_validate() {
        let config = DatasetConfig::new("a", DatasetKind::Train, "v.json");
        assert!(config.clone().with_max_length(0).validate().is_err());
        assert!(config.clone().with_debug(0.0).validate().is_err());
        assert!(config.clone().with_embedding_dimension(0).validate().is_err());
        assert!(config.with_debug(0.5).validate().is_ok());
    }
}
