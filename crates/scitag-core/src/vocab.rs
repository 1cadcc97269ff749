//! # Vocabulary
//!
//! Frequency-ranked token ↔ id mapping shared by every split of a dataset.
//! The four reserved tokens always occupy ids `0..4`:
//!
//! | id | role  | default  |
//! |----|-------|----------|
//! | 0  | pad   | `<PAD>`  |
//! | 1  | unk   | `<UNK>`  |
//! | 2  | start | `<SOS>`  |
//! | 3  | end   | `<EOS>`  |
//!
//! A vocabulary is built once from training data, persisted as JSON, and
//! reloaded unchanged for validation and test data.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, ScitagError};

/// Surface forms of the reserved tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialTokens {
    pub pad: String,
    pub unk: String,
    pub start: String,
    pub end: String,
}

impl SpecialTokens {
    pub const PAD_ID: u32 = 0;
    pub const UNK_ID: u32 = 1;
    pub const START_ID: u32 = 2;
    pub const END_ID: u32 = 3;
    /// Number of reserved ids.
    pub const COUNT: usize = 4;

    /// Reserved tokens in id order.
    pub fn in_id_order(&self) -> [&str; Self::COUNT] {
        [
            self.pad.as_str(),
            self.unk.as_str(),
            self.start.as_str(),
            self.end.as_str(),
        ]
    }

    fn contains(&self, token: &str) -> bool {
        self.in_id_order().contains(&token)
    }
}

impl Default for SpecialTokens {
    fn default() -> Self {
        Self {
            pad: "<PAD>".into(),
            unk: "<UNK>".into(),
            start: "<SOS>".into(),
            end: "<EOS>".into(),
        }
    }
}

/// Configuration for building a vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyConfig {
    /// Upper bound on the number of entries, reserved tokens included.
    pub max_size: usize,
    #[serde(default)]
    pub special_tokens: SpecialTokens,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            special_tokens: SpecialTokens::default(),
        }
    }
}

impl VocabularyConfig {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    pub fn with_special_tokens(mut self, special_tokens: SpecialTokens) -> Self {
        self.special_tokens = special_tokens;
        self
    }
}

/// On-disk form of a vocabulary.
#[derive(Debug, Serialize, Deserialize)]
struct VocabularyFile {
    max_size: usize,
    tokens: BTreeMap<String, u32>,
}

/// Bidirectional token ↔ id mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    token_to_id: HashMap<String, u32>,
    id_to_token: Vec<String>,
    special: SpecialTokens,
    max_size: usize,
}

impl Vocabulary {
    /// Build from tokenized sequences, keeping the `max_size - 4` most
    /// frequent tokens. Ties keep first-seen order.
    pub fn build<S: AsRef<str>>(sequences: &[Vec<S>], config: &VocabularyConfig) -> Result<Self> {
        if config.max_size < SpecialTokens::COUNT {
            return Err(ScitagError::Vocabulary(format!(
                "max_size {} cannot hold the {} reserved tokens",
                config.max_size,
                SpecialTokens::COUNT
            )));
        }

        let special = &config.special_tokens;
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for token in sequences.iter().flatten().map(|t| t.as_ref()) {
            if special.contains(token) {
                continue;
            }
            match positions.get(token) {
                Some(&pos) => counts[pos].1 += 1,
                None => {
                    positions.insert(token, counts.len());
                    counts.push((token, 1));
                }
            }
        }

        let distinct = counts.len();
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        counts.truncate(config.max_size - SpecialTokens::COUNT);

        let id_to_token: Vec<String> = special
            .in_id_order()
            .into_iter()
            .chain(counts.iter().map(|(token, _)| *token))
            .map(str::to_string)
            .collect();

        debug!(
            distinct,
            kept = id_to_token.len() - SpecialTokens::COUNT,
            "built vocabulary"
        );

        Ok(Self::from_id_order(id_to_token, special.clone(), config.max_size))
    }

    fn from_id_order(id_to_token: Vec<String>, special: SpecialTokens, max_size: usize) -> Self {
        let token_to_id = id_to_token
            .iter()
            .enumerate()
            .map(|(id, token)| (token.clone(), id as u32))
            .collect();
        Self {
            token_to_id,
            id_to_token,
            special,
            max_size,
        }
    }

    /// Persist as JSON.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = VocabularyFile {
            max_size: self.max_size,
            tokens: self
                .id_to_token
                .iter()
                .enumerate()
                .map(|(id, token)| (token.clone(), id as u32))
                .collect(),
        };

        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, &file)?;
        writer.flush()?;
        Ok(())
    }

    /// Load a persisted vocabulary, checking that the reserved tokens of
    /// `config` sit at their fixed ids and that ids are contiguous.
    pub fn load<P: AsRef<Path>>(path: P, config: &VocabularyConfig) -> Result<Self> {
        let path = path.as_ref();
        let file: VocabularyFile = serde_json::from_reader(BufReader::new(File::open(path)?))?;

        let mut id_to_token: Vec<Option<String>> = vec![None; file.tokens.len()];
        for (token, id) in file.tokens {
            let slot = id_to_token.get_mut(id as usize).ok_or_else(|| {
                ScitagError::Vocabulary(format!("id {id} of {token:?} is out of range"))
            })?;
            if let Some(other) = slot.replace(token.clone()) {
                return Err(ScitagError::Vocabulary(format!(
                    "id {id} assigned to both {other:?} and {token:?}"
                )));
            }
        }
        // Every slot is filled: n distinct tokens mapped injectively into 0..n.
        let id_to_token: Vec<String> = id_to_token.into_iter().flatten().collect();

        for (id, reserved) in config.special_tokens.in_id_order().into_iter().enumerate() {
            if id_to_token.get(id).map(String::as_str) != Some(reserved) {
                return Err(ScitagError::Vocabulary(format!(
                    "{} does not hold reserved token {reserved:?} at id {id}",
                    path.display()
                )));
            }
        }

        if id_to_token.len() > file.max_size {
            return Err(ScitagError::Vocabulary(format!(
                "{} holds {} tokens but its max_size is {}",
                path.display(),
                id_to_token.len(),
                file.max_size
            )));
        }

        if file.max_size != config.max_size {
            warn!(
                stored = file.max_size,
                requested = config.max_size,
                "vocabulary was built with a different max_size; using the stored one"
            );
        }

        info!(path = %path.display(), size = id_to_token.len(), "loaded vocabulary");
        Ok(Self::from_id_order(
            id_to_token,
            config.special_tokens.clone(),
            file.max_size,
        ))
    }

    /// Reuse the vocabulary at `path` if present, otherwise build it from
    /// `sequences` and store it there. Meant for the training split only.
    pub fn load_or_build<P: AsRef<Path>, S: AsRef<str>>(
        path: P,
        sequences: &[Vec<S>],
        config: &VocabularyConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::load(path, config);
        }

        let vocab = Self::build(sequences, config)?;
        vocab.save(path)?;
        info!(path = %path.display(), size = vocab.len(), "stored new vocabulary");
        Ok(vocab)
    }

    /// Id of `token`, or the unknown id.
    pub fn lookup(&self, token: &str) -> u32 {
        self.token_to_id
            .get(token)
            .copied()
            .unwrap_or(SpecialTokens::UNK_ID)
    }

    pub fn contains(&self, token: &str) -> bool {
        self.token_to_id.contains_key(token)
    }

    /// Token for `id`, if in range.
    pub fn token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).map(String::as_str)
    }

    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<u32> {
        tokens.iter().map(|t| self.lookup(t.as_ref())).collect()
    }

    /// Space-joined tokens of `ids`, for display.
    pub fn decode(&self, ids: &[u32]) -> String {
        ids.iter()
            .map(|&id| self.token(id).unwrap_or(self.special.unk.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Tokens in id order.
    pub fn tokens(&self) -> &[String] {
        &self.id_to_token
    }

    pub fn special_tokens(&self) -> &SpecialTokens {
        &self.special
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_to_token.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempdir::TempDir;

    fn corpus(lines: &[&str]) -> Vec<Vec<String>> {
        lines
            .iter()
            .map(|l| l.split_whitespace().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_reserved_ids() {
        let vocab = Vocabulary::build(&corpus(&["x y"]), &VocabularyConfig::new(10)).unwrap();
        assert_eq!(vocab.token(0), Some("<PAD>"));
        assert_eq!(vocab.token(1), Some("<UNK>"));
        assert_eq!(vocab.token(2), Some("<SOS>"));
        assert_eq!(vocab.token(3), Some("<EOS>"));
        assert_eq!(vocab.len(), 6);
    }

    #[test]
    fn test_tie_break_first_seen() {
        let sequences = vec![vec!["a", "a", "b", "c"]];
        let config = VocabularyConfig::new(SpecialTokens::COUNT + 2);
        let vocab = Vocabulary::build(&sequences, &config).unwrap();

        assert_eq!(vocab.len(), 6);
        assert_eq!(vocab.lookup("a"), 4);
        assert_eq!(vocab.lookup("b"), 5);
        assert!(!vocab.contains("c"));
        assert_eq!(vocab.lookup("c"), SpecialTokens::UNK_ID);
    }

    #[test]
    fn test_frequency_ranking() {
        let vocab = Vocabulary::build(
            &corpus(&["the cat", "the dog", "a dog the"]),
            &VocabularyConfig::new(100),
        )
        .unwrap();
        assert_eq!(&vocab.tokens()[4..], ["the", "dog", "cat", "a"]);
    }

    #[test]
    fn test_size_cap() {
        let config = VocabularyConfig::new(5);
        let vocab = Vocabulary::build(&corpus(&["a b c d e f"]), &config).unwrap();
        assert!(vocab.len() <= config.max_size);
        assert!(Vocabulary::build(&corpus(&["a"]), &VocabularyConfig::new(3)).is_err());
    }

    #[test]
    fn test_special_tokens_in_corpus_not_duplicated() {
        let vocab =
            Vocabulary::build(&corpus(&["<PAD> x <UNK>"]), &VocabularyConfig::new(10)).unwrap();
        assert_eq!(vocab.len(), 5);
        assert_eq!(vocab.lookup("<PAD>"), SpecialTokens::PAD_ID);
    }

    #[test]
    fn test_encode_decode() {
        let vocab = Vocabulary::build(&corpus(&["deep learning"]), &VocabularyConfig::new(10)).unwrap();
        let ids = vocab.encode(&["deep", "parsing", "learning"]);
        assert_eq!(ids, [4, SpecialTokens::UNK_ID, 5]);
        assert_eq!(vocab.decode(&ids), "deep <UNK> learning");
        assert_eq!(vocab.decode(&[99]), "<UNK>");
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new("scitag-vocab").unwrap();
        let path = dir.path().join("vocab.json");
        let config = VocabularyConfig::new(8);

        let vocab = Vocabulary::build(&corpus(&["x y z x", "y q"]), &config).unwrap();
        vocab.save(&path).unwrap();
        let loaded = Vocabulary::load(&path, &config).unwrap();
        assert_eq!(loaded, vocab);
    }

    #[test]
    fn test_load_rejects_missing_reserved() {
        let dir = TempDir::new("scitag-vocab").unwrap();
        let path = dir.path().join("vocab.json");
        fs::write(
            &path,
            r#"{"max_size": 10, "tokens": {"<PAD>": 0, "<UNK>": 1, "<SOS>": 2, "word": 3}}"#,
        )
        .unwrap();

        let err = Vocabulary::load(&path, &VocabularyConfig::new(10)).unwrap_err();
        assert!(matches!(err, ScitagError::Vocabulary(_)));
    }

    #[test]
    fn test_load_rejects_gaps_and_duplicates() {
        let dir = TempDir::new("scitag-vocab").unwrap();
        let path = dir.path().join("vocab.json");
        let config = VocabularyConfig::new(10);

        fs::write(
            &path,
            r#"{"max_size": 10, "tokens": {"<PAD>": 0, "<UNK>": 1, "<SOS>": 2, "<EOS>": 3, "w": 7}}"#,
        )
        .unwrap();
        assert!(Vocabulary::load(&path, &config).is_err());

        fs::write(
            &path,
            r#"{"max_size": 10, "tokens": {"<PAD>": 0, "<UNK>": 1, "<SOS>": 2, "<EOS>": 3, "w": 3}}"#,
        )
        .unwrap();
        assert!(Vocabulary::load(&path, &config).is_err());
    }

    #[test]
    fn test_load_rejects_oversized_file() {
        let dir = TempDir::new("scitag-vocab").unwrap();
        let path = dir.path().join("vocab.json");
        fs::write(
            &path,
            r#"{"max_size": 5, "tokens": {"<PAD>": 0, "<UNK>": 1, "<SOS>": 2, "<EOS>": 3, "a": 4, "b": 5}}"#,
        )
        .unwrap();

        let err = Vocabulary::load(&path, &VocabularyConfig::new(5)).unwrap_err();
        assert!(matches!(err, ScitagError::Vocabulary(_)));
    }

    #[test]
    fn test_load_or_build_reuses_file() {
        let dir = TempDir::new("scitag-vocab").unwrap();
        let path = dir.path().join("vocab.json");
        let config = VocabularyConfig::new(10);

        let built = Vocabulary::load_or_build(&path, &corpus(&["alpha beta"]), &config).unwrap();
        assert!(path.exists());
        let reused = Vocabulary::load_or_build(&path, &corpus(&["gamma"]), &config).unwrap();
        assert_eq!(built, reused);
        assert!(!reused.contains("gamma"));
    }
}
