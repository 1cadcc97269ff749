//! # Embedding Preloader
//!
//! Builds a `[vocab_len, dim]` matrix of word vectors aligned with a
//! [`Vocabulary`]: pretrained vectors where the source has the token, seeded
//! random vectors where it does not, and an all-zero row for padding.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use candle_core::{Device, Tensor};
use candle_nn::Embedding;
use oorandom::Rand64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ScitagError};
use crate::vocab::{SpecialTokens, Vocabulary};

/// Dimension used by `"random"` when none is given.
pub const DEFAULT_RANDOM_DIM: usize = 100;

const GLOVE_6B_DIMS: [usize; 4] = [50, 100, 200, 300];

/// Which vectors to initialize an embedding layer with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EmbeddingType {
    /// Stanford GloVe 6B vectors (lowercased vocabulary).
    Glove6B(usize),
    /// No pretrained vectors; every row is drawn at random.
    Random(usize),
}

impl EmbeddingType {
    pub fn dimension(&self) -> usize {
        match self {
            Self::Glove6B(dim) | Self::Random(dim) => *dim,
        }
    }

    /// File name of the pretrained vectors inside an embeddings directory.
    pub fn file_name(&self) -> Option<String> {
        match self {
            Self::Glove6B(dim) => Some(format!("glove.6B.{dim}d.txt")),
            Self::Random(_) => None,
        }
    }
}

impl Default for EmbeddingType {
    fn default() -> Self {
        Self::Random(DEFAULT_RANDOM_DIM)
    }
}

impl fmt::Display for EmbeddingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glove6B(dim) => write!(f, "glove_6B_{dim}"),
            Self::Random(dim) if *dim == DEFAULT_RANDOM_DIM => f.write_str("random"),
            Self::Random(dim) => write!(f, "random_{dim}"),
        }
    }
}

impl FromStr for EmbeddingType {
    type Err = ScitagError;

    /// Accepts `glove_6B_50`, `glove_6B_100`, `glove_6B_200`, `glove_6B_300`,
    /// `random` and `random_<dim>`.
    fn from_str(s: &str) -> Result<Self> {
        let parse_dim = |dim: &str| {
            dim.parse::<usize>()
                .ok()
                .filter(|&d| d > 0)
                .ok_or_else(|| ScitagError::Config(format!("bad embedding dimension in {s:?}")))
        };

        if let Some(dim) = s.strip_prefix("glove_6B_") {
            let dim = parse_dim(dim)?;
            if !GLOVE_6B_DIMS.contains(&dim) {
                return Err(ScitagError::Config(format!(
                    "GloVe 6B ships dimensions {GLOVE_6B_DIMS:?}, not {dim}"
                )));
            }
            return Ok(Self::Glove6B(dim));
        }
        if s == "random" {
            return Ok(Self::Random(DEFAULT_RANDOM_DIM));
        }
        if let Some(dim) = s.strip_prefix("random_") {
            return Ok(Self::Random(parse_dim(dim)?));
        }

        Err(ScitagError::Config(format!("unknown embedding type {s:?}")))
    }
}

impl TryFrom<String> for EmbeddingType {
    type Error = ScitagError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<EmbeddingType> for String {
    fn from(value: EmbeddingType) -> Self {
        value.to_string()
    }
}

/// A lookup table of pretrained vectors.
pub trait EmbeddingSource {
    fn dimension(&self) -> usize;

    fn vector(&self, token: &str) -> Option<&[f32]>;
}

/// Vectors read from a whitespace-separated text file (`word v1 ... vd`).
#[derive(Debug, Clone)]
pub struct GloveFile {
    dimension: usize,
    lowercase: bool,
    vectors: HashMap<String, Vec<f32>>,
}

impl GloveFile {
    /// Load `path`, requiring every row to carry `dimension` values.
    pub fn load<P: AsRef<Path>>(path: P, dimension: usize) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let glove = Self::parse(BufReader::new(file), dimension)?;
        info!(path = %path.display(), words = glove.len(), dimension, "loaded pretrained vectors");
        Ok(glove)
    }

    /// Parse vectors from any reader. The width of the first row is compared
    /// with `dimension` before anything is stored.
    pub fn parse<R: BufRead>(reader: R, dimension: usize) -> Result<Self> {
        let mut vectors = HashMap::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else {
                continue;
            };
            let values = parts
                .map(|v| {
                    v.parse::<f32>().map_err(|e| ScitagError::MalformedEmbedding {
                        line: line_no,
                        reason: format!("{v:?}: {e}"),
                    })
                })
                .collect::<Result<Vec<f32>>>()?;

            if values.len() != dimension {
                if vectors.is_empty() {
                    return Err(ScitagError::EmbeddingDimension {
                        requested: dimension,
                        found: values.len(),
                    });
                }
                return Err(ScitagError::MalformedEmbedding {
                    line: line_no,
                    reason: format!("expected {dimension} values, found {}", values.len()),
                });
            }

            vectors.insert(word.to_string(), values);
        }

        Ok(Self {
            dimension,
            lowercase: true,
            vectors,
        })
    }

    /// Whether lookups lowercase the token first (GloVe 6B is uncased).
    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl EmbeddingSource for GloveFile {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn vector(&self, token: &str) -> Option<&[f32]> {
        if self.lowercase {
            self.vectors.get(&token.to_lowercase())
        } else {
            self.vectors.get(token)
        }
        .map(Vec::as_slice)
    }
}

/// Row-major `[rows, dim]` matrix, row `i` belonging to vocabulary id `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    dim: usize,
    data: Vec<f32>,
}

impl EmbeddingMatrix {
    pub fn dimension(&self) -> usize {
        self.dim
    }

    pub fn rows(&self) -> usize {
        if self.dim == 0 { 0 } else { self.data.len() / self.dim }
    }

    pub fn row(&self, id: u32) -> Option<&[f32]> {
        let start = id as usize * self.dim;
        self.data.get(start..start + self.dim)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_vec(
            self.data.clone(),
            (self.rows(), self.dim),
            device,
        )?)
    }

    /// An embedding layer initialized with this matrix.
    pub fn embedding_layer(&self, device: &Device) -> Result<Embedding> {
        Ok(Embedding::new(self.to_tensor(device)?, self.dim))
    }
}

/// Aligns vectors with a vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingLoader {
    pub dimension: usize,
    /// Seed for vectors of tokens the source does not cover.
    pub seed: u64,
    /// Random values are drawn uniformly from `[-scale, scale)`.
    pub scale: f32,
}

impl EmbeddingLoader {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            seed: 1729,
            scale: 0.1,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    /// One row per vocabulary id: source vector when available, otherwise
    /// random. The pad row is all zeros.
    pub fn load<S: EmbeddingSource + ?Sized>(
        &self,
        vocab: &Vocabulary,
        source: &S,
    ) -> Result<EmbeddingMatrix> {
        if source.dimension() != self.dimension {
            return Err(ScitagError::EmbeddingDimension {
                requested: self.dimension,
                found: source.dimension(),
            });
        }
        Ok(self.fill(vocab, |token| source.vector(token)))
    }

    /// Every row random except the pad row.
    pub fn random(&self, vocab: &Vocabulary) -> EmbeddingMatrix {
        self.fill(vocab, |_| None)
    }

    /// Resolve `kind` against `embeddings_dir` and build the matrix.
    pub fn preload<P: AsRef<Path>>(
        &self,
        kind: EmbeddingType,
        vocab: &Vocabulary,
        embeddings_dir: P,
    ) -> Result<EmbeddingMatrix> {
        if kind.dimension() != self.dimension {
            return Err(ScitagError::EmbeddingDimension {
                requested: self.dimension,
                found: kind.dimension(),
            });
        }
        match kind.file_name() {
            Some(name) => {
                let glove = GloveFile::load(embeddings_dir.as_ref().join(name), self.dimension)?;
                self.load(vocab, &glove)
            }
            None => Ok(self.random(vocab)),
        }
    }

    fn fill<'a, F>(&self, vocab: &'a Vocabulary, lookup: F) -> EmbeddingMatrix
    where
        F: Fn(&'a str) -> Option<&'a [f32]>,
    {
        let mut rng = Rand64::new(u128::from(self.seed));
        let mut data = Vec::with_capacity(vocab.len() * self.dimension);
        let mut hits = 0usize;

        for (id, token) in vocab.tokens().iter().enumerate() {
            if id as u32 == SpecialTokens::PAD_ID {
                data.extend(std::iter::repeat(0.0).take(self.dimension));
                continue;
            }
            match lookup(token) {
                Some(vector) => {
                    hits += 1;
                    data.extend_from_slice(vector);
                }
                None => data.extend((0..self.dimension).map(|_| {
                    (rng.rand_float() as f32 * 2.0 - 1.0) * self.scale
                })),
            }
        }

        debug!(
            rows = vocab.len(),
            hits,
            misses = vocab.len().saturating_sub(hits + 1),
            "filled embedding matrix"
        );

        EmbeddingMatrix {
            dim: self.dimension,
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocab::VocabularyConfig;
    use std::io::Cursor;

    const GLOVE: &str = "the 0.1 0.2 0.3\nnetwork 1.0 1.0 1.0\n";

    fn vocab() -> Vocabulary {
        let corpus = vec![vec!["The", "network", "learns"]];
        Vocabulary::build(&corpus, &VocabularyConfig::new(10)).unwrap()
    }

    #[test]
    fn test_parse_embedding_type() {
        assert_eq!("glove_6B_50".parse::<EmbeddingType>().unwrap(), EmbeddingType::Glove6B(50));
        assert_eq!("glove_6B_300".parse::<EmbeddingType>().unwrap(), EmbeddingType::Glove6B(300));
        assert_eq!("random".parse::<EmbeddingType>().unwrap(), EmbeddingType::Random(100));
        assert_eq!("random_32".parse::<EmbeddingType>().unwrap(), EmbeddingType::Random(32));
        assert!("glove_6B_64".parse::<EmbeddingType>().is_err());
        assert!("word2vec".parse::<EmbeddingType>().is_err());
        assert_eq!(EmbeddingType::Glove6B(100).to_string(), "glove_6B_100");
        assert_eq!(
            EmbeddingType::Glove6B(200).file_name().as_deref(),
            Some("glove.6B.200d.txt")
        );
    }

    #[test]
    fn test_embedding_type_serde() {
        let json = serde_json::to_string(&EmbeddingType::Glove6B(50)).unwrap();
        assert_eq!(json, "\"glove_6B_50\"");
        let back: EmbeddingType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, EmbeddingType::Glove6B(50));
    }

    #[test]
    fn test_matrix_shape_and_pad_row() {
        let vocab = vocab();
        let glove = GloveFile::parse(Cursor::new(GLOVE), 3).unwrap();
        let matrix = EmbeddingLoader::new(3).load(&vocab, &glove).unwrap();

        assert_eq!(matrix.rows(), vocab.len());
        assert_eq!(matrix.row(SpecialTokens::PAD_ID).unwrap(), [0.0, 0.0, 0.0]);
        // Lookup is lowercased.
        assert_eq!(matrix.row(vocab.lookup("The")).unwrap(), [0.1, 0.2, 0.3]);
        assert_eq!(matrix.row(vocab.lookup("network")).unwrap(), [1.0, 1.0, 1.0]);
        let miss = matrix.row(vocab.lookup("learns")).unwrap();
        assert!(miss.iter().all(|v| v.abs() <= 0.1));
    }

    #[test]
    fn test_matrix_is_deterministic() {
        let vocab = vocab();
        let loader = EmbeddingLoader::new(4);
        assert_eq!(loader.random(&vocab), loader.random(&vocab));
        assert_ne!(loader.random(&vocab), loader.clone().with_seed(7).random(&vocab));
    }

    #[test]
    fn test_dimension_mismatch_is_fatal() {
        let glove = GloveFile::parse(Cursor::new(GLOVE), 3).unwrap();
        let err = EmbeddingLoader::new(50).load(&vocab(), &glove).unwrap_err();
        assert!(matches!(
            err,
            ScitagError::EmbeddingDimension { requested: 50, found: 3 }
        ));

        let err = GloveFile::parse(Cursor::new(GLOVE), 50).unwrap_err();
        assert!(matches!(err, ScitagError::EmbeddingDimension { found: 3, .. }));
    }

    #[test]
    fn test_ragged_row_is_malformed() {
        let text = "a 1 2 3\nb 1 2\n";
        let err = GloveFile::parse(Cursor::new(text), 3).unwrap_err();
        assert!(matches!(err, ScitagError::MalformedEmbedding { line: 2, .. }));

        let err = GloveFile::parse(Cursor::new("a 1 x 3\n"), 3).unwrap_err();
        assert!(matches!(err, ScitagError::MalformedEmbedding { line: 1, .. }));
    }

    #[test]
    fn test_to_tensor_and_layer() {
        let vocab = vocab();
        let matrix = EmbeddingLoader::new(4).random(&vocab);
        let tensor = matrix.to_tensor(&Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), [vocab.len(), 4]);

        let layer = matrix.embedding_layer(&Device::Cpu).unwrap();
        assert_eq!(layer.embeddings().dims(), [vocab.len(), 4]);
    }

    #[test]
    fn test_preload_random() {
        let vocab = vocab();
        let matrix = EmbeddingLoader::new(100)
            .preload(EmbeddingType::Random(100), &vocab, "unused")
            .unwrap();
        assert_eq!(matrix.rows(), vocab.len());
        assert!(EmbeddingLoader::new(50)
            .preload(EmbeddingType::Random(100), &vocab, "unused")
            .is_err());
    }
}
