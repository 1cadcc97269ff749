//! # SciTag Core
//!
//! Data-to-tensor pipeline for sequence labeling and text classification of
//! scientific text: tokenization, brat annotation loading, BILOU conversion,
//! vocabularies, stratified splits, packing, embedding preloading, CoNLL I/O
//! and constrained tag decoding.
//!
//! ## Quick Start
//!
//! ```rust
//! use scitag_core::tagging::BilouConverter;
//! use scitag_core::tokenizer::WordTokenizer;
//! use scitag_core::vocab::{Vocabulary, VocabularyConfig};
//!
//! let tokenizer = WordTokenizer::new().unwrap();
//! let tokens = tokenizer.tokenize("AI is useful.");
//!
//! let conversion = BilouConverter::new("Task").convert_spans(&tokens, &[(0, 2, "Task".into())]);
//! assert_eq!(conversion.tags[0].to_string(), "U-Task");
//!
//! let vocab = Vocabulary::build(&[tokenizer.tokenize_words("AI is useful.")], &VocabularyConfig::new(10)).unwrap();
//! assert_eq!(vocab.len(), 8);
//! ```

pub mod annotation;
pub mod conll;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod pack;
pub mod split;
pub mod tagging;
pub mod tokenizer;
pub mod vocab;

// Re-export primary API
pub use annotation::{Annotation, AnnotationLoader, SCIENCE_IE_ENTITY_TYPES};
pub use conll::{merge_files, read_sequences, ConllSequence, ConllWriter};
pub use dataset::{
    Batch, ClassificationDataset, DatasetConfig, DatasetKind, Instance, TaggingDataset,
    TextDataset,
};
pub use embedding::{EmbeddingLoader, EmbeddingMatrix, EmbeddingSource, EmbeddingType, GloveFile};
pub use error::{Result, ScitagError};
pub use pack::pack_to_length;
pub use split::{StratifiedSplitter, TrainValidTest};
pub use tagging::{BilouConverter, BilouPrefix, BilouTag, TagSet, ViterbiDecoder};
pub use tokenizer::{CharacterTokenizer, HfTokenizer, Token, Tokenize, WordTokenizer};
pub use vocab::{SpecialTokens, Vocabulary, VocabularyConfig};
