use thiserror::Error;

/// Errors that can occur while turning annotated text into tensors.
#[derive(Debug, Error)]
pub enum ScitagError {
    /// A file could not be opened, read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document (vocabulary, config) could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A regex pattern failed to compile (should not happen with static patterns).
    #[error("regex compilation error: {0}")]
    Regex(#[from] regex::Error),

    /// The vocabulary is malformed or its configuration is unusable.
    #[error("vocabulary error: {0}")]
    Vocabulary(String),

    /// The stratified split cannot honor the requested proportions.
    #[error("split error: {0}")]
    Split(String),

    /// The requested embedding dimension does not match the source.
    #[error("embedding dimension mismatch: requested {requested}, source provides {found}")]
    EmbeddingDimension {
        /// Dimension asked for by the caller.
        requested: usize,
        /// Dimension of the pretrained source.
        found: usize,
    },

    /// A line of a pretrained embedding file could not be parsed.
    #[error("malformed embedding at line {line}: {reason}")]
    MalformedEmbedding {
        /// 1-based line number in the embedding file.
        line: usize,
        /// What was wrong with it.
        reason: String,
    },

    /// A CoNLL row has the wrong number of columns or files disagree.
    #[error("malformed CoNLL at line {line}: {reason}")]
    Conll {
        /// 1-based line number.
        line: usize,
        reason: String,
    },

    /// A tag sequence violates the BILOU scheme or a decoder was misused.
    #[error("tagging error: {0}")]
    Tagging(String),

    /// An invalid configuration value was provided.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A subword tokenizer could not be loaded or failed to encode.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Candle tensor error.
    #[error("tensor error: {0}")]
    Candle(#[from] candle_core::Error),
}

/// Result type alias for scitag operations.
pub type Result<T> = std::result::Result<T, ScitagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_messages() {
        let err = ScitagError::EmbeddingDimension {
            requested: 100,
            found: 50,
        };
        assert_eq!(
            err.to_string(),
            "embedding dimension mismatch: requested 100, source provides 50"
        );

        let err = ScitagError::Split("class \"title\" has 1 member".into());
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ScitagError>();
    }
}
