//! # Tokenizers
//!
//! Splits raw scientific text into word tokens (with character offsets,
//! whitespace and sentence-start flags) and into character tokens.
//!
//! Offsets count Unicode scalar values, not bytes, so they line up with the
//! offsets found in brat `.ann` files.

use std::path::Path;

use regex::Regex;

use crate::error::{Result, ScitagError};

/// A token extracted from a text with positional information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// The token text content
    pub text: String,
    /// Start character offset in the original string
    pub start: usize,
    /// End character offset (exclusive) in the original string
    pub end: usize,
    /// Token index in the sequence
    pub index: usize,
    /// Whether the token is a run of whitespace
    pub is_space: bool,
    /// Whether the token opens a sentence
    pub is_sent_start: bool,
}

/// Anything that can turn a line of text into a sequence of strings.
pub trait Tokenize {
    /// Tokenize a single line.
    fn words(&self, text: &str) -> Result<Vec<String>>;

    /// Tokenize every line of a batch.
    fn words_batch(&self, lines: &[String]) -> Result<Vec<Vec<String>>> {
        lines.iter().map(|line| self.words(line)).collect()
    }
}

/// Characters that close a sentence.
const SENTENCE_TERMINATORS: &[&str] = &[".", "!", "?"];

/// Decimal numbers (`3.5`, `1,000`) stay whole; everything else splits into
/// whitespace runs, word runs and single punctuation marks.
const TOKEN_PATTERN: &str = r"\s+|\d+(?:[.,]\d+)+|\w+|[^\w\s]";

/// Word tokenizer producing offset-aware tokens.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    pattern: Regex,
}

impl WordTokenizer {
    /// Create a new tokenizer instance.
    pub fn new() -> Result<Self> {
        Ok(Self {
            pattern: Regex::new(TOKEN_PATTERN)?,
        })
    }

    /// Tokenize a text into a sequence of tokens.
    ///
    /// A single ASCII space between two tokens is treated as trailing
    /// whitespace and emits nothing; any other whitespace run becomes a
    /// token with `is_space` set.
    ///
    /// # Examples
    /// ```
    /// use scitag_core::tokenizer::WordTokenizer;
    ///
    /// let tokenizer = WordTokenizer::new().unwrap();
    /// let tokens = tokenizer.tokenize("AI is useful.");
    /// let texts: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
    /// assert_eq!(texts, ["AI", "is", "useful", "."]);
    /// ```
    pub fn tokenize(&self, input: &str) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::new();
        let mut char_pos = 0;
        let mut byte_pos = 0;
        let mut sentence_pending = true;

        for m in self.pattern.find_iter(input) {
            char_pos += input[byte_pos..m.start()].chars().count();
            let len = m.as_str().chars().count();
            let start = char_pos;
            char_pos += len;
            byte_pos = m.end();

            let is_space = m.as_str().chars().all(char::is_whitespace);
            if is_space && m.as_str() == " " {
                continue;
            }

            let is_sent_start = !is_space && sentence_pending;
            if is_sent_start {
                sentence_pending = false;
            }
            if !is_space
                && SENTENCE_TERMINATORS.contains(&m.as_str())
                && input[m.end()..].chars().next().is_none_or(char::is_whitespace)
            {
                sentence_pending = true;
            }

            tokens.push(Token {
                text: m.as_str().to_string(),
                start,
                end: char_pos,
                index: tokens.len(),
                is_space,
                is_sent_start,
            });
        }

        tokens
    }

    /// Surface forms of the non-space tokens.
    pub fn tokenize_words(&self, input: &str) -> Vec<String> {
        self.tokenize(input)
            .into_iter()
            .filter(|t| !t.is_space)
            .map(|t| t.text)
            .collect()
    }

    /// Tokenize raw bytes, rejecting input that is not valid UTF-8.
    pub fn tokenize_bytes(&self, input: &[u8]) -> Result<Vec<Token>> {
        let text = std::str::from_utf8(input)
            .map_err(|e| ScitagError::Tokenizer(format!("input is not valid UTF-8: {e}")))?;
        Ok(self.tokenize(text))
    }

    /// Get the original character span covered by tokens `start_idx..end_idx`.
    pub fn get_spans(
        &self,
        tokens: &[Token],
        start_idx: usize,
        end_idx: usize,
    ) -> Option<(usize, usize)> {
        if start_idx >= tokens.len() || end_idx > tokens.len() || start_idx >= end_idx {
            return None;
        }

        Some((tokens[start_idx].start, tokens[end_idx - 1].end))
    }
}

impl Tokenize for WordTokenizer {
    fn words(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.tokenize_words(text))
    }
}

/// Splits text into one token per character.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharacterTokenizer;

impl CharacterTokenizer {
    /// Create a new character tokenizer.
    pub fn new() -> Self {
        Self
    }

    /// One string per Unicode scalar value, whitespace included.
    ///
    /// # Examples
    /// ```
    /// use scitag_core::tokenizer::CharacterTokenizer;
    ///
    /// assert_eq!(CharacterTokenizer::new().tokenize("é!"), ["é", "!"]);
    /// ```
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        text.chars().map(String::from).collect()
    }

    /// Tokenize every line of a batch, keeping line order.
    pub fn tokenize_batch(&self, lines: &[String]) -> Vec<Vec<String>> {
        lines.iter().map(|line| self.tokenize(line)).collect()
    }
}

impl Tokenize for CharacterTokenizer {
    fn words(&self, text: &str) -> Result<Vec<String>> {
        Ok(self.tokenize(text))
    }
}

/// Subword tokenizer backed by a Hugging Face `tokenizer.json`.
///
/// Loading is expensive; build one per process and hand it to whatever needs it.
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
}

impl HfTokenizer {
    /// Load a serialized tokenizer from `path`.
    ///
    /// # Errors
    /// Returns [`ScitagError::Tokenizer`] when the file is missing or not a
    /// valid tokenizer definition.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let inner = tokenizers::Tokenizer::from_file(path.as_ref())
            .map_err(|e| ScitagError::Tokenizer(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Size of the subword vocabulary, added tokens included.
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }
}

impl Tokenize for HfTokenizer {
    fn words(&self, text: &str) -> Result<Vec<String>> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| ScitagError::Tokenizer(e.to_string()))?;
        Ok(encoding.get_tokens().to_vec())
    }
}
