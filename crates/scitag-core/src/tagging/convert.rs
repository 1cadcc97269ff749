//! Alignment of character-offset annotations with tokens.

use tracing::{debug, warn};

use crate::annotation::Annotation;
use crate::error::{Result, ScitagError};
use crate::tagging::bilou::{BilouPrefix, BilouTag};
use crate::tokenizer::Token;

/// A character span with its label.
pub type Span = (usize, usize, String);

/// Output of a BILOU conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// One tag per input token.
    pub tags: Vec<BilouTag>,
    /// Indices of tokens covered by an annotation that does not align with
    /// token boundaries.
    pub misaligned: Vec<usize>,
}

/// A non-whitespace token with its tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedToken {
    pub text: String,
    pub tag: BilouTag,
}

/// Converts annotations of one entity type into BILOU tags.
#[derive(Debug, Clone)]
pub struct BilouConverter {
    entity_type: String,
}

impl BilouConverter {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Tag every token; `tags.len() == tokens.len()`.
    ///
    /// # Examples
    /// ```
    /// use scitag_core::tagging::BilouConverter;
    /// use scitag_core::tokenizer::WordTokenizer;
    ///
    /// let tokens = WordTokenizer::new().unwrap().tokenize("AI is useful.");
    /// let spans = vec![(0, 2, "Task".to_string())];
    /// let conversion = BilouConverter::new("Task").convert_spans(&tokens, &spans);
    /// let tags: Vec<String> = conversion.tags.iter().map(|t| t.to_string()).collect();
    /// assert_eq!(tags, ["U-Task", "O-Task", "O-Task", "O-Task"]);
    /// ```
    pub fn convert_spans(&self, tokens: &[Token], spans: &[Span]) -> Conversion {
        let mut tags = vec![BilouTag::outside(self.entity_type.as_str()); tokens.len()];
        let mut claimed = vec![false; tokens.len()];
        let mut misaligned = Vec::new();

        for (start, end, label) in spans {
            let first = tokens.iter().position(|t| t.start == *start);
            let last = tokens.iter().position(|t| t.end == *end);

            match (first, last) {
                (Some(first), Some(last)) if first <= last => {
                    if claimed[first..=last].iter().any(|&c| c) {
                        warn!(
                            start,
                            end,
                            label = label.as_str(),
                            "annotation overlaps an earlier one; skipped"
                        );
                        continue;
                    }

                    if first == last {
                        tags[first] = BilouTag::new(BilouPrefix::Unit, label.as_str());
                    } else {
                        tags[first] = BilouTag::new(BilouPrefix::Begin, label.as_str());
                        for tag in &mut tags[first + 1..last] {
                            *tag = BilouTag::new(BilouPrefix::Inside, label.as_str());
                        }
                        tags[last] = BilouTag::new(BilouPrefix::Last, label.as_str());
                    }
                    claimed[first..=last].iter_mut().for_each(|c| *c = true);
                }
                _ => {
                    for (idx, token) in tokens.iter().enumerate() {
                        if token.start < *end && token.end > *start {
                            warn!(
                                token = token.text.as_str(),
                                token_start = token.start,
                                token_end = token.end,
                                start,
                                end,
                                "token does not align with annotation boundaries"
                            );
                            misaligned.push(idx);
                        }
                    }
                }
            }
        }

        misaligned.sort_unstable();
        misaligned.dedup();

        Conversion { tags, misaligned }
    }

    /// Tag every token from loaded annotations.
    pub fn convert(&self, tokens: &[Token], annotations: &[Annotation]) -> Conversion {
        let spans: Vec<Span> = annotations
            .iter()
            .map(|a| (a.start, a.end, a.tag.clone()))
            .collect();
        self.convert_spans(tokens, &spans)
    }

    /// Tagged tokens of a whole document, whitespace tokens dropped.
    pub fn lines(&self, tokens: &[Token], annotations: &[Annotation]) -> Vec<TaggedToken> {
        let conversion = self.convert(tokens, annotations);
        tokens
            .iter()
            .zip(conversion.tags)
            .filter(|(token, _)| !token.is_space)
            .map(|(token, tag)| TaggedToken {
                text: token.text.clone(),
                tag,
            })
            .collect()
    }

    /// Tagged tokens grouped by sentence, whitespace tokens dropped.
    ///
    /// A sentence boundary that falls inside an entity is ignored, so an
    /// entity never straddles two sentences.
    pub fn sentences(&self, tokens: &[Token], annotations: &[Annotation]) -> Vec<Vec<TaggedToken>> {
        let conversion = self.convert(tokens, annotations);

        let mut sentences = Vec::new();
        let mut current: Vec<TaggedToken> = Vec::new();

        for (token, tag) in tokens.iter().zip(conversion.tags) {
            if token.is_space {
                continue;
            }
            if token.is_sent_start && !current.is_empty() {
                if tag.prefix.continues_entity() {
                    debug!(
                        token = token.text.as_str(),
                        start = token.start,
                        "sentence boundary inside an entity; not splitting"
                    );
                } else {
                    sentences.push(std::mem::take(&mut current));
                }
            }
            current.push(TaggedToken {
                text: token.text.clone(),
                tag,
            });
        }

        if !current.is_empty() {
            sentences.push(current);
        }

        sentences
    }
}

/// Recover labeled character spans from a BILOU tag sequence.
///
/// `tokens` and `tags` must be aligned one-to-one.
pub fn offsets_from_bilou(tokens: &[Token], tags: &[BilouTag]) -> Result<Vec<Span>> {
    if tokens.len() != tags.len() {
        return Err(ScitagError::Tagging(format!(
            "{} tokens but {} tags",
            tokens.len(),
            tags.len()
        )));
    }

    let mut spans = Vec::new();
    let mut open: Option<(usize, &str)> = None;

    for (idx, (token, tag)) in tokens.iter().zip(tags).enumerate() {
        let malformed = || {
            ScitagError::Tagging(format!("unexpected tag {tag} at position {idx}"))
        };

        match tag.prefix {
            BilouPrefix::Unit | BilouPrefix::Begin | BilouPrefix::Outside if open.is_some() => {
                return Err(malformed());
            }
            BilouPrefix::Unit => spans.push((token.start, token.end, tag.entity.clone())),
            BilouPrefix::Begin => open = Some((token.start, tag.entity.as_str())),
            BilouPrefix::Outside => {}
            BilouPrefix::Inside | BilouPrefix::Last => {
                let (start, entity) = match open {
                    Some((start, entity)) if entity == tag.entity => (start, entity),
                    _ => return Err(malformed()),
                };
                if tag.prefix == BilouPrefix::Last {
                    spans.push((start, token.end, entity.to_string()));
                    open = None;
                }
            }
        }
    }

    if let Some((start, entity)) = open {
        return Err(ScitagError::Tagging(format!(
            "entity {entity} opened at offset {start} is never closed"
        )));
    }

    Ok(spans)
}
