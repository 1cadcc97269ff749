//! # BILOU Tags for Named Entity Recognition
//!
//! Defines the tag representation used for sequence labeling of scientific
//! entities. Uses the BILOU (Begin-Inside-Last-Outside-Unit) scheme where
//! the outside tag is qualified by the entity type (`O-Task`), so that
//! independent per-type tag streams can later be merged column-wise.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ScitagError;

/// Position of a token relative to an entity span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BilouPrefix {
    Begin,
    Inside,
    Last,
    Outside,
    Unit,
}

impl BilouPrefix {
    pub fn as_char(&self) -> char {
        match self {
            BilouPrefix::Begin => 'B',
            BilouPrefix::Inside => 'I',
            BilouPrefix::Last => 'L',
            BilouPrefix::Outside => 'O',
            BilouPrefix::Unit => 'U',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'B' => Some(BilouPrefix::Begin),
            'I' => Some(BilouPrefix::Inside),
            'L' => Some(BilouPrefix::Last),
            'O' => Some(BilouPrefix::Outside),
            'U' => Some(BilouPrefix::Unit),
            _ => None,
        }
    }

    /// Check if the token continues an entity opened earlier.
    pub fn continues_entity(&self) -> bool {
        matches!(self, BilouPrefix::Inside | BilouPrefix::Last)
    }

    /// Check if an entity is still open after this token.
    pub fn leaves_entity_open(&self) -> bool {
        matches!(self, BilouPrefix::Begin | BilouPrefix::Inside)
    }
}

/// A BILOU prefix joined with an entity-type suffix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BilouTag {
    pub prefix: BilouPrefix,
    /// Entity type; empty only for a bare `O`.
    pub entity: String,
}

impl BilouTag {
    pub fn new(prefix: BilouPrefix, entity: impl Into<String>) -> Self {
        Self {
            prefix,
            entity: entity.into(),
        }
    }

    pub fn outside(entity: impl Into<String>) -> Self {
        Self::new(BilouPrefix::Outside, entity)
    }

    pub fn is_outside(&self) -> bool {
        self.prefix == BilouPrefix::Outside
    }

    /// Check if transitioning from `from` tag to `to` tag is valid.
    ///
    /// An open entity (`B`, `I`) must be continued by `I` or `L` of the same
    /// type; after a closed entity or an outside token only `B`, `U` or `O`
    /// may follow.
    pub fn is_valid_transition(from: &BilouTag, to: &BilouTag) -> bool {
        if from.prefix.leaves_entity_open() {
            to.prefix.continues_entity() && to.entity == from.entity
        } else {
            !to.prefix.continues_entity()
        }
    }

    /// Check if a sequence may start with this tag.
    pub fn is_valid_start(&self) -> bool {
        !self.prefix.continues_entity()
    }

    /// Check if a sequence may end with this tag.
    pub fn is_valid_end(&self) -> bool {
        !self.prefix.leaves_entity_open()
    }
}

impl fmt::Display for BilouTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entity.is_empty() {
            write!(f, "{}", self.prefix.as_char())
        } else {
            write!(f, "{}-{}", self.prefix.as_char(), self.entity)
        }
    }
}

impl FromStr for BilouTag {
    type Err = ScitagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let prefix = chars
            .next()
            .and_then(BilouPrefix::from_char)
            .ok_or_else(|| ScitagError::Tagging(format!("not a BILOU tag: {s:?}")))?;

        match chars.as_str() {
            "" if prefix == BilouPrefix::Outside => Ok(BilouTag::outside("")),
            rest => match rest.strip_prefix('-') {
                Some(entity) if !entity.is_empty() => Ok(BilouTag::new(prefix, entity)),
                _ => Err(ScitagError::Tagging(format!("not a BILOU tag: {s:?}"))),
            },
        }
    }
}
