//! # Viterbi Decoding for CRF
//!
//! Implements the Viterbi algorithm for finding the most likely tag sequence
//! given emission scores and transition scores, restricted to the transitions
//! a [`TagSet`] allows.

use crate::error::{Result, ScitagError};
use crate::tagging::bilou::BilouTag;

/// The label inventory of a tagger and its transition constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct TagSet {
    labels: Vec<String>,
    allowed: Vec<Vec<bool>>,
    allowed_start: Vec<bool>,
    allowed_end: Vec<bool>,
}

impl TagSet {
    /// Unconstrained tag set (e.g. reference-string field labels).
    pub fn plain<S: AsRef<str>>(labels: &[S]) -> Self {
        let n = labels.len();
        Self {
            labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
            allowed: vec![vec![true; n]; n],
            allowed_start: vec![true; n],
            allowed_end: vec![true; n],
        }
    }

    /// `B`, `I`, `L`, `U` and `O` tags for each entity type, with BILOU
    /// transition constraints.
    pub fn bilou<S: AsRef<str>>(entity_types: &[S]) -> Result<Self> {
        let labels: Vec<String> = entity_types
            .iter()
            .flat_map(|entity| {
                ['B', 'I', 'L', 'U', 'O']
                    .into_iter()
                    .map(move |prefix| format!("{prefix}-{}", entity.as_ref()))
            })
            .collect();
        Self::from_bilou_labels(&labels)
    }

    /// Constrained tag set from existing BILOU label strings.
    pub fn from_bilou_labels<S: AsRef<str>>(labels: &[S]) -> Result<Self> {
        let tags = labels
            .iter()
            .map(|l| l.as_ref().parse::<BilouTag>())
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            labels: labels.iter().map(|l| l.as_ref().to_string()).collect(),
            allowed: tags
                .iter()
                .map(|from| {
                    tags.iter()
                        .map(|to| BilouTag::is_valid_transition(from, to))
                        .collect()
                })
                .collect(),
            allowed_start: tags.iter().map(BilouTag::is_valid_start).collect(),
            allowed_end: tags.iter().map(BilouTag::is_valid_end).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Get the tag index for tensor operations.
    pub fn index(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l == label)
    }

    /// Get the label of a tag index.
    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    pub fn allowed(&self, from: usize, to: usize) -> bool {
        self.allowed[from][to]
    }

    pub fn allowed_start(&self, tag: usize) -> bool {
        self.allowed_start[tag]
    }

    pub fn allowed_end(&self, tag: usize) -> bool {
        self.allowed_end[tag]
    }
}

/// Viterbi decoder for CRF tag sequences.
#[derive(Debug, Clone)]
pub struct ViterbiDecoder {
    tags: TagSet,
}

impl ViterbiDecoder {
    pub fn new(tags: TagSet) -> Self {
        Self { tags }
    }

    pub fn tag_set(&self) -> &TagSet {
        &self.tags
    }

    /// Decode the optimal tag sequence.
    ///
    /// # Arguments
    /// * `emission_scores` - Matrix of shape [seq_len, num_tags]
    /// * `transition_matrix` - Matrix of shape [num_tags, num_tags], `[from][to]`
    ///
    /// # Returns
    /// The optimal tag sequence as indices. Fails when no sequence satisfies
    /// the constraints or the dimensions do not match the tag set.
    pub fn decode(
        &self,
        emission_scores: &[Vec<f32>],
        transition_matrix: &[Vec<f32>],
    ) -> Result<Vec<usize>> {
        let num_tags = self.tags.len();
        let seq_len = emission_scores.len();
        if seq_len == 0 {
            return Ok(Vec::new());
        }

        if let Some(row) = emission_scores.iter().find(|row| row.len() != num_tags) {
            return Err(ScitagError::Tagging(format!(
                "emission score dimension mismatch: expected {num_tags}, got {}",
                row.len()
            )));
        }
        if transition_matrix.len() != num_tags
            || transition_matrix.iter().any(|row| row.len() != num_tags)
        {
            return Err(ScitagError::Tagging(format!(
                "transition matrix must be {num_tags}x{num_tags}"
            )));
        }

        // DP table
        let mut dp: Vec<Vec<f32>> = vec![vec![f32::NEG_INFINITY; num_tags]; seq_len];
        let mut backptr: Vec<Vec<usize>> = vec![vec![0; num_tags]; seq_len];

        for tag in 0..num_tags {
            if self.tags.allowed_start(tag) {
                dp[0][tag] = emission_scores[0][tag];
            }
        }

        for pos in 1..seq_len {
            for curr_tag in 0..num_tags {
                let mut best_score = f32::NEG_INFINITY;
                let mut best_prev = 0;

                for prev_tag in 0..num_tags {
                    if !self.tags.allowed(prev_tag, curr_tag) {
                        continue;
                    }

                    let score = dp[pos - 1][prev_tag] + transition_matrix[prev_tag][curr_tag];
                    if score > best_score {
                        best_score = score;
                        best_prev = prev_tag;
                    }
                }

                dp[pos][curr_tag] = best_score + emission_scores[pos][curr_tag];
                backptr[pos][curr_tag] = best_prev;
            }
        }

        // Best final tag
        let mut best_final_tag = None;
        let mut best_final_score = f32::NEG_INFINITY;
        for tag in 0..num_tags {
            if self.tags.allowed_end(tag) && dp[seq_len - 1][tag] > best_final_score {
                best_final_score = dp[seq_len - 1][tag];
                best_final_tag = Some(tag);
            }
        }
        let Some(mut curr_tag) = best_final_tag else {
            return Err(ScitagError::Tagging(
                "no tag sequence satisfies the transition constraints".into(),
            ));
        };

        let mut path = vec![curr_tag];
        for pos in (1..seq_len).rev() {
            curr_tag = backptr[pos][curr_tag];
            path.push(curr_tag);
        }

        path.reverse();
        Ok(path)
    }

    /// Decode and map the path to label strings.
    pub fn decode_labels(
        &self,
        emission_scores: &[Vec<f32>],
        transition_matrix: &[Vec<f32>],
    ) -> Result<Vec<String>> {
        Ok(self
            .decode(emission_scores, transition_matrix)?
            .into_iter()
            .map(|idx| self.tags.labels[idx].clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zeros(n: usize) -> Vec<Vec<f32>> {
        vec![vec![0.0; n]; n]
    }

    fn one_hot(tags: &TagSet, label: &str, score: f32) -> Vec<f32> {
        let mut row = vec![0.0; tags.len()];
        row[tags.index(label).unwrap()] = score;
        row
    }

    #[test]
    fn test_bilou_tag_set() {
        let tags = TagSet::bilou(&["Task"]).unwrap();
        assert_eq!(tags.labels(), ["B-Task", "I-Task", "L-Task", "U-Task", "O-Task"]);
        assert!(tags.allowed(0, 2));
        assert!(!tags.allowed(4, 1));
        assert!(!tags.allowed_start(2));
        assert!(!tags.allowed_end(0));
    }

    #[test]
    fn test_viterbi_follows_emissions() {
        let tags = TagSet::bilou(&["Task"]).unwrap();
        let decoder = ViterbiDecoder::new(tags.clone());
        let emissions = vec![
            one_hot(&tags, "B-Task", 2.0),
            one_hot(&tags, "L-Task", 2.0),
            one_hot(&tags, "O-Task", 2.0),
        ];

        let labels = decoder.decode_labels(&emissions, &zeros(tags.len())).unwrap();
        assert_eq!(labels, ["B-Task", "L-Task", "O-Task"]);
    }

    #[test]
    fn test_viterbi_respects_constraints() {
        let tags = TagSet::bilou(&["Task"]).unwrap();
        let decoder = ViterbiDecoder::new(tags.clone());
        // Greedy choice would be B-Task, O-Task which is forbidden.
        let emissions = vec![
            one_hot(&tags, "B-Task", 5.0),
            one_hot(&tags, "O-Task", 1.0),
        ];

        let labels = decoder.decode_labels(&emissions, &zeros(tags.len())).unwrap();
        assert_ne!(labels, ["B-Task", "O-Task"]);
        assert!(tags.allowed_start(tags.index(&labels[0]).unwrap()));
        assert!(tags.allowed_end(tags.index(&labels[1]).unwrap()));
    }

    #[test]
    fn test_viterbi_uses_transitions() {
        let tags = TagSet::plain(&["author", "title"]);
        let decoder = ViterbiDecoder::new(tags);
        let emissions = vec![vec![1.0, 0.0], vec![0.6, 0.5]];
        let transitions = vec![vec![-1.0, 0.0], vec![0.0, 0.0]];

        let path = decoder.decode(&emissions, &transitions).unwrap();
        assert_eq!(path, [0, 1]);
    }

    #[test]
    fn test_viterbi_empty() {
        let decoder = ViterbiDecoder::new(TagSet::bilou(&["Task"]).unwrap());
        assert!(decoder.decode(&[], &zeros(5)).unwrap().is_empty());
    }

    #[test]
    fn test_viterbi_dimension_mismatch() {
        let decoder = ViterbiDecoder::new(TagSet::bilou(&["Task"]).unwrap());
        assert!(decoder.decode(&[vec![0.0; 3]], &zeros(5)).is_err());
        assert!(decoder.decode(&[vec![0.0; 5]], &zeros(4)).is_err());
    }

    #[test]
    fn test_from_bilou_labels_rejects_plain() {
        assert!(TagSet::from_bilou_labels(&["author"]).is_err());
    }
}
