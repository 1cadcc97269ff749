//! # Stratified Train / Validation / Test Split
//!
//! Partitions labeled examples so that every class keeps roughly the same
//! share in each part. The split happens twice: train against the held-out
//! remainder, then the remainder into test and validation.

use oorandom::Rand64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, ScitagError};

const EPS: f64 = 1e-9;

/// The three disjoint parts of a split, each an ordered list of
/// `(example, label)` pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainValidTest<T> {
    pub train: Vec<(T, String)>,
    pub valid: Vec<(T, String)>,
    pub test: Vec<(T, String)>,
}

/// Label-stratified random splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StratifiedSplitter {
    /// Share of all examples that goes to train.
    pub train_fraction: f64,
    /// Share of all examples held out for test and validation together.
    pub test_fraction: f64,
    /// Share of the held-out examples that goes to validation.
    pub validation_fraction: f64,
    pub seed: u64,
}

impl Default for StratifiedSplitter {
    fn default() -> Self {
        Self {
            train_fraction: 0.8,
            test_fraction: 0.2,
            validation_fraction: 0.5,
            seed: 1729,
        }
    }
}

impl StratifiedSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fractions(mut self, train: f64, test: f64, validation: f64) -> Self {
        self.train_fraction = train;
        self.test_fraction = test;
        self.validation_fraction = validation;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<()> {
        let in_unit = |f: f64| f > 0.0 && f < 1.0;
        if !in_unit(self.train_fraction)
            || !in_unit(self.test_fraction)
            || !in_unit(self.validation_fraction)
        {
            return Err(ScitagError::Config(format!(
                "split fractions must lie strictly between 0 and 1: {self:?}"
            )));
        }
        if self.train_fraction + self.test_fraction > 1.0 + EPS {
            return Err(ScitagError::Config(format!(
                "train_fraction {} and test_fraction {} exceed 1",
                self.train_fraction, self.test_fraction
            )));
        }
        Ok(())
    }

    /// Split `examples` by `labels`. Deterministic for a given seed.
    pub fn split<T>(&self, examples: Vec<T>, labels: Vec<String>) -> Result<TrainValidTest<T>> {
        self.validate()?;
        if examples.len() != labels.len() {
            return Err(ScitagError::Split(format!(
                "{} examples but {} labels",
                examples.len(),
                labels.len()
            )));
        }

        let mut rng = Rand64::new(u128::from(self.seed));
        let n = labels.len();
        let train_size = ((self.train_fraction * n as f64) + EPS).floor() as usize;
        let held_out_size = ((self.test_fraction * n as f64) - EPS).ceil() as usize;

        let (train_idx, held_idx) = stratified_indices(&labels, train_size, held_out_size, &mut rng)?;

        let held_labels: Vec<String> = held_idx.iter().map(|&i| labels[i].clone()).collect();
        let m = held_labels.len();
        let valid_size = ((self.validation_fraction * m as f64) - EPS).ceil() as usize;
        let test_size = (((1.0 - self.validation_fraction) * m as f64) + EPS).floor() as usize;

        let (test_pos, valid_pos) = stratified_indices(&held_labels, test_size, valid_size, &mut rng)?;

        let mut slots: Vec<Option<T>> = examples.into_iter().map(Some).collect();
        let mut take = |indices: &[usize]| -> Vec<(T, String)> {
            indices
                .iter()
                .filter_map(|&i| slots[i].take().map(|ex| (ex, labels[i].clone())))
                .collect()
        };

        let train = take(&train_idx);
        let test = take(&test_pos.iter().map(|&p| held_idx[p]).collect::<Vec<_>>());
        let valid = take(&valid_pos.iter().map(|&p| held_idx[p]).collect::<Vec<_>>());

        debug!(
            train = train.len(),
            valid = valid.len(),
            test = test.len(),
            "stratified split"
        );

        Ok(TrainValidTest { train, valid, test })
    }
}

/// Pick `first_size` and `second_size` disjoint indices, class-proportionally.
fn stratified_indices(
    labels: &[String],
    first_size: usize,
    second_size: usize,
    rng: &mut Rand64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut classes: Vec<(&str, Vec<usize>)> = Vec::new();
    for (idx, label) in labels.iter().enumerate() {
        match classes.iter_mut().find(|(name, _)| *name == label.as_str()) {
            Some((_, members)) => members.push(idx),
            None => classes.push((label.as_str(), vec![idx])),
        }
    }

    if let Some((name, members)) = classes.iter().find(|(_, members)| members.len() < 2) {
        return Err(ScitagError::Split(format!(
            "class {name:?} has only {} member(s); at least 2 are needed to stratify",
            members.len()
        )));
    }
    if first_size + second_size > labels.len() {
        return Err(ScitagError::Split(format!(
            "cannot draw {first_size} + {second_size} examples from {}",
            labels.len()
        )));
    }
    if first_size < classes.len() || second_size < classes.len() {
        return Err(ScitagError::Split(format!(
            "split sizes {first_size}/{second_size} are smaller than the {} classes",
            classes.len()
        )));
    }

    let sizes: Vec<usize> = classes.iter().map(|(_, m)| m.len()).collect();
    let first_counts = apportion(&sizes, &sizes, first_size);
    let left: Vec<usize> = sizes.iter().zip(&first_counts).map(|(s, f)| s - f).collect();
    let second_counts = apportion(&sizes, &left, second_size);

    let mut first = Vec::with_capacity(first_size);
    let mut second = Vec::with_capacity(second_size);
    for (((_, members), f), s) in classes.iter_mut().zip(&first_counts).zip(&second_counts) {
        shuffle(members, rng);
        first.extend_from_slice(&members[..*f]);
        second.extend_from_slice(&members[*f..*f + *s]);
    }
    shuffle(&mut first, rng);
    shuffle(&mut second, rng);

    Ok((first, second))
}

/// Distribute `total` over classes proportionally to `weights` without
/// exceeding `caps`, using largest remainders. `total <= sum(caps)`.
fn apportion(weights: &[usize], caps: &[usize], total: usize) -> Vec<usize> {
    let weight_sum: usize = weights.iter().sum();
    if weight_sum == 0 {
        return vec![0; weights.len()];
    }

    let ideal: Vec<f64> = weights
        .iter()
        .map(|&w| w as f64 * total as f64 / weight_sum as f64)
        .collect();
    let mut counts: Vec<usize> = ideal
        .iter()
        .zip(caps)
        .map(|(&x, &cap)| ((x + EPS).floor() as usize).min(cap))
        .collect();

    let mut order: Vec<usize> = (0..weights.len()).collect();
    order.sort_by(|&a, &b| {
        let ra = ideal[a] - counts[a] as f64;
        let rb = ideal[b] - counts[b] as f64;
        rb.partial_cmp(&ra).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut remaining = total.saturating_sub(counts.iter().sum());
    while remaining > 0 {
        let mut progressed = false;
        for &class in &order {
            if remaining == 0 {
                break;
            }
            if counts[class] < caps[class] {
                counts[class] += 1;
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    counts
}

/// Fisher-Yates shuffle.
fn shuffle<T>(items: &mut [T], rng: &mut Rand64) {
    for i in (1..items.len()).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}
