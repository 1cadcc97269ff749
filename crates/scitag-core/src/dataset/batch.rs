//! Collating instances into tensors.

use candle_core::{Device, Tensor};

use crate::dataset::{Instance, TextDataset};
use crate::error::{Result, ScitagError};

/// Instances stacked row by row.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    pub tokens: Vec<Vec<u32>>,
    pub lengths: Vec<u32>,
    pub labels: Vec<Vec<u32>>,
}

/// A batch on a device.
#[derive(Debug, Clone)]
pub struct BatchTensors {
    /// `[batch, max_length]` word ids.
    pub tokens: Tensor,
    /// `[batch]` unpadded lengths.
    pub lengths: Tensor,
    /// `[batch, labels_per_instance]` label ids.
    pub labels: Tensor,
}

impl Batch {
    /// Stack instances; every instance must have the same token and label
    /// widths.
    pub fn collate(instances: &[Instance]) -> Result<Self> {
        let mut batch = Self::default();
        let Some(first) = instances.first() else {
            return Ok(batch);
        };
        let (width, label_width) = (first.tokens.len(), first.labels.len());

        for (idx, instance) in instances.iter().enumerate() {
            if instance.tokens.len() != width || instance.labels.len() != label_width {
                return Err(ScitagError::Config(format!(
                    "instance {idx} has shape ({}, {}), expected ({width}, {label_width})",
                    instance.tokens.len(),
                    instance.labels.len()
                )));
            }
            batch.tokens.push(instance.tokens.clone());
            batch.lengths.push(instance.len as u32);
            batch.labels.push(instance.labels.clone());
        }

        Ok(batch)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn to_tensors(&self, device: &Device) -> Result<BatchTensors> {
        let rows = self.len();
        let width = self.tokens.first().map_or(0, Vec::len);
        let label_width = self.labels.first().map_or(0, Vec::len);

        Ok(BatchTensors {
            tokens: Tensor::from_vec(self.tokens.concat(), (rows, width), device)?,
            lengths: Tensor::from_vec(self.lengths.clone(), rows, device)?,
            labels: Tensor::from_vec(self.labels.concat(), (rows, label_width), device)?,
        })
    }
}

/// Consecutive batches of at most `batch_size` instances, in order.
pub fn batches<D: TextDataset + ?Sized>(dataset: &D, batch_size: usize) -> Result<Vec<Batch>> {
    if batch_size == 0 {
        return Err(ScitagError::Config("batch_size must be positive".into()));
    }

    let instances = (0..dataset.len())
        .map(|idx| {
            dataset
                .instance(idx)
                .ok_or_else(|| ScitagError::Config(format!("instance {idx} could not be built")))
        })
        .collect::<Result<Vec<_>>>()?;

    instances.chunks(batch_size).map(Batch::collate).collect()
}
