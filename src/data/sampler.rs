// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Batches that are all supervised or all unsupervised.
//!
//! Balancing the supervised and unsupervised losses is left to the model, but it is
//! convenient to have equal numbers of labeled and unlabeled batches, so the labeled batch
//! size is adjusted accordingly.

use anyhow::Result;
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::dataset::ReadSetDataset;
use crate::data::Label;
use crate::errors::Error;

#[derive(Getters, Debug, Clone)]
pub struct SemiSupervisedBatchSampler {
    #[getset(get = "pub")]
    artifact_indices: Vec<usize>,
    #[getset(get = "pub")]
    non_artifact_indices: Vec<usize>,
    #[getset(get = "pub")]
    unlabeled_indices: Vec<usize>,
    batch_size: usize,
}

impl SemiSupervisedBatchSampler {
    /// Scan the labels of the dataset once. The sampler has to be rebuilt if the dataset
    /// changes.
    pub fn new(dataset: &ReadSetDataset, batch_size: usize) -> Result<Self> {
        Self::from_labels(dataset.labels(), batch_size)
    }

    pub fn from_labels<I>(labels: I, batch_size: usize) -> Result<Self>
    where
        I: IntoIterator<Item = Option<Label>>,
    {
        if batch_size == 0 {
            return Err(Error::InvalidBatchSize.into());
        }
        let mut artifact_indices = Vec::new();
        let mut non_artifact_indices = Vec::new();
        let mut unlabeled_indices = Vec::new();
        for (i, label) in labels.into_iter().enumerate() {
            match label {
                Some(Label::Artifact) => artifact_indices.push(i),
                Some(Label::Variant) => non_artifact_indices.push(i),
                None => unlabeled_indices.push(i),
            }
        }
        Ok(SemiSupervisedBatchSampler {
            artifact_indices,
            non_artifact_indices,
            unlabeled_indices,
            batch_size,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    fn balanced_count(&self) -> usize {
        self.artifact_indices
            .len()
            .min(self.non_artifact_indices.len())
    }

    /// Size of labeled batches, chosen such that there are about as many labeled as
    /// unlabeled batches. Halves round to even.
    pub fn labeled_batch_size(&self) -> usize {
        let labeled_count = 2 * self.balanced_count();
        if self.unlabeled_indices.is_empty() {
            return self.batch_size;
        }
        let size = (labeled_count as f64 / self.unlabeled_indices.len() as f64
            * self.batch_size as f64)
            .round_ties_even() as usize;
        size.max(1)
    }

    /// Index batches of one epoch.
    ///
    /// Artifact and non-artifact pools are truncated to the size of the smaller one, so that
    /// labeled batches are balanced over the epoch. Labeled and unlabeled indices are never
    /// mixed within a batch, and the order of batches is shuffled.
    pub fn epoch<R: Rng>(&mut self, rng: &mut R) -> Vec<Vec<usize>> {
        self.artifact_indices.shuffle(rng);
        self.non_artifact_indices.shuffle(rng);
        self.unlabeled_indices.shuffle(rng);

        let count = self.balanced_count();
        let mut labeled_indices = self.artifact_indices[..count]
            .iter()
            .chain(self.non_artifact_indices[..count].iter())
            .cloned()
            .collect_vec();
        labeled_indices.shuffle(rng);

        let labeled_batch_size = self.labeled_batch_size();
        debug!(
            "Sampling epoch: {} labeled indices in batches of {}, {} unlabeled indices in batches of {}.",
            labeled_indices.len(),
            labeled_batch_size,
            self.unlabeled_indices.len(),
            self.batch_size
        );

        let mut batches = labeled_indices
            .chunks(labeled_batch_size)
            .chain(self.unlabeled_indices.chunks(self.batch_size))
            .map(|chunk| chunk.to_vec())
            .collect_vec();
        batches.shuffle(rng);
        batches
    }

    /// Advisory number of batches per epoch, `2 * |artifact| / B + |artifact| / B`.
    ///
    /// This estimate does not equal the number of batches `epoch` yields; use `exact_len` for
    /// the latter.
    pub fn len(&self) -> usize {
        self.artifact_indices.len() * 2 / self.batch_size
            + self.artifact_indices.len() / self.batch_size
    }

    /// Whether the advisory `len` is zero. An epoch may still yield batches then.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of batches `epoch` yields.
    pub fn exact_len(&self) -> usize {
        let labeled_count = 2 * self.balanced_count();
        div_ceil(labeled_count, self.labeled_batch_size())
            + div_ceil(self.unlabeled_indices.len(), self.batch_size)
    }
}

fn div_ceil(n: usize, d: usize) -> usize {
    (n + d - 1) / d
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn labels(artifacts: usize, variants: usize, unlabeled: usize) -> Vec<Option<Label>> {
        let mut labels = Vec::new();
        labels.extend(std::iter::repeat(Some(Label::Artifact)).take(artifacts));
        labels.extend(std::iter::repeat(None).take(unlabeled / 2));
        labels.extend(std::iter::repeat(Some(Label::Variant)).take(variants));
        labels.extend(std::iter::repeat(None).take(unlabeled - unlabeled / 2));
        labels
    }

    #[test]
    fn test_index_pools() {
        let sampler = SemiSupervisedBatchSampler::from_labels(labels(2, 3, 4), 2).unwrap();
        assert_eq!(sampler.artifact_indices(), &vec![0, 1]);
        assert_eq!(sampler.unlabeled_indices(), &vec![2, 3, 7, 8]);
        assert_eq!(sampler.non_artifact_indices(), &vec![4, 5, 6]);
    }

    #[test]
    fn test_balanced_epoch() {
        let all_labels = labels(30, 70, 200);
        let mut sampler = SemiSupervisedBatchSampler::from_labels(all_labels.clone(), 16).unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..3 {
            let batches = sampler.epoch(&mut rng);
            assert_eq!(batches.len(), sampler.exact_len());

            let mut artifacts = 0;
            let mut variants = 0;
            let mut unlabeled = 0;
            let mut seen = HashSet::new();
            for batch in &batches {
                assert!(!batch.is_empty());
                let labeled = all_labels[batch[0]].is_some();
                for index in batch {
                    // batches are never mixed
                    assert_eq!(all_labels[*index].is_some(), labeled);
                    assert!(seen.insert(*index));
                    match all_labels[*index] {
                        Some(Label::Artifact) => artifacts += 1,
                        Some(Label::Variant) => variants += 1,
                        None => unlabeled += 1,
                    }
                }
            }
            assert_eq!(artifacts, 30);
            assert_eq!(variants, 30);
            assert_eq!(unlabeled, 200);
        }
    }

    #[test]
    fn test_labeled_batch_size() {
        let sampler = SemiSupervisedBatchSampler::from_labels(labels(50, 50, 200), 64).unwrap();
        // 100 labeled vs 200 unlabeled: half the batch size
        assert_eq!(sampler.labeled_batch_size(), 32);
        assert_eq!(sampler.exact_len(), 4 + 4);

        let sampler = SemiSupervisedBatchSampler::from_labels(labels(5, 8, 0), 4).unwrap();
        assert_eq!(sampler.labeled_batch_size(), 4);
        assert_eq!(sampler.exact_len(), 3);
    }

    #[test]
    fn test_advisory_len() {
        let sampler = SemiSupervisedBatchSampler::from_labels(labels(50, 60, 200), 16).unwrap();
        assert_eq!(sampler.len(), 100 / 16 + 50 / 16);
        assert_ne!(sampler.len(), sampler.exact_len());
    }

    #[test]
    fn test_labeled_batch_size_rounds_half_to_even() {
        // 10 labeled vs 8 unlabeled at batch size 2 gives 2.5
        let sampler = SemiSupervisedBatchSampler::from_labels(labels(5, 5, 8), 2).unwrap();
        assert_eq!(sampler.labeled_batch_size(), 2);
        assert_eq!(sampler.exact_len(), 5 + 4);
    }

    #[test]
    fn test_is_empty_follows_advisory_len() {
        let sampler = SemiSupervisedBatchSampler::from_labels(labels(5, 8, 0), 16).unwrap();
        assert_eq!(sampler.len(), 0);
        assert!(sampler.is_empty());
        assert_eq!(sampler.exact_len(), 1);
    }

    #[test]
    fn test_zero_batch_size() {
        let err = SemiSupervisedBatchSampler::from_labels(labels(1, 1, 1), 0).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::InvalidBatchSize));
    }
}
