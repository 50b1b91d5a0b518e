// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Collation of variable-size read sets.
//!
//! Read sets have different sizes, so a batch cannot be formed by naively stacking matrices.
//! Instead, all ref reads of all data are concatenated, followed by all alt reads, and the
//! per-datum read counts are kept to recover each datum's rows. For example, if one datum has
//! alt reads `[[0,1,2], [3,4,5]]` and another has `[[6,7,8], [9,10,11], [12,13,14]]`, the
//! concatenated alt reads are all five rows and the alt counts are `[2, 3]`.

use std::ops::Range;

use anyhow::Result;
use itertools::Itertools;
use ndarray::{concatenate, stack, Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand_distr::Beta;

use crate::data::normal_artifact::{NormalArtifactBatch, NormalArtifactDatum};
use crate::data::{Datum, MutectInfo, SiteInfo};
use crate::errors::Error;

/// Given slice sizes, produce consecutive index ranges starting at `offset`,
/// e.g. `[2, 3, 1]` gives `0..2, 2..5, 5..6`.
pub fn make_slices(sizes: &[usize], offset: usize) -> Vec<Range<usize>> {
    sizes
        .iter()
        .scan(offset, |start, size| {
            let slice = *start..*start + size;
            *start += size;
            Some(slice)
        })
        .collect()
}

#[derive(Getters, Debug, Clone)]
pub struct Batch {
    /// Data the batch was built from, kept for downsampling augmentation.
    #[getset(get = "pub")]
    original_data: Vec<Datum>,
    labeled: bool,
    #[getset(get = "pub")]
    ref_counts: Vec<usize>,
    #[getset(get = "pub")]
    alt_counts: Vec<usize>,
    #[getset(get = "pub")]
    ref_slices: Vec<Range<usize>>,
    #[getset(get = "pub")]
    alt_slices: Vec<Range<usize>>,
    /// All ref reads, then all alt reads.
    #[getset(get = "pub")]
    reads: Array2<f32>,
    #[getset(get = "pub")]
    info: Array2<f32>,
    /// 1.0 for artifacts, 0.0 for variants.
    #[getset(get = "pub")]
    labels: Option<Array1<f32>>,
    #[getset(get = "pub")]
    normal_artifact_batch: NormalArtifactBatch,
}

impl Batch {
    /// Collate the given data. Data must be either all labeled or all unlabeled and
    /// share read and info feature widths.
    pub fn new(data: Vec<Datum>) -> Result<Self> {
        let first = data.first().ok_or(Error::EmptyBatch)?;
        let labeled = first.is_labeled();
        let read_width = first.ref_reads().ncols();
        let info_width = first.info().len();
        for (i, datum) in data.iter().enumerate() {
            if datum.is_labeled() != labeled {
                return Err(Error::MixedLabels { index: i }.into());
            }
            check_width("ref read", read_width, datum.ref_reads().ncols())?;
            check_width("alt read", read_width, datum.alt_reads().ncols())?;
            check_width("info", info_width, datum.info().len())?;
        }

        let ref_counts = data.iter().map(|datum| datum.ref_count()).collect_vec();
        let alt_counts = data.iter().map(|datum| datum.alt_count()).collect_vec();
        let total_ref = ref_counts.iter().sum();
        let ref_slices = make_slices(&ref_counts, 0);
        let alt_slices = make_slices(&alt_counts, total_ref);

        let read_views = data
            .iter()
            .map(|datum| datum.ref_reads().view())
            .chain(data.iter().map(|datum| datum.alt_reads().view()))
            .collect_vec();
        let reads = concatenate(Axis(0), &read_views)?;

        let info_views = data.iter().map(|datum| datum.info().view()).collect_vec();
        let info = stack(Axis(0), &info_views)?;

        let labels = if labeled {
            Some(
                data.iter()
                    .filter_map(|datum| datum.label())
                    .map(|label| label.as_f32())
                    .collect(),
            )
        } else {
            None
        };

        let normal_artifact_data = data.iter().map(NormalArtifactDatum::from).collect_vec();
        let normal_artifact_batch = NormalArtifactBatch::new(&normal_artifact_data);

        Ok(Batch {
            original_data: data,
            labeled,
            ref_counts,
            alt_counts,
            ref_slices,
            alt_slices,
            reads,
            info,
            labels,
            normal_artifact_batch,
        })
    }

    /// New batch of independently downsampled copies of the original data.
    /// The batch itself is left untouched.
    pub fn augmented_copy<R: Rng>(&self, beta: &Beta<f64>, rng: &mut R) -> Result<Batch> {
        Batch::new(
            self.original_data
                .iter()
                .map(|datum| datum.downsampled_copy(beta, rng))
                .collect(),
        )
    }

    pub fn is_labeled(&self) -> bool {
        self.labeled
    }

    pub fn size(&self) -> usize {
        self.original_data.len()
    }

    /// Ref reads of the i-th datum.
    pub fn ref_reads(&self, i: usize) -> ArrayView2<'_, f32> {
        self.reads
            .slice_axis(Axis(0), (self.ref_slices[i].start..self.ref_slices[i].end).into())
    }

    /// Alt reads of the i-th datum.
    pub fn alt_reads(&self, i: usize) -> ArrayView2<'_, f32> {
        self.reads
            .slice_axis(Axis(0), (self.alt_slices[i].start..self.alt_slices[i].end).into())
    }

    pub fn info_row(&self, i: usize) -> ArrayView1<'_, f32> {
        self.info.row(i)
    }

    pub fn site_info(&self) -> impl Iterator<Item = &SiteInfo> + '_ {
        self.original_data.iter().map(|datum| datum.site_info())
    }

    pub fn mutect_info(&self) -> impl Iterator<Item = MutectInfo> + '_ {
        self.original_data.iter().map(|datum| datum.mutect_info())
    }
}

fn check_width(what: &'static str, expected: usize, found: usize) -> Result<()> {
    if expected != found {
        Err(Error::FeatureWidthMismatch {
            what,
            expected,
            found,
        }
        .into())
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::datum;
    use crate::data::Label;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_make_slices() {
        assert_eq!(make_slices(&[2, 3, 1], 0), vec![0..2, 2..5, 5..6]);
        assert_eq!(make_slices(&[0, 4], 10), vec![10..10, 10..14]);
        assert!(make_slices(&[], 3).is_empty());
    }

    #[test]
    fn test_batch_layout() {
        let data = vec![
            datum(3, 2, 4, 5, Some(Label::Artifact)),
            datum(0, 1, 4, 5, Some(Label::Variant)),
            datum(5, 4, 4, 5, Some(Label::Artifact)),
        ];
        let batch = Batch::new(data.clone()).unwrap();

        assert_eq!(batch.size(), 3);
        assert!(batch.is_labeled());
        assert_eq!(batch.ref_counts(), &vec![3, 0, 5]);
        assert_eq!(batch.alt_counts(), &vec![2, 1, 4]);
        assert_eq!(batch.reads().dim(), (15, 4));
        assert_eq!(batch.info().dim(), (3, 5));
        assert_eq!(
            batch.labels().as_ref().unwrap().to_vec(),
            vec![1.0, 0.0, 1.0]
        );

        // slices partition the read axis without gaps or overlaps
        let slices = batch
            .ref_slices()
            .iter()
            .chain(batch.alt_slices().iter())
            .collect_vec();
        let mut expected_start = 0;
        for slice in slices {
            assert_eq!(slice.start, expected_start);
            expected_start = slice.end;
        }
        assert_eq!(expected_start, batch.reads().nrows());

        for (i, datum) in data.iter().enumerate() {
            assert_eq!(batch.ref_reads(i), datum.ref_reads().view());
            assert_eq!(batch.alt_reads(i), datum.alt_reads().view());
            assert_eq!(batch.info_row(i), datum.info().view());
        }
    }

    #[test]
    fn test_unlabeled_batch() {
        let batch = Batch::new(vec![datum(2, 2, 3, 1, None), datum(1, 1, 3, 1, None)]).unwrap();
        assert!(!batch.is_labeled());
        assert!(batch.labels().is_none());
        assert_eq!(batch.normal_artifact_batch().size(), 2);
        assert_eq!(batch.normal_artifact_batch().tumor_depth(), &vec![4, 2]);
    }

    #[test]
    fn test_mixed_labels() {
        let err = Batch::new(vec![
            datum(2, 2, 3, 1, Some(Label::Variant)),
            datum(2, 2, 3, 1, None),
        ])
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::MixedLabels { index: 1 })
        );
    }

    #[test]
    fn test_empty_batch() {
        let err = Batch::new(Vec::new()).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::EmptyBatch));
    }

    #[test]
    fn test_width_mismatch() {
        let err = Batch::new(vec![datum(2, 2, 3, 1, None), datum(2, 2, 4, 1, None)]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<Error>(),
            Some(&Error::FeatureWidthMismatch {
                what: "ref read",
                expected: 3,
                found: 4
            })
        );
    }

    #[test]
    fn test_augmented_copy() {
        let mut rng = StdRng::seed_from_u64(3);
        let beta = Beta::new(2.0, 1.0).unwrap();
        let batch = Batch::new(vec![
            datum(30, 10, 2, 2, Some(Label::Artifact)),
            datum(25, 12, 2, 2, Some(Label::Variant)),
        ])
        .unwrap();

        for _ in 0..2 {
            let augmented = batch.augmented_copy(&beta, &mut rng).unwrap();
            assert_eq!(augmented.size(), batch.size());
            assert_eq!(augmented.labels(), batch.labels());
            let total: usize =
                augmented.ref_counts().iter().sum::<usize>() + augmented.alt_counts().iter().sum::<usize>();
            assert_eq!(total, augmented.reads().nrows());
            for (augmented_count, count) in augmented.ref_counts().iter().zip(batch.ref_counts()) {
                assert!(augmented_count <= count);
            }
        }
        // the original is untouched
        assert_eq!(batch.ref_counts(), &vec![30, 25]);
        assert_eq!(batch.reads().nrows(), 77);
    }
}
