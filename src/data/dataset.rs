// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;
use itertools::Itertools;
use ndarray::{concatenate, stack, Array1, Array2, ArrayView2, Axis};
use rand::seq::SliceRandom;
use rand::Rng;
use ordered_float::NotNan;

use crate::constants::{DATA_COUNT_FOR_QUANTILES, EPSILON, SCALE_QUANTILE_TAILS};
use crate::data::batch::Batch;
use crate::data::{Datum, Label};
use crate::errors::Error;

/// Column medians and robust scales of the given matrix.
///
/// The scale of a column is the first of the 90%, 98% and 100% inter-quantile ranges that
/// exceeds `EPSILON`, or 1.0 if all of them collapse (e.g. for a constant column).
pub fn medians_and_iqrs(matrix: ArrayView2<'_, f32>) -> (Array1<f32>, Array1<f32>) {
    if matrix.nrows() == 0 {
        return (
            Array1::zeros(matrix.ncols()),
            Array1::ones(matrix.ncols()),
        );
    }

    let (medians, scales): (Vec<f32>, Vec<f32>) = matrix
        .axis_iter(Axis(1))
        .map(|column| {
            let values = column
                .iter()
                .filter_map(|x| NotNan::new(*x as f64).ok())
                .sorted()
                .map(|x| x.into_inner())
                .collect_vec();
            let median = quantile(&values, 0.5);
            let scale = SCALE_QUANTILE_TAILS
                .iter()
                .map(|tail| quantile(&values, 1.0 - tail) - quantile(&values, *tail))
                .find(|range| *range > EPSILON)
                .unwrap_or(1.0);
            (median as f32, scale as f32)
        })
        .unzip();

    (Array1::from(medians), Array1::from(scales))
}

/// Quantile of sorted values, interpolating linearly between the closest ranks at position
/// `q * (n - 1)`.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let position = q * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    sorted[lower] + (position - lower as f64) * (sorted[upper] - sorted[lower])
}

/// Data normalized by robust per-feature statistics.
///
/// The statistics are estimated once from the leading data; normalization itself happens on
/// every access.
#[derive(Getters, Debug, Clone)]
pub struct ReadSetDataset {
    data: Vec<Datum>,
    #[getset(get = "pub")]
    read_medians: Array1<f32>,
    #[getset(get = "pub")]
    read_scales: Array1<f32>,
    #[getset(get = "pub")]
    info_medians: Array1<f32>,
    #[getset(get = "pub")]
    info_scales: Array1<f32>,
}

impl ReadSetDataset {
    pub fn new(data: Vec<Datum>) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::EmptyDataset.into());
        }

        let leading = &data[..data.len().min(DATA_COUNT_FOR_QUANTILES)];
        let ref_views = leading.iter().map(|datum| datum.ref_reads().view()).collect_vec();
        let info_views = leading.iter().map(|datum| datum.info().view()).collect_vec();
        let ref_reads = concatenate(Axis(0), &ref_views)?;
        let info = stack(Axis(0), &info_views)?;

        let (read_medians, read_scales) = medians_and_iqrs(ref_reads.view());
        let (info_medians, info_scales) = medians_and_iqrs(info.view());

        let dataset = ReadSetDataset {
            data,
            read_medians,
            read_scales,
            info_medians,
            info_scales,
        };

        let unlabeled = dataset.labels().filter(|label| label.is_none()).count();
        info!(
            "Dataset of {} data ({} labeled, {} unlabeled).",
            dataset.len(),
            dataset.len() - unlabeled,
            unlabeled
        );
        Ok(dataset)
    }

    /// Shuffle the data before estimating the normalization statistics.
    pub fn new_shuffled<R: Rng>(mut data: Vec<Datum>, rng: &mut R) -> Result<Self> {
        data.shuffle(rng);
        Self::new(data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Unnormalized datum.
    pub fn raw(&self, index: usize) -> &Datum {
        &self.data[index]
    }

    pub fn label(&self, index: usize) -> Option<Label> {
        self.data[index].label()
    }

    pub fn labels(&self) -> impl Iterator<Item = Option<Label>> + '_ {
        self.data.iter().map(|datum| datum.label())
    }

    /// Normalized copy of the datum at the given index.
    pub fn get(&self, index: usize) -> Datum {
        let raw = &self.data[index];
        raw.with_features(
            normalize_rows(raw.ref_reads(), &self.read_medians, &self.read_scales),
            normalize_rows(raw.alt_reads(), &self.read_medians, &self.read_scales),
            (raw.info() - &self.info_medians) / &self.info_scales,
        )
    }

    /// Collate the normalized data at the given indices into a batch.
    pub fn collate(&self, indices: &[usize]) -> Result<Batch> {
        Batch::new(indices.iter().map(|index| self.get(*index)).collect())
    }

    /// Randomly split into a training and a validation dataset sharing this dataset's
    /// normalization statistics.
    pub fn split_into_train_and_valid<R: Rng>(
        self,
        training_fraction: f64,
        rng: &mut R,
    ) -> Result<(ReadSetDataset, ReadSetDataset)> {
        if !(0.0..=1.0).contains(&training_fraction) {
            return Err(Error::InvalidTrainingFraction {
                fraction: training_fraction,
            }
            .into());
        }
        let ReadSetDataset {
            mut data,
            read_medians,
            read_scales,
            info_medians,
            info_scales,
        } = self;
        data.shuffle(rng);
        let train_len = (training_fraction * data.len() as f64).round() as usize;
        let valid = data.split_off(train_len);
        info!(
            "Dataset sizes: training {}, validation {}.",
            data.len(),
            valid.len()
        );

        let with_statistics = |data| ReadSetDataset {
            data,
            read_medians: read_medians.clone(),
            read_scales: read_scales.clone(),
            info_medians: info_medians.clone(),
            info_scales: info_scales.clone(),
        };
        Ok((with_statistics(data), with_statistics(valid)))
    }
}

fn normalize_rows(reads: &Array2<f32>, medians: &Array1<f32>, scales: &Array1<f32>) -> Array2<f32> {
    (reads - medians) / scales
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::datum;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_medians_and_iqrs() {
        let matrix = array![
            [1.0f32, 5.0, 0.0],
            [2.0, 5.0, 0.0],
            [3.0, 5.0, 0.0],
            [4.0, 5.0, 0.0],
            [5.0, 5.0, 100.0],
        ];
        let (medians, scales) = medians_and_iqrs(matrix.view());
        assert_relative_eq!(medians[0], 3.0);
        assert_relative_eq!(medians[1], 5.0);
        assert_relative_eq!(medians[2], 0.0);
        // 95% quantile 4.8, 5% quantile 1.2
        assert_relative_eq!(scales[0], 3.6, epsilon = 1e-5);
        // constant column falls back to unit scale
        assert_relative_eq!(scales[1], 1.0);
        // 95% quantile interpolates towards the outlier
        assert_relative_eq!(scales[2], 80.0, epsilon = 1e-4);
        for scale in scales.iter() {
            assert!(*scale != 0.0);
        }
    }

    #[test]
    fn test_quantiles_interpolate_linearly() {
        let mut column = vec![0.0f32; 9];
        column.push(100.0);
        let matrix = Array2::from_shape_vec((10, 1), column).unwrap();
        let (medians, scales) = medians_and_iqrs(matrix.view());
        assert_relative_eq!(medians[0], 0.0);
        assert_relative_eq!(scales[0], 55.0, epsilon = 1e-4);

        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_relative_eq!(quantile(&sorted, 0.5), 2.5);
        assert_relative_eq!(quantile(&sorted, 0.0), 1.0);
        assert_relative_eq!(quantile(&sorted, 1.0), 4.0);
    }

    #[test]
    fn test_constant_column_is_only_centered() {
        let data = (0..5)
            .map(|_| datum(4, 3, 2, 1, None))
            .collect_vec();
        let dataset = ReadSetDataset::new(data).unwrap();
        // info values are constant over data
        assert_relative_eq!(dataset.info_scales()[0], 1.0);
        let normalized = dataset.get(2);
        let raw = dataset.raw(2);
        assert_relative_eq!(
            normalized.info()[0],
            raw.info()[0] - dataset.info_medians()[0]
        );
    }

    #[test]
    fn test_get_normalizes_without_caching() {
        let data = vec![
            datum(4, 3, 2, 3, Some(Label::Artifact)),
            datum(6, 1, 2, 3, Some(Label::Variant)),
            datum(2, 2, 2, 3, None),
        ];
        let dataset = ReadSetDataset::new(data).unwrap();
        assert_eq!(dataset.len(), 3);

        let normalized = dataset.get(1);
        let raw = dataset.raw(1);
        assert_eq!(normalized.label(), Some(Label::Variant));
        assert_eq!(normalized.site_info(), raw.site_info());
        assert_eq!(normalized.ref_reads().dim(), raw.ref_reads().dim());
        for ((x, y), j) in normalized
            .alt_reads()
            .iter()
            .zip(raw.alt_reads().iter())
            .zip((0..2).cycle())
        {
            assert_relative_eq!(
                *x,
                (*y - dataset.read_medians()[j]) / dataset.read_scales()[j]
            );
        }
        // raw data is unchanged by access
        assert_eq!(dataset.raw(1), raw);
        assert_eq!(dataset.get(1), normalized);
    }

    #[test]
    fn test_empty_dataset() {
        let err = ReadSetDataset::new(Vec::new()).unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::EmptyDataset));
    }

    #[test]
    fn test_split() {
        let mut rng = StdRng::seed_from_u64(11);
        let data = (0..20).map(|i| datum(i % 4 + 1, 2, 3, 2, None)).collect_vec();
        let dataset = ReadSetDataset::new_shuffled(data, &mut rng).unwrap();
        let medians = dataset.read_medians().clone();
        let (train, valid) = dataset.split_into_train_and_valid(0.9, &mut rng).unwrap();
        assert_eq!(train.len(), 18);
        assert_eq!(valid.len(), 2);
        assert_eq!(train.read_medians(), &medians);
        assert_eq!(valid.read_medians(), &medians);
    }
}
