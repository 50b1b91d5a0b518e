// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::data::{Datum, VariantType};

/// Normal and tumor counts of a candidate, the input of the normal artifact model.
#[derive(new, CopyGetters, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct NormalArtifactDatum {
    normal_alt_count: u32,
    normal_depth: u32,
    tumor_alt_count: u32,
    tumor_depth: u32,
    downsampling: f64,
    variant_type: VariantType,
}

impl From<&Datum> for NormalArtifactDatum {
    /// Tumor counts are taken from the read sets of the datum.
    fn from(datum: &Datum) -> Self {
        let alt_count = datum.alt_count() as u32;
        NormalArtifactDatum {
            normal_alt_count: datum.normal_alt_count(),
            normal_depth: datum.normal_depth(),
            tumor_alt_count: alt_count,
            tumor_depth: alt_count + datum.ref_count() as u32,
            downsampling: 1.0,
            variant_type: datum.variant_type(),
        }
    }
}

#[derive(Getters, Debug, Clone, PartialEq)]
#[getset(get = "pub")]
pub struct NormalArtifactBatch {
    normal_alt: Vec<u32>,
    normal_depth: Vec<u32>,
    tumor_alt: Vec<u32>,
    tumor_depth: Vec<u32>,
    downsampling: Vec<f64>,
    variant_type: Vec<VariantType>,
}

impl NormalArtifactBatch {
    pub fn new(data: &[NormalArtifactDatum]) -> Self {
        NormalArtifactBatch {
            normal_alt: data.iter().map(|d| d.normal_alt_count).collect(),
            normal_depth: data.iter().map(|d| d.normal_depth).collect(),
            tumor_alt: data.iter().map(|d| d.tumor_alt_count).collect(),
            tumor_depth: data.iter().map(|d| d.tumor_depth).collect(),
            downsampling: data.iter().map(|d| d.downsampling).collect(),
            variant_type: data.iter().map(|d| d.variant_type).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.normal_alt.len()
    }
}

/// Shuffled collection of normal artifact data.
#[derive(Debug, Clone)]
pub struct NormalArtifactDataset {
    data: Vec<NormalArtifactDatum>,
}

impl NormalArtifactDataset {
    pub fn new<R: Rng>(mut data: Vec<NormalArtifactDatum>, rng: &mut R) -> Self {
        data.shuffle(rng);
        NormalArtifactDataset { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&NormalArtifactDatum> {
        self.data.get(index)
    }

    /// Consecutive batches of at most `batch_size` data.
    pub fn batches(&self, batch_size: usize) -> impl Iterator<Item = NormalArtifactBatch> + '_ {
        self.data
            .chunks(batch_size.max(1))
            .map(NormalArtifactBatch::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::tests::datum;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_from_datum() {
        let na = NormalArtifactDatum::from(&datum(11, 6, 3, 2, None));
        assert_eq!(na.tumor_alt_count(), 6);
        assert_eq!(na.tumor_depth(), 17);
        assert_eq!(na.normal_depth(), 30);
        assert_eq!(na.normal_alt_count(), 0);
        assert_relative_eq!(na.downsampling(), 1.0);
        assert_eq!(na.variant_type(), VariantType::Snv);
    }

    #[test]
    fn test_dataset_batches() {
        let mut rng = StdRng::seed_from_u64(7);
        let data = (0..10)
            .map(|i| NormalArtifactDatum::new(i, 20, 2 * i, 40, 1.0, VariantType::Deletion))
            .collect();
        let dataset = NormalArtifactDataset::new(data, &mut rng);
        assert_eq!(dataset.len(), 10);

        let batches: Vec<_> = dataset.batches(4).collect();
        assert_eq!(
            batches.iter().map(|b| b.size()).collect::<Vec<_>>(),
            vec![4, 4, 2]
        );
        let mut normal_alt: Vec<u32> = batches
            .iter()
            .flat_map(|b| b.normal_alt().clone())
            .collect();
        normal_alt.sort_unstable();
        assert_eq!(normal_alt, (0..10).collect::<Vec<_>>());
        for batch in &batches {
            for (normal_alt, tumor_alt) in batch.normal_alt().iter().zip(batch.tumor_alt()) {
                assert_eq!(2 * normal_alt, *tumor_alt);
            }
        }
    }
}
