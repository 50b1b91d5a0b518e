// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use ndarray::{Array1, Array2, Axis};
use rand::seq::index;
use rand::Rng;
use rand_distr::{Beta, Distribution};

pub mod batch;
pub mod dataset;
pub mod loader;
pub mod normal_artifact;
pub mod sampler;

pub const NUM_VARIANT_TYPES: usize = 3;

/// Variant type of a candidate, derived from the length difference of its alleles.
#[derive(
    Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
)]
pub enum VariantType {
    #[strum(serialize = "SNV")]
    Snv,
    #[strum(serialize = "INSERTION")]
    Insertion,
    #[strum(serialize = "DELETION")]
    Deletion,
}

impl VariantType {
    pub fn from_alleles(ref_allele: &str, alt_allele: &str) -> Self {
        let diff = alt_allele.len() as i64 - ref_allele.len() as i64;
        if diff == 0 {
            VariantType::Snv
        } else if diff > 0 {
            VariantType::Insertion
        } else {
            VariantType::Deletion
        }
    }

    pub fn index(self) -> usize {
        match self {
            VariantType::Snv => 0,
            VariantType::Insertion => 1,
            VariantType::Deletion => 2,
        }
    }

    /// One-hot encoding, the usual input of spectrum mixtures.
    pub fn one_hot(self) -> Array1<f64> {
        let mut encoding = Array1::zeros(NUM_VARIANT_TYPES);
        encoding[self.index()] = 1.0;
        encoding
    }
}

/// Supervised label of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Artifact,
    Variant,
}

impl Label {
    pub fn as_f32(self) -> f32 {
        match self {
            Label::Artifact => 1.0,
            Label::Variant => 0.0,
        }
    }
}

#[derive(new, Getters, CopyGetters, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteInfo {
    #[getset(get = "pub")]
    contig: String,
    #[getset(get_copy = "pub")]
    position: u64,
    #[getset(get = "pub")]
    ref_allele: String,
    #[getset(get = "pub")]
    alt_allele: String,
    #[getset(get_copy = "pub")]
    popaf: f64,
}

impl SiteInfo {
    pub fn variant_type(&self) -> VariantType {
        VariantType::from_alleles(&self.ref_allele, &self.alt_allele)
    }

    /// Key under which a site is matched against VCF records.
    pub fn encoding(&self) -> String {
        crate::filtration::encode(&self.contig, self.position)
    }
}

/// Caller annotations carried along with a candidate but not used as features.
#[derive(new, CopyGetters, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct MutectInfo {
    tlod: f64,
    tumor_dp: u32,
    tumor_af: f64,
}

/// A candidate variant with its ref and alt read feature matrices (one row per read).
#[derive(new, Getters, CopyGetters, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datum {
    #[getset(get = "pub")]
    ref_reads: Array2<f32>,
    #[getset(get = "pub")]
    alt_reads: Array2<f32>,
    #[getset(get = "pub")]
    info: Array1<f32>,
    #[getset(get = "pub")]
    site_info: SiteInfo,
    #[getset(get_copy = "pub")]
    mutect_info: MutectInfo,
    #[getset(get_copy = "pub")]
    label: Option<Label>,
    #[getset(get_copy = "pub")]
    normal_depth: u32,
    #[getset(get_copy = "pub")]
    normal_alt_count: u32,
}

impl Datum {
    pub fn ref_count(&self) -> usize {
        self.ref_reads.nrows()
    }

    pub fn alt_count(&self) -> usize {
        self.alt_reads.nrows()
    }

    pub fn is_labeled(&self) -> bool {
        self.label.is_some()
    }

    pub fn variant_type(&self) -> VariantType {
        self.site_info.variant_type()
    }

    /// Copy with ref and alt reads independently subsampled to a fraction drawn from `beta`.
    /// At least one read is kept of any non-empty read set.
    pub fn downsampled_copy<R: Rng>(&self, beta: &Beta<f64>, rng: &mut R) -> Datum {
        let ref_fraction = beta.sample(rng);
        let alt_fraction = beta.sample(rng);
        self.with_features(
            downsample(&self.ref_reads, ref_fraction, rng),
            downsample(&self.alt_reads, alt_fraction, rng),
            self.info.clone(),
        )
    }

    /// Same datum with replaced feature values.
    pub(crate) fn with_features(
        &self,
        ref_reads: Array2<f32>,
        alt_reads: Array2<f32>,
        info: Array1<f32>,
    ) -> Datum {
        Datum {
            ref_reads,
            alt_reads,
            info,
            site_info: self.site_info.clone(),
            mutect_info: self.mutect_info,
            label: self.label,
            normal_depth: self.normal_depth,
            normal_alt_count: self.normal_alt_count,
        }
    }
}

fn downsample<R: Rng>(reads: &Array2<f32>, fraction: f64, rng: &mut R) -> Array2<f32> {
    let count = reads.nrows();
    if count == 0 {
        return reads.clone();
    }
    let keep = ((fraction * count as f64).round() as usize).max(1).min(count);
    if keep == count {
        return reads.clone();
    }
    let selected = index::sample(rng, count, keep).into_vec();
    reads.select(Axis(0), &selected)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use ndarray::Array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use strum::IntoEnumIterator;

    pub(crate) fn datum(
        ref_count: usize,
        alt_count: usize,
        read_width: usize,
        info_width: usize,
        label: Option<Label>,
    ) -> Datum {
        let ref_reads = Array::from_shape_fn((ref_count, read_width), |(i, j)| (i * read_width + j) as f32);
        let alt_reads =
            Array::from_shape_fn((alt_count, read_width), |(i, j)| -((i * read_width + j) as f32));
        let info = Array::from_shape_fn(info_width, |j| j as f32);
        Datum::new(
            ref_reads,
            alt_reads,
            info,
            SiteInfo::new("chr1".to_owned(), 1000, "A".to_owned(), "T".to_owned(), 0.001),
            MutectInfo::new(10.0, (ref_count + alt_count) as u32, 0.3),
            label,
            30,
            0,
        )
    }

    #[test]
    fn test_variant_type_from_alleles() {
        assert_eq!(VariantType::from_alleles("A", "T"), VariantType::Snv);
        assert_eq!(VariantType::from_alleles("A", "AGT"), VariantType::Insertion);
        assert_eq!(VariantType::from_alleles("ACG", "A"), VariantType::Deletion);
        assert_eq!(VariantType::Deletion.to_string(), "DELETION");
    }

    #[test]
    fn test_one_hot() {
        let x = VariantType::Insertion.one_hot();
        assert_eq!(x.to_vec(), vec![0.0, 1.0, 0.0]);
        assert_eq!(x.len(), NUM_VARIANT_TYPES);
        for (i, variant_type) in VariantType::iter().enumerate() {
            assert_eq!(variant_type.index(), i);
        }
    }

    #[test]
    fn test_site_encoding() {
        let datum = datum(2, 1, 1, 1, None);
        assert_eq!(datum.site_info().encoding(), "chr1:1000");
        assert_eq!(datum.variant_type(), VariantType::Snv);
    }

    #[test]
    fn test_downsampled_copy() {
        let mut rng = StdRng::seed_from_u64(42);
        let beta = Beta::new(1.0, 1.0).unwrap();
        let original = datum(20, 8, 4, 2, Some(Label::Artifact));
        for _ in 0..50 {
            let copy = original.downsampled_copy(&beta, &mut rng);
            assert!(copy.ref_count() >= 1 && copy.ref_count() <= 20);
            assert!(copy.alt_count() >= 1 && copy.alt_count() <= 8);
            assert_eq!(copy.ref_reads().ncols(), 4);
            assert_eq!(copy.label(), original.label());
            assert_eq!(copy.info(), original.info());
        }
        assert_eq!(original.ref_count(), 20);
        assert_eq!(original.alt_count(), 8);
    }

    #[test]
    fn test_downsample_keeps_empty_read_sets_empty() {
        let mut rng = StdRng::seed_from_u64(1);
        let beta = Beta::new(2.0, 2.0).unwrap();
        let original = datum(0, 5, 3, 1, None);
        let copy = original.downsampled_copy(&beta, &mut rng);
        assert_eq!(copy.ref_count(), 0);
        assert_eq!(copy.ref_reads().ncols(), 3);
    }
}
