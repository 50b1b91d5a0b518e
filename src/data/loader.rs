// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use itertools::Itertools;
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::data::batch::Batch;
use crate::data::dataset::ReadSetDataset;
use crate::data::normal_artifact::{NormalArtifactDataset, NormalArtifactDatum};
use crate::data::sampler::SemiSupervisedBatchSampler;
use crate::data::Datum;

fn read_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(
        File::open(path).with_context(|| format!("unable to open {}", path.display()))?,
    );
    Ok(bincode::deserialize_from(reader)
        .with_context(|| format!("invalid data in {}", path.display()))?)
}

fn write_file<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let writer = BufWriter::new(
        File::create(path).with_context(|| format!("unable to create {}", path.display()))?,
    );
    bincode::serialize_into(writer, value)?;
    Ok(())
}

/// Read a file of serialized data.
pub fn read_data<P: AsRef<Path>>(path: P) -> Result<Vec<Datum>> {
    read_file(path.as_ref())
}

pub fn write_data<P: AsRef<Path>>(path: P, data: &[Datum]) -> Result<()> {
    write_file(path.as_ref(), data)
}

/// Read a file of serialized normal artifact data.
pub fn read_normal_artifact_data<P: AsRef<Path>>(path: P) -> Result<Vec<NormalArtifactDatum>> {
    read_file(path.as_ref())
}

pub fn write_normal_artifact_data<P: AsRef<Path>>(
    path: P,
    data: &[NormalArtifactDatum],
) -> Result<()> {
    write_file(path.as_ref(), data)
}

/// Concatenate the normal artifact data of all given files into one shuffled dataset.
pub fn normal_artifact_dataset_from_files<P, R>(
    paths: &[P],
    rng: &mut R,
) -> Result<NormalArtifactDataset>
where
    P: AsRef<Path>,
    R: Rng,
{
    let mut data = Vec::new();
    for path in paths {
        data.append(&mut read_normal_artifact_data(path)?);
    }
    debug!("Read {} normal artifact data.", data.len());
    Ok(NormalArtifactDataset::new(data, rng))
}

/// Concatenate the data of all given files into one shuffled, normalized dataset.
pub fn dataset_from_files<P, R>(paths: &[P], rng: &mut R) -> Result<ReadSetDataset>
where
    P: AsRef<Path>,
    R: Rng,
{
    let mut data = Vec::new();
    for path in paths {
        let mut file_data = read_data(path)?;
        debug!(
            "Read {} data from {}.",
            file_data.len(),
            path.as_ref().display()
        );
        data.append(&mut file_data);
    }
    ReadSetDataset::new_shuffled(data, rng)
}

/// Lazily collated batches of a dataset.
pub struct Batches<'a> {
    dataset: &'a ReadSetDataset,
    index_batches: std::vec::IntoIter<Vec<usize>>,
}

impl<'a> Iterator for Batches<'a> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        let dataset = self.dataset;
        self.index_batches
            .next()
            .map(|indices| dataset.collate(&indices))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.index_batches.size_hint()
    }
}

/// Loader for training and validation, yielding balanced semi-supervised batches.
pub struct SemiSupervisedLoader<'a> {
    dataset: &'a ReadSetDataset,
    sampler: SemiSupervisedBatchSampler,
}

impl<'a> SemiSupervisedLoader<'a> {
    pub fn new(dataset: &'a ReadSetDataset, batch_size: usize) -> Result<Self> {
        Ok(SemiSupervisedLoader {
            dataset,
            sampler: SemiSupervisedBatchSampler::new(dataset, batch_size)?,
        })
    }

    pub fn sampler(&self) -> &SemiSupervisedBatchSampler {
        &self.sampler
    }

    /// Batches of a freshly shuffled epoch.
    pub fn epoch<R: Rng>(&mut self, rng: &mut R) -> Batches<'a> {
        Batches {
            dataset: self.dataset,
            index_batches: self.sampler.epoch(rng).into_iter(),
        }
    }
}

/// Consecutive batches in dataset order, for deployment and testing.
pub fn test_batches(dataset: &ReadSetDataset, batch_size: usize) -> Batches<'_> {
    let indices = (0..dataset.len()).collect_vec();
    let index_batches = indices
        .chunks(batch_size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect_vec();
    Batches {
        dataset,
        index_batches: index_batches.into_iter(),
    }
}
