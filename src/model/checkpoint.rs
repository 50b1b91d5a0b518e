// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Persistence of trained mixtures.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};

use crate::errors::Error;
use crate::model::mixture::OverdispersedBinomialMixture;
use crate::model::mlp::Mlp;
use crate::model::params::MixtureParams;

/// Everything needed to restore a mixture: its architecture, the weights of its three
/// networks and the trained concentration ceiling.
#[derive(new, Getters, CopyGetters, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureState {
    #[getset(get = "pub")]
    params: MixtureParams,
    #[getset(get = "pub")]
    weights_pre_softmax: Mlp,
    #[getset(get = "pub")]
    mean_pre_sigmoid: Mlp,
    #[getset(get = "pub")]
    concentration_pre_sigmoid: Mlp,
    #[getset(get_copy = "pub")]
    max_concentration: f64,
}

impl OverdispersedBinomialMixture {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&self.state())?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let state: MixtureState =
            bincode::deserialize(bytes).map_err(|err| Error::InvalidCheckpoint {
                msg: err.to_string(),
            })?;
        Self::from_state(state)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(
            File::create(path.as_ref())
                .with_context(|| format!("unable to create {}", path.as_ref().display()))?,
        );
        bincode::serialize_into(writer, &self.state())?;
        info!("Saved {} mixture to {}.", self.mode(), path.as_ref().display());
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(
            File::open(path.as_ref())
                .with_context(|| format!("unable to open {}", path.as_ref().display()))?,
        );
        let state: MixtureState =
            bincode::deserialize_from(reader).map_err(|err| Error::InvalidCheckpoint {
                msg: err.to_string(),
            })?;
        Self::from_state(state)
    }
}
