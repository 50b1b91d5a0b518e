// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use std::convert::TryFrom;

use crate::model::mixture::MixtureMode;

fn default_max_mean() -> f64 {
    1.0
}

fn default_batch_size() -> usize {
    64
}

fn default_learning_rate() -> f64 {
    1e-3
}

/// Architecture of an `OverdispersedBinomialMixture`.
#[derive(new, Getters, CopyGetters, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixtureParams {
    /// width of the feature vectors the mixture is conditioned on
    #[getset(get_copy = "pub")]
    input_size: usize,
    #[getset(get_copy = "pub")]
    num_components: usize,
    /// upper bound of component means, e.g. to restrict a mixture to small fractions
    #[serde(default = "default_max_mean")]
    #[getset(get_copy = "pub")]
    max_mean: f64,
    #[serde(default)]
    #[getset(get_copy = "pub")]
    mode: MixtureMode,
    /// sizes of the hidden layers of the weight, mean and concentration networks
    #[serde(default)]
    #[getset(get = "pub")]
    hidden_layers: Vec<usize>,
}

impl MixtureParams {
    pub(crate) fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![self.input_size];
        sizes.extend(&self.hidden_layers);
        sizes.push(self.num_components);
        sizes
    }
}

impl<'a> TryFrom<&'a str> for MixtureParams {
    type Error = serde_yaml::Error;

    fn try_from(yaml: &str) -> Result<Self, Self::Error> {
        serde_yaml::from_str(yaml)
    }
}

/// Settings of `OverdispersedBinomialMixture::fit`.
#[derive(new, CopyGetters, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct FitParams {
    num_epochs: usize,
    #[serde(default = "default_batch_size")]
    batch_size: usize,
    #[serde(default = "default_learning_rate")]
    learning_rate: f64,
}

impl FitParams {
    pub fn with_epochs(num_epochs: usize) -> Self {
        FitParams::new(num_epochs, default_batch_size(), default_learning_rate())
    }
}

impl<'a> TryFrom<&'a str> for FitParams {
    type Error = serde_yaml::Error;

    fn try_from(yaml: &str) -> Result<Self, Self::Error> {
        serde_yaml::from_str(yaml)
    }
}
