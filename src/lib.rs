// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Read-set batching, semi-supervised sampling and overdispersed binomial mixture models
//! for separating somatic variants from technical artifacts and sequencing errors.

#[macro_use]
extern crate log;
#[cfg_attr(test, macro_use)]
extern crate approx;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate derive_new;
#[macro_use]
extern crate getset;
#[macro_use]
extern crate strum_macros;

pub mod constants;
pub mod data;
pub mod errors;
pub mod filtration;
pub mod model;
pub mod utils;

pub use crate::data::batch::Batch;
pub use crate::data::dataset::ReadSetDataset;
pub use crate::data::sampler::SemiSupervisedBatchSampler;
pub use crate::data::{Datum, Label, VariantType};
pub use crate::model::mixture::{MixtureMode, OverdispersedBinomialMixture};
pub use crate::model::params::{FitParams, MixtureParams};
