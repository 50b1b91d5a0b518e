// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

// Quantile ranges narrower than this are considered collapsed.
pub const EPSILON: f64 = 0.00001;

// Number of leading data used to estimate normalization statistics.
pub const DATA_COUNT_FOR_QUANTILES: usize = 10000;

// Lower tails of the symmetric quantile ranges tried as feature scale, narrowest first
// (90%, 98%, 100%).
pub const SCALE_QUANTILE_TAILS: [f64; 3] = [0.05, 0.01, 0.0];

pub const INITIAL_MAX_CONCENTRATION: f64 = 50.0;

// Allele fraction grid for spectrum plots, in steps of 0.001.
pub const SPECTRUM_MIN_FRACTION: f64 = 0.01;
pub const SPECTRUM_MAX_FRACTION: f64 = 0.989;
pub const SPECTRUM_GRID_SIZE: usize = 980;
pub const SPECTRUM_NONE_MODE_SD: f64 = 0.01;

pub const ERROR_PROB_INFO_KEY: &str = "ERROR_PROB";
pub const SEQ_ERROR_PROB_INFO_KEY: &str = "SEQ_ERROR_PROB";
pub const ARTIFACT_PROB_INFO_KEY: &str = "ARTIFACT_PROB";

pub const ARTIFACT_FILTER: &str = "artifact";
pub const SEQ_ERROR_FILTER: &str = "seq_error";
pub const PASS_FILTER: &str = "PASS";

// Upstream filters that are kept regardless of the posterior.
pub const TRUSTED_UPSTREAM_FILTERS: [&str; 3] = ["contamination", "germline", "multiallelic"];
