// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Posterior call type probabilities and the resulting FILTER and INFO decorations.

use std::collections::BTreeSet;

use bio::stats::LogProb;
use itertools::Itertools;
use ordered_float::NotNan;

use crate::constants::{
    ARTIFACT_FILTER, ARTIFACT_PROB_INFO_KEY, ERROR_PROB_INFO_KEY, PASS_FILTER, SEQ_ERROR_FILTER,
    SEQ_ERROR_PROB_INFO_KEY, TRUSTED_UPSTREAM_FILTERS,
};

#[derive(Display, Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum CallType {
    Variant,
    SeqError,
    Artifact,
}

#[derive(new, CopyGetters, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[getset(get_copy = "pub")]
pub struct PosteriorProbabilities {
    variant: f64,
    seq_error: f64,
    artifact: f64,
}

impl PosteriorProbabilities {
    /// Normalize unnormalized log posteriors, i.e. log prior plus log likelihood of each
    /// call type.
    pub fn from_log_scores(variant: f64, seq_error: f64, artifact: f64) -> Self {
        let total = LogProb::ln_sum_exp(&[LogProb(variant), LogProb(seq_error), LogProb(artifact)]);
        PosteriorProbabilities {
            variant: (variant - *total).exp(),
            seq_error: (seq_error - *total).exp(),
            artifact: (artifact - *total).exp(),
        }
    }

    pub fn get(&self, call_type: CallType) -> f64 {
        match call_type {
            CallType::Variant => self.variant,
            CallType::SeqError => self.seq_error,
            CallType::Artifact => self.artifact,
        }
    }

    /// Probability that the call is not a real variant.
    pub fn error_prob(&self) -> f64 {
        1.0 - self.variant
    }

    /// The non-variant call type that is more likely.
    pub fn likelier_error(&self) -> CallType {
        if self.artifact > self.seq_error {
            CallType::Artifact
        } else {
            CallType::SeqError
        }
    }
}

/// Error probability threshold that maximizes the expected F1 score if calls with an error
/// probability above it are filtered.
///
/// Passing a call with error probability p contributes 1 - p expected true positives and p
/// expected false positives, filtering it contributes 1 - p expected false negatives.
/// Returns 0.5 if there are no calls.
pub fn optimal_error_threshold(error_probs: &[f64]) -> f64 {
    if error_probs.is_empty() {
        return 0.5;
    }
    let sorted = error_probs
        .iter()
        .filter_map(|p| NotNan::new(*p).ok())
        .sorted()
        .map(|p| p.into_inner())
        .collect_vec();

    // start with all calls filtered
    let mut true_positives = 0.0;
    let mut false_positives = 0.0;
    let mut false_negatives: f64 = sorted.iter().map(|p| 1.0 - p).sum();
    let f_score = |tp: f64, fp: f64, fn_: f64| {
        if tp <= 0.0 {
            0.0
        } else {
            2.0 * tp / (2.0 * tp + fp + fn_)
        }
    };

    let mut best_score = f_score(true_positives, false_positives, false_negatives);
    let mut best_threshold = 0.0;
    for p in &sorted {
        true_positives += 1.0 - p;
        false_positives += p;
        false_negatives -= 1.0 - p;
        let score = f_score(true_positives, false_positives, false_negatives);
        if score > best_score {
            best_score = score;
            best_threshold = *p;
        }
    }
    debug!(
        "Optimal error probability threshold {} with expected F1 score {}.",
        best_threshold, best_score
    );
    best_threshold
}

/// FILTER and INFO values for one VCF record.
#[derive(Getters, Debug, Clone, PartialEq)]
#[getset(get = "pub")]
pub struct FilterDecision {
    filters: BTreeSet<String>,
    info: Vec<(&'static str, f64)>,
}

impl FilterDecision {
    /// Keep trusted upstream filters and, if posteriors are known for the record, add the
    /// likelier error filter when the error probability exceeds the threshold.
    pub fn new<'a, I>(
        upstream_filters: I,
        posterior: Option<&PosteriorProbabilities>,
        error_threshold: f64,
    ) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut filters: BTreeSet<String> = upstream_filters
            .into_iter()
            .filter(|filter| TRUSTED_UPSTREAM_FILTERS.iter().any(|trusted| trusted == filter))
            .map(|filter| filter.to_owned())
            .collect();
        let mut info = Vec::new();
        if let Some(posterior) = posterior {
            info.push((ERROR_PROB_INFO_KEY, posterior.error_prob()));
            info.push((SEQ_ERROR_PROB_INFO_KEY, posterior.seq_error()));
            info.push((ARTIFACT_PROB_INFO_KEY, posterior.artifact()));
            if posterior.error_prob() > error_threshold {
                let filter = match posterior.likelier_error() {
                    CallType::Artifact => ARTIFACT_FILTER,
                    _ => SEQ_ERROR_FILTER,
                };
                filters.insert(filter.to_owned());
            }
        }
        FilterDecision { filters, info }
    }

    pub fn is_pass(&self) -> bool {
        self.filters.is_empty()
    }

    /// Semicolon separated filters, or PASS.
    pub fn filter_field(&self) -> String {
        if self.filters.is_empty() {
            PASS_FILTER.to_owned()
        } else {
            self.filters.iter().join(";")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_posterior_normalization() {
        let posterior =
            PosteriorProbabilities::from_log_scores(0.5f64.ln(), 0.2f64.ln(), 0.3f64.ln());
        assert_relative_eq!(posterior.variant(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(posterior.get(CallType::Artifact), 0.3, epsilon = 1e-12);
        assert_relative_eq!(posterior.error_prob(), 0.5, epsilon = 1e-12);
        assert_eq!(posterior.likelier_error(), CallType::Artifact);

        // scale of the scores is irrelevant
        let shifted = PosteriorProbabilities::from_log_scores(-1000.0, -1001.0, -1002.0);
        let total = shifted.variant() + shifted.seq_error() + shifted.artifact();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_optimal_error_threshold() {
        // confident calls pass, confident errors are filtered
        let threshold = optimal_error_threshold(&[0.01, 0.02, 0.05, 0.97, 0.99, 0.95]);
        assert!(threshold >= 0.05 && threshold < 0.95);
        // all calls very likely real
        assert_relative_eq!(optimal_error_threshold(&[0.01, 0.1, 0.2]), 0.2);
        assert_relative_eq!(optimal_error_threshold(&[]), 0.5);
    }

    #[test]
    fn test_filter_decision() {
        let artifact = PosteriorProbabilities::new(0.1, 0.2, 0.7);
        let decision = FilterDecision::new(vec!["germline", "weak_evidence"], Some(&artifact), 0.5);
        assert_eq!(decision.filter_field(), "artifact;germline");
        assert_eq!(decision.info()[0].0, "ERROR_PROB");
        assert_relative_eq!(decision.info()[0].1, 0.9, epsilon = 1e-12);

        let seq_error = PosteriorProbabilities::new(0.1, 0.6, 0.3);
        let decision = FilterDecision::new(vec!["PASS"], Some(&seq_error), 0.5);
        assert_eq!(decision.filter_field(), "seq_error");

        let variant = PosteriorProbabilities::new(0.9, 0.05, 0.05);
        let decision = FilterDecision::new(Vec::new(), Some(&variant), 0.5);
        assert!(decision.is_pass());
        assert_eq!(decision.filter_field(), "PASS");

        let decision = FilterDecision::new(vec!["contamination"], None, 0.5);
        assert_eq!(decision.filter_field(), "contamination");
        assert!(decision.info().is_empty());
    }
}
