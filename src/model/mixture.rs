// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Mixtures of overdispersed binomials whose parameters are functions of a feature vector.
//!
//! For every input row, three networks yield the component weights (softmax), the component
//! means in (0, max_mean) and the component concentrations in (0, max_concentration), both
//! sigmoid-scaled. The ceiling `max_concentration` is trained alongside the networks.
//!
//! With a Beta prior on the latent fraction f, integrating over f is exact (beta-binomial).
//! With a Gamma prior, the binomial as a function of f is replaced by a moment-matched Gamma,
//! which makes the integral closed-form again. This is only accurate for small fractions,
//! so gamma mode is meant for artifact allele fractions. In mode `none`, every component is a
//! plain binomial at its mean and overdispersion comes from mixing alone.

use std::str::FromStr;

use anyhow::Result;
use bio::stats::LogProb;
use itertools::Itertools;
use itertools_num::linspace;
use ndarray::{s, Array1, Array2, Axis};
use rand::distributions::WeightedIndex;
use rand::Rng;
use rand_distr::{Beta, Binomial, Distribution, Gamma};
use statrs::distribution::{Beta as BetaDensity, Continuous, Gamma as GammaDensity, Normal};
use statrs::function::gamma::digamma;

use crate::constants::{
    EPSILON, INITIAL_MAX_CONCENTRATION, SPECTRUM_GRID_SIZE, SPECTRUM_MAX_FRACTION,
    SPECTRUM_MIN_FRACTION, SPECTRUM_NONE_MODE_SD,
};
use crate::data::VariantType;
use crate::errors::{invalid_distribution, Error};
use crate::model::checkpoint::MixtureState;
use crate::model::likelihood;
use crate::model::mlp::Mlp;
use crate::model::optim::Adam;
use crate::model::params::{FitParams, MixtureParams};
use crate::utils::{log_softmax, logit, mean, sigmoid};

// sigmoid outputs are kept away from 0 and 1 so that shapes stay positive
const MIN_SIGMOID: f64 = 1e-10;

fn clamp_sigmoid(x: f64) -> f64 {
    sigmoid(x).max(MIN_SIGMOID).min(1.0 - MIN_SIGMOID)
}

#[derive(
    Display,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MixtureMode {
    Beta,
    Gamma,
    None,
}

impl Default for MixtureMode {
    fn default() -> Self {
        MixtureMode::Beta
    }
}

impl FromStr for MixtureMode {
    type Err = Error;

    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "beta" => Ok(MixtureMode::Beta),
            "gamma" => Ok(MixtureMode::Gamma),
            "none" => Ok(MixtureMode::None),
            _ => Err(Error::UnknownMixtureMode {
                mode: mode.to_owned(),
            }),
        }
    }
}

impl MixtureMode {
    /// Alpha and beta shape parameters of a component with given mean and concentration.
    /// For gamma, beta is the rate.
    pub fn shapes(self, mean: f64, concentration: f64) -> (f64, f64) {
        match self {
            MixtureMode::Beta => (mean * concentration, (1.0 - mean) * concentration),
            MixtureMode::Gamma | MixtureMode::None => (mean * concentration, concentration),
        }
    }

    /// Log-likelihood of alt count k at depth n under a single component.
    pub fn log_likelihood(self, n: f64, k: f64, mean: f64, concentration: f64) -> f64 {
        let (alpha, beta) = self.shapes(mean, concentration);
        match self {
            MixtureMode::Beta => likelihood::beta_binomial(n, k, alpha, beta),
            MixtureMode::Gamma => likelihood::gamma_binomial(n, k, alpha, beta),
            MixtureMode::None => likelihood::binomial(n, k, mean),
        }
    }

    /// Partial derivatives of `log_likelihood` in mean and concentration.
    pub fn log_likelihood_gradient(
        self,
        n: f64,
        k: f64,
        mean: f64,
        concentration: f64,
    ) -> (f64, f64) {
        let (alpha, beta) = self.shapes(mean, concentration);
        match self {
            MixtureMode::Beta => {
                let (d_alpha, d_beta) = likelihood::beta_binomial_gradient(n, k, alpha, beta);
                (
                    concentration * (d_alpha - d_beta),
                    mean * d_alpha + (1.0 - mean) * d_beta,
                )
            }
            MixtureMode::Gamma => {
                let (d_alpha, d_beta) = likelihood::gamma_binomial_gradient(n, k, alpha, beta);
                (concentration * d_alpha, mean * d_alpha + d_beta)
            }
            MixtureMode::None => (likelihood::binomial_gradient(n, k, mean), 0.0),
        }
    }
}

/// E[f], E[ln f] and E[f ln f] of a beta mixture.
#[derive(new, CopyGetters, Debug, Clone, Copy, PartialEq)]
#[getset(get_copy = "pub")]
pub struct BetaMixtureMoments {
    mean: f64,
    log_mean: f64,
    log_linear_mean: f64,
}

/// Network outputs for a batch of inputs, with all activations kept for backpropagation.
struct Heads {
    weight_activations: Vec<Array2<f64>>,
    mean_activations: Vec<Array2<f64>>,
    concentration_activations: Vec<Array2<f64>>,
    log_weights: Array2<f64>,
    // sigmoids of the mean and concentration networks' outputs
    mean_fractions: Array2<f64>,
    concentration_fractions: Array2<f64>,
}

fn output(activations: &[Array2<f64>]) -> &Array2<f64> {
    &activations[activations.len() - 1]
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverdispersedBinomialMixture {
    params: MixtureParams,
    weights_pre_softmax: Mlp,
    mean_pre_sigmoid: Mlp,
    concentration_pre_sigmoid: Mlp,
    max_concentration: f64,
}

impl OverdispersedBinomialMixture {
    pub fn new<R: Rng>(params: MixtureParams, rng: &mut R) -> Self {
        let layer_sizes = params.layer_sizes();
        OverdispersedBinomialMixture {
            weights_pre_softmax: Mlp::new(&layer_sizes, rng),
            mean_pre_sigmoid: Mlp::new(&layer_sizes, rng),
            concentration_pre_sigmoid: Mlp::new(&layer_sizes, rng),
            max_concentration: INITIAL_MAX_CONCENTRATION,
            params,
        }
    }

    pub fn params(&self) -> &MixtureParams {
        &self.params
    }

    pub fn mode(&self) -> MixtureMode {
        self.params.mode()
    }

    pub fn num_components(&self) -> usize {
        self.params.num_components()
    }

    pub fn max_concentration(&self) -> f64 {
        self.max_concentration
    }

    fn check_width(&self, width: usize) -> Result<()> {
        if width != self.params.input_size() {
            return Err(Error::ShapeMismatch {
                what: "input feature width",
                expected: self.params.input_size(),
                found: width,
            }
            .into());
        }
        Ok(())
    }

    fn check_batch(&self, x: &Array2<f64>, depths: &[u32], alt_counts: Option<&[u32]>) -> Result<()> {
        self.check_width(x.ncols())?;
        if depths.len() != x.nrows() {
            return Err(Error::ShapeMismatch {
                what: "depths",
                expected: x.nrows(),
                found: depths.len(),
            }
            .into());
        }
        if let Some(alt_counts) = alt_counts {
            if alt_counts.len() != depths.len() {
                return Err(Error::ShapeMismatch {
                    what: "alt counts",
                    expected: depths.len(),
                    found: alt_counts.len(),
                }
                .into());
            }
            if let Some((&depth, &alt_count)) = depths
                .iter()
                .zip(alt_counts)
                .find(|(depth, alt_count)| alt_count > depth)
            {
                return Err(Error::InvalidCounts { depth, alt_count }.into());
            }
        }
        Ok(())
    }

    fn heads(&self, x: &Array2<f64>) -> Heads {
        let weight_activations = self.weights_pre_softmax.forward_with_cache(x);
        let mean_activations = self.mean_pre_sigmoid.forward_with_cache(x);
        let concentration_activations = self.concentration_pre_sigmoid.forward_with_cache(x);
        Heads {
            log_weights: log_softmax(output(&weight_activations)),
            mean_fractions: output(&mean_activations).mapv(clamp_sigmoid),
            concentration_fractions: output(&concentration_activations).mapv(clamp_sigmoid),
            weight_activations,
            mean_activations,
            concentration_activations,
        }
    }

    fn means(&self, heads: &Heads) -> Array2<f64> {
        &heads.mean_fractions * self.params.max_mean()
    }

    fn concentrations(&self, heads: &Heads) -> Array2<f64> {
        &heads.concentration_fractions * self.max_concentration
    }

    /// Log-weight plus component log-likelihood, one row per datum and one column per component.
    fn weighted_log_likelihoods(&self, heads: &Heads, depths: &[u32], alt_counts: &[u32]) -> Array2<f64> {
        let mode = self.mode();
        let means = self.means(heads);
        let concentrations = self.concentrations(heads);
        let mut result = heads.log_weights.clone();
        for ((i, j), value) in result.indexed_iter_mut() {
            *value += mode.log_likelihood(
                depths[i] as f64,
                alt_counts[i] as f64,
                means[[i, j]],
                concentrations[[i, j]],
            );
        }
        result
    }

    /// Log of the mixture marginal likelihood of each row's alt count at its depth, given the
    /// row's features.
    pub fn forward(&self, x: &Array2<f64>, depths: &[u32], alt_counts: &[u32]) -> Result<Array1<f64>> {
        self.check_batch(x, depths, Some(alt_counts))?;
        let heads = self.heads(x);
        let weighted = self.weighted_log_likelihoods(&heads, depths, alt_counts);
        Ok(weighted
            .axis_iter(Axis(0))
            .map(|row| *LogProb::ln_sum_exp(&row.iter().map(|v| LogProb(*v)).collect_vec()))
            .collect())
    }

    /// Mean negative log-likelihood of the batch and its gradient with respect to
    /// `parameters()`.
    pub fn loss_and_gradient(
        &self,
        x: &Array2<f64>,
        depths: &[u32],
        alt_counts: &[u32],
    ) -> Result<(f64, Vec<f64>)> {
        self.check_batch(x, depths, Some(alt_counts))?;
        let batch_size = x.nrows().max(1) as f64;
        let mode = self.mode();
        let heads = self.heads(x);
        let means = self.means(&heads);
        let concentrations = self.concentrations(&heads);
        let weighted = self.weighted_log_likelihoods(&heads, depths, alt_counts);

        let mut loss = 0.0;
        // posterior component responsibilities
        let mut responsibilities = weighted.clone();
        for mut row in responsibilities.axis_iter_mut(Axis(0)) {
            let total = *LogProb::ln_sum_exp(&row.iter().map(|v| LogProb(*v)).collect_vec());
            loss -= total;
            row.mapv_inplace(|v| (v - total).exp());
        }
        loss /= batch_size;

        let weight_grad =
            (heads.log_weights.mapv(f64::exp) - &responsibilities) / batch_size;
        let mut mean_grad = Array2::<f64>::zeros(weighted.dim());
        let mut concentration_grad = Array2::<f64>::zeros(weighted.dim());
        let mut max_concentration_grad = 0.0;
        for ((i, j), r) in responsibilities.indexed_iter() {
            let (d_mean, d_concentration) = mode.log_likelihood_gradient(
                depths[i] as f64,
                alt_counts[i] as f64,
                means[[i, j]],
                concentrations[[i, j]],
            );
            let s = heads.mean_fractions[[i, j]];
            let t = heads.concentration_fractions[[i, j]];
            mean_grad[[i, j]] = -r * d_mean * self.params.max_mean() * s * (1.0 - s) / batch_size;
            concentration_grad[[i, j]] =
                -r * d_concentration * self.max_concentration * t * (1.0 - t) / batch_size;
            max_concentration_grad -= r * d_concentration * t / batch_size;
        }

        let mut gradient = self
            .weights_pre_softmax
            .backward(&heads.weight_activations, weight_grad)
            .flatten();
        gradient.extend(
            self.mean_pre_sigmoid
                .backward(&heads.mean_activations, mean_grad)
                .flatten(),
        );
        gradient.extend(
            self.concentration_pre_sigmoid
                .backward(&heads.concentration_activations, concentration_grad)
                .flatten(),
        );
        gradient.push(max_concentration_grad);
        Ok((loss, gradient))
    }

    /// All trainable parameters: the three networks followed by the concentration ceiling.
    pub fn parameters(&self) -> Vec<f64> {
        let mut parameters = self.weights_pre_softmax.flatten_parameters();
        parameters.extend(self.mean_pre_sigmoid.flatten_parameters());
        parameters.extend(self.concentration_pre_sigmoid.flatten_parameters());
        parameters.push(self.max_concentration);
        parameters
    }

    pub fn assign_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        let expected = self.parameters().len();
        if parameters.len() != expected {
            return Err(Error::ShapeMismatch {
                what: "mixture parameters",
                expected,
                found: parameters.len(),
            }
            .into());
        }
        let weights_end = self.weights_pre_softmax.num_parameters();
        let means_end = weights_end + self.mean_pre_sigmoid.num_parameters();
        self.weights_pre_softmax
            .assign_parameters(&parameters[..weights_end])?;
        self.mean_pre_sigmoid
            .assign_parameters(&parameters[weights_end..means_end])?;
        self.concentration_pre_sigmoid
            .assign_parameters(&parameters[means_end..expected - 1])?;
        self.max_concentration = parameters[expected - 1];
        Ok(())
    }

    fn single_row(&self, x: &Array1<f64>) -> Result<Array2<f64>> {
        self.check_width(x.len())?;
        Ok(x.view().insert_axis(Axis(0)).to_owned())
    }

    /// Alpha and beta shape parameters of every component for a single feature vector.
    pub fn component_shapes(&self, x: &Array1<f64>) -> Result<(Array1<f64>, Array1<f64>)> {
        let heads = self.heads(&self.single_row(x)?);
        let means = self.means(&heads);
        let concentrations = self.concentrations(&heads);
        let mode = self.mode();
        let (alphas, betas): (Vec<f64>, Vec<f64>) = means
            .row(0)
            .iter()
            .zip(concentrations.row(0).iter())
            .map(|(mean, concentration)| mode.shapes(*mean, *concentration))
            .unzip();
        Ok((Array1::from(alphas), Array1::from(betas)))
    }

    /// Component weights for a single feature vector.
    pub fn component_weights(&self, x: &Array1<f64>) -> Result<Array1<f64>> {
        let heads = self.heads(&self.single_row(x)?);
        Ok(heads.log_weights.row(0).mapv(f64::exp))
    }

    /// Closed-form moments of the beta mixture for a single feature vector.
    pub fn moments_of_underlying_beta_mixture(&self, x: &Array1<f64>) -> Result<BetaMixtureMoments> {
        if self.mode() != MixtureMode::Beta {
            return Err(Error::MomentsRequireBetaMode {
                mode: self.mode().to_string(),
            }
            .into());
        }
        let (alphas, betas) = self.component_shapes(x)?;
        let weights = self.component_weights(x)?;

        let mut moments = BetaMixtureMoments::new(0.0, 0.0, 0.0);
        for ((weight, alpha), beta) in weights.iter().zip(alphas.iter()).zip(betas.iter()) {
            let component_mean = alpha / (alpha + beta);
            moments.mean += weight * component_mean;
            moments.log_mean += weight * (digamma(*alpha) - digamma(alpha + beta));
            moments.log_linear_mean +=
                weight * component_mean * (digamma(alpha + 1.0) - digamma(alpha + beta + 1.0));
        }
        Ok(moments)
    }

    /// Draw an alt count for every row: pick a component by weight, draw a fraction from its
    /// Beta or Gamma distribution (the component mean in mode `none`), then draw from the
    /// binomial at the row's depth. Gamma fractions above 1 are truncated to 1.
    pub fn sample<R: Rng>(&self, x: &Array2<f64>, depths: &[u32], rng: &mut R) -> Result<Array1<u32>> {
        self.check_batch(x, depths, None)?;
        let mode = self.mode();
        let heads = self.heads(x);
        let means = self.means(&heads);
        let concentrations = self.concentrations(&heads);
        let weights = heads.log_weights.mapv(f64::exp);

        let mut alt_counts = Array1::zeros(depths.len());
        for (i, &depth) in depths.iter().enumerate() {
            let component = WeightedIndex::new(weights.row(i).iter())
                .map_err(invalid_distribution)?
                .sample(rng);
            let mean = means[[i, component]];
            let (alpha, beta) = mode.shapes(mean, concentrations[[i, component]]);
            let fraction = match mode {
                MixtureMode::Beta => Beta::new(alpha, beta)
                    .map_err(invalid_distribution)?
                    .sample(rng),
                MixtureMode::Gamma => Gamma::new(alpha, 1.0 / beta)
                    .map_err(invalid_distribution)?
                    .sample(rng)
                    .min(1.0),
                MixtureMode::None => mean,
            };
            alt_counts[i] = Binomial::new(depth as u64, fraction)
                .map_err(invalid_distribution)?
                .sample(rng) as u32;
        }
        Ok(alt_counts)
    }

    /// Minimize the mean negative log-likelihood with Adam over consecutive mini-batches.
    /// Returns the mean batch loss of every epoch.
    pub fn fit(
        &mut self,
        inputs: &Array2<f64>,
        depths: &[u32],
        alt_counts: &[u32],
        params: &FitParams,
    ) -> Result<Vec<f64>> {
        self.check_batch(inputs, depths, Some(alt_counts))?;
        let batch_size = params.batch_size();
        if batch_size == 0 {
            return Err(Error::InvalidBatchSize.into());
        }

        let mut parameters = self.parameters();
        let mut optimizer = Adam::new(parameters.len(), params.learning_rate());
        let num_rows = inputs.nrows();
        let mut epoch_losses = Vec::with_capacity(params.num_epochs());
        for epoch in 0..params.num_epochs() {
            let mut batch_losses = Vec::new();
            for start in (0..num_rows).step_by(batch_size) {
                let end = (start + batch_size).min(num_rows);
                let (loss, gradient) = self.loss_and_gradient(
                    &inputs.slice(s![start..end, ..]).to_owned(),
                    &depths[start..end],
                    &alt_counts[start..end],
                )?;
                optimizer.step(&mut parameters, &gradient);
                // the concentration ceiling has to stay positive
                if let Some(max_concentration) = parameters.last_mut() {
                    *max_concentration = max_concentration.max(EPSILON);
                }
                self.assign_parameters(&parameters)?;
                batch_losses.push(loss);
            }
            let epoch_loss = mean(&batch_losses);
            debug!("Mixture fit epoch {}: mean NLL {:.5}", epoch + 1, epoch_loss);
            epoch_losses.push(epoch_loss);
        }
        if let (Some(first), Some(last)) = (epoch_losses.first(), epoch_losses.last()) {
            info!(
                "Fitted {} mixture on {} data in {} epochs (mean NLL {:.5} -> {:.5}).",
                self.mode(),
                num_rows,
                params.num_epochs(),
                first,
                last
            );
        }
        Ok(epoch_losses)
    }

    /// Density of the mixture over allele fractions 0.01, 0.011, ..., 0.989 for the one-hot
    /// encoded variant type. In mode `none`, components are drawn as narrow normals around
    /// their means. The depth does not enter the density.
    pub fn spectrum_density_vs_fraction(
        &self,
        variant_type: VariantType,
        _depth: u32,
    ) -> Result<(Vec<f64>, Vec<f64>)> {
        let x = variant_type.one_hot();
        let (alphas, betas) = self.component_shapes(&x)?;
        let log_weights = self.component_weights(&x)?.mapv(f64::ln);
        let means = self.means(&self.heads(&self.single_row(&x)?));

        let mut log_densities: Vec<Box<dyn Fn(f64) -> f64>> = Vec::new();
        for j in 0..self.num_components() {
            let log_density: Box<dyn Fn(f64) -> f64> = match self.mode() {
                MixtureMode::Beta => {
                    let dist = BetaDensity::new(alphas[j], betas[j]).map_err(invalid_distribution)?;
                    Box::new(move |f| dist.ln_pdf(f))
                }
                MixtureMode::Gamma => {
                    let dist = GammaDensity::new(alphas[j], betas[j]).map_err(invalid_distribution)?;
                    Box::new(move |f| dist.ln_pdf(f))
                }
                MixtureMode::None => {
                    let dist = Normal::new(means[[0, j]], SPECTRUM_NONE_MODE_SD)
                        .map_err(invalid_distribution)?;
                    Box::new(move |f| dist.ln_pdf(f))
                }
            };
            log_densities.push(log_density);
        }

        let fractions =
            linspace(SPECTRUM_MIN_FRACTION, SPECTRUM_MAX_FRACTION, SPECTRUM_GRID_SIZE).collect_vec();
        let densities = fractions
            .iter()
            .map(|f| {
                let terms = log_weights
                    .iter()
                    .zip(&log_densities)
                    .map(|(log_weight, log_density)| LogProb(log_weight + log_density(*f)))
                    .collect_vec();
                (*LogProb::ln_sum_exp(&terms)).exp()
            })
            .collect_vec();
        Ok((fractions, densities))
    }

    fn check_component_count(&self, what: &'static str, found: usize) -> Result<()> {
        if found != self.num_components() {
            return Err(Error::ShapeMismatch {
                what,
                expected: self.num_components(),
                found,
            }
            .into());
        }
        Ok(())
    }

    /// Fix the component weights, independently of the input.
    pub fn set_weights(&mut self, weights: &[f64]) -> Result<()> {
        self.check_component_count("component weights", weights.len())?;
        self.weights_pre_softmax
            .set_constant_output(&weights.iter().map(|w| w.ln()).collect())
    }

    /// Fix the component means, independently of the input. Means must lie in (0, max_mean).
    pub fn set_means(&mut self, means: &[f64]) -> Result<()> {
        self.check_component_count("component means", means.len())?;
        let max_mean = self.params.max_mean();
        self.mean_pre_sigmoid
            .set_constant_output(&means.iter().map(|m| logit(m / max_mean)).collect())
    }

    /// Fix the component concentrations, independently of the input. Concentrations must lie
    /// in (0, max_concentration).
    pub fn set_concentrations(&mut self, concentrations: &[f64]) -> Result<()> {
        self.check_component_count("component concentrations", concentrations.len())?;
        let max_concentration = self.max_concentration;
        self.concentration_pre_sigmoid.set_constant_output(
            &concentrations
                .iter()
                .map(|c| logit(c / max_concentration))
                .collect(),
        )
    }

    pub fn state(&self) -> MixtureState {
        MixtureState::new(
            self.params.clone(),
            self.weights_pre_softmax.clone(),
            self.mean_pre_sigmoid.clone(),
            self.concentration_pre_sigmoid.clone(),
            self.max_concentration,
        )
    }

    pub fn from_state(state: MixtureState) -> Result<Self> {
        let params = state.params().clone();
        let layer_sizes = params.layer_sizes();
        for network in &[
            state.weights_pre_softmax(),
            state.mean_pre_sigmoid(),
            state.concentration_pre_sigmoid(),
        ] {
            if network.input_size() != layer_sizes[0]
                || network.output_size() != params.num_components()
            {
                return Err(Error::InvalidCheckpoint {
                    msg: format!(
                        "network of shape {} -> {} does not match mixture of {} components on {} features",
                        network.input_size(),
                        network.output_size(),
                        params.num_components(),
                        params.input_size()
                    ),
                }
                .into());
            }
        }
        if !(state.max_concentration() > 0.0) {
            return Err(Error::InvalidCheckpoint {
                msg: format!("max concentration {} is not positive", state.max_concentration()),
            }
            .into());
        }
        Ok(OverdispersedBinomialMixture {
            params,
            weights_pre_softmax: state.weights_pre_softmax().clone(),
            mean_pre_sigmoid: state.mean_pre_sigmoid().clone(),
            concentration_pre_sigmoid: state.concentration_pre_sigmoid().clone(),
            max_concentration: state.max_concentration(),
        })
    }
}
