// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Small fully connected networks with ReLU activations between layers and a linear output.

use anyhow::Result;
use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand::distributions::{Distribution, Uniform};

use crate::errors::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Linear {
    /// Shape (out, in).
    weight: Array2<f64>,
    bias: Array1<f64>,
}

impl Linear {
    /// Weights and biases uniform in [-1/sqrt(in), 1/sqrt(in)].
    pub fn new<R: Rng>(input_size: usize, output_size: usize, rng: &mut R) -> Self {
        let bound = 1.0 / (input_size.max(1) as f64).sqrt();
        let uniform = Uniform::new_inclusive(-bound, bound);
        Linear {
            weight: Array2::from_shape_simple_fn((output_size, input_size), || uniform.sample(rng)),
            bias: Array1::from_shape_simple_fn(output_size, || uniform.sample(rng)),
        }
    }

    pub fn input_size(&self) -> usize {
        self.weight.ncols()
    }

    pub fn output_size(&self) -> usize {
        self.weight.nrows()
    }

    fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weight.t()) + &self.bias
    }
}

/// Gradient of a loss with respect to all parameters of an `Mlp`, layer by layer.
#[derive(Debug, Clone)]
pub struct MlpGradient {
    layers: Vec<(Array2<f64>, Array1<f64>)>,
}

impl MlpGradient {
    pub fn flatten(&self) -> Vec<f64> {
        self.layers
            .iter()
            .flat_map(|(weight, bias)| weight.iter().chain(bias.iter()).cloned())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Linear>,
}

impl Mlp {
    /// Network with the given layer sizes, input first, output last.
    pub fn new<R: Rng>(layer_sizes: &[usize], rng: &mut R) -> Self {
        Mlp {
            layers: layer_sizes
                .windows(2)
                .map(|sizes| Linear::new(sizes[0], sizes[1], rng))
                .collect(),
        }
    }

    pub fn input_size(&self) -> usize {
        self.layers.first().map_or(0, |layer| layer.input_size())
    }

    pub fn output_size(&self) -> usize {
        self.layers.last().map_or(0, |layer| layer.output_size())
    }

    pub fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        self.forward_with_cache(input).pop().unwrap_or_else(|| input.clone())
    }

    /// Activations of every layer, starting with the input itself and ending with the output.
    pub(crate) fn forward_with_cache(&self, input: &Array2<f64>) -> Vec<Array2<f64>> {
        let mut activations = vec![input.clone()];
        for (i, layer) in self.layers.iter().enumerate() {
            let mut output = layer.forward(&activations[i]);
            if i + 1 < self.layers.len() {
                output.mapv_inplace(|x| x.max(0.0));
            }
            activations.push(output);
        }
        activations
    }

    /// Backpropagate the gradient of the loss with respect to the output through the network.
    pub(crate) fn backward(
        &self,
        activations: &[Array2<f64>],
        output_gradient: Array2<f64>,
    ) -> MlpGradient {
        let mut gradient = output_gradient;
        let mut layers = Vec::with_capacity(self.layers.len());
        for (i, layer) in self.layers.iter().enumerate().rev() {
            let input = &activations[i];
            layers.push((gradient.t().dot(input), gradient.sum_axis(Axis(0))));
            if i > 0 {
                let mut input_gradient = gradient.dot(&layer.weight);
                // ReLU
                input_gradient.zip_mut_with(input, |g, x| {
                    if *x <= 0.0 {
                        *g = 0.0
                    }
                });
                gradient = input_gradient;
            }
        }
        layers.reverse();
        MlpGradient { layers }
    }

    pub fn num_parameters(&self) -> usize {
        self.layers
            .iter()
            .map(|layer| layer.weight.len() + layer.bias.len())
            .sum()
    }

    /// All weights and biases, in the order of `MlpGradient::flatten`.
    pub fn flatten_parameters(&self) -> Vec<f64> {
        self.layers
            .iter()
            .flat_map(|layer| layer.weight.iter().chain(layer.bias.iter()).cloned())
            .collect()
    }

    pub fn assign_parameters(&mut self, parameters: &[f64]) -> Result<()> {
        if parameters.len() != self.num_parameters() {
            return Err(Error::ShapeMismatch {
                what: "network parameters",
                expected: self.num_parameters(),
                found: parameters.len(),
            }
            .into());
        }
        let mut values = parameters.iter();
        for layer in &mut self.layers {
            for (target, value) in layer
                .weight
                .iter_mut()
                .chain(layer.bias.iter_mut())
                .zip(&mut values)
            {
                *target = *value;
            }
        }
        Ok(())
    }

    /// Make the output independent of the input: zero weights in the last layer and the
    /// given values as its bias.
    pub(crate) fn set_constant_output(&mut self, values: &Array1<f64>) -> Result<()> {
        let last = self.layers.last_mut().ok_or(Error::ShapeMismatch {
            what: "network layers",
            expected: 1,
            found: 0,
        })?;
        if values.len() != last.bias.len() {
            return Err(Error::ShapeMismatch {
                what: "constant output",
                expected: last.bias.len(),
                found: values.len(),
            }
            .into());
        }
        last.weight.fill(0.0);
        last.bias.assign(values);
        Ok(())
    }
}
