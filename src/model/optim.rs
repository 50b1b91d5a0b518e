// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

/// Adam optimizer over a flat parameter vector.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step: i32,
    first_moments: Vec<f64>,
    second_moments: Vec<f64>,
}

impl Adam {
    pub fn new(num_parameters: usize, learning_rate: f64) -> Self {
        Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            step: 0,
            first_moments: vec![0.0; num_parameters],
            second_moments: vec![0.0; num_parameters],
        }
    }

    /// Update the parameters in place, descending along the gradient.
    pub fn step(&mut self, parameters: &mut [f64], gradient: &[f64]) {
        assert_eq!(parameters.len(), self.first_moments.len());
        assert_eq!(gradient.len(), self.first_moments.len());

        self.step += 1;
        let first_correction = 1.0 - self.beta1.powi(self.step);
        let second_correction = 1.0 - self.beta2.powi(self.step);
        for (((parameter, grad), m), v) in parameters
            .iter_mut()
            .zip(gradient)
            .zip(&mut self.first_moments)
            .zip(&mut self.second_moments)
        {
            *m = self.beta1 * *m + (1.0 - self.beta1) * grad;
            *v = self.beta2 * *v + (1.0 - self.beta2) * grad * grad;
            let m_hat = *m / first_correction;
            let v_hat = *v / second_correction;
            *parameter -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimizes_quadratic() {
        // f(x, y) = (x - 3)^2 + 10 (y + 1)^2
        let mut parameters = vec![0.0, 0.0];
        let mut adam = Adam::new(2, 0.05);
        for _ in 0..3000 {
            let gradient = vec![2.0 * (parameters[0] - 3.0), 20.0 * (parameters[1] + 1.0)];
            adam.step(&mut parameters, &gradient);
        }
        assert_relative_eq!(parameters[0], 3.0, epsilon = 1e-3);
        assert_relative_eq!(parameters[1], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_first_step_has_learning_rate_size() {
        let mut parameters = vec![1.0];
        let mut adam = Adam::new(1, 0.01);
        adam.step(&mut parameters, &[123.0]);
        assert_relative_eq!(parameters[0], 0.99, epsilon = 1e-6);
    }
}
