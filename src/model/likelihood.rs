// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

//! Log-likelihoods of an alt count `k` out of depth `n` under a single mixture component,
//! together with their partial derivatives in the component's shape parameters.

use statrs::function::gamma::{digamma, ln_gamma};

fn ln_binomial_coefficient(n: f64, k: f64) -> f64 {
    ln_gamma(n + 1.0) - ln_gamma(k + 1.0) - ln_gamma(n - k + 1.0)
}

// x * ln(y) with 0 * ln(0) = 0
fn xlny(x: f64, y: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x * y.ln()
    }
}

/// Beta-binomial: the exact marginal of Binomial(k | n, f) over f ~ Beta(alpha, beta).
pub fn beta_binomial(n: f64, k: f64, alpha: f64, beta: f64) -> f64 {
    ln_binomial_coefficient(n, k) + ln_gamma(k + alpha) + ln_gamma(n - k + beta)
        - ln_gamma(n + alpha + beta)
        + ln_gamma(alpha + beta)
        - ln_gamma(alpha)
        - ln_gamma(beta)
}

/// Partial derivatives of `beta_binomial` in alpha and beta.
pub fn beta_binomial_gradient(n: f64, k: f64, alpha: f64, beta: f64) -> (f64, f64) {
    let common = digamma(alpha + beta) - digamma(n + alpha + beta);
    (
        digamma(k + alpha) - digamma(alpha) + common,
        digamma(n - k + beta) - digamma(beta) + common,
    )
}

/// Shape and rate of the Gamma distribution matching mean and variance of
/// Beta(k + 1, n - k + 1), which is, up to the factor 1 / (n + 1), the binomial likelihood
/// as a function of f.
fn binomial_gamma_approximation(n: f64, k: f64) -> (f64, f64) {
    let alpha = (k + 1.0) * (n + 3.0) / (n - k + 1.0);
    let beta = (n + 2.0) * (n + 3.0) / (n - k + 1.0);
    (alpha, beta)
}

/// Gamma-binomial: the marginal over f ~ Gamma(alpha, beta) (rate parametrization) of the
/// Gamma approximation to Binomial(k | n, f).
///
/// The approximation is only sensible if f is small, since the Gamma puts mass on f > 1.
pub fn gamma_binomial(n: f64, k: f64, alpha: f64, beta: f64) -> f64 {
    let (alpha_tilde, beta_tilde) = binomial_gamma_approximation(n, k);
    let exponent_term = alpha_tilde * beta_tilde.ln() + alpha * beta.ln()
        - (alpha + alpha_tilde - 1.0) * (beta + beta_tilde).ln();
    let gamma_term =
        ln_gamma(alpha + alpha_tilde - 1.0) - ln_gamma(alpha_tilde) - ln_gamma(alpha);
    exponent_term + gamma_term - (n + 1.0).ln()
}

/// Partial derivatives of `gamma_binomial` in alpha and beta.
pub fn gamma_binomial_gradient(n: f64, k: f64, alpha: f64, beta: f64) -> (f64, f64) {
    let (alpha_tilde, beta_tilde) = binomial_gamma_approximation(n, k);
    (
        beta.ln() - (beta + beta_tilde).ln() + digamma(alpha + alpha_tilde - 1.0)
            - digamma(alpha),
        alpha / beta - (alpha + alpha_tilde - 1.0) / (beta + beta_tilde),
    )
}

/// Plain binomial with success probability p.
pub fn binomial(n: f64, k: f64, p: f64) -> f64 {
    ln_binomial_coefficient(n, k) + xlny(k, p) + xlny(n - k, 1.0 - p)
}

/// Derivative of `binomial` in p.
pub fn binomial_gradient(n: f64, k: f64, p: f64) -> f64 {
    let mut grad = 0.0;
    if k > 0.0 {
        grad += k / p;
    }
    if n - k > 0.0 {
        grad -= (n - k) / (1.0 - p);
    }
    grad
}
