// Copyright 2016-2019 Johannes Köster, David Lähnemann.
// Licensed under the GNU GPLv3 license (https://opensource.org/licenses/GPL-3.0)
// This file may not be copied, modified, or distributed
// except according to those terms.

use anyhow::Result;
use ndarray::{Array2, Axis};

/// Route log records to stderr at info level, or debug level if `verbose` is set.
pub fn setup_logger(verbose: bool) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, _| out.finish(format_args!("{}", message)))
        .level(if verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}

pub(crate) fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

pub(crate) fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Row-wise log-softmax.
pub(crate) fn log_softmax(logits: &Array2<f64>) -> Array2<f64> {
    let mut result = logits.clone();
    for mut row in result.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, x| m.max(*x));
        let log_norm = max + row.iter().map(|x| (x - max).exp()).sum::<f64>().ln();
        row.mapv_inplace(|x| x - log_norm);
    }
    result
}

/// Arithmetic mean, 0 for no values.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sigmoid_logit() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
        assert_relative_eq!(sigmoid(logit(0.2)), 0.2, epsilon = 1e-12);
        assert!(sigmoid(-800.0) >= 0.0);
        assert_relative_eq!(sigmoid(800.0), 1.0);
    }

    #[test]
    fn test_log_softmax() {
        let logits = array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0]];
        let result = log_softmax(&logits);
        for row in result.axis_iter(Axis(0)) {
            let total: f64 = row.iter().map(|x| x.exp()).sum();
            assert_relative_eq!(total, 1.0, epsilon = 1e-12);
        }
        assert_relative_eq!(result[[1, 0]], (1.0f64 / 3.0).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_mean() {
        assert_relative_eq!(mean(&[]), 0.0);
        assert_relative_eq!(mean(&[1.0, 2.0, 6.0]), 3.0);
    }
}
