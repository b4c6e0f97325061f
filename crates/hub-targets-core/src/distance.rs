//! Distance from the average vertical centroid, smoothed over recent frames.
//!
//! The raw distance is a linear regression on the average centroid `y`
//! (targets higher in the image are further away). Single-frame jitter is
//! damped by a strict FIFO moving average over the last `window` samples.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Calibration and smoothing parameters for [`DistanceEstimator`].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistanceParams {
    /// Regression slope applied to the average centroid `y`.
    pub slope: f64,
    /// Regression intercept.
    pub intercept: f64,
    /// Number of raw samples averaged into the smoothed output.
    pub window: usize,
}

impl Default for DistanceParams {
    fn default() -> Self {
        Self {
            slope: -1.2033,
            intercept: 23.176,
            window: 10,
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DistanceParamsError {
    #[error("distance calibration must be finite (slope={slope}, intercept={intercept})")]
    NonFiniteCalibration { slope: f64, intercept: f64 },
    #[error("distance smoothing window must hold at least one sample")]
    EmptyWindow,
}

impl DistanceParams {
    pub fn validate(&self) -> Result<(), DistanceParamsError> {
        if !self.slope.is_finite() || !self.intercept.is_finite() {
            return Err(DistanceParamsError::NonFiniteCalibration {
                slope: self.slope,
                intercept: self.intercept,
            });
        }
        if self.window == 0 {
            return Err(DistanceParamsError::EmptyWindow);
        }
        Ok(())
    }

    /// Unsmoothed distance for one frame.
    #[inline]
    pub fn raw_distance(&self, avg_centroid_y: f64) -> f64 {
        self.slope * avg_centroid_y + self.intercept
    }
}

/// Linear-regression distance with a bounded moving average.
///
/// The history starts empty and is only ever cleared by building a new
/// estimator.
#[derive(Clone, Debug)]
pub struct DistanceEstimator {
    params: DistanceParams,
    history: VecDeque<f64>,
}

impl DistanceEstimator {
    pub fn new(params: DistanceParams) -> Result<Self, DistanceParamsError> {
        params.validate()?;
        Ok(Self {
            history: VecDeque::with_capacity(params.window + 1),
            params,
        })
    }

    pub fn params(&self) -> &DistanceParams {
        &self.params
    }

    /// Feed one frame's average centroid `y` and return the smoothed distance.
    pub fn estimate(&mut self, avg_centroid_y: f64) -> f64 {
        let raw = self.params.raw_distance(avg_centroid_y);
        self.history.push_back(raw);
        while self.history.len() > self.params.window {
            self.history.pop_front();
        }
        self.mean()
    }

    /// Current smoothed distance, `None` until the first sample arrives.
    pub fn smoothed(&self) -> Option<f64> {
        if self.history.is_empty() {
            None
        } else {
            Some(self.mean())
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Samples currently averaged, oldest first.
    pub fn history(&self) -> impl Iterator<Item = f64> + '_ {
        self.history.iter().copied()
    }

    fn mean(&self) -> f64 {
        let sum: f64 = self.history.iter().sum();
        sum / self.history.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn estimator() -> DistanceEstimator {
        DistanceEstimator::new(DistanceParams::default()).unwrap()
    }

    #[test]
    fn constant_input_is_idempotent() {
        let mut est = estimator();
        let expected = -1.2033 * 100.0 + 23.176;
        let smoothed: Vec<f64> = (0..4).map(|_| est.estimate(100.0)).collect();
        for d in smoothed {
            assert_relative_eq!(d, expected, epsilon = 1e-9);
        }

        for _ in 0..20 {
            est.estimate(100.0);
        }
        assert_relative_eq!(est.smoothed().unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn history_is_bounded() {
        let mut est = estimator();
        for i in 0..11 {
            est.estimate(i as f64);
        }
        assert_eq!(est.history_len(), 10);
        // The first sample (y = 0) was evicted.
        let oldest = est.history().next().unwrap();
        assert_relative_eq!(oldest, est.params().raw_distance(1.0));

        for i in 0..100 {
            est.estimate(i as f64);
            assert!(est.history_len() <= 10);
        }
        assert_eq!(est.history_len(), 10);
    }

    #[test]
    fn step_change_moves_by_one_window_fraction() {
        let params = DistanceParams {
            slope: 1.0,
            intercept: 0.0,
            window: 10,
        };
        let mut est = DistanceEstimator::new(params).unwrap();
        for _ in 0..10 {
            est.estimate(0.0);
        }
        let after = est.estimate(100.0);
        assert_relative_eq!(after, 10.0);
    }

    #[test]
    fn smoothed_is_none_before_first_sample() {
        let mut est = estimator();
        assert!(est.smoothed().is_none());
        let d = est.estimate(240.0);
        assert_eq!(est.smoothed(), Some(d));
    }

    #[test]
    fn rejects_bad_params() {
        let zero = DistanceParams {
            window: 0,
            ..DistanceParams::default()
        };
        assert_eq!(
            DistanceEstimator::new(zero).unwrap_err(),
            DistanceParamsError::EmptyWindow
        );

        let nan = DistanceParams {
            slope: f64::NAN,
            ..DistanceParams::default()
        };
        assert!(matches!(
            DistanceEstimator::new(nan),
            Err(DistanceParamsError::NonFiniteCalibration { .. })
        ));
    }

    #[test]
    fn params_fill_missing_fields_from_defaults() {
        let params: DistanceParams = serde_json::from_str(r#"{ "window": 5 }"#).unwrap();
        assert_eq!(params.window, 5);
        assert_eq!(params.slope, -1.2033);
        assert_eq!(params.intercept, 23.176);
    }
}
