//! Constant-velocity Kalman filter over `[cx, cy, a, h, vcx, vcy, va, vh]`.
//!
//! Observations are `(cx, cy, a, h)`. Noise terms scale with the subject height,
//! so taller subjects get proportionally looser priors.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// Lower bound applied to the height before it scales any noise term.
pub const MIN_HEIGHT: f64 = 1e-3;

const NDIM: usize = 4;
const STATE_DIM: usize = 2 * NDIM;

#[derive(Debug, Clone)]
pub struct KalmanFilter {
    motion_mat: Array2<f64>,
    update_mat: Array2<f64>,
    std_weight_position: f64,
    std_weight_velocity: f64,
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KalmanFilter {
    pub fn new() -> Self {
        let mut motion_mat = Array2::eye(STATE_DIM);
        for i in 0..NDIM {
            motion_mat[[i, NDIM + i]] = 1.0;
        }

        let mut update_mat = Array2::zeros((NDIM, STATE_DIM));
        for i in 0..NDIM {
            update_mat[[i, i]] = 1.0;
        }

        Self {
            motion_mat,
            update_mat,
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
        }
    }

    /// Build the initial state for an unassociated measurement.
    ///
    /// Velocities start at zero with a variance two orders of magnitude below
    /// the position terms.
    pub fn initiate(&self, measurement: [f64; 4]) -> (Array1<f64>, Array2<f64>) {
        let mut mean = Array1::zeros(STATE_DIM);
        for i in 0..NDIM {
            mean[i] = measurement[i];
        }

        let h = measurement[3].max(MIN_HEIGHT);
        let std = [
            2.0 * self.std_weight_position * h,
            2.0 * self.std_weight_position * h,
            1e-2,
            2.0 * self.std_weight_position * h,
            10.0 * self.std_weight_velocity * h,
            10.0 * self.std_weight_velocity * h,
            1e-5,
            10.0 * self.std_weight_velocity * h,
        ];

        (mean, diag_squared(&std))
    }

    /// Advance the state one frame. Inputs are left untouched.
    pub fn predict(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        check_state(mean, covariance);

        let h = mean[3].max(MIN_HEIGHT);
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-2,
            self.std_weight_position * h,
            self.std_weight_velocity * h,
            self.std_weight_velocity * h,
            1e-5,
            self.std_weight_velocity * h,
        ];
        let motion_cov = diag_squared(&std);

        let new_mean = self.motion_mat.dot(mean);
        let new_covariance = self.motion_mat.dot(covariance).dot(&self.motion_mat.t()) + motion_cov;

        (new_mean, new_covariance)
    }

    /// Map the state into measurement space, adding measurement noise.
    pub fn project(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
    ) -> (Array1<f64>, Array2<f64>) {
        check_state(mean, covariance);

        let h = mean[3].max(MIN_HEIGHT);
        let std = [
            self.std_weight_position * h,
            self.std_weight_position * h,
            1e-1,
            self.std_weight_position * h,
        ];
        let innovation_cov = diag_squared(&std);

        let mean_proj = self.update_mat.dot(mean);
        let covariance_proj =
            self.update_mat.dot(covariance).dot(&self.update_mat.t()) + innovation_cov;

        (mean_proj, covariance_proj)
    }

    /// Correct the state with a measurement using the covariance-weighted gain.
    pub fn update(
        &self,
        mean: &Array1<f64>,
        covariance: &Array2<f64>,
        measurement: [f64; 4],
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        if measurement.iter().any(|v| !v.is_finite()) {
            return Err(Error::MotionModel(format!(
                "non-finite measurement {measurement:?}"
            )));
        }

        let (projected_mean, projected_cov) = self.project(mean, covariance);

        let measurement_arr = Array1::from_vec(measurement.to_vec());
        let innovation = measurement_arr - projected_mean;

        // K = P * H^T * S^-1, with H = [I 0] so P * H^T is the first 4 columns of P.
        let s_inv = invert_4x4(&projected_cov)?;

        let pht = covariance.dot(&self.update_mat.t());
        let kalman_gain = pht.dot(&s_inv);

        let new_mean = mean + &kalman_gain.dot(&innovation);
        let new_covariance = covariance - &kalman_gain.dot(&projected_cov).dot(&kalman_gain.t());

        Ok((new_mean, new_covariance))
    }
}

fn diag_squared(std: &[f64]) -> Array2<f64> {
    let mut cov = Array2::zeros((std.len(), std.len()));
    for (i, s) in std.iter().enumerate() {
        cov[[i, i]] = s * s;
    }
    cov
}

/// Shape mismatches are programming errors, not recoverable conditions.
fn check_state(mean: &Array1<f64>, covariance: &Array2<f64>) {
    assert_eq!(mean.len(), STATE_DIM, "state mean must have 8 elements");
    assert_eq!(
        covariance.dim(),
        (STATE_DIM, STATE_DIM),
        "state covariance must be 8x8"
    );
}

/// Invert the 4x4 innovation covariance with nalgebra (pure Rust, no LAPACK).
fn invert_4x4(m: &Array2<f64>) -> Result<Array2<f64>> {
    let mut nm = nalgebra::Matrix4::zeros();
    for i in 0..NDIM {
        for j in 0..NDIM {
            nm[(i, j)] = m[[i, j]];
        }
    }
    let inv = nm
        .try_inverse()
        .ok_or_else(|| Error::MotionModel("innovation covariance is singular".to_string()))?;
    let mut res = Array2::zeros((NDIM, NDIM));
    for i in 0..NDIM {
        for j in 0..NDIM {
            res[[i, j]] = inv[(i, j)];
        }
    }
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        assert_eq!(mean[0], 100.0);
        assert_eq!(mean[3], 50.0);
        assert!(mean.iter().skip(4).all(|v| *v == 0.0));

        // position std 2 * h / 20, velocity std 10 * h / 160
        assert!((cov[[0, 0]] - 25.0).abs() < 1e-9);
        assert!((cov[[4, 4]] - 3.125f64.powi(2)).abs() < 1e-9);
        assert!(cov[[0, 0]] > cov[[4, 4]]);
    }

    #[test]
    fn test_initiate_zero_height_is_finite() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([10.0, 10.0, 0.0, 0.0]);
        let (mean, cov) = kf.predict(&mean, &cov);
        let (mean, cov) = kf.update(&mean, &cov, [10.0, 10.0, 0.0, 0.0]).unwrap();
        assert!(mean.iter().all(|v| v.is_finite()));
        assert!(cov.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_predict_is_constant_velocity() {
        let kf = KalmanFilter::new();
        let (mut mean, cov) = kf.initiate([100.0, 200.0, 0.5, 50.0]);
        mean[4] = 3.0;
        mean[5] = -2.0;
        let before = mean.clone();

        let (predicted, predicted_cov) = kf.predict(&mean, &cov);
        assert_eq!(mean, before);
        assert!((predicted[0] - 103.0).abs() < 1e-9);
        assert!((predicted[1] - 198.0).abs() < 1e-9);
        assert!(predicted_cov[[0, 0]] > cov[[0, 0]]);
    }

    #[test]
    fn test_update_moves_towards_measurement() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 100.0, 1.0, 50.0]);
        let (mean, cov) = kf.predict(&mean, &cov);
        let (corrected, corrected_cov) = kf.update(&mean, &cov, [110.0, 100.0, 1.0, 50.0]).unwrap();

        assert!(corrected[0] > 100.0 && corrected[0] < 110.0);
        assert!(corrected[4] > 0.0);
        assert!(corrected_cov[[0, 0]] < cov[[0, 0]]);
    }

    #[test]
    fn test_update_rejects_non_finite_measurement() {
        let kf = KalmanFilter::new();
        let (mean, cov) = kf.initiate([100.0, 100.0, 1.0, 50.0]);
        let result = kf.update(&mean, &cov, [f64::NAN, 100.0, 1.0, 50.0]);
        assert!(matches!(result, Err(Error::MotionModel(_))));
    }

    #[test]
    #[should_panic(expected = "8 elements")]
    fn test_wrong_dimension_panics() {
        let kf = KalmanFilter::new();
        let mean = Array1::zeros(4);
        let cov = Array2::eye(8);
        let _ = kf.predict(&mean, &cov);
    }
}
