//! Scalar Kalman filter: one instance per axis (latitude,
//! longitude, altitude), each run as an independent one-dimensional
//! recursion with time-variance inflation and accuracy-weighted gain.

/// A single scalar Kalman filter axis.
///
/// `variance < 0.0` means uninitialised — the next `update` seeds it from
/// the measurement accuracy rather than blending.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KalmanFilter {
    /// Process noise per second (axis-specific: 3 m/s altitude, 4 m/s coordinate).
    q: f64,
    /// Posterior variance (P). Negative means uninitialised.
    variance: f64,
    /// Most recent Kalman gain.
    gain: f64,
    /// Timestamp of the last update, in seconds since an arbitrary epoch.
    timestamp: f64,
}

impl KalmanFilter {
    /// Creates a filter with the given per-second process noise, in its
    /// uninitialised state.
    pub fn new(process_noise_per_second: f64) -> Self {
        Self {
            q: process_noise_per_second,
            variance: -1.0,
            gain: 1.0,
            timestamp: 0.0,
        }
    }

    pub fn is_initialised(&self) -> bool {
        self.variance >= 0.0
    }

    /// Resets to the uninitialised state.
    pub fn reset(&mut self) {
        self.variance = -1.0;
        self.gain = 1.0;
    }

    /// Resets the posterior variance directly to `accuracy^2`, without
    /// touching `gain` or `timestamp`. Used when freezing the brain.
    pub fn reset_variance_to(&mut self, accuracy: f64) {
        self.variance = accuracy * accuracy;
    }

    /// Folds a new measurement of the given accuracy (standard deviation)
    /// in at time `t` (seconds). Returns the Kalman gain used, so the
    /// caller can blend the measurement with the prior estimate via
    /// [`Self::predict`].
    pub fn update(&mut self, t: f64, measurement_accuracy: f64) -> f64 {
        let a2 = measurement_accuracy * measurement_accuracy;

        if self.variance < 0.0 {
            self.variance = a2;
            self.timestamp = t;
            return self.gain;
        }

        let dt = t - self.timestamp;
        if dt > 0.0 {
            self.variance += dt * self.q * self.q;
            self.timestamp = t;
        }

        self.gain = self.variance / (self.variance + a2);
        self.variance = (1.0 - self.gain) * self.variance;
        self.gain
    }

    /// Blends `old` (prior estimate) toward `new` (measurement) using the
    /// gain computed by the most recent [`Self::update`].
    pub fn predict(&self, old: f64, new: f64) -> f64 {
        old + self.gain * (new - old)
    }

    /// Posterior standard deviation.
    pub fn accuracy(&self) -> f64 {
        self.variance.max(0.0).sqrt()
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn first_sample_seeds_variance_and_leaves_gain_irrelevant() {
        let mut k = KalmanFilter::new(4.0);
        assert!(!k.is_initialised());
        k.update(0.0, 10.0);
        assert!(k.is_initialised());
        assert_relative_eq!(k.accuracy(), 10.0);
    }

    #[test]
    fn gain_shrinks_variance_on_repeated_updates() {
        let mut k = KalmanFilter::new(4.0);
        k.update(0.0, 20.0);
        let acc1 = k.accuracy();
        k.update(1.0, 20.0);
        let acc2 = k.accuracy();
        // Variance inflates by dt*q^2 then shrinks via the gain; with equal
        // measurement accuracy repeated, the posterior should still be
        // tighter than a single raw measurement once two fixes agree.
        assert!(acc2 < acc1 + 4.0);
    }

    #[test]
    fn predict_blends_toward_new_measurement() {
        let mut k = KalmanFilter::new(4.0);
        k.update(0.0, 10.0);
        let blended = k.predict(0.0, 10.0);
        assert_relative_eq!(blended, 10.0);
    }

    #[test]
    fn reset_returns_to_uninitialised() {
        let mut k = KalmanFilter::new(4.0);
        k.update(0.0, 10.0);
        k.reset();
        assert!(!k.is_initialised());
        assert_eq!(k.gain(), 1.0);
    }

    #[test]
    fn reset_variance_to_sets_posterior_directly() {
        let mut k = KalmanFilter::new(4.0);
        k.reset_variance_to(300.0);
        assert_relative_eq!(k.accuracy(), 300.0);
    }

    #[test]
    fn dt_zero_does_not_inflate_variance() {
        let mut k = KalmanFilter::new(4.0);
        k.update(5.0, 10.0);
        let acc_before = k.accuracy();
        k.update(5.0, 10.0);
        assert!(k.accuracy() <= acc_before);
    }
}
