//! Synthetic fix generator for scenario replay.
//!
//! Plays the role the teacher's `Oracle` plays for entity physics, but
//! without ground-truth state to simulate against: there is exactly one
//! device, so the "oracle" is just a seeded, reproducible source of noisy
//! `RawFix`es shaped like the scenarios in use.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use std::time::{Duration, SystemTime};
use transect_core::RawFix;

pub struct Oracle {
    rng: ChaCha8Rng,
    jitter: Normal<f64>,
}

impl Oracle {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            // ~1m of GPS coordinate jitter at mid-latitudes.
            jitter: Normal::new(0.0, 0.000003).unwrap(),
        }
    }

    fn jittered(&mut self, value: f64) -> f64 {
        value + self.jitter.sample(&mut self.rng)
    }

    /// `n` fixes clustered at `(lat, lon)`, `spacing` apart, each carrying
    /// `h_acc` horizontal accuracy.
    pub fn stationary_fixes(&mut self, start: SystemTime, n: u32, lat: f64, lon: f64, h_acc: f64, spacing: Duration) -> Vec<RawFix> {
        (0..n)
            .map(|i| RawFix {
                timestamp: start + spacing * i,
                lat: self.jittered(lat),
                lon: self.jittered(lon),
                altitude: 0.0,
                h_accuracy: h_acc,
                v_accuracy: h_acc,
                speed: -1.0,
                course: -1.0,
            })
            .collect()
    }

    /// `n` fixes marching from `(lat, lon)` by `(delta_lat, delta_lon)` per
    /// tick, `spacing` apart.
    pub fn marching_fixes(
        &mut self,
        start: SystemTime,
        start_index: u32,
        n: u32,
        lat: f64,
        lon: f64,
        delta_lat: f64,
        delta_lon: f64,
        h_acc: f64,
        spacing: Duration,
    ) -> Vec<RawFix> {
        (0..n)
            .map(|i| {
                let step = (start_index + i) as f64;
                RawFix {
                    timestamp: start + spacing * (start_index + i),
                    lat: self.jittered(lat + delta_lat * step),
                    lon: self.jittered(lon + delta_lon * step),
                    altitude: 0.0,
                    h_accuracy: h_acc,
                    v_accuracy: h_acc,
                    speed: -1.0,
                    course: -1.0,
                }
            })
            .collect()
    }
}
