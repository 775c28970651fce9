//! Seeded colored noise: a per-qubit Ornstein-Uhlenbeck process on top of a
//! static per-qubit drift.

use rand::{ rngs::StdRng, Rng, SeedableRng };
use rand_distr::StandardNormal;
use crate::{
    config::SimulationParams,
    error::{ Error, Result },
};

/// Exactly discretized Ornstein-Uhlenbeck process per qubit,
/// `x ← x e^{-dt/τ} + σ √(1 - e^{-2dt/τ}) ξ`, plus a constant drift offset
/// drawn once from `N(0, drift_strength²)`.
///
/// Fully determined by the seed; two processes built from the same inputs
/// produce identical sequences.
#[derive(Clone, Debug)]
pub struct ColoredNoise {
    rng: StdRng,
    enabled: bool,
    tau: f64,
    sigma: Vec<f64>,
    drift: Vec<f64>,
    state: Vec<f64>,
}

impl ColoredNoise {
    /// `noise_scales` multiplies the process amplitude per qubit.
    pub fn new(params: &SimulationParams, noise_scales: &[f64]) -> Result<Self> {
        if noise_scales.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(Error::config("noise scales must be finite and non-negative"));
        }
        let n = noise_scales.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let drift: Vec<f64>
            = if params.noise_enable {
                (0..n)
                    .map(|_| {
                        params.drift_strength * rng.sample::<f64, _>(StandardNormal)
                    })
                    .collect()
            } else {
                vec![0.0; n]
            };
        let sigma: Vec<f64>
            = noise_scales.iter()
            .map(|s| params.noise_strength * s)
            .collect();
        Ok(Self {
            rng,
            enabled: params.noise_enable,
            tau: params.noise_tau,
            sigma,
            drift,
            state: vec![0.0; n],
        })
    }

    pub fn n_qubits(&self) -> usize { self.state.len() }

    pub fn drift(&self) -> &[f64] { &self.drift }

    /// Advance every qubit's process by `dt` and return the total injected
    /// values (process plus drift).
    pub fn step(&mut self, dt: f64) -> Vec<f64> {
        if !self.enabled { return vec![0.0; self.n_qubits()]; }
        let decay = (-dt / self.tau).exp();
        let spread = (1.0 - decay * decay).max(0.0).sqrt();
        let iter
            = self.state.iter_mut()
            .zip(self.sigma.iter())
            .zip(self.drift.iter());
        let mut out = Vec::with_capacity(self.sigma.len());
        for ((x, sigma), drift) in iter {
            let xi: f64 = self.rng.sample(StandardNormal);
            *x = *x * decay + sigma * spread * xi;
            out.push(*x + drift);
        }
        out
    }
}
