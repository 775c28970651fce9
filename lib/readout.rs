//! Thermodynamic neuron: a single qubit used as a Boolean linear separator.
//!
//! Two input bits set the temperature of the qubit's bath through
//! `T = t_base + w1 x1 + w2 x2 + bias` (floored at zero). The qubit relaxes
//! under amplitude damping and thermal excitation from the ground state, and
//! the output bit is whether its virtual temperature ends above a threshold.

use indexmap::IndexMap;
use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use rayon::prelude::*;
use tracing::debug;
use crate::{
    config::{ bose_occupation, PLANCK },
    diagnostics::thermo,
    dynamics::dissipation::{ self, Kraus },
    hilbert,
};

/// Input weights and bias `(w1, w2, bias)`, in Kelvin.
pub type Weights = (f64, f64, f64);

/// Truth-table inputs in the order `00, 01, 10, 11`.
pub const INPUTS: [(bool, bool); 4] = [(false, false), (false, true), (true, false), (true, true)];

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ThermoNeuron {
    /// Qubit energy gap (J).
    pub delta_e: f64,
    pub gam_relax: f64,
    pub dt: f64,
    /// Number of relaxation steps from the ground state.
    pub steps: usize,
    /// Bath temperature with both inputs low and zero bias (K).
    pub t_base: f64,
    /// Firing threshold on the virtual temperature (K).
    pub threshold: f64,
}

impl Default for ThermoNeuron {
    fn default() -> Self {
        Self {
            delta_e: PLANCK * 5.0e9,
            gam_relax: 1.0,
            dt: 0.1,
            steps: 200,
            t_base: 0.05,
            threshold: 0.0575,
        }
    }
}

impl ThermoNeuron {
    /// Bath temperature for the given weights and inputs.
    pub fn temperature(&self, weights: Weights, x1: bool, x2: bool) -> f64 {
        let (w1, w2, bias) = weights;
        let x = |b: bool| if b { 1.0 } else { 0.0 };
        (self.t_base + w1 * x(x1) + w2 * x(x2) + bias).max(0.0)
    }

    fn channel(&self, temperature: f64) -> Kraus {
        let n = bose_occupation(self.delta_e, temperature);
        let g_down = 1.0 - (-self.gam_relax * (n + 1.0) * self.dt).exp();
        let g_up = 1.0 - (-self.gam_relax * n * self.dt).exp();
        dissipation::compose(
            &dissipation::damping_kraus(g_down),
            &dissipation::heating_kraus(g_up),
        )
    }

    /// State after `steps` relaxation steps from the ground state.
    pub fn relaxed_state(&self, temperature: f64) -> nd::Array2<C64> {
        let kraus = self.channel(temperature);
        (0..self.steps)
            .fold(hilbert::ground_density(1), |rho, _| dissipation::apply_kraus(&rho, &kraus))
    }

    /// Virtual temperature of the relaxed state.
    pub fn virtual_temperature(&self, temperature: f64) -> f64 {
        let pe = thermo::excited_population(&self.relaxed_state(temperature));
        thermo::virtual_temperature(pe, self.delta_e)
    }

    pub fn fire(&self, weights: Weights, x1: bool, x2: bool) -> bool {
        self.virtual_temperature(self.temperature(weights, x1, x2)) > self.threshold
    }

    /// Outputs for [`INPUTS`].
    pub fn truth_table(&self, weights: Weights) -> [bool; 4] {
        INPUTS.map(|(x1, x2)| self.fire(weights, x1, x2))
    }
}

/// Weights in `{-0.03, -0.015, 0, 0.015, 0.03}` and biases in
/// `{-0.045, ..., 0.045}` (step 0.015), in row-major order.
pub fn weight_grid() -> Vec<Weights> {
    let w: Vec<f64> = (-2..=2).map(|i| i as f64 * 0.015).collect();
    let b: Vec<f64> = (-3..=3).map(|i| i as f64 * 0.015).collect();
    w.iter().cartesian_product(w.iter()).cartesian_product(b.iter())
        .map(|((&w1, &w2), &bias)| (w1, w2, bias))
        .collect()
}

/// Result of searching the weight grid for one gate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GateResult {
    /// Target outputs for [`INPUTS`].
    pub target: [bool; 4],
    pub realizable: bool,
    /// First grid point reproducing the gate.
    pub weights: Option<Weights>,
    /// Neuron outputs at `weights`.
    pub outputs: Option<[bool; 4]>,
}

/// Boolean gates checked by [`logic_tests`].
pub fn gates() -> IndexMap<&'static str, [bool; 4]> {
    let table = |f: fn(bool, bool) -> bool| INPUTS.map(|(a, b)| f(a, b));
    [
        ("AND", table(|a, b| a && b)),
        ("OR", table(|a, b| a || b)),
        ("NAND", table(|a, b| !(a && b))),
        ("NOR", table(|a, b| !(a || b))),
        ("XOR", table(|a, b| a ^ b)),
    ]
    .into_iter()
    .collect()
}

/// Search [`weight_grid`] for weights realizing each gate.
pub fn logic_tests(neuron: &ThermoNeuron) -> IndexMap<&'static str, GateResult> {
    let tables: Vec<(Weights, [bool; 4])>
        = weight_grid().into_par_iter()
        .map(|w| (w, neuron.truth_table(w)))
        .collect();
    gates().into_iter()
        .map(|(name, target)| {
            let hit = tables.iter().find(|(_, out)| *out == target);
            debug!(gate = name, realizable = hit.is_some(), "logic test");
            let result = GateResult {
                target,
                realizable: hit.is_some(),
                weights: hit.map(|(w, _)| *w),
                outputs: hit.map(|(_, out)| *out),
            };
            (name, result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn relaxed_state_is_thermal() {
        let neuron = ThermoNeuron::default();
        for t in [0.035, 0.05, 0.065] {
            let tv = neuron.virtual_temperature(t);
            assert_relative_eq!(tv, t, max_relative = 0.03);
        }
        assert_eq!(neuron.virtual_temperature(0.0), 0.0);
    }

    #[test]
    fn worked_gates() {
        let neuron = ThermoNeuron::default();
        let t = true;
        let f = false;
        assert_eq!(neuron.truth_table((0.03, 0.03, -0.045)), [f, f, f, t]);
        assert_eq!(neuron.truth_table((0.03, 0.03, -0.015)), [f, t, t, t]);
        assert_eq!(neuron.truth_table((-0.03, -0.03, 0.045)), [t, t, t, f]);
        assert_eq!(neuron.truth_table((-0.03, -0.03, 0.015)), [t, f, f, f]);
    }

    #[test]
    fn xor_is_not_linearly_realizable() {
        let results = logic_tests(&ThermoNeuron::default());
        assert_eq!(results.len(), 5);
        for gate in ["AND", "OR", "NAND", "NOR"] {
            let r = &results[gate];
            assert!(r.realizable, "{} should be realizable", gate);
            assert_eq!(r.outputs, Some(r.target));
        }
        assert!(!results["XOR"].realizable);
        assert!(results["XOR"].weights.is_none());
    }
}
