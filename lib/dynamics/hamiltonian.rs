//! Time-dependent lattice Hamiltonian and its one-step propagator.

use ndarray as nd;
use ndarray_linalg::{ EighInto, UPLO };
use num_complex::Complex64 as C64;
use crate::{
    config::{ BathFactors, BathSchedule, CouplingParams, NoiseTarget, SimulationParams },
    error::{ Error, Result },
    hilbert,
    lattice::LatticeOps,
    pulse::PulseSchedule,
};

/// Instantaneous single-qubit quantities at one time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct QubitTerms {
    pub bath: BathFactors,
    /// Reduced flux threading the SQUID loop, in flux quanta.
    pub flux: f64,
    /// Flux-tuned transition frequency.
    pub omega01: f64,
    /// `E_J(Φ) / E_C`.
    pub ej_over_ec: f64,
    /// Noise and drift contribution to the detuning.
    pub detuning: f64,
    /// Rabi frequency Ω.
    pub drive_amp: f64,
    /// Drive phase φ.
    pub drive_phase: f64,
}

impl QubitTerms {
    /// Leakage-risk proxy `x² / (1 + x²)` with `x = Ω / (2 |α|)` and the
    /// transmon anharmonicity `α = -E_C`.
    pub fn leak_risk(&self, transmon_ec: f64) -> f64 {
        let x = self.drive_amp / (2.0 * transmon_ec.abs());
        x * x / (1.0 + x * x)
    }
}

/// Builds `H(t)` from the per-qubit parameters, the bath schedule, the pulse
/// schedule, and the couplings on a fixed lattice. Holds no mutable state.
#[derive(Clone, Debug)]
pub struct HamiltonianModel<'a> {
    ops: &'a LatticeOps,
    params: &'a [SimulationParams],
    bath: &'a BathSchedule,
    coupling: &'a CouplingParams,
    pulses: &'a PulseSchedule,
}

impl<'a> HamiltonianModel<'a> {
    /// `params` holds one (possibly jittered) parameter set per qubit.
    pub fn new(
        ops: &'a LatticeOps,
        params: &'a [SimulationParams],
        bath: &'a BathSchedule,
        coupling: &'a CouplingParams,
        pulses: &'a PulseSchedule,
    ) -> Result<Self>
    {
        let n = ops.n_qubits();
        if params.len() != n {
            return Err(Error::ShapeMismatch {
                what: "per-qubit parameters", expected: (n, 1), got: (params.len(), 1) });
        }
        if pulses.n_qubits() != n {
            return Err(Error::ShapeMismatch {
                what: "pulse amplitudes",
                expected: (n, pulses.n_segments()),
                got: (pulses.n_qubits(), pulses.n_segments()),
            });
        }
        Ok(Self { ops, params, bath, coupling, pulses })
    }

    pub fn n_qubits(&self) -> usize { self.ops.n_qubits() }

    /// Single-qubit quantities for qubit `q` at time `t` with injected noise
    /// value `noise` (routed by the qubit's noise target).
    pub fn qubit_terms(&self, t: f64, q: usize, noise: f64) -> QubitTerms {
        let p = &self.params[q];
        let bath = self.bath.factors(t, q, p.t_bath);
        let flux_drive
            = if p.transmon_flux_use_bath { bath.wave }
            else { (p.phi_rate * t).sin() };
        let flux = p.transmon_flux_amp * flux_drive;
        let (detuning, phase_noise) = match p.noise_target {
            NoiseTarget::Detuning => (noise, 0.0),
            NoiseTarget::DrivePhase => (0.0, noise),
        };
        QubitTerms {
            bath,
            flux,
            omega01: p.omega01_at(flux),
            ej_over_ec: p.ej_at(flux) / p.transmon_ec,
            detuning,
            drive_amp: p.omega_drive * bath.drive * (1.0 + self.pulses.amp_at(q, t)),
            drive_phase: p.phi_drive + p.phi_rate * t + phase_noise,
        }
    }

    /// Single-qubit quantities for every qubit; `noise` must have one entry
    /// per qubit.
    pub fn all_terms(&self, t: f64, noise: &[f64]) -> Vec<QubitTerms> {
        (0..self.n_qubits())
            .map(|q| self.qubit_terms(t, q, noise.get(q).copied().unwrap_or(0.0)))
            .collect()
    }

    /// Assemble the generator from precomputed single-qubit terms.
    pub fn assemble(&self, t: f64, terms: &[QubitTerms]) -> nd::Array2<C64> {
        let dim = self.ops.dim();
        let mut H: nd::Array2<C64> = nd::Array2::zeros((dim, dim));
        for (q, term) in terms.iter().enumerate() {
            let zcoef = (term.omega01 + term.detuning) / 2.0;
            let half_rabi = term.drive_amp / 2.0;
            H.scaled_add(C64::from(zcoef), &self.ops.z[q]);
            H.scaled_add(C64::from(half_rabi * term.drive_phase.cos()), &self.ops.x[q]);
            H.scaled_add(C64::from(half_rabi * term.drive_phase.sin()), &self.ops.y[q]);
        }
        let boost = self.coupling.boost(t);
        let iter
            = self.ops.edges().iter()
            .zip(self.ops.cap.iter().zip(self.ops.ind.iter()));
        for (&(i, j), (cap, ind)) in iter {
            let drive_mean = (terms[i].bath.drive + terms[j].bath.drive) / 2.0;
            let decay_mean = (terms[i].bath.decay + terms[j].bath.decay) / 2.0;
            H.scaled_add(C64::from(self.coupling.j_cap * boost * drive_mean), cap);
            H.scaled_add(C64::from(self.coupling.j_ind * decay_mean), ind);
        }
        H
    }

    /// `H(t)` with per-qubit injected noise values.
    pub fn hamiltonian(&self, t: f64, noise: &[f64]) -> nd::Array2<C64> {
        self.assemble(t, &self.all_terms(t, noise))
    }

    /// Noise-free `H(t)`.
    pub fn coherent(&self, t: f64) -> nd::Array2<C64> {
        self.hamiltonian(t, &vec![0.0; self.n_qubits()])
    }
}

/// Exact propagator `exp(-i H dt)` of a Hermitian generator, by
/// diagonalization.
///
/// Requires `H` to be in units of angular frequency.
pub fn propagator(H: nd::Array2<C64>, dt: f64) -> Result<nd::Array2<C64>> {
    let (E, V): (nd::Array1<f64>, nd::Array2<C64>) = H.eigh_into(UPLO::Lower)?;
    let phases: nd::Array1<C64> = E.mapv(|e| (-C64::i() * e * dt).exp());
    let scaled = &V * &phases.insert_axis(nd::Axis(0));
    Ok(scaled.dot(&hilbert::dagger(&V)))
}

/// Conjugate a density matrix by a unitary: `U ρ U†`.
pub fn conjugate(U: &nd::Array2<C64>, rho: &nd::Array2<C64>) -> nd::Array2<C64> {
    U.dot(rho).dot(&hilbert::dagger(U))
}
