//! Configuration values for a simulation run.
//!
//! All types are plain, fully-populated values with a documented `Default`;
//! derived quantities are exposed through explicit methods rather than being
//! filled in after construction. Everything deserializes from TOML through
//! [`SimConfig::from_toml_str`], which validates before returning.

use std::f64::consts::{ PI, TAU };
use ndarray as nd;
use num_complex::Complex64 as C64;
use rand::{ rngs::StdRng, Rng, SeedableRng };
use serde::Deserialize;
use crate::{
    error::{ Error, Result },
    hilbert,
};

/// Planck constant (J s).
pub const PLANCK: f64 = 6.626_070_15e-34;

/// Boltzmann constant (J/K).
pub const BOLTZMANN: f64 = 1.380_649e-23;

/// Bose-Einstein occupation of a mode with energy `energy` (J) at temperature
/// `temperature` (K). Zero at or below absolute zero.
pub fn bose_occupation(energy: f64, temperature: f64) -> f64 {
    if temperature <= 0.0 || energy <= 0.0 { return 0.0; }
    let x = energy / (BOLTZMANN * temperature);
    if x > 700.0 { 0.0 } else { 1.0 / x.exp_m1() }
}

/// Where the colored noise process is injected.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseTarget {
    /// Adds to each qubit's σ<sub>*z*</sub> detuning.
    Detuning,
    /// Adds to each qubit's drive phase.
    DrivePhase,
}

/// Behavior when a constructed Kraus set fails its completeness check.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
    /// Log a warning and keep going.
    Warn,
    /// Abort the run with [`Error::Completeness`].
    Strict,
}

/// Initial global state of the lattice.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum InitialState {
    /// Every qubit in `|0⟩`.
    Ground,
    /// Every qubit in `|1⟩`.
    Excited,
    /// Every qubit in `(|0⟩ + |1⟩) / √2`.
    Plus,
    /// Every qubit in `α|0⟩ + β|1⟩`, amplitudes given as `(re, im)` pairs.
    Qubit { alpha: (f64, f64), beta: (f64, f64) },
    /// `(|00⟩ + |11⟩) / √2` on qubits `a`, `b`; all others in `|0⟩`.
    Bell { a: usize, b: usize },
    /// `I / 2^n`.
    MaximallyMixed,
}

impl InitialState {
    /// Build the `2^n × 2^n` density matrix.
    pub fn density(&self, n: usize) -> Result<nd::Array2<C64>> {
        let product = |ket: nd::Array1<C64>| {
            hilbert::product_density(&vec![ket; n])
        };
        match self {
            Self::Ground => Ok(hilbert::ground_density(n)),
            Self::Excited => Ok(product(hilbert::ket_excited())),
            Self::Plus => Ok(product(hilbert::ket_plus())),
            Self::Qubit { alpha, beta } => {
                let ket = hilbert::qubit_ket(
                    C64::new(alpha.0, alpha.1), C64::new(beta.0, beta.1))?;
                Ok(product(ket))
            },
            Self::Bell { a, b } => {
                if a == b || *a >= n || *b >= n {
                    return Err(Error::config(format!(
                        "Bell pair ({}, {}) invalid for {} qubits", a, b, n)));
                }
                Ok(hilbert::bell_density(*a.min(b), *a.max(b), n))
            },
            Self::MaximallyMixed => Ok(hilbert::maximally_mixed(n)),
        }
    }
}

/// Target of the periodic reset blend.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetTarget {
    /// All-ground pure state.
    Ground,
    /// The run's initial state.
    Initial,
    /// The maximally mixed state.
    MaximallyMixed,
}

/// Physical, noise, and reset parameters for one run.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Bare qubit frequency at zero flux (angular).
    pub omega0: f64,
    /// Drive amplitude Ω (angular).
    pub omega_drive: f64,
    /// Drive phase offset φ₀ (radians).
    pub phi_drive: f64,
    /// Rate at which the drive phase advances (radians per unit time).
    pub phi_rate: f64,
    /// Physical qubit frequency (Hz), fixing the energy gap in joules.
    pub qubit_freq_hz: f64,
    /// Energy relaxation rate.
    pub gam_relax: f64,
    /// Pure dephasing rate.
    pub gamma_phi: f64,
    /// Base bath temperature (K).
    pub t_bath: f64,
    /// Step size.
    pub dt: f64,
    /// Total duration.
    pub tmax: f64,
    pub initial: InitialState,
    pub noise_enable: bool,
    /// Standard deviation of the Ornstein-Uhlenbeck process.
    pub noise_strength: f64,
    /// Correlation time of the Ornstein-Uhlenbeck process.
    pub noise_tau: f64,
    /// Standard deviation of the static per-qubit detuning offset.
    pub drift_strength: f64,
    pub noise_target: NoiseTarget,
    pub seed: u64,
    pub reset_enable: bool,
    pub reset_period: f64,
    pub reset_width: f64,
    pub reset_phase: f64,
    /// Blend fraction applied at each step inside a reset window.
    pub reset_strength: f64,
    pub reset_target: ResetTarget,
    /// Transmon charging energy E<sub>C</sub> (angular).
    pub transmon_ec: f64,
    /// Flux modulation amplitude in flux quanta.
    pub transmon_flux_amp: f64,
    /// Drive the flux from the bath wave instead of a sinusoid.
    pub transmon_flux_use_bath: bool,
    /// Relative spread applied by [`Self::jittered`].
    pub jitter: f64,
    /// Record every `record_every`-th step.
    pub record_every: usize,
    /// Maximum tolerated `|Tr ρ - 1|` before renormalization.
    pub trace_tol: f64,
    /// Tolerance on `‖Σ K†K - I‖`.
    pub kraus_tol: f64,
    pub strictness: Strictness,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            omega0: 4.0,
            omega_drive: 2.2,
            phi_drive: 0.0,
            phi_rate: 0.35,
            qubit_freq_hz: 5.0e9,
            gam_relax: 0.055,
            gamma_phi: 0.06,
            t_bath: 0.01,
            dt: 0.02,
            tmax: 12.0,
            initial: InitialState::Plus,
            noise_enable: true,
            noise_strength: 0.16,
            noise_tau: 0.9,
            drift_strength: 0.08,
            noise_target: NoiseTarget::Detuning,
            seed: 0,
            reset_enable: true,
            reset_period: 4.0,
            reset_width: 0.8,
            reset_phase: 0.0,
            reset_strength: 0.15,
            reset_target: ResetTarget::Ground,
            transmon_ec: 0.2,
            transmon_flux_amp: 0.12,
            transmon_flux_use_bath: true,
            jitter: 0.02,
            record_every: 1,
            trace_tol: 1e-3,
            kraus_tol: 1e-9,
            strictness: Strictness::Warn,
        }
    }
}

impl SimulationParams {
    /// Check all fields for physically meaningful values.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("dt", self.dt),
            ("tmax", self.tmax),
            ("noise_tau", self.noise_tau),
            ("reset_period", self.reset_period),
            ("transmon_ec", self.transmon_ec),
            ("qubit_freq_hz", self.qubit_freq_hz),
            ("trace_tol", self.trace_tol),
            ("kraus_tol", self.kraus_tol),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::config(format!(
                    "{} must be positive and finite, got {}", name, value)));
            }
        }
        let non_negative = [
            ("omega0", self.omega0),
            ("gam_relax", self.gam_relax),
            ("gamma_phi", self.gamma_phi),
            ("t_bath", self.t_bath),
            ("noise_strength", self.noise_strength),
            ("drift_strength", self.drift_strength),
            ("reset_width", self.reset_width),
            ("jitter", self.jitter),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(Error::config(format!(
                    "{} must be non-negative and finite, got {}", name, value)));
            }
        }
        if !(0.0..=1.0).contains(&self.reset_strength) {
            return Err(Error::config(format!(
                "reset_strength must lie in [0, 1], got {}", self.reset_strength)));
        }
        if self.jitter >= 1.0 {
            return Err(Error::config("jitter must be below 1"));
        }
        if self.record_every == 0 {
            return Err(Error::config("record_every must be at least 1"));
        }
        Ok(())
    }

    /// Energy gap `h f` at zero flux (J).
    pub fn delta_e(&self) -> f64 { PLANCK * self.qubit_freq_hz }

    /// Maximum Josephson energy that places the zero-flux transmon frequency
    /// `sqrt(8 E_J E_C) - E_C` at `omega0`.
    pub fn ej_max(&self) -> f64 {
        (self.omega0 + self.transmon_ec).powi(2) / (8.0 * self.transmon_ec)
    }

    /// Josephson energy at reduced flux `phi` (flux quanta).
    pub fn ej_at(&self, phi: f64) -> f64 { self.ej_max() * (PI * phi).cos().abs() }

    /// Flux-tuned transmon transition frequency at reduced flux `phi`.
    pub fn omega01_at(&self, phi: f64) -> f64 {
        (8.0 * self.ej_at(phi) * self.transmon_ec).sqrt() - self.transmon_ec
    }

    /// Number of steps, `ceil(tmax / dt)`.
    pub fn n_steps(&self) -> usize { (self.tmax / self.dt - 1e-9).ceil().max(0.0) as usize }

    /// Produce `n` per-qubit copies with multiplicative jitter of relative size
    /// `self.jitter` on the qubit frequency, drive amplitude, and decay rates.
    ///
    /// Deterministic given `seed`.
    pub fn jittered(&self, seed: u64, n: usize) -> Vec<Self> {
        let mut rng = StdRng::seed_from_u64(seed);
        let factor = |rng: &mut StdRng| {
            1.0 + self.jitter * (2.0 * rng.gen::<f64>() - 1.0)
        };
        (0..n)
            .map(|_| {
                let mut p = self.clone();
                p.omega0 *= factor(&mut rng);
                p.omega_drive *= factor(&mut rng);
                p.gam_relax *= factor(&mut rng);
                p.gamma_phi *= factor(&mut rng);
                p
            })
            .collect()
    }
}

/// Shape of the periodic bath modulation.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Square,
    Sine,
    Triangle,
}

/// Bath-schedule multipliers for one qubit at one instant.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BathFactors {
    /// Raw wave value in `[0, 1]`.
    pub wave: f64,
    /// Multiplier on drive amplitude and capacitive coupling.
    pub drive: f64,
    /// Multiplier on decay rates and inductive coupling.
    pub decay: f64,
    /// Bath temperature (K).
    pub temperature: f64,
}

/// Periodic modulation of the bath ("hot" and "cold" strokes).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct BathSchedule {
    pub enable: bool,
    pub period: f64,
    /// Fraction of each period spent in the hot stroke (square wave).
    pub duty: f64,
    /// Temperature swing (K).
    pub amp_t: f64,
    pub amp_gamma: f64,
    pub amp_drive: f64,
    pub gamma_scale: f64,
    pub drive_scale: f64,
    pub waveform: Waveform,
    /// Phase offset between neighboring qubits, in cycles.
    pub phase_per_qubit: f64,
    /// Global phase offset, in cycles.
    pub global_phase: f64,
}

impl Default for BathSchedule {
    fn default() -> Self {
        Self {
            enable: true,
            period: 4.0,
            duty: 0.35,
            amp_t: 0.04,
            amp_gamma: 0.35,
            amp_drive: 0.3,
            gamma_scale: 1.0,
            drive_scale: 1.0,
            waveform: Waveform::Square,
            phase_per_qubit: 0.25,
            global_phase: 0.0,
        }
    }
}

impl BathSchedule {
    pub fn validate(&self) -> Result<()> {
        if !(self.period.is_finite() && self.period > 0.0) {
            return Err(Error::config("bath period must be positive"));
        }
        if !(0.0..=1.0).contains(&self.duty) {
            return Err(Error::config("bath duty must lie in [0, 1]"));
        }
        if self.gamma_scale < 0.0 || self.drive_scale < 0.0 || self.amp_t < 0.0 {
            return Err(Error::config("bath scales must be non-negative"));
        }
        if self.amp_gamma < -1.0 || self.amp_drive < -1.0 {
            return Err(Error::config("bath amplitudes must not flip sign of rates"));
        }
        Ok(())
    }

    /// Phase offset of qubit `q`'s schedule, in cycles, reduced to `[0, 1)`.
    pub fn cycle_phase(&self, q: usize) -> f64 {
        (self.global_phase + q as f64 * self.phase_per_qubit).rem_euclid(1.0)
    }

    /// Raw wave value in `[0, 1]` for qubit `q` at time `t`.
    pub fn wave(&self, t: f64, q: usize) -> f64 {
        if !self.enable { return 0.0; }
        let phase = t / self.period + self.cycle_phase(q);
        let frac = phase.rem_euclid(1.0);
        match self.waveform {
            Waveform::Square => if frac < self.duty { 1.0 } else { 0.0 },
            Waveform::Sine => 0.5 * (1.0 + (TAU * phase).sin()),
            Waveform::Triangle => 1.0 - (2.0 * frac - 1.0).abs(),
        }
    }

    /// `true` while qubit `q` sits in the hot stroke.
    pub fn is_hot(&self, t: f64, q: usize) -> bool { self.wave(t, q) >= 0.5 }

    /// All multipliers for qubit `q` at time `t`, on top of base temperature
    /// `t_bath`.
    pub fn factors(&self, t: f64, q: usize, t_bath: f64) -> BathFactors {
        let wave = self.wave(t, q);
        BathFactors {
            wave,
            drive: self.drive_scale * (1.0 + self.amp_drive * wave),
            decay: self.gamma_scale * (1.0 + self.amp_gamma * wave),
            temperature: t_bath + self.amp_t * wave,
        }
    }
}

/// Lattice topology, resolved to an adjacency matrix by
/// [`Adjacency::from_spec`][crate::lattice::Adjacency::from_spec].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "matrix")]
pub enum AdjacencySpec {
    /// No edges.
    Isolated,
    /// Open chain `0 - 1 - ... - (n-1)`.
    Chain,
    /// Closed ring; for four qubits this is the 2×2 plaquette.
    Ring,
    /// Every pair coupled.
    AllToAll,
    /// Explicit 0/1 matrix.
    Matrix(Vec<Vec<u8>>),
}

/// Two-qubit coupling strengths and topology.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CouplingParams {
    /// Capacitive (exchange-like, XX + YY) strength.
    pub j_cap: f64,
    /// Inductive (ZZ) strength.
    pub j_ind: f64,
    /// Peak multiplier of the transient entanglement boost.
    pub ent_boost: f64,
    /// Amplitude of the transient entanglement boost; zero disables it.
    pub ent_pulse_amp: f64,
    pub ent_pulse_center: f64,
    pub ent_pulse_width: f64,
    pub adjacency: AdjacencySpec,
}

impl Default for CouplingParams {
    fn default() -> Self {
        Self {
            j_cap: 0.1,
            j_ind: 0.06,
            ent_boost: 20.0,
            ent_pulse_amp: 0.4,
            ent_pulse_center: 1.0,
            ent_pulse_width: 0.5,
            adjacency: AdjacencySpec::Ring,
        }
    }
}

impl CouplingParams {
    /// Couplings switched off entirely, topology kept.
    pub fn uncoupled() -> Self {
        Self { j_cap: 0.0, j_ind: 0.0, ent_pulse_amp: 0.0, ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.j_cap.is_finite() && self.j_ind.is_finite()) {
            return Err(Error::config("coupling strengths must be finite"));
        }
        if self.ent_pulse_amp != 0.0 && self.ent_pulse_width <= 0.0 {
            return Err(Error::config("ent_pulse_width must be positive"));
        }
        Ok(())
    }

    /// Multiplier on the capacitive coupling from the transient boost pulse.
    pub fn boost(&self, t: f64) -> f64 {
        if self.ent_pulse_amp == 0.0 { return 1.0; }
        let x = (t - self.ent_pulse_center) / self.ent_pulse_width;
        1.0 + self.ent_pulse_amp * self.ent_boost * (-0.5 * x * x).exp()
    }
}

/// Hyperparameters of the SPSA control loop and weights of its objective.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub enable: bool,
    pub iterations: usize,
    /// Number of piecewise-constant pulse segments per qubit.
    pub n_pulses: usize,
    pub seed: u64,
    /// Step-gain numerator.
    pub a: f64,
    /// Perturbation-gain numerator.
    pub c: f64,
    /// Step-gain decay exponent.
    pub alpha: f64,
    /// Perturbation-gain decay exponent.
    pub gamma: f64,
    /// Stability offset in the step-gain denominator.
    pub stability: f64,
    pub optimize_pulses: bool,
    pub optimize_gamma_phi: bool,
    pub optimize_noise_strength: bool,
    pub gamma_phi_scale_bounds: (f64, f64),
    pub noise_scale_bounds: (f64, f64),
    /// Pulse amplitudes are clipped to `[-amp_clip, amp_clip]`.
    pub amp_clip: f64,
    /// Score assigned to an evaluation whose simulation went unstable.
    pub failure_penalty: f64,
    pub w_coh: f64,
    pub w_qfi: f64,
    pub w_ent: f64,
    pub w_memloss: f64,
    pub w_memgain: f64,
    pub w_osee: f64,
    pub w_bures_speed: f64,
    pub w_entangled_bures: f64,
    pub w_berry_var: f64,
    pub w_pulse_l2: f64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            enable: false,
            iterations: 12,
            n_pulses: 24,
            seed: 0,
            a: 0.2,
            c: 0.08,
            alpha: 0.602,
            gamma: 0.101,
            stability: 1.0,
            optimize_pulses: true,
            optimize_gamma_phi: true,
            optimize_noise_strength: true,
            gamma_phi_scale_bounds: (0.2, 2.0),
            noise_scale_bounds: (0.0, 2.0),
            amp_clip: 0.8,
            failure_penalty: -1.0e3,
            w_coh: 1.0,
            w_qfi: 0.6,
            w_ent: 0.8,
            w_memloss: 0.6,
            w_memgain: 0.3,
            w_osee: 0.1,
            w_bures_speed: 0.1,
            w_entangled_bures: 0.08,
            w_berry_var: 0.02,
            w_pulse_l2: 0.02,
        }
    }
}

impl DaemonConfig {
    pub fn validate(&self) -> Result<()> {
        if self.n_pulses == 0 {
            return Err(Error::config("n_pulses must be at least 1"));
        }
        if !(self.a > 0.0 && self.c > 0.0) {
            return Err(Error::config("SPSA gains a and c must be positive"));
        }
        if self.alpha < 0.0 || self.gamma < 0.0 || self.stability < 0.0 {
            return Err(Error::config("SPSA exponents and stability must be non-negative"));
        }
        if !(self.amp_clip.is_finite() && self.amp_clip >= 0.0) {
            return Err(Error::config("amp_clip must be non-negative"));
        }
        for (name, (lo, hi)) in [
            ("gamma_phi_scale_bounds", self.gamma_phi_scale_bounds),
            ("noise_scale_bounds", self.noise_scale_bounds),
        ] {
            if !(lo.is_finite() && hi.is_finite() && lo >= 0.0 && lo <= hi) {
                return Err(Error::config(format!(
                    "{} must satisfy 0 <= lo <= hi, got ({}, {})", name, lo, hi)));
            }
        }
        Ok(())
    }

    /// Step gain `a / (k + 1 + A)^α` for iteration `k`.
    pub fn step_gain(&self, k: usize) -> f64 {
        self.a / (k as f64 + 1.0 + self.stability).powf(self.alpha)
    }

    /// Perturbation gain `c / (k + 1)^γ` for iteration `k`.
    pub fn perturbation_gain(&self, k: usize) -> f64 {
        self.c / (k as f64 + 1.0).powf(self.gamma)
    }
}

/// Window and threshold settings for trajectory diagnostics.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Lag, in recorded frames, of the lagged Bures distance.
    pub hotspot_tau_steps: usize,
    /// EMA smoothing factor for hotspot currents.
    pub smooth_alpha: f64,
    /// Peak threshold on normalized hotspot currents.
    pub peak_thr: f64,
    pub peak_min_sep: usize,
    pub max_peaks: usize,
    /// Leakage-risk level counted as a warning.
    pub leak_warn: f64,
    /// Number of Floquet periods for the OTOC; zero disables it.
    pub otoc_periods: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            hotspot_tau_steps: 35,
            smooth_alpha: 0.2,
            peak_thr: 0.6,
            peak_min_sep: 4,
            max_peaks: 12,
            leak_warn: 0.0625,
            otoc_periods: 8,
        }
    }
}

impl DiagnosticsConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0 < self.smooth_alpha && self.smooth_alpha <= 1.0) {
            return Err(Error::config("smooth_alpha must lie in (0, 1]"));
        }
        if self.hotspot_tau_steps == 0 {
            return Err(Error::config("hotspot_tau_steps must be at least 1"));
        }
        Ok(())
    }
}

/// Top-level configuration consumed from outer collaborators.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub n_qubits: usize,
    pub sim: SimulationParams,
    pub bath: BathSchedule,
    pub coupling: CouplingParams,
    pub daemon: DaemonConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            n_qubits: 4,
            sim: SimulationParams::default(),
            bath: BathSchedule::default(),
            coupling: CouplingParams::default(),
            daemon: DaemonConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

/// Largest lattice accepted; the global state has `4^n` entries.
pub const MAX_QUBITS: usize = 8;

impl SimConfig {
    /// Parse and validate a TOML document. Missing fields take their defaults.
    pub fn from_toml_str(src: &str) -> Result<Self> {
        let config: Self = toml::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_qubits == 0 || self.n_qubits > MAX_QUBITS {
            return Err(Error::config(format!(
                "n_qubits must lie in 1..={}, got {}", MAX_QUBITS, self.n_qubits)));
        }
        self.sim.validate()?;
        self.bath.validate()?;
        self.coupling.validate()?;
        self.daemon.validate()?;
        self.diagnostics.validate()?;
        crate::lattice::Adjacency::from_spec(&self.coupling.adjacency, self.n_qubits)?;
        if let InitialState::Bell { a, b } = self.sim.initial {
            if a == b || a >= self.n_qubits || b >= self.n_qubits {
                return Err(Error::config("Bell pair out of range"));
            }
        }
        Ok(())
    }
}

/// Optional outer integrations, resolved once by the caller and passed by
/// value to whatever consumes the core's output.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Write named series to disk.
    pub export: bool,
    /// A renderer is available.
    pub rendering: bool,
    /// A sharing/tunnel integration is available.
    pub sharing: bool,
}

impl Capabilities {
    /// Nothing but the core.
    pub fn core_only() -> Self { Self::default() }

    /// Core plus series export.
    pub fn with_export() -> Self { Self { export: true, ..Self::default() } }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn transmon_frequency_matches_omega0_at_zero_flux() {
        let p = SimulationParams::default();
        assert_relative_eq!(p.omega01_at(0.0), p.omega0, epsilon = 1e-12);
        assert!(p.omega01_at(0.12) < p.omega0);
        assert_relative_eq!(p.ej_max() / p.transmon_ec, 55.125, epsilon = 1e-9);
    }

    #[test]
    fn step_count_rounds_up() {
        let p = SimulationParams { dt: 0.25, tmax: 1.1, ..Default::default() };
        assert_eq!(p.n_steps(), 5);
        let p = SimulationParams { dt: 0.02, tmax: 12.0, ..Default::default() };
        assert_eq!(p.n_steps(), 600);
    }

    #[test]
    fn jitter_is_deterministic_and_small() {
        let p = SimulationParams::default();
        let a = p.jittered(7, 4);
        let b = p.jittered(7, 4);
        assert_eq!(a, b);
        assert_ne!(a, p.jittered(8, 4));
        for q in a.iter() {
            assert!((q.omega0 / p.omega0 - 1.0).abs() <= p.jitter);
            assert!((q.gamma_phi / p.gamma_phi - 1.0).abs() <= p.jitter);
        }
    }

    #[test]
    fn square_wave_duty() {
        let bath = BathSchedule { phase_per_qubit: 0.0, ..Default::default() };
        assert_eq!(bath.wave(0.1, 0), 1.0);
        assert_eq!(bath.wave(0.35 * 4.0 + 0.01, 0), 0.0);
        let f = bath.factors(0.1, 0, 0.01);
        assert_relative_eq!(f.temperature, 0.05, epsilon = 1e-12);
        assert_relative_eq!(f.decay, 1.35, epsilon = 1e-12);
        let off = BathSchedule { enable: false, ..Default::default() };
        assert_eq!(off.wave(0.1, 0), 0.0);
    }

    #[test]
    fn cycle_phase_wraps_per_qubit_offsets() {
        let bath = BathSchedule { global_phase: 0.5, ..Default::default() };
        assert_relative_eq!(bath.cycle_phase(0), 0.5);
        assert_relative_eq!(bath.cycle_phase(1), 0.75);
        assert_relative_eq!(bath.cycle_phase(2), 0.0);
        // qubit 1's cycle, and with it its hot stroke, opens a quarter period in
        assert_eq!(bath.wave(0.2 * bath.period, 1), 0.0);
        assert_eq!(bath.wave(0.3 * bath.period, 1), 1.0);
        assert_eq!(bath.wave(0.3 * bath.period, 0), 0.0);
    }

    #[test]
    fn boost_peaks_at_center() {
        let c = CouplingParams::default();
        assert_relative_eq!(c.boost(c.ent_pulse_center), 9.0);
        assert!(c.boost(10.0) < 1.0 + 1e-6);
        assert_eq!(CouplingParams::uncoupled().boost(1.0), 1.0);
    }

    #[test]
    fn gains_decay() {
        let d = DaemonConfig::default();
        assert!(d.step_gain(0) > d.step_gain(5));
        assert!(d.perturbation_gain(0) > d.perturbation_gain(5));
        assert_relative_eq!(d.perturbation_gain(0), d.c);
    }

    #[test]
    fn toml_round_trip() {
        let src = r#"
            n_qubits = 2

            [sim]
            dt = 0.05
            tmax = 1.0
            noise_target = "drive_phase"
            initial = { kind = "bell", a = 0, b = 1 }

            [bath]
            waveform = "sine"

            [coupling]
            j_cap = 0.2
            adjacency = { kind = "matrix", matrix = [[0, 1], [1, 0]] }

            [daemon]
            iterations = 3
        "#;
        let cfg = SimConfig::from_toml_str(src).unwrap();
        assert_eq!(cfg.n_qubits, 2);
        assert_eq!(cfg.sim.noise_target, NoiseTarget::DrivePhase);
        assert_eq!(cfg.sim.initial, InitialState::Bell { a: 0, b: 1 });
        assert_eq!(cfg.bath.waveform, Waveform::Sine);
        assert_relative_eq!(cfg.coupling.j_cap, 0.2);
        assert_eq!(cfg.daemon.iterations, 3);
        assert_relative_eq!(cfg.sim.gam_relax, 0.055);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(SimConfig::from_toml_str("n_qubits = 0").is_err());
        assert!(SimConfig::from_toml_str("[sim]\ndt = -1.0").is_err());
        let bad_adj = r#"
            n_qubits = 2
            [coupling]
            adjacency = { kind = "matrix", matrix = [[1, 1], [1, 0]] }
        "#;
        assert!(matches!(SimConfig::from_toml_str(bad_adj), Err(Error::Config(_))));
        assert!(matches!(SimConfig::from_toml_str("n_qubits = ["), Err(Error::Toml(_))));
    }

    #[test]
    fn bose_occupation_limits() {
        let p = SimulationParams::default();
        assert_eq!(bose_occupation(p.delta_e(), 0.0), 0.0);
        assert!(bose_occupation(p.delta_e(), 0.01) < 1e-9);
        let hot = bose_occupation(p.delta_e(), 0.05);
        assert!(hot > 1e-3 && hot < 1e-2);
    }
}
