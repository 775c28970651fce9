//! Time stepping of the global density matrix.
//!
//! Each step applies, in order: the coherent propagator for `H(t)`, the
//! per-qubit dissipative channels, re-Hermitization and trace renormalization,
//! and (inside a reset window) a blend toward the reset target. The recurrence
//! is strictly sequential.

use std::{ sync::Arc, time::Instant };
use ndarray as nd;
use num_complex::Complex64 as C64;
use tracing::{ debug, info, warn };
use crate::{
    cancel::CancelToken,
    config::{ BathSchedule, CouplingParams, ResetTarget, SimConfig, SimulationParams },
    dynamics::{
        dissipation::{ DissipationModel, StepChannel },
        hamiltonian::{ self, HamiltonianModel, QubitTerms },
        noise::ColoredNoise,
    },
    error::{ Error, Result },
    hilbert,
    lattice::{ Adjacency, LatticeOps },
    pulse::PulseSchedule,
};

/// One recorded point of a trajectory.
///
/// Bath, transmon and drive fields are evaluated at `time`. The Choi fields
/// describe the channel of the step that produced `rho` (for the initial frame,
/// the channel of the first step).
#[derive(Clone, Debug)]
pub struct Frame {
    pub step: usize,
    pub time: f64,
    pub rho: nd::Array2<C64>,
    /// Bath wave value per qubit.
    pub bath_wave: Vec<f64>,
    /// Energy gap per qubit (J).
    pub gap: Vec<f64>,
    /// Flux-tuned transition frequency per qubit.
    pub omega01: Vec<f64>,
    /// `E_J / E_C` per qubit.
    pub ej_over_ec: Vec<f64>,
    /// Rabi frequency per qubit.
    pub drive_amp: Vec<f64>,
    /// Leakage-risk proxy per qubit.
    pub leak_risk: Vec<f64>,
    /// Choi purity of each qubit's channel for the step.
    pub choi_purity: Vec<f64>,
    /// Minimum Choi eigenvalue of each qubit's channel for the step.
    pub choi_min_eig: Vec<f64>,
    /// Choi purity of the lattice channel.
    pub lattice_choi_purity: f64,
    /// Minimum Choi eigenvalue of the lattice channel.
    pub lattice_choi_min_eig: f64,
}

/// Time-ordered record of a run.
#[derive(Clone, Debug)]
pub struct Trajectory {
    pub n_qubits: usize,
    /// Time between consecutive frames.
    pub frame_dt: f64,
    pub frames: Vec<Frame>,
    /// `false` if the run was cancelled before its final step.
    pub completed: bool,
}

impl Trajectory {
    pub fn len(&self) -> usize { self.frames.len() }

    pub fn is_empty(&self) -> bool { self.frames.is_empty() }

    pub fn times(&self) -> nd::Array1<f64> {
        self.frames.iter().map(|f| f.time).collect()
    }

    pub fn states(&self) -> impl Iterator<Item = &nd::Array2<C64>> + '_ {
        self.frames.iter().map(|f| &f.rho)
    }

    pub fn initial(&self) -> Option<&nd::Array2<C64>> {
        self.frames.first().map(|f| &f.rho)
    }

    pub fn last(&self) -> Option<&nd::Array2<C64>> {
        self.frames.last().map(|f| &f.rho)
    }

    /// Per-qubit frame quantity as an `(n_frames, n_qubits)` array.
    pub fn per_qubit<F>(&self, f: F) -> nd::Array2<f64>
    where F: Fn(&Frame) -> &[f64]
    {
        let mut out = nd::Array2::zeros((self.len(), self.n_qubits));
        for (mut row, frame) in out.outer_iter_mut().zip(self.frames.iter()) {
            row.iter_mut().zip(f(frame)).for_each(|(r, v)| { *r = *v; });
        }
        out
    }

    /// Scalar frame quantity as a series.
    pub fn scalar<F>(&self, f: F) -> nd::Array1<f64>
    where F: Fn(&Frame) -> f64
    {
        self.frames.iter().map(f).collect()
    }
}

/// Drives one simulation run. Immutable; [`Self::run`] may be called any
/// number of times and returns identical trajectories for identical inputs.
#[derive(Clone, Debug)]
pub struct Evolver {
    ops: Arc<LatticeOps>,
    base: SimulationParams,
    qubit_params: Vec<SimulationParams>,
    bath: BathSchedule,
    coupling: CouplingParams,
    pulses: PulseSchedule,
    dephasing_scales: Vec<f64>,
    noise_scales: Vec<f64>,
}

impl Evolver {
    /// Per-qubit parameters are the base parameters jittered with the base
    /// seed, or exact copies when `jitter` is zero.
    pub fn new(
        ops: Arc<LatticeOps>,
        base: SimulationParams,
        bath: BathSchedule,
        coupling: CouplingParams,
        pulses: PulseSchedule,
    ) -> Result<Self>
    {
        base.validate()?;
        bath.validate()?;
        coupling.validate()?;
        let n = ops.n_qubits();
        if pulses.n_qubits() != n {
            return Err(Error::ShapeMismatch {
                what: "pulse amplitudes",
                expected: (n, pulses.n_segments()),
                got: (pulses.n_qubits(), pulses.n_segments()),
            });
        }
        let qubit_params
            = if base.jitter > 0.0 { base.jittered(base.seed, n) }
            else { vec![base.clone(); n] };
        Ok(Self {
            ops,
            base,
            qubit_params,
            bath,
            coupling,
            pulses,
            dephasing_scales: vec![1.0; n],
            noise_scales: vec![1.0; n],
        })
    }

    /// Build from a validated top-level configuration with an all-zero pulse
    /// schedule of `daemon.n_pulses` segments spanning the run.
    pub fn from_config(config: &SimConfig) -> Result<Self> {
        config.validate()?;
        let n = config.n_qubits;
        let adjacency = Adjacency::from_spec(&config.coupling.adjacency, n)?;
        let ops = Arc::new(LatticeOps::new(n, &adjacency)?);
        let pulses = PulseSchedule::zeros(
            n, config.daemon.n_pulses, config.daemon.amp_clip, config.sim.tmax)?;
        Self::new(
            ops,
            config.sim.clone(),
            config.bath.clone(),
            config.coupling.clone(),
            pulses,
        )
    }

    /// Replace the per-qubit parameter sets.
    pub fn with_qubit_params(mut self, params: Vec<SimulationParams>) -> Result<Self> {
        if params.len() != self.ops.n_qubits() {
            return Err(Error::ShapeMismatch {
                what: "per-qubit parameters",
                expected: (self.ops.n_qubits(), 1),
                got: (params.len(), 1),
            });
        }
        params.iter().try_for_each(|p| p.validate())?;
        self.qubit_params = params;
        Ok(self)
    }

    /// Set the per-qubit dephasing-rate and noise-strength multipliers.
    pub fn with_scales(mut self, dephasing: Vec<f64>, noise: Vec<f64>) -> Result<Self> {
        let n = self.ops.n_qubits();
        for (what, v) in [("dephasing scales", &dephasing), ("noise scales", &noise)] {
            if v.len() != n {
                return Err(Error::ShapeMismatch {
                    what, expected: (n, 1), got: (v.len(), 1) });
            }
        }
        self.dephasing_scales = dephasing;
        self.noise_scales = noise;
        Ok(self)
    }

    /// Replace the pulse schedule.
    pub fn with_pulses(mut self, pulses: PulseSchedule) -> Result<Self> {
        if pulses.n_qubits() != self.ops.n_qubits() {
            return Err(Error::ShapeMismatch {
                what: "pulse amplitudes",
                expected: (self.ops.n_qubits(), pulses.n_segments()),
                got: (pulses.n_qubits(), pulses.n_segments()),
            });
        }
        self.pulses = pulses;
        Ok(self)
    }

    pub fn ops(&self) -> &Arc<LatticeOps> { &self.ops }

    pub fn params(&self) -> &SimulationParams { &self.base }

    pub fn qubit_params(&self) -> &[SimulationParams] { &self.qubit_params }

    pub fn bath(&self) -> &BathSchedule { &self.bath }

    pub fn coupling(&self) -> &CouplingParams { &self.coupling }

    pub fn pulses(&self) -> &PulseSchedule { &self.pulses }

    pub fn dephasing_scales(&self) -> &[f64] { &self.dephasing_scales }

    pub fn noise_scales(&self) -> &[f64] { &self.noise_scales }

    /// Noise-free Hamiltonian model over this run's inputs.
    pub fn hamiltonian_model(&self) -> Result<HamiltonianModel<'_>> {
        HamiltonianModel::new(
            &self.ops, &self.qubit_params, &self.bath, &self.coupling, &self.pulses)
    }

    /// Initial global state.
    pub fn initial_state(&self) -> Result<nd::Array2<C64>> {
        self.base.initial.density(self.ops.n_qubits())
    }

    fn in_reset_window(&self, t: f64) -> bool {
        let p = &self.base;
        p.reset_enable
            && (t - p.reset_phase).rem_euclid(p.reset_period) < p.reset_width
    }

    fn frame(
        &self,
        step: usize,
        time: f64,
        rho: &nd::Array2<C64>,
        terms: &[QubitTerms],
        channel: &StepChannel,
    ) -> Result<Frame>
    {
        let choi_purity = channel.choi_purities();
        let choi_min_eig = channel.choi_min_eigenvalues()?;
        let gap: Vec<f64>
            = terms.iter().zip(self.qubit_params.iter())
            .map(|(t, p)| p.delta_e() * t.omega01 / p.omega0.max(f64::EPSILON))
            .collect();
        Ok(Frame {
            step,
            time,
            rho: rho.clone(),
            bath_wave: terms.iter().map(|t| t.bath.wave).collect(),
            gap,
            omega01: terms.iter().map(|t| t.omega01).collect(),
            ej_over_ec: terms.iter().map(|t| t.ej_over_ec).collect(),
            drive_amp: terms.iter().map(|t| t.drive_amp).collect(),
            leak_risk: terms.iter().zip(self.qubit_params.iter())
                .map(|(t, p)| t.leak_risk(p.transmon_ec))
                .collect(),
            lattice_choi_purity: choi_purity.iter().product(),
            lattice_choi_min_eig: choi_min_eig.iter().product(),
            choi_purity,
            choi_min_eig,
        })
    }

    /// Run for `ceil(tmax / dt)` steps, recording every `record_every`-th
    /// state (and always the initial one).
    ///
    /// Cancellation is checked before every step; a cancelled run returns the
    /// frames recorded so far with `completed = false`.
    pub fn run(&self, cancel: &CancelToken) -> Result<Trajectory> {
        let n = self.ops.n_qubits();
        let p = &self.base;
        let dt = p.dt;
        let n_steps = p.n_steps();
        let started = Instant::now();
        info!(n_qubits = n, n_steps, dt, seed = p.seed, "starting run");

        let ham = self.hamiltonian_model()?;
        let diss = DissipationModel::new(&self.qubit_params, &self.dephasing_scales)?;
        let mut noise = ColoredNoise::new(p, &self.noise_scales)?;

        let mut rho = self.initial_state()?;
        let reset_target = match p.reset_target {
            ResetTarget::Ground => hilbert::ground_density(n),
            ResetTarget::Initial => rho.clone(),
            ResetTarget::MaximallyMixed => hilbert::maximally_mixed(n),
        };

        let mut frames: Vec<Frame> = Vec::with_capacity(n_steps / p.record_every + 1);
        let terms0 = ham.all_terms(0.0, noise.drift());
        let channel0 = diss.step_channel(&terms0, dt)?;
        frames.push(self.frame(0, 0.0, &rho, &terms0, &channel0)?);

        let mut completed = true;
        for k in 0..n_steps {
            if cancel.is_cancelled() {
                warn!(step = k, "run cancelled");
                completed = false;
                break;
            }
            let t = k as f64 * dt;
            let noise_k = noise.step(dt);
            let terms = ham.all_terms(t, &noise_k);
            let U = hamiltonian::propagator(ham.assemble(t, &terms), dt)?;
            rho = hamiltonian::conjugate(&U, &rho);
            let channel = diss.step_channel(&terms, dt)?;
            rho = channel.apply(&rho);
            rho = renormalize(rho, k + 1, p.trace_tol)?;

            let t_next = (k + 1) as f64 * dt;
            if self.in_reset_window(t_next) {
                let s = C64::from(p.reset_strength);
                rho = rho * (C64::from(1.0) - s) + &reset_target * s;
            }

            if (k + 1) % p.record_every == 0 || k + 1 == n_steps {
                let terms_next = ham.all_terms(t_next, &noise_k);
                let frame = self.frame(k + 1, t_next, &rho, &terms_next, &channel)?;
                debug!(
                    step = k + 1,
                    t = t_next,
                    purity = hilbert::purity(&rho),
                    choi_purity = frame.lattice_choi_purity,
                    "checkpoint"
                );
                frames.push(frame);
            }
        }
        info!(
            frames = frames.len(),
            completed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "run finished"
        );
        Ok(Trajectory {
            n_qubits: n,
            frame_dt: dt * p.record_every as f64,
            frames,
            completed,
        })
    }
}

/// Check a post-channel state for finiteness and trace drift, then restore
/// Hermiticity and unit trace.
fn renormalize(rho: nd::Array2<C64>, step: usize, trace_tol: f64)
    -> Result<nd::Array2<C64>>
{
    if rho.iter().any(|x| !x.re.is_finite() || !x.im.is_finite()) {
        return Err(Error::NumericalInstability {
            step, reason: "non-finite state entry".into() });
    }
    let tr = hilbert::trace(&rho).re;
    if tr <= 0.0 {
        return Err(Error::NumericalInstability {
            step, reason: format!("non-positive trace {}", tr) });
    }
    if (tr - 1.0).abs() > trace_tol {
        return Err(Error::NumericalInstability {
            step, reason: format!("trace drifted to {}", tr) });
    }
    let rho = hilbert::hermitize(&rho);
    let tr = hilbert::trace(&rho).re;
    Ok(rho / C64::from(tr))
}
