//! Simultaneous-perturbation stochastic approximation over pulse amplitudes
//! and per-qubit scale factors, with one full simulation plus diagnostics as
//! the objective oracle.

use std::time::Instant;
use ndarray as nd;
use rand::{ rngs::StdRng, Rng, SeedableRng };
use tracing::{ debug, info, warn };
use crate::{
    cancel::CancelToken,
    config::{ DaemonConfig, DiagnosticsConfig },
    control::params::{ Knobs, ParamVector },
    diagnostics::{ DiagnosticsBundle, DiagnosticsEngine },
    dynamics::Evolver,
    error::{ Error, Result },
    pulse::PulseSchedule,
};

fn mean<'a, I>(x: I) -> f64
where I: IntoIterator<Item = &'a f64>
{
    let (sum, count)
        = x.into_iter()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn variance(x: &nd::Array1<f64>) -> f64 {
    let m = mean(x.iter());
    mean(x.mapv(|v| (v - m).powi(2)).iter())
}

/// Weighted multi-objective score of one run; larger is better.
pub fn objective(bundle: &DiagnosticsBundle, pulses: &PulseSchedule, config: &DaemonConfig)
    -> f64
{
    let entangled_bures: nd::Array1<f64> = &bundle.logneg_mean * &bundle.bures_velocity;
    config.w_coh * mean(bundle.coherence.iter())
        + config.w_qfi * mean(bundle.qfi.iter())
        + config.w_ent * mean(bundle.logneg_mean.iter())
        - config.w_memloss * mean(bundle.hotspots.j_sep.iter())
        + config.w_memgain * mean(bundle.hotspots.j_ret.iter())
        + config.w_osee * mean(bundle.osee.iter())
        + config.w_bures_speed * mean(bundle.bures_velocity.iter())
        + config.w_entangled_bures * mean(entangled_bures.iter())
        - config.w_berry_var * variance(&bundle.curvature)
        - config.w_pulse_l2 * pulses.mean_sq()
}

/// One SPSA iteration.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IterationRecord {
    pub k: usize,
    pub a_k: f64,
    pub c_k: f64,
    pub f_plus: f64,
    pub f_minus: f64,
    /// Best score seen up to and including this iteration.
    pub best: f64,
}

/// Outcome of a daemon run.
#[derive(Clone, Debug)]
pub struct DaemonResult {
    pub pulses: PulseSchedule,
    pub dephasing_scales: Vec<f64>,
    pub noise_scales: Vec<f64>,
    pub best_score: f64,
    pub baseline_score: f64,
    pub trace: Vec<IterationRecord>,
    /// `false` if the loop was cancelled before its last iteration.
    pub completed: bool,
}

/// SPSA optimizer around a template [`Evolver`], whose pulse schedule and
/// scale factors are the starting point.
#[derive(Clone, Debug)]
pub struct ControlDaemon {
    template: Evolver,
    config: DaemonConfig,
    engine: DiagnosticsEngine,
}

impl ControlDaemon {
    /// The template's pulse schedule must have `config.n_pulses` segments.
    pub fn new(template: Evolver, config: DaemonConfig, diagnostics: DiagnosticsConfig)
        -> Result<Self>
    {
        config.validate()?;
        let pulses = template.pulses();
        if pulses.n_segments() != config.n_pulses {
            return Err(Error::ShapeMismatch {
                what: "initial pulse schedule",
                expected: (pulses.n_qubits(), config.n_pulses),
                got: (pulses.n_qubits(), pulses.n_segments()),
            });
        }
        let engine = DiagnosticsEngine::new(diagnostics)?.with_otoc(false);
        Ok(Self { template, config, engine })
    }

    pub fn config(&self) -> &DaemonConfig { &self.config }

    /// Knob values of the template.
    pub fn initial_knobs(&self) -> Knobs {
        Knobs {
            pulse_amps: self.template.pulses().amps().clone(),
            dephasing_scales: self.template.dephasing_scales().to_vec(),
            noise_scales: self.template.noise_scales().to_vec(),
        }
    }

    fn configure(&self, knobs: &Knobs) -> Result<Evolver> {
        let n = knobs.n_qubits();
        let pulses = PulseSchedule::new(
            knobs.pulse_amps.clone(),
            n,
            self.config.n_pulses,
            self.config.amp_clip,
            self.template.pulses().duration(),
        )?;
        self.template.clone()
            .with_pulses(pulses)?
            .with_scales(knobs.dephasing_scales.clone(), knobs.noise_scales.clone())
    }

    /// One full run plus diagnostics, scored. Errors propagate.
    pub fn evaluate(&self, knobs: &Knobs) -> Result<f64> {
        let evolver = self.configure(knobs)?;
        let traj = evolver.run(&CancelToken::new())?;
        let bundle = self.engine.analyze(&evolver, &traj)?;
        Ok(objective(&bundle, evolver.pulses(), &self.config))
    }

    /// Like [`Self::evaluate`], but a run that went numerically bad scores
    /// `failure_penalty` instead of failing.
    pub fn score(&self, knobs: &Knobs) -> Result<f64> {
        match self.evaluate(knobs) {
            Ok(f) if f.is_finite() => Ok(f),
            Ok(f) => {
                warn!(score = f, "non-finite objective; scoring as failure");
                Ok(self.config.failure_penalty)
            },
            Err(e) if e.is_instability() || matches!(e, Error::Linalg(_)) => {
                warn!(error = %e, "evaluation failed; scoring as failure");
                Ok(self.config.failure_penalty)
            },
            Err(e) => Err(e),
        }
    }

    /// Run the optimization loop.
    ///
    /// The template is evaluated once as the baseline. Each iteration
    /// evaluates the two perturbed parameter vectors in parallel, ascends
    /// along the one-sample gradient estimate, and projects back onto the
    /// bounds. The best evaluated point is returned, which is the template
    /// itself if nothing beat the baseline. Cancellation is checked before
    /// every iteration.
    pub fn run(&self, cancel: &CancelToken) -> Result<DaemonResult> {
        let started = Instant::now();
        let base = self.initial_knobs();
        let mut theta = ParamVector::pack(&base, &self.config)?;
        let baseline = self.score(&base)?;
        info!(
            params = theta.len(),
            iterations = self.config.iterations,
            baseline,
            "daemon baseline"
        );

        let mut best_knobs = base.clone();
        let mut best = baseline;
        let mut trace: Vec<IterationRecord> = Vec::with_capacity(self.config.iterations);
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut completed = true;
        if theta.is_empty() {
            warn!("no parameter groups enabled; nothing to optimize");
        }
        for k in 0..self.config.iterations {
            if theta.is_empty() { break; }
            if cancel.is_cancelled() {
                warn!(iteration = k, "daemon cancelled");
                completed = false;
                break;
            }
            let a_k = self.config.step_gain(k);
            let c_k = self.config.perturbation_gain(k);
            let delta: nd::Array1<f64>
                = (0..theta.len())
                .map(|_| if rng.gen::<bool>() { 1.0 } else { -1.0 })
                .collect();
            let plus = theta.shifted(&delta, c_k);
            let minus = theta.shifted(&delta, -c_k);
            let knobs_plus = plus.unpack(&base)?;
            let knobs_minus = minus.unpack(&base)?;
            let (f_plus, f_minus)
                = rayon::join(|| self.score(&knobs_plus), || self.score(&knobs_minus));
            let (f_plus, f_minus) = (f_plus?, f_minus?);
            debug!(iteration = k, f_plus, f_minus, a_k, c_k, "spsa evaluations");

            if f_plus > best {
                best = f_plus;
                best_knobs = knobs_plus;
            }
            if f_minus > best {
                best = f_minus;
                best_knobs = knobs_minus;
            }
            let g = (f_plus - f_minus) / (2.0 * c_k);
            theta = theta.shifted(&delta, a_k * g);
            trace.push(IterationRecord { k, a_k, c_k, f_plus, f_minus, best });
            info!(iteration = k, best, "spsa iteration");
        }

        let pulses = PulseSchedule::new(
            best_knobs.pulse_amps,
            base.n_qubits(),
            self.config.n_pulses,
            self.config.amp_clip,
            self.template.pulses().duration(),
        )?;
        info!(
            best,
            baseline,
            completed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "daemon finished"
        );
        Ok(DaemonResult {
            pulses,
            dephasing_scales: best_knobs.dephasing_scales,
            noise_scales: best_knobs.noise_scales,
            best_score: best,
            baseline_score: baseline,
            trace,
            completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::{
        config::{ BathSchedule, CouplingParams, SimulationParams },
        lattice::{ Adjacency, LatticeOps },
    };

    fn template(n_pulses: usize) -> Evolver {
        let ops = Arc::new(LatticeOps::new(2, &Adjacency::chain(2)).unwrap());
        let params = SimulationParams { tmax: 0.4, dt: 0.05, ..Default::default() };
        let pulses = PulseSchedule::zeros(2, n_pulses, 0.8, 0.4).unwrap();
        Evolver::new(
            ops, params, BathSchedule::default(), CouplingParams::default(), pulses)
            .unwrap()
    }

    fn diagnostics() -> DiagnosticsConfig {
        DiagnosticsConfig { hotspot_tau_steps: 2, ..Default::default() }
    }

    #[test]
    fn segment_count_must_match() {
        let config = DaemonConfig { n_pulses: 4, ..Default::default() };
        assert!(matches!(
            ControlDaemon::new(template(3), config, diagnostics()),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn best_score_never_decreases() {
        let config = DaemonConfig { n_pulses: 4, iterations: 3, ..Default::default() };
        let daemon = ControlDaemon::new(template(4), config, diagnostics()).unwrap();
        let result = daemon.run(&CancelToken::new()).unwrap();
        assert!(result.completed);
        assert_eq!(result.trace.len(), 3);
        let mut prev = result.baseline_score;
        for rec in result.trace.iter() {
            assert!(rec.best >= prev);
            assert!(rec.best >= rec.f_plus.max(rec.f_minus));
            prev = rec.best;
        }
        assert_eq!(result.best_score, prev);
        assert!(result.pulses.amps().iter().all(|a| a.abs() <= 0.8));
    }

    #[test]
    fn cancelled_daemon_returns_baseline() {
        let config = DaemonConfig { n_pulses: 4, iterations: 5, ..Default::default() };
        let daemon = ControlDaemon::new(template(4), config, diagnostics()).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = daemon.run(&cancel).unwrap();
        assert!(!result.completed);
        assert!(result.trace.is_empty());
        assert_eq!(result.best_score, result.baseline_score);
    }

    #[test]
    fn cancelling_mid_optimization_keeps_finished_iterations() {
        use std::{ thread, time::Duration };
        let config = DaemonConfig { n_pulses: 4, iterations: 100_000, ..Default::default() };
        let daemon = ControlDaemon::new(template(4), config, diagnostics()).unwrap();
        let cancel = CancelToken::new();
        let result = thread::scope(|s| {
            let remote = cancel.clone();
            s.spawn(move || {
                thread::sleep(Duration::from_millis(200));
                remote.cancel();
            });
            daemon.run(&cancel).unwrap()
        });
        assert!(!result.completed);
        assert!(!result.trace.is_empty());
        assert!(result.trace.len() < 100_000);
        for (k, rec) in result.trace.iter().enumerate() {
            assert_eq!(rec.k, k);
        }
        assert!(result.best_score >= result.baseline_score);
        assert_eq!(result.best_score, result.trace.last().unwrap().best);
    }
}
