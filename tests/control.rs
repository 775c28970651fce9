//! Integration tests: SPSA control loop and its parameter packing.

use std::sync::Arc;
use ndarray as nd;
use floquet_lattice::{
    cancel::CancelToken,
    config::{ BathSchedule, CouplingParams, DaemonConfig, DiagnosticsConfig, SimulationParams },
    control::{ ControlDaemon, Knobs, ParamVector, Segment },
    dynamics::Evolver,
    lattice::{ Adjacency, LatticeOps },
    pulse::PulseSchedule,
};

const N_PULSES: usize = 6;

fn template() -> Evolver {
    let ops = Arc::new(LatticeOps::new(2, &Adjacency::chain(2)).unwrap());
    let params = SimulationParams { tmax: 0.5, dt: 0.05, ..Default::default() };
    let pulses = PulseSchedule::zeros(2, N_PULSES, 0.8, params.tmax).unwrap();
    Evolver::new(ops, params, BathSchedule::default(), CouplingParams::default(), pulses)
        .unwrap()
}

fn diagnostics() -> DiagnosticsConfig {
    DiagnosticsConfig { hotspot_tau_steps: 3, ..Default::default() }
}

#[test]
fn zero_iterations_return_the_initial_schedule() {
    let config = DaemonConfig { iterations: 0, n_pulses: N_PULSES, ..Default::default() };
    let daemon = ControlDaemon::new(template(), config, diagnostics()).unwrap();
    let result = daemon.run(&CancelToken::new()).unwrap();
    assert!(result.completed);
    assert!(result.trace.is_empty());
    assert_eq!(result.pulses.amps(), &nd::Array2::<f64>::zeros((2, N_PULSES)));
    assert_eq!(result.dephasing_scales, vec![1.0, 1.0]);
    assert_eq!(result.noise_scales, vec![1.0, 1.0]);
    assert_eq!(result.best_score, result.baseline_score);
    let baseline = daemon.evaluate(&daemon.initial_knobs()).unwrap();
    assert_eq!(result.baseline_score, baseline);
}

#[test]
fn best_score_is_monotone_and_parameters_stay_bounded() {
    let config = DaemonConfig {
        iterations: 4,
        n_pulses: N_PULSES,
        a: 2.0,
        c: 0.3,
        ..Default::default()
    };
    let daemon = ControlDaemon::new(template(), config.clone(), diagnostics()).unwrap();
    let result = daemon.run(&CancelToken::new()).unwrap();
    assert_eq!(result.trace.len(), 4);
    let mut best = result.baseline_score;
    for rec in result.trace.iter() {
        assert!(rec.best >= best, "best went down at iteration {}", rec.k);
        best = rec.best;
    }
    assert_eq!(result.best_score, best);
    assert!(result.pulses.amps().iter().all(|a| a.abs() <= config.amp_clip));
    let (lo, hi) = config.gamma_phi_scale_bounds;
    assert!(result.dephasing_scales.iter().all(|s| *s >= lo && *s <= hi));
    let (lo, hi) = config.noise_scale_bounds;
    assert!(result.noise_scales.iter().all(|s| *s >= lo && *s <= hi));
}

#[test]
fn daemon_is_deterministic() {
    let config = DaemonConfig { iterations: 2, n_pulses: N_PULSES, seed: 5, ..Default::default() };
    let daemon = ControlDaemon::new(template(), config, diagnostics()).unwrap();
    let a = daemon.run(&CancelToken::new()).unwrap();
    let b = daemon.run(&CancelToken::new()).unwrap();
    assert_eq!(a.trace, b.trace);
    assert_eq!(a.pulses, b.pulses);
}

#[test]
fn pack_unpack_is_a_bijection_on_bounded_knobs() {
    let config = DaemonConfig::default();
    let knobs = Knobs {
        pulse_amps: nd::Array2::from_shape_fn((3, 4), |(q, s)| 0.1 * q as f64 - 0.05 * s as f64),
        dephasing_scales: vec![0.5, 1.0, 1.5],
        noise_scales: vec![0.0, 0.7, 2.0],
    };
    let packed = ParamVector::pack(&knobs, &config).unwrap();
    assert_eq!(packed.len(), 12 + 3 + 3);
    assert_eq!(packed.unpack(&knobs).unwrap(), knobs);

    let zeros = Knobs {
        pulse_amps: nd::Array2::zeros((3, 4)),
        dephasing_scales: vec![1.0; 3],
        noise_scales: vec![1.0; 3],
    };
    let repacked = ParamVector::pack(&packed.unpack(&zeros).unwrap(), &config).unwrap();
    assert_eq!(repacked, packed);
    assert_eq!(
        packed.slice(Segment::PulseAmplitudes).unwrap().to_vec(),
        knobs.pulse_amps.iter().copied().collect::<Vec<f64>>(),
    );
}
