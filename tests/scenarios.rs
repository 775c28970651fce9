//! Integration tests: closed-form scenarios and cooperative cancellation.

use std::{ sync::Arc, thread, time::Duration };
use approx::assert_abs_diff_eq;
use floquet_lattice::{
    cancel::CancelToken,
    config::{ BathSchedule, CouplingParams, DiagnosticsConfig, InitialState, SimulationParams },
    diagnostics::{ entanglement, geometry, DiagnosticsEngine },
    dynamics::Evolver,
    hilbert,
    lattice::{ Adjacency, LatticeOps },
    pulse::PulseSchedule,
};

/// No dissipation, no reset, no noise, no jitter.
fn closed_params(tmax: f64, initial: InitialState) -> SimulationParams {
    SimulationParams {
        tmax,
        dt: 0.01,
        initial,
        gam_relax: 0.0,
        gamma_phi: 0.0,
        noise_enable: false,
        drift_strength: 0.0,
        reset_enable: false,
        jitter: 0.0,
        ..Default::default()
    }
}

fn evolver(n: usize, params: SimulationParams, bath: BathSchedule) -> Evolver {
    let ops = Arc::new(LatticeOps::new(n, &Adjacency::chain(n)).unwrap());
    let pulses = PulseSchedule::zeros(n, 4, 0.8, params.tmax).unwrap();
    Evolver::new(ops, params, bath, CouplingParams::uncoupled(), pulses).unwrap()
}

#[test]
fn single_qubit_detuning_is_unitary() {
    let params = SimulationParams {
        omega_drive: 0.0,
        ..closed_params(3.0, InitialState::Qubit { alpha: (0.8, 0.0), beta: (0.0, 0.6) })
    };
    let bath = BathSchedule { enable: false, ..Default::default() };
    let traj = evolver(1, params, bath).run(&CancelToken::new()).unwrap();
    assert_eq!(traj.len(), 301);
    let r0 = geometry::bloch_vector(traj.initial().unwrap());
    let len0 = (r0[0] * r0[0] + r0[1] * r0[1] + r0[2] * r0[2]).sqrt();
    assert_abs_diff_eq!(len0, 1.0, epsilon = 1e-12);
    for frame in traj.frames.iter() {
        assert_abs_diff_eq!(hilbert::purity(&frame.rho), 1.0, epsilon = 1e-9);
        let r = geometry::bloch_vector(&frame.rho);
        let len = (r[0] * r[0] + r[1] * r[1] + r[2] * r[2]).sqrt();
        assert_abs_diff_eq!(len, len0, epsilon = 1e-9);
        // a pure Z rotation leaves the population untouched
        assert_abs_diff_eq!(r[2], r0[2], epsilon = 1e-9);
    }
    let rT = geometry::bloch_vector(traj.last().unwrap());
    assert!((rT[0] - r0[0]).abs() > 1e-3 || (rT[1] - r0[1]).abs() > 1e-3);
}

#[test]
fn uncoupled_bell_pair_keeps_its_entanglement() {
    let mut params = closed_params(2.0, InitialState::Bell { a: 0, b: 1 });
    params.noise_enable = true;
    params.drift_strength = 0.08;
    let traj = evolver(2, params, BathSchedule::default())
        .run(&CancelToken::new())
        .unwrap();
    for frame in traj.frames.iter() {
        let ln = entanglement::log_negativity_pair(&frame.rho, 0, 1, 2).unwrap();
        assert_abs_diff_eq!(ln, 1.0, epsilon = 1e-8);
    }
}

#[test]
fn diagnostics_of_closed_bell_pair() {
    let params = closed_params(1.0, InitialState::Bell { a: 0, b: 1 });
    let ev = evolver(2, params, BathSchedule::default());
    let traj = ev.run(&CancelToken::new()).unwrap();
    let engine = DiagnosticsEngine::new(DiagnosticsConfig {
        hotspot_tau_steps: 10, otoc_periods: 2, ..Default::default() })
        .unwrap();
    let bundle = engine.analyze(&ev, &traj).unwrap();
    for k in 0..traj.len() {
        assert_abs_diff_eq!(bundle.logneg_mean[k], 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(bundle.mi_half[k], 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(bundle.purity[k], 1.0, epsilon = 1e-9);
    }
    assert!(bundle.ent_cycle.iter().all(|e| (e - 1.0).abs() < 1e-8));
    // zero dissipation: every per-qubit channel is the identity
    assert!(bundle.choi_purity.iter().all(|p| (p - 1.0).abs() < 1e-12));
}

#[test]
fn cancelled_run_returns_partial_trajectory() {
    let params = SimulationParams { tmax: 1.0, dt: 0.05, ..Default::default() };
    let ev = evolver(2, params, BathSchedule::default());
    let cancel = CancelToken::new();
    cancel.cancel();
    let traj = ev.run(&cancel).unwrap();
    assert!(!traj.completed);
    assert_eq!(traj.len(), 1);
    assert_eq!(traj.frames[0].step, 0);

    let engine = DiagnosticsEngine::new(DiagnosticsConfig::default())
        .unwrap()
        .with_otoc(false);
    let bundle = engine.analyze(&ev, &traj).unwrap();
    assert_eq!(bundle.times.len(), 1);
}

#[test]
fn cancellation_mid_run_keeps_completed_frames() {
    let params = SimulationParams {
        tmax: 2000.0, dt: 0.01, record_every: 10, ..Default::default() };
    let ev = evolver(2, params, BathSchedule::default());
    let full = ev.params().n_steps() / 10 + 1;
    let cancel = CancelToken::new();
    let traj = thread::scope(|s| {
        let remote = cancel.clone();
        s.spawn(move || {
            thread::sleep(Duration::from_millis(100));
            remote.cancel();
        });
        ev.run(&cancel).unwrap()
    });
    assert!(!traj.completed);
    assert!(traj.len() > 1 && traj.len() < full, "kept {} of {} frames", traj.len(), full);
    for (k, frame) in traj.frames.iter().enumerate() {
        assert_eq!(frame.step, 10 * k);
        assert_abs_diff_eq!(hilbert::trace(&frame.rho).re, 1.0, epsilon = 1e-10);
    }
}
