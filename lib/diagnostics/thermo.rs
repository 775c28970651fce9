//! Thermodynamic proxies: virtual temperature, Otto-cycle heat and work
//! bookkeeping, heat currents, and transmon leakage indicators.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    config::BOLTZMANN,
    diagnostics::geometry,
};

/// Excited-state population `⟨1|ρ|1⟩` of a single-qubit state.
pub fn excited_population(rho2: &nd::Array2<C64>) -> f64 { rho2[[1, 1]].re }

/// Temperature at which a two-level system with gap `delta_e` (J) has
/// excited population `pe`: `ΔE / (k_B ln((1 - pe) / pe))`.
///
/// Zero for `pe <= 0`, infinite at `pe = 1/2`, and negative for population
/// inversion.
pub fn virtual_temperature(pe: f64, delta_e: f64) -> f64 {
    if pe <= 0.0 || delta_e <= 0.0 { return 0.0; }
    let pe = pe.min(1.0 - 1e-15);
    let ratio = ((1.0 - pe) / pe).ln();
    if ratio == 0.0 { f64::INFINITY } else { delta_e / (BOLTZMANN * ratio) }
}

/// Per-cycle Otto bookkeeping for each qubit and for the lattice.
///
/// Heat `dQ = ΔE dp_e` is credited to the hot stroke when the interval starts
/// with the bath wave at or above one half, otherwise to the cold stroke.
/// Work output is `W = Q_hot + Q_cold`; efficiency is `W / Q_hot` where
/// `Q_hot > 0` and zero elsewhere.
#[derive(Clone, Debug, PartialEq)]
pub struct OttoLedger {
    /// Start time of each bath cycle on the lattice clock (zero phase).
    pub cycle_times: nd::Array1<f64>,
    /// `(cycles, qubits)`.
    pub q_hot: nd::Array2<f64>,
    pub q_cold: nd::Array2<f64>,
    pub work: nd::Array2<f64>,
    pub efficiency: nd::Array2<f64>,
    /// Lattice sums per cycle.
    pub q_hot_lattice: nd::Array1<f64>,
    pub q_cold_lattice: nd::Array1<f64>,
    pub work_lattice: nd::Array1<f64>,
    pub efficiency_lattice: nd::Array1<f64>,
}

fn efficiency(work: f64, q_hot: f64) -> f64 {
    if q_hot > 0.0 { work / q_hot } else { 0.0 }
}

/// Cycle index of each time for a bath of period `period` whose cycles begin
/// at `t = (c - phase) period`, with `phase` in cycles.
pub fn cycle_index(times: &nd::Array1<f64>, period: f64, phase: f64) -> Vec<usize> {
    times.iter()
        .map(|t| (t / period + phase).floor().max(0.0) as usize)
        .collect()
}

/// Build the Otto ledger from `(frames, qubits)` series of excited
/// population, gap (J), and bath wave.
///
/// Each qubit is booked on its own clock: `phases[q]` is its schedule offset
/// in cycles (see [`BathSchedule::cycle_phase`][crate::config::BathSchedule::cycle_phase]),
/// so cycle `c` of qubit `q` spans `[(c - phases[q]) period, (c + 1 - phases[q]) period)`.
pub fn otto_ledger(
    times: &nd::Array1<f64>,
    pe: &nd::Array2<f64>,
    gap: &nd::Array2<f64>,
    wave: &nd::Array2<f64>,
    period: f64,
    phases: &[f64],
) -> OttoLedger
{
    let (nt, nq) = pe.dim();
    let cycles: Vec<Vec<usize>>
        = (0..nq)
        .map(|q| cycle_index(times, period, phases.get(q).copied().unwrap_or(0.0)))
        .collect();
    let n_cycles
        = cycles.iter()
        .filter_map(|c| c.last())
        .max()
        .map(|c| c + 1)
        .unwrap_or(0);
    let mut q_hot = nd::Array2::zeros((n_cycles, nq));
    let mut q_cold = nd::Array2::zeros((n_cycles, nq));
    for k in 1..nt {
        for q in 0..nq {
            let c = cycles[q][k - 1];
            let de = 0.5 * (gap[[k, q]] + gap[[k - 1, q]]);
            let dq = de * (pe[[k, q]] - pe[[k - 1, q]]);
            if wave[[k - 1, q]] >= 0.5 {
                q_hot[[c, q]] += dq;
            } else {
                q_cold[[c, q]] += dq;
            }
        }
    }
    let work = &q_hot + &q_cold;
    let efficiency_q = nd::Zip::from(&work).and(&q_hot)
        .map_collect(|w, h| efficiency(*w, *h));
    let q_hot_lattice = q_hot.sum_axis(nd::Axis(1));
    let q_cold_lattice = q_cold.sum_axis(nd::Axis(1));
    let work_lattice = work.sum_axis(nd::Axis(1));
    let efficiency_lattice = nd::Zip::from(&work_lattice).and(&q_hot_lattice)
        .map_collect(|w, h| efficiency(*w, *h));
    OttoLedger {
        cycle_times: (0..n_cycles).map(|c| c as f64 * period).collect(),
        q_hot,
        q_cold,
        work,
        efficiency: efficiency_q,
        q_hot_lattice,
        q_cold_lattice,
        work_lattice,
        efficiency_lattice,
    }
}

/// Heat current `J_q = ΔE_q dp_e/dt` per qubit, `(frames, qubits)`.
pub fn heat_current(pe: &nd::Array2<f64>, gap: &nd::Array2<f64>, dt: f64)
    -> nd::Array2<f64>
{
    let mut out = nd::Array2::zeros(pe.dim());
    let iter
        = out.axis_iter_mut(nd::Axis(1))
        .zip(pe.axis_iter(nd::Axis(1)).zip(gap.axis_iter(nd::Axis(1))));
    for (mut col, (p, g)) in iter {
        let dp = geometry::gradient(&p.to_owned(), dt);
        col.assign(&(&dp * &g));
    }
    out
}

/// Fraction of frames at which each qubit's leakage risk exceeds `warn`.
pub fn leak_fraction(leak: &nd::Array2<f64>, warn: f64) -> nd::Array1<f64> {
    let nt = leak.nrows().max(1) as f64;
    leak.axis_iter(nd::Axis(1))
        .map(|col| col.iter().filter(|x| **x > warn).count() as f64 / nt)
        .collect()
}
