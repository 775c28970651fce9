//! Trajectory-level diagnostics, collected into a single bundle of named
//! series over the trajectory's time grid.

use std::time::Instant;
use indexmap::IndexMap;
use ndarray as nd;
use num_complex::Complex64 as C64;
use rayon::prelude::*;
use tracing::debug;
use crate::{
    config::DiagnosticsConfig,
    diagnostics::{
        entanglement,
        geometry::{ self, HotspotCurrents, HotspotSettings, Vec3 },
        scrambling::{ self, OtocSeries },
        thermo::{ self, OttoLedger },
    },
    dynamics::{ Evolver, Trajectory },
    error::{ Error, Result },
    hilbert,
};

/// Single-frame quantities computed independently for every recorded state.
#[derive(Clone, Debug)]
struct FrameMetrics {
    bloch: Vec<Vec3>,
    purity_qubit: Vec<f64>,
    purity: f64,
    qfi: Vec<f64>,
    logneg: Vec<f64>,
    concurrence: Vec<f64>,
    mutual_info: Vec<f64>,
    mi_half: f64,
    spectrum_half: Vec<f64>,
    osee: f64,
    fidelity_initial: f64,
}

fn frame_metrics(
    rho: &nd::Array2<C64>,
    rho0: &nd::Array2<C64>,
    n: usize,
    pairs: &[(usize, usize)],
) -> Result<FrameMetrics>
{
    let G = hilbert::sigma_z() * C64::from(0.5);
    let mut bloch: Vec<Vec3> = Vec::with_capacity(n);
    let mut purity_qubit: Vec<f64> = Vec::with_capacity(n);
    let mut qfi: Vec<f64> = Vec::with_capacity(n);
    for q in 0..n {
        let rho_q = entanglement::reduced_qubit(rho, q, n)?;
        bloch.push(geometry::bloch_vector(&rho_q));
        purity_qubit.push(hilbert::purity(&rho_q));
        qfi.push(geometry::qfi_qubit(&rho_q, &G));
    }
    let mut logneg: Vec<f64> = Vec::with_capacity(pairs.len());
    let mut concurrence: Vec<f64> = Vec::with_capacity(pairs.len());
    let mut mutual_info: Vec<f64> = Vec::with_capacity(pairs.len());
    for &(a, b) in pairs.iter() {
        let rho_ab = entanglement::partial_trace(rho, &[a, b], n)?;
        logneg.push(entanglement::log_negativity(&rho_ab, &[1], 2)?);
        concurrence.push(entanglement::concurrence(&rho_ab)?);
        mutual_info.push(entanglement::mutual_information(&rho_ab, &[0], &[1], 2)?);
    }
    let (left, right) = entanglement::half_cut(n);
    let (mi_half, osee)
        = if n >= 2 {
            (
                entanglement::mutual_information(rho, &left, &right, n)?,
                entanglement::osee(rho, left.len(), n)?,
            )
        } else {
            (0.0, 0.0)
        };
    Ok(FrameMetrics {
        bloch,
        purity_qubit,
        purity: hilbert::purity(rho),
        qfi,
        logneg,
        concurrence,
        mutual_info,
        mi_half,
        spectrum_half: entanglement::entanglement_spectrum(rho, &left, n)?.to_vec(),
        osee,
        fidelity_initial: geometry::fidelity(rho, rho0)?,
    })
}

fn stack_rows<F>(metrics: &[FrameMetrics], width: usize, f: F) -> nd::Array2<f64>
where F: Fn(&FrameMetrics) -> &[f64]
{
    nd::Array2::from_shape_fn((metrics.len(), width), |(k, j)| f(&metrics[k])[j])
}

/// Maximum, its index, and the trapezoidal area of a uniformly sampled
/// series.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SeriesStats {
    pub max: f64,
    pub argmax: usize,
    pub area: f64,
}

impl SeriesStats {
    /// `None` for an empty series.
    pub fn of(y: &nd::Array1<f64>, dt: f64) -> Option<Self> {
        let (argmax, max)
            = y.iter().copied().enumerate()
            .fold(None, |acc: Option<(usize, f64)>, (k, v)| match acc {
                Some((_, m)) if m >= v => acc,
                _ => Some((k, v)),
            })?;
        let area: f64
            = y.windows(2).into_iter()
            .map(|w| 0.5 * (w[0] + w[1]) * dt)
            .sum();
        Some(Self { max, argmax, area })
    }
}

/// Every trajectory-level diagnostic of one run.
///
/// Per-frame series have the trajectory's frame count as their leading axis;
/// per-cycle series are indexed by bath cycle.
#[derive(Clone, Debug)]
pub struct DiagnosticsBundle {
    pub n_qubits: usize,
    pub frame_dt: f64,
    pub times: nd::Array1<f64>,
    /// `(frames, qubits, 3)`.
    pub bloch: nd::Array3<f64>,
    pub purity: nd::Array1<f64>,
    pub purity_qubit: nd::Array2<f64>,
    /// In-plane Bloch length `√(r_x² + r_y²)`.
    pub coherence: nd::Array2<f64>,
    pub excited_pop: nd::Array2<f64>,
    /// QFI for the generator `σ_z / 2`.
    pub qfi: nd::Array2<f64>,
    pub pairs: Vec<(usize, usize)>,
    /// `(frames, pairs)`, columns ordered as `pairs`.
    pub log_negativity: nd::Array2<f64>,
    pub concurrence: nd::Array2<f64>,
    /// Pair mutual information (bits), `(frames, pairs)`.
    pub mutual_information: nd::Array2<f64>,
    /// Mean pair log-negativity.
    pub logneg_mean: nd::Array1<f64>,
    pub mi_half: nd::Array1<f64>,
    /// Entanglement spectrum of the first half of the lattice.
    pub spectrum_half: nd::Array2<f64>,
    pub osee: nd::Array1<f64>,
    /// Uhlmann fidelity with the initial state.
    pub fidelity_initial: nd::Array1<f64>,
    pub bures_velocity: nd::Array1<f64>,
    pub bures_velocity_qubit: nd::Array2<f64>,
    pub hotspots: HotspotCurrents,
    pub hotspots_qubit: Vec<HotspotCurrents>,
    pub berry_rate: nd::Array1<f64>,
    pub qgt: nd::Array1<f64>,
    pub curvature: nd::Array1<f64>,
    pub choi_purity: nd::Array2<f64>,
    pub choi_min_eig: nd::Array2<f64>,
    pub choi_purity_lattice: nd::Array1<f64>,
    pub choi_min_eig_lattice: nd::Array1<f64>,
    pub virtual_temperature: nd::Array2<f64>,
    pub otto: OttoLedger,
    pub heat_current: nd::Array2<f64>,
    pub heat_current_lattice: nd::Array1<f64>,
    pub omega01: nd::Array2<f64>,
    /// `-E_C` per qubit.
    pub anharmonicity: nd::Array1<f64>,
    pub ej_over_ec: nd::Array2<f64>,
    pub leak_risk: nd::Array2<f64>,
    pub leak_fraction: nd::Array1<f64>,
    /// Mean pair log-negativity averaged over each bath cycle.
    pub ent_cycle: nd::Array1<f64>,
    pub cycle_times: nd::Array1<f64>,
    pub otoc: Option<OtocSeries>,
}

fn stack_hotspots<F>(hs: &[HotspotCurrents], nt: usize, f: F) -> nd::Array2<f64>
where F: Fn(&HotspotCurrents) -> &nd::Array1<f64>
{
    nd::Array2::from_shape_fn((nt, hs.len()), |(k, q)| f(&hs[q])[k])
}

impl DiagnosticsBundle {
    /// Every series under a stable name, in a fixed order.
    pub fn named_series(&self) -> IndexMap<String, nd::ArrayD<f64>> {
        let nt = self.times.len();
        let mut out: IndexMap<String, nd::ArrayD<f64>> = IndexMap::new();
        let mut put = |name: &str, arr: nd::ArrayD<f64>| {
            out.insert(name.to_string(), arr);
        };
        put("t", self.times.clone().into_dyn());
        put("bloch", self.bloch.clone().into_dyn());
        put("purity", self.purity.clone().into_dyn());
        put("purity_qubit", self.purity_qubit.clone().into_dyn());
        put("coherence", self.coherence.clone().into_dyn());
        put("excited_pop", self.excited_pop.clone().into_dyn());
        put("qfi", self.qfi.clone().into_dyn());
        let pair_index = nd::Array2::from_shape_fn(
            (self.pairs.len(), 2),
            |(p, i)| if i == 0 { self.pairs[p].0 as f64 } else { self.pairs[p].1 as f64 },
        );
        put("pair_index", pair_index.into_dyn());
        put("logneg", self.log_negativity.clone().into_dyn());
        put("concurrence", self.concurrence.clone().into_dyn());
        put("mutual_info", self.mutual_information.clone().into_dyn());
        put("logneg_mean", self.logneg_mean.clone().into_dyn());
        put("mi_half", self.mi_half.clone().into_dyn());
        put("spectrum_half", self.spectrum_half.clone().into_dyn());
        put("osee", self.osee.clone().into_dyn());
        put("fidelity_initial", self.fidelity_initial.clone().into_dyn());
        put("bures_velocity", self.bures_velocity.clone().into_dyn());
        put("bures_velocity_qubit", self.bures_velocity_qubit.clone().into_dyn());
        put("d_lag", self.hotspots.d_lag.clone().into_dyn());
        put("d_lag_rate", self.hotspots.d_lag_rate.clone().into_dyn());
        put("j_sep", self.hotspots.j_sep.clone().into_dyn());
        put("j_ret", self.hotspots.j_ret.clone().into_dyn());
        put("j_sep_norm", self.hotspots.sep_norm.clone().into_dyn());
        put("j_ret_norm", self.hotspots.ret_norm.clone().into_dyn());
        let peak_times = |idx: &[usize]| -> nd::ArrayD<f64> {
            idx.iter().map(|&k| self.times[k]).collect::<nd::Array1<f64>>().into_dyn()
        };
        put("sep_peak_times", peak_times(&self.hotspots.sep_peaks));
        put("ret_peak_times", peak_times(&self.hotspots.ret_peaks));
        let hq = &self.hotspots_qubit;
        put("j_sep_qubit", stack_hotspots(hq, nt, |h| &h.j_sep).into_dyn());
        put("j_ret_qubit", stack_hotspots(hq, nt, |h| &h.j_ret).into_dyn());
        put("j_sep_qubit_norm", stack_hotspots(hq, nt, |h| &h.sep_norm).into_dyn());
        put("j_ret_qubit_norm", stack_hotspots(hq, nt, |h| &h.ret_norm).into_dyn());
        put("berry_rate", self.berry_rate.clone().into_dyn());
        put("qgt", self.qgt.clone().into_dyn());
        put("curvature", self.curvature.clone().into_dyn());
        put("choi_purity", self.choi_purity.clone().into_dyn());
        put("choi_min_eig", self.choi_min_eig.clone().into_dyn());
        put("choi_purity_lattice", self.choi_purity_lattice.clone().into_dyn());
        put("choi_min_eig_lattice", self.choi_min_eig_lattice.clone().into_dyn());
        put("virtual_temperature", self.virtual_temperature.clone().into_dyn());
        put("otto_cycle_times", self.otto.cycle_times.clone().into_dyn());
        put("otto_q_hot", self.otto.q_hot.clone().into_dyn());
        put("otto_q_cold", self.otto.q_cold.clone().into_dyn());
        put("otto_work", self.otto.work.clone().into_dyn());
        put("otto_efficiency", self.otto.efficiency.clone().into_dyn());
        put("otto_q_hot_lattice", self.otto.q_hot_lattice.clone().into_dyn());
        put("otto_q_cold_lattice", self.otto.q_cold_lattice.clone().into_dyn());
        put("otto_work_lattice", self.otto.work_lattice.clone().into_dyn());
        put("otto_efficiency_lattice", self.otto.efficiency_lattice.clone().into_dyn());
        put("heat_current", self.heat_current.clone().into_dyn());
        put("heat_current_lattice", self.heat_current_lattice.clone().into_dyn());
        put("omega01", self.omega01.clone().into_dyn());
        put("anharmonicity", self.anharmonicity.clone().into_dyn());
        put("ej_over_ec", self.ej_over_ec.clone().into_dyn());
        put("leak_risk", self.leak_risk.clone().into_dyn());
        put("leak_fraction", self.leak_fraction.clone().into_dyn());
        put("ent_cycle", self.ent_cycle.clone().into_dyn());
        put("cycle_times", self.cycle_times.clone().into_dyn());
        if let Some(otoc) = &self.otoc {
            put("otoc_periods", otoc.periods.clone().into_dyn());
            put("otoc", otoc.otoc.clone().into_dyn());
            put("scrambling", otoc.scrambling.clone().into_dyn());
        }
        out
    }

    /// Statistics of a one-dimensional per-frame series by name.
    pub fn stats(&self, name: &str) -> Option<SeriesStats> {
        let series = self.named_series().swap_remove(name)?;
        if series.ndim() != 1 || series.len() != self.times.len() { return None; }
        let y = series.into_dimensionality::<nd::Ix1>().ok()?;
        SeriesStats::of(&y, self.frame_dt)
    }
}

/// Mean of `y` over each bath cycle; cycles without frames read zero.
fn cycle_average(y: &nd::Array1<f64>, cycles: &[usize], n_cycles: usize) -> nd::Array1<f64> {
    let mut sum = nd::Array1::<f64>::zeros(n_cycles);
    let mut count = vec![0usize; n_cycles];
    for (v, &c) in y.iter().zip(cycles) {
        sum[c] += v;
        count[c] += 1;
    }
    sum.iter().zip(count)
        .map(|(s, c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect()
}

/// Computes a [`DiagnosticsBundle`] from a finished (or cancelled) run.
/// Holds only settings; [`Self::analyze`] is pure.
#[derive(Clone, Debug)]
pub struct DiagnosticsEngine {
    config: DiagnosticsConfig,
    otoc: bool,
}

impl DiagnosticsEngine {
    pub fn new(config: DiagnosticsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { otoc: config.otoc_periods > 0, config })
    }

    /// Enable or disable the Floquet OTOC (it requires diagonalizing one
    /// propagator per slice of a bath period).
    pub fn with_otoc(mut self, otoc: bool) -> Self {
        self.otoc = otoc && self.config.otoc_periods > 0;
        self
    }

    pub fn config(&self) -> &DiagnosticsConfig { &self.config }

    fn hotspot_settings(&self) -> HotspotSettings {
        HotspotSettings {
            tau_steps: self.config.hotspot_tau_steps,
            smooth_alpha: self.config.smooth_alpha,
            peak_thr: self.config.peak_thr,
            peak_min_sep: self.config.peak_min_sep,
            max_peaks: self.config.max_peaks,
        }
    }

    /// Compute every diagnostic of `traj`, which must have been produced by
    /// `evolver`.
    pub fn analyze(&self, evolver: &Evolver, traj: &Trajectory) -> Result<DiagnosticsBundle> {
        let started = Instant::now();
        let n = traj.n_qubits;
        if evolver.ops().n_qubits() != n {
            return Err(Error::ShapeMismatch {
                what: "trajectory qubits",
                expected: (evolver.ops().n_qubits(), 1),
                got: (n, 1),
            });
        }
        let rho0 = traj.initial()
            .ok_or_else(|| Error::config("cannot analyze an empty trajectory"))?;
        let nt = traj.len();
        let dt = traj.frame_dt;
        let times = traj.times();
        let pairs = entanglement::qubit_pairs(n);

        let metrics: Vec<FrameMetrics>
            = traj.frames.par_iter()
            .map(|f| frame_metrics(&f.rho, rho0, n, &pairs))
            .collect::<Result<_>>()?;

        let bloch = nd::Array3::from_shape_fn(
            (nt, n, 3), |(k, q, i)| metrics[k].bloch[q][i]);
        let purity_qubit = stack_rows(&metrics, n, |m| m.purity_qubit.as_slice());
        let qfi = stack_rows(&metrics, n, |m| m.qfi.as_slice());
        let log_negativity = stack_rows(&metrics, pairs.len(), |m| m.logneg.as_slice());
        let concurrence = stack_rows(&metrics, pairs.len(), |m| m.concurrence.as_slice());
        let mutual_information
            = stack_rows(&metrics, pairs.len(), |m| m.mutual_info.as_slice());
        let spectrum_width = metrics[0].spectrum_half.len();
        let spectrum_half
            = stack_rows(&metrics, spectrum_width, |m| m.spectrum_half.as_slice());
        let coherence = nd::Array2::from_shape_fn((nt, n), |(k, q)| {
            bloch[[k, q, 0]].hypot(bloch[[k, q, 1]])
        });
        let excited_pop = nd::Array2::from_shape_fn((nt, n), |(k, q)| {
            0.5 * (1.0 - bloch[[k, q, 2]])
        });
        let logneg_mean: nd::Array1<f64>
            = if pairs.is_empty() { nd::Array1::zeros(nt) }
            else { log_negativity.mean_axis(nd::Axis(1)).unwrap_or_else(|| nd::Array1::zeros(nt)) };

        let states: Vec<&nd::Array2<C64>> = traj.states().collect();
        let settings = self.hotspot_settings();
        let (bures_velocity, hotspots)
            = rayon::join(
                || geometry::bures_velocity(&states, dt),
                || geometry::hotspots_density(&states, dt, &settings),
            );
        let bures_velocity = bures_velocity?;
        let hotspots = hotspots?;
        let hotspots_qubit: Vec<HotspotCurrents>
            = (0..n).into_par_iter()
            .map(|q| geometry::hotspots_bloch(&bloch, q, dt, &settings))
            .collect::<Result<_>>()?;

        let path = geometry::mean_direction(&bloch);
        let berry_rate = geometry::berry_rate_proxy(&path, dt);
        let qgt = geometry::qgt_proxy(&path, dt);
        let curvature = geometry::curvature_proxy(&path, dt);

        let gap = traj.per_qubit(|f| &f.gap);
        let wave = traj.per_qubit(|f| &f.bath_wave);
        let virtual_temperature = nd::Zip::from(&excited_pop).and(&gap)
            .map_collect(|pe, de| thermo::virtual_temperature(*pe, *de));
        let period = evolver.bath().period;
        let phases: Vec<f64> = (0..n).map(|q| evolver.bath().cycle_phase(q)).collect();
        let otto = thermo::otto_ledger(&times, &excited_pop, &gap, &wave, period, &phases);
        let heat_current = thermo::heat_current(&excited_pop, &gap, dt);
        let heat_current_lattice = heat_current.sum_axis(nd::Axis(1));
        let leak_risk = traj.per_qubit(|f| &f.leak_risk);
        let leak_fraction = thermo::leak_fraction(&leak_risk, self.config.leak_warn);

        let cycles = thermo::cycle_index(&times, period, 0.0);
        let n_cycles = cycles.last().map(|c| c + 1).unwrap_or(0);
        let ent_cycle = cycle_average(&logneg_mean, &cycles, n_cycles);
        let cycle_times: nd::Array1<f64>
            = (0..n_cycles).map(|c| c as f64 * period).collect();

        let otoc
            = if self.otoc {
                let model = evolver.hamiltonian_model()?;
                let U_F = scrambling::floquet_unitary(&model, period, evolver.params().dt)?;
                Some(scrambling::floquet_otoc(&U_F, rho0, n, self.config.otoc_periods))
            } else {
                None
            };

        debug!(
            frames = nt,
            n_qubits = n,
            otoc = otoc.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "diagnostics computed"
        );
        Ok(DiagnosticsBundle {
            n_qubits: n,
            frame_dt: dt,
            bures_velocity_qubit: geometry::bures_velocity_bloch(&bloch, dt),
            purity: metrics.iter().map(|m| m.purity).collect(),
            mi_half: metrics.iter().map(|m| m.mi_half).collect(),
            osee: metrics.iter().map(|m| m.osee).collect(),
            fidelity_initial: metrics.iter().map(|m| m.fidelity_initial).collect(),
            times,
            bloch,
            purity_qubit,
            coherence,
            excited_pop,
            qfi,
            pairs,
            log_negativity,
            concurrence,
            mutual_information,
            logneg_mean,
            spectrum_half,
            bures_velocity,
            hotspots,
            hotspots_qubit,
            berry_rate,
            qgt,
            curvature,
            choi_purity: traj.per_qubit(|f| &f.choi_purity),
            choi_min_eig: traj.per_qubit(|f| &f.choi_min_eig),
            choi_purity_lattice: traj.scalar(|f| f.lattice_choi_purity),
            choi_min_eig_lattice: traj.scalar(|f| f.lattice_choi_min_eig),
            virtual_temperature,
            otto,
            heat_current,
            heat_current_lattice,
            omega01: traj.per_qubit(|f| &f.omega01),
            anharmonicity: evolver.qubit_params().iter().map(|p| -p.transmon_ec).collect(),
            ej_over_ec: traj.per_qubit(|f| &f.ej_over_ec),
            leak_risk,
            leak_fraction,
            ent_cycle,
            cycle_times,
            otoc,
        })
    }
}
