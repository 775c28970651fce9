//! Information geometry along a trajectory: Bloch vectors, fidelity and Bures
//! distances, lagged-Bures "memory" currents, QFI, and finite-difference
//! geometric proxies.
//!
//! The Berry-rate, QGT, and curvature proxies are computed on the discrete
//! path of the lattice-mean Bloch direction. They are approximations for
//! mixed states and are not gauge-invariant geometric quantities.

use ndarray as nd;
use num_complex::Complex64 as C64;
use rayon::iter::{ IntoParallelIterator, ParallelIterator };
use crate::{
    error::{ Error, Result },
    hilbert,
};

/// Three-component real vector.
pub type Vec3 = [f64; 3];

fn dot(a: &Vec3, b: &Vec3) -> f64 { a[0] * b[0] + a[1] * b[1] + a[2] * b[2] }

fn cross(a: &Vec3, b: &Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: &Vec3) -> f64 { dot(a, a).sqrt() }

fn sub(a: &Vec3, b: &Vec3) -> Vec3 { [a[0] - b[0], a[1] - b[1], a[2] - b[2]] }

/// Bloch vector `(⟨X⟩, ⟨Y⟩, ⟨Z⟩)` of a single-qubit state.
pub fn bloch_vector(rho2: &nd::Array2<C64>) -> Vec3 {
    [
        2.0 * rho2[[0, 1]].re,
        -2.0 * rho2[[0, 1]].im,
        rho2[[0, 0]].re - rho2[[1, 1]].re,
    ]
}

/// Single-qubit fidelity from Bloch vectors:
/// `F = (1 + r·s + √((1 - |r|²)(1 - |s|²))) / 2`.
pub fn fidelity_bloch(r: &Vec3, s: &Vec3) -> f64 {
    let rr = (1.0 - dot(r, r)).max(0.0);
    let ss = (1.0 - dot(s, s)).max(0.0);
    (0.5 * (1.0 + dot(r, s) + (rr * ss).sqrt())).clamp(0.0, 1.0)
}

/// Bures distance `√(2 (1 - √F))`.
pub fn bures_from_fidelity(F: f64) -> f64 {
    (2.0 * (1.0 - F.clamp(0.0, 1.0).sqrt())).max(0.0).sqrt()
}

/// Single-qubit Bures distance from Bloch vectors.
pub fn bures_bloch(r: &Vec3, s: &Vec3) -> f64 {
    bures_from_fidelity(fidelity_bloch(r, s))
}

/// Single-qubit Bures angle `arccos √F`.
pub fn bures_angle_bloch(r: &Vec3, s: &Vec3) -> f64 {
    fidelity_bloch(r, s).sqrt().clamp(0.0, 1.0).acos()
}

/// Uhlmann fidelity `(Tr √(√ρ σ √ρ))²` of two density matrices.
pub fn fidelity(rho: &nd::Array2<C64>, sigma: &nd::Array2<C64>) -> Result<f64> {
    if rho.dim() != sigma.dim() {
        return Err(Error::ShapeMismatch {
            what: "fidelity operands", expected: rho.dim(), got: sigma.dim() });
    }
    let sqrt_rho = hilbert::sqrtm_psd(rho)?;
    let inner = hilbert::hermitize(&sqrt_rho.dot(sigma).dot(&sqrt_rho));
    let root_sum: f64
        = hilbert::eigvalsh(&inner)?
        .iter()
        .map(|e| e.max(0.0).sqrt())
        .sum();
    Ok((root_sum * root_sum).clamp(0.0, 1.0))
}

/// Bures distance of two density matrices.
pub fn bures_distance(rho: &nd::Array2<C64>, sigma: &nd::Array2<C64>) -> Result<f64> {
    Ok(bures_from_fidelity(fidelity(rho, sigma)?))
}

/// Bures velocity `D_B(ρ_k, ρ_{k-1}) / dt` along a sequence of states; the
/// first entry is zero.
pub fn bures_velocity(states: &[&nd::Array2<C64>], dt: f64) -> Result<nd::Array1<f64>> {
    let rates: Vec<f64>
        = (0..states.len()).into_par_iter()
        .map(|k| {
            if k == 0 { Ok(0.0) }
            else { Ok(bures_distance(states[k], states[k - 1])? / dt) }
        })
        .collect::<Result<_>>()?;
    Ok(nd::Array1::from(rates))
}

/// Per-qubit Bures velocity from a `(frames, qubits, 3)` Bloch series.
pub fn bures_velocity_bloch(bloch: &nd::Array3<f64>, dt: f64) -> nd::Array2<f64> {
    let (nt, nq, _) = bloch.dim();
    nd::Array2::from_shape_fn((nt, nq), |(k, q)| {
        if k == 0 { return 0.0; }
        bures_bloch(&row3(bloch, k, q), &row3(bloch, k - 1, q)) / dt
    })
}

/// Bloch vector of qubit `q` at frame `k`.
pub fn row3(bloch: &nd::Array3<f64>, k: usize, q: usize) -> Vec3 {
    [bloch[[k, q, 0]], bloch[[k, q, 1]], bloch[[k, q, 2]]]
}

/// Exponentially weighted moving average with `y_0 = x_0`.
pub fn ewma(x: &nd::Array1<f64>, alpha: f64) -> nd::Array1<f64> {
    let mut acc: Option<f64> = None;
    x.iter()
        .map(|&xk| {
            let y = match acc {
                None => xk,
                Some(prev) => alpha * xk + (1.0 - alpha) * prev,
            };
            acc = Some(y);
            y
        })
        .collect()
}

/// Finite-difference derivative: central differences inside, one-sided at
/// the ends.
pub fn gradient(x: &nd::Array1<f64>, dt: f64) -> nd::Array1<f64> {
    let n = x.len();
    if n < 2 { return nd::Array1::zeros(n); }
    nd::Array1::from_shape_fn(n, |k| {
        if k == 0 { (x[1] - x[0]) / dt }
        else if k == n - 1 { (x[n - 1] - x[n - 2]) / dt }
        else { (x[k + 1] - x[k - 1]) / (2.0 * dt) }
    })
}

/// Scale a non-negative series so that its maximum is one; all-zero series
/// stay zero.
pub fn normalize_max(x: &nd::Array1<f64>) -> nd::Array1<f64> {
    let m = x.iter().copied().fold(0.0, f64::max);
    if m > 0.0 { x / m } else { nd::Array1::zeros(x.len()) }
}

/// Indices of local maxima of `y` above `thr`, keeping the tallest first and
/// discarding any within `min_sep` of an already-kept peak, at most
/// `max_peaks` (and `top_k`, if given). Returned in ascending index order.
pub fn find_peaks(
    y: &nd::Array1<f64>,
    thr: f64,
    max_peaks: usize,
    top_k: Option<usize>,
    min_sep: usize,
) -> Vec<usize>
{
    let n = y.len();
    let mut candidates: Vec<usize>
        = (0..n)
        .filter(|&k| {
            y[k] > thr
                && (k == 0 || y[k] >= y[k - 1])
                && (k == n - 1 || y[k] >= y[k + 1])
        })
        .collect();
    candidates.sort_by(|&a, &b| y[b].total_cmp(&y[a]).then(a.cmp(&b)));
    let limit = top_k.map_or(max_peaks, |k| k.min(max_peaks));
    let mut kept: Vec<usize> = Vec::new();
    for k in candidates {
        if kept.len() >= limit { break; }
        if kept.iter().all(|&j| k.abs_diff(j) >= min_sep) {
            kept.push(k);
        }
    }
    kept.sort_unstable();
    kept
}

/// Memory-current decomposition of a distance series.
#[derive(Clone, Debug, PartialEq)]
pub struct HotspotCurrents {
    /// Bures length rate between consecutive frames.
    pub bures_rate: nd::Array1<f64>,
    /// Lagged Bures distance `D(ρ_k, ρ_{k-τ})`.
    pub d_lag: nd::Array1<f64>,
    /// Smoothed `dD_lag/dt`.
    pub d_lag_rate: nd::Array1<f64>,
    /// Separating ("memory-loss") current, positive part of the rate.
    pub j_sep: nd::Array1<f64>,
    /// Returning ("memory-gain") current, negative part of the rate.
    pub j_ret: nd::Array1<f64>,
    pub sep_norm: nd::Array1<f64>,
    pub ret_norm: nd::Array1<f64>,
    /// Peak indices of `sep_norm`.
    pub sep_peaks: Vec<usize>,
    /// Peak indices of `ret_norm`.
    pub ret_peaks: Vec<usize>,
}

/// Settings for [`hotspots_from_distances`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct HotspotSettings {
    pub tau_steps: usize,
    pub smooth_alpha: f64,
    pub peak_thr: f64,
    pub peak_min_sep: usize,
    pub max_peaks: usize,
}

/// Build the hotspot currents from a frame-distance function
/// `dist(i, j)`, evaluated for consecutive frames and for frames `τ` apart.
///
/// For `k < τ` the lag reference is the first frame.
pub fn hotspots_from_distances<F>(
    n_frames: usize,
    dt: f64,
    settings: &HotspotSettings,
    dist: F,
) -> Result<HotspotCurrents>
where F: Fn(usize, usize) -> Result<f64> + Sync
{
    let tau = settings.tau_steps;
    let pairs: Vec<(f64, f64)>
        = (0..n_frames).into_par_iter()
        .map(|k| {
            let step = if k == 0 { 0.0 } else { dist(k, k - 1)? / dt };
            let reference = k.saturating_sub(tau);
            let lag = if reference == k { 0.0 } else { dist(k, reference)? };
            Ok((step, lag))
        })
        .collect::<Result<_>>()?;
    let bures_rate: nd::Array1<f64> = pairs.iter().map(|p| p.0).collect();
    let d_lag: nd::Array1<f64> = pairs.iter().map(|p| p.1).collect();
    let d_lag_rate = ewma(&gradient(&d_lag, dt), settings.smooth_alpha);
    let j_sep = d_lag_rate.mapv(|s| s.max(0.0));
    let j_ret = d_lag_rate.mapv(|s| (-s).max(0.0));
    let sep_norm = normalize_max(&j_sep);
    let ret_norm = normalize_max(&j_ret);
    let peaks = |y: &nd::Array1<f64>| find_peaks(
        y, settings.peak_thr, settings.max_peaks, None, settings.peak_min_sep);
    Ok(HotspotCurrents {
        sep_peaks: peaks(&sep_norm),
        ret_peaks: peaks(&ret_norm),
        bures_rate,
        d_lag,
        d_lag_rate,
        j_sep,
        j_ret,
        sep_norm,
        ret_norm,
    })
}

/// Hotspot currents of the global density-matrix trajectory.
pub fn hotspots_density(
    states: &[&nd::Array2<C64>],
    dt: f64,
    settings: &HotspotSettings,
) -> Result<HotspotCurrents>
{
    hotspots_from_distances(
        states.len(), dt, settings,
        |i, j| bures_distance(states[i], states[j]),
    )
}

/// Hotspot currents of one qubit's Bloch trajectory.
pub fn hotspots_bloch(
    bloch: &nd::Array3<f64>,
    q: usize,
    dt: f64,
    settings: &HotspotSettings,
) -> Result<HotspotCurrents>
{
    hotspots_from_distances(
        bloch.dim().0, dt, settings,
        |i, j| Ok(bures_bloch(&row3(bloch, i, q), &row3(bloch, j, q))),
    )
}

/// Closed-form QFI of a qubit state `ρ = (I + r·σ)/2` under the unitary family
/// generated by `G = g₀ I + g·σ`: `4 |g × r|²`.
pub fn qfi_bloch(r: &Vec3, g: &Vec3) -> f64 {
    let c = cross(g, r);
    4.0 * dot(&c, &c)
}

/// Pauli components `g` of a 2×2 Hermitian generator.
pub fn generator_components(G: &nd::Array2<C64>) -> Vec3 {
    [
        0.5 * hilbert::trace(&G.dot(&hilbert::sigma_x())).re,
        0.5 * hilbert::trace(&G.dot(&hilbert::sigma_y())).re,
        0.5 * hilbert::trace(&G.dot(&hilbert::sigma_z())).re,
    ]
}

/// QFI of a single-qubit state for generator `G`.
pub fn qfi_qubit(rho2: &nd::Array2<C64>, G: &nd::Array2<C64>) -> f64 {
    qfi_bloch(&bloch_vector(rho2), &generator_components(G))
}

/// Finite-difference QFI `8 (1 - √F(ρ, e^{-iθG} ρ e^{iθG})) / θ²` for any
/// dimension.
pub fn qfi_finite_difference(rho: &nd::Array2<C64>, G: &nd::Array2<C64>, theta: f64)
    -> Result<f64>
{
    if theta == 0.0 {
        return Err(Error::config("finite-difference step must be nonzero"));
    }
    let U = crate::dynamics::hamiltonian::propagator(G.clone(), theta)?;
    let shifted = U.dot(rho).dot(&hilbert::dagger(&U));
    let F = fidelity(rho, &shifted)?;
    Ok(8.0 * (1.0 - F.sqrt()) / (theta * theta))
}

/// Unit direction of the lattice-mean Bloch vector at every frame of a
/// `(frames, qubits, 3)` series; zero where the mean vanishes.
pub fn mean_direction(bloch: &nd::Array3<f64>) -> Vec<Vec3> {
    let (nt, nq, _) = bloch.dim();
    (0..nt)
        .map(|k| {
            let mut m = [0.0; 3];
            for q in 0..nq {
                let r = row3(bloch, k, q);
                m.iter_mut().zip(r).for_each(|(mi, ri)| { *mi += ri / nq as f64; });
            }
            let len = norm(&m);
            if len > 1e-12 { [m[0] / len, m[1] / len, m[2] / len] } else { [0.0; 3] }
        })
        .collect()
}

/// Berry-phase-rate proxy: `-½ Ω_k / dt`, with `Ω_k` the signed solid angle of
/// the spherical triangle `(ẑ, u_k, u_{k+1})`. The last entry is zero.
pub fn berry_rate_proxy(path: &[Vec3], dt: f64) -> nd::Array1<f64> {
    let z = [0.0, 0.0, 1.0];
    let n = path.len();
    nd::Array1::from_shape_fn(n, |k| {
        if k + 1 >= n { return 0.0; }
        let (a, b) = (&path[k], &path[k + 1]);
        let num = dot(&z, &cross(a, b));
        let den = 1.0 + dot(&z, a) + dot(&z, b) + dot(a, b);
        let omega = 2.0 * num.atan2(den);
        -0.5 * omega / dt
    })
}

/// Quantum-geometric-tensor (metric) proxy `¼ |u_{k+1} - u_k|² / dt²`. The
/// last entry is zero.
pub fn qgt_proxy(path: &[Vec3], dt: f64) -> nd::Array1<f64> {
    let n = path.len();
    nd::Array1::from_shape_fn(n, |k| {
        if k + 1 >= n { return 0.0; }
        let d = sub(&path[k + 1], &path[k]);
        0.25 * dot(&d, &d) / (dt * dt)
    })
}

/// Path-curvature proxy `|u' × u''| / |u'|³` from central differences; zero at
/// the ends and where the path is stationary.
pub fn curvature_proxy(path: &[Vec3], dt: f64) -> nd::Array1<f64> {
    let n = path.len();
    nd::Array1::from_shape_fn(n, |k| {
        if k == 0 || k + 1 >= n { return 0.0; }
        let (prev, cur, next) = (&path[k - 1], &path[k], &path[k + 1]);
        let d1: Vec3 = std::array::from_fn(|i| (next[i] - prev[i]) / (2.0 * dt));
        let d2: Vec3 = std::array::from_fn(|i| (next[i] - 2.0 * cur[i] + prev[i]) / (dt * dt));
        let speed = norm(&d1);
        if speed < 1e-12 { 0.0 } else { norm(&cross(&d1, &d2)) / speed.powi(3) }
    })
}
