//! Entanglement measures on `n`-qubit density matrices.
//!
//! Subsystems are given as lists of qubit indices under the crate's basis
//! convention (qubit 0 is the most significant bit of a basis index).
//! Entropies are in bits.

use indexmap::IndexMap;
use ndarray as nd;
use ndarray_linalg::SVD;
use num_complex::Complex64 as C64;
use crate::{
    error::{ Error, Result },
    hilbert,
};

/// Eigenvalues below this are treated as zero in entropies.
const EIG_FLOOR: f64 = 1e-15;

fn validate_subsystem(sub: &[usize], n: usize) -> Result<Vec<usize>> {
    let mut sorted = sub.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != sub.len() {
        return Err(Error::config("subsystem lists a qubit twice"));
    }
    if let Some(q) = sorted.iter().find(|q| **q >= n) {
        return Err(Error::config(format!(
            "subsystem qubit {} out of range for {} qubits", q, n)));
    }
    Ok(sorted)
}

fn complement(sub: &[usize], n: usize) -> Vec<usize> {
    (0..n).filter(|q| !sub.contains(q)).collect()
}

/// Scatter the bits of `sub_index` (most significant first) onto the global
/// bit positions of `qubits`.
fn scatter(sub_index: usize, qubits: &[usize], n: usize) -> usize {
    let k = qubits.len();
    qubits.iter().enumerate()
        .fold(0, |acc, (pos, &q)| {
            let bit = (sub_index >> (k - 1 - pos)) & 1;
            acc | (bit << (n - 1 - q))
        })
}

/// Reduced density matrix on `keep`, ordered by ascending qubit index.
pub fn partial_trace(rho: &nd::Array2<C64>, keep: &[usize], n: usize)
    -> Result<nd::Array2<C64>>
{
    check_dim(rho, n)?;
    let keep = validate_subsystem(keep, n)?;
    let traced = complement(&keep, n);
    let dk = 1 << keep.len();
    let dt = 1 << traced.len();
    let keep_idx: Vec<usize> = (0..dk).map(|a| scatter(a, &keep, n)).collect();
    let traced_idx: Vec<usize> = (0..dt).map(|t| scatter(t, &traced, n)).collect();
    let mut out: nd::Array2<C64> = nd::Array2::zeros((dk, dk));
    for ((a, b), elem) in out.indexed_iter_mut() {
        *elem = traced_idx.iter()
            .map(|&t| rho[[keep_idx[a] | t, keep_idx[b] | t]])
            .sum();
    }
    Ok(out)
}

/// Single-qubit reduced state of qubit `q`.
pub fn reduced_qubit(rho: &nd::Array2<C64>, q: usize, n: usize)
    -> Result<nd::Array2<C64>>
{
    partial_trace(rho, &[q], n)
}

fn check_dim(rho: &nd::Array2<C64>, n: usize) -> Result<()> {
    let d = 1 << n;
    if rho.dim() != (d, d) {
        return Err(Error::ShapeMismatch {
            what: "density matrix", expected: (d, d), got: rho.dim() });
    }
    Ok(())
}

/// Partial transpose over the qubits in `sys`.
pub fn partial_transpose(rho: &nd::Array2<C64>, sys: &[usize], n: usize)
    -> Result<nd::Array2<C64>>
{
    check_dim(rho, n)?;
    let sys = validate_subsystem(sys, n)?;
    let mask = sys.iter().fold(0_usize, |acc, &q| acc | (1 << (n - 1 - q)));
    let d = 1 << n;
    Ok(nd::Array2::from_shape_fn((d, d), |(i, j)| {
        let swap = (i ^ j) & mask;
        rho[[i ^ swap, j ^ swap]]
    }))
}

/// Base-2 logarithm of the trace norm of the partial transpose over `sys`.
pub fn log_negativity(rho: &nd::Array2<C64>, sys: &[usize], n: usize) -> Result<f64> {
    let pt = partial_transpose(rho, sys, n)?;
    let trace_norm: f64 = hilbert::eigvalsh(&hilbert::hermitize(&pt))?
        .iter()
        .map(|e| e.abs())
        .sum();
    Ok(trace_norm.log2().max(0.0))
}

/// Log-negativity of the two-qubit reduced state on qubits `a`, `b`.
pub fn log_negativity_pair(rho: &nd::Array2<C64>, a: usize, b: usize, n: usize)
    -> Result<f64>
{
    let rho_ab = partial_trace(rho, &[a, b], n)?;
    log_negativity(&rho_ab, &[1], 2)
}

/// All ordered pairs `(a, b)`, `a < b`.
pub fn qubit_pairs(n: usize) -> Vec<(usize, usize)> {
    (0..n).flat_map(|a| (a + 1..n).map(move |b| (a, b))).collect()
}

/// Log-negativity of every qubit pair.
pub fn log_negativity_pairs(rho: &nd::Array2<C64>, n: usize)
    -> Result<IndexMap<(usize, usize), f64>>
{
    qubit_pairs(n).into_iter()
        .map(|(a, b)| Ok(((a, b), log_negativity_pair(rho, a, b, n)?)))
        .collect()
}

/// Wootters concurrence of a two-qubit state.
pub fn concurrence(rho2: &nd::Array2<C64>) -> Result<f64> {
    check_dim(rho2, 2)?;
    let yy = nd::linalg::kron(&hilbert::sigma_y(), &hilbert::sigma_y());
    let rho_tilde = yy.dot(&rho2.mapv(|x| x.conj())).dot(&yy);
    let sqrt_rho = hilbert::sqrtm_psd(rho2)?;
    let m = hilbert::hermitize(&sqrt_rho.dot(&rho_tilde).dot(&sqrt_rho));
    let mut lambdas: Vec<f64>
        = hilbert::eigvalsh(&m)?
        .iter()
        .map(|e| e.max(0.0).sqrt())
        .collect();
    lambdas.sort_by(|a, b| b.total_cmp(a));
    Ok((lambdas[0] - lambdas[1] - lambdas[2] - lambdas[3]).max(0.0))
}

/// Concurrence of every qubit pair.
pub fn concurrence_pairs(rho: &nd::Array2<C64>, n: usize)
    -> Result<IndexMap<(usize, usize), f64>>
{
    qubit_pairs(n).into_iter()
        .map(|(a, b)| {
            let rho_ab = partial_trace(rho, &[a, b], n)?;
            Ok(((a, b), concurrence(&rho_ab)?))
        })
        .collect()
}

/// Shannon entropy (bits) of a probability vector, ignoring zero entries.
fn shannon_bits<'a, I>(probs: I) -> f64
where I: IntoIterator<Item = &'a f64>
{
    probs.into_iter()
        .filter(|p| **p > EIG_FLOOR)
        .map(|p| -p * p.log2())
        .sum()
}

/// Von Neumann entropy in bits.
pub fn vn_entropy(rho: &nd::Array2<C64>) -> Result<f64> {
    let evals = hilbert::eigvalsh(&hilbert::hermitize(rho))?;
    Ok(shannon_bits(evals.iter()).max(0.0))
}

/// `S(A) + S(B) - S(AB)` in bits; `a` and `b` must be disjoint.
pub fn mutual_information(rho: &nd::Array2<C64>, a: &[usize], b: &[usize], n: usize)
    -> Result<f64>
{
    if a.iter().any(|q| b.contains(q)) {
        return Err(Error::config("mutual information needs disjoint subsystems"));
    }
    let ab: Vec<usize> = a.iter().chain(b.iter()).copied().collect();
    let s_a = vn_entropy(&partial_trace(rho, a, n)?)?;
    let s_b = vn_entropy(&partial_trace(rho, b, n)?)?;
    let s_ab = vn_entropy(&partial_trace(rho, &ab, n)?)?;
    Ok((s_a + s_b - s_ab).max(0.0))
}

/// Eigenvalues of the reduced state on `a`, largest first.
pub fn entanglement_spectrum(rho: &nd::Array2<C64>, a: &[usize], n: usize)
    -> Result<nd::Array1<f64>>
{
    let reduced = hilbert::hermitize(&partial_trace(rho, a, n)?);
    let mut evals = hilbert::eigvalsh(&reduced)?.to_vec();
    evals.sort_by(|x, y| y.total_cmp(x));
    Ok(nd::Array1::from(evals))
}

/// First `n / 2` qubits (rounded down, at least one) for half-cut quantities.
pub fn half_cut(n: usize) -> (Vec<usize>, Vec<usize>) {
    let k = (n / 2).max(1).min(n);
    ((0..k).collect(), (k..n).collect())
}

/// Operator-space entanglement entropy (bits) across the cut between the
/// first `cut` qubits and the rest.
///
/// The state is realigned as `R[(i_A j_A), (i_B j_B)] = ρ[(i_A i_B), (j_A j_B)]`
/// and its squared singular values, normalized to sum to one, are the Schmidt
/// weights.
pub fn osee(rho: &nd::Array2<C64>, cut: usize, n: usize) -> Result<f64> {
    check_dim(rho, n)?;
    if cut == 0 || cut >= n {
        return Err(Error::config(format!(
            "operator-space cut {} must lie strictly inside 0..{}", cut, n)));
    }
    let da = 1 << cut;
    let db = 1 << (n - cut);
    let mut r: nd::Array2<C64> = nd::Array2::zeros((da * da, db * db));
    for ((i, j), &x) in rho.indexed_iter() {
        let (ia, ib) = (i / db, i % db);
        let (ja, jb) = (j / db, j % db);
        r[[ia * da + ja, ib * db + jb]] = x;
    }
    let (_, s, _) = r.svd(false, false)?;
    let total: f64 = s.iter().map(|x| x * x).sum();
    if total <= 0.0 { return Ok(0.0); }
    let weights: Vec<f64> = s.iter().map(|x| x * x / total).collect();
    Ok(shannon_bits(weights.iter()))
}

/// Outcome of a single entanglement self-check.
#[derive(Clone, Debug, PartialEq)]
pub struct SelfCheck {
    pub name: &'static str,
    pub log_negativity: f64,
    pub concurrence: f64,
    pub expected_log_negativity: f64,
    pub expected_concurrence: f64,
    pub passed: bool,
}

/// Check the entanglement measures against known states: a Bell state, a
/// product state, and Werner states on both sides of the separability bound
/// `p = 1/3`.
pub fn self_test(tol: f64) -> Result<Vec<SelfCheck>> {
    let werner = |p: f64| -> (f64, f64) {
        let c = ((3.0 * p - 1.0) / 2.0).max(0.0);
        let ln = if p > 1.0 / 3.0 { ((1.0 + 3.0 * p) / 2.0).log2() } else { 0.0 };
        (ln, c)
    };
    let cases: Vec<(&'static str, nd::Array2<C64>, (f64, f64))> = vec![
        ("bell", hilbert::bell_density(0, 1, 2), (1.0, 1.0)),
        ("product", hilbert::product_density(
            &[hilbert::ket_plus(), hilbert::ket_ground()]), (0.0, 0.0)),
        ("werner_0.2", hilbert::werner_density(0.2), werner(0.2)),
        ("werner_0.8", hilbert::werner_density(0.8), werner(0.8)),
    ];
    cases.into_iter()
        .map(|(name, rho, (eln, ec))| {
            let ln = log_negativity(&rho, &[1], 2)?;
            let c = concurrence(&rho)?;
            Ok(SelfCheck {
                name,
                log_negativity: ln,
                concurrence: c,
                expected_log_negativity: eln,
                expected_concurrence: ec,
                passed: (ln - eln).abs() < tol && (c - ec).abs() < tol,
            })
        })
        .collect()
}
