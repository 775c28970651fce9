//! Single-qubit primitives, Kronecker embedding into an `n`-qubit space, and
//! small dense-matrix helpers shared by the dynamics and diagnostics.
//!
//! Conventions: `|0⟩` is the ground state, `|1⟩` the excited state, `Z =
//! diag(1, -1)`, and qubit 0 is the left-most (most significant) Kronecker
//! factor.

use ndarray::{ self as nd, linalg::kron };
use ndarray_linalg::{ Eigh, EigValsh, UPLO };
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use crate::error::{ Error, Result };

/// 2×2 identity.
pub fn id2() -> nd::Array2<C64> { nd::Array2::eye(2) }

/// Pauli σ<sub>*x*</sub>.
pub fn sigma_x() -> nd::Array2<C64> {
    nd::array![[C64::zero(), C64::one()], [C64::one(), C64::zero()]]
}

/// Pauli σ<sub>*y*</sub>.
pub fn sigma_y() -> nd::Array2<C64> {
    nd::array![[C64::zero(), -C64::i()], [C64::i(), C64::zero()]]
}

/// Pauli σ<sub>*z*</sub>.
pub fn sigma_z() -> nd::Array2<C64> {
    nd::array![[C64::one(), C64::zero()], [C64::zero(), -C64::one()]]
}

/// Lowering operator `|0⟩⟨1|`.
pub fn sigma_minus() -> nd::Array2<C64> {
    nd::array![[C64::zero(), C64::one()], [C64::zero(), C64::zero()]]
}

/// Raising operator `|1⟩⟨0|`.
pub fn sigma_plus() -> nd::Array2<C64> {
    nd::array![[C64::zero(), C64::zero()], [C64::one(), C64::zero()]]
}

/// Ground-state projector `|0⟩⟨0|`.
pub fn proj_ground() -> nd::Array2<C64> {
    nd::array![[C64::one(), C64::zero()], [C64::zero(), C64::zero()]]
}

/// Excited-state projector `|1⟩⟨1|`.
pub fn proj_excited() -> nd::Array2<C64> {
    nd::array![[C64::zero(), C64::zero()], [C64::zero(), C64::one()]]
}

/// Embed a single-qubit operator acting on qubit `q` of an `n`-qubit register,
/// with identities on every other qubit.
///
/// *Panics* if `q >= n`.
pub fn op_on_qubit(op: &nd::Array2<C64>, q: usize, n: usize)
    -> nd::Array2<C64>
{
    assert!(q < n, "op_on_qubit: qubit index {} out of range for {} qubits", q, n);
    let eyesize1 = 2_usize.pow(q as u32);
    let eyesize2 = 2_usize.pow((n - q - 1) as u32);
    kron(&kron(&nd::Array2::eye(eyesize1), op), &nd::Array2::eye(eyesize2))
}

/// Kronecker product of a sequence of square matrices, left to right.
pub fn kron_all<'a, I>(ops: I) -> nd::Array2<C64>
where I: IntoIterator<Item = &'a nd::Array2<C64>>
{
    ops.into_iter()
        .fold(nd::Array2::eye(1), |acc, op| kron(&acc, op))
}

/// Compute the outer product `|a⟩⟨b|` of two state vectors.
pub fn outer_prod(a: &nd::Array1<C64>, b: &nd::Array1<C64>)
    -> nd::Array2<C64>
{
    let a2 = a.view().insert_axis(nd::Axis(1));
    let b2 = b.mapv(|bj| bj.conj()).insert_axis(nd::Axis(0));
    a2.dot(&b2)
}

/// Conjugate transpose.
pub fn dagger<S>(a: &nd::ArrayBase<S, nd::Ix2>) -> nd::Array2<C64>
where S: nd::Data<Elem = C64>
{
    a.t().mapv(|x| x.conj())
}

/// Trace of a square matrix.
pub fn trace<S>(a: &nd::ArrayBase<S, nd::Ix2>) -> C64
where S: nd::Data<Elem = C64>
{
    a.diag().iter().sum()
}

/// Hermitian part `(A + A†) / 2`.
pub fn hermitize(a: &nd::Array2<C64>) -> nd::Array2<C64> {
    (a + &dagger(a)) * 0.5
}

/// Largest absolute deviation of `A` from `A†`.
pub fn hermiticity_error(a: &nd::Array2<C64>) -> f64 {
    a.iter().zip(a.t().iter())
        .map(|(aij, aji)| (*aij - aji.conj()).norm())
        .fold(0.0, f64::max)
}

/// Purity `Tr ρ²`.
pub fn purity(rho: &nd::Array2<C64>) -> f64 {
    // Tr(ρ ρ) = Σ_ij ρ_ij ρ_ji = Σ_ij |ρ_ij|² for Hermitian ρ
    rho.iter().map(|r| r.norm_sqr()).sum()
}

/// Eigenvalues of a Hermitian matrix in ascending order.
pub fn eigvalsh(a: &nd::Array2<C64>) -> Result<nd::Array1<f64>> {
    Ok(a.eigvalsh(UPLO::Lower)?)
}

/// Smallest eigenvalue of a Hermitian matrix.
pub fn min_eigenvalue(a: &nd::Array2<C64>) -> Result<f64> {
    Ok(eigvalsh(a)?.iter().copied().fold(f64::INFINITY, f64::min))
}

/// Principal square root of a positive-semidefinite matrix, computed from its
/// eigendecomposition with negative eigenvalues clipped to zero.
pub fn sqrtm_psd(a: &nd::Array2<C64>) -> Result<nd::Array2<C64>> {
    let (E, V): (nd::Array1<f64>, nd::Array2<C64>) = a.eigh(UPLO::Lower)?;
    let sqrt_e: nd::Array1<C64> = E.mapv(|e| C64::from(e.max(0.0).sqrt()));
    let scaled = &V * &sqrt_e.insert_axis(nd::Axis(0));
    Ok(scaled.dot(&dagger(&V)))
}

/// Normalized single-qubit state `α|0⟩ + β|1⟩`.
///
/// Fails if both amplitudes vanish.
pub fn qubit_ket(alpha: C64, beta: C64) -> Result<nd::Array1<C64>> {
    let norm = (alpha.norm_sqr() + beta.norm_sqr()).sqrt();
    if norm <= f64::EPSILON {
        return Err(Error::config("qubit amplitudes must not both vanish"));
    }
    Ok(nd::array![alpha, beta] / C64::from(norm))
}

/// `|0⟩`.
pub fn ket_ground() -> nd::Array1<C64> { nd::array![C64::one(), C64::zero()] }

/// `|1⟩`.
pub fn ket_excited() -> nd::Array1<C64> { nd::array![C64::zero(), C64::one()] }

/// `(|0⟩ + |1⟩) / √2`.
pub fn ket_plus() -> nd::Array1<C64> {
    nd::array![C64::one(), C64::one()] / 2.0_f64.sqrt()
}

/// Density matrix of the product of per-qubit pure states.
pub fn product_density(kets: &[nd::Array1<C64>]) -> nd::Array2<C64> {
    let psi: nd::Array1<C64>
        = kets.iter()
        .fold(nd::array![C64::one()], |acc, k| {
            acc.iter()
                .flat_map(|a| k.iter().map(move |b| *a * *b))
                .collect()
        });
    outer_prod(&psi, &psi)
}

/// All-ground density matrix for `n` qubits.
pub fn ground_density(n: usize) -> nd::Array2<C64> {
    let dim = 2_usize.pow(n as u32);
    let mut rho: nd::Array2<C64> = nd::Array2::zeros((dim, dim));
    rho[[0, 0]] = C64::one();
    rho
}

/// Maximally mixed density matrix for `n` qubits.
pub fn maximally_mixed(n: usize) -> nd::Array2<C64> {
    let dim = 2_usize.pow(n as u32);
    nd::Array2::eye(dim) / C64::from(dim as f64)
}

/// Bell state `(|00⟩ + |11⟩) / √2` embedded on qubits `a < b` of an `n`-qubit
/// register, with every other qubit in `|0⟩`.
///
/// *Panics* if `a == b` or either index is out of range.
pub fn bell_density(a: usize, b: usize, n: usize) -> nd::Array2<C64> {
    assert!(a != b && a < n && b < n, "bell_density: invalid qubit pair");
    let dim = 2_usize.pow(n as u32);
    let mut psi: nd::Array1<C64> = nd::Array1::zeros(dim);
    let both = (1 << (n - 1 - a)) | (1 << (n - 1 - b));
    psi[0] = C64::from(1.0 / 2.0_f64.sqrt());
    psi[both] = C64::from(1.0 / 2.0_f64.sqrt());
    outer_prod(&psi, &psi)
}

/// Werner state `p |Φ+⟩⟨Φ+| + (1 - p) I/4` on two qubits.
pub fn werner_density(p: f64) -> nd::Array2<C64> {
    bell_density(0, 1, 2) * C64::from(p) + maximally_mixed(2) * C64::from(1.0 - p)
}
