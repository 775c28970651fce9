//! Single-qubit dissipative channels in Kraus form, their per-step assembly
//! from the bath-modulated rates, and Choi-matrix characterization.
//!
//! The lattice channel for one step is the tensor product of per-qubit
//! composite channels (dephasing, then amplitude damping, then heating). It is
//! applied qubit by qubit, which equals the weighted sum over the full
//! cross-product Kraus list returned by [`global_kraus`].

use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use num_traits::{ One, Zero };
use tracing::warn;
use crate::{
    config::{ bose_occupation, SimulationParams, Strictness },
    dynamics::hamiltonian::QubitTerms,
    error::{ Error, Result },
    hilbert,
};

/// Upper bound on any channel probability.
pub const PROB_MAX: f64 = 1.0 - 1e-9;

/// A list of Kraus operators.
pub type Kraus = Vec<nd::Array2<C64>>;

fn clip_prob(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, PROB_MAX) }
}

/// Phase flip with probability `p`: `{√(1-p) I, √p Z}`.
pub fn dephasing_kraus(p: f64) -> Kraus {
    let p = clip_prob(p);
    vec![
        hilbert::id2() * C64::from((1.0 - p).sqrt()),
        hilbert::sigma_z() * C64::from(p.sqrt()),
    ]
}

/// Amplitude damping `|1⟩ -> |0⟩` with probability `g`.
pub fn damping_kraus(g: f64) -> Kraus {
    let g = clip_prob(g);
    let z = C64::zero();
    vec![
        nd::array![[C64::one(), z], [z, C64::from((1.0 - g).sqrt())]],
        nd::array![[z, C64::from(g.sqrt())], [z, z]],
    ]
}

/// Thermal excitation `|0⟩ -> |1⟩` with probability `g`.
pub fn heating_kraus(g: f64) -> Kraus {
    let g = clip_prob(g);
    let z = C64::zero();
    vec![
        nd::array![[C64::from((1.0 - g).sqrt()), z], [z, C64::one()]],
        nd::array![[z, z], [C64::from(g.sqrt()), z]],
    ]
}

/// Sequential composition: apply `first`, then `second`. The result has
/// `first.len() * second.len()` operators `B A`.
pub fn compose(first: &[nd::Array2<C64>], second: &[nd::Array2<C64>]) -> Kraus {
    first.iter()
        .cartesian_product(second.iter())
        .map(|(a, b)| b.dot(a))
        .collect()
}

/// Largest absolute entry of `Σ K†K - I`.
pub fn completeness_error(kraus: &[nd::Array2<C64>]) -> f64 {
    let Some(first) = kraus.first() else { return f64::INFINITY; };
    let d = first.nrows();
    let sum: nd::Array2<C64>
        = kraus.iter()
        .fold(nd::Array2::zeros((d, d)), |acc, k| acc + hilbert::dagger(k).dot(k));
    (sum - nd::Array2::<C64>::eye(d)).iter()
        .map(|x| x.norm())
        .fold(0.0, f64::max)
}

/// `Σ K ρ K†`.
pub fn apply_kraus(rho: &nd::Array2<C64>, kraus: &[nd::Array2<C64>])
    -> nd::Array2<C64>
{
    let d = rho.nrows();
    kraus.iter()
        .fold(nd::Array2::zeros((d, d)), |acc, k| {
            acc + k.dot(rho).dot(&hilbert::dagger(k))
        })
}

/// Apply a single-qubit channel to qubit `q` of an `n`-qubit density matrix.
pub fn apply_local(
    rho: &nd::Array2<C64>,
    kraus: &[nd::Array2<C64>],
    q: usize,
    n: usize,
) -> nd::Array2<C64>
{
    let embedded: Kraus
        = kraus.iter()
        .map(|k| hilbert::op_on_qubit(k, q, n))
        .collect();
    apply_kraus(rho, &embedded)
}

/// Full Kraus list of the tensor product of per-qubit channels: every
/// cross-product term, each a Kronecker product ordered by qubit.
///
/// The list has `Π_q |K_q|` entries.
pub fn global_kraus(per_qubit: &[Kraus]) -> Kraus {
    per_qubit.iter()
        .map(|ks| ks.iter())
        .multi_cartesian_product()
        .map(|ops| hilbert::kron_all(ops))
        .collect()
}

/// Choi matrix `J = Σ vec(K) vec(K)†` (row-major vectorization), unnormalized;
/// `Tr J = d` for a trace-preserving channel.
pub fn choi(kraus: &[nd::Array2<C64>]) -> nd::Array2<C64> {
    let d = kraus.first().map(|k| k.nrows()).unwrap_or(0);
    kraus.iter()
        .fold(nd::Array2::zeros((d * d, d * d)), |acc, k| {
            let v: nd::Array1<C64> = k.iter().copied().collect();
            acc + hilbert::outer_prod(&v, &v)
        })
}

fn normalized_choi(kraus: &[nd::Array2<C64>]) -> nd::Array2<C64> {
    let d = kraus.first().map(|k| k.nrows()).unwrap_or(1);
    choi(kraus) / C64::from(d as f64)
}

/// `Tr (J/d)²`; 1 for a unitary channel, `1/d²` for the fully depolarizing
/// one.
pub fn choi_purity(kraus: &[nd::Array2<C64>]) -> f64 {
    hilbert::purity(&normalized_choi(kraus))
}

/// Smallest eigenvalue of `J/d`; non-negative (within rounding) for a
/// completely positive channel.
pub fn choi_min_eigenvalue(kraus: &[nd::Array2<C64>]) -> Result<f64> {
    hilbert::min_eigenvalue(&normalized_choi(kraus))
}

/// Channel parameters of one qubit for one step.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ChannelRates {
    /// Phase-flip probability.
    pub p_dephase: f64,
    /// Relaxation probability.
    pub g_down: f64,
    /// Excitation probability.
    pub g_up: f64,
    /// Thermal occupation used for the up/down rates.
    pub n_th: f64,
}

/// Per-qubit composite channels for one step.
#[derive(Clone, Debug)]
pub struct StepChannel {
    pub rates: Vec<ChannelRates>,
    pub per_qubit: Vec<Kraus>,
}

impl StepChannel {
    /// Apply every qubit's channel.
    pub fn apply(&self, rho: &nd::Array2<C64>) -> nd::Array2<C64> {
        let n = self.per_qubit.len();
        self.per_qubit.iter().enumerate()
            .fold(rho.clone(), |acc, (q, ks)| apply_local(&acc, ks, q, n))
    }

    /// Cross-product Kraus list equivalent to [`Self::apply`].
    pub fn global(&self) -> Kraus { global_kraus(&self.per_qubit) }

    pub fn choi_purities(&self) -> Vec<f64> {
        self.per_qubit.iter().map(|ks| choi_purity(ks)).collect()
    }

    pub fn choi_min_eigenvalues(&self) -> Result<Vec<f64>> {
        self.per_qubit.iter().map(|ks| choi_min_eigenvalue(ks)).collect()
    }
}

/// Pass `kraus` through if it is complete to within `tol`; otherwise warn and
/// pass it through, or fail, according to `strictness`.
fn check_completeness(kraus: Kraus, q: usize, tol: f64, strictness: Strictness)
    -> Result<Kraus>
{
    let deviation = completeness_error(&kraus);
    if deviation > tol {
        match strictness {
            Strictness::Warn => {
                warn!(qubit = q, deviation, tol, "Kraus completeness outside tolerance");
            },
            Strictness::Strict => {
                return Err(Error::Completeness { deviation, tol });
            },
        }
    }
    Ok(kraus)
}

/// Builds each step's channels from per-qubit base rates, the daemon's
/// dephasing scales, and the bath multipliers carried in [`QubitTerms`].
#[derive(Clone, Debug)]
pub struct DissipationModel<'a> {
    params: &'a [SimulationParams],
    dephasing_scales: &'a [f64],
}

impl<'a> DissipationModel<'a> {
    pub fn new(params: &'a [SimulationParams], dephasing_scales: &'a [f64])
        -> Result<Self>
    {
        if dephasing_scales.len() != params.len() {
            return Err(Error::ShapeMismatch {
                what: "dephasing scales",
                expected: (params.len(), 1),
                got: (dephasing_scales.len(), 1),
            });
        }
        Ok(Self { params, dephasing_scales })
    }

    /// Channel parameters of qubit `q` for a step of length `dt`.
    pub fn rates(&self, q: usize, terms: &QubitTerms, dt: f64) -> ChannelRates {
        let p = &self.params[q];
        let g = terms.bath.decay;
        let gap = p.delta_e() * terms.omega01.max(0.0) / p.omega0.max(f64::EPSILON);
        let n_th = bose_occupation(gap, terms.bath.temperature);
        let gamma_down = p.gam_relax * g * (n_th + 1.0);
        let gamma_up = p.gam_relax * g * n_th;
        let gamma_phi = p.gamma_phi * self.dephasing_scales[q] * g;
        ChannelRates {
            p_dephase: clip_prob(0.5 * -(-gamma_phi * dt).exp_m1()),
            g_down: clip_prob(-(-gamma_down * dt).exp_m1()),
            g_up: clip_prob(-(-gamma_up * dt).exp_m1()),
            n_th,
        }
    }

    /// Composite Kraus set for qubit `q`, checked for completeness according
    /// to the qubit's strictness setting.
    pub fn qubit_channel(&self, q: usize, rates: &ChannelRates) -> Result<Kraus> {
        let kraus = compose(
            &compose(&dephasing_kraus(rates.p_dephase), &damping_kraus(rates.g_down)),
            &heating_kraus(rates.g_up),
        );
        let p = &self.params[q];
        check_completeness(kraus, q, p.kraus_tol, p.strictness)
    }

    /// All per-qubit channels for a step of length `dt`.
    pub fn step_channel(&self, terms: &[QubitTerms], dt: f64) -> Result<StepChannel> {
        let rates: Vec<ChannelRates>
            = terms.iter().enumerate()
            .map(|(q, term)| self.rates(q, term, dt))
            .collect();
        let per_qubit: Vec<Kraus>
            = rates.iter().enumerate()
            .map(|(q, r)| self.qubit_channel(q, r))
            .collect::<Result<_>>()?;
        Ok(StepChannel { rates, per_qubit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn assert_close(a: &nd::Array2<C64>, b: &nd::Array2<C64>, eps: f64) {
        assert_eq!(a.dim(), b.dim());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(x.re, y.re, epsilon = eps);
            assert_abs_diff_eq!(x.im, y.im, epsilon = eps);
        }
    }

    #[test]
    fn channels_are_complete() {
        for p in [0.0, 0.1, 0.5, 0.999, 1.0, 3.0, -1.0] {
            assert!(completeness_error(&dephasing_kraus(p)) < 1e-12);
            assert!(completeness_error(&damping_kraus(p)) < 1e-12);
            assert!(completeness_error(&heating_kraus(p)) < 1e-12);
        }
        let composite = compose(
            &compose(&dephasing_kraus(0.2), &damping_kraus(0.3)),
            &heating_kraus(0.05),
        );
        assert_eq!(composite.len(), 8);
        assert!(completeness_error(&composite) < 1e-12);
        assert!(completeness_error(&[]).is_infinite());
    }

    #[test]
    fn damping_relaxes_population() {
        let excited = hilbert::product_density(&[hilbert::ket_excited()]);
        let out = apply_kraus(&excited, &damping_kraus(0.25));
        assert_abs_diff_eq!(out[[0, 0]].re, 0.25, epsilon = 1e-14);
        assert_abs_diff_eq!(out[[1, 1]].re, 0.75, epsilon = 1e-14);
        let ground = hilbert::ground_density(1);
        let out = apply_kraus(&ground, &heating_kraus(0.1));
        assert_abs_diff_eq!(out[[1, 1]].re, 0.1, epsilon = 1e-14);
    }

    #[test]
    fn choi_of_identity_and_full_dephasing() {
        let id = vec![hilbert::id2()];
        assert_abs_diff_eq!(choi_purity(&id), 1.0, epsilon = 1e-14);
        assert_abs_diff_eq!(choi_min_eigenvalue(&id).unwrap(), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(
            hilbert::trace(&choi(&damping_kraus(0.4))).re, 2.0, epsilon = 1e-14);
        // p = 1/2 dephasing is a rank-2 Choi matrix with equal weights
        assert_abs_diff_eq!(choi_purity(&dephasing_kraus(0.5)), 0.5, epsilon = 1e-12);
        let composite = compose(&dephasing_kraus(0.2), &damping_kraus(0.3));
        assert!(choi_min_eigenvalue(&composite).unwrap() > -1e-12);
    }

    #[test]
    fn local_application_matches_global_list() {
        let per_qubit = vec![
            compose(&dephasing_kraus(0.1), &damping_kraus(0.2)),
            compose(&damping_kraus(0.05), &heating_kraus(0.3)),
        ];
        let channel = StepChannel {
            rates: Vec::new(),
            per_qubit: per_qubit.clone(),
        };
        let rho = hilbert::werner_density(0.8);
        let local = channel.apply(&rho);
        let global = channel.global();
        assert_eq!(global.len(), 16);
        assert!(completeness_error(&global) < 1e-12);
        assert_close(&local, &apply_kraus(&rho, &global), 1e-13);

        // Choi purity of a product channel factorizes
        let joint = choi_purity(&global);
        let product: f64 = channel.choi_purities().iter().product();
        assert_abs_diff_eq!(joint, product, epsilon = 1e-12);
    }

    #[test]
    fn rates_follow_bath_and_scales() {
        use crate::config::BathFactors;
        let params = vec![SimulationParams::default(); 2];
        let scales = [1.0, 2.0];
        let model = DissipationModel::new(&params, &scales).unwrap();
        let terms = QubitTerms {
            bath: BathFactors { wave: 1.0, drive: 1.0, decay: 1.0, temperature: 0.0 },
            flux: 0.0,
            omega01: params[0].omega0,
            ej_over_ec: 1.0,
            detuning: 0.0,
            drive_amp: 0.0,
            drive_phase: 0.0,
        };
        let r0 = model.rates(0, &terms, 0.02);
        let r1 = model.rates(1, &terms, 0.02);
        assert_eq!(r0.g_up, 0.0);
        assert!(r1.p_dephase > r0.p_dephase);
        assert_abs_diff_eq!(
            r0.g_down, 1.0 - (-0.055_f64 * 0.02).exp(), epsilon = 1e-15);
        assert!(DissipationModel::new(&params, &[1.0]).is_err());
    }

    #[test]
    fn strict_mode_passes_valid_channels() {
        let params = vec![SimulationParams {
            strictness: Strictness::Strict, ..Default::default() }];
        let model = DissipationModel::new(&params, &[1.0]).unwrap();
        let rates = ChannelRates { p_dephase: 0.3, g_down: 0.9, g_up: 0.4, n_th: 0.0 };
        assert!(model.qubit_channel(0, &rates).is_ok());
    }

    #[test]
    fn incomplete_sets_fail_strict_and_pass_warn() {
        // amplitude damping with its decay operator dropped
        let truncated: Kraus = damping_kraus(0.3).into_iter().take(1).collect();
        let deviation = completeness_error(&truncated);
        assert!(deviation > 0.1);

        match check_completeness(truncated.clone(), 0, 1e-9, Strictness::Strict) {
            Err(Error::Completeness { deviation: d, tol }) => {
                assert_eq!(d, deviation);
                assert_eq!(tol, 1e-9);
            },
            other => panic!("expected a completeness error, got {:?}", other),
        }
        let kept = check_completeness(truncated.clone(), 0, 1e-9, Strictness::Warn).unwrap();
        assert_eq!(kept, truncated);
    }

    #[test]
    fn strictness_governs_model_channels_out_of_tolerance() {
        // a negative tolerance rejects every channel, even a complete one
        let rates = ChannelRates { p_dephase: 0.1, g_down: 0.2, g_up: 0.05, n_th: 0.0 };
        let strict = vec![SimulationParams {
            strictness: Strictness::Strict, kraus_tol: -1.0, ..Default::default() }];
        let model = DissipationModel::new(&strict, &[1.0]).unwrap();
        assert!(matches!(
            model.qubit_channel(0, &rates),
            Err(Error::Completeness { .. })
        ));

        let warn = vec![SimulationParams {
            strictness: Strictness::Warn, kraus_tol: -1.0, ..Default::default() }];
        let model = DissipationModel::new(&warn, &[1.0]).unwrap();
        let kraus = model.qubit_channel(0, &rates).unwrap();
        assert_eq!(kraus.len(), 8);
        assert!(completeness_error(&kraus) < 1e-12);
    }
}
