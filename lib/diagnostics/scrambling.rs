//! Out-of-time-order correlators under the stroboscopic (Floquet) evolution of
//! the noise-free coherent Hamiltonian.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    dynamics::hamiltonian::{ self, HamiltonianModel },
    error::{ Error, Result },
    hilbert,
};

/// One-period propagator `U_F = Π_k exp(-i H(t_k) δt)`, time-ordered with
/// later times on the left. The period is split into `ceil(period / dt)`
/// equal slices.
pub fn floquet_unitary(model: &HamiltonianModel, period: f64, dt: f64)
    -> Result<nd::Array2<C64>>
{
    if !(period > 0.0 && dt > 0.0) {
        return Err(Error::config("Floquet period and step must be positive"));
    }
    let slices = (period / dt - 1e-9).ceil().max(1.0) as usize;
    let h = period / slices as f64;
    let dim = 1 << model.n_qubits();
    (0..slices)
        .try_fold(nd::Array2::<C64>::eye(dim), |U, k| {
            let step = hamiltonian::propagator(model.coherent(k as f64 * h), h)?;
            Ok(step.dot(&U))
        })
}

/// Stroboscopic OTOC series.
#[derive(Clone, Debug, PartialEq)]
pub struct OtocSeries {
    /// Number of elapsed Floquet periods.
    pub periods: nd::Array1<f64>,
    /// `F_k = Re Tr[ρ₀ W_k† V† W_k V]`.
    pub otoc: nd::Array1<f64>,
    /// `(1 - F_k) / 2`.
    pub scrambling: nd::Array1<f64>,
}

/// OTOC of `W = Z_0` and `V = Z_{n-1}` over `n_periods` Floquet periods
/// (inclusive of period zero), with `W_k = U_F^{†k} W U_F^k`.
pub fn floquet_otoc(
    U_F: &nd::Array2<C64>,
    rho0: &nd::Array2<C64>,
    n: usize,
    n_periods: usize,
) -> OtocSeries
{
    let W = hilbert::op_on_qubit(&hilbert::sigma_z(), 0, n);
    let V = hilbert::op_on_qubit(&hilbert::sigma_z(), n.saturating_sub(1), n);
    let mut Uk: nd::Array2<C64> = nd::Array2::eye(U_F.nrows());
    let mut otoc: Vec<f64> = Vec::with_capacity(n_periods + 1);
    for k in 0..=n_periods {
        if k > 0 { Uk = U_F.dot(&Uk); }
        let Uk_dag = hilbert::dagger(&Uk);
        let Wk = Uk_dag.dot(&W).dot(&Uk);
        let Wk_dag = hilbert::dagger(&Wk);
        let prod = rho0.dot(&Wk_dag).dot(&V).dot(&Wk).dot(&V);
        otoc.push(hilbert::trace(&prod).re);
    }
    let otoc = nd::Array1::from(otoc);
    OtocSeries {
        periods: (0..=n_periods).map(|k| k as f64).collect(),
        scrambling: otoc.mapv(|f| (1.0 - f) / 2.0),
        otoc,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use crate::{
        config::{ BathSchedule, CouplingParams, SimulationParams },
        lattice::{ Adjacency, LatticeOps },
        pulse::PulseSchedule,
    };

    fn setup(n: usize, coupling: CouplingParams)
        -> (LatticeOps, Vec<SimulationParams>, BathSchedule, CouplingParams, PulseSchedule)
    {
        let ops = LatticeOps::new(n, &Adjacency::chain(n)).unwrap();
        let params = vec![SimulationParams::default(); n];
        let pulses = PulseSchedule::zeros(n, 4, 0.8, 12.0).unwrap();
        (ops, params, BathSchedule::default(), coupling, pulses)
    }

    #[test]
    fn floquet_unitary_is_unitary() {
        let (ops, params, bath, coupling, pulses) = setup(2, CouplingParams::default());
        let model = HamiltonianModel::new(&ops, &params, &bath, &coupling, &pulses).unwrap();
        let U = floquet_unitary(&model, 4.0, 0.05).unwrap();
        let id = hilbert::dagger(&U).dot(&U);
        for ((i, j), x) in id.indexed_iter() {
            let target = if i == j { 1.0 } else { 0.0 };
            assert_abs_diff_eq!(x.re, target, epsilon = 1e-10);
            assert_abs_diff_eq!(x.im, 0.0, epsilon = 1e-10);
        }
        assert!(floquet_unitary(&model, 0.0, 0.05).is_err());
    }

    #[test]
    fn uncoupled_qubits_never_scramble() {
        let (ops, params, bath, coupling, pulses) = setup(2, CouplingParams::uncoupled());
        let model = HamiltonianModel::new(&ops, &params, &bath, &coupling, &pulses).unwrap();
        let U = floquet_unitary(&model, 4.0, 0.05).unwrap();
        let rho0 = hilbert::product_density(&[hilbert::ket_plus(), hilbert::ket_plus()]);
        let series = floquet_otoc(&U, &rho0, 2, 5);
        assert_eq!(series.otoc.len(), 6);
        for (f, s) in series.otoc.iter().zip(series.scrambling.iter()) {
            assert_abs_diff_eq!(*f, 1.0, epsilon = 1e-9);
            assert_abs_diff_eq!(*s, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn coupled_otoc_stays_bounded() {
        let (ops, params, bath, coupling, pulses) = setup(3, CouplingParams::default());
        let model = HamiltonianModel::new(&ops, &params, &bath, &coupling, &pulses).unwrap();
        let U = floquet_unitary(&model, 4.0, 0.05).unwrap();
        let rho0 = hilbert::ground_density(3);
        let series = floquet_otoc(&U, &rho0, 3, 4);
        assert_abs_diff_eq!(series.otoc[0], 1.0, epsilon = 1e-12);
        assert!(series.otoc.iter().all(|f| (-1.0 - 1e-9..=1.0 + 1e-9).contains(f)));
    }
}
