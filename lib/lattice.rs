//! Lattice topology and the operators embedded on it.
//!
//! [`LatticeOps`] is built once per (qubit count, adjacency) pair and is
//! immutable afterward; share it behind an `Arc` between concurrent runs.

use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::{
    config::AdjacencySpec,
    error::{ Error, Result },
    hilbert,
};

/// Validated adjacency matrix: symmetric, zero diagonal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Adjacency {
    matrix: nd::Array2<bool>,
}

impl Adjacency {
    /// Validate a 0/1 matrix.
    ///
    /// Fails with [`Error::Config`] on a non-square or non-symmetric matrix,
    /// entries other than 0 or 1, or a self-loop.
    pub fn from_matrix(matrix: &nd::Array2<u8>) -> Result<Self> {
        let (r, c) = matrix.dim();
        if r != c {
            return Err(Error::ShapeMismatch {
                what: "adjacency", expected: (r, r), got: (r, c) });
        }
        for ((i, j), &a) in matrix.indexed_iter() {
            if a > 1 {
                return Err(Error::config(format!(
                    "adjacency entry ({}, {}) must be 0 or 1, got {}", i, j, a)));
            }
            if i == j && a != 0 {
                return Err(Error::config(format!("adjacency has a self-loop on {}", i)));
            }
            if a != matrix[[j, i]] {
                return Err(Error::config(format!(
                    "adjacency is not symmetric at ({}, {})", i, j)));
            }
        }
        Ok(Self { matrix: matrix.mapv(|a| a == 1) })
    }

    /// Validate a matrix given as nested rows.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self> {
        let n = rows.len();
        if let Some(bad) = rows.iter().find(|row| row.len() != n) {
            return Err(Error::ShapeMismatch {
                what: "adjacency", expected: (n, n), got: (n, bad.len()) });
        }
        let flat: Vec<u8> = rows.iter().flatten().copied().collect();
        let matrix = nd::Array2::from_shape_vec((n, n), flat)
            .map_err(|e| Error::config(e.to_string()))?;
        Self::from_matrix(&matrix)
    }

    /// Resolve a configured topology for `n` qubits.
    pub fn from_spec(spec: &AdjacencySpec, n: usize) -> Result<Self> {
        let adj = match spec {
            AdjacencySpec::Isolated => Self::isolated(n),
            AdjacencySpec::Chain => Self::chain(n),
            AdjacencySpec::Ring => Self::ring(n),
            AdjacencySpec::AllToAll => Self::all_to_all(n),
            AdjacencySpec::Matrix(rows) => Self::from_rows(rows)?,
        };
        if adj.n_qubits() != n {
            return Err(Error::ShapeMismatch {
                what: "adjacency",
                expected: (n, n),
                got: (adj.n_qubits(), adj.n_qubits()),
            });
        }
        Ok(adj)
    }

    fn from_edges<I>(n: usize, edges: I) -> Self
    where I: IntoIterator<Item = (usize, usize)>
    {
        let mut matrix = nd::Array2::from_elem((n, n), false);
        edges.into_iter()
            .filter(|(i, j)| i != j)
            .for_each(|(i, j)| {
                matrix[[i, j]] = true;
                matrix[[j, i]] = true;
            });
        Self { matrix }
    }

    pub fn isolated(n: usize) -> Self { Self::from_edges(n, std::iter::empty()) }

    pub fn chain(n: usize) -> Self {
        Self::from_edges(n, (1..n).map(|i| (i - 1, i)))
    }

    /// Closed ring; with four qubits this is the square plaquette.
    pub fn ring(n: usize) -> Self {
        Self::from_edges(n, (0..n).map(|i| (i, (i + 1) % n)))
    }

    pub fn all_to_all(n: usize) -> Self {
        Self::from_edges(
            n, (0..n).flat_map(|i| (i + 1..n).map(move |j| (i, j))))
    }

    pub fn n_qubits(&self) -> usize { self.matrix.nrows() }

    pub fn is_edge(&self, i: usize, j: usize) -> bool { self.matrix[[i, j]] }

    /// Edges `(i, j)` with `i < j`, in row-major order.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        self.matrix.indexed_iter()
            .filter(|((i, j), a)| **a && i < j)
            .map(|((i, j), _)| (i, j))
            .collect()
    }

    pub fn degree(&self, q: usize) -> usize {
        self.matrix.row(q).iter().filter(|a| **a).count()
    }
}

/// Embedded single-qubit operators and per-edge coupling operators for an
/// `n`-qubit lattice.
#[derive(Clone, Debug)]
pub struct LatticeOps {
    n: usize,
    adjacency: Adjacency,
    edges: Vec<(usize, usize)>,
    pub x: Vec<nd::Array2<C64>>,
    pub y: Vec<nd::Array2<C64>>,
    pub z: Vec<nd::Array2<C64>>,
    /// Lowering operators `|0⟩⟨1|`.
    pub sm: Vec<nd::Array2<C64>>,
    /// Raising operators `|1⟩⟨0|`.
    pub sp: Vec<nd::Array2<C64>>,
    pub proj_g: Vec<nd::Array2<C64>>,
    pub proj_e: Vec<nd::Array2<C64>>,
    /// `X_i X_j + Y_i Y_j` for each edge, aligned with [`Self::edges`].
    pub cap: Vec<nd::Array2<C64>>,
    /// `Z_i Z_j` for each edge, aligned with [`Self::edges`].
    pub ind: Vec<nd::Array2<C64>>,
}

impl LatticeOps {
    /// Build all operators for `n` qubits on `adjacency`.
    pub fn new(n: usize, adjacency: &Adjacency) -> Result<Self> {
        if n == 0 {
            return Err(Error::config("lattice needs at least one qubit"));
        }
        if adjacency.n_qubits() != n {
            return Err(Error::ShapeMismatch {
                what: "adjacency",
                expected: (n, n),
                got: (adjacency.n_qubits(), adjacency.n_qubits()),
            });
        }
        let embed = |op: nd::Array2<C64>| -> Vec<nd::Array2<C64>> {
            (0..n).map(|q| hilbert::op_on_qubit(&op, q, n)).collect()
        };
        let x = embed(hilbert::sigma_x());
        let y = embed(hilbert::sigma_y());
        let z = embed(hilbert::sigma_z());
        let edges = adjacency.edges();
        let cap: Vec<nd::Array2<C64>>
            = edges.iter()
            .map(|&(i, j)| x[i].dot(&x[j]) + y[i].dot(&y[j]))
            .collect();
        let ind: Vec<nd::Array2<C64>>
            = edges.iter()
            .map(|&(i, j)| z[i].dot(&z[j]))
            .collect();
        Ok(Self {
            n,
            adjacency: adjacency.clone(),
            edges,
            x,
            y,
            z,
            sm: embed(hilbert::sigma_minus()),
            sp: embed(hilbert::sigma_plus()),
            proj_g: embed(hilbert::proj_ground()),
            proj_e: embed(hilbert::proj_excited()),
            cap,
            ind,
        })
    }

    pub fn n_qubits(&self) -> usize { self.n }

    /// Hilbert-space dimension `2^n`.
    pub fn dim(&self) -> usize { 1 << self.n }

    pub fn adjacency(&self) -> &Adjacency { &self.adjacency }

    pub fn edges(&self) -> &[(usize, usize)] { &self.edges }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ring_of_four_is_plaquette() {
        let adj = Adjacency::ring(4);
        assert_eq!(adj.edges(), vec![(0, 1), (0, 3), (1, 2), (2, 3)]);
        assert!((0..4).all(|q| adj.degree(q) == 2));
        assert_eq!(Adjacency::ring(2).edges(), vec![(0, 1)]);
        assert_eq!(Adjacency::all_to_all(4).edges().len(), 6);
        assert_eq!(Adjacency::chain(3).edges(), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn rejects_invalid_matrices() {
        let asym = nd::array![[0_u8, 1], [0, 0]];
        assert!(matches!(Adjacency::from_matrix(&asym), Err(Error::Config(_))));
        let self_loop = nd::array![[1_u8, 0], [0, 0]];
        assert!(matches!(Adjacency::from_matrix(&self_loop), Err(Error::Config(_))));
        let ragged = vec![vec![0_u8, 1], vec![1]];
        assert!(matches!(Adjacency::from_rows(&ragged), Err(Error::ShapeMismatch { .. })));
        let wrong_n = AdjacencySpec::Matrix(vec![vec![0, 1], vec![1, 0]]);
        assert!(Adjacency::from_spec(&wrong_n, 3).is_err());
        assert!(LatticeOps::new(3, &Adjacency::ring(4)).is_err());
    }

    #[test]
    fn coupling_operators_are_hermitian() {
        let ops = LatticeOps::new(3, &Adjacency::chain(3)).unwrap();
        assert_eq!(ops.dim(), 8);
        assert_eq!(ops.cap.len(), 2);
        for op in ops.cap.iter().chain(ops.ind.iter()) {
            assert_abs_diff_eq!(hilbert::hermiticity_error(op), 0.0, epsilon = 1e-14);
        }
        // XX + YY = 2(σ+σ- + σ-σ+) swaps |01⟩ and |10⟩ on the edge
        let cap01 = &ops.cap[0];
        assert_abs_diff_eq!(cap01[[0b010, 0b100]].re, 2.0);
        assert_abs_diff_eq!(cap01[[0b000, 0b000]].re, 0.0);
        // σ- lowers qubit 2: |001⟩ -> |000⟩
        assert_abs_diff_eq!(ops.sm[2][[0b000, 0b001]].re, 1.0);
        let n_e: nd::Array2<C64> = ops.sp[1].dot(&ops.sm[1]);
        assert_eq!(n_e, ops.proj_e[1]);
    }
}
