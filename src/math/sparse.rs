//! Sparse matrix utilities for the stiffness solve
//!
//! Frame stiffness matrices are banded and mostly empty. Assembly goes through
//! COO triplets into CSR, and the free-DOF block is factorized once in skyline
//! storage so every load combination reuses the same factor.

use std::collections::VecDeque;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::{CooMatrix, CsrMatrix};

/// Sparse matrix builder using COO format
/// More efficient for incremental assembly
pub struct SparseMatrixBuilder {
    size: usize,
    entries: Vec<(usize, usize, f64)>,
}

impl SparseMatrixBuilder {
    /// Create a new sparse matrix builder
    pub fn new(size: usize) -> Self {
        // A frame node couples to a handful of neighbours: 6 DOFs x ~4 nodes per row
        let estimated_nnz = size * 24;
        Self {
            size,
            entries: Vec::with_capacity(estimated_nnz),
        }
    }

    /// Add a value to the matrix (accumulates if already exists)
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        if value != 0.0 {
            self.entries.push((row, col, value));
        }
    }

    /// Scatter a dense element matrix onto the given global DOFs
    pub fn add_element_matrix<const N: usize>(
        &mut self,
        dofs: &[usize; N],
        k_elem: &nalgebra::SMatrix<f64, N, N>,
    ) {
        for (i, &di) in dofs.iter().enumerate() {
            for (j, &dj) in dofs.iter().enumerate() {
                self.add(di, dj, k_elem[(i, j)]);
            }
        }
    }

    /// Convert to CSR format, summing duplicate entries
    pub fn to_csr(&self) -> CsrMatrix<f64> {
        let mut coo = CooMatrix::new(self.size, self.size);
        for &(row, col, val) in &self.entries {
            coo.push(row, col, val);
        }
        CsrMatrix::from(&coo)
    }

    /// Convert to dense matrix (for comparison/debugging)
    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut mat = DMatrix::zeros(self.size, self.size);
        for &(row, col, val) in &self.entries {
            mat[(row, col)] += val;
        }
        mat
    }
}

/// A pivot that failed during factorization
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PivotFailure {
    /// Row of the factorized matrix where the pivot failed
    pub index: usize,
    /// Pivot after elimination divided by the original diagonal entry
    pub ratio: f64,
}

/// Skyline Cholesky factorization of a symmetric positive definite matrix
///
/// Row `i` stores the lower triangle from its first non-zero column up to the
/// diagonal. After [`factorize`](Self::factorize) the storage holds `L` with
/// `A = L * L^T`.
#[derive(Debug, Clone)]
pub struct SkylineCholesky {
    size: usize,
    rows: Vec<Vec<f64>>,
    starts: Vec<usize>,
    original_diagonal: Vec<f64>,
    /// Pivot over original diagonal entry, per row, once factorized
    pivot_ratios: Vec<f64>,
    factorized: bool,
}

impl SkylineCholesky {
    /// Load the lower triangle of a CSR matrix into skyline storage
    pub fn from_csr(csr: &CsrMatrix<f64>) -> Self {
        let size = csr.nrows();

        // First non-zero column of each row (skyline profile)
        let mut starts: Vec<usize> = (0..size).collect();
        for (row, col, _) in csr.triplet_iter() {
            if col < starts[row] {
                starts[row] = col;
            }
        }

        let mut rows: Vec<Vec<f64>> = (0..size).map(|i| vec![0.0; i - starts[i] + 1]).collect();
        let mut original_diagonal = vec![0.0; size];

        for (row, col, &val) in csr.triplet_iter() {
            if col <= row {
                rows[row][col - starts[row]] += val;
            }
            if col == row {
                original_diagonal[row] += val;
            }
        }

        Self {
            size,
            rows,
            starts,
            original_diagonal,
            pivot_ratios: Vec::new(),
            factorized: false,
        }
    }

    /// Matrix dimension
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of stored entries in the profile
    pub fn profile_len(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Factorize in place
    ///
    /// Each pivot is compared with the row's original diagonal entry. A ratio
    /// at or below `pivot_tolerance` (never less than `n * EPSILON`) has
    /// collapsed to round-off: the matrix is singular, or not positive
    /// definite, at that row.
    pub fn factorize(&mut self, pivot_tolerance: f64) -> Result<(), PivotFailure> {
        let collapse = pivot_tolerance.max(self.size as f64 * f64::EPSILON);
        let mut pivot_ratios = Vec::with_capacity(self.size);

        for i in 0..self.size {
            let start_i = self.starts[i];

            for j in start_i..i {
                let start_j = self.starts[j];
                let start = start_i.max(start_j);

                let sum: f64 = (start..j)
                    .map(|k| self.rows[i][k - start_i] * self.rows[j][k - start_j])
                    .sum();

                let diag_j = self.rows[j][j - start_j];
                let idx = j - start_i;
                self.rows[i][idx] = (self.rows[i][idx] - sum) / diag_j;
            }

            let sum: f64 = self.rows[i][..i - start_i].iter().map(|v| v * v).sum();
            let diag_idx = i - start_i;
            let pivot = self.rows[i][diag_idx] - sum;

            let reference = self.original_diagonal[i].abs();
            let ratio = if reference > 0.0 { pivot / reference } else { 0.0 };
            if !ratio.is_finite() || ratio <= collapse {
                return Err(PivotFailure { index: i, ratio });
            }

            self.rows[i][diag_idx] = pivot.sqrt();
            pivot_ratios.push(ratio);
        }

        self.pivot_ratios = pivot_ratios;
        self.factorized = true;
        Ok(())
    }

    /// Condition estimate of the factorized matrix and the row that drives it
    ///
    /// The pivot ratios are the squared diagonal of the factor of the
    /// Jacobi-scaled matrix `D^-1/2 A D^-1/2`, so the estimate is
    /// `(max L_ii / min L_ii)^2` of that factor. It does not depend on the
    /// units of the individual DOFs. `None` before factorization.
    pub fn condition_estimate(&self) -> Option<(usize, f64)> {
        let (index, smallest) = self
            .pivot_ratios
            .iter()
            .copied()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        let largest = self.pivot_ratios.iter().copied().fold(0.0_f64, f64::max);
        Some((index, largest / smallest))
    }

    /// Whether [`factorize`](Self::factorize) has completed
    pub fn is_factorized(&self) -> bool {
        self.factorized
    }

    /// Solve `L * L^T * x = b` with the factor
    pub fn solve(&self, b: &DVector<f64>) -> DVector<f64> {
        let mut x = b.clone();

        // Forward substitution: L * y = b
        for i in 0..self.size {
            let start = self.starts[i];
            let row = &self.rows[i];
            let sum: f64 = (start..i).map(|j| row[j - start] * x[j]).sum();
            x[i] = (x[i] - sum) / row[i - start];
        }

        // Backward substitution: L^T * x = y
        for i in (0..self.size).rev() {
            let start = self.starts[i];
            let row = &self.rows[i];
            x[i] /= row[i - start];
            let xi = x[i];
            for j in start..i {
                x[j] -= row[j - start] * xi;
            }
        }

        x
    }
}

/// Sparse matrix-vector multiplication
pub fn sparse_matvec(csr: &CsrMatrix<f64>, x: &DVector<f64>) -> DVector<f64> {
    let n = csr.nrows();
    let mut y = DVector::zeros(n);

    let row_offsets = csr.row_offsets();
    let col_indices = csr.col_indices();
    let values = csr.values();

    for row in 0..n {
        let start = row_offsets[row];
        let end = row_offsets[row + 1];

        let mut sum = 0.0;
        for idx in start..end {
            sum += values[idx] * x[col_indices[idx]];
        }
        y[row] = sum;
    }

    y
}

/// Bandwidth reduction using Reverse Cuthill-McKee algorithm
///
/// Returns `perm` with `perm[new] = old`. Each connected component starts
/// from its lowest-degree row.
pub fn reverse_cuthill_mckee(csr: &CsrMatrix<f64>) -> Vec<usize> {
    let n = csr.nrows();
    if n == 0 {
        return vec![];
    }

    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (row, col, &val) in csr.triplet_iter() {
        if val != 0.0 && row != col {
            adj[row].push(col);
        }
    }

    let degrees: Vec<usize> = adj.iter().map(Vec::len).collect();
    for neighbors in &mut adj {
        neighbors.sort_by_key(|&i| (degrees[i], i));
        neighbors.dedup();
    }

    let mut by_degree: Vec<usize> = (0..n).collect();
    by_degree.sort_by_key(|&i| (degrees[i], i));

    let mut visited = vec![false; n];
    let mut result = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    for &seed in &by_degree {
        if visited[seed] {
            continue;
        }
        visited[seed] = true;
        queue.push_back(seed);

        while let Some(node) = queue.pop_front() {
            result.push(node);
            for &neighbor in &adj[node] {
                if !visited[neighbor] {
                    visited[neighbor] = true;
                    queue.push_back(neighbor);
                }
            }
        }
    }

    result.reverse();
    result
}

/// Inverse permutation, `inv[old] = new`
fn inverse_permutation(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; perm.len()];
    for (new_idx, &old_idx) in perm.iter().enumerate() {
        inv[old_idx] = new_idx;
    }
    inv
}

/// Symmetric permutation `P A P^T` of a square CSR matrix, `perm[new] = old`
pub fn permute_symmetric(csr: &CsrMatrix<f64>, perm: &[usize]) -> CsrMatrix<f64> {
    let inv = inverse_permutation(perm);
    let mut coo = CooMatrix::new(csr.nrows(), csr.ncols());
    for (row, col, &val) in csr.triplet_iter() {
        coo.push(inv[row], inv[col], val);
    }
    CsrMatrix::from(&coo)
}
