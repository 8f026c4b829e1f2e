//! Factorization of the free-DOF stiffness and per-combination solves

use log::debug;
use nalgebra_sparse::CsrMatrix;

use crate::error::{FEAError, FEAResult};
use crate::math::sparse::{permute_symmetric, sparse_matvec, PivotFailure};
use crate::math::{reverse_cuthill_mckee, DVec, SkylineCholesky};

/// `K_ff` factorized once and shared by every load combination
#[derive(Debug, Clone)]
pub(crate) struct FactorizedStiffness {
    k_ff: CsrMatrix<f64>,
    norm: f64,
    /// `permutation[new] = old`, if the matrix was reordered
    permutation: Option<Vec<usize>>,
    cholesky: SkylineCholesky,
}

impl FactorizedStiffness {
    /// Factorize `K_ff`
    ///
    /// A failed pivot is reported with its index in the original free-DOF numbering.
    pub fn new(k_ff: CsrMatrix<f64>, reorder: bool, pivot_tolerance: f64) -> Result<Self, PivotFailure> {
        let permutation = reorder.then(|| reverse_cuthill_mckee(&k_ff));

        let mut cholesky = match &permutation {
            Some(perm) => SkylineCholesky::from_csr(&permute_symmetric(&k_ff, perm)),
            None => SkylineCholesky::from_csr(&k_ff),
        };

        debug!(
            "Factorizing {} free DOFs ({} profile entries, reordered: {})",
            cholesky.size(),
            cholesky.profile_len(),
            reorder
        );

        cholesky.factorize(pivot_tolerance).map_err(|failure| PivotFailure {
            index: permutation
                .as_ref()
                .map_or(failure.index, |perm| perm[failure.index]),
            ratio: failure.ratio,
        })?;

        let norm = infinity_norm(&k_ff);
        Ok(Self {
            k_ff,
            norm,
            permutation,
            cholesky,
        })
    }

    /// Condition estimate of the factor and the free DOF (original numbering)
    /// with the smallest scaled pivot
    pub fn condition_estimate(&self) -> Option<(usize, f64)> {
        let (index, estimate) = self.cholesky.condition_estimate()?;
        let index = self.permutation.as_ref().map_or(index, |perm| perm[index]);
        Some((index, estimate))
    }

    /// Solve `K_ff d = f` and check the normwise backward error
    pub fn solve(&self, f: &DVec, residual_tolerance: f64) -> FEAResult<DVec> {
        if f.iter().any(|v| !v.is_finite()) {
            return Err(FEAError::Numerical("load vector contains non-finite values".to_string()));
        }

        let d = match &self.permutation {
            Some(perm) => {
                let pf = DVec::from_fn(perm.len(), |i, _| f[perm[i]]);
                let pd = self.cholesky.solve(&pf);
                let mut d = DVec::zeros(perm.len());
                for (new, &old) in perm.iter().enumerate() {
                    d[old] = pd[new];
                }
                d
            }
            None => self.cholesky.solve(f),
        };

        if d.iter().any(|v| !v.is_finite()) {
            return Err(FEAError::Numerical("displacements are not finite".to_string()));
        }

        let residual = sparse_matvec(&self.k_ff, &d) - f;
        let scale = self.norm * d.amax() + f.amax();
        if scale > 0.0 {
            let error = residual.amax() / scale;
            if error > residual_tolerance {
                return Err(FEAError::Numerical(format!(
                    "relative residual {error:.3e} exceeds tolerance {residual_tolerance:.1e}"
                )));
            }
        }

        Ok(d)
    }
}

/// Largest absolute row sum
fn infinity_norm(k: &CsrMatrix<f64>) -> f64 {
    k.row_iter()
        .map(|row| row.values().iter().map(|v| v.abs()).sum::<f64>())
        .fold(0.0, f64::max)
}
