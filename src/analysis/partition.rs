//! Free / restrained DOF partitioning

use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::math::DVec;
use crate::model::FEModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Free(usize),
    Restrained(usize),
}

/// Split of the global DOFs into free and restrained sets, both in ascending order
#[derive(Debug, Clone)]
pub(crate) struct DofPartition {
    pub free: Vec<usize>,
    pub restrained: Vec<usize>,
    slots: Vec<Slot>,
}

impl DofPartition {
    pub fn new(model: &FEModel) -> Self {
        let mut free = Vec::new();
        let mut restrained = Vec::new();
        let mut slots = Vec::with_capacity(model.num_dofs());

        for (node, support) in model.supports_by_index().iter().enumerate() {
            let flags = support.map(|s| s.as_array()).unwrap_or([false; 6]);
            for (offset, &is_restrained) in flags.iter().enumerate() {
                let dof = node * 6 + offset;
                if is_restrained {
                    slots.push(Slot::Restrained(restrained.len()));
                    restrained.push(dof);
                } else {
                    slots.push(Slot::Free(free.len()));
                    free.push(dof);
                }
            }
        }

        Self {
            free,
            restrained,
            slots,
        }
    }

    pub fn num_free(&self) -> usize {
        self.free.len()
    }

    /// Extract `K_ff` (free x free) and `K_pf` (restrained x free)
    pub fn split(&self, k: &CsrMatrix<f64>) -> (CsrMatrix<f64>, CsrMatrix<f64>) {
        let nf = self.free.len();
        let np = self.restrained.len();
        let mut k_ff = CooMatrix::new(nf, nf);
        let mut k_pf = CooMatrix::new(np, nf);

        for (row, col, &val) in k.triplet_iter() {
            match (self.slots[row], self.slots[col]) {
                (Slot::Free(r), Slot::Free(c)) => k_ff.push(r, c, val),
                (Slot::Restrained(r), Slot::Free(c)) => k_pf.push(r, c, val),
                _ => {}
            }
        }

        (CsrMatrix::from(&k_ff), CsrMatrix::from(&k_pf))
    }

    /// Entries of a global vector at the free DOFs
    pub fn free_part(&self, v: &DVec) -> DVec {
        DVec::from_fn(self.free.len(), |i, _| v[self.free[i]])
    }

    /// Entries of a global vector at the restrained DOFs
    pub fn restrained_part(&self, v: &DVec) -> DVec {
        DVec::from_fn(self.restrained.len(), |i, _| v[self.restrained[i]])
    }

    /// Global vector holding `free_values` at the free DOFs and zero elsewhere
    pub fn expand_free(&self, free_values: &DVec) -> DVec {
        let mut full = DVec::zeros(self.slots.len());
        for (i, &dof) in self.free.iter().enumerate() {
            full[dof] = free_values[i];
        }
        full
    }

    /// Global vector holding `restrained_values` at the restrained DOFs and zero elsewhere
    pub fn expand_restrained(&self, restrained_values: &DVec) -> DVec {
        let mut full = DVec::zeros(self.slots.len());
        for (i, &dof) in self.restrained.iter().enumerate() {
            full[dof] = restrained_values[i];
        }
        full
    }

    /// Global indices of free DOFs whose diagonal stiffness is negligible
    ///
    /// These have no stiffness at all, e.g. a node no member reaches or a
    /// rotation every connected member releases.
    pub fn unstiffened_dofs(&self, k_ff: &CsrMatrix<f64>, tolerance: f64) -> Vec<usize> {
        let mut diagonal = vec![0.0; self.free.len()];
        for (row, col, &val) in k_ff.triplet_iter() {
            if row == col {
                diagonal[row] += val;
            }
        }

        let largest = diagonal.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let threshold = tolerance * largest;

        diagonal
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v <= threshold)
            .map(|(i, _)| self.free[i])
            .collect()
    }
}
