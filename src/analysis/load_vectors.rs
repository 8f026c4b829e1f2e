//! Load case vectors and combination
//!
//! Member loads are resolved into local components once per analysis. Each
//! load case then holds its global nodal load vector (direct node loads plus
//! equivalent member loads) and the fixed end reactions of every member, so a
//! combination is only a factor-weighted sum.

use std::collections::HashMap;

use crate::error::{FEAError, FEAResult};
use crate::loads::LoadCombination;
use crate::math::{self, DVec, Vec12, Vec3};
use crate::model::FEModel;

use super::assembly::MemberFrame;

/// A linearly varying distributed force in local axes
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LinearLoad {
    pub x1: f64,
    pub x2: f64,
    pub w1: Vec3,
    pub w2: Vec3,
}

/// Loads acting along one member, in local axes
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct LocalMemberLoads {
    pub point_forces: Vec<(f64, Vec3)>,
    pub point_moments: Vec<(f64, Vec3)>,
    pub linear: Vec<LinearLoad>,
}

impl LocalMemberLoads {
    fn extend_scaled(&mut self, other: &LocalMemberLoads, factor: f64) {
        self.point_forces
            .extend(other.point_forces.iter().map(|&(a, p)| (a, p * factor)));
        self.point_moments
            .extend(other.point_moments.iter().map(|&(a, m)| (a, m * factor)));
        self.linear.extend(other.linear.iter().map(|load| LinearLoad {
            w1: load.w1 * factor,
            w2: load.w2 * factor,
            ..*load
        }));
    }

    /// Fixed end reactions of a member clamped at both ends, before releases
    fn fixed_end_reactions(&self, length: f64) -> Vec12 {
        let mut fer = Vec12::zeros();
        for &(a, p) in &self.point_forces {
            for axis in 0..3 {
                if p[axis] != 0.0 {
                    fer += math::fer_point_force(axis, p[axis], a, length);
                }
            }
        }
        for &(a, m) in &self.point_moments {
            for axis in 0..3 {
                if m[axis] != 0.0 {
                    fer += math::fer_point_moment(axis, m[axis], a, length);
                }
            }
        }
        for load in &self.linear {
            for axis in 0..3 {
                if load.w1[axis] != 0.0 || load.w2[axis] != 0.0 {
                    fer += math::fer_linear_load(axis, load.w1[axis], load.w2[axis], load.x1, load.x2, length);
                }
            }
        }
        fer
    }
}

/// Loads of one case, or of a combination of cases
#[derive(Debug, Clone)]
pub(crate) struct CombinedLoads {
    /// Global nodal loads: direct node loads minus `T^T fer` of every member
    pub nodal: DVec,
    /// Fixed end reactions per member, local axes, before releases
    pub fixed_end: Vec<Vec12>,
    /// Fixed end reactions per member, local axes, released DOFs condensed out
    pub condensed: Vec<Vec12>,
    /// Member loads per member, local axes
    pub member_loads: Vec<LocalMemberLoads>,
}

impl CombinedLoads {
    fn zeros(num_dofs: usize, num_members: usize) -> Self {
        Self {
            nodal: DVec::zeros(num_dofs),
            fixed_end: vec![Vec12::zeros(); num_members],
            condensed: vec![Vec12::zeros(); num_members],
            member_loads: vec![LocalMemberLoads::default(); num_members],
        }
    }

    fn add_scaled(&mut self, other: &CombinedLoads, factor: f64) {
        self.nodal.axpy(factor, &other.nodal, 1.0);
        for (mine, theirs) in self.fixed_end.iter_mut().zip(&other.fixed_end) {
            *mine += theirs * factor;
        }
        for (mine, theirs) in self.condensed.iter_mut().zip(&other.condensed) {
            *mine += theirs * factor;
        }
        for (mine, theirs) in self.member_loads.iter_mut().zip(&other.member_loads) {
            mine.extend_scaled(theirs, factor);
        }
    }
}

/// Per-case load data for one analysis
#[derive(Debug, Clone)]
pub(crate) struct LoadTable {
    num_dofs: usize,
    num_members: usize,
    cases: Vec<CombinedLoads>,
    case_index: HashMap<String, usize>,
}

impl LoadTable {
    pub fn build(model: &FEModel, frames: &[MemberFrame]) -> Self {
        let num_dofs = model.num_dofs();
        let num_members = frames.len();
        let case_index: HashMap<String, usize> = model
            .load_cases()
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut cases = vec![CombinedLoads::zeros(num_dofs, num_members); case_index.len()];

        for (member, load) in model.point_loads() {
            let Some(&case) = case_index.get(&load.case) else {
                continue;
            };
            let frame = &frames[member.index()];
            let local = load.direction.local_components(load.magnitude, &frame.rotation);
            let loads = &mut cases[case].member_loads[member.index()];
            if load.direction.is_force() {
                loads.point_forces.push((load.position, local));
            } else {
                loads.point_moments.push((load.position, local));
            }
        }

        for (member, load) in model.dist_loads() {
            let Some(&case) = case_index.get(&load.case) else {
                continue;
            };
            let frame = &frames[member.index()];
            cases[case].member_loads[member.index()].linear.push(LinearLoad {
                x1: load.x1,
                x2: load.x2,
                w1: load.direction.local_components(load.w1, &frame.rotation),
                w2: load.direction.local_components(load.w2, &frame.rotation),
            });
        }

        for case in &mut cases {
            for (m, frame) in frames.iter().enumerate() {
                let fer = case.member_loads[m].fixed_end_reactions(frame.length);
                let condensed = frame.condensation.condense_fer(&fer);
                let fer_global = frame.transform.transpose() * condensed;
                for (k, &dof) in frame.dofs.iter().enumerate() {
                    case.nodal[dof] -= fer_global[k];
                }
                case.fixed_end[m] = fer;
                case.condensed[m] = condensed;
            }
        }

        for (node, load) in model.node_loads() {
            let Some(&case) = case_index.get(&load.case) else {
                continue;
            };
            for (k, value) in load.as_array().iter().enumerate() {
                cases[case].nodal[node.first_dof() + k] += value;
            }
        }

        Self {
            num_dofs,
            num_members,
            cases,
            case_index,
        }
    }

    /// Factor-weighted sum of the cases of a combination
    pub fn combine(&self, combo: &LoadCombination) -> FEAResult<CombinedLoads> {
        let mut combined = CombinedLoads::zeros(self.num_dofs, self.num_members);
        for (case, factor) in &combo.factors {
            let index = *self
                .case_index
                .get(case)
                .ok_or_else(|| FEAError::LoadCaseNotFound(case.clone()))?;
            if *factor != 0.0 {
                combined.add_scaled(&self.cases[index], *factor);
            }
        }
        Ok(combined)
    }
}
