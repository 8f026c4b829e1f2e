//! Linear static analysis: options, assembly, solving and result recovery

pub(crate) mod assembly;
pub(crate) mod load_vectors;
pub(crate) mod partition;
pub(crate) mod solver;
mod statics;

pub use statics::StaticsCheck;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use nalgebra_sparse::CsrMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};
use crate::loads::LoadCombination;
use crate::math::sparse::sparse_matvec;
use crate::math::{DVec, Vec12};
use crate::model::FEModel;
use crate::results::diagram::MemberDiagram;
use crate::results::{AnalysisResults, ComboResults, MemberResults, NodeDisplacement, Reactions};

use assembly::MemberFrame;
use load_vectors::LoadTable;
use partition::DofPartition;
use solver::FactorizedStiffness;

/// Options for structural analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Check static equilibrium after solving each combination
    pub check_statics: bool,
    /// Turn statics-check failures into an error
    pub strict_statics: bool,
    /// Relative tolerance of the statics check
    pub statics_tolerance: f64,
    /// Pivot, relative to its diagonal entry, at or below which a DOF is a mechanism
    pub pivot_tolerance: f64,
    /// Largest accepted condition estimate of the scaled stiffness factor
    pub condition_tolerance: f64,
    /// Largest accepted normwise backward error of a solve
    pub residual_tolerance: f64,
    /// Reorder free DOFs with reverse Cuthill-McKee before factorizing
    pub reorder: bool,
    /// Solve load combinations on the rayon thread pool
    pub parallel: bool,
    /// Load combination tags to analyze (None = all)
    pub combo_tags: Option<Vec<String>>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            check_statics: false,
            strict_statics: false,
            statics_tolerance: 1e-6,
            pivot_tolerance: 1e-14,
            condition_tolerance: 1e10,
            residual_tolerance: 1e-9,
            reorder: true,
            parallel: true,
            combo_tags: None,
        }
    }
}

impl AnalysisOptions {
    /// Create options for linear analysis
    pub fn linear() -> Self {
        Self::default()
    }

    /// Run the statics check after solving
    pub fn with_statics_check(mut self) -> Self {
        self.check_statics = true;
        self
    }

    /// Run the statics check and fail the analysis if it does not pass
    pub fn with_strict_statics(mut self) -> Self {
        self.check_statics = true;
        self.strict_statics = true;
        self
    }

    /// Set the statics check tolerance
    pub fn with_statics_tolerance(mut self, tol: f64) -> Self {
        self.statics_tolerance = tol;
        self
    }

    /// Set the pivot tolerance
    pub fn with_pivot_tolerance(mut self, tol: f64) -> Self {
        self.pivot_tolerance = tol;
        self
    }

    /// Set the condition tolerance
    pub fn with_condition_tolerance(mut self, tol: f64) -> Self {
        self.condition_tolerance = tol;
        self
    }

    /// Set the residual tolerance
    pub fn with_residual_tolerance(mut self, tol: f64) -> Self {
        self.residual_tolerance = tol;
        self
    }

    /// Enable or disable bandwidth reordering
    pub fn with_reorder(mut self, reorder: bool) -> Self {
        self.reorder = reorder;
        self
    }

    /// Solve combinations one after another on the calling thread
    pub fn serial(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Filter by combo tags
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.combo_tags = Some(tags);
        self
    }
}

/// Shared flag to stop an analysis between load combinations
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; combinations already solved are kept
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An assembled and factorized model, ready to solve load combinations
///
/// Solving borrows the analysis immutably, so combinations can be solved
/// from several threads against the same factorization.
pub struct Analysis<'m> {
    model: &'m FEModel,
    options: AnalysisOptions,
    frames: Vec<MemberFrame>,
    partition: DofPartition,
    k_pf: CsrMatrix<f64>,
    factor: Option<FactorizedStiffness>,
    loads: LoadTable,
}

impl<'m> Analysis<'m> {
    /// Assemble the global stiffness, partition it and factorize `K_ff`
    pub fn new(model: &'m FEModel, options: AnalysisOptions) -> FEAResult<Self> {
        if model.num_nodes() == 0 {
            return Err(FEAError::InvalidInput("model has no nodes".to_string()));
        }

        let frames = assembly::member_frames(model)?;
        let k = assembly::assemble_stiffness(&frames, model.num_dofs());
        let partition = DofPartition::new(model);

        info!(
            "Assembled {} members: {} DOFs ({} free, {} restrained)",
            frames.len(),
            model.num_dofs(),
            partition.num_free(),
            partition.restrained.len()
        );

        let (k_ff, k_pf) = partition.split(&k);

        let factor = if partition.num_free() == 0 {
            None
        } else {
            let unstiffened = partition.unstiffened_dofs(&k_ff, options.pivot_tolerance);
            if !unstiffened.is_empty() {
                return Err(FEAError::Unstable {
                    dofs: unstiffened.iter().filter_map(|&dof| model.dof_label(dof)).collect(),
                    detail: "free DOFs with no stiffness".to_string(),
                });
            }

            let factor = FactorizedStiffness::new(k_ff, options.reorder, options.pivot_tolerance)
                .map_err(|failure| FEAError::Unstable {
                    dofs: model
                        .dof_label(partition.free[failure.index])
                        .into_iter()
                        .collect(),
                    detail: format!("stiffness matrix is singular (pivot ratio {:.3e})", failure.ratio),
                })?;

            if let Some((index, estimate)) = factor.condition_estimate() {
                debug!("Stiffness condition estimate {:.3e}", estimate);
                if estimate > options.condition_tolerance {
                    let dof = model
                        .dof_label(partition.free[index])
                        .map_or_else(|| format!("free DOF {index}"), |dof| dof.to_string());
                    return Err(FEAError::Numerical(format!(
                        "stiffness matrix is ill-conditioned at {dof}: condition estimate {estimate:.3e} exceeds {:.1e}",
                        options.condition_tolerance
                    )));
                }
            }
            Some(factor)
        };

        let loads = LoadTable::build(model, &frames);

        Ok(Self {
            model,
            options,
            frames,
            partition,
            k_pf,
            factor,
            loads,
        })
    }

    pub fn options(&self) -> &AnalysisOptions {
        &self.options
    }

    /// Number of free DOFs
    pub fn num_free_dofs(&self) -> usize {
        self.partition.num_free()
    }

    /// Load combinations an analysis run solves, in definition order
    ///
    /// Falls back to `"Combo 1"` = `"Case 1"` when the model defines none.
    pub fn combinations(&self) -> Vec<LoadCombination> {
        let combos = self.model.combos();
        if combos.is_empty() {
            let default = LoadCombination::default();
            if self.model.has_load_case("Case 1") {
                return vec![default];
            }
            return vec![LoadCombination::new(&default.name)];
        }

        combos
            .iter()
            .filter(|combo| match &self.options.combo_tags {
                Some(tags) => combo.has_any_tag(tags),
                None => true,
            })
            .cloned()
            .collect()
    }

    /// Solve one load combination against the shared factorization
    pub fn solve_combination(&self, combo: &LoadCombination) -> FEAResult<ComboResults> {
        let loads = self.loads.combine(combo)?;

        let f_free = self.partition.free_part(&loads.nodal);
        let d_free = match &self.factor {
            Some(factor) => factor.solve(&f_free, self.options.residual_tolerance)?,
            None => DVec::zeros(0),
        };
        let d = self.partition.expand_free(&d_free);

        let r_restrained = sparse_matvec(&self.k_pf, &d_free) - self.partition.restrained_part(&loads.nodal);
        let reactions = self.partition.expand_restrained(&r_restrained);

        let displacements = (0..self.model.num_nodes())
            .map(|n| NodeDisplacement::from_slice(&d.as_slice()[n * 6..n * 6 + 6]))
            .collect();
        let node_reactions = (0..self.model.num_nodes())
            .map(|n| Reactions::from_slice(&reactions.as_slice()[n * 6..n * 6 + 6]))
            .collect();

        let members = self
            .frames
            .iter()
            .enumerate()
            .map(|(m, frame)| {
                let d_local = frame.local_displacements(&d);
                let forces = frame.end_forces(&d_local, &loads.condensed[m]);
                let end_displacements = frame
                    .condensation
                    .recover_displacements(&d_local, &loads.fixed_end[m]);
                let global_forces = frame.transform.transpose() * forces;
                let diagram = MemberDiagram::new(
                    frame.length,
                    frame.rigidity,
                    &forces,
                    &end_displacements,
                    &loads.member_loads[m],
                );
                MemberResults {
                    local_end_forces: to_array(&forces),
                    global_end_forces: to_array(&global_forces),
                    local_end_displacements: to_array(&end_displacements),
                    diagram,
                }
            })
            .collect();

        let statics = if self.options.check_statics {
            let check = statics::check_statics(
                self.model,
                &combo.name,
                &loads.nodal,
                &reactions,
                self.options.statics_tolerance,
            );
            if !check.passed {
                warn!(
                    "Statics check failed for '{}': force residual {:?}, moment residual {:?}",
                    combo.name, check.force_residual, check.moment_residual
                );
            }
            Some(check)
        } else {
            None
        };

        debug!("Solved load combination '{}'", combo.name);

        Ok(ComboResults {
            name: combo.name.clone(),
            displacements,
            reactions: node_reactions,
            members,
            statics,
        })
    }

    /// Solve every selected load combination
    ///
    /// `cancel` is checked before each combination starts. A cancelled run
    /// returns the combinations that completed, flagged as cancelled.
    pub fn solve_all(&self, cancel: &CancelToken) -> FEAResult<AnalysisResults> {
        let combos = self.combinations();
        info!(
            "Solving {} load combination(s){}",
            combos.len(),
            if self.options.parallel { " in parallel" } else { "" }
        );

        let solve = |combo: &LoadCombination| {
            if cancel.is_cancelled() {
                None
            } else {
                Some(self.solve_combination(combo))
            }
        };

        let outcomes: Vec<Option<FEAResult<ComboResults>>> = if self.options.parallel {
            combos.par_iter().map(solve).collect()
        } else {
            combos.iter().map(solve).collect()
        };

        let mut solved = Vec::with_capacity(outcomes.len());
        let mut cancelled = false;
        for outcome in outcomes {
            match outcome {
                Some(result) => solved.push(result?),
                None => cancelled = true,
            }
        }

        if cancelled {
            warn!(
                "Analysis cancelled after {} of {} load combination(s)",
                solved.len(),
                combos.len()
            );
        }

        if self.options.strict_statics {
            let failures: Vec<StaticsCheck> = solved
                .iter()
                .filter_map(|combo| combo.statics.as_ref())
                .filter(|check| !check.passed)
                .cloned()
                .collect();
            if !failures.is_empty() {
                return Err(FEAError::StaticsCheckFailed(failures));
            }
        }

        info!("Analysis complete: {} load combination(s) solved", solved.len());

        Ok(AnalysisResults::new(
            self.model,
            solved,
            self.partition.num_free(),
            cancelled,
        ))
    }
}

fn to_array(v: &Vec12) -> [f64; 12] {
    std::array::from_fn(|k| v[k])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Material, Member, Node, Section, Support};
    use crate::error::{DofComponent, ErrorKind};
    use crate::loads::NodeLoad;

    fn cantilever() -> FEModel {
        let mut model = FEModel::new();
        model.add_material("Steel", Material::new(200e6, 77e6, 0.3, 7.85)).unwrap();
        model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("N2", Node::new(10.0, 0.0, 0.0)).unwrap();
        model
            .add_member("M1", Member::new("N1", "N2", "Steel", Section::rectangular(0.3, 0.5)))
            .unwrap();
        model
    }

    #[test]
    fn test_default_combination() {
        let mut model = cantilever();
        model.add_support("N1", Support::fixed()).unwrap();
        model.add_node_load("N2", NodeLoad::fy(-10.0, "Case 1")).unwrap();

        let analysis = model.prepare(&AnalysisOptions::default()).unwrap();
        let combos = analysis.combinations();
        assert_eq!(combos.len(), 1);
        assert_eq!(combos[0].name, "Combo 1");
        assert_eq!(analysis.num_free_dofs(), 6);
    }

    #[test]
    fn test_unsupported_model_is_unstable() {
        let model = cantilever();
        let err = model.analyze_linear().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Instability);
        assert!(!err.unstable_dofs().is_empty());
    }

    #[test]
    fn test_torsional_mechanism_names_dof() {
        let mut model = cantilever();
        model.add_support("N1", Support::pinned()).unwrap();
        model.add_support("N2", Support::with_restraints(false, true, true, false, false, false)).unwrap();

        let err = model.analyze_linear().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Instability);
        assert!(err
            .unstable_dofs()
            .iter()
            .all(|dof| dof.component == DofComponent::RX));
    }

    #[test]
    fn test_tag_filter() {
        let mut model = cantilever();
        model.add_support("N1", Support::fixed()).unwrap();
        model.add_node_load("N2", NodeLoad::fy(-10.0, "D")).unwrap();
        model.add_load_combo(LoadCombination::single("D", "D").with_tag("service")).unwrap();
        model.add_load_combo(LoadCombination::new("1.4D").with_case("D", 1.4).with_tag("strength")).unwrap();

        let options = AnalysisOptions::default().with_tags(vec!["strength".to_string()]);
        let results = model.analyze(&options).unwrap();
        assert_eq!(results.combo_names(), vec!["1.4D".to_string()]);
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut model = cantilever();
        model.add_support("N1", Support::fixed()).unwrap();
        model.add_node_load("N2", NodeLoad::fy(-10.0, "D")).unwrap();
        model.add_load_combo(LoadCombination::single("D", "D")).unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let results = model.analyze_with_cancel(&AnalysisOptions::default(), &cancel).unwrap();
        assert!(results.is_cancelled());
        assert!(results.combo_names().is_empty());
    }
}
