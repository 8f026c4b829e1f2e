//! Result types for FEA analysis

pub mod diagram;

pub use diagram::{MemberDiagram, Quantity, Samples, SectionRigidity};

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::analysis::StaticsCheck;
use crate::error::{FEAError, FEAResult};
use crate::model::FEModel;

/// Slack allowed when a queried position lands just outside a member
const POSITION_TOLERANCE: f64 = 1e-9;

/// Displacement results at a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeDisplacement {
    /// Displacement in X direction
    pub dx: f64,
    /// Displacement in Y direction
    pub dy: f64,
    /// Displacement in Z direction
    pub dz: f64,
    /// Rotation about X axis
    pub rx: f64,
    /// Rotation about Y axis
    pub ry: f64,
    /// Rotation about Z axis
    pub rz: f64,
}

impl NodeDisplacement {
    /// Create from array [DX, DY, DZ, RX, RY, RZ]
    pub fn from_array(arr: [f64; 6]) -> Self {
        Self {
            dx: arr[0],
            dy: arr[1],
            dz: arr[2],
            rx: arr[3],
            ry: arr[4],
            rz: arr[5],
        }
    }

    pub(crate) fn from_slice(values: &[f64]) -> Self {
        Self::from_array(std::array::from_fn(|k| values[k]))
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.dx, self.dy, self.dz, self.rx, self.ry, self.rz]
    }

    /// Get translation magnitude
    pub fn translation_magnitude(&self) -> f64 {
        (self.dx.powi(2) + self.dy.powi(2) + self.dz.powi(2)).sqrt()
    }

    /// Get rotation magnitude
    pub fn rotation_magnitude(&self) -> f64 {
        (self.rx.powi(2) + self.ry.powi(2) + self.rz.powi(2)).sqrt()
    }
}

/// Reaction forces at a node, zero where the node is not restrained
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reactions {
    pub fx: f64,
    pub fy: f64,
    pub fz: f64,
    pub mx: f64,
    pub my: f64,
    pub mz: f64,
}

impl Reactions {
    /// Create from array [FX, FY, FZ, MX, MY, MZ]
    pub fn from_array(arr: [f64; 6]) -> Self {
        Self {
            fx: arr[0],
            fy: arr[1],
            fz: arr[2],
            mx: arr[3],
            my: arr[4],
            mz: arr[5],
        }
    }

    pub(crate) fn from_slice(values: &[f64]) -> Self {
        Self::from_array(std::array::from_fn(|k| values[k]))
    }

    pub fn as_array(&self) -> [f64; 6] {
        [self.fx, self.fy, self.fz, self.mx, self.my, self.mz]
    }

    /// Get total force magnitude
    pub fn force_magnitude(&self) -> f64 {
        (self.fx.powi(2) + self.fy.powi(2) + self.fz.powi(2)).sqrt()
    }

    /// Get total moment magnitude
    pub fn moment_magnitude(&self) -> f64 {
        (self.mx.powi(2) + self.my.powi(2) + self.mz.powi(2)).sqrt()
    }
}

/// Internal actions at one section of a member, in local axes
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MemberForces {
    /// Axial force (positive = tension)
    pub axial: f64,
    /// Shear force in local y direction
    pub shear_y: f64,
    /// Shear force in local z direction
    pub shear_z: f64,
    /// Torsion
    pub torsion: f64,
    /// Bending moment about local y axis
    pub moment_y: f64,
    /// Bending moment about local z axis
    pub moment_z: f64,
}

impl MemberForces {
    fn from_diagram(diagram: &MemberDiagram, x: f64) -> Self {
        Self {
            axial: diagram.value(Quantity::Axial, x),
            shear_y: diagram.value(Quantity::ShearY, x),
            shear_z: diagram.value(Quantity::ShearZ, x),
            torsion: diagram.value(Quantity::Torque, x),
            moment_y: diagram.value(Quantity::MomentY, x),
            moment_z: diagram.value(Quantity::MomentZ, x),
        }
    }
}

/// Results of one member for one load combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberResults {
    /// End forces in local axes, i-node block then j-node block
    pub local_end_forces: [f64; 12],
    /// End forces in global axes
    pub global_end_forces: [f64; 12],
    /// End displacements in local axes, released DOFs recovered
    pub local_end_displacements: [f64; 12],
    pub diagram: MemberDiagram,
}

/// Results of one load combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboResults {
    pub name: String,
    /// Per node, in model order
    pub displacements: Vec<NodeDisplacement>,
    /// Per node, in model order
    pub reactions: Vec<Reactions>,
    /// Per member, in model order
    pub members: Vec<MemberResults>,
    /// Present when the statics check was requested
    pub statics: Option<StaticsCheck>,
}

/// Largest and smallest value of a member quantity over all load combinations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub quantity: Quantity,
    pub max: f64,
    pub max_x: f64,
    pub max_combo: String,
    pub min: f64,
    pub min_x: f64,
    pub min_combo: String,
}

/// Summary of analysis results for one load combination
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub combo: String,
    /// Maximum translation magnitude
    pub max_displacement: f64,
    /// Node with maximum displacement
    pub max_disp_node: String,
    /// Maximum reaction force magnitude
    pub max_reaction: f64,
    /// Node with maximum reaction
    pub max_reaction_node: String,
    /// Maximum absolute member axial force
    pub max_axial: f64,
    /// Member with maximum axial
    pub max_axial_member: String,
    /// Maximum absolute bending moment about either local axis
    pub max_moment: f64,
    /// Member with maximum moment
    pub max_moment_member: String,
    /// Total number of nodes
    pub num_nodes: usize,
    /// Total number of members
    pub num_members: usize,
    /// Total DOFs
    pub total_dofs: usize,
    /// Free DOFs (unknown)
    pub free_dofs: usize,
}

/// The result set of one analysis run
///
/// Owned by the caller and independent of the model it came from;
/// [`AnalysisResults::is_current`] tells whether the model has changed since.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResults {
    revision: u64,
    node_names: Vec<String>,
    node_index: HashMap<String, usize>,
    member_names: Vec<String>,
    member_index: HashMap<String, usize>,
    combos: Vec<ComboResults>,
    combo_index: HashMap<String, usize>,
    total_dofs: usize,
    free_dofs: usize,
    cancelled: bool,
}

impl AnalysisResults {
    pub(crate) fn new(model: &FEModel, combos: Vec<ComboResults>, free_dofs: usize, cancelled: bool) -> Self {
        let node_names = model.node_names().to_vec();
        let member_names: Vec<String> = model.members().map(|(name, _)| name.to_string()).collect();
        let index = |names: &[String]| -> HashMap<String, usize> {
            names.iter().enumerate().map(|(i, n)| (n.clone(), i)).collect()
        };
        let combo_index = combos
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();

        Self {
            revision: model.revision(),
            node_index: index(&node_names),
            member_index: index(&member_names),
            node_names,
            member_names,
            combos,
            combo_index,
            total_dofs: model.num_dofs(),
            free_dofs,
            cancelled,
        }
    }

    // ========================
    // Run metadata
    // ========================

    /// Model revision the results were computed from
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True if `model` has not been modified since these results were computed
    pub fn is_current(&self, model: &FEModel) -> bool {
        model.revision() == self.revision
    }

    /// True if the run was cancelled before every combination was solved
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Names of the solved combinations, in definition order
    pub fn combo_names(&self) -> Vec<String> {
        self.combos.iter().map(|c| c.name.clone()).collect()
    }

    pub fn combo(&self, name: &str) -> FEAResult<&ComboResults> {
        self.combo_index
            .get(name)
            .map(|&i| &self.combos[i])
            .ok_or_else(|| FEAError::LoadCombinationNotFound(name.to_string()))
    }

    pub fn combos(&self) -> &[ComboResults] {
        &self.combos
    }

    // ========================
    // Node results
    // ========================

    /// Displacement of a node under a combination
    pub fn node_displacement(&self, combo: &str, node: &str) -> FEAResult<NodeDisplacement> {
        let index = self.node(node)?;
        Ok(self.combo(combo)?.displacements[index])
    }

    /// Reactions at a node under a combination (zero for unsupported nodes)
    pub fn node_reaction(&self, combo: &str, node: &str) -> FEAResult<Reactions> {
        let index = self.node(node)?;
        Ok(self.combo(combo)?.reactions[index])
    }

    // ========================
    // Member results
    // ========================

    /// Local end forces `[Fx_i, Fy_i, Fz_i, Mx_i, My_i, Mz_i, Fx_j, ..., Mz_j]`
    pub fn member_end_forces(&self, combo: &str, member: &str) -> FEAResult<[f64; 12]> {
        Ok(self.member_results(combo, member)?.local_end_forces)
    }

    /// End forces in global axes
    pub fn member_global_end_forces(&self, combo: &str, member: &str) -> FEAResult<[f64; 12]> {
        Ok(self.member_results(combo, member)?.global_end_forces)
    }

    pub fn member_diagram(&self, combo: &str, member: &str) -> FEAResult<&MemberDiagram> {
        Ok(&self.member_results(combo, member)?.diagram)
    }

    /// All internal actions at distance `x` from the i-node
    pub fn member_forces_at(&self, combo: &str, member: &str, x: f64) -> FEAResult<MemberForces> {
        let diagram = self.member_diagram(combo, member)?;
        check_position(member, x, diagram.length())?;
        Ok(MemberForces::from_diagram(diagram, x))
    }

    /// One quantity at distance `x` from the i-node
    pub fn member_value(&self, combo: &str, member: &str, quantity: Quantity, x: f64) -> FEAResult<f64> {
        let diagram = self.member_diagram(combo, member)?;
        check_position(member, x, diagram.length())?;
        Ok(diagram.value(quantity, x))
    }

    /// One quantity at `fraction` (0 = i-node, 1 = j-node) of the member length
    pub fn member_value_at_fraction(
        &self,
        combo: &str,
        member: &str,
        quantity: Quantity,
        fraction: f64,
    ) -> FEAResult<f64> {
        let diagram = self.member_diagram(combo, member)?;
        check_position(member, fraction, 1.0)?;
        Ok(diagram.value_at_fraction(quantity, fraction))
    }

    /// `count` evenly spaced `(x, value)` samples of one quantity
    pub fn member_samples(
        &self,
        combo: &str,
        member: &str,
        quantity: Quantity,
        count: usize,
    ) -> FEAResult<Samples<'_>> {
        Ok(self.member_diagram(combo, member)?.samples(quantity, count))
    }

    /// Extremes of a member quantity over every solved combination
    pub fn envelope(&self, member: &str, quantity: Quantity) -> FEAResult<Envelope> {
        let index = self.member(member)?;
        let mut envelope: Option<Envelope> = None;

        for combo in &self.combos {
            let diagram = &combo.members[index].diagram;
            let (max_x, max) = diagram.max(quantity);
            let (min_x, min) = diagram.min(quantity);

            match envelope.as_mut() {
                None => {
                    envelope = Some(Envelope {
                        quantity,
                        max,
                        max_x,
                        max_combo: combo.name.clone(),
                        min,
                        min_x,
                        min_combo: combo.name.clone(),
                    })
                }
                Some(env) => {
                    if max > env.max {
                        env.max = max;
                        env.max_x = max_x;
                        env.max_combo = combo.name.clone();
                    }
                    if min < env.min {
                        env.min = min;
                        env.min_x = min_x;
                        env.min_combo = combo.name.clone();
                    }
                }
            }
        }

        envelope.ok_or_else(|| FEAError::InvalidInput("no load combination was solved".to_string()))
    }

    // ========================
    // Summaries and checks
    // ========================

    /// Peak displacement, reaction and member actions of one combination
    pub fn summary(&self, combo: &str) -> FEAResult<AnalysisSummary> {
        let results = self.combo(combo)?;
        let mut summary = AnalysisSummary {
            combo: results.name.clone(),
            num_nodes: self.node_names.len(),
            num_members: self.member_names.len(),
            total_dofs: self.total_dofs,
            free_dofs: self.free_dofs,
            ..Default::default()
        };

        for (name, disp) in self.node_names.iter().zip(&results.displacements) {
            let mag = disp.translation_magnitude();
            if mag > summary.max_displacement {
                summary.max_displacement = mag;
                summary.max_disp_node = name.clone();
            }
        }

        for (name, reaction) in self.node_names.iter().zip(&results.reactions) {
            let mag = reaction.force_magnitude();
            if mag > summary.max_reaction {
                summary.max_reaction = mag;
                summary.max_reaction_node = name.clone();
            }
        }

        for (name, member) in self.member_names.iter().zip(&results.members) {
            let axial = peak_abs(&member.diagram, Quantity::Axial);
            if axial > summary.max_axial {
                summary.max_axial = axial;
                summary.max_axial_member = name.clone();
            }
            let moment = peak_abs(&member.diagram, Quantity::MomentY)
                .max(peak_abs(&member.diagram, Quantity::MomentZ));
            if moment > summary.max_moment {
                summary.max_moment = moment;
                summary.max_moment_member = name.clone();
            }
        }

        Ok(summary)
    }

    /// Statics checks of every combination that ran one
    pub fn statics_checks(&self) -> impl Iterator<Item = &StaticsCheck> {
        self.combos.iter().filter_map(|c| c.statics.as_ref())
    }

    /// Statics checks that did not pass
    pub fn statics_failures(&self) -> Vec<&StaticsCheck> {
        self.statics_checks().filter(|check| !check.passed).collect()
    }

    fn node(&self, name: &str) -> FEAResult<usize> {
        self.node_index
            .get(name)
            .copied()
            .ok_or_else(|| FEAError::NodeNotFound(name.to_string()))
    }

    fn member(&self, name: &str) -> FEAResult<usize> {
        self.member_index
            .get(name)
            .copied()
            .ok_or_else(|| FEAError::MemberNotFound(name.to_string()))
    }

    fn member_results(&self, combo: &str, member: &str) -> FEAResult<&MemberResults> {
        let index = self.member(member)?;
        Ok(&self.combo(combo)?.members[index])
    }
}

fn peak_abs(diagram: &MemberDiagram, quantity: Quantity) -> f64 {
    diagram.max(quantity).1.abs().max(diagram.min(quantity).1.abs())
}

fn check_position(member: &str, x: f64, length: f64) -> FEAResult<()> {
    let slack = POSITION_TOLERANCE * length.max(1.0);
    if !x.is_finite() || x < -slack || x > length + slack {
        return Err(FEAError::InvalidInput(format!(
            "position {x} is outside member '{member}' (0 to {length})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elements::{Material, Member, Node, Section, Support};
    use crate::loads::{LoadCombination, PointLoad};
    use approx::assert_relative_eq;

    fn two_span_results() -> AnalysisResults {
        let mut model = FEModel::new();
        model.add_material("Steel", Material::new(200e6, 77e6, 0.3, 7.85)).unwrap();
        model.add_node("A", Node::new(0.0, 0.0, 0.0)).unwrap();
        model.add_node("B", Node::new(4.0, 0.0, 0.0)).unwrap();
        model.add_node("C", Node::new(8.0, 0.0, 0.0)).unwrap();
        let section = Section::rectangular(0.2, 0.4);
        model.add_member("AB", Member::new("A", "B", "Steel", section)).unwrap();
        model.add_member("BC", Member::new("B", "C", "Steel", section)).unwrap();
        model.add_support("A", Support::fixed()).unwrap();
        model.add_support("B", Support::with_restraints(false, true, true, false, false, false)).unwrap();
        model.add_support("C", Support::with_restraints(false, true, true, true, false, false)).unwrap();
        model.add_member_point_load("AB", PointLoad::downward(10.0, 2.0, "D")).unwrap();
        model.add_member_point_load("BC", PointLoad::downward(20.0, 2.0, "L")).unwrap();
        model.add_load_combo(LoadCombination::single("D", "D")).unwrap();
        model.add_load_combo(LoadCombination::single("L", "L")).unwrap();
        model.analyze_linear().unwrap()
    }

    #[test]
    fn test_lookup_errors() {
        let results = two_span_results();
        assert!(matches!(
            results.node_displacement("X", "A"),
            Err(FEAError::LoadCombinationNotFound(_))
        ));
        assert!(matches!(results.node_reaction("D", "Z"), Err(FEAError::NodeNotFound(_))));
        assert!(matches!(
            results.member_value("D", "AB", Quantity::MomentZ, 4.5),
            Err(FEAError::InvalidInput(_))
        ));
        assert!(matches!(
            results.member_value_at_fraction("D", "AB", Quantity::MomentZ, -0.1),
            Err(FEAError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_envelope_picks_governing_combo() {
        let results = two_span_results();
        let envelope = results.envelope("BC", Quantity::DeflectionY).unwrap();
        assert_eq!(envelope.min_combo, "L");
        assert!(envelope.min < 0.0);

        let forces = results.member_forces_at("AB", "AB", 1.0);
        assert!(forces.is_err());
        let forces = results.member_forces_at("D", "AB", 2.0).unwrap();
        assert_relative_eq!(
            forces.moment_z,
            results.member_value("D", "AB", Quantity::MomentZ, 2.0).unwrap()
        );
    }

    #[test]
    fn test_summary_and_unsupported_reactions() {
        let results = two_span_results();
        let summary = results.summary("L").unwrap();
        assert_eq!(summary.num_nodes, 3);
        assert_eq!(summary.num_members, 2);
        assert_eq!(summary.total_dofs, 18);
        assert_eq!(summary.max_moment_member, "BC");
        assert!(summary.max_reaction > 0.0);

        assert_eq!(results.statics_checks().count(), 0);
        assert!(results.statics_failures().is_empty());
    }
}
