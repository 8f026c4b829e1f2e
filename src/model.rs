//! FE Model - structural model registry
//!
//! Nodes, materials, members and loads are stored in insertion order and
//! addressed by integer handles; names are only used at the API boundary.
//! The model never holds results: [`FEModel::analyze`] returns them.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analysis::{Analysis, AnalysisOptions, CancelToken};
use crate::elements::{Material, MaterialId, Member, MemberId, Node, NodeId, Support};
use crate::error::{Dof, DofComponent, FEAError, FEAResult};
use crate::loads::{DistributedLoad, LoadCombination, LoadDirection, NodeLoad, PointLoad};
use crate::math::{self, ReleaseCondensation, Vec3};
use crate::results::AnalysisResults;

/// Relative slack allowed when a load position lands just outside the member
const POSITION_TOLERANCE: f64 = 1e-9;

/// A registered member with its references resolved
#[derive(Debug, Clone)]
pub(crate) struct MemberRecord {
    pub name: String,
    pub member: Member,
    pub i_node: NodeId,
    pub j_node: NodeId,
    pub material: MaterialId,
    pub length: f64,
}

/// The 3D frame model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(into = "ModelDocument", try_from = "ModelDocument")]
pub struct FEModel {
    node_names: Vec<String>,
    nodes: Vec<Node>,
    supports: Vec<Option<Support>>,
    node_index: HashMap<String, NodeId>,

    material_names: Vec<String>,
    materials: Vec<Material>,
    material_index: HashMap<String, MaterialId>,

    members: Vec<MemberRecord>,
    member_index: HashMap<String, MemberId>,

    load_cases: Vec<String>,
    node_loads: Vec<(NodeId, NodeLoad)>,
    point_loads: Vec<(MemberId, PointLoad)>,
    dist_loads: Vec<(MemberId, DistributedLoad)>,

    combos: Vec<LoadCombination>,
    combo_index: HashMap<String, usize>,

    revision: u64,
}

impl FEModel {
    /// Create a new empty model
    pub fn new() -> Self {
        Self::default()
    }

    // ========================
    // Model Building Methods
    // ========================

    /// Add a node to the model
    pub fn add_node(&mut self, name: &str, node: Node) -> FEAResult<NodeId> {
        if self.node_index.contains_key(name) {
            return Err(FEAError::DuplicateName(name.to_string()));
        }
        if !node.is_finite() {
            return Err(FEAError::InvalidInput(format!(
                "node '{name}' has non-finite coordinates"
            )));
        }

        let id = NodeId(self.nodes.len());
        self.node_names.push(name.to_string());
        self.nodes.push(node);
        self.supports.push(None);
        self.node_index.insert(name.to_string(), id);
        self.touch();
        Ok(id)
    }

    /// Add a material to the model
    pub fn add_material(&mut self, name: &str, material: Material) -> FEAResult<MaterialId> {
        if self.material_index.contains_key(name) {
            return Err(FEAError::DuplicateName(name.to_string()));
        }
        material.validate(name)?;

        let id = MaterialId(self.materials.len());
        self.material_names.push(name.to_string());
        self.materials.push(material);
        self.material_index.insert(name.to_string(), id);
        self.touch();
        Ok(id)
    }

    /// Add a member to the model
    pub fn add_member(&mut self, name: &str, member: Member) -> FEAResult<MemberId> {
        if self.member_index.contains_key(name) {
            return Err(FEAError::DuplicateName(name.to_string()));
        }
        let i_node = self.require_node(&member.i_node)?;
        let j_node = self.require_node(&member.j_node)?;
        if i_node == j_node {
            return Err(FEAError::InvalidGeometry(format!(
                "member '{name}' starts and ends at node '{}'",
                member.i_node
            )));
        }
        let material = *self
            .material_index
            .get(&member.material)
            .ok_or_else(|| FEAError::MaterialNotFound(member.material.clone()))?;
        member.section.validate(name)?;
        if !member.rotation.is_finite() {
            return Err(FEAError::InvalidInput(format!(
                "member '{name}' has a non-finite rotation"
            )));
        }

        let pi = self.nodes[i_node.0].position();
        let pj = self.nodes[j_node.0].position();
        math::member_rotation_matrix(&pi, &pj, member.rotation).map_err(|_| {
            FEAError::InvalidGeometry(format!(
                "member '{name}' has zero length ({} and {} coincide)",
                member.i_node, member.j_node
            ))
        })?;
        let length = (pj - pi).norm();

        if member.releases.any() {
            let m = &self.materials[material.0];
            let s = &member.section;
            let k = math::member_local_stiffness(m.e, m.g, s.a, s.iy, s.iz, s.j, length);
            if ReleaseCondensation::new(&k, &member.releases.as_array()).is_none() {
                return Err(FEAError::InvalidInput(format!(
                    "end releases of member '{name}' leave it unstable"
                )));
            }
        }

        let id = MemberId(self.members.len());
        self.members.push(MemberRecord {
            name: name.to_string(),
            member,
            i_node,
            j_node,
            material,
            length,
        });
        self.member_index.insert(name.to_string(), id);
        self.touch();
        Ok(id)
    }

    /// Add (or replace) the support condition of a node
    pub fn add_support(&mut self, node_name: &str, support: Support) -> FEAResult<()> {
        let id = self.require_node(node_name)?;
        self.supports[id.0] = Some(support);
        self.touch();
        Ok(())
    }

    /// Register a load case explicitly
    ///
    /// Loads register their case on first use, so this is only needed for
    /// cases that a combination references before any load is added.
    pub fn add_load_case(&mut self, name: &str) -> FEAResult<()> {
        if self.has_load_case(name) {
            return Err(FEAError::DuplicateName(name.to_string()));
        }
        self.load_cases.push(name.to_string());
        self.touch();
        Ok(())
    }

    /// Add a node load
    pub fn add_node_load(&mut self, node_name: &str, load: NodeLoad) -> FEAResult<()> {
        let id = self.require_node(node_name)?;
        if load.as_array().iter().any(|v| !v.is_finite()) {
            return Err(FEAError::InvalidInput(format!(
                "node load on '{node_name}' has non-finite components"
            )));
        }
        self.register_case(&load.case);
        self.node_loads.push((id, load));
        self.touch();
        Ok(())
    }

    /// Add a concentrated force or moment to a member
    pub fn add_member_point_load(&mut self, member_name: &str, mut load: PointLoad) -> FEAResult<()> {
        let id = self.require_member(member_name)?;
        let length = self.members[id.0].length;

        if !load.magnitude.is_finite() {
            return Err(FEAError::InvalidInput(format!(
                "point load on member '{member_name}' has a non-finite magnitude"
            )));
        }
        load.position = clamp_position(load.position, length).ok_or_else(|| {
            FEAError::InvalidInput(format!(
                "point load position {} is outside member '{member_name}' (length {length})",
                load.position
            ))
        })?;

        self.register_case(&load.case);
        self.point_loads.push((id, load));
        self.touch();
        Ok(())
    }

    /// Add a linearly varying distributed force to a member
    ///
    /// An end position of `f64::INFINITY` is resolved to the member length.
    pub fn add_member_dist_load(&mut self, member_name: &str, mut load: DistributedLoad) -> FEAResult<()> {
        let id = self.require_member(member_name)?;
        let length = self.members[id.0].length;

        if !load.direction.is_force() {
            return Err(FEAError::InvalidInput(format!(
                "distributed load on member '{member_name}' must be a force, got {:?}",
                load.direction
            )));
        }
        if !load.w1.is_finite() || !load.w2.is_finite() {
            return Err(FEAError::InvalidInput(format!(
                "distributed load on member '{member_name}' has non-finite magnitudes"
            )));
        }
        if load.x2 == f64::INFINITY {
            load.x2 = length;
        }
        let out_of_range = || {
            FEAError::InvalidInput(format!(
                "distributed load span [{}, {}] is outside member '{member_name}' (length {length})",
                load.x1, load.x2
            ))
        };
        let x1 = clamp_position(load.x1, length).ok_or_else(out_of_range)?;
        let x2 = clamp_position(load.x2, length).ok_or_else(out_of_range)?;
        if x2 < x1 {
            return Err(out_of_range());
        }
        if x2 == x1 {
            return Err(FEAError::InvalidInput(format!(
                "distributed load on member '{member_name}' has an empty span at x = {x1}"
            )));
        }
        load.x1 = x1;
        load.x2 = x2;

        self.register_case(&load.case);
        self.dist_loads.push((id, load));
        self.touch();
        Ok(())
    }

    /// Add self-weight to every member currently in the model
    ///
    /// Each member gets a uniform load of `factor * density * A` along the
    /// global `direction` (FX, FY or FZ), e.g. `factor = -9.81` with FY.
    pub fn add_member_self_weight(&mut self, direction: LoadDirection, factor: f64, case: &str) -> FEAResult<()> {
        if direction.is_local() || !direction.is_force() {
            return Err(FEAError::InvalidInput(format!(
                "self-weight must act along a global force direction, got {direction:?}"
            )));
        }
        if !factor.is_finite() {
            return Err(FEAError::InvalidInput("self-weight factor is not finite".to_string()));
        }

        self.register_case(case);
        for (index, record) in self.members.iter().enumerate() {
            let density = self.materials[record.material.0].rho;
            let w = factor * density * record.member.section.a;
            let load = DistributedLoad::new(w, w, 0.0, record.length, direction, case);
            self.dist_loads.push((MemberId(index), load));
        }
        debug!(
            "Added self-weight in case '{}' to {} member(s)",
            case,
            self.members.len()
        );
        self.touch();
        Ok(())
    }

    /// Add a load combination
    pub fn add_load_combo(&mut self, combo: LoadCombination) -> FEAResult<()> {
        if self.combo_index.contains_key(&combo.name) {
            return Err(FEAError::DuplicateName(combo.name.clone()));
        }
        combo.validate()?;
        if let Some((case, _)) = combo.factors.iter().find(|(case, _)| !self.has_load_case(case)) {
            return Err(FEAError::LoadCaseNotFound(case.clone()));
        }

        self.combo_index.insert(combo.name.clone(), self.combos.len());
        self.combos.push(combo);
        self.touch();
        Ok(())
    }

    // ========================
    // Analysis Methods
    // ========================

    /// Run linear static analysis with default options
    pub fn analyze_linear(&self) -> FEAResult<AnalysisResults> {
        self.analyze(&AnalysisOptions::default())
    }

    /// Run analysis with custom options
    pub fn analyze(&self, options: &AnalysisOptions) -> FEAResult<AnalysisResults> {
        self.analyze_with_cancel(options, &CancelToken::new())
    }

    /// Run analysis, checking `cancel` between load combinations
    pub fn analyze_with_cancel(&self, options: &AnalysisOptions, cancel: &CancelToken) -> FEAResult<AnalysisResults> {
        self.prepare(options)?.solve_all(cancel)
    }

    /// Assemble and factorize the model without solving any combination
    pub fn prepare(&self, options: &AnalysisOptions) -> FEAResult<Analysis<'_>> {
        Analysis::new(self, options.clone())
    }

    // ========================
    // Accessors
    // ========================

    /// Get a node by name
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.node_index.get(name).map(|id| &self.nodes[id.0])
    }

    /// Handle of a node
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.node_index.get(name).copied()
    }

    /// Name of a node
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        self.node_names.get(id.0).map(String::as_str)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.node_names.iter().map(String::as_str).zip(self.nodes.iter())
    }

    /// Get a material by name
    pub fn material(&self, name: &str) -> Option<&Material> {
        self.material_index.get(name).map(|id| &self.materials[id.0])
    }

    /// Materials in insertion order
    pub fn materials(&self) -> impl Iterator<Item = (&str, &Material)> {
        self.material_names.iter().map(String::as_str).zip(self.materials.iter())
    }

    /// Get a member by name
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.member_index.get(name).map(|id| &self.members[id.0].member)
    }

    /// Handle of a member
    pub fn member_id(&self, name: &str) -> Option<MemberId> {
        self.member_index.get(name).copied()
    }

    /// Length of a member
    pub fn member_length(&self, name: &str) -> Option<f64> {
        self.member_index.get(name).map(|id| self.members[id.0].length)
    }

    /// Members in insertion order
    pub fn members(&self) -> impl Iterator<Item = (&str, &Member)> {
        self.members.iter().map(|r| (r.name.as_str(), &r.member))
    }

    /// Support condition of a node, if one was defined
    pub fn support(&self, node_name: &str) -> Option<&Support> {
        self.node_index
            .get(node_name)
            .and_then(|id| self.supports[id.0].as_ref())
    }

    /// Get a load combination by name
    pub fn combo(&self, name: &str) -> Option<&LoadCombination> {
        self.combo_index.get(name).map(|&i| &self.combos[i])
    }

    /// Load combinations in definition order
    pub fn combos(&self) -> &[LoadCombination] {
        &self.combos
    }

    /// All load combination names
    pub fn combo_names(&self) -> Vec<String> {
        self.combos.iter().map(|c| c.name.clone()).collect()
    }

    /// All load case names, in registration order
    pub fn load_cases(&self) -> &[String] {
        &self.load_cases
    }

    /// Check whether a load case is registered
    pub fn has_load_case(&self, name: &str) -> bool {
        self.load_cases.iter().any(|c| c == name)
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_members(&self) -> usize {
        self.members.len()
    }

    /// Total number of DOFs (6 per node)
    pub fn num_dofs(&self) -> usize {
        self.nodes.len() * 6
    }

    /// Global DOF index of one component of a node
    pub fn dof_index(&self, node_name: &str, component: DofComponent) -> FEAResult<usize> {
        let id = self.require_node(node_name)?;
        Ok(id.first_dof() + component.offset())
    }

    /// Node and component of a global DOF index
    pub fn dof_label(&self, dof: usize) -> Option<Dof> {
        let node = self.node_names.get(dof / 6)?.clone();
        let component = DofComponent::from_offset(dof % 6)?;
        Some(Dof { node, component })
    }

    /// Counter bumped by every successful mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ========================
    // Serialization
    // ========================

    /// Serialize the model definition to JSON
    pub fn to_json(&self) -> FEAResult<String> {
        Ok(serde_json::to_string_pretty(&ModelDocument::from(self.clone()))?)
    }

    /// Rebuild a model from JSON, replaying every registration
    pub fn from_json(json: &str) -> FEAResult<Self> {
        let document: ModelDocument = serde_json::from_str(json)?;
        Self::try_from(document)
    }

    // ========================
    // Crate internals
    // ========================

    pub(crate) fn member_records(&self) -> &[MemberRecord] {
        &self.members
    }

    pub(crate) fn node_position(&self, id: NodeId) -> Vec3 {
        self.nodes[id.0].position()
    }

    pub(crate) fn material_by_id(&self, id: MaterialId) -> &Material {
        &self.materials[id.0]
    }

    pub(crate) fn supports_by_index(&self) -> &[Option<Support>] {
        &self.supports
    }

    pub(crate) fn node_names(&self) -> &[String] {
        &self.node_names
    }

    pub(crate) fn node_loads(&self) -> &[(NodeId, NodeLoad)] {
        &self.node_loads
    }

    pub(crate) fn point_loads(&self) -> &[(MemberId, PointLoad)] {
        &self.point_loads
    }

    pub(crate) fn dist_loads(&self) -> &[(MemberId, DistributedLoad)] {
        &self.dist_loads
    }

    fn require_node(&self, name: &str) -> FEAResult<NodeId> {
        self.node_id(name)
            .ok_or_else(|| FEAError::NodeNotFound(name.to_string()))
    }

    fn require_member(&self, name: &str) -> FEAResult<MemberId> {
        self.member_id(name)
            .ok_or_else(|| FEAError::MemberNotFound(name.to_string()))
    }

    fn register_case(&mut self, case: &str) {
        if !self.has_load_case(case) {
            self.load_cases.push(case.to_string());
        }
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

/// Snap a position within tolerance of the member onto `[0, length]`
fn clamp_position(x: f64, length: f64) -> Option<f64> {
    let slack = POSITION_TOLERANCE * length;
    if !x.is_finite() || x < -slack || x > length + slack {
        return None;
    }
    Some(x.clamp(0.0, length))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Named<T> {
    name: String,
    #[serde(flatten)]
    value: T,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Targeted<T> {
    target: String,
    #[serde(flatten)]
    load: T,
}

/// Serialized form of a model: the registration calls that rebuild it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ModelDocument {
    #[serde(default)]
    nodes: Vec<Named<Node>>,
    #[serde(default)]
    materials: Vec<Named<Material>>,
    #[serde(default)]
    members: Vec<Named<Member>>,
    #[serde(default)]
    supports: Vec<Named<Support>>,
    #[serde(default)]
    load_cases: Vec<String>,
    #[serde(default)]
    node_loads: Vec<Targeted<NodeLoad>>,
    #[serde(default)]
    point_loads: Vec<Targeted<PointLoad>>,
    #[serde(default)]
    dist_loads: Vec<Targeted<DistributedLoad>>,
    #[serde(default)]
    combos: Vec<LoadCombination>,
}

impl From<FEModel> for ModelDocument {
    fn from(model: FEModel) -> Self {
        let node_name = |id: NodeId| model.node_names[id.0].clone();
        let member_name = |id: MemberId| model.members[id.0].name.clone();

        ModelDocument {
            nodes: model
                .node_names
                .iter()
                .zip(&model.nodes)
                .map(|(name, node)| Named { name: name.clone(), value: *node })
                .collect(),
            materials: model
                .material_names
                .iter()
                .zip(&model.materials)
                .map(|(name, material)| Named { name: name.clone(), value: *material })
                .collect(),
            members: model
                .members
                .iter()
                .map(|r| Named { name: r.name.clone(), value: r.member.clone() })
                .collect(),
            supports: model
                .supports
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.map(|s| Named { name: node_name(NodeId(i)), value: s }))
                .collect(),
            load_cases: model.load_cases.clone(),
            node_loads: model
                .node_loads
                .iter()
                .map(|(id, load)| Targeted { target: node_name(*id), load: load.clone() })
                .collect(),
            point_loads: model
                .point_loads
                .iter()
                .map(|(id, load)| Targeted { target: member_name(*id), load: load.clone() })
                .collect(),
            dist_loads: model
                .dist_loads
                .iter()
                .map(|(id, load)| Targeted { target: member_name(*id), load: load.clone() })
                .collect(),
            combos: model.combos.clone(),
        }
    }
}

impl TryFrom<ModelDocument> for FEModel {
    type Error = FEAError;

    fn try_from(doc: ModelDocument) -> FEAResult<Self> {
        let mut model = FEModel::new();
        for n in doc.nodes {
            model.add_node(&n.name, n.value)?;
        }
        for m in doc.materials {
            model.add_material(&m.name, m.value)?;
        }
        for m in doc.members {
            model.add_member(&m.name, m.value)?;
        }
        for s in doc.supports {
            model.add_support(&s.name, s.value)?;
        }
        for case in doc.load_cases {
            model.register_case(&case);
        }
        for l in doc.node_loads {
            model.add_node_load(&l.target, l.load)?;
        }
        for l in doc.point_loads {
            model.add_member_point_load(&l.target, l.load)?;
        }
        for l in doc.dist_loads {
            model.add_member_dist_load(&l.target, l.load)?;
        }
        for combo in doc.combos {
            model.add_load_combo(combo)?;
        }
        Ok(model)
    }
}
