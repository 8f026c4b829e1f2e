//! Member stiffness and global assembly

use nalgebra_sparse::CsrMatrix;

use crate::error::{FEAError, FEAResult};
use crate::math::{self, DVec, Mat12, Mat3, ReleaseCondensation, SparseMatrixBuilder, Vec12};
use crate::model::{FEModel, MemberRecord};
use crate::results::diagram::SectionRigidity;

/// Geometry and stiffness of one member, computed once per analysis
#[derive(Debug, Clone)]
pub(crate) struct MemberFrame {
    pub length: f64,
    pub rotation: Mat3,
    pub transform: Mat12,
    /// Local stiffness with end releases condensed out
    pub k_condensed: Mat12,
    pub condensation: ReleaseCondensation,
    pub rigidity: SectionRigidity,
    /// Global DOF indices of the i-node block followed by the j-node block
    pub dofs: [usize; 12],
}

impl MemberFrame {
    pub fn new(model: &FEModel, record: &MemberRecord) -> FEAResult<Self> {
        let material = model.material_by_id(record.material);
        let section = &record.member.section;

        let rotation = math::member_rotation_matrix(
            &model.node_position(record.i_node),
            &model.node_position(record.j_node),
            record.member.rotation,
        )?;
        let transform = math::member_transformation_matrix(&rotation);

        let k_local = math::member_local_stiffness(
            material.e,
            material.g,
            section.a,
            section.iy,
            section.iz,
            section.j,
            record.length,
        );

        let condensation = ReleaseCondensation::new(&k_local, &record.member.releases.as_array())
            .ok_or_else(|| {
                FEAError::InvalidInput(format!(
                    "end releases of member '{}' leave it unstable",
                    record.name
                ))
            })?;
        let k_condensed = condensation.condense_stiffness(&k_local);

        let i_dof = record.i_node.first_dof();
        let j_dof = record.j_node.first_dof();
        let mut dofs = [0; 12];
        for k in 0..6 {
            dofs[k] = i_dof + k;
            dofs[k + 6] = j_dof + k;
        }

        Ok(Self {
            length: record.length,
            rotation,
            transform,
            k_condensed,
            condensation,
            rigidity: SectionRigidity {
                ea: material.e * section.a,
                eiy: material.e * section.iy,
                eiz: material.e * section.iz,
                gj: material.g * section.j,
            },
            dofs,
        })
    }

    /// Member stiffness in global axes: `T^T k T`
    pub fn global_stiffness(&self) -> Mat12 {
        self.transform.transpose() * self.k_condensed * self.transform
    }

    /// Member-end displacements in local axes, gathered from the global vector
    pub fn local_displacements(&self, d: &DVec) -> Vec12 {
        let d_global = Vec12::from_fn(|k, _| d[self.dofs[k]]);
        self.transform * d_global
    }

    /// Local end forces `k d + fer` for local displacements and condensed fixed end reactions
    pub fn end_forces(&self, d_local: &Vec12, fer: &Vec12) -> Vec12 {
        self.k_condensed * d_local + fer
    }
}

/// Build a frame for every member, in model order
pub(crate) fn member_frames(model: &FEModel) -> FEAResult<Vec<MemberFrame>> {
    model
        .member_records()
        .iter()
        .map(|record| MemberFrame::new(model, record))
        .collect()
}

/// Scatter every member's global stiffness into the global matrix
pub(crate) fn assemble_stiffness(frames: &[MemberFrame], num_dofs: usize) -> CsrMatrix<f64> {
    let mut builder = SparseMatrixBuilder::new(num_dofs);
    for frame in frames {
        builder.add_element_matrix(&frame.dofs, &frame.global_stiffness());
    }
    builder.to_csr()
}
