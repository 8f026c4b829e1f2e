//! Frame Solver - linear static analysis of 3D frames and trusses
//!
//! A direct stiffness solver inspired by PyNite, supporting:
//! - Frame members with end releases and arbitrary orientation
//! - Node loads, member point loads and linearly varying distributed loads
//! - Load cases and factored load combinations, solved in parallel
//! - Continuous internal force and deflection diagrams
//! - Global statics checks
//!
//! ## Example
//! ```rust
//! use frame_solver::prelude::*;
//!
//! let mut model = FEModel::new();
//!
//! model.add_material("Steel", Material::new(200e9, 77e9, 0.3, 7850.0)).unwrap();
//!
//! model.add_node("N1", Node::new(0.0, 0.0, 0.0)).unwrap();
//! model.add_node("N2", Node::new(10.0, 0.0, 0.0)).unwrap();
//!
//! let section = Section::new(7.65e-3, 204e-6, 17.3e-6, 0.3e-6);
//! model.add_member("M1", Member::new("N1", "N2", "Steel", section)).unwrap();
//!
//! model.add_support("N1", Support::fixed()).unwrap();
//! model.add_node_load("N2", NodeLoad::fy(-10000.0, "Case 1")).unwrap();
//!
//! let results = model.analyze_linear().unwrap();
//! let tip = results.node_displacement("Combo 1", "N2").unwrap();
//! assert!(tip.dy < 0.0);
//!
//! let root_moment = results.member_value("Combo 1", "M1", Quantity::MomentZ, 0.0).unwrap();
//! assert!((root_moment + 100000.0).abs() < 1e-3);
//! ```

pub mod analysis;
pub mod elements;
pub mod error;
pub mod loads;
pub mod math;
pub mod model;
pub mod results;

// Re-export common types
pub mod prelude {
    pub use crate::analysis::{Analysis, AnalysisOptions, CancelToken, StaticsCheck};
    pub use crate::elements::{Material, Member, MemberId, MemberReleases, Node, NodeId, Section, Support};
    pub use crate::error::{Dof, DofComponent, ErrorKind, FEAError, FEAResult};
    pub use crate::loads::{DistributedLoad, LoadCombination, LoadDirection, NodeLoad, PointLoad};
    pub use crate::model::FEModel;
    pub use crate::results::{
        AnalysisResults, AnalysisSummary, ComboResults, Envelope, MemberDiagram, MemberForces,
        NodeDisplacement, Quantity, Reactions,
    };
}
