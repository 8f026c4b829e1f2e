//! Member element - 3D frame element (beam, column or truss bar)

use serde::{Deserialize, Serialize};

use super::Section;

/// Handle of a member inside a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId(pub(crate) usize);

impl MemberId {
    /// Position of the member in the model's member list
    pub fn index(self) -> usize {
        self.0
    }
}

/// End releases for a member (allowing specific DOFs to rotate/translate freely)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberReleases {
    /// i-node releases [DX, DY, DZ, RX, RY, RZ]
    pub i_node: [bool; 6],
    /// j-node releases [DX, DY, DZ, RX, RY, RZ]
    pub j_node: [bool; 6],
}

impl MemberReleases {
    /// Create releases with no end releases
    pub fn none() -> Self {
        Self::default()
    }

    /// Create releases for a pin at the i-node (moment releases)
    pub fn pin_i() -> Self {
        Self {
            i_node: [false, false, false, false, true, true],
            j_node: [false; 6],
        }
    }

    /// Create releases for a pin at the j-node (moment releases)
    pub fn pin_j() -> Self {
        Self {
            i_node: [false; 6],
            j_node: [false, false, false, false, true, true],
        }
    }

    /// Create releases for pins at both ends
    pub fn pin_both() -> Self {
        Self {
            i_node: [false, false, false, false, true, true],
            j_node: [false, false, false, false, true, true],
        }
    }

    /// Axial-only truss bar: bending released at both ends, torsion released at the j-node
    pub fn truss() -> Self {
        Self {
            i_node: [false, false, false, false, true, true],
            j_node: [false, false, false, true, true, true],
        }
    }

    /// Get combined releases as 12-element array
    pub fn as_array(&self) -> [bool; 12] {
        let mut arr = [false; 12];
        arr[0..6].copy_from_slice(&self.i_node);
        arr[6..12].copy_from_slice(&self.j_node);
        arr
    }

    /// True if any DOF is released
    pub fn any(&self) -> bool {
        self.i_node.iter().chain(self.j_node.iter()).any(|&r| r)
    }
}

/// A 3D frame member (beam or column)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Name of the i-node (start)
    pub i_node: String,
    /// Name of the j-node (end)
    pub j_node: String,
    /// Name of the material
    pub material: String,
    /// Cross-section properties
    pub section: Section,
    /// Rotation about longitudinal axis (radians)
    #[serde(default)]
    pub rotation: f64,
    /// End releases
    #[serde(default)]
    pub releases: MemberReleases,
}

impl Member {
    /// Create a new member
    pub fn new(i_node: &str, j_node: &str, material: &str, section: Section) -> Self {
        Self {
            i_node: i_node.to_string(),
            j_node: j_node.to_string(),
            material: material.to_string(),
            section,
            rotation: 0.0,
            releases: MemberReleases::none(),
        }
    }

    /// Set member rotation about its longitudinal axis
    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    /// Set member end releases
    pub fn with_releases(mut self, releases: MemberReleases) -> Self {
        self.releases = releases;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_creation() {
        let member = Member::new("N1", "N2", "Steel", Section::new(0.025, 1.2e-4, 1.6e-4, 2.7e-4));
        assert_eq!(member.i_node, "N1");
        assert_eq!(member.j_node, "N2");
        assert_eq!(member.rotation, 0.0);
        assert!(!member.releases.any());
    }

    #[test]
    fn test_releases() {
        let arr = MemberReleases::pin_i().as_array();
        assert!(!arr[0]); // DX not released
        assert!(arr[4]); // RY released
        assert!(arr[5]); // RZ released
        assert!(!arr[11]);

        let truss = MemberReleases::truss().as_array();
        assert!(!truss[3] && truss[9]);
    }
}
