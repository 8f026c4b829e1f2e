//! Point loads on members

use serde::{Deserialize, Serialize};

use crate::math::{Mat3, Vec3};

/// Direction of a member load
///
/// Lower-case variants act along/about the member's local axes, upper-case
/// variants along/about the global axes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LoadDirection {
    /// Force in member's local x direction (axial)
    Fx,
    /// Force in member's local y direction
    Fy,
    /// Force in member's local z direction
    Fz,
    /// Moment about member's local x axis (torsion)
    Mx,
    /// Moment about member's local y axis
    My,
    /// Moment about member's local z axis
    Mz,
    /// Force in global X direction
    FX,
    /// Force in global Y direction
    FY,
    /// Force in global Z direction
    FZ,
    /// Moment about global X axis
    MX,
    /// Moment about global Y axis
    MY,
    /// Moment about global Z axis
    MZ,
}

impl LoadDirection {
    /// Check if this is a local coordinate direction
    pub fn is_local(self) -> bool {
        matches!(
            self,
            LoadDirection::Fx
                | LoadDirection::Fy
                | LoadDirection::Fz
                | LoadDirection::Mx
                | LoadDirection::My
                | LoadDirection::Mz
        )
    }

    /// Check if this direction is a force (as opposed to a moment)
    pub fn is_force(self) -> bool {
        matches!(
            self,
            LoadDirection::Fx
                | LoadDirection::Fy
                | LoadDirection::Fz
                | LoadDirection::FX
                | LoadDirection::FY
                | LoadDirection::FZ
        )
    }

    /// Axis index (0 = x, 1 = y, 2 = z) in the direction's own frame
    pub fn axis(self) -> usize {
        match self {
            LoadDirection::Fx | LoadDirection::Mx | LoadDirection::FX | LoadDirection::MX => 0,
            LoadDirection::Fy | LoadDirection::My | LoadDirection::FY | LoadDirection::MY => 1,
            LoadDirection::Fz | LoadDirection::Mz | LoadDirection::FZ | LoadDirection::MZ => 2,
        }
    }

    /// Split a magnitude along this direction into local x, y, z components
    ///
    /// `rotation` is the member's direction-cosine matrix (rows are the local axes).
    pub fn local_components(self, magnitude: f64, rotation: &Mat3) -> Vec3 {
        let mut v = Vec3::zeros();
        v[self.axis()] = magnitude;
        if self.is_local() {
            v
        } else {
            rotation * v
        }
    }
}

/// A concentrated force or moment on a member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointLoad {
    /// Load magnitude
    pub magnitude: f64,
    /// Distance from i-node
    pub position: f64,
    /// Load direction
    pub direction: LoadDirection,
    /// Load case
    pub case: String,
}

impl PointLoad {
    /// Create a new point load
    pub fn new(magnitude: f64, position: f64, direction: LoadDirection, case: &str) -> Self {
        Self {
            magnitude,
            position,
            direction,
            case: case.to_string(),
        }
    }

    /// Create a downward (negative global Y) point load
    pub fn downward(magnitude: f64, position: f64, case: &str) -> Self {
        Self::new(-magnitude.abs(), position, LoadDirection::FY, case)
    }

    /// Create an axial load (in local x direction)
    pub fn axial(magnitude: f64, position: f64, case: &str) -> Self {
        Self::new(magnitude, position, LoadDirection::Fx, case)
    }

    /// Create a concentrated moment about a member axis
    pub fn moment(magnitude: f64, position: f64, direction: LoadDirection, case: &str) -> Self {
        Self::new(magnitude, position, direction, case)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_direction_classification() {
        assert!(LoadDirection::Fy.is_local());
        assert!(!LoadDirection::FY.is_local());
        assert!(LoadDirection::FZ.is_force());
        assert!(!LoadDirection::Mz.is_force());
        assert_eq!(LoadDirection::MZ.axis(), 2);
    }

    #[test]
    fn test_global_components_are_rotated() {
        // Local x along global Y, local y along -X, local z along Z
        let r = Mat3::new(
            0.0, 1.0, 0.0,
            -1.0, 0.0, 0.0,
            0.0, 0.0, 1.0,
        );
        let local = LoadDirection::FX.local_components(10.0, &r);
        assert_relative_eq!(local[0], 0.0);
        assert_relative_eq!(local[1], -10.0);
        assert_relative_eq!(local[2], 0.0);

        let untouched = LoadDirection::Fz.local_components(3.0, &r);
        assert_relative_eq!(untouched[2], 3.0);
    }
}
