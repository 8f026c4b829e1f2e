//! Section properties for frame elements

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};

/// Cross-section properties for frame elements
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Cross-sectional area
    pub a: f64,
    /// Moment of inertia about local y-axis
    pub iy: f64,
    /// Moment of inertia about local z-axis
    pub iz: f64,
    /// Torsional constant
    pub j: f64,
}

impl Section {
    /// Create a new section with basic properties
    pub fn new(a: f64, iy: f64, iz: f64, j: f64) -> Self {
        Self { a, iy, iz, j }
    }

    /// Create a solid rectangular section, `depth` measured along local y
    pub fn rectangular(width: f64, depth: f64) -> Self {
        let a = width * depth;
        let iy = depth * width.powi(3) / 12.0;
        let iz = width * depth.powi(3) / 12.0;

        // Torsional constant for rectangle (approximate)
        let (a_dim, b_dim) = if width > depth { (width, depth) } else { (depth, width) };
        let j = a_dim * b_dim.powi(3) / 3.0 * (1.0 - 0.63 * b_dim / a_dim);

        Self { a, iy, iz, j }
    }

    pub(crate) fn validate(&self, member: &str) -> FEAResult<()> {
        let props = [("A", self.a), ("Iy", self.iy), ("Iz", self.iz), ("J", self.j)];
        for (label, value) in props {
            if !(value.is_finite() && value > 0.0) {
                return Err(FEAError::InvalidInput(format!(
                    "member '{member}': section property {label} must be positive, got {value}"
                )));
            }
        }
        Ok(())
    }
}
