//! Support conditions

use serde::{Deserialize, Serialize};

/// Rigid support conditions at a node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Support {
    /// Restrained in X translation
    pub dx: bool,
    /// Restrained in Y translation
    pub dy: bool,
    /// Restrained in Z translation
    pub dz: bool,
    /// Restrained in X rotation
    pub rx: bool,
    /// Restrained in Y rotation
    pub ry: bool,
    /// Restrained in Z rotation
    pub rz: bool,
}

impl Support {
    /// Create a new support with no restraints
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fully fixed support (all DOFs restrained)
    pub fn fixed() -> Self {
        Self::with_restraints(true, true, true, true, true, true)
    }

    /// Create a pinned support (translations restrained, rotations free)
    pub fn pinned() -> Self {
        Self::with_restraints(true, true, true, false, false, false)
    }

    /// Create a roller support (Y translation restrained only)
    pub fn roller_y() -> Self {
        Self::with_restraints(false, true, false, false, false, false)
    }

    /// Create a roller support (X translation restrained only)
    pub fn roller_x() -> Self {
        Self::with_restraints(true, false, false, false, false, false)
    }

    /// Create a support with specific restraints
    pub fn with_restraints(dx: bool, dy: bool, dz: bool, rx: bool, ry: bool, rz: bool) -> Self {
        Self { dx, dy, dz, rx, ry, rz }
    }

    /// Restraint flags as [DX, DY, DZ, RX, RY, RZ]
    pub fn as_array(&self) -> [bool; 6] {
        [self.dx, self.dy, self.dz, self.rx, self.ry, self.rz]
    }

    /// Get list of restrained DOF offsets (0-5)
    pub fn restrained_dofs(&self) -> Vec<usize> {
        (0..6).filter(|&i| self.as_array()[i]).collect()
    }

    /// Check if any DOF is restrained
    pub fn is_supported(&self) -> bool {
        self.as_array().iter().any(|&r| r)
    }

    /// Count number of restrained DOFs
    pub fn num_restrained(&self) -> usize {
        self.as_array().iter().filter(|&&r| r).count()
    }
}
