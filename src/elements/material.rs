//! Material properties

use serde::{Deserialize, Serialize};

use crate::error::{FEAError, FEAResult};

/// Handle of a material inside a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialId(pub(crate) usize);

/// Linear-elastic material properties
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Material {
    /// Modulus of elasticity (Young's modulus)
    pub e: f64,
    /// Shear modulus
    pub g: f64,
    /// Poisson's ratio
    pub nu: f64,
    /// Density (mass or weight per unit volume, used for self-weight)
    pub rho: f64,
}

impl Material {
    /// Create a new material with given properties
    pub fn new(e: f64, g: f64, nu: f64, rho: f64) -> Self {
        Self { e, g, nu, rho }
    }

    /// Create a new isotropic material from E and nu
    /// G is calculated as E / (2 * (1 + nu))
    pub fn isotropic(e: f64, nu: f64, rho: f64) -> Self {
        let g = e / (2.0 * (1.0 + nu));
        Self::new(e, g, nu, rho)
    }

    /// Structural steel in N, m: E = 200 GPa, nu = 0.3, 7850 kg/m^3
    pub fn steel() -> Self {
        Self::isotropic(200e9, 0.3, 7850.0)
    }

    pub(crate) fn validate(&self, name: &str) -> FEAResult<()> {
        if !(self.e.is_finite() && self.e > 0.0) {
            return Err(FEAError::InvalidInput(format!(
                "material '{name}': elastic modulus must be positive, got {}",
                self.e
            )));
        }
        if !(self.g.is_finite() && self.g > 0.0) {
            return Err(FEAError::InvalidInput(format!(
                "material '{name}': shear modulus must be positive, got {}",
                self.g
            )));
        }
        if !self.nu.is_finite() {
            return Err(FEAError::InvalidInput(format!(
                "material '{name}': Poisson's ratio must be finite"
            )));
        }
        if !(self.rho.is_finite() && self.rho >= 0.0) {
            return Err(FEAError::InvalidInput(format!(
                "material '{name}': density must be non-negative, got {}",
                self.rho
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_isotropic_material() {
        let mat = Material::isotropic(200e9, 0.3, 7850.0);
        let expected_g = 200e9 / (2.0 * 1.3);
        assert!((mat.g - expected_g).abs() < 1.0);
    }

    #[test]
    fn test_validation() {
        assert!(Material::new(210000.0, 81000.0, 0.3, 7.85).validate("Steel").is_ok());
        assert!(Material::new(0.0, 81000.0, 0.3, 7.85).validate("Bad").is_err());
        assert!(Material::new(210000.0, -1.0, 0.3, 7.85).validate("Bad").is_err());
        assert!(Material::new(f64::NAN, 81000.0, 0.3, 7.85).validate("Bad").is_err());
    }
}
