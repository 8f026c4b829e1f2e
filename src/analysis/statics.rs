//! Global equilibrium check

use serde::{Deserialize, Serialize};

use crate::math::{DVec, Vec3};
use crate::model::FEModel;

/// Global equilibrium residual of one load combination
///
/// Applied loads (direct node loads plus equivalent member loads) and
/// reactions are summed along the three global axes, and their moments are
/// summed about the centroid of the nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticsCheck {
    /// Load combination name
    pub combo: String,
    /// Sum of applied loads and reactions along X, Y, Z
    pub force_residual: [f64; 3],
    /// Sum of applied moments, reaction moments and force lever arms about X, Y, Z
    pub moment_residual: [f64; 3],
    /// Sum of absolute force components
    pub force_scale: f64,
    /// Sum of absolute moment components plus model size times `force_scale`
    pub moment_scale: f64,
    /// Relative tolerance the residuals were tested against
    pub tolerance: f64,
    /// Whether every residual is within tolerance
    pub passed: bool,
}

impl StaticsCheck {
    /// Largest force residual relative to the force scale
    pub fn relative_force_error(&self) -> f64 {
        relative(max_abs(&self.force_residual), self.force_scale)
    }

    /// Largest moment residual relative to the moment scale
    pub fn relative_moment_error(&self) -> f64 {
        relative(max_abs(&self.moment_residual), self.moment_scale)
    }
}

fn max_abs(values: &[f64; 3]) -> f64 {
    values.iter().fold(0.0, |acc, v| acc.max(v.abs()))
}

fn relative(residual: f64, scale: f64) -> f64 {
    if scale > 0.0 {
        residual / scale
    } else {
        residual
    }
}

/// Check equilibrium of `applied` nodal loads against `reactions` (both global, full length)
pub(crate) fn check_statics(
    model: &FEModel,
    combo: &str,
    applied: &DVec,
    reactions: &DVec,
    tolerance: f64,
) -> StaticsCheck {
    let positions: Vec<Vec3> = model.nodes().map(|(_, node)| node.position()).collect();
    let count = positions.len().max(1) as f64;
    let centroid = positions.iter().fold(Vec3::zeros(), |acc, p| acc + p) / count;
    let size = positions
        .iter()
        .map(|p| (p - centroid).norm())
        .fold(0.0, f64::max);

    let mut force = Vec3::zeros();
    let mut moment = Vec3::zeros();
    let mut force_scale = 0.0;
    let mut moment_scale = 0.0;

    for (node, position) in positions.iter().enumerate() {
        let base = node * 6;
        let f = Vec3::new(
            applied[base] + reactions[base],
            applied[base + 1] + reactions[base + 1],
            applied[base + 2] + reactions[base + 2],
        );
        let m = Vec3::new(
            applied[base + 3] + reactions[base + 3],
            applied[base + 4] + reactions[base + 4],
            applied[base + 5] + reactions[base + 5],
        );

        force += f;
        moment += m + (position - centroid).cross(&f);

        for k in 0..3 {
            force_scale += applied[base + k].abs() + reactions[base + k].abs();
            moment_scale += applied[base + 3 + k].abs() + reactions[base + 3 + k].abs();
        }
    }
    moment_scale += size * force_scale;

    let force_residual = [force[0], force[1], force[2]];
    let moment_residual = [moment[0], moment[1], moment[2]];
    let passed = max_abs(&force_residual) <= tolerance * force_scale
        && max_abs(&moment_residual) <= tolerance * moment_scale;

    StaticsCheck {
        combo: combo.to_string(),
        force_residual,
        moment_residual,
        force_scale,
        moment_scale,
        tolerance,
        passed,
    }
}
