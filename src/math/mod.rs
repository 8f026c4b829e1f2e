//! Mathematical utilities for frame element calculations

pub mod sparse;

use nalgebra::{DMatrix, DVector, Matrix3, SMatrix, SVector, Vector3};

use crate::error::{FEAError, FEAResult};

// Re-export sparse utilities
pub use sparse::{reverse_cuthill_mckee, SkylineCholesky, SparseMatrixBuilder};

pub type Mat = DMatrix<f64>;
pub type DVec = DVector<f64>;
pub type Mat3 = Matrix3<f64>;
pub type Vec3 = Vector3<f64>;

/// 12x12 matrix for member stiffness
pub type Mat12 = SMatrix<f64, 12, 12>;
/// 12-element vector for member forces/displacements
pub type Vec12 = SVector<f64, 12>;

/// Members shorter than this are treated as zero-length
pub const MIN_MEMBER_LENGTH: f64 = 1e-10;

/// Direction cosines closer to zero than this are treated as zero
const AXIS_TOLERANCE: f64 = 1e-10;

/// Compute the 3x3 direction cosine matrix of a 3D frame element
///
/// Rows are the local x, y and z axes expressed in global coordinates, so
/// `local = R * global`. Global Y is the vertical axis:
/// - vertical members: local y = -X when pointing up (+X when pointing down), local z = Z
/// - horizontal members: local y = global Y, local z = x cross y
/// - inclined members: local z stays horizontal, local y = z cross x
///
/// `rotation` (radians) then rotates local y and z about local x; for vertical
/// members it is the only way to choose the section orientation.
pub fn member_rotation_matrix(i_node: &Vec3, j_node: &Vec3, rotation: f64) -> FEAResult<Mat3> {
    let delta = j_node - i_node;
    let length = delta.norm();

    if !length.is_finite() || length < MIN_MEMBER_LENGTH {
        return Err(FEAError::InvalidGeometry(format!(
            "member from {:?} to {:?} has zero length",
            i_node.as_slice(),
            j_node.as_slice()
        )));
    }

    let x = delta / length;

    let (y, z) = if x[0].abs() < AXIS_TOLERANCE && x[2].abs() < AXIS_TOLERANCE {
        // Vertical member
        if x[1] > 0.0 {
            (Vec3::new(-1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0))
        } else {
            (Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 1.0))
        }
    } else if x[1].abs() < AXIS_TOLERANCE {
        // Horizontal member
        let y = Vec3::y();
        let z = x.cross(&y).normalize();
        (y, z)
    } else {
        // Inclined member: keep local z in the global XZ plane
        let proj = Vec3::new(x[0], 0.0, x[2]);
        let z = if x[1] > 0.0 { proj.cross(&x) } else { x.cross(&proj) }.normalize();
        let y = z.cross(&x).normalize();
        (y, z)
    };

    let (y, z) = if rotation.abs() > AXIS_TOLERANCE {
        let (sin_r, cos_r) = rotation.sin_cos();
        (y * cos_r + z * sin_r, z * cos_r - y * sin_r)
    } else {
        (y, z)
    };

    Ok(Mat3::from_rows(&[x.transpose(), y.transpose(), z.transpose()]))
}

/// Expand a 3x3 direction cosine matrix into the 12x12 member transformation matrix
pub fn member_transformation_matrix(rotation: &Mat3) -> Mat12 {
    let mut t = Mat12::zeros();
    for block in 0..4 {
        let offset = block * 3;
        t.fixed_view_mut::<3, 3>(offset, offset).copy_from(rotation);
    }
    t
}

/// Compute the local stiffness matrix for a 3D frame element
///
/// # Arguments
/// * `e` - Modulus of elasticity
/// * `g` - Shear modulus
/// * `a` - Cross-sectional area
/// * `iy` - Moment of inertia about local y-axis
/// * `iz` - Moment of inertia about local z-axis
/// * `j` - Torsional constant
/// * `length` - Member length
///
/// # Returns
/// 12x12 local stiffness matrix
pub fn member_local_stiffness(
    e: f64,
    g: f64,
    a: f64,
    iy: f64,
    iz: f64,
    j: f64,
    length: f64,
) -> Mat12 {
    let l = length;
    let l2 = l * l;
    let l3 = l2 * l;

    let ea_l = e * a / l;
    let gj_l = g * j / l;

    let eiy_l3 = e * iy / l3;
    let eiy_l2 = e * iy / l2;
    let eiy_l = e * iy / l;

    let eiz_l3 = e * iz / l3;
    let eiz_l2 = e * iz / l2;
    let eiz_l = e * iz / l;

    #[rustfmt::skip]
    let data = [
        // Row 0: axial at i
        ea_l,      0.0,          0.0,           0.0,    0.0,           0.0,          -ea_l,     0.0,          0.0,           0.0,    0.0,           0.0,
        // Row 1: shear Fy at i
        0.0,       12.0*eiz_l3,  0.0,           0.0,    0.0,           6.0*eiz_l2,   0.0,       -12.0*eiz_l3, 0.0,           0.0,    0.0,           6.0*eiz_l2,
        // Row 2: shear Fz at i
        0.0,       0.0,          12.0*eiy_l3,   0.0,    -6.0*eiy_l2,   0.0,          0.0,       0.0,          -12.0*eiy_l3,  0.0,    -6.0*eiy_l2,   0.0,
        // Row 3: torsion at i
        0.0,       0.0,          0.0,           gj_l,   0.0,           0.0,          0.0,       0.0,          0.0,           -gj_l,  0.0,           0.0,
        // Row 4: moment My at i
        0.0,       0.0,          -6.0*eiy_l2,   0.0,    4.0*eiy_l,     0.0,          0.0,       0.0,          6.0*eiy_l2,    0.0,    2.0*eiy_l,     0.0,
        // Row 5: moment Mz at i
        0.0,       6.0*eiz_l2,   0.0,           0.0,    0.0,           4.0*eiz_l,    0.0,       -6.0*eiz_l2,  0.0,           0.0,    0.0,           2.0*eiz_l,
        // Row 6: axial at j
        -ea_l,     0.0,          0.0,           0.0,    0.0,           0.0,          ea_l,      0.0,          0.0,           0.0,    0.0,           0.0,
        // Row 7: shear Fy at j
        0.0,       -12.0*eiz_l3, 0.0,           0.0,    0.0,           -6.0*eiz_l2,  0.0,       12.0*eiz_l3,  0.0,           0.0,    0.0,           -6.0*eiz_l2,
        // Row 8: shear Fz at j
        0.0,       0.0,          -12.0*eiy_l3,  0.0,    6.0*eiy_l2,    0.0,          0.0,       0.0,          12.0*eiy_l3,   0.0,    6.0*eiy_l2,    0.0,
        // Row 9: torsion at j
        0.0,       0.0,          0.0,           -gj_l,  0.0,           0.0,          0.0,       0.0,          0.0,           gj_l,   0.0,           0.0,
        // Row 10: moment My at j
        0.0,       0.0,          -6.0*eiy_l2,   0.0,    2.0*eiy_l,     0.0,          0.0,       0.0,          6.0*eiy_l2,    0.0,    4.0*eiy_l,     0.0,
        // Row 11: moment Mz at j
        0.0,       6.0*eiz_l2,   0.0,           0.0,    0.0,           2.0*eiz_l,    0.0,       -6.0*eiz_l2,  0.0,           0.0,    0.0,           4.0*eiz_l,
    ];

    Mat12::from_row_slice(&data)
}

/// Static condensation of released member-end DOFs
///
/// Partitions the local stiffness into kept (1) and released (2) DOFs and
/// caches `k12`, `k21` and `inv(k22)` so stiffness, fixed end reactions and
/// released-end displacements all use the same condensation.
#[derive(Debug, Clone)]
pub struct ReleaseCondensation {
    kept: Vec<usize>,
    released: Vec<usize>,
    k12: Mat,
    k21: Mat,
    k22_inv: Mat,
}

impl ReleaseCondensation {
    /// Build the condensation for a release pattern
    ///
    /// Returns `None` when the released block is singular, i.e. the releases
    /// leave the member with a mechanism of its own.
    pub fn new(k: &Mat12, releases: &[bool; 12]) -> Option<Self> {
        let kept: Vec<usize> = (0..12).filter(|&i| !releases[i]).collect();
        let released: Vec<usize> = (0..12).filter(|&i| releases[i]).collect();

        let n1 = kept.len();
        let n2 = released.len();

        let k12 = Mat::from_fn(n1, n2, |i, j| k[(kept[i], released[j])]);
        let k21 = Mat::from_fn(n2, n1, |i, j| k[(released[i], kept[j])]);
        let k22 = Mat::from_fn(n2, n2, |i, j| k[(released[i], released[j])]);

        let k22_inv = if n2 == 0 {
            Mat::zeros(0, 0)
        } else {
            // k22 is symmetric; it must also be positive definite with no vanishing pivot
            let chol = k22.clone().cholesky()?;
            let l = chol.l();
            let degenerate = (0..n2).any(|i| l[(i, i)] * l[(i, i)] <= 1e-10 * k22[(i, i)].abs());
            if degenerate {
                return None;
            }
            chol.inverse()
        };

        Some(Self {
            kept,
            released,
            k12,
            k21,
            k22_inv,
        })
    }

    /// True if no DOF is released
    pub fn is_trivial(&self) -> bool {
        self.released.is_empty()
    }

    /// Condensed stiffness `k11 - k12 * inv(k22) * k21`, zero rows/columns at released DOFs
    pub fn condense_stiffness(&self, k: &Mat12) -> Mat12 {
        if self.is_trivial() {
            return *k;
        }

        let correction = &self.k12 * &self.k22_inv * &self.k21;
        let mut k_result = Mat12::zeros();
        for (i, &ui) in self.kept.iter().enumerate() {
            for (j, &uj) in self.kept.iter().enumerate() {
                k_result[(ui, uj)] = k[(ui, uj)] - correction[(i, j)];
            }
        }
        k_result
    }

    /// Condensed fixed end reactions `fer1 - k12 * inv(k22) * fer2`, zero at released DOFs
    pub fn condense_fer(&self, fer: &Vec12) -> Vec12 {
        if self.is_trivial() {
            return *fer;
        }

        let fer2 = DVec::from_fn(self.released.len(), |i, _| fer[self.released[i]]);
        let correction = &self.k12 * (&self.k22_inv * fer2);

        let mut result = Vec12::zeros();
        for (i, &ui) in self.kept.iter().enumerate() {
            result[ui] = fer[ui] - correction[i];
        }
        result
    }

    /// Member-end displacements with the released DOFs recovered
    ///
    /// A released DOF carries no end force, so `k21 d1 + k22 d2 + fer2 = 0`
    /// gives `d2 = -inv(k22) (k21 d1 + fer2)`. `d` holds the node displacements
    /// in local axes; entries at released DOFs are replaced.
    pub fn recover_displacements(&self, d: &Vec12, fer: &Vec12) -> Vec12 {
        if self.is_trivial() {
            return *d;
        }

        let d1 = DVec::from_fn(self.kept.len(), |i, _| d[self.kept[i]]);
        let fer2 = DVec::from_fn(self.released.len(), |i, _| fer[self.released[i]]);
        let d2 = -(&self.k22_inv * (&self.k21 * d1 + fer2));

        let mut result = *d;
        for (i, &ri) in self.released.iter().enumerate() {
            result[ri] = d2[i];
        }
        result
    }
}

/// Hermite cubic shape functions [N1, N2, N3, N4] at distance `a` along a span `l`
fn hermite(a: f64, l: f64) -> [f64; 4] {
    let xi = a / l;
    let xi2 = xi * xi;
    let xi3 = xi2 * xi;
    [
        1.0 - 3.0 * xi2 + 2.0 * xi3,
        l * (xi - 2.0 * xi2 + xi3),
        3.0 * xi2 - 2.0 * xi3,
        l * (xi3 - xi2),
    ]
}

/// Derivatives d/dx of the Hermite shape functions
fn hermite_slope(a: f64, l: f64) -> [f64; 4] {
    let xi = a / l;
    let xi2 = xi * xi;
    [
        (6.0 * xi2 - 6.0 * xi) / l,
        1.0 - 4.0 * xi + 3.0 * xi2,
        (6.0 * xi - 6.0 * xi2) / l,
        3.0 * xi2 - 2.0 * xi,
    ]
}

/// Fixed end reactions for a concentrated force along a local axis
///
/// # Arguments
/// * `axis` - Local axis of the force (0=x, 1=y, 2=z)
/// * `p` - Load magnitude
/// * `a` - Distance from i-node to load
/// * `length` - Member length
pub fn fer_point_force(axis: usize, p: f64, a: f64, length: f64) -> Vec12 {
    let mut fer = Vec12::zeros();
    match axis {
        0 => {
            let xi = a / length;
            fer[0] = -p * (1.0 - xi);
            fer[6] = -p * xi;
        }
        1 => {
            let n = hermite(a, length);
            fer[1] = -p * n[0];
            fer[5] = -p * n[1];
            fer[7] = -p * n[2];
            fer[11] = -p * n[3];
        }
        2 => {
            let n = hermite(a, length);
            fer[2] = -p * n[0];
            fer[4] = p * n[1];
            fer[8] = -p * n[2];
            fer[10] = p * n[3];
        }
        _ => {}
    }
    fer
}

/// Fixed end reactions for a concentrated moment about a local axis
///
/// # Arguments
/// * `axis` - Local axis of the moment (0=x torsion, 1=y, 2=z)
/// * `m` - Moment magnitude (right-hand rule)
/// * `a` - Distance from i-node to load
/// * `length` - Member length
pub fn fer_point_moment(axis: usize, m: f64, a: f64, length: f64) -> Vec12 {
    let mut fer = Vec12::zeros();
    match axis {
        0 => {
            let xi = a / length;
            fer[3] = -m * (1.0 - xi);
            fer[9] = -m * xi;
        }
        1 => {
            let dn = hermite_slope(a, length);
            fer[2] = m * dn[0];
            fer[4] = -m * dn[1];
            fer[8] = m * dn[2];
            fer[10] = -m * dn[3];
        }
        2 => {
            let dn = hermite_slope(a, length);
            fer[1] = -m * dn[0];
            fer[5] = -m * dn[1];
            fer[7] = -m * dn[2];
            fer[11] = -m * dn[3];
        }
        _ => {}
    }
    fer
}

/// Fixed end reactions for a linearly varying distributed force
///
/// The load varies from `w1` at `x1` to `w2` at `x2`. Integrates the point
/// load reactions with 3-point Gauss-Legendre quadrature, which is exact for
/// the cubic shape functions times a linear load.
pub fn fer_linear_load(axis: usize, w1: f64, w2: f64, x1: f64, x2: f64, length: f64) -> Vec12 {
    const GAUSS_POINTS: [(f64, f64); 3] = [
        (-0.774_596_669_241_483_4, 5.0 / 9.0),
        (0.0, 8.0 / 9.0),
        (0.774_596_669_241_483_4, 5.0 / 9.0),
    ];

    let mut fer = Vec12::zeros();
    let span = x2 - x1;
    if span <= 0.0 {
        return fer;
    }

    let half = span / 2.0;
    let mid = (x1 + x2) / 2.0;
    for (xi, weight) in GAUSS_POINTS {
        let s = mid + half * xi;
        let w = w1 + (w2 - w1) * (s - x1) / span;
        fer += fer_point_force(axis, w * weight * half, s, length);
    }
    fer
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rotation(i: [f64; 3], j: [f64; 3], angle: f64) -> Mat3 {
        member_rotation_matrix(&Vec3::from(i), &Vec3::from(j), angle).unwrap()
    }

    fn assert_orthonormal(r: &Mat3) {
        let identity = r * r.transpose();
        for a in 0..3 {
            for b in 0..3 {
                let expected = if a == b { 1.0 } else { 0.0 };
                assert_relative_eq!(identity[(a, b)], expected, epsilon = 1e-12);
            }
        }
        assert_relative_eq!(r.determinant(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotation_matrix_horizontal() {
        let r = rotation([0.0, 0.0, 0.0], [10.0, 0.0, 0.0], 0.0);

        // local x = global X, local y = global Y, local z = global Z
        assert_relative_eq!(r[(0, 0)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(r[(1, 1)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(r[(2, 2)], 1.0, epsilon = 1e-10);
    }

    #[test]
    fn test_rotation_matrix_vertical() {
        let r = rotation([0.0, 0.0, 0.0], [0.0, 10.0, 0.0], 0.0);

        // local x = global Y, local y = -global X, local z = global Z
        assert_relative_eq!(r[(0, 1)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(r[(1, 0)], -1.0, epsilon = 1e-10);
        assert_relative_eq!(r[(2, 2)], 1.0, epsilon = 1e-10);

        let down = rotation([0.0, 10.0, 0.0], [0.0, 0.0, 0.0], 0.0);
        assert_relative_eq!(down[(1, 0)], 1.0, epsilon = 1e-10);
        assert_orthonormal(&down);
    }

    #[test]
    fn test_rotation_resolves_vertical_orientation() {
        let r = rotation([0.0, 0.0, 0.0], [0.0, 5.0, 0.0], std::f64::consts::FRAC_PI_2);

        // Quarter turn about local x: y takes the place of the old z axis
        assert_relative_eq!(r[(1, 2)], 1.0, epsilon = 1e-10);
        assert_relative_eq!(r[(2, 0)], 1.0, epsilon = 1e-10);
        assert_orthonormal(&r);
    }

    #[test]
    fn test_rotation_matrix_inclined() {
        let r = rotation([1.0, 2.0, 3.0], [4.0, 6.0, -2.0], 0.3);
        assert_orthonormal(&r);

        let up = rotation([0.0, 0.0, 0.0], [3.0, 4.0, 0.0], 0.0);
        // local z stays horizontal and local y points upward
        assert_relative_eq!(up[(2, 1)], 0.0, epsilon = 1e-12);
        assert!(up[(1, 1)] > 0.0);
    }

    #[test]
    fn test_zero_length_member() {
        let p = Vec3::new(1.0, 1.0, 1.0);
        assert!(member_rotation_matrix(&p, &p, 0.0).is_err());
    }

    #[test]
    fn test_local_stiffness_symmetry() {
        let k = member_local_stiffness(200e9, 77e9, 0.01, 1e-4, 2e-4, 1e-5, 10.0);
        for i in 0..12 {
            for j in 0..12 {
                assert_relative_eq!(k[(i, j)], k[(j, i)], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_uniform_load_fer() {
        let (w, l) = (-30.0, 6.0);
        let fer = fer_linear_load(1, w, w, 0.0, l, l);
        assert_relative_eq!(fer[1], -w * l / 2.0, epsilon = 1e-10);
        assert_relative_eq!(fer[5], -w * l * l / 12.0, epsilon = 1e-10);
        assert_relative_eq!(fer[7], -w * l / 2.0, epsilon = 1e-10);
        assert_relative_eq!(fer[11], w * l * l / 12.0, epsilon = 1e-10);

        let fer_z = fer_linear_load(2, w, w, 0.0, l, l);
        assert_relative_eq!(fer_z[4], w * l * l / 12.0, epsilon = 1e-10);
        assert_relative_eq!(fer_z[10], -w * l * l / 12.0, epsilon = 1e-10);
    }

    #[test]
    fn test_triangular_load_fer() {
        // Zero at i, w at j: end moments wL^2/30 and wL^2/20
        let (w, l) = (12.0, 5.0);
        let fer = fer_linear_load(1, 0.0, w, 0.0, l, l);
        assert_relative_eq!(fer[1], -3.0 * w * l / 20.0, epsilon = 1e-10);
        assert_relative_eq!(fer[7], -7.0 * w * l / 20.0, epsilon = 1e-10);
        assert_relative_eq!(fer[5], -w * l * l / 30.0, epsilon = 1e-10);
        assert_relative_eq!(fer[11], w * l * l / 20.0, epsilon = 1e-10);
    }

    #[test]
    fn test_point_load_fer() {
        let (p, a, l) = (-10.0, 2.0, 8.0);
        let b = l - a;
        let fer = fer_point_force(1, p, a, l);
        assert_relative_eq!(fer[1], -p * b * b * (3.0 * a + b) / l.powi(3), epsilon = 1e-10);
        assert_relative_eq!(fer[5], -p * a * b * b / (l * l), epsilon = 1e-10);
        assert_relative_eq!(fer[7], -p * a * a * (a + 3.0 * b) / l.powi(3), epsilon = 1e-10);
        assert_relative_eq!(fer[11], p * a * a * b / (l * l), epsilon = 1e-10);

        let axial = fer_point_force(0, p, a, l);
        assert_relative_eq!(axial[0], -p * b / l, epsilon = 1e-10);
        assert_relative_eq!(axial[6], -p * a / l, epsilon = 1e-10);
    }

    #[test]
    fn test_point_moment_fer() {
        // Moment at midspan of a fixed-fixed beam: M/4 at both ends, 3M/2L shears
        let (m, l) = (40.0, 4.0);
        let fer = fer_point_moment(2, m, l / 2.0, l);
        assert_relative_eq!(fer[1], 1.5 * m / l, epsilon = 1e-10);
        assert_relative_eq!(fer[7], -1.5 * m / l, epsilon = 1e-10);
        assert_relative_eq!(fer[5], 0.25 * m, epsilon = 1e-10);
        assert_relative_eq!(fer[11], 0.25 * m, epsilon = 1e-10);

        // A moment applied at the i-node goes straight to that node
        let at_end = fer_point_moment(2, m, 0.0, l);
        assert_relative_eq!(at_end[5], -m, epsilon = 1e-10);
        assert_relative_eq!(at_end[1], 0.0, epsilon = 1e-10);
    }

    #[test]
    fn test_release_condensation() {
        let k = member_local_stiffness(200e9, 77e9, 0.01, 1e-4, 2e-4, 1e-5, 10.0);
        let releases = crate::elements::MemberReleases::pin_j().as_array();
        let cond = ReleaseCondensation::new(&k, &releases).unwrap();
        let kc = cond.condense_stiffness(&k);

        // Propped cantilever: rotational stiffness at i drops from 4EI/L to 3EI/L
        assert_relative_eq!(kc[(5, 5)], 3.0 * 200e9 * 2e-4 / 10.0, max_relative = 1e-10);
        for i in 0..12 {
            assert_relative_eq!(kc[(11, i)], 0.0);
            assert_relative_eq!(kc[(i, 11)], 0.0);
        }

        // Uniform load on a propped cantilever: fixed end moment wL^2/8
        let w = -2.0;
        let fer = fer_linear_load(1, w, w, 0.0, 10.0, 10.0);
        let fer_c = cond.condense_fer(&fer);
        assert_relative_eq!(fer_c[5], -w * 100.0 / 8.0, max_relative = 1e-10);
        assert_relative_eq!(fer_c[11], 0.0);
    }

    #[test]
    fn test_release_mechanism_rejected() {
        let k = member_local_stiffness(200e9, 77e9, 0.01, 1e-4, 2e-4, 1e-5, 10.0);
        let mut releases = [false; 12];
        releases[3] = true;
        releases[9] = true;
        assert!(ReleaseCondensation::new(&k, &releases).is_none());
    }

    #[test]
    fn test_recovered_released_rotation() {
        // Cantilever pinned at j rigidly held at both ends: a rotation at j is
        // recovered from the condition that the end moment vanishes.
        let k = member_local_stiffness(1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0);
        let releases = crate::elements::MemberReleases::pin_j().as_array();
        let cond = ReleaseCondensation::new(&k, &releases).unwrap();

        let mut d = Vec12::zeros();
        d[5] = 0.01; // rotation at i
        let fer = Vec12::zeros();
        let full = cond.recover_displacements(&d, &fer);

        // 2EI/L * th_i + 4EI/L * th_j = 0
        assert_relative_eq!(full[11], -0.005, epsilon = 1e-12);
        let forces = k * full;
        assert_relative_eq!(forces[11], 0.0, epsilon = 1e-12);
    }
}
