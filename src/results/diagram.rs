//! Internal force and deflection diagrams along a member
//!
//! Every quantity is stored as a sum of singularity (Macaulay) terms
//! `c <x - a>^n`, so evaluation is exact at any position and the sampling
//! iterator is only a convenience on top of [`MemberDiagram::value`].

use serde::{Deserialize, Serialize};

use crate::analysis::load_vectors::LocalMemberLoads;
use crate::math::Vec12;

/// A quantity that can be read from a member diagram, in member local axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    /// Axial force N (tension positive)
    Axial,
    /// Shear force Vy along local y
    ShearY,
    /// Shear force Vz along local z
    ShearZ,
    /// Torque about local x
    Torque,
    /// Bending moment about local y
    MomentY,
    /// Bending moment about local z
    MomentZ,
    /// Axial displacement u
    DeflectionX,
    /// Deflection v along local y
    DeflectionY,
    /// Deflection w along local z
    DeflectionZ,
    /// Twist angle about local x
    Twist,
}

impl Quantity {
    /// Every quantity, in diagram order
    pub const ALL: [Quantity; 10] = [
        Quantity::Axial,
        Quantity::ShearY,
        Quantity::ShearZ,
        Quantity::Torque,
        Quantity::MomentY,
        Quantity::MomentZ,
        Quantity::DeflectionX,
        Quantity::DeflectionY,
        Quantity::DeflectionZ,
        Quantity::Twist,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// One singularity term `coeff * <x - start>^power`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Term {
    coeff: f64,
    start: f64,
    power: i32,
}

impl Term {
    fn eval(&self, x: f64) -> f64 {
        if x < self.start {
            0.0
        } else if self.power == 0 {
            self.coeff
        } else {
            self.coeff * (x - self.start).powi(self.power)
        }
    }

    /// Value approached from the left; only step terms differ from `eval`
    fn eval_left(&self, x: f64) -> f64 {
        if self.power == 0 && x <= self.start {
            0.0
        } else {
            self.eval(x)
        }
    }

    fn integrate(&self) -> Term {
        let power = self.power + 1;
        Term {
            coeff: self.coeff / f64::from(power),
            start: self.start,
            power,
        }
    }
}

/// A sum of singularity terms
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Singularity {
    terms: Vec<Term>,
}

impl Singularity {
    fn push(&mut self, coeff: f64, start: f64, power: i32) {
        if coeff != 0.0 {
            self.terms.push(Term { coeff, start, power });
        }
    }

    /// Linearly varying intensity from `w1` at `x1` to `w2` at `x2`, zero elsewhere
    fn push_linear(&mut self, w1: f64, w2: f64, x1: f64, x2: f64) {
        let span = x2 - x1;
        if span <= 0.0 {
            return;
        }
        let slope = (w2 - w1) / span;
        self.push(w1, x1, 0);
        self.push(slope, x1, 1);
        self.push(-w2, x2, 0);
        self.push(-slope, x2, 1);
    }

    fn add_scaled(&mut self, other: &Singularity, factor: f64) {
        for term in &other.terms {
            self.push(term.coeff * factor, term.start, term.power);
        }
    }

    fn scaled(&self, factor: f64) -> Singularity {
        let mut result = Singularity::default();
        result.add_scaled(self, factor);
        result
    }

    fn integrate(&self) -> Singularity {
        Singularity {
            terms: self.terms.iter().map(Term::integrate).collect(),
        }
    }

    fn eval(&self, x: f64) -> f64 {
        self.terms.iter().map(|t| t.eval(x)).sum()
    }

    fn eval_left(&self, x: f64) -> f64 {
        self.terms.iter().map(|t| t.eval_left(x)).sum()
    }
}

/// Axial, flexural and torsional rigidities of a member
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionRigidity {
    pub ea: f64,
    pub eiy: f64,
    pub eiz: f64,
    pub gj: f64,
}

/// Continuous internal actions and deflections along one member for one combination
///
/// Internal actions are the resultants exerted on the segment `[0, x]` by the
/// rest of the member, expressed in local axes. Deflections satisfy
/// `EIz v'' = Mz`, `EIy w'' = -My`, `EA u' = N` and `GJ phi' = T`, with the
/// member's i-end displacements as boundary conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDiagram {
    length: f64,
    functions: Vec<Singularity>,
    breakpoints: Vec<f64>,
}

impl MemberDiagram {
    /// Build the diagram from local end forces, local end displacements and
    /// the member loads of one combination
    pub(crate) fn new(
        length: f64,
        rigidity: SectionRigidity,
        end_forces: &Vec12,
        end_displacements: &Vec12,
        loads: &LocalMemberLoads,
    ) -> Self {
        let f = end_forces;
        let d = end_displacements;

        // Resultants of everything acting on [0, x]
        let mut fx = Singularity::default();
        let mut fy = Singularity::default();
        let mut fz = Singularity::default();
        let mut mx = Singularity::default();
        let mut my = Singularity::default();
        let mut mz = Singularity::default();

        fx.push(f[0], 0.0, 0);
        fy.push(f[1], 0.0, 0);
        fz.push(f[2], 0.0, 0);
        mx.push(f[3], 0.0, 0);
        my.push(f[4], 0.0, 0);
        mz.push(f[5], 0.0, 0);

        let mut breakpoints = vec![0.0, length];

        for &(a, force) in &loads.point_forces {
            fx.push(force[0], a, 0);
            fy.push(force[1], a, 0);
            fz.push(force[2], a, 0);
            breakpoints.push(a);
        }

        for &(a, moment) in &loads.point_moments {
            mx.push(moment[0], a, 0);
            my.push(moment[1], a, 0);
            mz.push(moment[2], a, 0);
            breakpoints.push(a);
        }

        let mut qx = Singularity::default();
        let mut qy = Singularity::default();
        let mut qz = Singularity::default();
        for load in &loads.linear {
            qx.push_linear(load.w1[0], load.w2[0], load.x1, load.x2);
            qy.push_linear(load.w1[1], load.w2[1], load.x1, load.x2);
            qz.push_linear(load.w1[2], load.w2[2], load.x1, load.x2);
            breakpoints.push(load.x1);
            breakpoints.push(load.x2);
        }
        fx.add_scaled(&qx.integrate(), 1.0);
        fy.add_scaled(&qy.integrate(), 1.0);
        fz.add_scaled(&qz.integrate(), 1.0);

        let axial = fx.scaled(-1.0);
        let shear_y = fy.scaled(-1.0);
        let shear_z = fz.scaled(-1.0);
        let torque = mx.scaled(-1.0);

        let mut moment_z = fy.integrate();
        moment_z.add_scaled(&mz, -1.0);

        let mut moment_y = fz.integrate().scaled(-1.0);
        moment_y.add_scaled(&my, -1.0);

        let mut deflection_x = Singularity::default();
        deflection_x.push(d[0], 0.0, 0);
        deflection_x.add_scaled(&axial.integrate(), 1.0 / rigidity.ea);

        let mut deflection_y = Singularity::default();
        deflection_y.push(d[1], 0.0, 0);
        deflection_y.push(d[5], 0.0, 1);
        deflection_y.add_scaled(&moment_z.integrate().integrate(), 1.0 / rigidity.eiz);

        let mut deflection_z = Singularity::default();
        deflection_z.push(d[2], 0.0, 0);
        deflection_z.push(-d[4], 0.0, 1);
        deflection_z.add_scaled(&moment_y.integrate().integrate(), -1.0 / rigidity.eiy);

        let mut twist = Singularity::default();
        twist.push(d[3], 0.0, 0);
        twist.add_scaled(&torque.integrate(), 1.0 / rigidity.gj);

        breakpoints.retain(|x| x.is_finite() && *x >= 0.0 && *x <= length);
        breakpoints.sort_by(f64::total_cmp);
        breakpoints.dedup();

        Self {
            length,
            functions: vec![
                axial,
                shear_y,
                shear_z,
                torque,
                moment_y,
                moment_z,
                deflection_x,
                deflection_y,
                deflection_z,
                twist,
            ],
            breakpoints,
        }
    }

    /// Member length
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Value of `quantity` at distance `x` from the i-node
    ///
    /// `x` is clamped to `[0, L]`. At a concentrated load the value just past
    /// the load is returned.
    pub fn value(&self, quantity: Quantity, x: f64) -> f64 {
        let x = x.clamp(0.0, self.length);
        self.functions[quantity.index()].eval(x)
    }

    /// Value of `quantity` at a fraction (0 to 1) of the member length
    pub fn value_at_fraction(&self, quantity: Quantity, fraction: f64) -> f64 {
        self.value(quantity, fraction * self.length)
    }

    /// Limit of `quantity` approaching `x` from the i-node side
    pub fn value_left(&self, quantity: Quantity, x: f64) -> f64 {
        let x = x.clamp(0.0, self.length);
        self.functions[quantity.index()].eval_left(x)
    }

    /// Positions where a load starts, ends or is concentrated, including both ends
    pub fn breakpoints(&self) -> &[f64] {
        &self.breakpoints
    }

    /// `count` evenly spaced `(x, value)` pairs from the i-node to the j-node
    ///
    /// The iterator is lazy; cloning it (or calling this again) restarts the sequence.
    pub fn samples(&self, quantity: Quantity, count: usize) -> Samples<'_> {
        Samples {
            diagram: self,
            quantity,
            count,
            next: 0,
        }
    }

    /// Position and value of the largest value of `quantity`
    pub fn max(&self, quantity: Quantity) -> (f64, f64) {
        self.extreme(quantity, 1.0)
    }

    /// Position and value of the smallest value of `quantity`
    pub fn min(&self, quantity: Quantity) -> (f64, f64) {
        self.extreme(quantity, -1.0)
    }

    fn extreme(&self, quantity: Quantity, sign: f64) -> (f64, f64) {
        const SEGMENT_SAMPLES: usize = 24;

        let f = &self.functions[quantity.index()];
        let score = |x: f64| sign * f.eval(x);

        let mut best_x = 0.0;
        let mut best = f.eval(0.0);
        let mut consider = |x: f64, value: f64| {
            if sign * value > sign * best {
                best = value;
                best_x = x;
            }
        };

        for &x in &self.breakpoints {
            consider(x, f.eval(x));
            consider(x, f.eval_left(x));
        }

        for pair in self.breakpoints.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let step = (b - a) / SEGMENT_SAMPLES as f64;
            if step <= 0.0 {
                continue;
            }

            let mut best_i = 1;
            let mut best_score = f64::NEG_INFINITY;
            for i in 1..SEGMENT_SAMPLES {
                let s = score(a + step * i as f64);
                if s > best_score {
                    best_score = s;
                    best_i = i;
                }
            }

            let lo = a + step * (best_i - 1) as f64;
            let hi = a + step * (best_i + 1) as f64;
            let x = golden_section_max(&score, lo, hi);
            consider(x, f.eval(x));
        }

        (best_x, best)
    }
}

/// Maximize `f` on `[lo, hi]` assuming a single peak
fn golden_section_max<F: Fn(f64) -> f64>(f: &F, mut lo: f64, mut hi: f64) -> f64 {
    const INV_PHI: f64 = 0.618_033_988_749_894_8;

    let mut c = hi - INV_PHI * (hi - lo);
    let mut d = lo + INV_PHI * (hi - lo);
    let mut fc = f(c);
    let mut fd = f(d);

    for _ in 0..60 {
        if (hi - lo).abs() <= 1e-12 * (1.0 + lo.abs().max(hi.abs())) {
            break;
        }
        if fc > fd {
            hi = d;
            d = c;
            fd = fc;
            c = hi - INV_PHI * (hi - lo);
            fc = f(c);
        } else {
            lo = c;
            c = d;
            fc = fd;
            d = lo + INV_PHI * (hi - lo);
            fd = f(d);
        }
    }

    (lo + hi) / 2.0
}

/// Lazy, restartable sequence of `(x, value)` pairs along a member
#[derive(Debug, Clone)]
pub struct Samples<'a> {
    diagram: &'a MemberDiagram,
    quantity: Quantity,
    count: usize,
    next: usize,
}

impl Iterator for Samples<'_> {
    type Item = (f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.count {
            return None;
        }
        let x = if self.count == 1 {
            0.0
        } else if self.next + 1 == self.count {
            self.diagram.length
        } else {
            self.diagram.length * self.next as f64 / (self.count - 1) as f64
        };
        self.next += 1;
        Some((x, self.diagram.value(self.quantity, x)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.count.saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Samples<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::load_vectors::LinearLoad;
    use crate::math::Vec3;
    use approx::assert_relative_eq;

    const RIGID: SectionRigidity = SectionRigidity {
        ea: 1.0e6,
        eiy: 2.0e3,
        eiz: 3.0e3,
        gj: 1.0e3,
    };

    /// Simply supported span with a downward point load at midspan
    fn midspan_point_load(p: f64, l: f64) -> MemberDiagram {
        let mut f = Vec12::zeros();
        f[1] = p / 2.0;
        f[7] = p / 2.0;

        let theta = p * l * l / (16.0 * RIGID.eiz);
        let mut d = Vec12::zeros();
        d[5] = -theta;
        d[11] = theta;

        let loads = LocalMemberLoads {
            point_forces: vec![(l / 2.0, Vec3::new(0.0, -p, 0.0))],
            ..Default::default()
        };
        MemberDiagram::new(l, RIGID, &f, &d, &loads)
    }

    #[test]
    fn test_midspan_point_load() {
        let (p, l) = (10.0, 4.0);
        let diagram = midspan_point_load(p, l);

        assert_relative_eq!(diagram.value(Quantity::MomentZ, l / 2.0), p * l / 4.0, epsilon = 1e-12);
        assert_relative_eq!(diagram.value(Quantity::MomentZ, l), 0.0, epsilon = 1e-12);
        assert_relative_eq!(diagram.value(Quantity::ShearY, 0.0), -p / 2.0, epsilon = 1e-12);
        assert_relative_eq!(diagram.value(Quantity::ShearY, l), p / 2.0, epsilon = 1e-12);
        assert_relative_eq!(diagram.value_left(Quantity::ShearY, l / 2.0), -p / 2.0, epsilon = 1e-12);

        // PL^3/48EI at midspan, back to zero at the j-node
        let delta = p * l.powi(3) / (48.0 * RIGID.eiz);
        assert_relative_eq!(diagram.value(Quantity::DeflectionY, l / 2.0), -delta, epsilon = 1e-12);
        assert_relative_eq!(diagram.value(Quantity::DeflectionY, l), 0.0, epsilon = 1e-12);

        let (x_min, v_min) = diagram.min(Quantity::DeflectionY);
        assert_relative_eq!(x_min, l / 2.0, epsilon = 1e-6);
        assert_relative_eq!(v_min, -delta, epsilon = 1e-12);

        let (x_max, m_max) = diagram.max(Quantity::MomentZ);
        assert_relative_eq!(x_max, l / 2.0, epsilon = 1e-9);
        assert_relative_eq!(m_max, p * l / 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uniform_load_in_local_z() {
        // Simply supported in the xz plane, uniform w along local z
        let (w, l) = (-3.0, 6.0);
        let mut f = Vec12::zeros();
        f[2] = -w * l / 2.0;
        f[8] = -w * l / 2.0;

        let loads = LocalMemberLoads {
            linear: vec![LinearLoad {
                x1: 0.0,
                x2: l,
                w1: Vec3::new(0.0, 0.0, w),
                w2: Vec3::new(0.0, 0.0, w),
            }],
            ..Default::default()
        };

        // End slopes of a simply supported beam: w' = w L^3 / 24 EI at i
        let slope = w * l.powi(3) / (24.0 * RIGID.eiy);
        let mut d = Vec12::zeros();
        d[4] = -slope;
        d[10] = slope;

        let diagram = MemberDiagram::new(l, RIGID, &f, &d, &loads);
        assert_relative_eq!(diagram.value(Quantity::MomentY, l / 2.0), w * l * l / 8.0, epsilon = 1e-12);
        assert_relative_eq!(diagram.value(Quantity::ShearZ, l), -w * l / 2.0, epsilon = 1e-12);
        let delta = 5.0 * w * l.powi(4) / (384.0 * RIGID.eiy);
        assert_relative_eq!(diagram.value(Quantity::DeflectionZ, l / 2.0), delta, epsilon = 1e-12);
        assert_relative_eq!(diagram.value(Quantity::DeflectionZ, l), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_axial_and_torque() {
        let l = 2.0;
        let mut f = Vec12::zeros();
        f[0] = -5.0; // pulled at i
        f[6] = 5.0;
        f[3] = -7.0;
        f[9] = 7.0;
        let mut d = Vec12::zeros();
        d[3] = 0.002;
        d[6] = 5.0 * l / RIGID.ea;
        d[9] = d[3] + 7.0 * l / RIGID.gj;

        let diagram = MemberDiagram::new(l, RIGID, &f, &d, &LocalMemberLoads::default());
        assert_relative_eq!(diagram.value(Quantity::Axial, 1.0), 5.0);
        assert_relative_eq!(diagram.value(Quantity::Torque, 1.0), 7.0);
        assert_relative_eq!(diagram.value(Quantity::DeflectionX, l), d[6], epsilon = 1e-15);

        // Twist grows linearly from the i-end rotation at T/GJ
        assert_relative_eq!(diagram.value(Quantity::Twist, 0.0), d[3], epsilon = 1e-15);
        assert_relative_eq!(diagram.value(Quantity::Twist, 1.0), d[3] + 7.0 / RIGID.gj, epsilon = 1e-15);
        assert_relative_eq!(diagram.value(Quantity::Twist, l), d[9], epsilon = 1e-15);
        assert_relative_eq!(diagram.max(Quantity::Twist).0, l, epsilon = 1e-9);
    }

    #[test]
    fn test_samples_are_restartable() {
        let diagram = midspan_point_load(10.0, 4.0);
        let samples = diagram.samples(Quantity::MomentZ, 5);
        assert_eq!(samples.len(), 5);

        let first: Vec<_> = samples.clone().collect();
        let second: Vec<_> = samples.collect();
        assert_eq!(first, second);
        assert_relative_eq!(first[0].0, 0.0);
        assert_relative_eq!(first[4].0, 4.0);
        assert_relative_eq!(first[2].1, 10.0, epsilon = 1e-12);

        // Sampling density never changes the evaluated values
        for (x, v) in diagram.samples(Quantity::MomentZ, 101) {
            assert_relative_eq!(v, diagram.value(Quantity::MomentZ, x));
        }
        assert_eq!(diagram.samples(Quantity::Axial, 0).count(), 0);
    }
}
