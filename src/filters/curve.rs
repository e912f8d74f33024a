//! Intensity curves fitted through sparse control points.
//!
//! Two or three points give a piecewise-linear curve. Four or more give a
//! cubic spline with not-a-knot end conditions, passing through every
//! point. Evaluation outside the fitted x-range is not an error: it yields
//! `None`, which the lookup-table builder maps to a safe value.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum number of control points for a spline fit.
/// Quadratic interpolation is not supported, so 2 and 3 points stay linear.
const CUBIC_MIN_POINTS: usize = 4;

/// Errors that can occur while building a curve.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CurveError {
    /// Control point x values must strictly increase.
    #[error("control point {index} has x={x}, which does not exceed the previous x={previous}")]
    NonIncreasing {
        /// Position of the offending point.
        index: usize,
        /// Its x value.
        x: u16,
        /// x of the point before it.
        previous: u16,
    },
}

/// An (input, output) intensity pair.
///
/// Serialized as a two-element array so TOML stays compact:
/// `value = [[0, 0], [128, 140], [255, 255]]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u16, u16)", into = "(u16, u16)")]
pub struct ControlPoint {
    /// Input intensity.
    pub x: u16,
    /// Output intensity.
    pub y: u16,
}

impl ControlPoint {
    /// A control point mapping input `x` to output `y`.
    pub const fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }
}

impl From<(u16, u16)> for ControlPoint {
    fn from((x, y): (u16, u16)) -> Self {
        Self { x, y }
    }
}

impl From<ControlPoint> for (u16, u16) {
    fn from(point: ControlPoint) -> Self {
        (point.x, point.y)
    }
}

/// A continuous intensity mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum CurveFunction {
    /// Straight segments between 2 or 3 points.
    Linear(LinearCurve),
    /// Cubic spline through 4 or more points.
    Cubic(CubicSpline),
    /// One curve applied to the output of another.
    Composite(CompositeFunction),
}

impl CurveFunction {
    /// Fits a curve through `points`.
    ///
    /// Returns `Ok(None)` for fewer than two points: no curve means the
    /// identity transform downstream. Points must have strictly
    /// increasing x.
    pub fn build(points: &[ControlPoint]) -> Result<Option<Self>, CurveError> {
        if points.len() < 2 {
            return Ok(None);
        }

        for (index, pair) in points.windows(2).enumerate() {
            if pair[1].x <= pair[0].x {
                return Err(CurveError::NonIncreasing {
                    index: index + 1,
                    x: pair[1].x,
                    previous: pair[0].x,
                });
            }
        }

        let xs: Vec<f64> = points.iter().map(|p| f64::from(p.x)).collect();
        let ys: Vec<f64> = points.iter().map(|p| f64::from(p.y)).collect();

        let curve = if points.len() < CUBIC_MIN_POINTS {
            CurveFunction::Linear(LinearCurve { xs, ys })
        } else {
            CurveFunction::Cubic(CubicSpline::not_a_knot(xs, ys))
        };
        Ok(Some(curve))
    }

    /// Evaluates the curve at `x`.
    ///
    /// Returns `None` when `x` lies outside the fitted range.
    pub fn eval(&self, x: f64) -> Option<f64> {
        match self {
            CurveFunction::Linear(curve) => curve.eval(x),
            CurveFunction::Cubic(curve) => curve.eval(x),
            CurveFunction::Composite(curve) => curve.eval(x),
        }
    }
}

/// Piecewise-linear interpolation.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearCurve {
    xs: Vec<f64>,
    ys: Vec<f64>,
}

impl LinearCurve {
    fn eval(&self, x: f64) -> Option<f64> {
        let i = segment(&self.xs, x)?;
        let t = (x - self.xs[i]) / (self.xs[i + 1] - self.xs[i]);
        Some(self.ys[i] + t * (self.ys[i + 1] - self.ys[i]))
    }
}

/// Interpolating cubic spline, stored as knot values plus the second
/// derivative at each knot.
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    xs: Vec<f64>,
    ys: Vec<f64>,
    second: Vec<f64>,
}

impl CubicSpline {
    /// Fits a spline whose third derivative is continuous across the second
    /// and second-to-last knots. Requires at least four strictly
    /// increasing knots.
    fn not_a_knot(xs: Vec<f64>, ys: Vec<f64>) -> Self {
        let n = xs.len();
        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();

        let mut matrix = vec![vec![0.0; n]; n];
        let mut rhs = vec![0.0; n];

        matrix[0][0] = h[1];
        matrix[0][1] = -(h[0] + h[1]);
        matrix[0][2] = h[0];

        for i in 1..n - 1 {
            matrix[i][i - 1] = h[i - 1];
            matrix[i][i] = 2.0 * (h[i - 1] + h[i]);
            matrix[i][i + 1] = h[i];
            rhs[i] = 6.0 * ((ys[i + 1] - ys[i]) / h[i] - (ys[i] - ys[i - 1]) / h[i - 1]);
        }

        matrix[n - 1][n - 3] = h[n - 2];
        matrix[n - 1][n - 2] = -(h[n - 3] + h[n - 2]);
        matrix[n - 1][n - 1] = h[n - 3];

        let second = solve_dense(matrix, rhs);
        Self { xs, ys, second }
    }

    fn eval(&self, x: f64) -> Option<f64> {
        let i = segment(&self.xs, x)?;
        let h = self.xs[i + 1] - self.xs[i];
        let left = self.xs[i + 1] - x;
        let right = x - self.xs[i];
        // Knots return their exact value so composed curves stay in range.
        if right == 0.0 {
            return Some(self.ys[i]);
        }
        if left == 0.0 {
            return Some(self.ys[i + 1]);
        }
        let (m0, m1) = (self.second[i], self.second[i + 1]);

        Some(
            m0 * left.powi(3) / (6.0 * h)
                + m1 * right.powi(3) / (6.0 * h)
                + (self.ys[i] / h - m0 * h / 6.0) * left
                + (self.ys[i + 1] / h - m1 * h / 6.0) * right,
        )
    }
}

/// `x → outer(inner(x))`.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeFunction {
    outer: Box<CurveFunction>,
    inner: Box<CurveFunction>,
}

impl CompositeFunction {
    fn eval(&self, x: f64) -> Option<f64> {
        self.inner.eval(x).and_then(|y| self.outer.eval(y))
    }
}

/// Chains two optional curves as `x → f0(f1(x))`.
///
/// An absent curve is the identity, so composing with `None` returns the
/// other curve unchanged.
pub fn compose(f0: Option<CurveFunction>, f1: Option<CurveFunction>) -> Option<CurveFunction> {
    match (f0, f1) {
        (None, f) | (f, None) => f,
        (Some(outer), Some(inner)) => Some(CurveFunction::Composite(CompositeFunction {
            outer: Box::new(outer),
            inner: Box::new(inner),
        })),
    }
}

/// Index of the knot interval containing `x`, or `None` outside the range.
fn segment(xs: &[f64], x: f64) -> Option<usize> {
    let first = *xs.first()?;
    let last = *xs.last()?;
    if !(first..=last).contains(&x) {
        return None;
    }
    let i = xs.partition_point(|&k| k <= x).saturating_sub(1);
    Some(i.min(xs.len() - 2))
}

/// Gaussian elimination with partial pivoting on a small dense system.
fn solve_dense(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Vec<f64> {
    let n = b.len();

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&r, &s| a[r][col].abs().total_cmp(&a[s][col].abs()))
            .unwrap_or(col);
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn points(raw: &[(u16, u16)]) -> Vec<ControlPoint> {
        raw.iter().copied().map(ControlPoint::from).collect()
    }

    #[test]
    fn test_fewer_than_two_points_is_identity() {
        assert_eq!(CurveFunction::build(&[]).unwrap(), None);
        assert_eq!(CurveFunction::build(&points(&[(10, 20)])).unwrap(), None);
    }

    #[test]
    fn test_point_count_selects_interpolation() {
        let two = CurveFunction::build(&points(&[(0, 0), (255, 255)])).unwrap();
        let three = CurveFunction::build(&points(&[(0, 0), (128, 100), (255, 255)])).unwrap();
        let four =
            CurveFunction::build(&points(&[(0, 0), (64, 50), (192, 210), (255, 255)])).unwrap();

        assert!(matches!(two, Some(CurveFunction::Linear(_))));
        assert!(matches!(three, Some(CurveFunction::Linear(_))));
        assert!(matches!(four, Some(CurveFunction::Cubic(_))));
    }

    #[test]
    fn test_non_increasing_x_rejected() {
        let err = CurveFunction::build(&points(&[(0, 0), (50, 10), (50, 20)])).unwrap_err();
        assert_eq!(
            err,
            CurveError::NonIncreasing {
                index: 2,
                x: 50,
                previous: 50
            }
        );
    }

    #[test]
    fn test_linear_interpolates_between_points() {
        let curve = CurveFunction::build(&points(&[(0, 0), (100, 200), (200, 200)]))
            .unwrap()
            .unwrap();

        assert_eq!(curve.eval(50.0), Some(100.0));
        assert_eq!(curve.eval(150.0), Some(200.0));
        assert_eq!(curve.eval(200.0), Some(200.0));
    }

    #[test]
    fn test_out_of_range_is_none() {
        let curve = CurveFunction::build(&points(&[(10, 10), (200, 250)]))
            .unwrap()
            .unwrap();

        assert_eq!(curve.eval(9.0), None);
        assert_eq!(curve.eval(201.0), None);
        assert_eq!(curve.eval(f64::NAN), None);
    }

    #[test]
    fn test_spline_reproduces_cubic_polynomial() {
        // Not-a-knot splines are exact for cubics.
        let p = |x: f64| 0.0001 * x * x * x - 0.02 * x * x + 2.0 * x;
        let xs = vec![0.0, 20.0, 70.0, 90.0, 160.0];
        let ys: Vec<f64> = xs.iter().map(|&x| p(x)).collect();
        let spline = CubicSpline::not_a_knot(xs, ys);

        for x in [5.0, 33.3, 80.0, 120.5, 159.0] {
            let got = spline.eval(x).unwrap();
            assert!((got - p(x)).abs() < 1e-6, "x={x}: got {got}, want {}", p(x));
        }
    }

    #[test]
    fn test_spline_passes_through_knots() {
        let raw = points(&[(0, 0), (25, 21), (122, 153), (165, 206), (255, 255)]);
        let curve = CurveFunction::build(&raw).unwrap().unwrap();

        for point in &raw {
            let y = curve.eval(f64::from(point.x)).unwrap();
            assert!((y - f64::from(point.y)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_compose_applies_inner_first() {
        let double = CurveFunction::build(&points(&[(0, 0), (100, 200)])).unwrap();
        let offset = CurveFunction::build(&points(&[(0, 10), (200, 210)])).unwrap();

        let composite = compose(offset, double).unwrap();
        assert_eq!(composite.eval(50.0), Some(110.0));
        // Inner result outside the outer range.
        let narrow = CurveFunction::build(&points(&[(0, 0), (50, 50)])).unwrap();
        let wide = CurveFunction::build(&points(&[(0, 0), (100, 200)])).unwrap();
        assert_eq!(compose(narrow, wide).unwrap().eval(40.0), None);
    }

    #[test]
    fn test_compose_with_absent() {
        let f = CurveFunction::build(&points(&[(0, 5), (255, 250)])).unwrap();

        assert_eq!(compose(f.clone(), None), f);
        assert_eq!(compose(None, f.clone()), f);
        assert_eq!(compose(None, None), None);
    }

    #[test]
    fn test_control_point_toml_shape() {
        #[derive(Deserialize)]
        struct Wrapper {
            points: Vec<ControlPoint>,
        }
        let parsed: Wrapper = toml::from_str("points = [[0, 0], [128, 140]]").unwrap();
        assert_eq!(parsed.points, points(&[(0, 0), (128, 140)]));
    }

    fn increasing_points() -> impl Strategy<Value = Vec<ControlPoint>> {
        prop::collection::btree_set(0u16..=255, 2..8).prop_flat_map(|xs| {
            let n = xs.len();
            (Just(xs), prop::collection::vec(0u16..=255, n)).prop_map(|(xs, ys)| {
                xs.into_iter()
                    .zip(ys)
                    .map(|(x, y)| ControlPoint::new(x, y))
                    .collect()
            })
        })
    }

    proptest! {
        #[test]
        fn prop_curve_hits_every_knot(raw in increasing_points()) {
            let curve = CurveFunction::build(&raw).unwrap().unwrap();
            for point in &raw {
                let y = curve.eval(f64::from(point.x)).unwrap();
                prop_assert!((y - f64::from(point.y)).abs() < 1e-6);
            }
        }

        #[test]
        fn prop_compose_identity_laws(raw in increasing_points(), x in 0.0f64..=255.0) {
            let f = CurveFunction::build(&raw).unwrap();
            prop_assert_eq!(compose(f.clone(), None).and_then(|c| c.eval(x)), f.as_ref().and_then(|c| c.eval(x)));
            prop_assert_eq!(compose(None, f.clone()).and_then(|c| c.eval(x)), f.as_ref().and_then(|c| c.eval(x)));
        }
    }
}
