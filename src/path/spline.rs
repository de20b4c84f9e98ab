// Clamped cubic Hermite splines through a list of waypoints

use crate::error::{Result, SwerveError};
use crate::geometry::{Pose, Rotation, Translation};

/// Subdivision limits between consecutive samples of a spline
const MAX_DX: f64 = 0.127;
const MAX_DY: f64 = 0.00127;
const MAX_DTHETA: f64 = 0.0872;

/// Guard against splines that never meet the subdivision limits
const MAX_ITERATIONS: usize = 5000;

/// A tangent this short means the curve has a cusp
const MIN_TANGENT: f64 = 1e-9;

/// End tangents are this many times the distance to the neighbouring point
const TANGENT_SCALE: f64 = 1.2;

/// A pose on the path plus its signed curvature (rad/m)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseWithCurvature {
    pub pose: Pose,
    pub curvature: f64,
}

/// Position and first derivative of one endpoint, per axis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlVector {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl ControlVector {
    fn position(&self) -> Translation {
        Translation::new(self.x[0], self.y[0])
    }
}

/// One cubic segment: x(t), y(t) for t in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicHermiteSpline {
    // Coefficients of t^3, t^2, t, 1
    x: [f64; 4],
    y: [f64; 4],
}

impl CubicHermiteSpline {
    pub fn new(x_start: [f64; 2], x_end: [f64; 2], y_start: [f64; 2], y_end: [f64; 2]) -> Self {
        Self {
            x: hermite_coefficients(x_start, x_end),
            y: hermite_coefficients(y_start, y_end),
        }
    }

    /// Sample at parameter `t`; `None` where the tangent vanishes
    pub fn point(&self, t: f64) -> Option<PoseWithCurvature> {
        let (x, dx, ddx) = evaluate(&self.x, t);
        let (y, dy, ddy) = evaluate(&self.y, t);

        let speed = dx.hypot(dy);
        if speed < MIN_TANGENT || !speed.is_finite() {
            return None;
        }

        Some(PoseWithCurvature {
            pose: Pose::new(Translation::new(x, y), Rotation::from_vector(dx, dy)),
            curvature: (dx * ddy - ddx * dy) / (speed * speed * speed),
        })
    }
}

fn hermite_coefficients(start: [f64; 2], end: [f64; 2]) -> [f64; 4] {
    let (p0, m0) = (start[0], start[1]);
    let (p1, m1) = (end[0], end[1]);
    [
        2.0 * p0 + m0 - 2.0 * p1 + m1,
        -3.0 * p0 - 2.0 * m0 + 3.0 * p1 - m1,
        m0,
        p0,
    ]
}

// Value, first and second derivative of a cubic
fn evaluate(c: &[f64; 4], t: f64) -> (f64, f64, f64) {
    let value = ((c[0] * t + c[1]) * t + c[2]) * t + c[3];
    let first = (3.0 * c[0] * t + 2.0 * c[1]) * t + c[2];
    let second = 6.0 * c[0] * t + 2.0 * c[1];
    (value, first, second)
}

/// Endpoint control vectors: tangents follow the start/end headings
pub fn endpoint_control_vectors(
    start: &Pose,
    interior: &[Translation],
    end: &Pose,
) -> (ControlVector, ControlVector) {
    let after_start = interior.first().copied().unwrap_or(end.translation);
    let before_end = interior.last().copied().unwrap_or(start.translation);

    let scalar = TANGENT_SCALE * start.translation.distance(&after_start);
    let initial = ControlVector {
        x: [start.x(), scalar * start.rotation.cos()],
        y: [start.y(), scalar * start.rotation.sin()],
    };

    let scalar = TANGENT_SCALE * end.translation.distance(&before_end);
    let last = ControlVector {
        x: [end.x(), scalar * end.rotation.cos()],
        y: [end.y(), scalar * end.rotation.sin()],
    };

    (initial, last)
}

/// Build one spline per gap between consecutive points
///
/// Interior tangents are chosen so the second derivative is continuous at
/// every interior waypoint (clamped cubic spline).
pub fn splines_from_control_vectors(
    start: &ControlVector,
    interior: &[Translation],
    end: &ControlVector,
) -> Vec<CubicHermiteSpline> {
    if interior.is_empty() {
        return vec![CubicHermiteSpline::new(start.x, end.x, start.y, end.y)];
    }

    let mut points = Vec::with_capacity(interior.len() + 2);
    points.push(start.position());
    points.extend_from_slice(interior);
    points.push(end.position());

    // Tridiagonal system 4·m_i + m_(i-1) + m_(i+1) = 3·(p_(i+1) - p_(i-1))
    let n = interior.len();
    let mut rhs_x = vec![0.0; n];
    let mut rhs_y = vec![0.0; n];
    for i in 0..n {
        rhs_x[i] = 3.0 * (points[i + 2].x - points[i].x);
        rhs_y[i] = 3.0 * (points[i + 2].y - points[i].y);
    }
    rhs_x[0] -= start.x[1];
    rhs_y[0] -= start.y[1];
    rhs_x[n - 1] -= end.x[1];
    rhs_y[n - 1] -= end.y[1];

    let tangents_x = solve_tridiagonal(n, &rhs_x);
    let tangents_y = solve_tridiagonal(n, &rhs_y);

    let mut tx = Vec::with_capacity(n + 2);
    tx.push(start.x[1]);
    tx.extend(tangents_x);
    tx.push(end.x[1]);

    let mut ty = Vec::with_capacity(n + 2);
    ty.push(start.y[1]);
    ty.extend(tangents_y);
    ty.push(end.y[1]);

    (0..points.len() - 1)
        .map(|i| {
            CubicHermiteSpline::new(
                [points[i].x, tx[i]],
                [points[i + 1].x, tx[i + 1]],
                [points[i].y, ty[i]],
                [points[i + 1].y, ty[i + 1]],
            )
        })
        .collect()
}

// Thomas algorithm for diag = 4, off-diagonals = 1
fn solve_tridiagonal(n: usize, d: &[f64]) -> Vec<f64> {
    let (a, b, c) = (1.0, 4.0, 1.0);
    let mut c_star = vec![0.0; n];
    let mut d_star = vec![0.0; n];

    c_star[0] = c / b;
    d_star[0] = d[0] / b;
    for i in 1..n {
        let m = 1.0 / (b - a * c_star[i - 1]);
        c_star[i] = c * m;
        d_star[i] = (d[i] - a * d_star[i - 1]) * m;
    }

    let mut solution = vec![0.0; n];
    solution[n - 1] = d_star[n - 1];
    for i in (0..n - 1).rev() {
        solution[i] = d_star[i] - c_star[i] * solution[i + 1];
    }
    solution
}

/// Adaptively sample a spline so consecutive samples stay within the subdivision limits
///
/// The returned list starts at t = 0 and ends at t = 1.
pub fn parameterize(spline: &CubicHermiteSpline) -> Result<Vec<PoseWithCurvature>> {
    let first = sample(spline, 0.0)?;
    let mut points = vec![first];

    // Intervals still to check; the earliest interval sits on top.
    // Starting from two halves keeps an interior sample on every spline.
    let mut stack = vec![(0.5, 1.0), (0.0, 0.5)];
    let mut iterations = 0;

    while let Some((t0, t1)) = stack.pop() {
        let start = sample(spline, t0)?;
        let end = sample(spline, t1)?;
        let step = end.pose.relative_to(start.pose);

        if step.x().abs() > MAX_DX
            || step.y().abs() > MAX_DY
            || step.rotation.radians().abs() > MAX_DTHETA
        {
            let mid = (t0 + t1) / 2.0;
            stack.push((mid, t1));
            stack.push((t0, mid));
        } else {
            points.push(end);
        }

        iterations += 1;
        if iterations >= MAX_ITERATIONS {
            return Err(SwerveError::InfeasiblePath(
                "spline subdivision did not converge (path is too sharp)".to_string(),
            ));
        }
    }

    Ok(points)
}

fn sample(spline: &CubicHermiteSpline, t: f64) -> Result<PoseWithCurvature> {
    spline.point(t).ok_or_else(|| {
        SwerveError::InfeasiblePath(format!("path has a cusp (zero tangent) near t = {:.3}", t))
    })
}
