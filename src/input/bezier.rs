//! Bezier curve paths for realistic pointer movement.
//!
//! Cubic Bezier curves produce the curved, slightly-overshooting trajectories
//! human pointer movement shows. Control points are placed with a randomized
//! perpendicular offset, so the same start/end pair never yields the same
//! path twice unless the random source is seeded.
//!
//! # Example
//!
//! ```rust
//! use meetbot::input::bezier::{Point, BezierCurve};
//!
//! let curve = BezierCurve::new(
//!     Point::new(0.0, 0.0),
//!     Point::new(25.0, 50.0),
//!     Point::new(75.0, 50.0),
//!     Point::new(100.0, 0.0),
//! );
//! let mid = curve.evaluate_at(0.5);
//! assert!(mid.y > 0.0);
//! ```

use rand::Rng;
use std::f64::consts::PI;

/// A 2D point with f64 coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
}

impl Point {
    /// Creates a new point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Creates a point at the origin (0, 0).
    pub fn origin() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    /// Euclidean distance to another point.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Angle to another point in radians.
    pub fn angle_to(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dy.atan2(dx)
    }

    /// Linear interpolation between this point and another.
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::origin()
    }
}

/// A cubic Bezier curve defined by four control points.
///
/// The curve starts at `p0`, ends at `p3`, and is shaped by the intermediate
/// control points `p1` and `p2`.
#[derive(Debug, Clone)]
pub struct BezierCurve {
    /// Start point.
    pub p0: Point,
    /// First control point.
    pub p1: Point,
    /// Second control point.
    pub p2: Point,
    /// End point.
    pub p3: Point,
}

impl BezierCurve {
    /// Creates a new cubic Bezier curve.
    pub fn new(p0: Point, p1: Point, p2: Point, p3: Point) -> Self {
        Self { p0, p1, p2, p3 }
    }

    /// Creates a curve from start to end with randomized control points.
    ///
    /// Control points sit roughly at 30% and 70% along the straight line,
    /// pushed sideways by a random perpendicular offset proportional to the
    /// travel distance.
    pub fn from_endpoints<R: Rng>(start: Point, end: Point, rng: &mut R) -> Self {
        let distance = start.distance_to(&end);
        let angle = start.angle_to(&end);

        let offset = distance * 0.3;
        let perp_angle = angle + PI / 2.0;

        let rand1 = (rng.gen::<f64>() - 0.5) * 2.0;
        let rand2 = (rng.gen::<f64>() - 0.5) * 2.0;

        let p1 = Point::new(
            start.x + distance * 0.3 * angle.cos() + offset * rand1 * perp_angle.cos(),
            start.y + distance * 0.3 * angle.sin() + offset * rand1 * perp_angle.sin(),
        );

        let p2 = Point::new(
            start.x + distance * 0.7 * angle.cos() + offset * rand2 * perp_angle.cos(),
            start.y + distance * 0.7 * angle.sin() + offset * rand2 * perp_angle.sin(),
        );

        Self::new(start, p1, p2, end)
    }

    /// Evaluates the curve at parameter t in [0, 1].
    pub fn evaluate_at(&self, t: f64) -> Point {
        let t = t.clamp(0.0, 1.0);
        let t2 = t * t;
        let t3 = t2 * t;
        let mt = 1.0 - t;
        let mt2 = mt * mt;
        let mt3 = mt2 * mt;

        // B(t) = (1-t)^3 P0 + 3(1-t)^2 t P1 + 3(1-t) t^2 P2 + t^3 P3
        Point {
            x: mt3 * self.p0.x
                + 3.0 * mt2 * t * self.p1.x
                + 3.0 * mt * t2 * self.p2.x
                + t3 * self.p3.x,
            y: mt3 * self.p0.y
                + 3.0 * mt2 * t * self.p1.y
                + 3.0 * mt * t2 * self.p2.y
                + t3 * self.p3.y,
        }
    }

    /// Generates `num_points` points evenly spaced in parameter space.
    pub fn generate_points(&self, num_points: usize) -> Vec<Point> {
        if num_points == 0 {
            return vec![];
        }
        if num_points == 1 {
            return vec![self.p0];
        }

        let mut points = Vec::with_capacity(num_points);
        for i in 0..num_points {
            let t = i as f64 / (num_points - 1) as f64;
            points.push(self.evaluate_at(t));
        }
        points
    }
}

/// Generates a human-like pointer path from `start` to `end`.
///
/// The path follows a randomized Bezier curve with ease-in/ease-out pacing
/// (denser points near both ends, matching acceleration and deceleration of
/// a real hand) and sub-pixel jitter on intermediate points.
pub fn generate_human_path<R: Rng>(
    start: Point,
    end: Point,
    steps: usize,
    rng: &mut R,
) -> Vec<Point> {
    if steps == 0 {
        return vec![];
    }
    if steps == 1 || start.distance_to(&end) < 1.0 {
        return vec![end];
    }

    let curve = BezierCurve::from_endpoints(start, end, rng);
    let mut points = Vec::with_capacity(steps);

    for i in 0..steps {
        let linear = i as f64 / (steps - 1) as f64;
        // smoothstep easing
        let t = linear * linear * (3.0 - 2.0 * linear);
        let mut point = curve.evaluate_at(t);

        // jitter intermediate points only; first and last stay exact
        if i != 0 && i != steps - 1 {
            point.x += (rng.gen::<f64>() - 0.5) * 1.5;
            point.y += (rng.gen::<f64>() - 0.5) * 1.5;
        }
        points.push(point);
    }

    // End exactly on target regardless of easing rounding
    points[steps - 1] = end;
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance_to(&b), 5.0);
    }

    #[test]
    fn test_point_lerp() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 10.0);
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid.x, 5.0);
        assert_eq!(mid.y, 5.0);
    }

    #[test]
    fn test_curve_endpoints() {
        let curve = BezierCurve::new(
            Point::new(0.0, 0.0),
            Point::new(25.0, 50.0),
            Point::new(75.0, 50.0),
            Point::new(100.0, 0.0),
        );
        assert_eq!(curve.evaluate_at(0.0), Point::new(0.0, 0.0));
        assert_eq!(curve.evaluate_at(1.0), Point::new(100.0, 0.0));
    }

    #[test]
    fn test_generate_points_count() {
        let curve = BezierCurve::new(
            Point::new(0.0, 0.0),
            Point::new(25.0, 50.0),
            Point::new(75.0, 50.0),
            Point::new(100.0, 0.0),
        );
        assert_eq!(curve.generate_points(11).len(), 11);
        assert!(curve.generate_points(0).is_empty());
    }

    #[test]
    fn test_human_path_starts_and_ends_on_target() {
        let mut rng = StdRng::seed_from_u64(5);
        let start = Point::new(10.0, 10.0);
        let end = Point::new(400.0, 300.0);
        let path = generate_human_path(start, end, 18, &mut rng);

        assert_eq!(path.len(), 18);
        assert_eq!(path[0], start);
        assert_eq!(path[17], end);
    }

    #[test]
    fn test_human_path_is_seed_deterministic() {
        let start = Point::new(0.0, 0.0);
        let end = Point::new(200.0, 100.0);

        let mut rng_a = StdRng::seed_from_u64(11);
        let mut rng_b = StdRng::seed_from_u64(11);
        let path_a = generate_human_path(start, end, 15, &mut rng_a);
        let path_b = generate_human_path(start, end, 15, &mut rng_b);
        assert_eq!(path_a, path_b);
    }

    #[test]
    fn test_human_path_degenerate_distance() {
        let mut rng = StdRng::seed_from_u64(1);
        let here = Point::new(50.0, 50.0);
        let path = generate_human_path(here, Point::new(50.2, 50.1), 20, &mut rng);
        assert_eq!(path.len(), 1);
    }
}
