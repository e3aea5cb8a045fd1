//! 2D point math for crop-corner transforms.
//!
//! Corner rotation happens in pixel space, not normalized space: rotating in
//! normalized units would shear any frame that is not square. The projector
//! scales a region up to pixels, moves its corners with the operations here,
//! and normalizes again at the end.

use serde::{Deserialize, Serialize};

/// A point in pixel coordinates, y growing downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Midpoint of the segment between two points.
    #[inline]
    pub fn midpoint(a: Point, b: Point) -> Point {
        Point::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
    }

    /// Rotate this point about `center` by `radians`.
    ///
    /// In the y-down frame used throughout this crate a positive angle turns
    /// clockwise on screen. Rotating by `r` and then by `-r` about the same
    /// center is the identity (modulo floating-point noise), which is what
    /// makes projection and re-extraction inverses of each other.
    #[inline]
    pub fn rotated_about(self, center: Point, radians: f64) -> Point {
        let (sin, cos) = radians.sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Point::new(center.x + dx * cos - dy * sin, center.y + dx * sin + dy * cos)
    }

    /// Pull this point toward `center`, dividing its offset by `factor`.
    ///
    /// `factor` of 1.0 is the identity; larger factors move the point
    /// proportionally closer to the center.
    #[inline]
    pub fn scaled_toward(self, center: Point, factor: f64) -> Point {
        Point::new(
            center.x + (self.x - center.x) / factor,
            center.y + (self.y - center.y) / factor,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_midpoint() {
        let m = Point::midpoint(Point::new(0.0, 0.0), Point::new(10.0, 20.0));
        assert_eq!(m, Point::new(5.0, 10.0));
    }

    #[test]
    fn test_rotate_zero_is_identity() {
        let p = Point::new(3.0, 7.0);
        let r = p.rotated_about(Point::new(50.0, 50.0), 0.0);
        assert!((r.x - p.x).abs() < 1e-12);
        assert!((r.y - p.y).abs() < 1e-12);
    }

    #[test]
    fn test_rotate_quarter_turn() {
        // A point directly above the center lands directly to its right
        // after a +90 degree (clockwise on screen) turn.
        let center = Point::new(50.0, 50.0);
        let p = Point::new(50.0, 40.0);
        let r = p.rotated_about(center, 90f64.to_radians());
        assert!((r.x - 60.0).abs() < 1e-9, "x was {}", r.x);
        assert!((r.y - 50.0).abs() < 1e-9, "y was {}", r.y);
    }

    #[test]
    fn test_rotate_round_trip() {
        let center = Point::new(12.0, 34.0);
        let p = Point::new(56.0, 78.0);
        let angle = 37.5f64.to_radians();

        let back = p.rotated_about(center, angle).rotated_about(center, -angle);
        assert!((back.x - p.x).abs() < 1e-9);
        assert!((back.y - p.y).abs() < 1e-9);
    }

    #[test]
    fn test_rotate_preserves_distance() {
        let center = Point::new(10.0, 10.0);
        let p = Point::new(25.0, 40.0);
        let r = p.rotated_about(center, 123f64.to_radians());

        let before = ((p.x - center.x).powi(2) + (p.y - center.y).powi(2)).sqrt();
        let after = ((r.x - center.x).powi(2) + (r.y - center.y).powi(2)).sqrt();
        assert!((before - after).abs() < 1e-9);
    }

    #[test]
    fn test_scale_identity() {
        let p = Point::new(30.0, 70.0);
        let r = p.scaled_toward(Point::new(50.0, 50.0), 1.0);
        assert_eq!(r, p);
    }

    #[test]
    fn test_scale_halves_offset() {
        let center = Point::new(50.0, 50.0);
        let p = Point::new(70.0, 90.0);
        let r = p.scaled_toward(center, 2.0);
        assert_eq!(r, Point::new(60.0, 70.0));
    }

    #[test]
    fn test_scale_center_is_fixed_point() {
        let center = Point::new(5.0, 5.0);
        let r = center.scaled_toward(center, 3.5);
        assert_eq!(r, center);
    }
}
