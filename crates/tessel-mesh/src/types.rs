//! Shared types for the tessel mesh model.

use serde::{Deserialize, Serialize};

/// A point in integer pixel coordinates.
///
/// Equality is exact integer equality; adjacency between triangles is
/// decided purely by comparing points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: i32,
    /// Vertical position (pixels from top edge).
    pub y: i32,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Ordering key used to canonicalize a triangle: Y first, then X.
    const fn sort_key(self) -> (i32, i32) {
        (self.y, self.x)
    }

    /// Component-wise difference `self - origin`.
    #[must_use]
    pub const fn delta_from(self, origin: Self) -> (i32, i32) {
        (self.x - origin.x, self.y - origin.y)
    }
}

/// A point in the unit square, as produced by an optimizer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormPoint {
    /// Horizontal position in `[0, 1]`.
    pub x: f64,
    /// Vertical position in `[0, 1]`.
    pub y: f64,
}

impl NormPoint {
    /// Create a new normalized point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Scale into pixel space and round to the nearest integer
    /// (halves round away from zero).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn denormalize(self, dimensions: Dimensions) -> Point {
        Point::new(
            (self.x * f64::from(dimensions.width)).round() as i32,
            (self.y * f64::from(dimensions.height)).round() as i32,
        )
    }
}

/// Three points forming a triangle.
///
/// The vertex order matters only for encoding; call
/// [`canonicalize`](Self::canonicalize) to put the vertices in the
/// order every encoder and decoder agrees on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Triangle {
    /// The three vertex slots.
    pub vertices: [Point; 3],
}

impl Triangle {
    /// Create a triangle from three points in the given slot order.
    #[must_use]
    pub const fn new(a: Point, b: Point, c: Point) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    /// Sort the vertex slots by Y ascending, then X ascending.
    pub fn canonicalize(&mut self) {
        self.vertices.sort_by_key(|p| p.sort_key());
    }

    /// Returns a canonicalized copy.
    #[must_use]
    pub fn canonicalized(mut self) -> Self {
        self.canonicalize();
        self
    }
}

/// A color with three channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    /// Create a new color.
    #[must_use]
    pub const fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Quantize each channel to 8 bits with `round(c * 255)`.
    ///
    /// Values outside `[0, 1]` are clamped.
    #[must_use]
    pub fn quantize(self) -> Rgb8 {
        Rgb8([
            quantize_channel(self.r),
            quantize_channel(self.g),
            quantize_channel(self.b),
        ])
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn quantize_channel(value: f64) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// An 8-bit-per-channel color, the on-disk color representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb8(pub [u8; 3]);

impl Rgb8 {
    /// Map back to a [`Color`] in `[0, 1]`.
    #[must_use]
    pub fn to_color(self) -> Color {
        let [r, g, b] = self.0;
        Color::new(
            f64::from(r) / 255.0,
            f64::from(g) / 255.0,
            f64::from(b) / 255.0,
        )
    }

    /// Per-channel signed difference `self - base`.
    #[must_use]
    pub fn delta_from(self, base: Self) -> [i32; 3] {
        let mut out = [0; 3];
        for (slot, (a, b)) in out.iter_mut().zip(self.0.into_iter().zip(base.0)) {
            *slot = i32::from(a) - i32::from(b);
        }
        out
    }
}

/// A triangle together with its fill color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColoredTriangle {
    pub triangle: Triangle,
    pub color: Color,
}

impl ColoredTriangle {
    #[must_use]
    pub const fn new(triangle: Triangle, color: Color) -> Self {
        Self { triangle, color }
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Errors raised while analysing a triangle set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    /// The triangle list was empty.
    #[error("triangle list is empty")]
    Empty,

    /// The requested traversal root does not exist.
    #[error("root index {root} is out of bounds for {len} triangles")]
    RootOutOfBounds { root: usize, len: usize },

    /// Two triangles share all three vertices.
    #[error("triangles {first} and {second} are duplicates")]
    DuplicateTriangle { first: usize, second: usize },

    /// The adjacency graph has more than one connected component.
    #[error("triangle adjacency graph is disconnected: reached {reached} of {total} triangles")]
    Disconnected { reached: usize, total: usize },

    /// A triangle has more tree children than its count field can hold.
    #[error("triangle {triangle} has {count} neighbours to announce, at most {max} fit")]
    FanOutOverflow {
        triangle: usize,
        count: usize,
        max: usize,
    },

    /// A vertex does not fit the unsigned 16-bit coordinate range.
    #[error("triangle {triangle} has vertex ({}, {}) outside 0..=65535", point.x, point.y)]
    CoordinateOutOfRange { triangle: usize, point: Point },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_sorts_by_y_then_x() {
        let t = Triangle::new(Point::new(0, 10), Point::new(10, 0), Point::new(0, 0));
        assert_eq!(
            t.canonicalized().vertices,
            [Point::new(0, 0), Point::new(10, 0), Point::new(0, 10)],
        );
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let t = Triangle::new(Point::new(5, 10), Point::new(0, 0), Point::new(10, 0));
        let t = t.canonicalized();
        assert_eq!(t, t.canonicalized());
    }

    #[test]
    fn denormalize_rounds_to_nearest() {
        let dims = Dimensions::new(20, 10);
        assert_eq!(NormPoint::new(0.5, 0.5).denormalize(dims), Point::new(10, 5));
        assert_eq!(NormPoint::new(0.03, 0.04).denormalize(dims), Point::new(1, 0));
        assert_eq!(NormPoint::new(1.0, 1.0).denormalize(dims), Point::new(20, 10));
    }

    #[test]
    fn quantize_rounds_each_channel() {
        assert_eq!(Color::new(1.0, 0.0, 0.5).quantize(), Rgb8([255, 0, 128]));
        assert_eq!(Color::new(1.0 / 255.0, 0.4 / 255.0, 0.6 / 255.0).quantize(), Rgb8([1, 0, 1]));
    }

    #[test]
    fn quantize_clamps_out_of_range() {
        assert_eq!(Color::new(-0.2, 1.7, 0.0).quantize(), Rgb8([0, 255, 0]));
    }

    #[test]
    fn rgb8_round_trips_through_color() {
        let c = Rgb8([12, 200, 255]);
        assert_eq!(c.to_color().quantize(), c);
    }

    #[test]
    fn rgb8_delta_is_signed() {
        assert_eq!(Rgb8([10, 0, 255]).delta_from(Rgb8([20, 0, 0])), [-10, 0, 255]);
    }

    #[test]
    fn error_display() {
        let err = MeshError::Disconnected {
            reached: 2,
            total: 5,
        };
        assert_eq!(
            err.to_string(),
            "triangle adjacency graph is disconnected: reached 2 of 5 triangles",
        );
    }

    #[test]
    fn triangle_serde_round_trip() {
        let t = Triangle::new(Point::new(1, 2), Point::new(3, 4), Point::new(5, 6));
        let json = serde_json::to_string(&t).unwrap();
        let back: Triangle = serde_json::from_str(&json).unwrap();
        assert_eq!(t, back);
    }
}
