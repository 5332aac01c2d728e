//! Reference collaborators: a jittered grid optimizer, triangulator and
//! mean-color renderer.
//!
//! The grid keeps a fixed topology: `side x side` points, two triangles
//! per cell split along the cell's main diagonal. Interior points move
//! freely within a fraction of a cell around their home position, points
//! on the image border slide along their edge, and the four corners are
//! pinned. Because no point can cross into a neighbouring cell the mesh
//! always covers the whole image without overlaps, so triangulation is a
//! pure index lookup.
//!
//! The optimizer is a seeded hill climber: each step moves one point to
//! a random position in its allowed range and keeps the move only if the
//! summed squared color error of the triangles around that point drops.

use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tessel_mesh::{Color, ColoredTriangle, Dimensions, NormPoint, Point, Rgb8, Triangle};

use crate::config::BatchConfig;
use crate::engine::{Engine, Optimizer};

/// How far, in cells, a point may move from its home position.
pub const JITTER: f64 = 0.2;

/// Dimensions of a square point grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    /// Points per row and per column (at least 2).
    pub side: usize,
}

impl GridShape {
    /// The smallest grid with at least `point_count` points.
    #[must_use]
    pub const fn for_point_count(point_count: usize) -> Self {
        let mut side = 2;
        while side * side < point_count {
            side += 1;
        }
        Self { side }
    }

    /// Recover the shape from a point list, if it is a square grid.
    #[must_use]
    pub const fn from_len(len: usize) -> Option<Self> {
        let shape = Self::for_point_count(len);
        if shape.point_count() == len {
            Some(shape)
        } else {
            None
        }
    }

    /// Shrink the grid until neighbouring points stay on distinct
    /// pixels of a `dimensions`-sized image.
    ///
    /// Two neighbours are always at least `1 - 2 * JITTER` cells apart
    /// on each axis, so a cell spacing of `1 / (1 - 2 * JITTER)` pixels
    /// keeps every rounded vertex distinct. A grid never drops below
    /// 2 x 2.
    #[must_use]
    pub fn fit_to(self, dimensions: Dimensions) -> Self {
        let shortest = dimensions.width.min(dimensions.height);
        let shortest = usize::try_from(shortest).unwrap_or(usize::MAX);
        let max_cells = (shortest.saturating_mul(3) / 5).max(1);
        Self {
            side: self.side.min(max_cells + 1),
        }
    }

    /// Total points, `side * side`.
    #[must_use]
    pub const fn point_count(self) -> usize {
        self.side * self.side
    }

    /// Cells per row and per column.
    #[must_use]
    pub const fn cells(self) -> usize {
        self.side - 1
    }

    /// Number of triangles the grid produces.
    #[must_use]
    pub const fn triangle_count(self) -> usize {
        2 * self.cells() * self.cells()
    }

    /// Row-major index of the point at `row`, `col`.
    #[must_use]
    pub const fn index(self, row: usize, col: usize) -> usize {
        row * self.side + col
    }

    const fn is_border(self, i: usize) -> bool {
        i == 0 || i == self.side - 1
    }

    /// Unjittered position of the point at `row`, `col`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn home(self, row: usize, col: usize) -> NormPoint {
        let cells = self.cells() as f64;
        NormPoint::new(col as f64 / cells, row as f64 / cells)
    }

    /// All home positions in row-major order.
    #[must_use]
    pub fn regular(self) -> Vec<NormPoint> {
        (0..self.side)
            .flat_map(|row| (0..self.side).map(move |col| self.home(row, col)))
            .collect()
    }

    /// Point indices of the two triangles covering cell `row`, `col`.
    const fn cell_triangles(self, row: usize, col: usize) -> [[usize; 3]; 2] {
        let p00 = self.index(row, col);
        let p10 = self.index(row, col + 1);
        let p01 = self.index(row + 1, col);
        let p11 = self.index(row + 1, col + 1);
        [[p00, p10, p11], [p00, p11, p01]]
    }
}

/// Triangulate a square grid of points over a `dimensions`-sized image.
///
/// Returns an empty list when `points` is not a square grid of at least
/// 2 x 2.
#[must_use]
pub fn grid_triangles(points: &[NormPoint], dimensions: Dimensions) -> Vec<Triangle> {
    let Some(shape) = GridShape::from_len(points.len()) else {
        return Vec::new();
    };
    let pixels: Vec<Point> = points.iter().map(|p| p.denormalize(dimensions)).collect();
    let mut out = Vec::with_capacity(shape.triangle_count());
    for row in 0..shape.cells() {
        for col in 0..shape.cells() {
            for [a, b, c] in shape.cell_triangles(row, col) {
                out.push(Triangle::new(pixels[a], pixels[b], pixels[c]));
            }
        }
    }
    out
}

/// Per-channel pixel statistics over one triangle.
#[derive(Debug, Clone, Copy, Default)]
struct Coverage {
    count: u32,
    sum: [f64; 3],
    sum_sq: [f64; 3],
}

impl Coverage {
    /// Accumulate every pixel whose centre lies inside or on `triangle`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn measure(triangle: &Triangle, image: &RgbImage) -> Self {
        let mut coverage = Self::default();
        let [a, b, c] = triangle.vertices.map(|p| (f64::from(p.x), f64::from(p.y)));
        let area = edge(a, b, c);
        if area.abs() < f64::EPSILON || image.width() == 0 || image.height() == 0 {
            return coverage;
        }

        let clamp_x = |v: f64| v.clamp(0.0, f64::from(image.width() - 1)) as u32;
        let clamp_y = |v: f64| v.clamp(0.0, f64::from(image.height() - 1)) as u32;
        let (x0, x1) = (clamp_x(a.0.min(b.0).min(c.0)), clamp_x(a.0.max(b.0).max(c.0)));
        let (y0, y1) = (clamp_y(a.1.min(b.1).min(c.1)), clamp_y(a.1.max(b.1).max(c.1)));

        for y in y0..=y1 {
            for x in x0..=x1 {
                let p = (f64::from(x) + 0.5, f64::from(y) + 0.5);
                let w = [edge(b, c, p), edge(c, a, p), edge(a, b, p)];
                let inside = if area > 0.0 {
                    w.iter().all(|&v| v >= 0.0)
                } else {
                    w.iter().all(|&v| v <= 0.0)
                };
                if inside {
                    coverage.add(image.get_pixel(x, y).0);
                }
            }
        }
        coverage
    }

    fn add(&mut self, rgb: [u8; 3]) {
        self.count += 1;
        for (i, channel) in rgb.into_iter().enumerate() {
            let v = f64::from(channel);
            self.sum[i] += v;
            self.sum_sq[i] += v * v;
        }
    }

    /// Mean color, or `None` if no pixel was covered.
    fn mean(&self) -> Option<Color> {
        if self.count == 0 {
            return None;
        }
        let n = f64::from(self.count) * 255.0;
        Some(Color::new(self.sum[0] / n, self.sum[1] / n, self.sum[2] / n))
    }

    /// Sum of squared deviations from the mean, over all channels.
    fn squared_error(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let n = f64::from(self.count);
        (0..3)
            .map(|i| self.sum[i].mul_add(-self.sum[i] / n, self.sum_sq[i]))
            .sum()
    }
}

/// Twice the signed area of `(a, b, p)`.
fn edge(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> f64 {
    (b.0 - a.0).mul_add(p.1 - a.1, -((b.1 - a.1) * (p.0 - a.0)))
}

/// Color of the pixel under the triangle's centroid.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn centroid_color(triangle: &Triangle, image: &RgbImage) -> Color {
    if image.width() == 0 || image.height() == 0 {
        return Color::new(0.0, 0.0, 0.0);
    }
    let [a, b, c] = triangle.vertices;
    let cx = f64::from(a.x + b.x + c.x) / 3.0;
    let cy = f64::from(a.y + b.y + c.y) / 3.0;
    let x = cx.clamp(0.0, f64::from(image.width() - 1)) as u32;
    let y = cy.clamp(0.0, f64::from(image.height() - 1)) as u32;
    let [r, g, b] = image.get_pixel(x, y).0;
    Rgb8([r, g, b]).to_color()
}

/// Color every triangle with the mean of the pixels it covers.
///
/// Triangles too thin to contain a pixel centre take the color under
/// their centroid.
#[must_use]
pub fn render_mean_colors(triangles: &[Triangle], image: &RgbImage) -> Vec<ColoredTriangle> {
    triangles
        .iter()
        .map(|t| {
            let color = Coverage::measure(t, image)
                .mean()
                .unwrap_or_else(|| centroid_color(t, image));
            ColoredTriangle::new(*t, color)
        })
        .collect()
}

/// Seeded hill-climbing optimizer over a [`GridShape`].
#[derive(Debug, Clone)]
pub struct GridOptimizer {
    shape: GridShape,
    image: RgbImage,
    dimensions: Dimensions,
    points: Vec<NormPoint>,
    movable: Vec<(usize, usize)>,
    rng: StdRng,
}

impl GridOptimizer {
    /// Start from the regular grid over `image`.
    #[must_use]
    pub fn new(image: RgbImage, shape: GridShape, seed: u64) -> Self {
        let dimensions = Dimensions::new(image.width(), image.height());
        let last = shape.side - 1;
        let movable = (0..shape.side)
            .flat_map(|row| (0..shape.side).map(move |col| (row, col)))
            .filter(|&(row, col)| !((row == 0 || row == last) && (col == 0 || col == last)))
            .collect();
        Self {
            shape,
            image,
            dimensions,
            points: shape.regular(),
            movable,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// The grid this optimizer moves points on.
    #[must_use]
    pub const fn shape(&self) -> GridShape {
        self.shape
    }

    /// Summed squared color error of the whole mesh.
    #[must_use]
    pub fn error(&self) -> f64 {
        (0..self.shape.cells())
            .flat_map(|row| (0..self.shape.cells()).map(move |col| (row, col)))
            .map(|(row, col)| self.cell_error(row, col))
            .sum()
    }

    fn cell_error(&self, row: usize, col: usize) -> f64 {
        self.shape
            .cell_triangles(row, col)
            .iter()
            .map(|&[a, b, c]| {
                let triangle = Triangle::new(
                    self.points[a].denormalize(self.dimensions),
                    self.points[b].denormalize(self.dimensions),
                    self.points[c].denormalize(self.dimensions),
                );
                Coverage::measure(&triangle, &self.image).squared_error()
            })
            .sum()
    }

    /// Error of the up to four cells that share the point at `row`, `col`.
    fn local_error(&self, row: usize, col: usize) -> f64 {
        let cells = self.shape.cells();
        let rows = row.saturating_sub(1)..=row.min(cells - 1);
        rows.flat_map(|r| (col.saturating_sub(1)..=col.min(cells - 1)).map(move |c| (r, c)))
            .map(|(r, c)| self.cell_error(r, c))
            .sum()
    }

    #[allow(clippy::cast_precision_loss)]
    fn propose(&mut self, row: usize, col: usize) -> NormPoint {
        let home = self.shape.home(row, col);
        let reach = JITTER / self.shape.cells() as f64;
        let dx = if self.shape.is_border(col) {
            0.0
        } else {
            self.rng.random_range(-reach..=reach)
        };
        let dy = if self.shape.is_border(row) {
            0.0
        } else {
            self.rng.random_range(-reach..=reach)
        };
        NormPoint::new(home.x + dx, home.y + dy)
    }
}

impl Optimizer for GridOptimizer {
    fn step(&mut self) {
        if self.movable.is_empty() {
            return;
        }
        let (row, col) = self.movable[self.rng.random_range(0..self.movable.len())];
        let index = self.shape.index(row, col);

        let before = self.local_error(row, col);
        let previous = self.points[index];
        self.points[index] = self.propose(row, col);
        if self.local_error(row, col) >= before {
            self.points[index] = previous;
        }
    }

    fn best(&self) -> &[NormPoint] {
        &self.points
    }
}

/// [`Engine`] built from the grid collaborators.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridEngine;

impl Engine for GridEngine {
    type Optimizer = GridOptimizer;

    fn optimizer(&self, image: &RgbImage, config: &BatchConfig) -> GridOptimizer {
        let dimensions = Dimensions::new(image.width(), image.height());
        let shape = GridShape::for_point_count(config.point_count).fit_to(dimensions);
        GridOptimizer::new(image.clone(), shape, config.seed)
    }

    fn triangulate(&self, points: &[NormPoint], dimensions: Dimensions) -> Vec<Triangle> {
        grid_triangles(points, dimensions)
    }

    fn render(&self, triangles: &[Triangle], image: &RgbImage) -> Vec<ColoredTriangle> {
        render_mean_colors(triangles, image)
    }
}
