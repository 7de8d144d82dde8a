//! Density driven point sampling by error diffusion.
//!
//! Both methods scan a grid of cell masses in serpentine order and diffuse the rounding error
//! forward with the Floyd-Steinberg kernel. Kernel weights are renormalized over the targets
//! inside the grid, so the only mass that is lost is the residual of the last visited cell and
//! the number of points equals the integral of the density field within one.
//!
//! - [`SamplingMethod::FloydSteinberg`] diffuses on the pixel grid itself. At low densities the
//!   error needs many rows to build up before the first points appear.
//! - [`SamplingMethod::FloydSteinbergExpo`] diffuses on a grid of `2^k x 2^k` cells, where `k`
//!   is the largest exponent for which an average cell expects at most one point. Each cell
//!   that receives points is split into quadrants until every point has its own cell, and the
//!   point is placed at the density weighted centroid of that cell.
//!
//! Densities above one point per pixel are kept: a pixel receiving `n > 1` points spreads them on
//! a sub-pixel grid inside `[x, x + 1) x [y, y + 1)`, so every point still floors to its pixel.

use crate::arrays::Array2D;
use crate::superpixel::Window;
use multiversion::multiversion;
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// Error diffusion variant used for seeding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SamplingMethod {
    /// Per-pixel raster scan.
    FloydSteinberg,
    /// Raster scan over power-of-two cells, refined by quadrant splitting. This is the default.
    FloydSteinbergExpo,
}

/// `(dx ahead in scan direction, dy, weight)`
const FLOYD_STEINBERG: [(isize, isize, f32); 4] = [
    (1, 0, 7.0 / 16.0),
    (-1, 1, 3.0 / 16.0),
    (0, 1, 5.0 / 16.0),
    (1, 1, 1.0 / 16.0),
];

/// Sample points whose local density follows `density` (expected points per pixel).
///
/// Negative values count as zero. An all-zero field gives no points. The result only depends on
/// the input, points are returned in scan order.
pub fn sample(method: SamplingMethod, density: &Array2D<f32>) -> Vec<Vector2<f32>> {
    let total: f64 = density.data.iter().map(|d| d.max(0.0) as f64).sum();
    if total <= 0.0 {
        return Vec::new();
    }
    let cell_size = match method {
        SamplingMethod::FloydSteinberg => 1,
        SamplingMethod::FloydSteinbergExpo => {
            expo_cell_size(total, density.width, density.height)
        }
    };
    let masses = block_sums(density, cell_size);
    let counts = diffuse(&masses);
    let mut points = Vec::with_capacity(total.round() as usize + 1);
    for gy in 0..counts.height {
        for gx in 0..counts.width {
            let n = counts[(gx, gy)];
            if n == 0 {
                continue;
            }
            let cell = Window {
                left: gx * cell_size,
                right: ((gx + 1) * cell_size).min(density.width),
                top: gy * cell_size,
                bottom: ((gy + 1) * cell_size).min(density.height),
            };
            place(density, cell, n, &mut points);
        }
    }
    points
}

/// Largest power of two `s` with `mean_density * s^2 <= 1`, not exceeding the image size.
fn expo_cell_size(total: f64, width: usize, height: usize) -> usize {
    let mean = total / (width * height) as f64;
    let limit = width.max(height);
    let mut s = 1usize;
    while 2 * s <= limit && ((2 * s * 2 * s) as f64) * mean <= 1.0 {
        s *= 2;
    }
    s
}

#[multiversion(targets = "simd")]
fn block_sums(density: &Array2D<f32>, cell_size: usize) -> Array2D<f32> {
    let gw = density.width.div_ceil(cell_size);
    let gh = density.height.div_ceil(cell_size);
    let mut masses = Array2D::from_fill(0f32, gw, gh);
    for y in 0..density.height {
        let mass_row = masses.get_row_mut(y / cell_size);
        for (x, d) in density.get_row(y).iter().enumerate() {
            mass_row[x / cell_size] += d.max(0.0);
        }
    }
    masses
}

/// Serpentine Floyd-Steinberg over `masses`, returns the number of points per cell.
#[multiversion(targets = "simd")]
fn diffuse(masses: &Array2D<f32>) -> Array2D<u32> {
    let width = masses.width;
    let height = masses.height;
    let mut buf: Vec<f32> = masses.data.to_vec();
    let mut counts = Array2D::from_fill(0u32, width, height);
    for y in 0..height {
        let forward = y % 2 == 0;
        let dir: isize = if forward { 1 } else { -1 };
        for i in 0..width {
            let x = if forward { i } else { width - 1 - i };
            let idx = y * width + x;
            let v = buf[idx];
            let n = if v >= 0.5 { (v + 0.5).floor() } else { 0.0 };
            counts.data[idx] = n as u32;
            let err = v - n;
            if err == 0.0 {
                continue;
            }
            let target = |dx: isize, dy: isize| -> Option<usize> {
                let tx = x as isize + dir * dx;
                let ty = y as isize + dy;
                (tx >= 0 && tx < width as isize && ty < height as isize)
                    .then(|| ty as usize * width + tx as usize)
            };
            let norm: f32 = FLOYD_STEINBERG
                .iter()
                .filter(|(dx, dy, _)| target(*dx, *dy).is_some())
                .map(|(_, _, w)| w)
                .sum();
            if norm == 0.0 {
                continue;
            }
            for (dx, dy, w) in FLOYD_STEINBERG {
                if let Some(t) = target(dx, dy) {
                    buf[t] += err * w / norm;
                }
            }
        }
    }
    counts
}

/// Place `n` points inside `cell`.
fn place(density: &Array2D<f32>, cell: Window, n: u32, points: &mut Vec<Vector2<f32>>) {
    if n == 0 {
        return;
    }
    if n == 1 {
        points.push(centroid(density, cell));
        return;
    }
    if cell.area() == 1 {
        spread_in_pixel(cell.left, cell.top, n, points);
        return;
    }
    let mid_x = cell.left + (cell.right - cell.left).div_ceil(2);
    let mid_y = cell.top + (cell.bottom - cell.top).div_ceil(2);
    // U order keeps consecutive quadrants adjacent
    let quadrants: Vec<Window> = [
        (cell.left, mid_x, cell.top, mid_y),
        (mid_x, cell.right, cell.top, mid_y),
        (mid_x, cell.right, mid_y, cell.bottom),
        (cell.left, mid_x, mid_y, cell.bottom),
    ]
    .into_iter()
    .map(|(left, right, top, bottom)| Window {
        left,
        right,
        top,
        bottom,
    })
    .filter(|q| !q.is_empty())
    .collect();
    let masses: Vec<f64> = quadrants.iter().map(|q| mass(density, *q)).collect();
    let total: f64 = masses.iter().sum();
    let mut assigned = 0u32;
    let mut err = 0f64;
    let last = quadrants.len() - 1;
    for (i, q) in quadrants.iter().enumerate() {
        let k = if i == last {
            n.saturating_sub(assigned)
        } else {
            let share = if total > 0.0 {
                masses[i] / total
            } else {
                q.area() as f64 / cell.area() as f64
            };
            let v = n as f64 * share + err;
            let k = (v + 0.5).floor().max(0.0);
            err = v - k;
            (k as u32).min(n - assigned)
        };
        assigned += k;
        place(density, *q, k, points);
    }
}

/// `n` points on a `k x k` sub-pixel grid of pixel `(x, y)`, `k = ceil(sqrt(n))`.
fn spread_in_pixel(x: usize, y: usize, n: u32, points: &mut Vec<Vector2<f32>>) {
    let mut k = 1u32;
    while k * k < n {
        k += 1;
    }
    let step = 1.0 / k as f32;
    for i in 0..n {
        points.push(Vector2::new(
            x as f32 + ((i % k) as f32 + 0.5) * step,
            y as f32 + ((i / k) as f32 + 0.5) * step,
        ));
    }
}

fn mass(density: &Array2D<f32>, win: Window) -> f64 {
    (win.top..win.bottom)
        .map(|y| {
            density
                .get_row_part(y, win.left, win.right)
                .iter()
                .map(|d| d.max(0.0) as f64)
                .sum::<f64>()
        })
        .sum()
}

/// Density weighted centroid, the geometric center for a cell without mass.
fn centroid(density: &Array2D<f32>, win: Window) -> Vector2<f32> {
    let mut m = 0f64;
    let mut mx = 0f64;
    let mut my = 0f64;
    for y in win.top..win.bottom {
        for (x, d) in (win.left..).zip(density.get_row_part(y, win.left, win.right)) {
            let d = d.max(0.0) as f64;
            m += d;
            mx += d * x as f64;
            my += d * y as f64;
        }
    }
    if m > 0.0 {
        Vector2::new((mx / m) as f32, (my / m) as f32)
    } else {
        Vector2::new(
            (win.left + win.right - 1) as f32 * 0.5,
            (win.top + win.bottom - 1) as f32 * 0.5,
        )
    }
}
