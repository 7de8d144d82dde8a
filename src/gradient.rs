//! Robust depth gradients for 16-bit depth sensors.
//!
//! Raw depth value `0` marks a dropout. The stencil spacing follows a constant physical window,
//! so far away surfaces are differentiated over fewer pixels than close ones.

use crate::arrays::Array2D;
use multiversion::multiversion;
use nalgebra::{Vector2, Vector3};
use rayon::prelude::*;

/// Minimal tap spacing in pixels.
const MIN_SPACING: usize = 4;

/// Derivative from a 5-tap stencil `v0 .. v4` centered on `v2` where `0` is an invalid sample.
///
/// Returns the difference over two tap spacings. When both sides are valid the one-sided
/// differences are blended inversely to the second difference of their side, which keeps
/// depth edges from smearing into the neighbouring surface.
pub fn local_finite_differences(v0: i32, v1: i32, v2: i32, v3: i32, v4: i32) -> f32 {
    if v0 == 0 && v4 == 0 && v1 != 0 && v3 != 0 {
        return (v3 - v1) as f32;
    }
    let left_invalid = v0 == 0 || v1 == 0;
    let right_invalid = v3 == 0 || v4 == 0;
    match (left_invalid, right_invalid) {
        (true, true) => 0.0,
        (true, false) => (v4 - v2) as f32,
        (false, true) => (v2 - v0) as f32,
        (false, false) => {
            let a = (v2 + v0 - 2 * v1).abs() as f32;
            let b = (v4 + v2 - 2 * v3).abs() as f32;
            let (p, q) = if a + b == 0.0 {
                (0.5, 0.5)
            } else {
                (a / (a + b), b / (a + b))
            };
            q * (v2 - v0) as f32 + p * (v4 - v2) as f32
        }
    }
}

/// Tap spacing for a pixel with raw depth `d`, `None` for a dropout.
#[inline(always)]
fn tap_spacing(
    d: u16,
    window_m: f32,
    focal_px: f32,
    depth_to_z: f32,
    limit: usize,
) -> Option<(usize, f32)> {
    if d == 0 {
        return None;
    }
    let z_over_f = d as f32 * depth_to_z / focal_px;
    let window = window_m / z_over_f;
    let mut w = ((window + 0.5) as usize).clamp(MIN_SPACING, limit.max(MIN_SPACING));
    if w % 2 == 1 {
        w += 1;
    }
    Some((w, z_over_f))
}

/// Metric depth gradient (dz per unit of lateral distance) at pixel `(x, y)`.
///
/// Zero for dropouts and for pixels closer than the tap spacing to any border.
pub fn local_depth_gradient(
    depth: &Array2D<u16>,
    x: usize,
    y: usize,
    window_m: f32,
    focal_px: f32,
    depth_to_z: f32,
) -> Vector2<f32> {
    let d00 = depth[(x, y)];
    let limit = depth.width.max(depth.height);
    let Some((w, z_over_f)) = tap_spacing(d00, window_m, focal_px, depth_to_z, limit) else {
        return Vector2::zeros();
    };
    if y < w || y + w >= depth.height || x < w || x + w >= depth.width {
        return Vector2::zeros();
    }
    let h = w / 2;
    let at = |x: usize, y: usize| depth[(x, y)] as i32;
    let c = d00 as i32;
    let dx = local_finite_differences(at(x - w, y), at(x - h, y), c, at(x + h, y), at(x + w, y));
    let dy = local_finite_differences(at(x, y - w), at(x, y - h), c, at(x, y + h), at(x, y + w));
    // the stencil covers 2 * (w / 2) = w pixels
    let scl = depth_to_z / (w as f32 * z_over_f);
    scl * Vector2::new(dx, dy)
}

#[multiversion(targets = "simd")]
fn depth_gradient_row(
    depth: &Array2D<u16>,
    y: usize,
    window_m: f32,
    focal_px: f32,
    depth_to_z: f32,
    out: &mut [Vector2<f32>],
) {
    for (x, g) in out.iter_mut().enumerate() {
        *g = local_depth_gradient(depth, x, y, window_m, focal_px, depth_to_z);
    }
}

/// Depth gradients of the whole raster, computed row-parallel.
pub fn depth_gradients(
    depth: &Array2D<u16>,
    window_m: f32,
    focal_px: f32,
    depth_to_z: f32,
) -> Array2D<Vector2<f32>> {
    let mut out = Array2D::from_fill(Vector2::zeros(), depth.width, depth.height);
    if out.is_empty() {
        return out;
    }
    out.data
        .par_chunks_mut(depth.width)
        .enumerate()
        .for_each(|(y, row)| depth_gradient_row(depth, y, window_m, focal_px, depth_to_z, row));
    out
}

/// Unit normal of the surface `z(x, y)` with gradient `g`, oriented towards the camera
/// at the origin as seen from `position`.
#[inline(always)]
pub fn normal_from_gradient(g: &Vector2<f32>, position: &Vector3<f32>) -> Vector3<f32> {
    let scl = 1.0 / (1.0 + g.norm_squared()).sqrt();
    let normal = Vector3::new(scl * g.x, scl * g.y, -scl);
    if normal.dot(&-position) < 0.0 {
        -normal
    } else {
        normal
    }
}
