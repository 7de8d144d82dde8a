//! Per-pixel feature rasters for the segmentation variants.

use crate::arrays::Array2D;
use crate::color::rgb_buffer_to_unit;
use crate::error::{check_dimensions, Error};
use crate::gradient::{depth_gradients, normal_from_gradient};
use crate::segment::{Pixel, PixelRgb, PixelRgbd};
use nalgebra::{Vector2, Vector3};
use rayon::prelude::*;
use std::f32::consts::PI;

/// Pinhole model of the depth camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub focal_px: f32,
    /// Meters per raw depth unit.
    pub depth_to_z: f32,
    /// Principal point in pixels.
    pub center: Vector2<f32>,
}

impl Camera {
    /// Camera space point of pixel `pos` at metric depth `depth`.
    #[inline(always)]
    pub fn backproject(&self, pos: &Vector2<f32>, depth: f32) -> Vector3<f32> {
        (depth / self.focal_px)
            * Vector3::new(pos.x - self.center.x, pos.y - self.center.y, self.focal_px)
    }
}

/// Target density of a surface patch at metric `depth` with depth gradient `gradient`.
///
/// One superpixel covers a disk of `radius` meters on the surface. The slope factor accounts
/// for the larger area of tilted surfaces.
#[inline(always)]
pub fn depth_density(depth: f32, gradient: &Vector2<f32>, radius: f32, focal_px: f32) -> f32 {
    let q = depth / (radius * focal_px);
    q * q / PI * (gradient.norm_squared() + 1.0).sqrt()
}

fn check_rgb(rgb: &[u8], width: usize, height: usize) -> Result<(), Error> {
    if width == 0 || height == 0 {
        return Err(Error::ZeroDimension);
    }
    if rgb.len() != 3 * width * height {
        return Err(Error::DimensionMismatch {
            len: rgb.len(),
            width,
            height,
        });
    }
    Ok(())
}

/// Color features with a density taken from `density(x, y)`.
pub fn rgb_features<F>(
    rgb: &[u8],
    width: usize,
    height: usize,
    density: F,
) -> Result<Array2D<Pixel<PixelRgb>>, Error>
where
    F: Fn(usize, usize) -> f32 + Sync,
{
    check_rgb(rgb, width, height)?;
    let mut colors = vec![Vector3::zeros(); width * height];
    rgb_buffer_to_unit(rgb, &mut colors);
    let mut pixels = Array2D::from_fill(Pixel::<PixelRgb>::zero(), width, height);
    pixels
        .data
        .par_chunks_mut(width)
        .zip(colors.par_chunks(width))
        .enumerate()
        .for_each(|(y, (row, colors))| {
            for (x, (p, color)) in row.iter_mut().zip(colors).enumerate() {
                *p = Pixel {
                    num: 1.0,
                    position: Vector2::new(x as f32, y as f32),
                    density: density(x, y),
                    data: PixelRgb { color: *color },
                };
            }
        });
    Ok(pixels)
}

/// Color features with a constant density of `num_superpixels / (width * height)`.
pub fn slic_features(
    rgb: &[u8],
    width: usize,
    height: usize,
    num_superpixels: u32,
) -> Result<Array2D<Pixel<PixelRgb>>, Error> {
    let density = num_superpixels as f32 / (width * height) as f32;
    rgb_features(rgb, width, height, |_, _| density)
}

/// Color features with a caller supplied density map.
///
/// Every density must be finite and non-negative.
pub fn asp_features(
    rgb: &[u8],
    density: &[f32],
    width: usize,
    height: usize,
) -> Result<Array2D<Pixel<PixelRgb>>, Error> {
    check_dimensions(density.len(), width, height)?;
    if let Some((i, value)) = density
        .iter()
        .enumerate()
        .find(|(_, d)| !(d.is_finite() && **d >= 0.0))
    {
        return Err(Error::InvalidDensity {
            x: i % width,
            y: i / width,
            value: *value,
        });
    }
    rgb_features(rgb, width, height, |x, y| density[y * width + x])
}

/// Color and depth features.
///
/// Pixels with raw depth `0` get `num = 0`, a zero world point, a zero density and the normal
/// `(0, 0, -1)`. Depth gradients are estimated over a window of `0.1 * radius` meters.
pub fn rgbd_features(
    rgb: &[u8],
    depth: &[u16],
    width: usize,
    height: usize,
    camera: &Camera,
    radius: f32,
) -> Result<Array2D<Pixel<PixelRgbd>>, Error> {
    check_rgb(rgb, width, height)?;
    let depth = Array2D::from_slice(depth, width, height)?;
    let gradients = depth_gradients(&depth, 0.1 * radius, camera.focal_px, camera.depth_to_z);
    let mut colors = vec![Vector3::zeros(); width * height];
    rgb_buffer_to_unit(rgb, &mut colors);
    let mut pixels = Array2D::from_fill(Pixel::<PixelRgbd>::zero(), width, height);
    pixels
        .data
        .par_chunks_mut(width)
        .zip(colors.par_chunks(width))
        .enumerate()
        .for_each(|(y, (row, colors))| {
            let raw = depth.get_row(y);
            let grad = gradients.get_row(y);
            for (x, p) in row.iter_mut().enumerate() {
                let position = Vector2::new(x as f32, y as f32);
                let d = raw[x] as f32 * camera.depth_to_z;
                let world = if raw[x] == 0 {
                    Vector3::zeros()
                } else {
                    camera.backproject(&position, d)
                };
                *p = Pixel {
                    num: if raw[x] == 0 { 0.0 } else { 1.0 },
                    position,
                    density: depth_density(d, &grad[x], radius, camera.focal_px),
                    data: PixelRgbd {
                        color: colors[x],
                        depth: d,
                        world,
                        normal: normal_from_gradient(&grad[x], &world),
                    },
                };
            }
        });
    Ok(pixels)
}
