//! RGB8 visualizations of segmentations.
//!
//! Rasters are returned as [`Array2D<[u8; 3]>`](Array2D); [`to_rgb_bytes`] packs them for image
//! encoders.

use crate::arrays::Array2D;
use crate::aslic::Segmentation;
use crate::color::{signed_unit_to_rgb, unit_to_rgb, unit_to_u8};
use crate::error::Error;
use crate::segment::{Pixel, PixelRgb, PixelRgbd};
use crate::superpixel::Superpixel;
use nalgebra::Vector3;
use rayon::prelude::*;

/// Color of pixels without a superpixel.
pub const INVALID_COLOR: [u8; 3] = [255, 0, 255];
pub const BORDER_COLOR: [u8; 3] = [0, 0, 0];

/// Density mapped to white.
const DENSITY_MAX: f32 = 0.025;

/// Payloads with a color.
pub trait HasColor {
    fn color(&self) -> &Vector3<f32>;
}

impl HasColor for PixelRgb {
    fn color(&self) -> &Vector3<f32> {
        &self.color
    }
}

impl HasColor for PixelRgbd {
    fn color(&self) -> &Vector3<f32> {
        &self.color
    }
}

/// Color every pixel by its own feature record.
pub fn plot_pixels<T, F>(segmentation: &Segmentation<T>, colfn: F) -> Array2D<[u8; 3]>
where
    T: Sync,
    F: Fn(&Pixel<T>) -> [u8; 3] + Sync,
{
    let input = &segmentation.input;
    let mut vis = Array2D::from_fill([0u8; 3], input.width, input.height);
    vis.data
        .par_iter_mut()
        .zip(input.data.par_iter())
        .for_each(|(v, pixel)| *v = colfn(pixel));
    vis
}

/// Color every pixel by its superpixel, unassigned pixels get [`INVALID_COLOR`].
pub fn plot_superpixels<T, F>(segmentation: &Segmentation<T>, colfn: F) -> Array2D<[u8; 3]>
where
    T: Sync,
    F: Fn(&Superpixel<T>) -> [u8; 3] + Sync,
{
    let indices = &segmentation.indices;
    let mut vis = Array2D::from_fill([0u8; 3], indices.width, indices.height);
    vis.data
        .par_iter_mut()
        .zip(indices.data.par_iter())
        .for_each(|(v, sid)| {
            *v = usize::try_from(*sid)
                .ok()
                .and_then(|sid| segmentation.superpixels.get(sid))
                .map_or(INVALID_COLOR, &colfn);
        });
    vis
}

/// Paint pixels with a 4-neighbour (clamped to the image) of another superpixel.
///
/// `vis` must have the size of the segmentation.
pub fn plot_border<T>(
    vis: &mut Array2D<[u8; 3]>,
    segmentation: &Segmentation<T>,
    color: [u8; 3],
) -> Result<(), Error> {
    let indices = &segmentation.indices;
    if vis.width != indices.width || vis.height != indices.height {
        return Err(Error::DimensionMismatch {
            len: vis.len(),
            width: indices.width,
            height: indices.height,
        });
    }
    paint_border(vis, indices, color);
    Ok(())
}

fn paint_border(vis: &mut Array2D<[u8; 3]>, indices: &Array2D<i32>, color: [u8; 3]) {
    let (width, height) = (indices.width, indices.height);
    for y in 0..height {
        let ym = y.saturating_sub(1);
        let yp = (y + 1).min(height - 1);
        for x in 0..width {
            let xm = x.saturating_sub(1);
            let xp = (x + 1).min(width - 1);
            let i = indices[(x, y)];
            if i != indices[(xm, y)]
                || i != indices[(xp, y)]
                || i != indices[(x, ym)]
                || i != indices[(x, yp)]
            {
                vis[(x, y)] = color;
            }
        }
    }
}

/// Gray value of the pixel density.
pub fn visualize_pixel_density<T: Sync>(segmentation: &Segmentation<T>) -> Array2D<[u8; 3]> {
    plot_pixels(segmentation, |pixel| {
        let c = unit_to_u8(pixel.density / DENSITY_MAX);
        [c, c, c]
    })
}

/// Mean color of every superpixel with borders.
pub fn visualize_superpixel_color<T: HasColor + Sync>(
    segmentation: &Segmentation<T>,
) -> Array2D<[u8; 3]> {
    let mut vis = plot_superpixels(segmentation, |sp| unit_to_rgb(sp.data.color()));
    paint_border(&mut vis, &segmentation.indices, BORDER_COLOR);
    vis
}

/// Mean normal of every superpixel with borders.
pub fn visualize_superpixel_normal(segmentation: &Segmentation<PixelRgbd>) -> Array2D<[u8; 3]> {
    let mut vis = plot_superpixels(segmentation, |sp| signed_unit_to_rgb(&sp.data.normal));
    paint_border(&mut vis, &segmentation.indices, BORDER_COLOR);
    vis
}

/// Packed RGB24 buffer in row-major order.
pub fn to_rgb_bytes(vis: &Array2D<[u8; 3]>) -> Vec<u8> {
    vis.data.iter().flatten().copied().collect()
}
