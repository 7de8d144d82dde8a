//! The three segmentation variants: SLIC, ASP and DASP.
//!
//! All of them build a feature raster, sample seeds from its density field and run
//! [`aslic`] with a variant specific distance.

use crate::arrays::Array2D;
use crate::aslic::{aslic, compute_seeds, Segmentation};
use crate::common::Config;
use crate::error::{check_positive, check_unit, Error};
use crate::features::{asp_features, rgbd_features, slic_features, Camera};
use crate::segment::{Pixel, PixelRgb, PixelRgbd, SegmentData};
use crate::superpixel::Superpixel;
use log::{info, warn};
use nalgebra::{Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// Parameters of classic SLIC with a uniform superpixel size.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicParameters {
    /// Target number of superpixels.
    pub num_superpixels: u32,
    /// Blend between spatial (1) and color (0) distance.
    pub compactness: f32,
}

impl Default for SlicParameters {
    fn default() -> Self {
        Self {
            num_superpixels: 1000,
            compactness: 0.15,
        }
    }
}

impl SlicParameters {
    pub fn validate(&self) -> Result<(), Error> {
        if self.num_superpixels == 0 {
            return Err(Error::InvalidParameter {
                name: "num_superpixels",
                value: 0.0,
            });
        }
        check_unit("compactness", self.compactness)
    }
}

/// Parameters of adaptive SLIC with a caller supplied density map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AspParameters {
    pub compactness: f32,
}

impl Default for AspParameters {
    fn default() -> Self {
        Self { compactness: 0.15 }
    }
}

impl AspParameters {
    pub fn validate(&self) -> Result<(), Error> {
        check_unit("compactness", self.compactness)
    }
}

/// Parameters of depth-adaptive superpixels.
///
/// The defaults match a Kinect style sensor delivering depth in millimeters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaspParameters {
    pub focal_px: f32,
    /// Meters per raw depth unit.
    pub depth_to_z: f32,
    /// Superpixel radius on the surface in meters.
    pub radius: f32,
    /// Blend between world distance (1) and appearance (0).
    pub compactness: f32,
    /// Blend between normal (1) and color (0) inside the appearance term.
    pub normal_weight: f32,
    /// Principal point in pixels, the image center when `None`.
    pub principal_point: Option<[f32; 2]>,
}

impl Default for DaspParameters {
    fn default() -> Self {
        Self {
            focal_px: 540.0,
            depth_to_z: 0.001,
            radius: 0.025,
            compactness: 0.4,
            normal_weight: 0.2,
            principal_point: None,
        }
    }
}

impl DaspParameters {
    pub fn validate(&self) -> Result<(), Error> {
        check_positive("focal_px", self.focal_px)?;
        check_positive("depth_to_z", self.depth_to_z)?;
        check_positive("radius", self.radius)?;
        check_unit("compactness", self.compactness)?;
        check_unit("normal_weight", self.normal_weight)?;
        if let Some(value) = self
            .principal_point
            .into_iter()
            .flatten()
            .find(|v| !v.is_finite())
        {
            return Err(Error::InvalidParameter {
                name: "principal_point",
                value,
            });
        }
        Ok(())
    }

    pub fn camera(&self, width: usize, height: usize) -> Camera {
        let center = match self.principal_point {
            Some([cx, cy]) => Vector2::new(cx, cy),
            None => 0.5 * Vector2::new(width as f32, height as f32),
        };
        Camera {
            focal_px: self.focal_px,
            depth_to_z: self.depth_to_z,
            center,
        }
    }
}

/// Spatial distance relative to the superpixel radius blended with the color distance.
#[inline(always)]
fn color_distance(compactness: f32, a: &Superpixel<PixelRgb>, b: &Pixel<PixelRgb>) -> f32 {
    compactness * (a.position - b.position).norm_squared() / (a.radius * a.radius)
        + (1.0 - compactness) * (a.data.color - b.data.color).norm_squared()
}

/// `1 - cos` of the angle between two normals.
#[inline(always)]
fn normal_distance(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    1.0 - a.dot(b)
}

fn segment<T, F>(
    input: Array2D<Pixel<T>>,
    config: &Config,
    method: &str,
    dist: F,
) -> Segmentation<T>
where
    T: SegmentData,
    F: Fn(&Superpixel<T>, &Pixel<T>) -> f32 + Sync,
{
    let seeds = compute_seeds(config.sampling_method, &input);
    if seeds.is_empty() {
        warn!("{method}: density field is empty, no superpixels are created");
    }
    let segmentation = aslic(input, &seeds, config, dist);
    info!("{method}: {} superpixels", segmentation.superpixels.len());
    segmentation
}

/// SLIC superpixels of a packed RGB24 image.
pub fn slic(
    rgb: &[u8],
    width: usize,
    height: usize,
    params: &SlicParameters,
    config: &Config,
) -> Result<Segmentation<PixelRgb>, Error> {
    config.validate()?;
    params.validate()?;
    let input = slic_features(rgb, width, height, params.num_superpixels)?;
    let compactness = params.compactness;
    Ok(segment(input, config, "SLIC", move |a, b| {
        color_distance(compactness, a, b)
    }))
}

/// Adaptive superpixels following `density` (expected superpixels per pixel).
pub fn asp(
    rgb: &[u8],
    density: &[f32],
    width: usize,
    height: usize,
    params: &AspParameters,
    config: &Config,
) -> Result<Segmentation<PixelRgb>, Error> {
    config.validate()?;
    params.validate()?;
    let input = asp_features(rgb, density, width, height)?;
    let compactness = params.compactness;
    Ok(segment(input, config, "ASP", move |a, b| {
        color_distance(compactness, a, b)
    }))
}

/// Depth-adaptive superpixels of an RGB24 image with a registered 16-bit depth image.
///
/// Raw depth `0` marks invalid pixels. They are assigned to superpixels but do not contribute
/// to their statistics.
pub fn dasp(
    rgb: &[u8],
    depth: &[u16],
    width: usize,
    height: usize,
    params: &DaspParameters,
    config: &Config,
) -> Result<Segmentation<PixelRgbd>, Error> {
    config.validate()?;
    params.validate()?;
    let camera = params.camera(width, height);
    let input = rgbd_features(rgb, depth, width, height, &camera, params.radius)?;
    let DaspParameters {
        radius,
        compactness,
        normal_weight,
        ..
    } = *params;
    let inv_radius_sq = 1.0 / (radius * radius);
    Ok(segment(
        input,
        config,
        "DASP",
        move |a: &Superpixel<PixelRgbd>, b: &Pixel<PixelRgbd>| {
            compactness * (a.data.world - b.data.world).norm_squared() * inv_radius_sq
                + (1.0 - compactness)
                    * ((1.0 - normal_weight) * (a.data.color - b.data.color).norm_squared()
                        + normal_weight * normal_distance(&a.data.normal, &b.data.normal))
        },
    ))
}
