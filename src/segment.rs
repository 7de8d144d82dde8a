//! Segment records and their weighted-sum algebra.
//!
//! The same record type is used for raw pixels, accumulated sums and superpixel statistics.
//! Accumulating `v` into a sum `s` adds `v.num` to `s.num` and `v.num * field` to every other
//! field. The mean divides every field except `num` by the accumulated `num`, which keeps
//! reporting the true accumulated weight.

use nalgebra::{Vector2, Vector3};
use std::f32::consts::PI;
use std::ops::{Add, AddAssign, Mul};

/// Per-pixel payload carried through the clustering.
///
/// Payloads must form a vector space over `f32` so they can be averaged.
pub trait SegmentData:
    Copy + Send + Sync + Add<Output = Self> + AddAssign + Mul<f32, Output = Self>
{
    fn zero() -> Self;
}

/// A segment in the hierarchy (pixel, superpixel statistics, running sum).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment<T> {
    /// Accumulated weight. `0` marks an invalid pixel or an empty sum.
    pub num: f32,
    /// Location in pixel coordinates (weighted centroid once accumulated).
    pub position: Vector2<f32>,
    /// Target density (expected superpixels per pixel area) at this location.
    pub density: f32,
    pub data: T,
}

/// Raw pixel records are plain segments.
pub type Pixel<T> = Segment<T>;

impl<T: SegmentData> Segment<T> {
    pub fn zero() -> Self {
        Self {
            num: 0.0,
            position: Vector2::zeros(),
            density: 0.0,
            data: T::zero(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.num > 0.0
    }

    /// Every field multiplied by `s`, `num` included.
    pub fn scaled(&self, s: f32) -> Self {
        Self {
            num: s * self.num,
            position: s * self.position,
            density: s * self.density,
            data: self.data * s,
        }
    }
}

impl<T: SegmentData> AddAssign<&Segment<T>> for Segment<T> {
    /// Weighted accumulation of `x` into `self`.
    fn add_assign(&mut self, x: &Segment<T>) {
        self.num += x.num;
        self.position += x.num * x.position;
        self.density += x.num * x.density;
        self.data += x.data * x.num;
    }
}

/// Color only payload (SLIC and ASP).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRgb {
    /// RGB in `[0, 1]^3`.
    pub color: Vector3<f32>,
}

impl Add for PixelRgb {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            color: self.color + rhs.color,
        }
    }
}

impl AddAssign for PixelRgb {
    fn add_assign(&mut self, rhs: Self) {
        self.color += rhs.color;
    }
}

impl Mul<f32> for PixelRgb {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self {
            color: s * self.color,
        }
    }
}

impl SegmentData for PixelRgb {
    fn zero() -> Self {
        Self {
            color: Vector3::zeros(),
        }
    }
}

/// Color + depth payload (DASP).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelRgbd {
    /// RGB in `[0, 1]^3`.
    pub color: Vector3<f32>,
    /// Depth in meters, `0` for invalid pixels.
    pub depth: f32,
    /// Back-projected camera space point in meters.
    pub world: Vector3<f32>,
    /// Surface normal facing the camera. Not re-normalized after averaging.
    pub normal: Vector3<f32>,
}

impl Add for PixelRgbd {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            color: self.color + rhs.color,
            depth: self.depth + rhs.depth,
            world: self.world + rhs.world,
            normal: self.normal + rhs.normal,
        }
    }
}

impl AddAssign for PixelRgbd {
    fn add_assign(&mut self, rhs: Self) {
        self.color += rhs.color;
        self.depth += rhs.depth;
        self.world += rhs.world;
        self.normal += rhs.normal;
    }
}

impl Mul<f32> for PixelRgbd {
    type Output = Self;
    fn mul(self, s: f32) -> Self {
        Self {
            color: s * self.color,
            depth: s * self.depth,
            world: s * self.world,
            normal: s * self.normal,
        }
    }
}

impl SegmentData for PixelRgbd {
    fn zero() -> Self {
        Self {
            color: Vector3::zeros(),
            depth: 0.0,
            world: Vector3::zeros(),
            normal: Vector3::zeros(),
        }
    }
}

/// Running weighted sum of segments.
#[derive(Debug, Clone, Copy)]
pub struct SegmentAccumulator<T> {
    sum: Segment<T>,
}

impl<T: SegmentData> Default for SegmentAccumulator<T> {
    fn default() -> Self {
        Self {
            sum: Segment::zero(),
        }
    }
}

impl<T: SegmentData> SegmentAccumulator<T> {
    #[inline(always)]
    pub fn add(&mut self, v: &Segment<T>) {
        self.sum += v;
    }

    /// Merge another partial sum into this one.
    pub fn merge(&mut self, other: &SegmentAccumulator<T>) {
        self.sum.num += other.sum.num;
        self.sum.position += other.sum.position;
        self.sum.density += other.sum.density;
        self.sum.data += other.sum.data;
    }

    pub fn is_empty(&self) -> bool {
        self.sum.num == 0.0
    }

    /// Raw weighted sum.
    pub fn sum(&self) -> &Segment<T> {
        &self.sum
    }

    /// Weighted mean, `None` for an empty accumulator.
    pub fn mean(&self) -> Option<Segment<T>> {
        if self.is_empty() {
            return None;
        }
        let mut seg = self.sum.scaled(1.0 / self.sum.num);
        seg.num = self.sum.num;
        Some(seg)
    }
}

/// Superpixel seed placed by the density sampler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Seed {
    pub position: Vector2<f32>,
    pub density: f32,
}

/// Radius of a disk with area `1 / density`.
#[inline(always)]
pub fn density_to_radius(density: f32) -> f32 {
    (1.0 / (density * PI)).sqrt()
}

/// Inverse of [`density_to_radius`].
#[inline(always)]
pub fn radius_to_density(radius: f32) -> f32 {
    1.0 / (PI * radius * radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixel(num: f32, x: f32, y: f32, density: f32, c: f32) -> Segment<PixelRgb> {
        Segment {
            num,
            position: Vector2::new(x, y),
            density,
            data: PixelRgb {
                color: Vector3::new(c, c, c),
            },
        }
    }

    #[test]
    fn weighted_centroid() {
        let pixels = [
            pixel(1.0, 0.0, 0.0, 0.1, 0.0),
            pixel(3.0, 4.0, 8.0, 0.2, 1.0),
            pixel(0.0, 100.0, 100.0, 5.0, 0.5),
            pixel(0.5, 2.0, 2.0, 0.4, 0.2),
        ];
        let mut acc = SegmentAccumulator::default();
        pixels.iter().for_each(|p| acc.add(p));
        let mean = acc.mean().unwrap();
        let total: f32 = pixels.iter().map(|p| p.num).sum();
        let cx: f32 = pixels.iter().map(|p| p.num * p.position.x).sum::<f32>() / total;
        let cy: f32 = pixels.iter().map(|p| p.num * p.position.y).sum::<f32>() / total;
        let d: f32 = pixels.iter().map(|p| p.num * p.density).sum::<f32>() / total;
        assert_eq!(mean.num, total);
        assert!((mean.position.x - cx).abs() < 1e-5);
        assert!((mean.position.y - cy).abs() < 1e-5);
        assert!((mean.density - d).abs() < 1e-6);
        assert!((mean.data.color.x - 3.1 / 4.5).abs() < 1e-5);
    }

    #[test]
    fn accumulation_is_order_independent() {
        let pixels: Vec<_> = (0..50)
            .map(|i| {
                let f = i as f32;
                pixel(1.0 + (i % 3) as f32, f, 2.0 * f, 0.01 * f, f / 50.0)
            })
            .collect();
        let mut forward = SegmentAccumulator::default();
        pixels.iter().for_each(|p| forward.add(p));
        let mut backward = SegmentAccumulator::default();
        pixels.iter().rev().for_each(|p| backward.add(p));
        let mut left = SegmentAccumulator::default();
        let mut right = SegmentAccumulator::default();
        pixels[..17].iter().for_each(|p| left.add(p));
        pixels[17..].iter().for_each(|p| right.add(p));
        left.merge(&right);
        let a = forward.mean().unwrap();
        for b in [backward.mean().unwrap(), left.mean().unwrap()] {
            assert_eq!(a.num, b.num);
            assert!((a.position - b.position).norm() < 1e-3);
            assert!((a.density - b.density).abs() < 1e-5);
            assert!((a.data.color - b.data.color).norm() < 1e-5);
        }
    }

    #[test]
    fn empty_accumulator_has_no_mean() {
        let mut acc = SegmentAccumulator::<PixelRgb>::default();
        assert!(acc.is_empty());
        assert!(acc.mean().is_none());
        acc.add(&pixel(0.0, 3.0, 3.0, 0.1, 1.0));
        assert!(acc.is_empty());
        assert!(acc.mean().is_none());
    }

    #[test]
    fn radius_density_round_trip() {
        for d in [1e-5f32, 1e-3, 0.01, 0.5, 1.0, 30.0] {
            let r = density_to_radius(d);
            assert!((radius_to_density(r) - d).abs() <= 1e-5 * d, "{d}");
        }
        assert!((density_to_radius(0.01) - 5.6419).abs() < 1e-3);
    }

    #[test]
    fn rgbd_payload_algebra() {
        let a = PixelRgbd {
            color: Vector3::new(1.0, 0.0, 0.0),
            depth: 2.0,
            world: Vector3::new(0.0, 0.0, 2.0),
            normal: Vector3::new(0.0, 0.0, -1.0),
        };
        let b = a * 2.0 + PixelRgbd::zero();
        assert_eq!(b.depth, 4.0);
        assert_eq!(b.world, Vector3::new(0.0, 0.0, 4.0));
        assert_eq!(b.normal, Vector3::new(0.0, 0.0, -2.0));
    }
}
