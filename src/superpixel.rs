use crate::segment::{density_to_radius, Segment, SegmentData};
use nalgebra::Vector2;

/// Struct of an adaptive superpixel.
///
/// Fields `num`, `position`, `density` and `data` are the segment statistics updated by the
/// engine every round; `radius` always follows `density`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Superpixel<T> {
    /// Accumulated weight of the member pixels (1 right after seeding).
    pub num: f32,
    /// Center in pixel coordinates.
    pub position: Vector2<f32>,
    /// Mean target density of the member pixels.
    pub density: f32,
    /// Mean payload of the member pixels.
    pub data: T,
    /// Radius of a disk with area `1 / density`.
    pub radius: f32,
}

impl<T: SegmentData> Superpixel<T> {
    pub fn from_segment(segment: Segment<T>) -> Self {
        Self {
            num: segment.num,
            position: segment.position,
            density: segment.density,
            data: segment.data,
            radius: density_to_radius(segment.density),
        }
    }

    /// The segment part of the superpixel.
    pub fn segment(&self) -> Segment<T> {
        Segment {
            num: self.num,
            position: self.position,
            density: self.density,
            data: self.data,
        }
    }

    /// Replace the segment statistics and recompute the radius.
    pub fn set_segment(&mut self, segment: Segment<T>) {
        *self = Self::from_segment(segment);
    }

    /// Assignment window of half-width `window_factor * radius` clipped to the image.
    pub fn window(&self, width: usize, height: usize, window_factor: f32) -> Window {
        let w = window_factor * self.radius;
        let (left, right) = get_range(width, self.position.x, w);
        let (top, bottom) = get_range(height, self.position.y, w);
        Window {
            left,
            right,
            top,
            bottom,
        }
    }
}

/// Half-open pixel rectangle `left..right` x `top..bottom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Window {
    pub left: usize,
    pub right: usize,
    pub top: usize,
    pub bottom: usize,
}

impl Window {
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    pub fn area(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (self.right - self.left) * (self.bottom - self.top)
    }

    /// Rows shared with the half-open row range `start..end`.
    #[inline(always)]
    pub fn rows_within(&self, start: usize, end: usize) -> std::ops::Range<usize> {
        self.top.max(start)..self.bottom.min(end)
    }
}

/// `[floor(x - w), ceil(x + w))` clipped to `[0, len)`.
///
/// Infinite radii (zero density) saturate to the full range.
#[inline(always)]
fn get_range(len: usize, x: f32, w: f32) -> (usize, usize) {
    let low = (x - w).floor().max(0.0).min(len as f32) as usize;
    let high = (x + w).ceil().max(0.0).min(len as f32) as usize;
    (low, high)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{radius_to_density, PixelRgb};
    use nalgebra::Vector3;

    fn superpixel(x: f32, y: f32, radius: f32) -> Superpixel<PixelRgb> {
        Superpixel::from_segment(Segment {
            num: 1.0,
            position: Vector2::new(x, y),
            density: radius_to_density(radius),
            data: PixelRgb {
                color: Vector3::zeros(),
            },
        })
    }

    #[test]
    fn window_inside_image() {
        let sp = superpixel(50.5, 40.5, 2.0);
        assert!((sp.radius - 2.0).abs() < 1e-5);
        let win = sp.window(100, 100, 3.0);
        assert_eq!(
            win,
            Window {
                left: 44,
                right: 57,
                top: 34,
                bottom: 47
            }
        );
        assert_eq!(win.area(), 169);
    }

    #[test]
    fn window_is_clipped() {
        let sp = superpixel(1.5, 97.5, 2.0);
        let win = sp.window(100, 100, 3.0);
        assert_eq!(win.left, 0);
        assert_eq!(win.right, 8);
        assert_eq!(win.top, 91);
        assert_eq!(win.bottom, 100);
        assert_eq!(win.rows_within(95, 200), 95..100);
        assert!(win.rows_within(0, 50).is_empty());
    }

    #[test]
    fn zero_density_covers_image() {
        let mut sp = superpixel(10.0, 10.0, 1.0);
        sp.density = 0.0;
        sp.radius = density_to_radius(0.0);
        assert!(sp.radius.is_infinite());
        let win = sp.window(30, 20, 3.0);
        assert_eq!(
            win,
            Window {
                left: 0,
                right: 30,
                top: 0,
                bottom: 20
            }
        );
    }

    #[test]
    fn segment_conversion() {
        let mut sp = superpixel(3.0, 4.0, 5.0);
        let mut seg = sp.segment();
        assert_eq!(seg.position, Vector2::new(3.0, 4.0));
        seg.density = radius_to_density(1.0);
        seg.num = 7.0;
        sp.set_segment(seg);
        assert_eq!(sp.num, 7.0);
        assert!((sp.radius - 1.0).abs() < 1e-5);
    }
}
