use multiversion::multiversion;
use nalgebra::Vector3;
use tables::UNIT_TBL;

pub(crate) mod tables {
    use static_init::dynamic;
    /// `i / 255` for every 8-bit channel value.
    #[dynamic]
    pub static UNIT_TBL: [f32; 256] = core::array::from_fn(|i| i as f32 / 255.0);
}

/// Convert one RGB24 pixel to a color in `[0, 1]^3`.
#[inline(always)]
pub fn rgb_to_unit(rgb: &[u8]) -> Vector3<f32> {
    Vector3::new(
        UNIT_TBL[rgb[0] as usize],
        UNIT_TBL[rgb[1] as usize],
        UNIT_TBL[rgb[2] as usize],
    )
}

/// Convert a unit color back to RGB24, clamping out-of-range channels.
#[inline(always)]
pub fn unit_to_rgb(color: &Vector3<f32>) -> [u8; 3] {
    [
        unit_to_u8(color.x),
        unit_to_u8(color.y),
        unit_to_u8(color.z),
    ]
}

/// Map a signed unit value in `[-1, 1]` (e.g. a normal component) to `0..=255`.
#[inline(always)]
pub fn signed_unit_to_rgb(v: &Vector3<f32>) -> [u8; 3] {
    [
        unit_to_u8(0.5 * (v.x + 1.0)),
        unit_to_u8(0.5 * (v.y + 1.0)),
        unit_to_u8(0.5 * (v.z + 1.0)),
    ]
}

#[inline(always)]
pub(crate) fn unit_to_u8(v: f32) -> u8 {
    (255.0 * v.clamp(0.0, 1.0)) as u8
}

/// Convert a packed RGB24 buffer into unit colors.
#[multiversion(targets = "simd")]
pub fn rgb_buffer_to_unit(rgb: &[u8], out: &mut [Vector3<f32>]) {
    debug_assert_eq!(rgb.len(), out.len() * 3);
    for (pixel, color) in rgb.chunks_exact(3).zip(out.iter_mut()) {
        *color = rgb_to_unit(pixel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_table_test() {
        assert_eq!(UNIT_TBL[0], 0.0);
        assert_eq!(UNIT_TBL[255], 1.0);
        assert!(UNIT_TBL.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn rgb_round_trip_test() {
        for v in 0..=255u8 {
            let c = rgb_to_unit(&[v, 255 - v, 0]);
            let [r, g, b] = unit_to_rgb(&c);
            assert!(r.abs_diff(v) <= 1, "{r} vs {v}");
            assert!(g.abs_diff(255 - v) <= 1);
            assert_eq!(b, 0);
        }
    }

    #[test]
    fn signed_mapping_test() {
        let rgb = signed_unit_to_rgb(&Vector3::new(-1.0, 0.0, 1.0));
        assert_eq!(rgb, [0, 127, 255]);
    }

    #[test]
    fn buffer_conversion_test() {
        let rgb = [0u8, 0, 0, 255, 255, 255];
        let mut out = vec![Vector3::zeros(); 2];
        rgb_buffer_to_unit(&rgb, &mut out);
        assert_eq!(out[0], Vector3::zeros());
        assert_eq!(out[1], Vector3::new(1.0, 1.0, 1.0));
    }
}
