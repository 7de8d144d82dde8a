use thiserror::Error;

/// Errors reported by the public entry points.
///
/// Degenerate numeric states (invalid depth pixels, superpixels that capture nothing) are not
/// errors and never show up here. Only malformed input and configuration does.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("image dimensions cannot be zero")]
    ZeroDimension,

    #[error("buffer length {len} does not match dimensions {width}x{height}")]
    DimensionMismatch {
        len: usize,
        width: usize,
        height: usize,
    },

    #[error("invalid parameter `{name}`: {value}")]
    InvalidParameter { name: &'static str, value: f32 },

    #[error("density at ({x}, {y}) must be finite and non-negative, got {value}")]
    InvalidDensity { x: usize, y: usize, value: f32 },
}

pub(crate) fn check_dimensions(len: usize, width: usize, height: usize) -> Result<(), Error> {
    if width == 0 || height == 0 {
        return Err(Error::ZeroDimension);
    }
    if len != width * height {
        return Err(Error::DimensionMismatch { len, width, height });
    }
    Ok(())
}

/// Checks that `value` is finite and strictly positive.
pub(crate) fn check_positive(name: &'static str, value: f32) -> Result<(), Error> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidParameter { name, value })
    }
}

/// Checks that `value` is a blend weight in `[0, 1]`.
pub(crate) fn check_unit(name: &'static str, value: f32) -> Result<(), Error> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidParameter { name, value })
    }
}
