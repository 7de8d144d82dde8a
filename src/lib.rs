//! Adaptive superpixels in Rust.
//!
//! This crate segments color images and registered color + depth (RGB-D) images into
//! superpixels whose size follows a density field. Three variants are provided:
//!
//! * [`slic`]: classic SLIC, every superpixel covers roughly the same number of pixels.
//! * [`asp`]: adaptive superpixels, the caller supplies a density map (expected superpixels per
//!   pixel).
//! * [`dasp`]: depth-adaptive superpixels, the density is derived from depth so that every
//!   superpixel covers roughly the same surface area in the scene.
//!
//! All of them share the same engine ([`aslic::aslic`]): seeds are sampled from the density field
//! by error diffusion, pixels are assigned to the best superpixel within a window proportional to
//! its radius and superpixels are re-estimated as the mean of their pixels.
//!
//! The following example segments a packed RGB24 image (default for the image crate):
//!
//! ```rust
//! use adaptive_superpixels::{slic, Config, SlicParameters};
//!
//! fn main() -> Result<(), adaptive_superpixels::Error> {
//!     let (width, height) = (64, 48);
//!     // left half red, right half blue
//!     let rgb: Vec<u8> = (0..width * height)
//!         .flat_map(|i| if i % width < width / 2 { [200, 30, 30] } else { [30, 30, 200] })
//!         .collect();
//!     let params = SlicParameters {
//!         num_superpixels: 24,
//!         ..SlicParameters::default()
//!     };
//!     let segmentation = slic(&rgb, width, height, &params, &Config::default())?;
//!     assert!(!segmentation.superpixels.is_empty());
//!     // superpixel id of every pixel, -1 for unassigned ones
//!     let _id = segmentation.indices[(10usize, 10usize)];
//!     Ok(())
//! }
//! ```
//!
//! Segmentations can be turned into neighbourhood graphs ([`graph`]) and RGB visualizations
//! ([`plot`]).
//!
//! It's strongly recommended to use this in release build. This library uses `assume!` macro to
//! avoid boundary checks in hot-loops in release builds.
//!
//! Note: There may be problems in builds for non-x86 platforms.
//!

pub mod algos;
pub mod arrays;
pub mod aslic;
pub mod color;
pub mod common;
pub mod error;
pub mod features;
pub mod gradient;
pub mod graph;
pub mod plot;
pub mod sampling;
pub mod segment;
pub mod superpixel;

pub use algos::{asp, dasp, slic, AspParameters, DaspParameters, SlicParameters};
pub use aslic::Segmentation;
pub use common::{AssignThreadingStrategy, Config};
pub use error::Error;
pub use sampling::SamplingMethod;
