use crate::error::{check_positive, Error};
use crate::sampling::SamplingMethod;
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Changes between parallelization schemas of the clustering engine.
///
/// Both schemas produce bit-identical segmentations. Superpixels are always visited in id order
/// for every pixel, and every superpixel accumulates its pixels in row-major order.
#[derive(Clone, PartialEq, Debug, Copy, Serialize, Deserialize)]
pub enum AssignThreadingStrategy {
    /// No threading - used for correctness checks and very small images.
    SingleThread,
    /// The assignment step splits the image into `rayon::current_num_threads()` row bands which
    /// are processed in parallel, and the update step runs in parallel over superpixels.
    ///
    /// This is the default.
    RowBased,
}

/// Main config for the clustering engine.
///
/// The defaults reproduce the classic adaptive SLIC setup: 10 rounds and a search window of
/// three superpixel radii. Smaller values are mainly useful for tests on tiny synthetic images.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How many assign/update rounds are done. There is no early exit.
    pub max_iterations: u16,
    /// Half-width of the assignment window in units of the superpixel radius.
    ///
    /// Pixels farther away than `window_factor * radius` (per axis) from every superpixel stay
    /// unassigned.
    pub window_factor: f32,
    /// Error diffusion kernel used to place the seeds.
    pub sampling_method: SamplingMethod,
    /// Threading strategy for the assign and update steps.
    pub threading_strategy: AssignThreadingStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            window_factor: 3.0,
            sampling_method: SamplingMethod::FloydSteinbergExpo,
            threading_strategy: AssignThreadingStrategy::RowBased,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), Error> {
        if self.max_iterations == 0 {
            return Err(Error::InvalidParameter {
                name: "max_iterations",
                value: 0.0,
            });
        }
        check_positive("window_factor", self.window_factor)
    }
}

pub(crate) fn split_length_to_ranges(length: usize, splits: usize) -> Vec<Range<usize>> {
    let splits = splits.clamp(1, length.max(1));
    let chunk_size = length / splits;
    let rem = length % splits;
    (0..splits)
        .scan((rem, 0usize), |(r, acc), _split| {
            let mut size = chunk_size;
            if *r > 0 {
                *r -= 1;
                size += 1;
            }
            let out = (*acc, *acc + size);
            *acc += size;
            Some(out.0..out.1)
        })
        .collect()
}
