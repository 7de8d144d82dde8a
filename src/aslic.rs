use crate::arrays::{Array2D, RowBand};
use crate::common::{split_length_to_ranges, AssignThreadingStrategy, Config};
use crate::sampling::{sample, SamplingMethod};
use crate::segment::{Pixel, Seed, SegmentAccumulator, SegmentData};
use crate::superpixel::{Superpixel, Window};
use assume::assume;
use log::{debug, log_enabled, Level};
use rayon::current_num_threads;
use rayon::prelude::*;

/// Index of a pixel that no superpixel window reached.
pub const UNASSIGNED: i32 = -1;

/// Result of the clustering engine.
#[derive(Debug, Clone)]
pub struct Segmentation<T> {
    /// Feature raster the segmentation was computed from.
    pub input: Array2D<Pixel<T>>,
    pub superpixels: Vec<Superpixel<T>>,
    /// Owning superpixel id per pixel or [`UNASSIGNED`].
    pub indices: Array2D<i32>,
    /// Distance to the owning superpixel, `+inf` for unassigned pixels.
    pub weights: Array2D<f32>,
}

impl<T> Segmentation<T> {
    pub fn width(&self) -> usize {
        self.input.width
    }

    pub fn height(&self) -> usize {
        self.input.height
    }

    /// Superpixel owning pixel `(x, y)`.
    pub fn superpixel_at(&self, x: usize, y: usize) -> Option<&Superpixel<T>> {
        usize::try_from(self.indices[(x, y)])
            .ok()
            .and_then(|sid| self.superpixels.get(sid))
    }

    pub fn unassigned_count(&self) -> usize {
        count_unassigned(&self.indices)
    }
}

fn count_unassigned(indices: &Array2D<i32>) -> usize {
    indices.data.iter().filter(|i| **i == UNASSIGNED).count()
}

/// Sample seeds from the density field of `input`.
///
/// The density of a seed is read from the pixel at its floored position.
pub fn compute_seeds<T: SegmentData>(
    method: SamplingMethod,
    input: &Array2D<Pixel<T>>,
) -> Vec<Seed> {
    if input.is_empty() {
        return Vec::new();
    }
    let density = Array2D::from_fn(input.width, input.height, |x, y| input[(x, y)].density);
    sample(method, &density)
        .into_iter()
        .map(|position| {
            let x = (position.x.floor().max(0.0) as usize).min(input.width - 1);
            let y = (position.y.floor().max(0.0) as usize).min(input.height - 1);
            Seed {
                position,
                density: input[(x, y)].density,
            }
        })
        .collect()
}

/// One superpixel per seed with the statistics of the pixel under the seed.
///
/// `num` is set to 1 even when that pixel is invalid.
pub fn initialize_superpixels<T: SegmentData>(
    input: &Array2D<Pixel<T>>,
    seeds: &[Seed],
) -> Vec<Superpixel<T>> {
    if input.is_empty() {
        return Vec::new();
    }
    seeds
        .iter()
        .map(|seed| {
            let x = (seed.position.x.floor().max(0.0) as usize).min(input.width - 1);
            let y = (seed.position.y.floor().max(0.0) as usize).min(input.height - 1);
            let mut segment = input[(x, y)];
            segment.num = 1.0;
            segment.position = seed.position;
            segment.density = seed.density;
            Superpixel::from_segment(segment)
        })
        .collect()
}

/// Adaptive SLIC.
///
/// Runs `config.max_iterations` rounds of assignment and update. In the assignment every
/// superpixel claims the pixels of its window (half-width `config.window_factor * radius`)
/// which are strictly closer to it under `dist` than to any superpixel visited before it.
/// Ties go to the lower id. The update replaces position, density and payload of every
/// superpixel by the `num`-weighted mean of its pixels. A superpixel without valid pixels
/// keeps its previous state.
///
/// The returned index and weight rasters are the ones of the last assignment.
pub fn aslic<T, F>(
    input: Array2D<Pixel<T>>,
    seeds: &[Seed],
    config: &Config,
    dist: F,
) -> Segmentation<T>
where
    T: SegmentData,
    F: Fn(&Superpixel<T>, &Pixel<T>) -> f32 + Sync,
{
    let (width, height) = (input.width, input.height);
    let mut superpixels = initialize_superpixels(&input, seeds);
    let mut indices = Array2D::from_fill(UNASSIGNED, width, height);
    let mut weights = Array2D::from_fill(f32::INFINITY, width, height);
    let mut windows = vec![Window::default(); superpixels.len()];
    for round in 0..config.max_iterations {
        for (window, sp) in windows.iter_mut().zip(&superpixels) {
            *window = sp.window(width, height, config.window_factor);
        }
        assign(
            &input,
            &superpixels,
            &windows,
            &dist,
            config.threading_strategy,
            &mut indices,
            &mut weights,
        );
        update(
            &input,
            &mut superpixels,
            &windows,
            &indices,
            config.threading_strategy,
        );
        if log_enabled!(Level::Debug) {
            let unassigned = count_unassigned(&indices);
            debug!(
                "round {round}: {} pixels assigned, {unassigned} unassigned",
                indices.len() - unassigned
            );
        }
    }
    Segmentation {
        input,
        superpixels,
        indices,
        weights,
    }
}

/// This function does the assignment step.
///
/// The image is split into row bands. Every band visits all superpixels in id order, so a band
/// makes the same decisions for its pixels as a single pass over the whole image.
fn assign<T, F>(
    input: &Array2D<Pixel<T>>,
    superpixels: &[Superpixel<T>],
    windows: &[Window],
    dist: &F,
    threading_strategy: AssignThreadingStrategy,
    indices: &mut Array2D<i32>,
    weights: &mut Array2D<f32>,
) where
    T: SegmentData,
    F: Fn(&Superpixel<T>, &Pixel<T>) -> f32 + Sync,
{
    indices.fill(UNASSIGNED);
    weights.fill(f32::INFINITY);
    let splits = match threading_strategy {
        AssignThreadingStrategy::SingleThread => 1,
        AssignThreadingStrategy::RowBased => current_num_threads(),
    };
    let ranges = split_length_to_ranges(input.height, splits);
    let bands: Vec<(RowBand<i32>, RowBand<f32>)> = indices
        .split_rows_mut(&ranges)
        .into_iter()
        .zip(weights.split_rows_mut(&ranges))
        .collect();

    let assign_band = |(mut band_indices, mut band_weights): (RowBand<i32>, RowBand<f32>)| {
        let rows = band_indices.rows.clone();
        for (sid, (sp, window)) in superpixels.iter().zip(windows).enumerate() {
            assume!(
                unsafe: window.right <= input.width && window.bottom <= input.height,
                "window {window:?} outside of the image"
            );
            for y in window.rows_within(rows.start, rows.end) {
                let pixels = input.get_row_part(y, window.left, window.right);
                let index_row = band_indices.get_row_part_mut(y, window.left, window.right);
                let weight_row = band_weights.get_row_part_mut(y, window.left, window.right);
                for ((pixel, index), weight) in pixels.iter().zip(index_row).zip(weight_row) {
                    let d = dist(sp, pixel);
                    if d < *weight {
                        *weight = d;
                        *index = sid as i32;
                    }
                }
            }
        }
    };

    match threading_strategy {
        AssignThreadingStrategy::SingleThread => bands.into_iter().for_each(assign_band),
        AssignThreadingStrategy::RowBased => bands.into_par_iter().for_each(assign_band),
    }
}

/// This function does the update step.
///
/// A pixel can only be owned by a superpixel whose window covered it, so every superpixel
/// rescans its own window. Superpixels are independent and accumulate in row-major order.
fn update<T: SegmentData>(
    input: &Array2D<Pixel<T>>,
    superpixels: &mut [Superpixel<T>],
    windows: &[Window],
    indices: &Array2D<i32>,
    threading_strategy: AssignThreadingStrategy,
) {
    let update_superpixel = |(sid, (sp, window)): (usize, (&mut Superpixel<T>, &Window))| {
        let sid = sid as i32;
        let mut acc = SegmentAccumulator::default();
        for y in window.top..window.bottom {
            let pixels = input.get_row_part(y, window.left, window.right);
            let index_row = indices.get_row_part(y, window.left, window.right);
            for (pixel, index) in pixels.iter().zip(index_row) {
                if *index == sid {
                    acc.add(pixel);
                }
            }
        }
        // nothing captured (or only pixels without density): keep the previous state
        if let Some(mean) = acc.mean().filter(|mean| mean.density > 0.0) {
            sp.set_segment(mean);
        }
    };

    match threading_strategy {
        AssignThreadingStrategy::SingleThread => superpixels
            .iter_mut()
            .zip(windows)
            .enumerate()
            .for_each(update_superpixel),
        AssignThreadingStrategy::RowBased => superpixels
            .par_iter_mut()
            .zip(windows)
            .enumerate()
            .for_each(update_superpixel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::rgb_features;
    use crate::segment::PixelRgb;
    use nalgebra::{Vector2, Vector3};

    fn slic_dist(a: &Superpixel<PixelRgb>, b: &Pixel<PixelRgb>) -> f32 {
        0.15 * (a.position - b.position).norm_squared() / (a.radius * a.radius)
            + 0.85 * (a.data.color - b.data.color).norm_squared()
    }

    /// Diagonal stripes with a bit of texture.
    fn stripes(width: usize, height: usize) -> Vec<u8> {
        (0..width * height)
            .flat_map(|i| {
                let (x, y) = (i % width, i / width);
                let v = if ((x + y) / 13) % 2 == 0 { 40 } else { 210 };
                [v, ((x * 7 + y * 3) % 31) as u8, 255 - v]
            })
            .collect()
    }

    fn seed(x: f32, y: f32, density: f32) -> Seed {
        Seed {
            position: Vector2::new(x, y),
            density,
        }
    }

    #[test]
    fn empty_raster_gives_empty_segmentation() {
        let input = Array2D::from_fill(Pixel::<PixelRgb>::zero(), 0, 0);
        let seeds = [seed(1.0, 2.0, 0.1)];
        assert!(initialize_superpixels(&input, &seeds).is_empty());
        assert!(compute_seeds(SamplingMethod::FloydSteinbergExpo, &input).is_empty());
        let seg = aslic(input, &seeds, &Config::default(), slic_dist);
        assert!(seg.superpixels.is_empty());
        assert!(seg.indices.is_empty());
        assert_eq!(seg.unassigned_count(), 0);
    }

    #[test]
    fn initialization_copies_seed_pixel() {
        let rgb = stripes(30, 20);
        let input = rgb_features(&rgb, 30, 20, |x, _| 0.01 + x as f32 * 0.001).unwrap();
        let sps = initialize_superpixels(&input, &[seed(4.7, 9.2, 0.02), seed(29.9, 19.9, 0.5)]);
        assert_eq!(sps.len(), 2);
        assert_eq!(sps[0].num, 1.0);
        assert_eq!(sps[0].position, Vector2::new(4.7, 9.2));
        assert_eq!(sps[0].density, 0.02);
        assert_eq!(sps[0].data, input[(4usize, 9usize)].data);
        assert_eq!(sps[1].data, input[(29usize, 19usize)].data);
        assert!((sps[1].radius - (1.0 / (0.5 * std::f32::consts::PI)).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn seeds_read_density_at_floored_position() {
        let rgb = vec![0u8; 3 * 64 * 64];
        let input = rgb_features(&rgb, 64, 64, |x, _| if x < 32 { 0.01 } else { 0.02 }).unwrap();
        let seeds = compute_seeds(SamplingMethod::FloydSteinbergExpo, &input);
        assert!((seeds.len() as f32 - 0.015 * 64.0 * 64.0).abs() <= 1.0);
        for s in &seeds {
            let expected = input[(s.position.x as usize, s.position.y as usize)].density;
            assert_eq!(s.density, expected);
        }
    }

    #[test]
    fn assignment_coverage_and_minimality() {
        let (w, h) = (30usize, 20usize);
        let rgb = stripes(w, h);
        let input = rgb_features(&rgb, w, h, |_, _| 0.01).unwrap();
        // radius 5.6 px, a window factor of 6 covers the whole image from anywhere
        let seeds = [
            seed(5.5, 5.5, 0.01),
            seed(20.5, 4.5, 0.01),
            seed(12.5, 15.5, 0.01),
            seed(27.5, 17.5, 0.01),
        ];
        let sps = initialize_superpixels(&input, &seeds);
        let windows: Vec<Window> = sps.iter().map(|sp| sp.window(w, h, 6.0)).collect();
        let mut indices = Array2D::from_fill(UNASSIGNED, w, h);
        let mut weights = Array2D::from_fill(f32::INFINITY, w, h);
        assign(
            &input,
            &sps,
            &windows,
            &slic_dist,
            AssignThreadingStrategy::RowBased,
            &mut indices,
            &mut weights,
        );
        for y in 0..h {
            for x in 0..w {
                let sid = indices[(x, y)];
                assert!(sid >= 0, "({x}, {y}) unassigned");
                let pixel = &input[(x, y)];
                let own = slic_dist(&sps[sid as usize], pixel);
                assert_eq!(weights[(x, y)], own);
                for (other, sp) in sps.iter().enumerate() {
                    let d = slic_dist(sp, pixel);
                    assert!(own <= d);
                    // ties go to the lowest id
                    if d == own {
                        assert!(sid as usize <= other);
                    }
                }
            }
        }
    }

    #[test]
    fn pixels_outside_all_windows_stay_unassigned() {
        let (w, h) = (60usize, 20usize);
        let input = rgb_features(&stripes(w, h), w, h, |_, _| 0.05).unwrap();
        let config = Config {
            max_iterations: 3,
            ..Config::default()
        };
        let seg = aslic(input, &[seed(5.5, 10.5, 0.05)], &config, slic_dist);
        assert!(seg.unassigned_count() > 0);
        assert_eq!(seg.indices[(59usize, 10usize)], UNASSIGNED);
        assert_eq!(seg.weights[(59usize, 10usize)], f32::INFINITY);
        assert!(seg.superpixel_at(59, 10).is_none());
        assert!(seg.superpixel_at(5, 10).is_some());
    }

    #[test]
    fn threading_strategies_agree() {
        let (w, h) = (97usize, 61usize);
        let rgb = stripes(w, h);
        let run = |threading_strategy| {
            let input = rgb_features(&rgb, w, h, |x, y| 0.004 + 0.0002 * ((x + 2 * y) % 40) as f32)
                .unwrap();
            let config = Config {
                threading_strategy,
                ..Config::default()
            };
            let seeds = compute_seeds(config.sampling_method, &input);
            aslic(input, &seeds, &config, slic_dist)
        };
        let single = run(AssignThreadingStrategy::SingleThread);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(5)
            .build()
            .unwrap();
        let banded = pool.install(|| run(AssignThreadingStrategy::RowBased));
        assert_eq!(single.indices.data.as_slice(), banded.indices.data.as_slice());
        assert_eq!(single.weights.data.as_slice(), banded.weights.data.as_slice());
        assert_eq!(single.superpixels, banded.superpixels);
    }

    #[test]
    fn flat_image_is_tiled() {
        let (w, h) = (100usize, 100usize);
        let rgb: Vec<u8> = (0..w * h).flat_map(|_| [51u8, 102, 204]).collect();
        let input = rgb_features(&rgb, w, h, |_, _| 0.01).unwrap();
        let config = Config::default();
        let seeds = compute_seeds(config.sampling_method, &input);
        assert!((99..=101).contains(&seeds.len()), "{} seeds", seeds.len());
        let seg = aslic(input, &seeds, &config, slic_dist);

        assert_eq!(seg.superpixels.len(), seeds.len());
        assert_eq!(seg.unassigned_count(), 0);
        let color = Vector3::new(0.2, 0.4, 0.8);
        let mut total = 0.0;
        for sp in &seg.superpixels {
            assert!((sp.data.color - color).norm() < 1e-5, "{:?}", sp.data.color);
            assert!((sp.density - 0.01).abs() < 1e-6);
            assert!(sp.position.x >= 0.0 && sp.position.x <= 99.0);
            assert!(sp.position.y >= 0.0 && sp.position.y <= 99.0);
            assert!((20.0..=300.0).contains(&sp.num), "{sp:?}");
            total += sp.num;
        }
        assert_eq!(total, (w * h) as f32);
        // every 25x25 block holds a few superpixel centers
        for by in 0..4 {
            for bx in 0..4 {
                let n = seg
                    .superpixels
                    .iter()
                    .filter(|sp| {
                        (sp.position.x / 25.0) as usize == bx
                            && (sp.position.y / 25.0) as usize == by
                    })
                    .count();
                assert!((3..=10).contains(&n), "block ({bx}, {by}) has {n}");
            }
        }
    }

    #[test]
    fn superpixel_without_valid_pixels_is_frozen() {
        let (w, h) = (40usize, 20usize);
        let rgb = stripes(w, h);
        let mut input = rgb_features(&rgb, w, h, |_, _| 0.02).unwrap();
        // invalid left half
        for y in 0..h {
            for x in 0..20 {
                input[(x, y)].num = 0.0;
            }
        }
        let seeds = [seed(5.5, 10.5, 0.02), seed(30.5, 10.5, 0.02)];
        let initial = initialize_superpixels(&input, &seeds);
        let config = Config::default();
        let seg = aslic(input, &seeds, &config, slic_dist);
        assert_eq!(seg.superpixels[0], initial[0]);
        assert_ne!(seg.superpixels[1], initial[1]);
        // invalid pixels are still assigned
        assert_eq!(seg.indices[(5usize, 10usize)], 0);
        assert!(seg.superpixels[1].num > 0.0);
        assert!(seg.superpixels[1].position.x >= 20.0);
    }
}
