use crate::error::{check_dimensions, Error};
use aligned_vec::{AVec, ConstAlign};
use std::ops::{Index, IndexMut, Range};

const ALIGN: usize = 64;

/// Row-major 2D raster with cache-line aligned storage.
///
/// Used for every per-pixel buffer in the crate: feature rasters, the index and weight rasters
/// of a [`Segmentation`](crate::aslic::Segmentation), density fields and visualizations.
#[derive(Debug, Clone)]
pub struct Array2D<T> {
    pub data: AVec<T, ConstAlign<ALIGN>>,
    pub width: usize,
    pub height: usize,
}

impl<T> Array2D<T> {
    pub fn from_slice(data: &[T], width: usize, height: usize) -> Result<Self, Error>
    where
        T: Clone,
    {
        check_dimensions(data.len(), width, height)?;
        Ok(Self {
            width,
            height,
            data: AVec::from_slice(ALIGN, data),
        })
    }

    pub fn from_fill(value: T, width: usize, height: usize) -> Self
    where
        T: Clone + Copy,
    {
        let data: AVec<T, ConstAlign<ALIGN>> =
            AVec::from_iter(ALIGN, (0..width * height).map(|_| value));
        Self {
            width,
            height,
            data,
        }
    }

    /// Builds the raster by evaluating `f(x, y)` for every pixel in row-major order.
    pub fn from_fn<F>(width: usize, height: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let data: AVec<T, ConstAlign<ALIGN>> =
            AVec::from_iter(ALIGN, (0..width * height).map(|i| f(i % width, i / width)));
        Self {
            width,
            height,
            data,
        }
    }

    pub fn fill(&mut self, value: T)
    where
        T: Clone,
    {
        self.data.fill(value)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get_row(&self, row: usize) -> &[T] {
        debug_assert!(row < self.height);
        &self.data[(self.width * row)..(self.width * row + self.width)]
    }

    pub fn get_row_mut(&mut self, row: usize) -> &mut [T] {
        debug_assert!(row < self.height);
        &mut self.data[(self.width * row)..(self.width * row + self.width)]
    }

    /// Half-open column range `left..right` of one row.
    #[inline(always)]
    pub fn get_row_part(&self, row: usize, left: usize, right: usize) -> &[T] {
        debug_assert!(
            row < self.height,
            "Out-of-bounds row {row} < {}",
            self.height
        );
        debug_assert!(
            right <= self.width,
            "Out-of-bounds right {right} <= {}",
            self.width
        );
        debug_assert!(left <= right, "Inverted range {left}..{right}");
        &self.data[(self.width * row + left)..(self.width * row + right)]
    }

    #[inline(always)]
    pub fn get_index(&self, x: usize, y: usize) -> usize {
        debug_assert!(
            self.width > x,
            "Index ({x}, {y}) is out of bounds ({}, {})",
            self.width,
            self.height
        );
        debug_assert!(
            self.height > y,
            "Index ({x}, {y}) is out of bounds ({}, {})",
            self.width,
            self.height
        );
        self.width * y + x
    }

    pub fn get_x_y_index(&self, ind: usize) -> (usize, usize) {
        debug_assert!(ind < self.data.len());
        (ind % self.width, ind / self.width)
    }

    /// Splits the raster into disjoint mutable row bands, one per range.
    ///
    /// The ranges must be consecutive, start at row 0 and cover the whole raster (as produced by
    /// [`split_length_to_ranges`](crate::common::split_length_to_ranges)).
    pub fn split_rows_mut(&mut self, ranges: &[Range<usize>]) -> Vec<RowBand<'_, T>> {
        assert_eq!(
            ranges.iter().map(|r| r.len()).sum::<usize>(),
            self.height,
            "Row bands must cover the whole raster"
        );
        let width = self.width;
        let mut data_slice = self.data.as_mut_slice();
        let mut bands = Vec::with_capacity(ranges.len());
        let mut next_row = 0;
        for rows in ranges {
            debug_assert_eq!(rows.start, next_row, "Row bands must be consecutive");
            let (chunk, rest) = data_slice.split_at_mut(rows.len() * width);
            data_slice = rest;
            next_row = rows.end;
            bands.push(RowBand {
                rows: rows.clone(),
                width,
                data: chunk,
            });
        }
        bands
    }
}

impl<T> Index<(usize, usize)> for Array2D<T> {
    type Output = T;
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.data[self.get_index(x, y)]
    }
}

impl<T> IndexMut<(usize, usize)> for Array2D<T> {
    fn index_mut(&mut self, (x, y): (usize, usize)) -> &mut Self::Output {
        let idx = self.get_index(x, y);
        &mut self.data[idx]
    }
}

/// Mutable view of consecutive full rows of an [`Array2D`]. Rows are addressed with image
/// (global) row numbers.
#[derive(Debug)]
pub struct RowBand<'a, T> {
    pub rows: Range<usize>,
    pub width: usize,
    data: &'a mut [T],
}

impl<'a, T> RowBand<'a, T> {
    #[inline(always)]
    pub fn get_row_part_mut(&mut self, global_row: usize, left: usize, right: usize) -> &mut [T] {
        debug_assert!(
            self.rows.contains(&global_row),
            "Row {global_row} outside of band {:?}",
            self.rows
        );
        debug_assert!(left <= right && right <= self.width);
        let local_row = global_row - self.rows.start;
        &mut self.data[(self.width * local_row + left)..(self.width * local_row + right)]
    }
}
