use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::slice;

/// Fixed-shape, row-major 2D buffer addressed by `(row, col)`.
///
/// The shape is decided at construction and never changes. Linear indices
/// are `row * cols + col`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid<T> {
    cells: Vec<T>,
    rows: usize,
    cols: usize,
}

impl<T> Grid<T> {
    pub fn new(rows: usize, cols: usize, cells: Vec<T>) -> Self {
        assert_eq!(
            cells.len(),
            rows * cols,
            "cells length must equal rows * cols"
        );
        Self { cells, rows, cols }
    }

    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut cells = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                cells.push(f(row, col));
            }
        }
        Self { cells, rows, cols }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.shape() == other.shape()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn index_of(&self, row: usize, col: usize) -> usize {
        debug_assert!(row < self.rows && col < self.cols);
        row * self.cols + col
    }

    #[inline]
    pub fn position_of(&self, idx: usize) -> (usize, usize) {
        debug_assert!(idx < self.cells.len());
        (idx / self.cols, idx % self.cols)
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.rows && col < self.cols {
            Some(&self.cells[row * self.cols + col])
        } else {
            None
        }
    }

    /// True for cells on the outermost ring (first/last row or column).
    #[inline]
    pub fn is_border(&self, row: usize, col: usize) -> bool {
        row == 0 || col == 0 || row + 1 == self.rows || col + 1 == self.cols
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[T] {
        let start = row * self.cols;
        &self.cells[start..start + self.cols]
    }

    #[inline]
    pub fn cells(&self) -> &[T] {
        &self.cells
    }

    #[inline]
    pub fn cells_mut(&mut self) -> &mut [T] {
        &mut self.cells
    }

    #[inline]
    pub fn into_vec(self) -> Vec<T> {
        self.cells
    }

    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.cells.iter()
    }

    #[inline]
    pub fn iter_mut(&mut self) -> slice::IterMut<'_, T> {
        self.cells.iter_mut()
    }

    /// Iterates `((row, col), &cell)` in row-major order.
    pub fn indexed_iter(&self) -> impl Iterator<Item = ((usize, usize), &T)> {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(idx, cell)| ((idx / cols, idx % cols), cell))
    }

    /// Builds a grid of the same shape by transforming every cell.
    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid<U> {
        Grid {
            cells: self.cells.iter().map(f).collect(),
            rows: self.rows,
            cols: self.cols,
        }
    }
}

impl<T: Clone> Grid<T> {
    pub fn new_filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            cells: vec![value; rows * cols],
            rows,
            cols,
        }
    }

    #[inline]
    pub fn fill(&mut self, value: T) {
        self.cells.fill(value);
    }
}

impl<T: Default + Clone> Grid<T> {
    pub fn new_default(rows: usize, cols: usize) -> Self {
        Self::new_filled(rows, cols, T::default())
    }
}

impl<T> Index<(usize, usize)> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        &self.cells[row * self.cols + col]
    }
}

impl<T> IndexMut<(usize, usize)> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        &mut self.cells[row * self.cols + col]
    }
}

impl<T> Index<usize> for Grid<T> {
    type Output = T;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.cells[idx]
    }
}

impl<T> IndexMut<usize> for Grid<T> {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.cells[idx]
    }
}

impl<T> Deref for Grid<T> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.cells
    }
}

impl<T> DerefMut for Grid<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.cells
    }
}

impl<'a, T> IntoIterator for &'a Grid<T> {
    type Item = &'a T;
    type IntoIter = slice::Iter<'a, T>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}

impl<T> From<Grid<T>> for Vec<T> {
    #[inline]
    fn from(grid: Grid<T>) -> Self {
        grid.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stores_shape() {
        let grid = Grid::new(2, 3, vec![10, 20, 30, 40, 50, 60]);
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.len(), 6);
    }

    #[test]
    #[should_panic(expected = "cells length must equal rows * cols")]
    fn test_new_panics_on_size_mismatch() {
        Grid::new(2, 3, vec![1, 2, 3]);
    }

    #[test]
    fn test_row_major_indexing() {
        // row 0 = [10, 20, 30], row 1 = [40, 50, 60]
        let grid = Grid::new(2, 3, vec![10, 20, 30, 40, 50, 60]);
        assert_eq!(grid[(0, 2)], 30);
        assert_eq!(grid[(1, 0)], 40);
        assert_eq!(grid.index_of(1, 2), 5);
        assert_eq!(grid.position_of(4), (1, 1));
        assert_eq!(grid.row(1), &[40, 50, 60]);
    }

    #[test]
    fn test_get_out_of_range() {
        let grid = Grid::new_filled(2, 2, 0u8);
        assert!(grid.get(1, 1).is_some());
        assert!(grid.get(2, 0).is_none());
        assert!(grid.get(0, 2).is_none());
    }

    #[test]
    fn test_from_fn_matches_positions() {
        let grid = Grid::from_fn(3, 4, |row, col| row * 10 + col);
        assert_eq!(grid[(2, 3)], 23);
        for ((row, col), &v) in grid.indexed_iter() {
            assert_eq!(v, row * 10 + col);
        }
    }

    #[test]
    fn test_is_border() {
        let grid = Grid::new_filled(4, 5, false);
        assert!(grid.is_border(0, 2));
        assert!(grid.is_border(3, 2));
        assert!(grid.is_border(2, 0));
        assert!(grid.is_border(2, 4));
        assert!(!grid.is_border(1, 1));
        assert!(!grid.is_border(2, 3));
    }

    #[test]
    fn test_map_keeps_shape() {
        let grid = Grid::new(2, 2, vec![1u8, 200, 3, 255]);
        let mask = grid.map(|&v| v >= 128);
        assert!(mask.same_shape(&grid));
        assert_eq!(mask.cells(), &[false, true, false, true]);
    }

    #[test]
    fn test_fill_and_default() {
        let mut grid: Grid<u32> = Grid::new_default(2, 2);
        assert!(grid.iter().all(|&v| v == 0));
        grid.fill(7);
        assert!(grid.iter().all(|&v| v == 7));
    }
}
