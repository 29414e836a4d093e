//! Grid storage
//!
//! Row-major 2D storage shared by every per-cell array of the simulation,
//! plus the 4-directional vector used for velocity and flow fields.

pub mod marker;

pub use marker::{count_open_neighbors, CellMarker};

use std::ops::{Index, IndexMut};

/// Cell address; `row` grows downward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellIndex {
    pub row: usize,
    pub col: usize,
}

impl CellIndex {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Cardinal neighbour offsets, in persisted-state order
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    #[inline(always)]
    pub fn index(self) -> usize {
        self as usize
    }

    /// (row, col) offset
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

/// Dense row-major 2D array
#[derive(Debug, Clone, PartialEq)]
pub struct Grid2D<T> {
    rows: usize,
    cols: usize,
    data: Vec<T>,
}

impl<T> Grid2D<T> {
    /// Build by evaluating `init` for every cell in row-major order
    pub fn from_fn(rows: usize, cols: usize, mut init: impl FnMut(CellIndex) -> T) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                data.push(init(CellIndex::new(row, col)));
            }
        }
        Self { rows, cols, data }
    }

    /// Wrap row-major data; `None` if the length does not match
    pub fn from_vec(rows: usize, cols: usize, data: Vec<T>) -> Option<Self> {
        if data.len() != rows * cols {
            return None;
        }
        Some(Self { rows, cols, data })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline(always)]
    fn offset(&self, cell: CellIndex) -> usize {
        debug_assert!(cell.row < self.rows && cell.col < self.cols);
        cell.row * self.cols + cell.col
    }

    pub fn contains(&self, row: isize, col: isize) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }

    /// Neighbour of `cell` in `dir`, or `None` past the border
    #[inline]
    pub fn neighbor(&self, cell: CellIndex, dir: Direction) -> Option<CellIndex> {
        let (dr, dc) = dir.offset();
        let row = cell.row as isize + dr;
        let col = cell.col as isize + dc;
        if self.contains(row, col) {
            Some(CellIndex::new(row as usize, col as usize))
        } else {
            None
        }
    }

    /// All cells in row-major order
    pub fn cells(&self) -> impl Iterator<Item = CellIndex> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| CellIndex::new(row, col)))
    }

    pub fn row(&self, row: usize) -> &[T] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }

    pub fn swap(&mut self, a: CellIndex, b: CellIndex) {
        let (a, b) = (self.offset(a), self.offset(b));
        self.data.swap(a, b);
    }

    pub fn map<U>(&self, f: impl FnMut(&T) -> U) -> Grid2D<U> {
        Grid2D {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(f).collect(),
        }
    }
}

impl<T: Clone> Grid2D<T> {
    pub fn new(rows: usize, cols: usize, fill: T) -> Self {
        Self {
            rows,
            cols,
            data: vec![fill; rows * cols],
        }
    }

    pub fn fill(&mut self, value: T) {
        self.data.iter_mut().for_each(|slot| *slot = value.clone());
    }
}

impl<T> Index<CellIndex> for Grid2D<T> {
    type Output = T;

    #[inline(always)]
    fn index(&self, cell: CellIndex) -> &T {
        &self.data[self.offset(cell)]
    }
}

impl<T> IndexMut<CellIndex> for Grid2D<T> {
    #[inline(always)]
    fn index_mut(&mut self, cell: CellIndex) -> &mut T {
        let offset = self.offset(cell);
        &mut self.data[offset]
    }
}

/// One value per cardinal direction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirVector<T>(pub [T; 4]);

impl<T: Copy> DirVector<T> {
    #[inline(always)]
    pub fn get(&self, dir: Direction) -> T {
        self.0[dir.index()]
    }

    #[inline(always)]
    pub fn get_mut(&mut self, dir: Direction) -> &mut T {
        &mut self.0[dir.index()]
    }

    #[inline(always)]
    pub fn set(&mut self, dir: Direction, value: T) {
        self.0[dir.index()] = value;
    }
}

impl<T: Copy + std::ops::AddAssign> DirVector<T> {
    /// Add `delta` to one component and return the new value
    #[inline(always)]
    pub fn add(&mut self, dir: Direction, delta: T) -> T {
        let slot = &mut self.0[dir.index()];
        *slot += delta;
        *slot
    }
}

/// Per-cell 4-directional field
pub type DirectionalField<T> = Grid2D<DirVector<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_major_layout() {
        let grid = Grid2D::from_fn(2, 3, |c| c.row * 10 + c.col);
        assert_eq!(grid.row(1), &[10, 11, 12]);
        assert_eq!(grid[CellIndex::new(0, 2)], 2);
        let cells: Vec<_> = grid.cells().collect();
        assert_eq!(cells.len(), 6);
        assert_eq!(cells[4], CellIndex::new(1, 1));
    }

    #[test]
    fn test_neighbors_respect_borders() {
        let grid = Grid2D::new(3, 3, 0u8);
        let corner = CellIndex::new(0, 0);
        assert_eq!(grid.neighbor(corner, Direction::Up), None);
        assert_eq!(grid.neighbor(corner, Direction::Left), None);
        assert_eq!(grid.neighbor(corner, Direction::Down), Some(CellIndex::new(1, 0)));
        assert_eq!(grid.neighbor(corner, Direction::Right), Some(CellIndex::new(0, 1)));
    }

    #[test]
    fn test_direction_opposites() {
        for dir in Direction::ALL {
            assert_eq!(dir.opposite().opposite(), dir);
            let (dr, dc) = dir.offset();
            let (or, oc) = dir.opposite().offset();
            assert_eq!((dr + or, dc + oc), (0, 0));
        }
    }

    #[test]
    fn test_dir_vector_add() {
        let mut v = DirVector([0.0f64; 4]);
        assert_eq!(v.add(Direction::Down, 0.5), 0.5);
        assert_eq!(v.add(Direction::Down, 0.25), 0.75);
        assert_eq!(v.get(Direction::Up), 0.0);
        *v.get_mut(Direction::Left) = -1.0;
        assert_eq!(v.0, [0.0, 0.75, -1.0, 0.0]);
    }

    #[test]
    fn test_swap_and_from_vec() {
        let mut grid = Grid2D::from_vec(1, 2, vec!['a', 'b']).unwrap();
        grid.swap(CellIndex::new(0, 0), CellIndex::new(0, 1));
        assert_eq!(grid.row(0), &['b', 'a']);
        assert!(Grid2D::from_vec(2, 2, vec![1]).is_none());
    }
}
