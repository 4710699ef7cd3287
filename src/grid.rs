//! Grid model: fixed rows × cols board of coloured tiles with match/fall flags.

use rand::Rng;
use std::ops::{Index, IndexMut};

/// Largest colour enumeration the theme has render handles for.
pub const MAX_COLORS: u8 = 6;

/// Smallest colour enumeration where a run of three is not guaranteed everywhere.
pub const MIN_COLORS: u8 = 3;

/// Tile colour variant, index 0..colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileColor(pub u8);

impl TileColor {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Grid coordinate. Row 0 is the top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellPos {
    pub row: usize,
    pub col: usize,
}

impl CellPos {
    pub const fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub color: TileColor,
    /// Queued for clearing in the current explosion cycle.
    pub matched: bool,
    /// Remaining fall distance; drained one unit per tick while sliding.
    pub fall_offset: u32,
}

/// Row-major board. Dimensions are fixed for the lifetime of the grid.
#[derive(Debug, Clone)]
pub struct Grid {
    rows: usize,
    cols: usize,
    colors: u8,
    cells: Vec<Cell>,
}

impl Grid {
    /// New grid filled with random colours drawn from `0..colors`.
    pub fn new(rows: usize, cols: usize, colors: u8, rng: &mut impl Rng) -> Self {
        assert!(rows > 0 && cols > 0, "grid must have at least one cell");
        assert!(
            (MIN_COLORS..=MAX_COLORS).contains(&colors),
            "colour count {colors} outside {MIN_COLORS}..={MAX_COLORS}"
        );
        let mut grid = Self {
            rows,
            cols,
            colors,
            cells: vec![Cell::default(); rows * cols],
        };
        grid.reset(rng);
        grid
    }

    /// Build a grid from explicit colour rows (top row first). Flags start cleared.
    #[cfg(test)]
    pub fn from_colors(colors: u8, rows: &[&[u8]]) -> Self {
        let cols = rows.first().map_or(0, |r| r.len());
        assert!(!rows.is_empty() && cols > 0, "grid must have at least one cell");
        let cells = rows
            .iter()
            .flat_map(|r| {
                assert_eq!(r.len(), cols, "ragged colour rows");
                r.iter().map(|&c| {
                    assert!(c < colors, "colour {c} outside enumeration of {colors}");
                    Cell {
                        color: TileColor(c),
                        ..Cell::default()
                    }
                })
            })
            .collect();
        Self {
            rows: rows.len(),
            cols,
            colors,
            cells,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Size of the colour enumeration.
    #[inline]
    pub fn colors(&self) -> u8 {
        self.colors
    }

    /// Re-randomize every tile and clear all flags.
    pub fn reset(&mut self, rng: &mut impl Rng) {
        let colors = self.colors;
        for cell in &mut self.cells {
            *cell = Cell {
                color: TileColor(rng.gen_range(0..colors)),
                matched: false,
                fall_offset: 0,
            };
        }
    }

    /// Uniformly random colour from this grid's enumeration.
    pub fn random_color(&self, rng: &mut impl Rng) -> TileColor {
        TileColor(rng.gen_range(0..self.colors))
    }

    #[inline]
    fn offset(&self, pos: CellPos) -> usize {
        assert!(
            pos.row < self.rows && pos.col < self.cols,
            "cell ({}, {}) outside {}x{} grid",
            pos.row,
            pos.col,
            self.rows,
            self.cols
        );
        pos.row * self.cols + pos.col
    }

    pub fn cell(&self, pos: CellPos) -> &Cell {
        &self.cells[self.offset(pos)]
    }

    pub fn cell_mut(&mut self, pos: CellPos) -> &mut Cell {
        let i = self.offset(pos);
        &mut self.cells[i]
    }

    /// Mark one cell for clearing (line detection and click injection).
    pub fn set_matched(&mut self, pos: CellPos) {
        self.cell_mut(pos).matched = true;
    }

    pub fn matched_count(&self) -> usize {
        self.cells.iter().filter(|c| c.matched).count()
    }

    pub fn clear_matched(&mut self) {
        for cell in &mut self.cells {
            cell.matched = false;
        }
    }

    /// Cells with nothing left to fall.
    pub fn settled_count(&self) -> usize {
        self.cells.iter().filter(|c| c.fall_offset == 0).count()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Cells in row-major order with their positions.
    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = (CellPos, &Cell)> + '_ {
        let cols = self.cols;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, c)| (CellPos::new(i / cols, i % cols), c))
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = (CellPos, &mut Cell)> + '_ {
        let cols = self.cols;
        self.cells
            .iter_mut()
            .enumerate()
            .map(move |(i, c)| (CellPos::new(i / cols, i % cols), c))
    }
}

impl Index<CellPos> for Grid {
    type Output = Cell;

    fn index(&self, pos: CellPos) -> &Cell {
        self.cell(pos)
    }
}

impl IndexMut<CellPos> for Grid {
    fn index_mut(&mut self, pos: CellPos) -> &mut Cell {
        self.cell_mut(pos)
    }
}
