//! The 9×9 Sudoku grid and cell addressing.
//!
//! [`SudokuGrid`] stores digits `1..=9` with `0` marking an empty cell.
//! Every constructor and mutator checks that invariant, so a grid value is
//! always in range once it exists. Cells are addressed with [`CellPos`],
//! never by position in some flattened output sequence.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of rows (and columns, and digits) in a grid.
pub const SIZE: usize = 9;

/// Side length of one block.
pub const BLOCK_SIZE: usize = 3;

/// Number of cells in a grid.
pub const CELL_COUNT: usize = SIZE * SIZE;

/// Errors raised when building or editing a grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    /// A cell value outside `0..=9`.
    #[error("cell value {value} is out of range (expected 0-9)")]
    ValueOutOfRange {
        /// The offending value.
        value: u8,
    },

    /// A row or column index outside `0..9`.
    #[error("cell position ({row}, {col}) is out of range (expected 0-8)")]
    PositionOutOfRange {
        /// Requested row.
        row: usize,
        /// Requested column.
        col: usize,
    },

    /// Text input did not contain exactly 81 cells.
    #[error("expected {CELL_COUNT} cells, found {found}")]
    WrongCellCount {
        /// Number of cell characters found.
        found: usize,
    },

    /// Text input contained a character that is not a digit or `.`.
    #[error("unexpected character {0:?} in puzzle text")]
    InvalidChar(char),
}

/// Address of one cell: `row` and `col` in `0..9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellPos {
    row: u8,
    col: u8,
}

impl CellPos {
    /// Create a position, checking both coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::PositionOutOfRange`] if `row` or `col` is 9 or more.
    pub fn new(row: usize, col: usize) -> Result<Self, GridError> {
        match (u8::try_from(row), u8::try_from(col)) {
            (Ok(r), Ok(c)) if row < SIZE && col < SIZE => Ok(Self { row: r, col: c }),
            _ => Err(GridError::PositionOutOfRange { row, col }),
        }
    }

    /// Position of the `index`-th cell in row-major order, if `index < 81`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index >= CELL_COUNT {
            return None;
        }
        Some(Self {
            row: (index / SIZE) as u8,
            col: (index % SIZE) as u8,
        })
    }

    /// Row index, `0..9`.
    #[must_use]
    pub const fn row(self) -> usize {
        self.row as usize
    }

    /// Column index, `0..9`.
    #[must_use]
    pub const fn col(self) -> usize {
        self.col as usize
    }

    /// Index of the containing block, numbered row-major `0..9`.
    #[must_use]
    pub const fn block(self) -> usize {
        (self.row() / BLOCK_SIZE) * BLOCK_SIZE + self.col() / BLOCK_SIZE
    }

    /// Row-major index, `0..81`.
    #[must_use]
    pub const fn index(self) -> usize {
        self.row() * SIZE + self.col()
    }

    /// All 81 positions in row-major order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..CELL_COUNT).filter_map(Self::from_index)
    }
}

impl fmt::Display for CellPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// A 9×9 Sudoku grid. `0` is an empty cell.
///
/// Serializes as a 9×9 array of integers, the wire shape callers exchange
/// for both recognized puzzles and solutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "[[u8; 9]; 9]", into = "[[u8; 9]; 9]")]
pub struct SudokuGrid([[u8; SIZE]; SIZE]);

impl SudokuGrid {
    /// A grid with every cell empty.
    #[must_use]
    pub const fn empty() -> Self {
        Self([[0; SIZE]; SIZE])
    }

    /// Build a grid from nine rows of nine values.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ValueOutOfRange`] if any value exceeds 9.
    pub fn from_rows(rows: [[u8; SIZE]; SIZE]) -> Result<Self, GridError> {
        if let Some(&value) = rows.iter().flatten().find(|&&v| v > 9) {
            return Err(GridError::ValueOutOfRange { value });
        }
        Ok(Self(rows))
    }

    /// Value at `pos` (`0` when empty).
    #[must_use]
    pub const fn get(&self, pos: CellPos) -> u8 {
        self.0[pos.row()][pos.col()]
    }

    /// Set the value at `pos`.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::ValueOutOfRange`] if `value` exceeds 9.
    pub const fn set(&mut self, pos: CellPos, value: u8) -> Result<(), GridError> {
        if value > 9 {
            return Err(GridError::ValueOutOfRange { value });
        }
        self.0[pos.row()][pos.col()] = value;
        Ok(())
    }

    /// Borrow the rows.
    #[must_use]
    pub const fn rows(&self) -> &[[u8; SIZE]; SIZE] {
        &self.0
    }

    /// Number of empty cells.
    #[must_use]
    pub fn empty_count(&self) -> usize {
        self.0.iter().flatten().filter(|&&v| v == 0).count()
    }

    /// Whether every cell holds a digit.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.empty_count() == 0
    }

    /// Empty positions in row-major order.
    pub fn empty_cells(&self) -> impl Iterator<Item = CellPos> + '_ {
        CellPos::all().filter(|&pos| self.get(pos) == 0)
    }
}

impl TryFrom<[[u8; SIZE]; SIZE]> for SudokuGrid {
    type Error = GridError;

    fn try_from(rows: [[u8; SIZE]; SIZE]) -> Result<Self, Self::Error> {
        Self::from_rows(rows)
    }
}

impl From<SudokuGrid> for [[u8; SIZE]; SIZE] {
    fn from(grid: SudokuGrid) -> Self {
        grid.0
    }
}

/// Parses 81 cells from text: `1`-`9` are digits, `0` or `.` are empty.
/// Whitespace, `|`, `-` and `+` are ignored, so the [`Display`](fmt::Display)
/// output of a grid parses back to the same grid.
impl FromStr for SudokuGrid {
    type Err = GridError;

    #[allow(clippy::cast_possible_truncation)]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut values = Vec::with_capacity(CELL_COUNT);
        for ch in s.chars() {
            match ch {
                '.' => values.push(0),
                '0'..='9' => values.push(ch as u8 - b'0'),
                c if c.is_whitespace() || matches!(c, '|' | '-' | '+') => {}
                c => return Err(GridError::InvalidChar(c)),
            }
        }
        if values.len() != CELL_COUNT {
            return Err(GridError::WrongCellCount {
                found: values.len(),
            });
        }

        let mut grid = Self::empty();
        for (pos, value) in CellPos::all().zip(values) {
            grid.0[pos.row()][pos.col()] = value;
        }
        Ok(grid)
    }
}

/// Human-readable rendering: `.` for empty cells, `|` between blocks and a
/// rule line every three rows.
impl fmt::Display for SudokuGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, row) in self.0.iter().enumerate() {
            if i % BLOCK_SIZE == 0 && i != 0 {
                writeln!(f, "{}", "-".repeat(25))?;
            }
            let chunks: Vec<String> = row
                .chunks(BLOCK_SIZE)
                .map(|chunk| {
                    chunk
                        .iter()
                        .map(|&v| {
                            if v == 0 {
                                ".".to_string()
                            } else {
                                v.to_string()
                            }
                        })
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect();
            writeln!(f, " {} ", chunks.join(" | "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PUZZLE: &str = "530070000600195000098000060800060003400803001700020006060000280000419005000080079";

    #[test]
    fn cell_pos_rejects_out_of_range() {
        assert!(CellPos::new(8, 8).is_ok());
        assert_eq!(
            CellPos::new(9, 0),
            Err(GridError::PositionOutOfRange { row: 9, col: 0 })
        );
        assert!(CellPos::new(0, 9).is_err());
    }

    #[test]
    fn cell_pos_index_round_trips() {
        for (i, pos) in CellPos::all().enumerate() {
            assert_eq!(pos.index(), i);
            assert_eq!(CellPos::from_index(i), Some(pos));
        }
        assert_eq!(CellPos::from_index(81), None);
    }

    #[test]
    fn block_numbering_is_row_major() {
        assert_eq!(CellPos::new(0, 0).unwrap().block(), 0);
        assert_eq!(CellPos::new(0, 8).unwrap().block(), 2);
        assert_eq!(CellPos::new(4, 4).unwrap().block(), 4);
        assert_eq!(CellPos::new(8, 0).unwrap().block(), 6);
        assert_eq!(CellPos::new(8, 8).unwrap().block(), 8);
    }

    #[test]
    fn from_rows_rejects_values_above_nine() {
        let mut rows = [[0; SIZE]; SIZE];
        rows[3][4] = 10;
        assert_eq!(
            SudokuGrid::from_rows(rows),
            Err(GridError::ValueOutOfRange { value: 10 })
        );
    }

    #[test]
    fn set_rejects_values_above_nine() {
        let mut grid = SudokuGrid::empty();
        let pos = CellPos::new(1, 1).unwrap();
        assert!(grid.set(pos, 12).is_err());
        assert_eq!(grid.get(pos), 0);
        grid.set(pos, 7).unwrap();
        assert_eq!(grid.get(pos), 7);
    }

    #[test]
    fn parse_counts_empties() {
        let grid: SudokuGrid = PUZZLE.parse().unwrap();
        assert_eq!(grid.get(CellPos::new(0, 0).unwrap()), 5);
        assert_eq!(grid.get(CellPos::new(8, 8).unwrap()), 9);
        assert_eq!(grid.empty_count(), 51);
        assert!(!grid.is_complete());
    }

    #[test]
    fn parse_rejects_wrong_length_and_bad_chars() {
        assert_eq!(
            "123".parse::<SudokuGrid>(),
            Err(GridError::WrongCellCount { found: 3 })
        );
        let bad = format!("x{}", &PUZZLE[1..]);
        assert_eq!(bad.parse::<SudokuGrid>(), Err(GridError::InvalidChar('x')));
    }

    #[test]
    fn display_parses_back() {
        let grid: SudokuGrid = PUZZLE.parse().unwrap();
        let text = grid.to_string();
        assert!(text.starts_with(" 5 3 . | . 7 . | . . . "));
        assert_eq!(text.lines().count(), 11);
        assert_eq!(text.parse::<SudokuGrid>().unwrap(), grid);
    }

    #[test]
    fn serializes_as_nested_array() {
        let grid: SudokuGrid = PUZZLE.parse().unwrap();
        let json = serde_json::to_string(&grid).unwrap();
        assert!(json.starts_with("[[5,3,0,0,7,0,0,0,0],[6,0,0"));
        let back: SudokuGrid = serde_json::from_str(&json).unwrap();
        assert_eq!(back, grid);
    }

    #[test]
    fn deserialize_rejects_out_of_range_values() {
        let mut rows = [[0u8; SIZE]; SIZE];
        rows[0][0] = 42;
        let json = serde_json::to_string(&rows).unwrap();
        assert!(serde_json::from_str::<SudokuGrid>(&json).is_err());
    }

    #[test]
    fn empty_cells_are_row_major() {
        let grid: SudokuGrid = PUZZLE.parse().unwrap();
        let first: Vec<_> = grid.empty_cells().take(3).collect();
        assert_eq!(
            first,
            vec![
                CellPos::new(0, 2).unwrap(),
                CellPos::new(0, 3).unwrap(),
                CellPos::new(0, 5).unwrap(),
            ]
        );
    }
}
