//! Collect per-cell labels, in any order, into a grid.

use sudolens_grid::{CELL_COUNT, CellPos, SudokuGrid};

use crate::types::PipelineError;

/// Accumulates `(position, label)` pairs until every cell has reported.
///
/// Labels may arrive in any order. A repeated position keeps the last
/// label written.
#[derive(Debug, Clone)]
pub struct GridAssembler {
    grid: SudokuGrid,
    seen: [bool; CELL_COUNT],
    count: usize,
}

impl Default for GridAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl GridAssembler {
    /// An assembler with no labels.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            grid: SudokuGrid::empty(),
            seen: [false; CELL_COUNT],
            count: 0,
        }
    }

    /// Record the label for one cell.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Grid`] if `label` is above 9.
    pub fn insert(&mut self, pos: CellPos, label: u8) -> Result<(), PipelineError> {
        self.grid.set(pos, label)?;
        let seen = &mut self.seen[pos.index()];
        if !*seen {
            *seen = true;
            self.count += 1;
        }
        Ok(())
    }

    const fn is_complete(&self) -> bool {
        self.count == CELL_COUNT
    }

    /// Produce the grid once every cell has reported.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Incomplete`] naming the first unlabelled
    /// position in row-major order.
    pub fn finish(self) -> Result<SudokuGrid, PipelineError> {
        if !self.is_complete()
            && let Some(missing) = CellPos::all().find(|pos| !self.seen[pos.index()])
        {
            return Err(PipelineError::Incomplete { missing });
        }
        Ok(self.grid)
    }
}

/// Assemble a grid from an iterator of labels.
///
/// # Errors
///
/// Propagates [`GridAssembler::insert`] and [`GridAssembler::finish`]
/// errors.
pub fn assemble(labels: impl IntoIterator<Item = (CellPos, u8)>) -> Result<SudokuGrid, PipelineError> {
    let mut assembler = GridAssembler::new();
    for (pos, label) in labels {
        assembler.insert(pos, label)?;
    }
    assembler.finish()
}
