//! sudolens-grid: the Sudoku grid model and its solver (sans-IO).
//!
//! A [`SudokuGrid`] is produced by the recognition pipeline in
//! `sudolens-pipeline` and consumed by [`solver::solve`], which either
//! returns the unique completion or a [`SolverFailure`]. Nothing here
//! touches images, files or threads.

pub mod grid;
pub mod solver;

pub use grid::{BLOCK_SIZE, CELL_COUNT, CellPos, GridError, SIZE, SudokuGrid};
pub use solver::{
    FailureCause, SearchOutcome, SolverFailure, search, search_cancellable, solve, validate,
};
