//! Uniqueness-verifying backtracking solver.
//!
//! The search visits empty cells in row-major order and tries digits
//! `1..=9` ascending. It keeps going after the first complete assignment
//! and stops as soon as a second one turns up, so a single pass tells
//! apart "no solution", "exactly one" and "more than one".
//!
//! The caller's grid is never touched: the search owns a private copy
//! plus per-row, per-column and per-block digit masks. Recursion depth is
//! bounded by the number of empty cells (at most 81).

use std::sync::atomic::{AtomicBool, Ordering};

use crate::grid::{CellPos, SIZE, SudokuGrid};

/// Outcome of an exhaustive, uniqueness-checking search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The givens conflict, or the search space holds no completion.
    NoSolution,
    /// Exactly one completion exists.
    Unique(SudokuGrid),
    /// At least two completions exist; the search stopped at the second.
    Multiple,
    /// The caller's cancellation flag was raised before the search ended.
    Cancelled,
}

/// Why [`solve`] could not produce a solution.
///
/// Callers see a single failure kind; the cause is kept for logging and
/// tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCause {
    /// No completion exists.
    NoSolution,
    /// More than one completion exists.
    MultipleSolutions,
    /// The search was cancelled.
    Cancelled,
}

/// The puzzle does not have exactly one solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("puzzle has no unique solution")]
pub struct SolverFailure {
    cause: FailureCause,
}

impl SolverFailure {
    /// The underlying cause.
    #[must_use]
    pub const fn cause(&self) -> FailureCause {
        self.cause
    }
}

/// Check Sudoku legality: within every row, column and block the nonzero
/// entries are pairwise distinct.
#[must_use]
pub fn validate(grid: &SudokuGrid) -> bool {
    Masks::from_grid(grid).is_some()
}

/// Search for the unique completion of `grid`.
#[must_use = "returns the search outcome"]
pub fn search(grid: &SudokuGrid) -> SearchOutcome {
    run_search(grid, None)
}

/// Like [`search`], but polls `cancel` before every placement and returns
/// [`SearchOutcome::Cancelled`] once it reads `true`.
#[must_use = "returns the search outcome"]
pub fn search_cancellable(grid: &SudokuGrid, cancel: &AtomicBool) -> SearchOutcome {
    run_search(grid, Some(cancel))
}

/// Solve `grid`, succeeding iff it has exactly one completion.
///
/// # Errors
///
/// Returns [`SolverFailure`] when the puzzle has no solution or more than
/// one. [`SolverFailure::cause`] tells the two apart.
pub fn solve(grid: &SudokuGrid) -> Result<SudokuGrid, SolverFailure> {
    let outcome = search(grid);
    log::debug!("solver outcome: {outcome:?}");
    match outcome {
        SearchOutcome::Unique(solution) => Ok(solution),
        SearchOutcome::NoSolution => Err(SolverFailure {
            cause: FailureCause::NoSolution,
        }),
        SearchOutcome::Multiple => Err(SolverFailure {
            cause: FailureCause::MultipleSolutions,
        }),
        SearchOutcome::Cancelled => Err(SolverFailure {
            cause: FailureCause::Cancelled,
        }),
    }
}

fn run_search(grid: &SudokuGrid, cancel: Option<&AtomicBool>) -> SearchOutcome {
    let Some(masks) = Masks::from_grid(grid) else {
        return SearchOutcome::NoSolution;
    };

    let mut search = Search {
        cells: *grid.rows(),
        masks,
        empties: grid.empty_cells().collect(),
        first: None,
        found: 0,
        cancel,
        cancelled: false,
    };
    search.descend(0);

    if search.cancelled {
        return SearchOutcome::Cancelled;
    }
    match (search.found, search.first) {
        (1, Some(solution)) => SearchOutcome::Unique(solution),
        (0, _) => SearchOutcome::NoSolution,
        _ => SearchOutcome::Multiple,
    }
}

/// Digits present per row, column and block, one bit per digit.
#[derive(Clone, Copy)]
struct Masks {
    rows: [u16; SIZE],
    cols: [u16; SIZE],
    blocks: [u16; SIZE],
}

impl Masks {
    /// Build masks from the givens, or `None` if any unit repeats a digit.
    fn from_grid(grid: &SudokuGrid) -> Option<Self> {
        let mut masks = Self {
            rows: [0; SIZE],
            cols: [0; SIZE],
            blocks: [0; SIZE],
        };
        for pos in CellPos::all() {
            let digit = grid.get(pos);
            if digit == 0 {
                continue;
            }
            if !masks.allows(pos, digit) {
                return None;
            }
            masks.toggle(pos, digit);
        }
        Some(masks)
    }

    const fn allows(&self, pos: CellPos, digit: u8) -> bool {
        let bit = 1 << digit;
        (self.rows[pos.row()] | self.cols[pos.col()] | self.blocks[pos.block()]) & bit == 0
    }

    const fn toggle(&mut self, pos: CellPos, digit: u8) {
        let bit = 1 << digit;
        self.rows[pos.row()] ^= bit;
        self.cols[pos.col()] ^= bit;
        self.blocks[pos.block()] ^= bit;
    }
}

struct Search<'a> {
    cells: [[u8; SIZE]; SIZE],
    masks: Masks,
    empties: Vec<CellPos>,
    first: Option<SudokuGrid>,
    found: u8,
    cancel: Option<&'a AtomicBool>,
    cancelled: bool,
}

impl Search<'_> {
    /// Fill `empties[index..]`. Returns `true` when the whole search must
    /// stop (second solution found, or cancelled).
    fn descend(&mut self, index: usize) -> bool {
        if self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            self.cancelled = true;
            return true;
        }

        let Some(&pos) = self.empties.get(index) else {
            self.found += 1;
            if self.first.is_none() {
                self.first = SudokuGrid::from_rows(self.cells).ok();
            }
            return self.found > 1;
        };

        for digit in 1..=9 {
            if !self.masks.allows(pos, digit) {
                continue;
            }
            self.masks.toggle(pos, digit);
            self.cells[pos.row()][pos.col()] = digit;
            if self.descend(index + 1) {
                return true;
            }
            self.cells[pos.row()][pos.col()] = 0;
            self.masks.toggle(pos, digit);
        }
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PUZZLE: &str = "530070000600195000098000060800060003400803001700020006060000280000419005000080079";
    const SOLUTION: &str = "534678912672195348198342567859761423426853791713924856961537284287419635345286179";

    fn grid(text: &str) -> SudokuGrid {
        text.parse().unwrap()
    }

    #[test]
    fn validate_accepts_empty_and_solved() {
        assert!(validate(&SudokuGrid::empty()));
        assert!(validate(&grid(SOLUTION)));
        assert!(validate(&grid(PUZZLE)));
    }

    #[test]
    fn validate_rejects_row_repeat() {
        let mut g = SudokuGrid::empty();
        g.set(CellPos::new(2, 0).unwrap(), 4).unwrap();
        g.set(CellPos::new(2, 8).unwrap(), 4).unwrap();
        assert!(!validate(&g));
    }

    #[test]
    fn validate_rejects_column_repeat() {
        let mut g = SudokuGrid::empty();
        g.set(CellPos::new(0, 5).unwrap(), 9).unwrap();
        g.set(CellPos::new(7, 5).unwrap(), 9).unwrap();
        assert!(!validate(&g));
    }

    #[test]
    fn validate_rejects_block_repeat() {
        let mut g = SudokuGrid::empty();
        g.set(CellPos::new(3, 3).unwrap(), 1).unwrap();
        g.set(CellPos::new(5, 5).unwrap(), 1).unwrap();
        assert!(!validate(&g));
    }

    #[test]
    fn validate_allows_same_digit_in_unrelated_cells() {
        let mut g = SudokuGrid::empty();
        g.set(CellPos::new(0, 0).unwrap(), 1).unwrap();
        g.set(CellPos::new(4, 4).unwrap(), 1).unwrap();
        g.set(CellPos::new(8, 8).unwrap(), 1).unwrap();
        assert!(validate(&g));
    }

    #[test]
    fn solves_classic_puzzle() {
        assert_eq!(search(&grid(PUZZLE)), SearchOutcome::Unique(grid(SOLUTION)));
        assert_eq!(solve(&grid(PUZZLE)), Ok(grid(SOLUTION)));
    }

    #[test]
    fn empty_grid_has_multiple_solutions() {
        assert_eq!(search(&SudokuGrid::empty()), SearchOutcome::Multiple);
        let err = solve(&SudokuGrid::empty()).unwrap_err();
        assert_eq!(err.cause(), FailureCause::MultipleSolutions);
    }

    #[test]
    fn conflicting_givens_have_no_solution() {
        let mut g = grid(PUZZLE);
        // Second 5 in row 0.
        g.set(CellPos::new(0, 2).unwrap(), 5).unwrap();
        assert_eq!(search(&g), SearchOutcome::NoSolution);
    }

    #[test]
    fn legal_but_unsolvable_grid_has_no_solution() {
        // Row 0 leaves only 9 for (0, 8), but column 8 already holds 9.
        let mut g = SudokuGrid::empty();
        for (col, digit) in (0..8).zip(1..=8) {
            g.set(CellPos::new(0, col).unwrap(), digit).unwrap();
        }
        g.set(CellPos::new(5, 8).unwrap(), 9).unwrap();
        assert!(validate(&g));
        assert_eq!(search(&g), SearchOutcome::NoSolution);
        assert_eq!(solve(&g).unwrap_err().cause(), FailureCause::NoSolution);
    }

    #[test]
    fn failures_share_one_message() {
        let none = solve(&grid(&SOLUTION.replacen('5', "3", 1))).unwrap_err();
        let many = solve(&SudokuGrid::empty()).unwrap_err();
        assert_ne!(none.cause(), many.cause());
        assert_eq!(none.to_string(), many.to_string());
    }

    #[test]
    fn complete_valid_grid_is_its_own_solution() {
        assert_eq!(search(&grid(SOLUTION)), SearchOutcome::Unique(grid(SOLUTION)));
    }

    #[test]
    fn raised_flag_cancels_search() {
        let cancel = AtomicBool::new(true);
        assert_eq!(
            search_cancellable(&SudokuGrid::empty(), &cancel),
            SearchOutcome::Cancelled
        );
        assert_eq!(
            search_cancellable(&grid(PUZZLE), &AtomicBool::new(false)),
            SearchOutcome::Unique(grid(SOLUTION))
        );
    }

    #[test]
    fn flag_raised_mid_search_stops_it() {
        // Legal givens whose only contradiction sits in the last empty
        // cell: (8, 8) sees 1..=8 in its row and 9 in its column, so the
        // search has to fill rows 0..8 in every legal way before it could
        // report no solution.
        let mut g = SudokuGrid::empty();
        for (col, digit) in (0..8).zip(1..=8) {
            g.set(CellPos::new(8, col).unwrap(), digit).unwrap();
        }
        g.set(CellPos::new(0, 8).unwrap(), 9).unwrap();
        assert!(validate(&g));

        let cancel = AtomicBool::new(false);
        let started = AtomicBool::new(false);
        let (running_when_raised, outcome) = std::thread::scope(|scope| {
            let worker = scope.spawn(|| {
                started.store(true, Ordering::Relaxed);
                search_cancellable(&g, &cancel)
            });
            while !started.load(Ordering::Relaxed) {
                std::thread::yield_now();
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
            let running = !worker.is_finished();
            cancel.store(true, Ordering::Relaxed);
            (running, worker.join().unwrap())
        });
        assert!(running_when_raised);
        assert_eq!(outcome, SearchOutcome::Cancelled);
    }
}
