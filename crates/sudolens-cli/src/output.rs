//! Text and JSON renderings of a run's result.

use serde::Serialize;
use sudolens_grid::SudokuGrid;
use sudolens_pipeline::ErrorKind;

use crate::{CliError, Solved};

#[derive(Serialize)]
struct SolvedJson<'a> {
    grid: &'a SudokuGrid,
    solution: &'a SudokuGrid,
}

#[derive(Serialize)]
struct ErrorJson {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
}

/// `{"grid": [[..]], "solution": [[..]]}` on success,
/// `{"error": {"kind": .., "message": ..}}` otherwise.
pub fn render_json(result: &Result<Solved, CliError>) -> Result<String, serde_json::Error> {
    match result {
        Ok(solved) => serde_json::to_string(&SolvedJson {
            grid: &solved.puzzle,
            solution: &solved.solution,
        }),
        Err(e) => serde_json::to_string(&ErrorJson {
            error: ErrorBody {
                kind: e.kind(),
                message: e.to_string(),
            },
        }),
    }
}

/// The puzzle as read, under a heading.
pub fn render_puzzle(puzzle: &SudokuGrid) -> String {
    format!("Puzzle ({} givens):\n{puzzle}", 81 - puzzle.empty_count())
}

/// Puzzle followed by its solution.
pub fn render_text(solved: &Solved) -> String {
    format!(
        "{}\nSolution:\n{}",
        render_puzzle(&solved.puzzle),
        solved.solution
    )
}
