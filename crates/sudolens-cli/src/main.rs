//! sudolens: recognize a photographed Sudoku puzzle and print its unique
//! solution.
//!
//! Reads the photo and the digit model from disk, runs the recognition
//! pipeline, then solves the recognized grid. Useful for:
//!
//! - Checking recognition on real photos (`--debug-dir` keeps the mask,
//!   contour overlay and rectified grid)
//! - Tuning thresholds with per-stage timings (`--diagnostics`)
//! - Solving a typed-in puzzle without any image (`--solve-only`)
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin sudolens -- --model digits.onnx [OPTIONS] <IMAGE_PATH>
//! cargo run --release --bin sudolens -- --solve-only 530070000600195000...
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod artifact_dir;
mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, ValueEnum};
use sudolens_grid::{GridError, SolverFailure, SudokuGrid};
use sudolens_pipeline::{
    ErrorKind, ModelLoadError, NoArtifacts, OnnxModel, PipelineConfig, PipelineError,
    ResampleFilter, process_with_diagnostics,
};

use crate::artifact_dir::ArtifactDir;

/// Recognize a photographed Sudoku puzzle and print its unique solution.
///
/// Exits with status 0 when the puzzle was read and has exactly one
/// solution, 1 otherwise.
#[derive(Parser)]
#[command(name = "sudolens", version)]
struct Cli {
    /// Path to the puzzle photo (PNG, JPEG, BMP, WebP).
    #[arg(required_unless_present = "solve_only", conflicts_with = "solve_only")]
    image_path: Option<PathBuf>,

    /// Digit classifier (ONNX, one `[1, 32, 32, 1]` float input, ten
    /// class outputs).
    #[arg(long, value_name = "PATH", required_unless_present = "solve_only")]
    model: Option<PathBuf>,

    /// Skip recognition and solve an 81-character puzzle (`0` or `.` for
    /// empty cells).
    #[arg(long, value_name = "PUZZLE")]
    solve_only: Option<String>,

    /// Print the result as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Write intermediate images (working, preprocessed, contours,
    /// rectified) as PNGs into this directory.
    #[arg(long, value_name = "DIR")]
    debug_dir: Option<PathBuf>,

    /// Print per-stage recognition timings to stderr.
    #[arg(long)]
    diagnostics: bool,

    /// Raise log verbosity (`-v` info, `-vv` debug). `RUST_LOG` overrides.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Working resolution (side of the square the photo is scaled to).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_WORKING_RESOLUTION)]
    working_resolution: u32,

    /// Resampling filter for the working resolution.
    #[arg(long, value_enum, default_value_t = CLI_DEFAULT_FILTER)]
    resample_filter: Filter,

    /// Pixels trimmed from every edge of each cell.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CELL_MARGIN)]
    cell_margin: u32,

    /// Minimum top-class probability for a digit to be accepted.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CONFIDENCE_THRESHOLD)]
    confidence_threshold: f32,

    /// Recognition worker threads (0 = available parallelism).
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

/// Resampling filter selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Filter {
    /// Nearest-neighbor (fastest, blocky).
    Nearest,
    /// Bilinear interpolation (fast, decent quality).
    Triangle,
    /// Bicubic Catmull-Rom (moderate, good quality).
    CatmullRom,
    /// Gaussian (moderate, smooth).
    Gaussian,
    /// Lanczos with 3 lobes (slowest, sharpest).
    Lanczos3,
}

/// Maps a [`ResampleFilter`] to the local CLI [`Filter`] enum.
const fn filter_from_pipeline(f: ResampleFilter) -> Filter {
    match f {
        ResampleFilter::Nearest => Filter::Nearest,
        ResampleFilter::Triangle => Filter::Triangle,
        ResampleFilter::CatmullRom => Filter::CatmullRom,
        ResampleFilter::Gaussian => Filter::Gaussian,
        ResampleFilter::Lanczos3 => Filter::Lanczos3,
    }
}

/// The CLI default filter, derived from
/// [`PipelineConfig::DEFAULT_RESAMPLE_FILTER`].
const CLI_DEFAULT_FILTER: Filter = filter_from_pipeline(PipelineConfig::DEFAULT_RESAMPLE_FILTER);

/// Everything that can stop the command.
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("cannot read image {}: {source}", path.display())]
    ReadImage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot read model {}: {source}", path.display())]
    ReadModel {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Model(#[from] ModelLoadError),

    #[error("invalid --config-json: {0}")]
    ConfigJson(serde_json::Error),

    #[error("invalid --solve-only puzzle: {0}")]
    Puzzle(GridError),

    #[error("cannot create debug directory {}: {source}", path.display())]
    DebugDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{0} is required")]
    MissingArgument(&'static str),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{failure}")]
    Solver {
        /// The grid that was handed to the solver.
        grid: SudokuGrid,
        failure: SolverFailure,
    },
}

impl CliError {
    /// Error category for the JSON error object.
    const fn kind(&self) -> ErrorKind {
        match self {
            Self::ReadImage { .. } => ErrorKind::InvalidImage,
            Self::ReadModel { .. } | Self::Model(_) => ErrorKind::ModelLoadFailure,
            Self::ConfigJson(_)
            | Self::Puzzle(_)
            | Self::DebugDir { .. }
            | Self::MissingArgument(_) => ErrorKind::InvalidConfig,
            Self::Pipeline(e) => e.kind(),
            Self::Solver { .. } => ErrorKind::SolverFailure,
        }
    }

    /// The puzzle that was read before the failure, if any.
    const fn puzzle(&self) -> Option<&SudokuGrid> {
        match self {
            Self::Solver { grid, .. } => Some(grid),
            _ => None,
        }
    }
}

/// A recognized (or typed-in) puzzle and its unique solution.
#[derive(Debug)]
struct Solved {
    puzzle: SudokuGrid,
    solution: SudokuGrid,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored. Otherwise, a config is
/// assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, CliError> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(CliError::ConfigJson);
    }

    Ok(PipelineConfig {
        working_resolution: cli.working_resolution,
        resample_filter: match cli.resample_filter {
            Filter::Nearest => ResampleFilter::Nearest,
            Filter::Triangle => ResampleFilter::Triangle,
            Filter::CatmullRom => ResampleFilter::CatmullRom,
            Filter::Gaussian => ResampleFilter::Gaussian,
            Filter::Lanczos3 => ResampleFilter::Lanczos3,
        },
        cell_margin: cli.cell_margin,
        confidence_threshold: cli.confidence_threshold,
        workers: cli.workers,
        ..PipelineConfig::default()
    })
}

fn load_model(path: &Path) -> Result<OnnxModel, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::ReadModel {
        path: path.to_path_buf(),
        source,
    })?;
    let size = bytes.len();
    let model = OnnxModel::from_bytes(bytes)?;
    log::info!("loaded model from {} ({size} bytes)", path.display());
    Ok(model)
}

/// Read the photo and run recognition.
fn recognize(cli: &Cli) -> Result<SudokuGrid, CliError> {
    let config = config_from_cli(cli)?;
    let image_path = cli
        .image_path
        .as_deref()
        .ok_or(CliError::MissingArgument("<IMAGE_PATH>"))?;
    let model_path = cli
        .model
        .as_deref()
        .ok_or(CliError::MissingArgument("--model"))?;

    let model = load_model(model_path)?;
    let image_bytes = std::fs::read(image_path).map_err(|source| CliError::ReadImage {
        path: image_path.to_path_buf(),
        source,
    })?;
    log::info!(
        "image: {} ({} bytes)",
        image_path.display(),
        image_bytes.len()
    );

    let (staged, diagnostics) = match cli.debug_dir {
        Some(ref dir) => {
            let mut sink = ArtifactDir::create(dir).map_err(|source| CliError::DebugDir {
                path: dir.clone(),
                source,
            })?;
            process_with_diagnostics(&image_bytes, &config, &model, &mut sink)?
        }
        None => process_with_diagnostics(&image_bytes, &config, &model, &mut NoArtifacts)?,
    };

    if cli.diagnostics {
        eprintln!("{}", diagnostics.report());
    }
    Ok(staged.grid)
}

fn run(cli: &Cli) -> Result<Solved, CliError> {
    let puzzle = match cli.solve_only {
        Some(ref text) => text.parse().map_err(CliError::Puzzle)?,
        None => recognize(cli)?,
    };
    let solution = sudolens_grid::solve(&puzzle).map_err(|failure| {
        log::info!("solver gave up: {:?}", failure.cause());
        CliError::Solver {
            grid: puzzle,
            failure,
        }
    })?;
    Ok(Solved { puzzle, solution })
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = run(&cli);

    if cli.json {
        match output::render_json(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing result: {e}");
                return ExitCode::FAILURE;
            }
        }
    } else {
        match &result {
            Ok(solved) => print!("{}", output::render_text(solved)),
            Err(e) => {
                if let Some(puzzle) = e.puzzle() {
                    print!("{}", output::render_puzzle(puzzle));
                }
                eprintln!("error: {e}");
            }
        }
    }

    if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
