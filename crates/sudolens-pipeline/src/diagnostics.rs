//! Pipeline diagnostics: timing and counts for each stage.
//!
//! [`process_with_diagnostics`](crate::process_with_diagnostics) collects
//! these alongside the recognized grid. They are meant for tuning
//! thresholds against real photos, not for correctness.
//!
//! Timestamps come from the `web-time` crate, which uses
//! `performance.now()` on WASM and `std::time::Instant` on native.
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single recognition run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Image decoding.
    pub decode: StageDiagnostics,
    /// Scaling and padding to the working square.
    pub normalize: StageDiagnostics,
    /// Grayscale, smoothing and adaptive threshold.
    pub preprocess: StageDiagnostics,
    /// Contour tracing and border selection.
    pub locate: StageDiagnostics,
    /// Perspective warp.
    pub rectify: StageDiagnostics,
    /// Cell lattice extraction.
    pub segment: StageDiagnostics,
    /// Per-cell classification.
    pub classify: StageDiagnostics,
    /// Grid assembly.
    pub assemble: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Image decoding.
    Decode {
        /// Size of the input image bytes.
        input_bytes: usize,
        /// Decoded width in pixels.
        width: u32,
        /// Decoded height in pixels.
        height: u32,
    },
    /// Working-square normalization.
    Normalize {
        /// Side of the working square.
        side: u32,
        /// Applied scale factor.
        scale: f64,
    },
    /// Preprocessing into the binary mask.
    Preprocess {
        /// Foreground pixels in the mask.
        foreground_pixels: u64,
        /// Total pixels in the mask.
        total_pixels: u64,
    },
    /// Border location.
    Locate {
        /// Outermost contours traced.
        contour_count: usize,
        /// Four-cornered contours above the area minimum.
        candidate_count: usize,
        /// Area of the winning contour.
        border_area: f64,
    },
    /// Perspective rectification.
    Rectify {
        /// Side of the rectified square.
        side: u32,
    },
    /// Cell segmentation.
    Segment {
        /// Number of cells produced.
        cell_count: usize,
        /// Side of each trimmed cell.
        cell_side: u32,
    },
    /// Cell classification.
    Classify {
        /// Worker threads used.
        workers: usize,
        /// Cells labelled with a digit.
        digit_cells: usize,
        /// Cells labelled blank.
        blank_cells: usize,
    },
    /// Grid assembly.
    Assemble {
        /// Nonzero entries in the assembled grid.
        givens: usize,
    },
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Recognition Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());
        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Decode", &self.decode),
            ("Normalize", &self.normalize),
            ("Preprocess", &self.preprocess),
            ("Locate", &self.locate),
            ("Rectify", &self.rectify),
            ("Segment", &self.segment),
            ("Classify", &self.classify),
            ("Assemble", &self.assemble),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Decode {
            input_bytes,
            width,
            height,
        } => format!("{input_bytes} bytes -> {width}x{height}"),
        StageMetrics::Normalize { side, scale } => format!("{side}x{side} (scale {scale:.3})"),
        StageMetrics::Preprocess {
            foreground_pixels,
            total_pixels,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixels > 0 {
                *foreground_pixels as f64 / *total_pixels as f64 * 100.0
            } else {
                0.0
            };
            format!("foreground={foreground_pixels} ({density:.1}%)")
        }
        StageMetrics::Locate {
            contour_count,
            candidate_count,
            border_area,
        } => format!(
            "{contour_count} contours, {candidate_count} quad candidates, border area {border_area:.0}"
        ),
        StageMetrics::Rectify { side } => format!("{side}x{side}"),
        StageMetrics::Segment {
            cell_count,
            cell_side,
        } => format!("{cell_count} cells of {cell_side}x{cell_side}"),
        StageMetrics::Classify {
            workers,
            digit_cells,
            blank_cells,
        } => format!("{digit_cells} digits, {blank_cells} blank on {workers} worker(s)"),
        StageMetrics::Assemble { givens } => format!("{givens} givens"),
    }
}
