//! Optional intermediate images for debugging a recognition run.
//!
//! The pipeline hands each intermediate raster to an [`ArtifactSink`].
//! Sinks cannot fail the run: whatever they do with an image (write it,
//! keep it, drop it) has no effect on the recognized grid.

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

use crate::types::{Polyline, Quadrilateral};

/// Contour colour in the overlay.
const CONTOUR_COLOR: Rgb<u8> = Rgb([0, 200, 0]);

/// Grid border colour in the overlay.
const BORDER_COLOR: Rgb<u8> = Rgb([230, 0, 0]);

/// Which intermediate image is being emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Artifact {
    /// The photo scaled and padded to the working square.
    Working,
    /// The binary mask produced by smoothing and adaptive thresholding.
    Preprocessed,
    /// Outermost contours, with the chosen border highlighted.
    Contours,
    /// The perspective-corrected grid.
    Rectified,
}

impl Artifact {
    /// All artifacts, in pipeline order.
    pub const ALL: [Self; 4] = [
        Self::Working,
        Self::Preprocessed,
        Self::Contours,
        Self::Rectified,
    ];

    /// Short file-name stem for the artifact.
    #[must_use]
    pub const fn file_stem(self) -> &'static str {
        match self {
            Self::Working => "working",
            Self::Preprocessed => "preprocessed",
            Self::Contours => "contours",
            Self::Rectified => "rectified",
        }
    }
}

/// Receiver for intermediate images.
pub trait ArtifactSink {
    /// Whether this sink wants images at all. The pipeline skips building
    /// artifacts for sinks that return `false`.
    fn enabled(&self) -> bool {
        true
    }

    /// Accept one intermediate image.
    fn write(&mut self, artifact: Artifact, image: &DynamicImage);
}

/// A sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtifacts;

impl ArtifactSink for NoArtifacts {
    fn enabled(&self) -> bool {
        false
    }

    fn write(&mut self, _artifact: Artifact, _image: &DynamicImage) {}
}

/// A sink that keeps every image in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectedArtifacts(pub Vec<(Artifact, DynamicImage)>);

impl CollectedArtifacts {
    /// The image recorded for `artifact`, if any.
    #[must_use]
    pub fn get(&self, artifact: Artifact) -> Option<&DynamicImage> {
        self.0.iter().find(|(a, _)| *a == artifact).map(|(_, img)| img)
    }
}

impl ArtifactSink for CollectedArtifacts {
    fn write(&mut self, artifact: Artifact, image: &DynamicImage) {
        self.0.push((artifact, image.clone()));
    }
}

/// Draw `contours` and, if present, the chosen border over `base`.
#[must_use = "returns the overlay image"]
pub fn contour_overlay(
    base: &RgbImage,
    contours: &[Polyline],
    border: Option<&Quadrilateral>,
) -> RgbImage {
    let mut canvas = base.clone();
    for contour in contours {
        draw_closed(&mut canvas, contour.points().iter().map(|p| (p.x, p.y)), CONTOUR_COLOR);
    }
    if let Some(quad) = border {
        let ring = [quad.top_left, quad.top_right, quad.bottom_right, quad.bottom_left];
        draw_closed(&mut canvas, ring.iter().map(|p| (p.x, p.y)), BORDER_COLOR);
    }
    canvas
}

#[allow(clippy::cast_possible_truncation)]
fn draw_closed(canvas: &mut RgbImage, points: impl Iterator<Item = (f64, f64)>, color: Rgb<u8>) {
    let points: Vec<(f32, f32)> = points.map(|(x, y)| (x as f32, y as f32)).collect();
    let Some(&first) = points.first() else {
        return;
    };
    for pair in points.windows(2) {
        draw_line_segment_mut(canvas, pair[0], pair[1], color);
    }
    if let Some(&last) = points.last() {
        draw_line_segment_mut(canvas, last, first, color);
    }
}
