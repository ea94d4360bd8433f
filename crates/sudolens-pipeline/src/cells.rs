//! Cell segmentation of the rectified grid.
//!
//! The rectified square is cut into an exact 9×9 lattice of
//! `side / 9` pixel cells. A margin is trimmed from every edge of each
//! cell so the printed grid lines do not reach the classifier.

use image::{GrayImage, imageops};
use sudolens_grid::{CellPos, SIZE};

/// One cell image with its grid position.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Where the cell sits in the grid.
    pub pos: CellPos,
    /// Trimmed cell pixels.
    pub image: GrayImage,
}

/// Cut a rectified grid into 81 cells in row-major order.
///
/// Cell `(r, c)` covers rows `r*C + margin .. (r+1)*C - margin` and columns
/// `c*C + margin .. (c+1)*C - margin`, where `C = side / 9`. A margin that
/// would swallow the whole cell yields empty (zero-size) cell images.
#[must_use = "returns the segmented cells"]
pub fn segment(rectified: &GrayImage, margin: u32) -> Vec<Cell> {
    #[allow(clippy::cast_possible_truncation)]
    let size = SIZE as u32;
    let cell_side = rectified.width().min(rectified.height()) / size;
    let inner = cell_side.saturating_sub(2 * margin);

    CellPos::all()
        .map(|pos| {
            let image = if inner == 0 {
                GrayImage::new(0, 0)
            } else {
                #[allow(clippy::cast_possible_truncation)]
                let (row, col) = (pos.row() as u32, pos.col() as u32);
                let x = col * cell_side + margin;
                let y = row * cell_side + margin;
                imageops::crop_imm(rectified, x, y, inner, inner).to_image()
            };
            Cell { pos, image }
        })
        .collect()
}
