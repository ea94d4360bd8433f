//! Shared fixtures: a tiny bitmap font, synthetic grid renderers and a
//! nearest-template digit model.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use image::{GrayImage, Luma, Rgb, RgbImage};
use sudolens_grid::{CellPos, SudokuGrid};
use sudolens_pipeline::classify::prepare_tensor;
use sudolens_pipeline::threshold::otsu_inverse;
use sudolens_pipeline::{
    CLASS_COUNT, CellTensor, DigitModel, InferenceContext, InferenceError, ModelLoadError,
    Probabilities,
};

pub const PUZZLE: &str =
    "530070000600195000098000060800060003400803001700020006060000280000419005000080079";

pub const SOLUTION: &str =
    "534678912672195348198342567859761423426853791713924856961537284287419635345286179";

/// Glyph scale used by every renderer below.
pub const GLYPH_SCALE: u32 = 3;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// 5×7 glyphs for the digits 1 through 9.
const GLYPHS: [[&str; 7]; 9] = [
    ["..#..", ".##..", "..#..", "..#..", "..#..", "..#..", ".###."],
    [".###.", "#...#", "....#", "...#.", "..#..", ".#...", "#####"],
    ["#####", "...#.", "..#..", "...#.", "....#", "#...#", ".###."],
    ["...#.", "..##.", ".#.#.", "#..#.", "#####", "...#.", "...#."],
    ["#####", "#....", "####.", "....#", "....#", "#...#", ".###."],
    ["..##.", ".#...", "#....", "####.", "#...#", "#...#", ".###."],
    ["#####", "....#", "...#.", "..#..", ".#...", ".#...", ".#..."],
    [".###.", "#...#", "#...#", ".###.", "#...#", "#...#", ".###."],
    [".###.", "#...#", "#...#", ".####", "....#", "...#.", ".##.."],
];

/// Ink pixel offsets of `digit` drawn at `scale`, relative to its top-left.
pub fn glyph_pixels(digit: u8, scale: u32) -> Vec<(u32, u32)> {
    let rows = &GLYPHS[usize::from(digit - 1)];
    let mut pixels = Vec::new();
    for (gy, row) in (0u32..).zip(rows.iter()) {
        for (gx, ch) in (0u32..).zip(row.chars()) {
            if ch != '#' {
                continue;
            }
            for dy in 0..scale {
                for dx in 0..scale {
                    pixels.push((gx * scale + dx, gy * scale + dy));
                }
            }
        }
    }
    pixels
}

/// Draw `digit` centred in the square `(x0, y0, side)` of a gray image.
pub fn draw_digit_gray(img: &mut GrayImage, digit: u8, x0: u32, y0: u32, side: u32) {
    let (w, h) = (GLYPH_WIDTH * GLYPH_SCALE, GLYPH_HEIGHT * GLYPH_SCALE);
    let (ox, oy) = (x0 + (side - w) / 2, y0 + (side - h) / 2);
    for (dx, dy) in glyph_pixels(digit, GLYPH_SCALE) {
        img.put_pixel(ox + dx, oy + dy, Luma([0]));
    }
}

/// Draw `digit` centred in the square `(x0, y0, side)` of an RGB image.
pub fn draw_digit_rgb(img: &mut RgbImage, digit: u8, x0: u32, y0: u32, side: u32) {
    let (w, h) = (GLYPH_WIDTH * GLYPH_SCALE, GLYPH_HEIGHT * GLYPH_SCALE);
    let (ox, oy) = (x0 + (side - w) / 2, y0 + (side - h) / 2);
    for (dx, dy) in glyph_pixels(digit, GLYPH_SCALE) {
        img.put_pixel(ox + dx, oy + dy, Rgb([0, 0, 0]));
    }
}

/// A white `side`×`side` cell holding one digit.
pub fn digit_cell(digit: u8, side: u32) -> GrayImage {
    let mut img = GrayImage::from_pixel(side, side, Luma([255]));
    draw_digit_gray(&mut img, digit, 0, 0, side);
    img
}

/// An already-rectified 450×450 grid: 50 px cells, thin black lines,
/// digits from `grid`.
pub fn rectified_grid(grid: &SudokuGrid) -> GrayImage {
    let side = 450;
    let cell = side / 9;
    let mut img = GrayImage::from_pixel(side, side, Luma([255]));
    for k in 0..=9 {
        let at = (k * cell).min(side - 1);
        for t in 0..side {
            img.put_pixel(at, t, Luma([0]));
            img.put_pixel(t, at, Luma([0]));
        }
    }
    for pos in CellPos::all() {
        let digit = grid.get(pos);
        if digit != 0 {
            #[allow(clippy::cast_possible_truncation)]
            let (x, y) = (pos.col() as u32 * cell, pos.row() as u32 * cell);
            draw_digit_gray(&mut img, digit, x, y, cell);
        }
    }
    img
}

/// A 450×450 white "photo" with the grid drawn flat at offset 45, side 360.
///
/// Inner lines are 1 px and the outer frame 2 px, so the outermost
/// contour covers `44..=406` on both axes.
pub fn grid_photo(grid: &SudokuGrid) -> RgbImage {
    let (size, origin, cell) = (450, 45, 40);
    let black = Rgb([0, 0, 0]);
    let mut img = RgbImage::from_pixel(size, size, Rgb([255, 255, 255]));
    let end = origin + 9 * cell;
    let lines = (0..=9)
        .map(|k| origin + k * cell)
        .chain([origin - 1, end + 1]);
    for at in lines {
        for t in origin - 1..=end + 1 {
            img.put_pixel(at, t, black);
            img.put_pixel(t, at, black);
        }
    }
    for pos in CellPos::all() {
        let digit = grid.get(pos);
        if digit != 0 {
            #[allow(clippy::cast_possible_truncation)]
            let (x, y) = (
                origin + pos.col() as u32 * cell,
                origin + pos.row() as u32 * cell,
            );
            draw_digit_rgb(&mut img, digit, x + 1, y + 1, cell - 1);
        }
    }
    img
}

/// Encode an RGB image as PNG bytes.
pub fn png(img: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgb8,
    )
    .unwrap();
    buf
}

/// Classifies by nearest reference tensor, one per digit.
pub struct TemplateModel {
    references: Vec<(u8, CellTensor)>,
}

impl TemplateModel {
    /// References rendered the way the classifier would see a clean cell.
    pub fn new() -> Self {
        let references = (1..=9)
            .map(|digit| {
                let binary = otsu_inverse(&digit_cell(digit, 42));
                (digit, prepare_tensor(&binary).unwrap())
            })
            .collect();
        Self { references }
    }
}

pub struct TemplateContext {
    references: Vec<(u8, CellTensor)>,
}

impl InferenceContext for TemplateContext {
    fn predict(&mut self, input: &CellTensor) -> Result<Probabilities, InferenceError> {
        let distance = |reference: &CellTensor| -> f32 {
            reference
                .as_slice()
                .iter()
                .zip(input.as_slice())
                .map(|(a, b)| (a - b) * (a - b))
                .sum()
        };
        let (digit, _) = self
            .references
            .iter()
            .map(|(digit, reference)| (*digit, distance(reference)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| InferenceError::Backend("no references".into()))?;
        let mut probabilities = [0.0; CLASS_COUNT];
        probabilities[usize::from(digit)] = 1.0;
        Ok(probabilities)
    }
}

impl DigitModel for TemplateModel {
    type Context = TemplateContext;

    fn create_context(&self) -> Result<TemplateContext, ModelLoadError> {
        Ok(TemplateContext {
            references: self.references.clone(),
        })
    }
}
