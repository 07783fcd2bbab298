//! Evaluation Plots
//!
//! Raster charts drawn with `imageproc`. No font is bundled, so charts carry
//! no text: counts, class names and feature names live in the matching CSV
//! reports, in the same row order as the chart.

use crate::reports::ranked;
use crate::ExportError;
use forest_trainer::ConfusionMatrix;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

/// Bars shown in the importance chart
pub const DEFAULT_TOP_N: usize = 20;

const CELL: u32 = 80;
const MARGIN: u32 = 20;
const BAR_HEIGHT: u32 = 24;
const BAR_GAP: u32 = 6;
const BAR_MAX_WIDTH: u32 = 600;
const SWATCH: u32 = 16;
const SWATCH_GAP: u32 = 8;
/// Legend swatches plus the gap above the first bar
const LEGEND_HEIGHT: u32 = SWATCH + MARGIN;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([200, 200, 200]);
const BLUE_LOW: [f64; 3] = [247.0, 251.0, 255.0];
const BLUE_HIGH: [f64; 3] = [8.0, 48.0, 107.0];

/// Sensor a feature is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFamily {
    Accelerometer,
    Gyroscope,
    Derived,
}

impl SensorFamily {
    /// Legend order
    pub const ALL: [SensorFamily; 3] = [
        SensorFamily::Accelerometer,
        SensorFamily::Gyroscope,
        SensorFamily::Derived,
    ];

    /// Classify a feature by its name
    pub fn of(feature: &str) -> Self {
        if feature.contains("accel") {
            SensorFamily::Accelerometer
        } else if feature.contains("gyro") {
            SensorFamily::Gyroscope
        } else {
            SensorFamily::Derived
        }
    }

    /// Bar colour
    pub fn color(&self) -> Rgb<u8> {
        match self {
            SensorFamily::Accelerometer => Rgb([0xFF, 0x6B, 0x6B]),
            SensorFamily::Gyroscope => Rgb([0x4E, 0xCD, 0xC4]),
            SensorFamily::Derived => Rgb([0x95, 0xE1, 0xD3]),
        }
    }
}

/// Heatmap of the confusion matrix.
///
/// True classes run top to bottom and predicted classes left to right, both
/// in class order. Cell darkness is the count relative to the largest cell;
/// the counts themselves are in `confusion_matrix.csv`.
pub fn render_confusion_matrix(matrix: &ConfusionMatrix) -> Result<RgbImage, ExportError> {
    let n = matrix.n_classes() as u32;
    if n == 0 {
        return Err(ExportError::EmptyPlot);
    }
    let side = 2 * MARGIN + n * CELL;
    let mut image = RgbImage::from_pixel(side, side, WHITE);

    let max = (0..matrix.n_classes())
        .flat_map(|a| (0..matrix.n_classes()).map(move |p| (a, p)))
        .map(|(a, p)| matrix.get(a, p))
        .max()
        .unwrap_or(0)
        .max(1);

    for actual in 0..n {
        for predicted in 0..n {
            let count = matrix.get(actual as usize, predicted as usize);
            let cell = Rect::at((MARGIN + predicted * CELL) as i32, (MARGIN + actual * CELL) as i32)
                .of_size(CELL, CELL);
            draw_filled_rect_mut(&mut image, cell, blue_scale(count as f64 / max as f64));
            draw_hollow_rect_mut(&mut image, cell, GRID);
        }
    }
    Ok(image)
}

/// Horizontal bars for the `top_n` most important features, largest first.
///
/// A legend row of swatches (accelerometer, gyroscope, derived) sits above
/// the bars. Bars follow the order of `feature_importance.csv`.
pub fn render_feature_importance(
    names: &[String],
    importances: &[f64],
    top_n: usize,
) -> Result<RgbImage, ExportError> {
    if names.len() != importances.len() {
        return Err(ExportError::LengthMismatch {
            expected: names.len(),
            actual: importances.len(),
        });
    }
    let shown: Vec<usize> = ranked(importances).into_iter().take(top_n).collect();
    if shown.is_empty() {
        return Err(ExportError::EmptyPlot);
    }

    let rows = shown.len() as u32;
    let width = 2 * MARGIN + BAR_MAX_WIDTH;
    let height = 2 * MARGIN + LEGEND_HEIGHT + rows * BAR_HEIGHT + (rows - 1) * BAR_GAP;
    let mut image = RgbImage::from_pixel(width, height, WHITE);

    for (k, family) in SensorFamily::ALL.iter().enumerate() {
        let x = MARGIN + k as u32 * (SWATCH + SWATCH_GAP);
        let swatch = Rect::at(x as i32, MARGIN as i32).of_size(SWATCH, SWATCH);
        draw_filled_rect_mut(&mut image, swatch, family.color());
        draw_hollow_rect_mut(&mut image, swatch, GRID);
    }

    let top = importances[shown[0]];
    for (row, &i) in shown.iter().enumerate() {
        let fraction = if top > 0.0 { (importances[i] / top).clamp(0.0, 1.0) } else { 0.0 };
        let bar_width = ((fraction * BAR_MAX_WIDTH as f64).round() as u32).max(1);
        let y = MARGIN + LEGEND_HEIGHT + row as u32 * (BAR_HEIGHT + BAR_GAP);
        let bar = Rect::at(MARGIN as i32, y as i32).of_size(bar_width, BAR_HEIGHT);
        draw_filled_rect_mut(&mut image, bar, SensorFamily::of(&names[i]).color());
    }
    Ok(image)
}

fn blue_scale(t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let channel = |k: usize| (BLUE_LOW[k] + (BLUE_HIGH[k] - BLUE_LOW[k]) * t).round() as u8;
    Rgb([channel(0), channel(1), channel(2)])
}
