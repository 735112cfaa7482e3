//! Bar chart of the most viewed movies for `/topmovies`.
//!
//! Only bars are drawn; the numbered legend goes into the photo caption so no
//! font rendering is needed.

use image::{ImageFormat, Rgb, RgbImage};
use tempfile::NamedTempFile;

use crate::core::error::AppResult;

const WIDTH: u32 = 800;
const HEIGHT: u32 = 480;
const MARGIN: u32 = 40;
const GAP: u32 = 12;

const BACKGROUND: Rgb<u8> = Rgb([250, 250, 250]);
const AXIS: Rgb<u8> = Rgb([60, 60, 60]);
const PALETTE: [Rgb<u8>; 5] = [
    Rgb([229, 57, 53]),
    Rgb([30, 136, 229]),
    Rgb([67, 160, 71]),
    Rgb([251, 140, 0]),
    Rgb([142, 36, 170]),
];

fn fill_rect(img: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for px in x..(x + w).min(img.width()) {
        for py in y..(y + h).min(img.height()) {
            img.put_pixel(px, py, color);
        }
    }
}

/// Draws one vertical bar per value, scaled to the largest value.
///
/// Zero values get a 2px stub so every entry stays visible.
pub fn render_bars(values: &[i64]) -> RgbImage {
    let mut img = RgbImage::from_pixel(WIDTH, HEIGHT, BACKGROUND);

    let plot_height = HEIGHT - 2 * MARGIN;
    let baseline = HEIGHT - MARGIN;
    fill_rect(&mut img, MARGIN, baseline, WIDTH - 2 * MARGIN, 2, AXIS);
    fill_rect(&mut img, MARGIN, MARGIN, 2, plot_height, AXIS);

    if values.is_empty() {
        return img;
    }

    let count = values.len() as u32;
    let slot = (WIDTH - 2 * MARGIN - GAP) / count;
    let bar_width = slot.saturating_sub(GAP).max(1);
    let max = values.iter().copied().max().unwrap_or(0).max(1);

    for (i, value) in values.iter().enumerate() {
        let value = (*value).max(0);
        let height = ((value as f64 / max as f64) * f64::from(plot_height)).round() as u32;
        let height = height.clamp(2, plot_height);
        let x = MARGIN + GAP + i as u32 * slot;
        fill_rect(&mut img, x, baseline - height, bar_width, height, PALETTE[i % PALETTE.len()]);
    }

    img
}

/// Renders the chart as PNG into a fresh temporary file.
///
/// Each call gets its own file, removed when the returned handle is dropped.
pub fn render_views_chart(values: &[i64]) -> AppResult<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix("topmovies-")
        .suffix(".png")
        .tempfile()?;
    render_bars(values).save_with_format(file.path(), ImageFormat::Png)?;
    Ok(file)
}

/// Numbered legend matching the bar order: `1. Name — 12 👁`.
pub fn chart_legend(entries: &[(String, i64)]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, (name, views))| format!("{}. {} — {} 👁", i + 1, name, views))
        .collect::<Vec<_>>()
        .join("\n")
}
