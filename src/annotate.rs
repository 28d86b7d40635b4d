// src/annotate.rs
//
// Display artifact: a copy of an approach image with its detection zone
// outlined. Purely cosmetic; counts never depend on it.

use crate::types::{DetectionZone, FrameSize};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ZONE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const ZONE_THICKNESS: u32 = 2;

/// Outline `zone` on `img`, clipped to the image bounds.
pub fn draw_zone(img: &mut RgbImage, zone: &DetectionZone, color: Rgb<u8>, thickness: u32) {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return;
    }

    let max_x = width as i32 - 1;
    let max_y = height as i32 - 1;
    let x1 = zone.x1.clamp(0, max_x);
    let x2 = zone.x2.clamp(0, max_x);
    let y1 = zone.y1.clamp(0, max_y);
    let y2 = zone.y2.clamp(0, max_y);

    for t in 0..thickness as i32 {
        // top and bottom edges
        for x in x1..=x2 {
            for y in [y1 + t, y2 - t] {
                if (y1..=y2).contains(&y) {
                    img.put_pixel(x as u32, y as u32, color);
                }
            }
        }
        // left and right edges
        for y in y1..=y2 {
            for x in [x1 + t, x2 - t] {
                if (x1..=x2).contains(&x) {
                    img.put_pixel(x as u32, y as u32, color);
                }
            }
        }
    }
}

/// Write `<out_dir>/<stem>_zone.png` with the lower-half zone drawn.
pub fn write_annotated(image: &Path, out_dir: &Path) -> Result<PathBuf> {
    let mut img = image::open(image)
        .with_context(|| format!("Failed to open {}", image.display()))?
        .to_rgb8();

    let (width, height) = img.dimensions();
    let zone = FrameSize::new(width, height).detection_zone();
    draw_zone(&mut img, &zone, ZONE_COLOR, ZONE_THICKNESS);

    fs::create_dir_all(out_dir)?;
    let stem = image
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("approach");
    let output_path = out_dir.join(format!("{stem}_zone.png"));
    img.save(&output_path)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;

    debug!("Annotated image: {}", output_path.display());
    Ok(output_path)
}
