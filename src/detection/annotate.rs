use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::models::{DetectedObject, PixelBox};

const BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const OUTLINE_THICKNESS: u32 = 2;
const LABEL_HEIGHT: u32 = 18;
const LABEL_SCALE: f32 = 14.0;
// Rough per-character advance at LABEL_SCALE, wide enough for the strip.
const LABEL_CHAR_WIDTH: u32 = 8;

/// Format the label drawn above a detection box.
pub fn label_for(object: &DetectedObject) -> String {
    format!("{}: {:.2}", object.class_name, object.confidence)
}

/// Draw every detection onto a copy of the input: a hollow rectangle
/// around the object plus a filled strip carrying the class name and
/// confidence. Text is only rendered when a label font is configured;
/// the geometry is identical either way.
pub fn annotate(image: &RgbImage, objects: &[DetectedObject], font: Option<&FontArc>) -> RgbImage {
    let mut canvas = image.clone();
    let (width, height) = canvas.dimensions();

    for object in objects {
        let px = PixelBox::from_normalized(object.bbox, width, height);
        if px.width() == 0 || px.height() == 0 {
            continue;
        }

        for inset in 0..OUTLINE_THICKNESS {
            let w = px.width().saturating_sub(2 * inset);
            let h = px.height().saturating_sub(2 * inset);
            if w == 0 || h == 0 {
                break;
            }
            let rect = Rect::at((px.x_min + inset) as i32, (px.y_min + inset) as i32).of_size(w, h);
            draw_hollow_rect_mut(&mut canvas, rect, BOX_COLOR);
        }

        let label = label_for(object);
        let label_w = (label.len() as u32 * LABEL_CHAR_WIDTH).min(width - px.x_min).max(1);
        // Strip sits above the box when there is room, inside it otherwise.
        let label_y = px.y_min.saturating_sub(LABEL_HEIGHT);
        let strip = Rect::at(px.x_min as i32, label_y as i32).of_size(label_w, LABEL_HEIGHT);
        draw_filled_rect_mut(&mut canvas, strip, BOX_COLOR);

        if let Some(font) = font {
            draw_text_mut(
                &mut canvas,
                LABEL_TEXT_COLOR,
                px.x_min as i32 + 2,
                label_y as i32 + 2,
                PxScale::from(LABEL_SCALE),
                font,
                &label,
            );
        }
    }

    canvas
}
