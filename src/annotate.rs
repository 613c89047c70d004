//! Match-and-Annotate Module
//!
//! Filters OCR tokens by a case-insensitive substring match and draws a
//! labeled rectangle over every match.

use crate::ocr::{BoundingBox, DetectedToken, TextDetector};
use ab_glyph::{FontArc, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use log::debug;
use std::fs;
use std::path::Path;

/// DejaVu Sans, shipped with the crate so labels look the same everywhere.
const BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSans.ttf");

/// How matches are drawn.
#[derive(Clone)]
pub struct AnnotationStyle {
    pub color: Rgb<u8>,
    /// Outline thickness, centered on the word box edge.
    pub stroke_width: u32,
    pub label_scale: f32,
    /// Gap in pixels between the label and the top of its box.
    pub label_offset: i32,
    pub font: FontArc,
}

impl AnnotationStyle {
    /// Green 2 px outlines with 24 px labels in `font`.
    pub fn new(font: FontArc) -> Self {
        AnnotationStyle {
            color: Rgb([0, 255, 0]),
            stroke_width: 2,
            label_scale: 24.0,
            label_offset: 10,
            font,
        }
    }

    /// Default style labeled with the font at `font_path`, or the bundled one.
    pub fn with_font(font_path: Option<&Path>) -> Result<Self> {
        let font = match font_path {
            Some(path) => load_font(path)?,
            None => bundled_font()?,
        };
        Ok(AnnotationStyle::new(font))
    }
}

fn bundled_font() -> Result<FontArc> {
    FontArc::try_from_slice(BUNDLED_FONT).context("Bundled label font is corrupt")
}

fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read font {:?}", path))?;
    let font = FontArc::try_from_vec(bytes)
        .with_context(|| format!("Failed to parse font {:?}", path))?;
    debug!("Loaded label font {:?}", path);
    Ok(font)
}

/// An image with every match for one target word drawn on it.
pub struct Annotation {
    pub image: RgbImage,
    pub matches: Vec<DetectedToken>,
}

impl Annotation {
    pub fn found(&self) -> bool {
        !self.matches.is_empty()
    }
}

/// Case-insensitive substring test. Empty targets never match.
pub fn token_matches(token_text: &str, target: &str) -> bool {
    if target.is_empty() {
        return false;
    }
    token_text.to_lowercase().contains(&target.to_lowercase())
}

pub fn matching_tokens(tokens: &[DetectedToken], target: &str) -> Vec<DetectedToken> {
    tokens
        .iter()
        .filter(|t| token_matches(&t.text, target))
        .cloned()
        .collect()
}

/// Draws a box and a label for each match onto `image`.
pub fn annotate(image: &mut RgbImage, matches: &[DetectedToken], style: &AnnotationStyle) {
    for token in matches {
        let bbox = token.bbox;
        if bbox.width == 0 || bbox.height == 0 {
            debug!("Skipping empty box for '{}'", token.text);
            continue;
        }

        draw_box(image, bbox, style);

        let label_x = bbox.x.max(0);
        let label_y = (bbox.y - style.label_offset - style.label_scale as i32).max(0);
        draw_text_mut(
            image,
            style.color,
            label_x,
            label_y,
            PxScale::from(style.label_scale),
            &style.font,
            &token.text,
        );
    }
}

/// Strokes the outline of `bbox`, half outside and half on the edge.
fn draw_box(image: &mut RgbImage, bbox: BoundingBox, style: &AnnotationStyle) {
    let half = style.stroke_width as i32 / 2;
    for i in 0..style.stroke_width.max(1) as i32 {
        let offset = i - half;
        let width = bbox.width as i32 - 2 * offset;
        let height = bbox.height as i32 - 2 * offset;
        if width <= 0 || height <= 0 {
            continue;
        }
        let rect = Rect::at(bbox.x + offset, bbox.y + offset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, style.color);
    }
}

/// Matches `target` against already detected tokens and draws onto a copy of `image`.
pub fn annotate_tokens(
    image: &RgbImage,
    tokens: &[DetectedToken],
    target: &str,
    style: &AnnotationStyle,
) -> Annotation {
    let matches = matching_tokens(tokens, target);
    debug!("'{}' matched {} of {} tokens", target, matches.len(), tokens.len());

    let mut annotated = image.clone();
    annotate(&mut annotated, &matches, style);
    Annotation {
        image: annotated,
        matches,
    }
}

/// Runs the detector on `image` and annotates every token containing `target`.
pub fn find_and_annotate<D: TextDetector + ?Sized>(
    detector: &mut D,
    image: &RgbImage,
    target: &str,
    style: &AnnotationStyle,
) -> Result<Annotation> {
    let tokens = detector.detect(image)?;
    Ok(annotate_tokens(image, &tokens, target, style))
}
