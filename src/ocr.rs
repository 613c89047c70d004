//! OCR Module
//!
//! Handles image loading, the small-image upscale heuristic and word-level
//! text detection using the tesseract-rs crate.

use anyhow::{Context, Result, bail};
use image::RgbImage;
use image::imageops::{self, FilterType};
use log::{debug, info};
use std::path::{Path, PathBuf};
use tesseract_rs::{TessPageIteratorLevel, TessPageSegMode, TesseractAPI};

/// Images narrower or shorter than this (in pixels) are upscaled before OCR.
pub const UPSCALE_THRESHOLD: u32 = 500;
/// Factor applied to both axes when an image is below the threshold.
pub const UPSCALE_FACTOR: u32 = 2;

/// Axis-aligned rectangle in pixel coordinates of the image given to the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Builds a box from Tesseract's corner coordinates `(x1, y1, x2, y2)`.
    pub fn from_corners((x1, y1, x2, y2): (i32, i32, i32, i32)) -> Self {
        BoundingBox {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0) as u32,
            height: (y2 - y1).max(0) as u32,
        }
    }
}

/// A single recognized word with its location.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedToken {
    pub text: String,
    pub bbox: BoundingBox,
    pub confidence: f32,
}

/// Anything that can turn pixels into positioned words.
pub trait TextDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedToken>>;
}

/// Gets the default location where this version of `tesseract-rs` caches its data.
/// The build script downloads language files here.
fn default_tessdata_dir() -> Result<PathBuf> {
    let base_path = if cfg!(target_os = "macos") {
        let home = std::env::var("HOME").context("HOME env var not set")?;
        PathBuf::from(home)
            .join("Library")
            .join("Application Support")
    } else if cfg!(target_os = "linux") {
        let home = std::env::var("HOME").context("HOME env var not set")?;
        PathBuf::from(home).join(".tesseract-rs")
    } else if cfg!(target_os = "windows") {
        let appdata = std::env::var("APPDATA").context("APPDATA env var not set")?;
        PathBuf::from(appdata)
    } else {
        bail!("Unsupported operating system, pass the tessdata directory explicitly");
    };
    Ok(base_path.join("tesseract-rs").join("tessdata"))
}

/// Picks the tessdata directory: the explicit one when given, the build cache otherwise.
pub fn resolve_tessdata_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(dir) => Ok(dir.to_path_buf()),
        None => default_tessdata_dir().context("Could not determine tessdata directory"),
    }
}

/// Decodes an image file into an RGB buffer.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    let img = image::open(path).with_context(|| format!("Failed to decode image {:?}", path))?;
    Ok(img.to_rgb8())
}

/// Returns true when either side is below [`UPSCALE_THRESHOLD`].
pub fn needs_upscale(width: u32, height: u32) -> bool {
    width < UPSCALE_THRESHOLD || height < UPSCALE_THRESHOLD
}

/// Doubles small images so that tiny text has a chance of being recognized.
pub fn prepare_for_ocr(image: RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    if !needs_upscale(width, height) {
        return image;
    }
    debug!(
        "Upscaling {}x{} image to {}x{} before OCR",
        width,
        height,
        width * UPSCALE_FACTOR,
        height * UPSCALE_FACTOR
    );
    imageops::resize(
        &image,
        width * UPSCALE_FACTOR,
        height * UPSCALE_FACTOR,
        FilterType::Triangle,
    )
}

/// Word-level detector backed by a single Tesseract instance.
pub struct TesseractDetector {
    api: TesseractAPI,
}

impl TesseractDetector {
    /// Initializes Tesseract for `lang` with the fixed engine and segmentation modes.
    pub fn new(tessdata_dir: &Path, lang: &str) -> Result<Self> {
        info!(
            "Initializing Tesseract with language '{}' from {:?}",
            lang, tessdata_dir
        );
        let datapath = tessdata_dir
            .to_str()
            .context("tessdata path is not valid UTF-8")?;

        let api = TesseractAPI::new();
        api.init(datapath, lang)
            .context(format!("Failed to initialize Tesseract with language '{}'", lang))?;
        // Assume a single uniform block of text.
        api.set_page_seg_mode(TessPageSegMode::PSM_SINGLE_BLOCK)
            .context("Failed to set Tesseract page segmentation mode")?;

        Ok(TesseractDetector { api })
    }
}

impl TextDetector for TesseractDetector {
    fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedToken>> {
        let (width, height) = image.dimensions();
        self.api
            .set_image(
                image.as_raw(),
                width as i32,
                height as i32,
                3,                  // bytes per pixel for RGB
                (width * 3) as i32, // bytes per line
            )
            .context("Tesseract failed to set image")?;
        self.api
            .recognize()
            .context("Tesseract failed to recognize text")?;

        let iter = match self.api.get_iterator() {
            Ok(iter) => iter,
            Err(e) => {
                debug!("No result iterator ({}), treating page as empty", e);
                return Ok(Vec::new());
            }
        };

        // The iterator starts on the first word, so read before advancing.
        let level = TessPageIteratorLevel::RIL_WORD;
        let mut tokens = Vec::new();
        loop {
            if let Ok(raw) = iter.get_utf8_text(level) {
                let text = raw.trim().to_string();
                if !text.is_empty() {
                    if let (Ok(corners), Ok(confidence)) =
                        (iter.get_bounding_box(level), iter.confidence(level))
                    {
                        debug!("Token '{}' at {:?} ({:.1}%)", text, corners, confidence);
                        tokens.push(DetectedToken {
                            text,
                            bbox: BoundingBox::from_corners(corners),
                            confidence,
                        });
                    }
                }
            }
            if !iter.next(level).unwrap_or(false) {
                break;
            }
        }

        Ok(tokens)
    }
}
