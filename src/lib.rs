//! WordSpotter - Core Library
//!
//! This file wires the OCR, matching, display and scanning modules
//! together and exposes the configuration used by the command-line entry
//! point.

use anyhow::{Result, bail};
use log::info;
use std::path::PathBuf;

pub mod annotate;
pub mod display;
pub mod ocr;
pub mod scanner;

use annotate::AnnotationStyle;
use display::{Display, HeadlessDisplay, ScreenSize, WindowDisplay};
use ocr::{TesseractDetector, TextDetector};
use scanner::{ScanSummary, Scanner};

/// Application configuration structure.
#[derive(Debug)]
pub struct Config {
    pub image_dir: PathBuf,
    pub target_words: Vec<String>,
    pub lang: String,
    pub tessdata_dir: Option<PathBuf>,
    pub font_path: Option<PathBuf>,
    pub screen: ScreenSize,
    pub headless: bool,
}

/// Splits a comma-separated list into trimmed, non-empty words.
pub fn parse_target_words(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Searches every image in the configured directory for the target words.
pub fn run(config: Config) -> Result<ScanSummary> {
    info!("Initializing processing with config: {:?}", config);

    if config.target_words.is_empty() {
        bail!("No words to search for");
    }
    if !config.image_dir.is_dir() {
        bail!("Image directory does not exist: {:?}", config.image_dir);
    }

    let style = AnnotationStyle::with_font(config.font_path.as_deref())?;
    let tessdata_dir = ocr::resolve_tessdata_dir(config.tessdata_dir.as_deref())?;
    let detector = TesseractDetector::new(&tessdata_dir, &config.lang)?;

    let summary = if config.headless {
        scan(detector, HeadlessDisplay, &config, style)?
    } else {
        scan(detector, WindowDisplay::new(config.screen), &config, style)?
    };

    info!(
        "Scanned {} image(s), {} with matches, {} skipped.",
        summary.images_scanned, summary.images_matched, summary.images_skipped
    );
    Ok(summary)
}

fn scan<D: TextDetector, S: Display>(
    detector: D,
    display: S,
    config: &Config,
    style: AnnotationStyle,
) -> Result<ScanSummary> {
    let mut scanner = Scanner::new(detector, display, config.target_words.clone(), style);
    scanner.process_directory(&config.image_dir)
}
