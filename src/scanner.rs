//! Directory Scanner Module
//!
//! Walks a folder of images and, per image, tries each target word in turn
//! until one of them is found.

use crate::annotate::{AnnotationStyle, annotate_tokens};
use crate::display::Display;
use crate::ocr::{self, TextDetector};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, error, info};
use std::fs;
use std::path::{Path, PathBuf};

/// Extensions picked up by [`list_images`], in listing order. Matching is case-sensitive.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "png", "webp", "jpeg"];

/// Lists the images directly inside `dir`, grouped by extension and sorted within each group.
/// Dotfiles are ignored.
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read directory {:?}", dir))? {
        let path = entry
            .with_context(|| format!("Failed to read entry in {:?}", dir))?
            .path();
        let hidden = path
            .file_name()
            .is_some_and(|name| name.to_string_lossy().starts_with('.'));
        if path.is_file() && !hidden {
            files.push(path);
        }
    }

    let mut images = Vec::with_capacity(files.len());
    for ext in IMAGE_EXTENSIONS {
        let mut group: Vec<PathBuf> = files
            .iter()
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(ext))
            .cloned()
            .collect();
        group.sort();
        images.extend(group);
    }
    Ok(images)
}

/// What happened to a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The file could not be decoded.
    Skipped,
    NoMatch,
    /// The first target word that was found.
    Matched(String),
}

/// Totals for a whole directory.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub images_scanned: usize,
    pub images_skipped: usize,
    pub images_matched: usize,
}

/// Drives detection, matching and display for a list of target words.
pub struct Scanner<D, S> {
    detector: D,
    display: S,
    targets: Vec<String>,
    style: AnnotationStyle,
    progress: ProgressBar,
}

impl<D: TextDetector, S: Display> Scanner<D, S> {
    pub fn new(detector: D, display: S, targets: Vec<String>, style: AnnotationStyle) -> Self {
        Scanner {
            detector,
            display,
            targets,
            style,
            progress: ProgressBar::hidden(),
        }
    }

    /// Looks for the target words in one image.
    ///
    /// Words are tried in order and the scan stops at the first word that is
    /// found, after its result has been shown and acknowledged.
    pub fn process_file(&mut self, path: &Path) -> Result<FileOutcome> {
        info!("Analyzing image: {:?}", path);
        let image = match ocr::load_image(path) {
            Ok(image) => image,
            Err(e) => {
                error!("Error loading image {:?}: {:#}", path, e);
                return Ok(FileOutcome::Skipped);
            }
        };

        let image = ocr::prepare_for_ocr(image);
        let tokens = self
            .detector
            .detect(&image)
            .with_context(|| format!("OCR failed on {:?}", path))?;
        debug!("Detected {} tokens in {:?}", tokens.len(), path);

        for target in &self.targets {
            debug!("Searching for: {}", target);
            let annotation = annotate_tokens(&image, &tokens, target, &self.style);
            if !annotation.found() {
                continue;
            }

            info!(
                "Found '{}' {} time(s) in {:?}",
                target,
                annotation.matches.len(),
                path
            );
            let title = format!("Detection result - {}", target);
            let display = &mut self.display;
            self.progress.suspend(|| -> Result<()> {
                println!(
                    "\x1b[93mText found!\nClick the picture and press any key to continue the search\x1b[0m"
                );
                display.show(&title, &annotation.image)?;
                display.wait_for_acknowledgement()
            })?;
            return Ok(FileOutcome::Matched(target.clone()));
        }

        Ok(FileOutcome::NoMatch)
    }

    /// Processes every image in `dir`.
    pub fn process_directory(&mut self, dir: &Path) -> Result<ScanSummary> {
        let images = list_images(dir)?;
        info!("Found {} image(s) in {:?}", images.len(), dir);

        self.progress = ProgressBar::new(images.len() as u64);
        self.progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Scanning images [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap()
                .progress_chars("##-"),
        );

        let mut summary = ScanSummary::default();
        for path in &images {
            if let Some(name) = path.file_name() {
                self.progress.set_message(name.to_string_lossy().into_owned());
            }
            match self.process_file(path)? {
                FileOutcome::Skipped => summary.images_skipped += 1,
                FileOutcome::NoMatch => summary.images_scanned += 1,
                FileOutcome::Matched(_) => {
                    summary.images_scanned += 1;
                    summary.images_matched += 1;
                }
            }
            self.progress.inc(1);
        }

        self.display.close();
        self.progress.finish_with_message("done");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::{BoundingBox, DetectedToken};
    use image::{Rgb, RgbImage};
    use std::collections::HashMap;

    /// Recognizes images by their original width, since JPEG pixels are lossy.
    struct KeyedDetector {
        words: HashMap<u32, Vec<&'static str>>,
        calls: usize,
    }

    impl TextDetector for KeyedDetector {
        fn detect(&mut self, image: &RgbImage) -> Result<Vec<DetectedToken>> {
            self.calls += 1;
            // Test images are small, so they always arrive upscaled.
            let key = image.width() / ocr::UPSCALE_FACTOR;
            Ok(self
                .words
                .get(&key)
                .into_iter()
                .flatten()
                .enumerate()
                .map(|(i, text)| DetectedToken {
                    text: text.to_string(),
                    bbox: BoundingBox {
                        x: 10 + 60 * i as i32,
                        y: 10,
                        width: 50,
                        height: 20,
                    },
                    confidence: 95.0,
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingDisplay {
        shown: Vec<String>,
        acknowledged: usize,
    }

    impl Display for RecordingDisplay {
        fn show(&mut self, title: &str, _image: &RgbImage) -> Result<()> {
            self.shown.push(title.to_string());
            Ok(())
        }

        fn wait_for_acknowledgement(&mut self) -> Result<()> {
            self.acknowledged += 1;
            Ok(())
        }

        fn close(&mut self) {}
    }

    fn write_image(dir: &Path, name: &str, key: u32) {
        let img = RgbImage::from_pixel(key, 40, Rgb([255, 255, 255]));
        img.save(dir.join(name)).unwrap();
    }

    fn scanner(
        words: HashMap<u32, Vec<&'static str>>,
        targets: &[&str],
    ) -> Scanner<KeyedDetector, RecordingDisplay> {
        Scanner::new(
            KeyedDetector { words, calls: 0 },
            RecordingDisplay::default(),
            targets.iter().map(|t| t.to_string()).collect(),
            AnnotationStyle::with_font(None).unwrap(),
        )
    }

    #[test]
    fn lists_visible_supported_images_without_recursing() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "b.png",
            "a.jpg",
            "c.webp",
            "d.jpeg",
            "e.JPG",
            "notes.txt",
            "f.gif",
            ".thumb.jpg",
        ] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();
        fs::write(dir.path().join("nested.jpg").join("inner.jpg"), b"x").unwrap();

        let names: Vec<String> = list_images(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.png", "c.webp", "d.jpeg"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_images(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn stops_at_first_matching_word() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.jpg", 30);
        write_image(dir.path(), "b.png", 40);

        let words = HashMap::from([
            (30, vec!["nothing", "here"]),
            (40, vec!["o", "mecanismo", "nao"]),
        ]);
        let mut scanner = scanner(words, &["nao", "mecanismo"]);

        let outcome = scanner.process_file(&dir.path().join("a.jpg")).unwrap();
        assert_eq!(outcome, FileOutcome::NoMatch);
        assert!(scanner.display.shown.is_empty());

        let outcome = scanner.process_file(&dir.path().join("b.png")).unwrap();
        // "nao" is tried first and is present, so "mecanismo" is never shown.
        assert_eq!(outcome, FileOutcome::Matched("nao".to_string()));
        assert_eq!(scanner.display.shown, vec!["Detection result - nao"]);
        assert_eq!(scanner.display.acknowledged, 1);
    }

    #[test]
    fn directory_scenario_shows_one_window() {
        let dir = tempfile::tempdir().unwrap();
        write_image(dir.path(), "a.jpg", 30);
        write_image(dir.path(), "b.png", 40);

        let words = HashMap::from([
            (30, vec!["sem", "palavras"]),
            (40, vec!["O", "Mecanismo"]),
        ]);
        let mut scanner = scanner(words, &["nao", "mecanismo"]);

        let summary = scanner.process_directory(dir.path()).unwrap();
        assert_eq!(
            summary,
            ScanSummary {
                images_scanned: 2,
                images_skipped: 0,
                images_matched: 1
            }
        );
        assert_eq!(scanner.display.shown, vec!["Detection result - mecanismo"]);
        assert_eq!(scanner.display.acknowledged, 1);
        // OCR runs once per decoded image, not once per word.
        assert_eq!(scanner.detector.calls, 2);
    }

    #[test]
    fn undecodable_images_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("broken.jpg"), b"not really a jpeg").unwrap();
        write_image(dir.path(), "ok.png", 50);

        let mut scanner = scanner(HashMap::from([(50, vec!["nao"])]), &["nao"]);
        let summary = scanner.process_directory(dir.path()).unwrap();
        assert_eq!(summary.images_skipped, 1);
        assert_eq!(summary.images_matched, 1);
        assert_eq!(scanner.detector.calls, 1);
    }
}
