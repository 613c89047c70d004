//! Display Module
//!
//! Shows annotated images to the user and blocks until they acknowledge
//! them. A headless implementation stands in when no window should be
//! opened.

use anyhow::{Context, Result};
use image::RgbImage;
use log::{debug, info};
use minifb::{Key, KeyRepeat, ScaleMode, Window, WindowOptions};
use std::fmt;
use std::str::FromStr;

const WINDOW_FPS: usize = 30;

/// Screen size used to center result windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ScreenSize {
    fn default() -> Self {
        ScreenSize {
            width: 1920,
            height: 1080,
        }
    }
}

impl FromStr for ScreenSize {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`, e.g. `2560x1440`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width = w.trim().parse().map_err(|_| format!("invalid width '{}'", w))?;
        let height = h.trim().parse().map_err(|_| format!("invalid height '{}'", h))?;
        Ok(ScreenSize { width, height })
    }
}

impl fmt::Display for ScreenSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl ScreenSize {
    /// Top-left corner that centers a `width` x `height` window, clamped to the screen origin.
    pub fn centered_position(&self, width: u32, height: u32) -> (isize, isize) {
        let x = (self.width as isize - width as isize) / 2;
        let y = (self.height as isize - height as isize) / 2;
        (x.max(0), y.max(0))
    }
}

/// Somewhere annotated images can be shown.
pub trait Display {
    fn show(&mut self, title: &str, image: &RgbImage) -> Result<()>;

    /// Blocks until the user is done looking at the current image.
    fn wait_for_acknowledgement(&mut self) -> Result<()>;

    fn close(&mut self);
}

struct OpenWindow {
    window: Window,
    buffer: Vec<u32>,
    width: usize,
    height: usize,
}

/// A topmost desktop window per result, closed on the first keypress.
pub struct WindowDisplay {
    screen: ScreenSize,
    current: Option<OpenWindow>,
}

impl WindowDisplay {
    pub fn new(screen: ScreenSize) -> Self {
        WindowDisplay {
            screen,
            current: None,
        }
    }
}

/// Packs RGB pixels into the 0RGB words a framebuffer expects.
fn to_framebuffer(image: &RgbImage) -> Vec<u32> {
    image
        .pixels()
        .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
        .collect()
}

impl Display for WindowDisplay {
    fn show(&mut self, title: &str, image: &RgbImage) -> Result<()> {
        self.close();

        let (width, height) = image.dimensions();
        let options = WindowOptions {
            resize: true,
            topmost: true,
            scale_mode: ScaleMode::AspectRatioStretch,
            ..WindowOptions::default()
        };
        let mut window = Window::new(title, width as usize, height as usize, options)
            .context("Failed to open result window")?;
        window.set_target_fps(WINDOW_FPS);

        let (x, y) = self.screen.centered_position(width, height);
        window.set_position(x, y);
        debug!("Opened window '{}' at ({}, {})", title, x, y);

        let buffer = to_framebuffer(image);
        window
            .update_with_buffer(&buffer, width as usize, height as usize)
            .context("Failed to draw result window")?;

        self.current = Some(OpenWindow {
            window,
            buffer,
            width: width as usize,
            height: height as usize,
        });
        Ok(())
    }

    fn wait_for_acknowledgement(&mut self) -> Result<()> {
        let Some(open) = self.current.as_mut() else {
            return Ok(());
        };

        while open.window.is_open() {
            let keys: Vec<Key> = open.window.get_keys_pressed(KeyRepeat::No);
            if !keys.is_empty() {
                debug!("Acknowledged with {:?}", keys);
                break;
            }
            open.window
                .update_with_buffer(&open.buffer, open.width, open.height)
                .context("Failed to refresh result window")?;
        }

        self.close();
        Ok(())
    }

    fn close(&mut self) {
        // Dropping the window destroys it.
        self.current = None;
    }
}

/// Logs what would have been shown and never blocks.
#[derive(Debug, Default)]
pub struct HeadlessDisplay;

impl Display for HeadlessDisplay {
    fn show(&mut self, title: &str, image: &RgbImage) -> Result<()> {
        info!(
            "[headless] {} ({}x{})",
            title,
            image.width(),
            image.height()
        );
        Ok(())
    }

    fn wait_for_acknowledgement(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn parses_screen_size() {
        assert_eq!(
            "2560x1440".parse::<ScreenSize>().unwrap(),
            ScreenSize {
                width: 2560,
                height: 1440
            }
        );
        assert_eq!("800 X 600".parse::<ScreenSize>().unwrap().height, 600);
        assert!("1920".parse::<ScreenSize>().is_err());
        assert!("axb".parse::<ScreenSize>().is_err());
    }

    #[test]
    fn centers_on_default_screen() {
        let screen = ScreenSize::default();
        assert_eq!(screen.to_string(), "1920x1080");
        assert_eq!(screen.centered_position(920, 480), (500, 300));
    }

    #[test]
    fn oversized_windows_stick_to_origin() {
        let screen = ScreenSize::default();
        assert_eq!(screen.centered_position(4000, 3000), (0, 0));
        assert_eq!(screen.centered_position(4000, 80), (0, 500));
    }

    #[test]
    fn framebuffer_packs_rgb() {
        let img = RgbImage::from_pixel(2, 1, Rgb([0x12, 0x34, 0x56]));
        assert_eq!(to_framebuffer(&img), vec![0x123456, 0x123456]);
    }

    #[test]
    fn headless_never_blocks() {
        let mut display = HeadlessDisplay;
        let img = RgbImage::new(4, 4);
        display.show("Detection result - nao", &img).unwrap();
        display.wait_for_acknowledgement().unwrap();
        display.close();
    }
}
