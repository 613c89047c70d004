//! WordSpotter - Main Application Entrypoint
//!
//! This file is responsible for parsing command-line arguments, initializing
//! the application environment (like logging), asking for the words to look
//! for, and dispatching the core processing logic.

use clap::Parser;
use log::{error, info};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use wordspotter::display::ScreenSize;
use wordspotter::{parse_target_words, run};

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

/// A command-line tool that finds words in a folder of images and highlights every match.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the images (.jpg, .png, .webp, .jpeg)
    #[arg(short, long, default_value = "./imagens")]
    dir: PathBuf,

    /// Comma-separated words to search for (e.g. nao,mecanismo). Prompted for when omitted
    #[arg(short, long)]
    words: Option<String>,

    /// OCR language (e.g., "por" for Portuguese, "eng" for English)
    #[arg(short, long, default_value_t = String::from("por"))]
    lang: String,

    /// Directory containing Tesseract's traineddata files
    #[arg(long, env = "TESSDATA_PREFIX")]
    tessdata: Option<PathBuf>,

    /// TrueType/OpenType font used for match labels
    #[arg(long)]
    font: Option<PathBuf>,

    /// Screen size used to center result windows
    #[arg(long, default_value_t = ScreenSize::default())]
    screen: ScreenSize,

    /// Log matches instead of opening windows
    #[arg(long)]
    headless: bool,

    /// Logging verbosity level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum LogLevel {
    Error,
    Info,
    Debug,
}

/// Asks for the words on stdin.
fn prompt_for_words() -> io::Result<String> {
    print!("Enter the words to search for (e.g. nao,mecanismo,diversao): ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line)
}

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    let args = Args::parse();

    // 1. Initialize Logger
    let log_level = match args.log_level {
        LogLevel::Error => "error",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!("Starting WordSpotter...");

    // 2. Collect target words
    let raw_words = match args.words {
        Some(words) => words,
        None => match prompt_for_words() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to read words from stdin: {}", e);
                std::process::exit(1);
            }
        },
    };
    let target_words = parse_target_words(&raw_words);
    if target_words.is_empty() {
        error!("No words to search for were given.");
        std::process::exit(1);
    }

    // 3. Create a configuration object from arguments
    let config = wordspotter::Config {
        image_dir: args.dir,
        target_words,
        lang: args.lang,
        tessdata_dir: args.tessdata,
        font_path: args.font,
        screen: args.screen,
        headless: args.headless,
    };

    println!("\nProcessing images...\n");

    // 4. Run the main application logic
    if let Err(e) = run(config) {
        error!("Application failed: {:#}", e);
        std::process::exit(2);
    }

    info!("Processing completed successfully.");
}
