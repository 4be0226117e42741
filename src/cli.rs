// ============================================================================
// MDIPaint CLI - headless batch processing via command-line arguments
// ============================================================================
//
// Usage examples:
//   mdipaint -i photo.png -t "Black&White" -o result.png
//   mdipaint -i "shots/*.jpg" -t MatrixMedian -t "Data&Geolocation" --output-dir out/ -f png
//   mdipaint -i a.png b.png --output-dir out/ --set jpeg_quality=80 -f jpeg
//   mdipaint --list
//
// Each transform runs as a background job; progress is printed from the main
// thread as the job reports it.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, mpsc};
use std::time::Instant;

use clap::Parser;
use tracing::{debug, info};

use crate::canvas::{PixelSurface, WHITE};
use crate::io::{self, ImageFormat};
use crate::plugins::{Transform, TransformCatalog, TransformRunner};
use crate::settings::Settings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MDIPaint headless image processor.
///
/// Apply the bundled transforms to image files and convert between formats.
#[derive(Parser, Debug)]
#[command(
    name = "mdipaint",
    about = "MDIPaint headless batch image processor",
    long_about = "Run image transforms on files and convert between PNG, JPEG and BMP.\n\n\
                  Example:\n  \
                  mdipaint -i photo.png -t \"Black&White\" -o result.png\n  \
                  mdipaint -i \"*.jpg\" -t MatrixMedian --output-dir out/ -f png"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, num_args = 1.., required_unless_present = "list")]
    pub input: Vec<String>,

    /// Transform to apply, by name. Repeat to chain; they run in the order given.
    #[arg(short, long = "transform", value_name = "NAME")]
    pub transforms: Vec<String>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing.
    /// Files are written here with the original stem and the target format's extension.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Output format: png, jpeg, bmp.
    /// When omitted, the format is inferred from --output's extension, defaulting to png.
    #[arg(short, long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// JPEG quality (1-100). Defaults to the `jpeg_quality` setting.
    #[arg(short, long, value_name = "1-100")]
    pub quality: Option<u8>,

    /// Settings override, `key=value`. Repeatable.
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// List the available transforms. Exits afterwards unless inputs are given.
    #[arg(long)]
    pub list: bool,

    /// Print per-file timing and transform progress; enables debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    if process(args) { ExitCode::SUCCESS } else { ExitCode::FAILURE }
}

fn process(args: CliArgs) -> bool {
    let mut settings = Settings::default();
    for entry in &args.overrides {
        if let Err(e) = settings.apply_override(entry) {
            eprintln!("error: {}", e);
            return false;
        }
    }

    let catalog = TransformCatalog::with_builtin(&settings);

    if args.list {
        for name in catalog.names() {
            let author = catalog.get(name).map(|t| t.author().to_string()).unwrap_or_default();
            let state = if catalog.is_enabled(name) { "" } else { " (disabled)" };
            println!("{}  by {}{}", name, author, state);
        }
        if args.input.is_empty() {
            return true;
        }
    }

    // Resolve every requested transform before touching any file
    let mut chain: Vec<Arc<dyn Transform>> = Vec::with_capacity(args.transforms.len());
    for name in &args.transforms {
        match catalog.get(name) {
            Some(t) if catalog.is_enabled(name) => chain.push(t),
            Some(_) => {
                eprintln!("error: transform '{}' is disabled.", name);
                return false;
            }
            None => {
                eprintln!(
                    "error: unknown transform '{}'. Available: {}",
                    name,
                    catalog.names().join(", ")
                );
                return false;
            }
        }
    }

    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return false;
    }

    // Multiple inputs require --output-dir, not --output
    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return false;
    }

    let quality = args.quality.unwrap_or(settings.jpeg_quality);
    let format = match parse_format(args.format.as_deref(), args.output.as_deref()) {
        Ok(f) => f.with_quality(quality),
        Err(msg) => {
            eprintln!("error: {}", msg);
            return false;
        }
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return false;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();

        let Some(output_path) = build_output_path(
            input_path,
            args.output.as_deref(),
            args.output_dir.as_deref(),
            format,
        ) else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(
            input_path,
            &output_path,
            &chain,
            format,
            settings.flatten_on_save,
            args.verbose,
        ) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    !any_failure
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    chain: &[Arc<dyn Transform>],
    format: ImageFormat,
    flatten: bool,
    verbose: bool,
) -> Result<(), String> {
    // -- Step 1: Load ----------------------------------------------------
    let mut surface = io::load(input).map_err(|e| format!("load failed: {}", e))?;
    info!(input = %input.display(), width = surface.width(), height = surface.height(), "processing");

    // -- Step 2: Transforms, in order --------------------------------------
    for transform in chain {
        surface = run_transform(transform.clone(), surface, verbose)?;
    }

    // -- Step 3: Save ----------------------------------------------------
    let result = if flatten {
        io::save(&surface.flatten_onto(WHITE), output, format)
    } else {
        io::save(&surface, output, format)
    };
    result.map_err(|e| format!("save failed: {}", e))
}

/// Run one transform as a background job, echoing its progress until it
/// finishes. The surface comes back unchanged when the transform fails.
fn run_transform(
    transform: Arc<dyn Transform>,
    surface: PixelSurface,
    verbose: bool,
) -> Result<PixelSurface, String> {
    let (tx, rx) = mpsc::channel::<u8>();
    let job = TransformRunner::spawn(transform, surface, Arc::new(tx));

    // The sender lives inside the job, so this ends when the job does.
    for percent in rx.iter() {
        if verbose {
            print!("\r  {} {:>3}%", job.name(), percent);
            let _ = std::io::stdout().flush();
        }
    }
    if verbose {
        println!();
    }

    let name = job.name().to_string();
    let (surface, result) = job.wait().map_err(|e| e.to_string())?;
    match result {
        Ok(()) => {
            debug!(transform = %name, "applied");
            Ok(surface)
        }
        Err(e) => Err(e.to_string()),
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Choose the format from `--format`, else from the output file extension.
/// Defaults to PNG when neither is given.
fn parse_format(format_arg: Option<&str>, output: Option<&Path>) -> Result<ImageFormat, String> {
    if let Some(f) = format_arg {
        return ImageFormat::from_extension(f)
            .ok_or_else(|| format!("unsupported format '{}' (expected png, jpeg or bmp)", f));
    }
    match output {
        Some(out) => ImageFormat::from_path(out).map_err(|e| e.to_string()),
        None => Ok(ImageFormat::Png),
    }
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, derives filename from input stem)
/// 3. Fallback: same directory as input, same stem, new extension
///    (appends `_out` to stem if it would collide with the input path)
fn build_output_path(
    input: &Path,
    output: Option<&Path>,
    output_dir: Option<&Path>,
    format: ImageFormat,
) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let ext = format.extension();
    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.{}", stem, ext)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    let candidate = parent.join(format!("{}.{}", stem, ext));

    if candidate == input {
        Some(parent.join(format!("{}_out.{}", stem, ext)))
    } else {
        Some(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::BLACK;
    use image::Rgba;
    use std::ffi::OsString;

    #[test]
    fn format_comes_from_flag_then_extension() {
        assert_eq!(parse_format(Some("BMP"), None), Ok(ImageFormat::Bmp));
        assert!(matches!(
            parse_format(None, Some(Path::new("x.jpg"))),
            Ok(ImageFormat::Jpeg { .. })
        ));
        assert_eq!(parse_format(None, None), Ok(ImageFormat::Png));
        assert!(parse_format(Some("webp"), None).is_err());
        assert!(parse_format(None, Some(Path::new("x.tga"))).is_err());
    }

    #[test]
    fn output_path_avoids_overwriting_the_input() {
        let p = build_output_path(Path::new("dir/a.png"), None, None, ImageFormat::Png).unwrap();
        assert_eq!(p, PathBuf::from("dir/a_out.png"));
        let p = build_output_path(Path::new("dir/a.png"), None, Some(Path::new("out")), ImageFormat::Bmp)
            .unwrap();
        assert_eq!(p, PathBuf::from("out/a.bmp"));
    }

    #[test]
    fn args_parse() {
        let args = CliArgs::try_parse_from([
            "mdipaint", "-i", "a.png", "-t", "Black&White", "-t", "MatrixMedian", "--set", "jpeg_quality=70",
        ])
        .unwrap();
        assert_eq!(args.transforms, vec!["Black&White", "MatrixMedian"]);
        assert_eq!(args.overrides, vec!["jpeg_quality=70"]);
        assert!(CliArgs::try_parse_from(["mdipaint", "--list"]).is_ok());
        assert!(CliArgs::try_parse_from(["mdipaint"]).is_err());
    }

    #[test]
    fn batch_run_applies_the_chain() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        let mut s = PixelSurface::new_filled(6, 6, Rgba([200, 0, 0, 255])).unwrap();
        s.set(0, 0, BLACK).unwrap();
        io::save(&s, &input, ImageFormat::Png).unwrap();

        let output = dir.path().join("out.bmp");
        let args = CliArgs::try_parse_from([
            OsString::from("mdipaint"),
            "-i".into(),
            input.clone().into_os_string(),
            "-t".into(),
            "Black&White".into(),
            "-o".into(),
            output.clone().into_os_string(),
        ])
        .unwrap();
        assert!(process(args));

        let out = io::load(&output).unwrap();
        assert_eq!(out.get(3, 3).unwrap(), Rgba([59, 59, 59, 255]));
        assert_eq!(out.get(0, 0).unwrap(), BLACK);
    }

    #[test]
    fn unknown_transform_fails() {
        let args = CliArgs::try_parse_from(["mdipaint", "-i", "missing.png", "-t", "Sepia"]).unwrap();
        assert!(!process(args));
    }
}
