use clap::{Args, Parser, Subcommand};
use imgpipe::batch::BatchProgress;
use imgpipe::commands::{
    self, CropKind, ExtendKind, Operation, ProcessOptions, ProcessResult, ResizeKind,
};
use imgpipe::config::{self, AppConfig, ProcessingConfig};
use imgpipe::{Format, output};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "imgpipe", version)]
#[command(about = "Convert, optimize, resize, crop and extend images")]
#[command(long_about = "\
Convert, optimize, resize, crop and extend images

Reads JPEG, PNG, WebP, AVIF, JPEG XL and QOI; writes all of them except
JPEG XL. Inputs may be files or directories. Outputs go beside each input
with the target format's extension unless --output names a directory.
Existing files are kept: a free name like photo_1.webp is chosen instead,
unless --overwrite is given.

Geometry steps always run in the order resize → crop → extend.

Defaults come from imgpipe.toml in the working directory (or --config).
Run 'imgpipe gen-config' to print a documented one.")]
struct Cli {
    /// Config file (default: ./imgpipe.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print batch events as JSON lines
    #[arg(long, global = true)]
    json: bool,

    /// More log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Flags shared by every command that writes images.
#[derive(Args, Clone)]
struct BatchArgs {
    /// Image files or directories
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Descend into subdirectories of directory inputs
    #[arg(short, long)]
    recursive: bool,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Replace existing output files
    #[arg(long)]
    overwrite: bool,

    /// Encoder quality, 0-100
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=100))]
    quality: Option<u8>,

    /// Parallel workers (capped at the number of cores)
    #[arg(short, long)]
    jobs: Option<usize>,
}

#[derive(Args, Clone)]
struct TargetFormat {
    /// Output format (default: keep the source format)
    #[arg(short, long, value_parser = parse_format)]
    format: Option<Format>,
}

#[derive(Subcommand)]
enum Command {
    /// Re-encode images in another format
    Convert {
        #[command(flatten)]
        batch: BatchArgs,
        /// Output format
        #[arg(short, long, value_parser = parse_format)]
        format: Format,
    },
    /// Re-encode images in their own format
    Optimize {
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Resize images
    #[command(group = clap::ArgGroup::new("mode").required(true))]
    Resize {
        #[command(flatten)]
        batch: BatchArgs,
        #[command(flatten)]
        target: TargetFormat,
        /// Target width; height follows the aspect ratio
        #[arg(long, group = "mode")]
        width: Option<u32>,
        /// Target height; width follows the aspect ratio
        #[arg(long, group = "mode")]
        height: Option<u32>,
        /// Exact size, WxH (may distort)
        #[arg(long, group = "mode", value_parser = parse_size)]
        exact: Option<(u32, u32)>,
        /// Fit within WxH, keeping the aspect ratio
        #[arg(long, group = "mode", value_parser = parse_size)]
        fit: Option<(u32, u32)>,
        /// Scale factor, e.g. 0.5
        #[arg(long, group = "mode")]
        scale: Option<f64>,
    },
    /// Crop images to a region or a centered aspect ratio
    #[command(group = clap::ArgGroup::new("mode").required(true))]
    Crop {
        #[command(flatten)]
        batch: BatchArgs,
        #[command(flatten)]
        target: TargetFormat,
        /// Region X,Y,WxH
        #[arg(long, group = "mode", value_parser = parse_region)]
        region: Option<(u32, u32, u32, u32)>,
        /// Aspect ratio W:H, centered
        #[arg(long, group = "mode", value_parser = parse_ratio)]
        aspect: Option<(u32, u32)>,
    },
    /// Pad images to a size or aspect ratio, centered
    #[command(group = clap::ArgGroup::new("mode").required(true))]
    Extend {
        #[command(flatten)]
        batch: BatchArgs,
        #[command(flatten)]
        target: TargetFormat,
        /// Aspect ratio W:H
        #[arg(long, group = "mode", value_parser = parse_ratio)]
        aspect: Option<(u32, u32)>,
        /// Canvas size WxH
        #[arg(long, group = "mode", value_parser = parse_size)]
        size: Option<(u32, u32)>,
        /// Padding color: #RRGGBB, #RRGGBBAA or transparent
        #[arg(long, default_value = "transparent")]
        fill: String,
    },
    /// Show format, dimensions and file size of an image
    Info { file: PathBuf },
    /// List the images under a directory
    Scan {
        dir: PathBuf,
        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },
    /// Print a stock imgpipe.toml with all options documented
    GenConfig,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = config::resolve_config(cli.config.as_deref(), Path::new("."))?;

    let (batch, options) = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(ExitCode::SUCCESS);
        }
        Command::Info { file } => {
            let codec = imgpipe::imaging::RustCodec::new();
            let info = commands::load_image_with(&file, config.preview.thumbnail_size, &codec)?;
            if cli.json {
                println!("{}", serde_json::to_string(&info)?);
            } else {
                print_lines(output::format_image_info(&file, &info));
            }
            return Ok(ExitCode::SUCCESS);
        }
        Command::Scan { dir, recursive } => {
            let paths = commands::collect_images(&dir, recursive)?;
            if cli.json {
                println!("{}", serde_json::to_string(&paths)?);
            } else {
                print_lines(output::format_scan(&dir, &paths));
            }
            return Ok(ExitCode::SUCCESS);
        }
        Command::Convert { batch, format } => {
            let mut options = base_options(Operation::Convert, &batch, &config);
            options.format = Some(format.extension().to_string());
            (batch, options)
        }
        Command::Optimize { batch } => {
            let mut options = base_options(Operation::Optimize, &batch, &config);
            options.format = None;
            (batch, options)
        }
        Command::Resize {
            batch,
            target,
            width,
            height,
            exact,
            fit,
            scale,
        } => {
            let mut options = base_options(Operation::Resize, &batch, &config);
            apply_target(&mut options, &target);
            (options.resize_mode, options.width, options.height) =
                match (width, height, exact, fit) {
                    (Some(w), ..) => (ResizeKind::Width, Some(w), None),
                    (_, Some(h), ..) => (ResizeKind::Height, None, Some(h)),
                    (_, _, Some((w, h)), _) => (ResizeKind::Exact, Some(w), Some(h)),
                    (_, _, _, Some((w, h))) => (ResizeKind::Fit, Some(w), Some(h)),
                    _ => (ResizeKind::Scale, None, None),
                };
            options.scale = scale;
            (batch, options)
        }
        Command::Crop {
            batch,
            target,
            region,
            aspect,
        } => {
            let mut options = base_options(Operation::Crop, &batch, &config);
            apply_target(&mut options, &target);
            if let Some((x, y, w, h)) = region {
                options.crop_mode = CropKind::Region;
                options.x = Some(x);
                options.y = Some(y);
                options.width = Some(w);
                options.height = Some(h);
            } else if let Some((w, h)) = aspect {
                options.crop_mode = CropKind::Aspect;
                options.width = Some(w);
                options.height = Some(h);
            }
            (batch, options)
        }
        Command::Extend {
            batch,
            target,
            aspect,
            size,
            fill,
        } => {
            let mut options = base_options(Operation::Extend, &batch, &config);
            apply_target(&mut options, &target);
            let (kind, (w, h)) = match (aspect, size) {
                (_, Some(size)) => (ExtendKind::Size, size),
                (Some(ratio), None) => (ExtendKind::Aspect, ratio),
                (None, None) => (ExtendKind::Aspect, (1, 1)),
            };
            options.extend_mode = kind;
            options.width = Some(w);
            options.height = Some(h);
            options.fill_color = Some(fill);
            (batch, options)
        }
    };

    let paths = collect_inputs(&batch.inputs, batch.recursive)?;
    if paths.is_empty() {
        log::warn!("no images found");
        return Ok(ExitCode::SUCCESS);
    }

    let workers = config::effective_threads(&ProcessingConfig {
        max_processes: batch.jobs.or(config.processing.max_processes),
    });

    let json = cli.json;
    let (tx, rx) = std::sync::mpsc::channel::<BatchProgress<ProcessResult>>();
    let printer = std::thread::spawn(move || {
        for event in rx {
            if json {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => log::warn!("could not serialize event: {e}"),
                }
            } else {
                print_lines(output::format_batch_event(&event));
            }
        }
    });

    let report = commands::process_batch(&paths, &options, workers, Some(tx));
    printer
        .join()
        .map_err(|_| "progress printer thread panicked")?;

    if !json {
        print_lines(output::format_summary(&report));
    }

    Ok(if report.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

/// `-v` raises the default level; `RUST_LOG` still wins.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .target(env_logger::Target::Stderr)
        .init();
}

/// Options every batch command starts from: CLI flags over config values.
fn base_options(operation: Operation, batch: &BatchArgs, config: &AppConfig) -> ProcessOptions {
    let quality = batch
        .quality
        .unwrap_or_else(|| config.output.quality.min(100) as u8);
    ProcessOptions {
        operation,
        format: config.output.format.map(|f| f.extension().to_string()),
        quality,
        overwrite: batch.overwrite || config.output.overwrite,
        output_dir: batch.output.clone().or_else(|| config.output.dir.clone()),
        ..ProcessOptions::default()
    }
}

fn apply_target(options: &mut ProcessOptions, target: &TargetFormat) {
    if let Some(format) = target.format {
        options.format = Some(format.extension().to_string());
    }
}

/// Expand directory inputs; files are taken as given.
fn collect_inputs(
    inputs: &[PathBuf],
    recursive: bool,
) -> Result<Vec<PathBuf>, commands::CommandError> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            paths.extend(commands::collect_images(input, recursive)?);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

fn print_lines(lines: Vec<String>) {
    for line in lines {
        println!("{}", line);
    }
}

fn parse_format(s: &str) -> Result<Format, String> {
    Format::from_name(s).ok_or_else(|| format!("unknown format '{s}'"))
}

/// Parse "WxH" (e.g. "1920x1080").
fn parse_size(s: &str) -> Result<(u32, u32), String> {
    parse_pair(s, 'x').ok_or_else(|| format!("expected WxH, got '{s}'"))
}

/// Parse "W:H" (e.g. "16:9").
fn parse_ratio(s: &str) -> Result<(u32, u32), String> {
    parse_pair(s, ':').ok_or_else(|| format!("expected W:H, got '{s}'"))
}

/// Parse "X,Y,WxH" (e.g. "10,20,300x200").
fn parse_region(s: &str) -> Result<(u32, u32, u32, u32), String> {
    let err = || format!("expected X,Y,WxH, got '{s}'");
    let mut parts = s.splitn(3, ',');
    let x = parts.next().and_then(|v| v.trim().parse().ok()).ok_or_else(err)?;
    let y = parts.next().and_then(|v| v.trim().parse().ok()).ok_or_else(err)?;
    let (w, h) = parts.next().and_then(|v| parse_pair(v, 'x')).ok_or_else(err)?;
    Ok((x, y, w, h))
}

fn parse_pair(s: &str, sep: char) -> Option<(u32, u32)> {
    let (a, b) = s.trim().split_once(sep)?;
    Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
}
