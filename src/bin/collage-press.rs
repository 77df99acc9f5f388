use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "collage-press", version)]
struct Cli {
    /// Log at DEBUG instead of INFO.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Re-encode one image as a JPEG inside a size window.
    Encode(EncodeArgs),
    /// Compose every photo under a root directory onto a background.
    Batch(BatchArgs),
}

#[derive(Parser, Debug)]
struct EncodeArgs {
    /// Input image (any format the decoder understands).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output path; non-JPEG extensions are rewritten to `.jpg`.
    #[arg(long)]
    out: PathBuf,

    #[arg(long, default_value_t = 200)]
    min_kib: u64,

    #[arg(long, default_value_t = 300)]
    max_kib: u64,

    #[arg(long, default_value_t = 250)]
    target_kib: u64,
}

#[derive(Parser, Debug)]
struct BatchArgs {
    /// Directory whose subdirectories hold the photos.
    #[arg(long)]
    root: PathBuf,

    /// Background template image; its size is the output size.
    #[arg(long)]
    background: PathBuf,

    /// Batch configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Solid background colour (`#rgb` or `#rrggbb`), overriding the template.
    #[arg(long)]
    color: Option<String>,

    /// Image drawn over every result, stretched to the background size.
    #[arg(long)]
    overlay: Option<PathBuf>,

    /// Use the avatar layout (rounded square plus circular badge) with its
    /// default proportions, unless the config already picks one.
    #[arg(long)]
    avatar: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Command::Encode(args) => cmd_encode(args),
        Command::Batch(args) => cmd_batch(args),
    }
}

fn init_tracing(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn open_image(path: &Path) -> anyhow::Result<image::DynamicImage> {
    image::open(path).with_context(|| format!("decode image '{}'", path.display()))
}

fn cmd_encode(args: EncodeArgs) -> anyhow::Result<()> {
    let window =
        collage_press::SizeWindow::from_kib(args.min_kib, args.max_kib, args.target_kib)?;
    let img = open_image(&args.in_path)?;

    let outcome = collage_press::encode_to_window(&img, &args.out, &window)
        .with_context(|| format!("write '{}'", args.out.display()))?;

    println!(
        "{} q={} {:.1}KiB {}x{} {:?}{}",
        outcome.path.display(),
        outcome.quality,
        outcome.bytes as f64 / collage_press::window::KIB as f64,
        outcome.width,
        outcome.height,
        outcome.phase,
        if outcome.in_window { "" } else { " (outside window)" },
    );
    Ok(())
}

fn cmd_batch(args: BatchArgs) -> anyhow::Result<()> {
    let mut cfg = match &args.config {
        Some(path) => collage_press::BatchConfig::load(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => collage_press::BatchConfig::default(),
    };
    if args.color.is_some() {
        cfg.background_color = args.color;
    }
    if args.overlay.is_some() {
        cfg.overlay_path = args.overlay;
    }
    if args.avatar && cfg.layout == collage_press::PhotoLayout::Framed {
        cfg.layout = collage_press::PhotoLayout::Avatar(collage_press::AvatarLayout::default());
    }

    let template = open_image(&args.background)?;
    let report = collage_press::run_batch(&args.root, &template, &cfg)?;

    println!(
        "directories={} skipped={} written={} fallbacks={} failed_items={} failed_directories={}",
        report.directories,
        report.skipped,
        report.written.len(),
        report.fallback_count(),
        report.failed_items,
        report.failed_directories,
    );
    if !report.is_clean() {
        anyhow::bail!(
            "batch finished with failures: {} photo(s), {} directory(ies)",
            report.failed_items,
            report.failed_directories
        );
    }
    Ok(())
}
