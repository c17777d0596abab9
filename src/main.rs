use anyhow::{Context, Result};
use clap::Parser;
use image::{ImageReader, Rgba};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use true_plane::{correct, draw_region, extract_corners, Cli, ImageBounds, PixelBuffer};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = cli.correction_config()?;
    let region = cli
        .region()
        .context("One of --rect, --quad or --rotated is required")?;

    // Load input image
    let img = ImageReader::open(&cli.input)
        .with_context(|| format!("Failed to open input file: {:?}", cli.input))?
        .decode()
        .with_context(|| format!("Failed to decode image: {:?}", cli.input))?;

    info!(
        path = ?cli.input,
        width = img.width(),
        height = img.height(),
        "Loaded image"
    );
    debug!(?region, ?config, "Correction request");

    if let Some(path) = &cli.annotate {
        let rgba = img.to_rgba8();
        let bounds = ImageBounds::new(rgba.width(), rgba.height());
        let corners =
            extract_corners(&region, bounds).context("Failed to extract region corners")?;
        draw_region(&rgba, &corners, Rgba([255, 214, 0, 255]))
            .save(path)
            .with_context(|| format!("Failed to save annotated image: {:?}", path))?;
        eprintln!("Saved region overlay: {:?}", path);
    }

    let (src_w, src_h) = (img.width(), img.height());
    let source = PixelBuffer::try_from(img).context("Unsupported input image")?;

    let corrected = correct(&source, &region, &config).context("Perspective correction failed")?;

    // Save result
    let output_path = cli.output_path();
    corrected
        .to_dynamic()?
        .save(&output_path)
        .with_context(|| format!("Failed to save output: {:?}", output_path))?;

    eprintln!("Saved corrected image: {:?}", output_path);
    eprintln!(
        "Dimensions: {}x{} -> {}x{}",
        src_w,
        src_h,
        corrected.width(),
        corrected.height()
    );

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}
