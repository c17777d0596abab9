use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};

use crate::config::CorrectionConfig;
use crate::geometry::Region;

#[derive(Parser, Debug)]
#[command(name = "true-plane")]
#[command(version, about = "Correct the perspective of a photographed document, card or plate")]
#[command(group(ArgGroup::new("region").required(true).args(["rect", "quad", "rotated"])))]
pub struct Cli {
    /// Input image path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output path [default: input_corrected.png]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Axis-aligned region as X,Y,W,H
    #[arg(long, value_parser = parse_rect)]
    pub rect: Option<Region>,

    /// Quadrilateral region as X1,Y1,X2,Y2,X3,Y3,X4,Y4 (corners in any order)
    #[arg(long, value_parser = parse_quad)]
    pub quad: Option<Region>,

    /// Rotated rectangle as CX,CY,W,H,DEGREES (clockwise)
    #[arg(long, value_parser = parse_rotated)]
    pub rotated: Option<Region>,

    /// JSON file with correction options; flags below override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Maximum output size in pixels (width * height)
    #[arg(long)]
    pub max_pixels: Option<u64>,

    /// Fill colour for areas outside the source, as R,G,B,A
    #[arg(long, value_parser = parse_color)]
    pub border: Option<[u8; 4]>,

    /// Degeneracy threshold for the corner geometry
    #[arg(long)]
    pub epsilon: Option<f64>,

    /// Rotate portrait results so the output is wider than tall
    #[arg(long)]
    pub landscape: bool,

    /// Also save the input with the region outlined to this path
    #[arg(long)]
    pub annotate: Option<PathBuf>,

    /// Show pipeline details
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let stem = self.input.file_stem().unwrap_or_default().to_string_lossy();
            let parent = self.input.parent().unwrap_or(std::path::Path::new("."));
            parent.join(format!("{}_corrected.png", stem))
        })
    }

    /// The region given on the command line. Clap guarantees exactly one.
    pub fn region(&self) -> Option<Region> {
        self.rect.or(self.quad).or(self.rotated)
    }

    /// Defaults, then the `--config` file, then explicit flags.
    pub fn correction_config(&self) -> Result<CorrectionConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse config file: {:?}", path))?
            }
            None => CorrectionConfig::default(),
        };

        if let Some(max_pixels) = self.max_pixels {
            config = config.with_max_output_pixels(max_pixels);
        }
        if let Some(border) = self.border {
            config = config.with_border_fill(border);
        }
        if let Some(epsilon) = self.epsilon {
            config = config.with_singularity_epsilon(epsilon);
        }
        if self.landscape {
            config = config.with_landscape(true);
        }
        Ok(config)
    }
}

fn parse_numbers<const N: usize>(s: &str, what: &str) -> Result<[f64; N], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != N {
        return Err(format!(
            "Invalid {} '{}', expected {} comma-separated numbers",
            what, s, N
        ));
    }

    let mut values = [0.0; N];
    for (value, part) in values.iter_mut().zip(&parts) {
        *value = part
            .parse()
            .map_err(|_| format!("Invalid number in {}: {}", what, part))?;
    }
    Ok(values)
}

fn parse_rect(s: &str) -> Result<Region, String> {
    let [x, y, w, h] = parse_numbers::<4>(s, "rect")?;
    Ok(Region::rect(x, y, w, h))
}

fn parse_quad(s: &str) -> Result<Region, String> {
    let v = parse_numbers::<8>(s, "quad")?;
    Ok(Region::quad([
        (v[0], v[1]),
        (v[2], v[3]),
        (v[4], v[5]),
        (v[6], v[7]),
    ]))
}

fn parse_rotated(s: &str) -> Result<Region, String> {
    let [cx, cy, w, h, degrees] = parse_numbers::<5>(s, "rotated rect")?;
    Ok(Region::rotated((cx, cy), w, h, degrees))
}

fn parse_color(s: &str) -> Result<[u8; 4], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 4 {
        return Err(format!("Invalid colour '{}', expected R,G,B,A", s));
    }

    let mut color = [0u8; 4];
    for (value, part) in color.iter_mut().zip(&parts) {
        *value = part
            .parse()
            .map_err(|_| format!("Invalid colour component: {}", part))?;
    }
    Ok(color)
}
