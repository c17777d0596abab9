pub mod annotate;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod error;
pub mod geometry;
pub mod homography;
pub mod pipeline;
pub mod resample;

pub use annotate::draw_region;
pub use buffer::PixelBuffer;
pub use cli::Cli;
pub use config::CorrectionConfig;
pub use error::{CorrectionError, ErrorKind};
pub use geometry::{extract_corners, CornerSet, ImageBounds, Region};
pub use homography::{solve, Homography, Solution};
pub use pipeline::{correct, CorrectionResult};
pub use resample::warp;
