use std::fmt;

use tracing::{debug, info, instrument, warn};

use crate::buffer::PixelBuffer;
use crate::config::CorrectionConfig;
use crate::error::CorrectionError;
use crate::geometry::{extract_corners, CornerSet, Region};
use crate::homography::{output_size, solve};
use crate::resample::warp;

/// Outcome of one correction request: the rectified image or the reason
/// none could be produced.
pub type CorrectionResult = std::result::Result<PixelBuffer, CorrectionError>;

/// Progress of a request through the pipeline. Any stage before `Done` can
/// end in `Failed`, with the error returned to the caller as the reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Received,
    GeometryExtracted,
    TransformSolved,
    Resampled,
    Done,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::GeometryExtracted => "geometry-extracted",
            Stage::TransformSolved => "transform-solved",
            Stage::Resampled => "resampled",
            Stage::Done => "done",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Rectify the part of `image` covered by `region`.
///
/// The input is never modified; the result is a freshly allocated buffer
/// with the same channel count. Failures are deterministic, so there is
/// nothing to retry.
#[instrument(
    skip(image, config),
    fields(width = image.width(), height = image.height(), channels = image.channels())
)]
pub fn correct(image: &PixelBuffer, region: &Region, config: &CorrectionConfig) -> CorrectionResult {
    let mut stage = Stage::Received;
    let result = run(image, region, config, &mut stage);

    match &result {
        Ok(output) => info!(
            out_w = output.width(),
            out_h = output.height(),
            "Perspective correction applied"
        ),
        Err(err) => {
            warn!(after = %stage, error = %err, "Perspective correction failed");
            advance(&mut stage, Stage::Failed);
        }
    }
    result
}

fn run(
    image: &PixelBuffer,
    region: &Region,
    config: &CorrectionConfig,
    stage: &mut Stage,
) -> CorrectionResult {
    config.validate()?;

    let corners = extract_corners(region, image.bounds())?;
    advance(stage, Stage::GeometryExtracted);

    let corners = if config.landscape {
        orient_landscape(corners)
    } else {
        corners
    };

    let solution = solve(&corners, config.singularity_epsilon)?;
    advance(stage, Stage::TransformSolved);

    let output = warp(
        image,
        &solution.homography,
        solution.width,
        solution.height,
        config,
    )?;
    advance(stage, Stage::Resampled);

    advance(stage, Stage::Done);
    Ok(output)
}

fn advance(stage: &mut Stage, next: Stage) {
    debug!(from = %stage, to = %next, "Pipeline stage");
    *stage = next;
}

/// Relabel portrait corner sets so the rectified output comes out turned a
/// quarter clockwise. Sets whose size cannot be computed are left for the
/// solver to reject.
fn orient_landscape(corners: CornerSet) -> CornerSet {
    match output_size(&corners) {
        Ok((width, height)) if height > width => {
            debug!(width, height, "Portrait region, rotating to landscape");
            corners.rotated_clockwise()
        }
        _ => corners,
    }
}
