use tracing::{debug, instrument};

use crate::buffer::PixelBuffer;
use crate::config::CorrectionConfig;
use crate::error::{CorrectionError, Result};
use crate::homography::{project_xy, Homography};

/// How far (in pixels) a mapped position may fall outside the source extent
/// and still be clamped onto the edge instead of receiving the border fill.
pub const CLAMP_TOLERANCE: f64 = 1e-6;

/// Resample `source` into a `width x height` buffer through `homography`,
/// which maps source coordinates to destination coordinates.
///
/// Each destination pixel centre is carried back through the inverse
/// transform and sampled bilinearly. Samples with an alpha channel (2 or 4
/// channels) are blended premultiplied so transparent neighbours do not
/// bleed their colour.
#[instrument(skip(source, homography, config), fields(src_w = source.width(), src_h = source.height()))]
pub fn warp(
    source: &PixelBuffer,
    homography: &Homography,
    width: u32,
    height: u32,
    config: &CorrectionConfig,
) -> Result<PixelBuffer> {
    if width == 0 || height == 0 {
        return Err(CorrectionError::DegenerateRegion);
    }

    let requested = width as u64 * height as u64;
    let too_large = || CorrectionError::OutputTooLarge {
        requested,
        limit: config.max_output_pixels,
    };
    if requested > config.max_output_pixels {
        return Err(too_large());
    }

    let inverse = homography
        .inverse()
        .ok_or(CorrectionError::SingularTransform)?;
    let m = *inverse.matrix();

    let channels = source.channels() as usize;
    let len = usize::try_from(requested)
        .ok()
        .and_then(|n| n.checked_mul(channels))
        .ok_or_else(too_large)?;
    let fill = &config.border_fill[..channels];

    let (src_w, src_h) = (source.width() as f64, source.height() as f64);
    let (min_x, max_x) = (-0.5 - CLAMP_TOLERANCE, src_w - 0.5 + CLAMP_TOLERANCE);
    let (min_y, max_y) = (-0.5 - CLAMP_TOLERANCE, src_h - 0.5 + CLAMP_TOLERANCE);

    let mut data = vec![0u8; len];
    let mut filled = 0u64;

    for (out_y, row) in data.chunks_exact_mut(width as usize * channels).enumerate() {
        let dst_y = out_y as f64 + 0.5;
        for (out_x, px) in row.chunks_exact_mut(channels).enumerate() {
            let dst_x = out_x as f64 + 0.5;

            // Continuous source position, shifted into pixel-index space.
            let sample = project_xy(&m, dst_x, dst_y)
                .map(|(u, v)| (u - 0.5, v - 0.5))
                .filter(|&(x, y)| x >= min_x && x <= max_x && y >= min_y && y <= max_y);

            match sample {
                Some((x, y)) => {
                    let x = x.clamp(0.0, src_w - 1.0);
                    let y = y.clamp(0.0, src_h - 1.0);
                    bilinear_into(source, x, y, px);
                }
                None => {
                    px.copy_from_slice(fill);
                    filled += 1;
                }
            }
        }
    }

    debug!(width, height, border_pixels = filled, "Warp complete");
    PixelBuffer::new(width, height, source.channels(), data)
}

/// Blend the four pixels around `(x, y)` into `out`. The caller clamps
/// `(x, y)` into `[0, w-1] x [0, h-1]`.
fn bilinear_into(source: &PixelBuffer, x: f64, y: f64, out: &mut [u8]) {
    let max_x = source.width() - 1;
    let max_y = source.height() - 1;

    let x_floor = x.floor();
    let y_floor = y.floor();
    let x_frac = x - x_floor;
    let y_frac = y - y_floor;

    let x0 = (x_floor as u32).min(max_x);
    let y0 = (y_floor as u32).min(max_y);
    let x1 = (x0 + 1).min(max_x);
    let y1 = (y0 + 1).min(max_y);

    let taps = [
        source.pixel_at(x0, y0),
        source.pixel_at(x1, y0),
        source.pixel_at(x0, y1),
        source.pixel_at(x1, y1),
    ];
    let weights = [
        (1.0 - x_frac) * (1.0 - y_frac),
        x_frac * (1.0 - y_frac),
        (1.0 - x_frac) * y_frac,
        x_frac * y_frac,
    ];

    let channels = out.len();
    let alpha_channel = match channels {
        2 | 4 => Some(channels - 1),
        _ => None,
    };

    match alpha_channel {
        None => {
            for (c, dst) in out.iter_mut().enumerate() {
                let value: f64 = taps
                    .iter()
                    .zip(weights)
                    .map(|(tap, w)| tap[c] as f64 * w)
                    .sum();
                *dst = to_sample(value);
            }
        }
        Some(a) => {
            let alpha: f64 = taps
                .iter()
                .zip(weights)
                .map(|(tap, w)| tap[a] as f64 * w)
                .sum();
            if alpha < 0.5 {
                out.fill(0);
                return;
            }
            for c in 0..a {
                let premultiplied: f64 = taps
                    .iter()
                    .zip(weights)
                    .map(|(tap, w)| tap[c] as f64 * tap[a] as f64 * w)
                    .sum();
                out[c] = to_sample(premultiplied / alpha);
            }
            out[a] = to_sample(alpha);
        }
    }
}

fn to_sample(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
