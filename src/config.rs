use serde::{Deserialize, Serialize};

use crate::error::{CorrectionError, Result};

/// Default pixel budget for the corrected image (64 Mpx).
pub const DEFAULT_MAX_OUTPUT_PIXELS: u64 = 1 << 26;
/// Default degeneracy threshold for the transform solver.
pub const DEFAULT_SINGULARITY_EPSILON: f64 = 1e-6;

/// Options recognised by [`correct`](crate::correct).
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrectionConfig {
    /// Upper bound on `width * height` of the output.
    pub max_output_pixels: u64,
    /// Fill for output pixels that map outside the source. Only the first
    /// `channels` components are used.
    pub border_fill: [u8; 4],
    /// Threshold below which the corner geometry is treated as singular.
    pub singularity_epsilon: f64,
    /// Turn portrait results 90° clockwise so the output is never taller
    /// than it is wide.
    pub landscape: bool,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            max_output_pixels: DEFAULT_MAX_OUTPUT_PIXELS,
            border_fill: [0, 0, 0, 0],
            singularity_epsilon: DEFAULT_SINGULARITY_EPSILON,
            landscape: false,
        }
    }
}

impl CorrectionConfig {
    pub fn with_max_output_pixels(mut self, max_output_pixels: u64) -> Self {
        self.max_output_pixels = max_output_pixels;
        self
    }

    pub fn with_border_fill(mut self, border_fill: [u8; 4]) -> Self {
        self.border_fill = border_fill;
        self
    }

    pub fn with_singularity_epsilon(mut self, singularity_epsilon: f64) -> Self {
        self.singularity_epsilon = singularity_epsilon;
        self
    }

    pub fn with_landscape(mut self, landscape: bool) -> Self {
        self.landscape = landscape;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_output_pixels == 0 {
            return Err(CorrectionError::invalid("max_output_pixels must be positive"));
        }
        if !self.singularity_epsilon.is_finite() || self.singularity_epsilon < 0.0 {
            return Err(CorrectionError::invalid(format!(
                "singularity_epsilon must be a finite non-negative number, got {}",
                self.singularity_epsilon
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = CorrectionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.border_fill, [0, 0, 0, 0]);
        assert!(!config.landscape);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = CorrectionConfig::default();
        assert!(base.with_max_output_pixels(0).validate().is_err());
        assert!(base.with_singularity_epsilon(f64::NAN).validate().is_err());
        assert!(base.with_singularity_epsilon(-1.0).validate().is_err());
        assert!(base.with_singularity_epsilon(0.0).validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: CorrectionConfig =
            serde_json::from_str(r#"{ "border_fill": [255, 255, 255, 255], "landscape": true }"#)
                .unwrap();
        assert_eq!(config.border_fill, [255, 255, 255, 255]);
        assert!(config.landscape);
        assert_eq!(config.max_output_pixels, DEFAULT_MAX_OUTPUT_PIXELS);
        assert_eq!(config.singularity_epsilon, DEFAULT_SINGULARITY_EPSILON);
    }
}
