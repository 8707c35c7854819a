//! Reflector configuration
//!
//! Options deserialize from TOML with every field optional:
//!
//! ```toml
//! resolution = 512
//! blur = [300, 100]
//! mix_blur = 0.8
//! depth_scale = 1.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReflectorError, ReflectorResult};
use crate::pipeline::BlurParameters;

/// Blur radius as one value for both axes or a `[width, height]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlurSize {
    Uniform(f32),
    Pair([f32; 2]),
}

impl Default for BlurSize {
    fn default() -> Self {
        BlurSize::Uniform(0.0)
    }
}

impl BlurSize {
    /// `[width, height]`
    pub fn normalized(&self) -> [f32; 2] {
        match *self {
            BlurSize::Uniform(radius) => [radius, radius],
            BlurSize::Pair(pair) => pair,
        }
    }
}

/// Everything a reflector can be configured with.
///
/// `mix_*`, `mirror` and `distortion` are not interpreted by the reflector;
/// they are handed to the surface shader through
/// [`crate::ReflectorUniforms`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectorOptions {
    /// Edge length of the square reflection targets
    pub resolution: u32,
    pub mix_blur: f32,
    pub mix_strength: f32,
    pub mix_contrast: f32,
    pub blur: BlurSize,
    /// Blend between the surface color and the reflection, `[0, 1]`
    pub mirror: f32,
    pub min_depth_threshold: f32,
    pub max_depth_threshold: f32,
    pub depth_scale: f32,
    pub depth_to_blur_ratio_bias: f32,
    pub distortion: f32,
    /// Plane offset along the surface normal
    pub reflector_offset: f32,
}

impl Default for ReflectorOptions {
    fn default() -> Self {
        Self {
            resolution: 256,
            mix_blur: 0.0,
            mix_strength: 1.0,
            mix_contrast: 1.0,
            blur: BlurSize::default(),
            mirror: 0.0,
            min_depth_threshold: 0.9,
            max_depth_threshold: 1.0,
            depth_scale: 0.0,
            depth_to_blur_ratio_bias: 0.25,
            distortion: 1.0,
            reflector_offset: 0.0,
        }
    }
}

impl ReflectorOptions {
    /// Parse options from TOML text and validate them.
    pub fn from_toml_str(text: &str) -> ReflectorResult<Self> {
        let options: Self = toml::from_str(text)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ReflectorResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ReflectorError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let options = Self::from_toml_str(&content)?;
        log::info!("Loaded reflector options from {}", path.display());
        Ok(options)
    }

    /// Check the invariants the pipeline relies on. The device-dependent
    /// resolution limit is checked when targets are allocated.
    pub fn validate(&self) -> ReflectorResult<()> {
        if self.resolution == 0 {
            return Err(ReflectorError::InvalidResolution {
                resolution: 0,
                max: u32::MAX,
            });
        }

        let [width, height] = self.blur.normalized();
        if !(width.is_finite() && height.is_finite()) || width < 0.0 || height < 0.0 {
            return Err(ReflectorError::InvalidBlur { width, height });
        }

        let (min, max) = (self.min_depth_threshold, self.max_depth_threshold);
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(ReflectorError::InvalidDepthThresholds { min, max });
        }

        if !(0.0..=1.0).contains(&self.mirror) {
            return Err(ReflectorError::InvalidMirror(self.mirror));
        }

        Ok(())
    }

    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_blur(mut self, blur: impl Into<BlurSize>) -> Self {
        self.blur = blur.into();
        self
    }

    pub fn with_depth_scale(mut self, depth_scale: f32) -> Self {
        self.depth_scale = depth_scale;
        self
    }

    pub fn with_depth_thresholds(mut self, min: f32, max: f32) -> Self {
        self.min_depth_threshold = min;
        self.max_depth_threshold = max;
        self
    }

    pub fn with_mirror(mut self, mirror: f32) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn with_mix(mut self, blur: f32, strength: f32, contrast: f32) -> Self {
        self.mix_blur = blur;
        self.mix_strength = strength;
        self.mix_contrast = contrast;
        self
    }

    pub fn with_reflector_offset(mut self, offset: f32) -> Self {
        self.reflector_offset = offset;
        self
    }

    pub fn blur_parameters(&self) -> BlurParameters {
        let [width, height] = self.blur.normalized();
        BlurParameters {
            width,
            height,
            min_depth_threshold: self.min_depth_threshold,
            max_depth_threshold: self.max_depth_threshold,
            depth_scale: self.depth_scale,
            depth_to_blur_ratio_bias: self.depth_to_blur_ratio_bias,
        }
    }

    pub fn has_blur(&self) -> bool {
        self.blur_parameters().is_active()
    }
}

impl From<f32> for BlurSize {
    fn from(radius: f32) -> Self {
        BlurSize::Uniform(radius)
    }
}

impl From<[f32; 2]> for BlurSize {
    fn from(pair: [f32; 2]) -> Self {
        BlurSize::Pair(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ReflectorOptions::default();
        assert_eq!(options.resolution, 256);
        assert_eq!(options.blur.normalized(), [0.0, 0.0]);
        assert_eq!(options.min_depth_threshold, 0.9);
        assert_eq!(options.max_depth_threshold, 1.0);
        assert_eq!(options.depth_to_blur_ratio_bias, 0.25);
        assert!(!options.has_blur());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let options = ReflectorOptions::from_toml_str(
            r#"
            resolution = 512
            blur = [300.0, 100.0]
            mix_blur = 0.8
            "#,
        )
        .unwrap();
        assert_eq!(options.resolution, 512);
        assert_eq!(options.blur, BlurSize::Pair([300.0, 100.0]));
        assert_eq!(options.mix_blur, 0.8);
        assert_eq!(options.mix_strength, 1.0);
        assert!(options.has_blur());
    }

    #[test]
    fn test_scalar_blur() {
        let options = ReflectorOptions::from_toml_str("blur = 4.0").unwrap();
        assert_eq!(options.blur.normalized(), [4.0, 4.0]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ReflectorOptions::default().with_resolution(0).validate(),
            Err(ReflectorError::InvalidResolution { .. })
        ));
        assert!(matches!(
            ReflectorOptions::default().with_blur([-1.0, 2.0]).validate(),
            Err(ReflectorError::InvalidBlur { .. })
        ));
        assert!(matches!(
            ReflectorOptions::default()
                .with_depth_thresholds(0.95, 0.5)
                .validate(),
            Err(ReflectorError::InvalidDepthThresholds { .. })
        ));
        assert!(matches!(
            ReflectorOptions::default().with_mirror(1.5).validate(),
            Err(ReflectorError::InvalidMirror(_))
        ));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        assert!(matches!(
            ReflectorOptions::from_toml_str("resolution = \"big\""),
            Err(ReflectorError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = ReflectorOptions::load("does/not/exist.toml").unwrap_err();
        assert!(err.to_string().contains("does/not/exist.toml"));
    }
}
