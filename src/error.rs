//! Reflector error types.
//!
//! Frames that cannot render (no parent, plane facing away) are not errors;
//! they are reported through [`crate::ReflectionOutcome`]. Errors here are
//! configuration mistakes and resource failures the caller must handle.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;

/// Errors returned by the reflector.
#[derive(Error, Debug)]
pub enum ReflectorError {
    /// Resolution is zero or larger than the device allows.
    #[error("invalid reflection resolution {resolution} (must be 1..={max})")]
    InvalidResolution { resolution: u32, max: u32 },
    /// `min_depth_threshold` is above `max_depth_threshold`, or one is not finite.
    #[error("invalid depth thresholds: min {min} must not exceed max {max}")]
    InvalidDepthThresholds { min: f32, max: f32 },
    /// Negative or non-finite blur radius.
    #[error("invalid blur size {width}x{height}")]
    InvalidBlur { width: f32, height: f32 },
    /// Mirror blend weight outside `[0, 1]`.
    #[error("mirror weight {0} is outside [0, 1]")]
    InvalidMirror(f32),
    /// The render context failed to allocate or build something.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    /// Options file did not parse.
    #[error("failed to parse reflector options: {0}")]
    Config(#[from] toml::de::Error),
    /// Options or texture file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Distortion map could not be decoded.
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
}

pub type ReflectorResult<T> = Result<T, ReflectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ReflectorError::InvalidResolution {
            resolution: 0,
            max: 8192,
        };
        assert_eq!(
            err.to_string(),
            "invalid reflection resolution 0 (must be 1..=8192)"
        );

        let err = ReflectorError::from(BackendError::OutOfMemory);
        assert_eq!(err.to_string(), "backend error: Out of memory");
    }

    #[test]
    fn test_io_error_names_path() {
        let err = ReflectorError::Io {
            path: PathBuf::from("reflector.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert_eq!(err.to_string(), "failed to read reflector.toml: missing");
    }
}
