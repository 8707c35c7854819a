//! Resources the reflector consumes from outside its own pipeline.

mod texture;

pub use texture::*;
