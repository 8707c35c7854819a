//! Scene-side collaborators: cameras, transforms and the host seam

mod camera;
mod ecs;
mod host;
mod transform;

pub use camera::*;
pub use ecs::*;
pub use host::*;
pub use transform::*;
