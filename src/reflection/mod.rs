//! Planar reflection math
//!
//! Per frame: sample the plane from the surface transform, mirror the
//! viewer across it, bend the mirrored projection's near plane onto the
//! plane and build the matrix the surface shader projects with.

mod mirror;
pub mod oblique;
mod plane;
mod texture_matrix;

pub use mirror::MirrorPose;
pub use oblique::{apply_oblique_near_plane, view_space_clip_plane};
pub use plane::{reflect, ReflectorPlane};
pub use texture_matrix::{texture_matrix, TEXTURE_BIAS};
