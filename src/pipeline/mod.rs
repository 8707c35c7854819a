//! Offscreen reflection pipeline
//!
//! 1. Targets - primary color + depth, optional blurred secondary
//! 2. State - renderer toggles saved and disabled around the pass
//! 3. Blur - two separable passes, primary into secondary

mod blur;
mod state;
mod targets;

pub use blur::{BlurCompositor, BlurParameters, BlurUniform, BLUR_SHADER};
pub use state::RendererStateSnapshot;
pub use targets::{
    ReflectionTargets, RenderTarget, TargetCache, REFLECTION_COLOR_FORMAT,
    REFLECTION_DEPTH_FORMAT,
};

