//! Graphics backend abstraction layer

pub mod dummy;
pub mod traits;
pub mod types;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use dummy::{DummyBackend, DummyCommand};
pub use traits::*;
pub use types::*;
