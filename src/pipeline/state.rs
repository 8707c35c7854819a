//! Renderer toggles around an offscreen pass

use crate::backend::{GraphicsBackend, RendererGlobals};

/// Renderer globals as they were before an offscreen pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "the snapshot must be restored after the pass"]
pub struct RendererStateSnapshot {
    saved: RendererGlobals,
}

impl RendererStateSnapshot {
    /// Save the current globals, then turn off XR presentation and shadow
    /// map auto-update for the offscreen pass. `auto_clear` is left alone.
    pub fn capture_and_disable<B: GraphicsBackend>(backend: &mut B) -> Self {
        let saved = backend.globals();
        backend.set_globals(RendererGlobals {
            xr_enabled: false,
            shadow_auto_update: false,
            ..saved
        });
        Self { saved }
    }

    pub fn saved(&self) -> RendererGlobals {
        self.saved
    }

    /// Put back exactly what was captured.
    pub fn restore<B: GraphicsBackend>(self, backend: &mut B) {
        backend.set_globals(self.saved);
    }
}
