use anyhow::Result;

use crate::geometry::RenderPrimitive;

/// Requests raised by the host window between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// Window closed or the user asked to quit.
    Quit,
    /// Reload the stored configuration and restart the pipeline.
    ReloadConfig,
}

/// Render target driven by the frame loop. Every cycle calls
/// `clear`, then `insert` once per primitive, then `render`.
pub trait Scene {
    fn clear(&mut self);
    fn insert(&mut self, primitive: RenderPrimitive);
    fn render(&mut self) -> Result<()>;

    fn is_open(&self) -> bool {
        true
    }

    fn poll_event(&mut self) -> Option<HostEvent> {
        None
    }
}
