pub mod python;
pub mod types;

use anyhow::Result;

pub use types::{EngineDiag, InferIn, InferOut};

/// An inference backend bound to one accelerator for the lifetime of a slot.
pub trait Engine {
    fn diag(&self) -> EngineDiag;
    fn infer(&mut self, req: &InferIn) -> Result<InferOut>;
    /// Frees cached accelerator memory not held by a live request.
    fn release_cache(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Performs the one-time, per-slot initialization of an [`Engine`].
///
/// Called from the slot's own thread, so the engine itself need not be `Send`.
pub trait EngineFactory: Sync {
    type Engine: Engine;

    fn init(&self, device_id: u32) -> Result<Self::Engine>;
}
