//! Optional text-generation collaborator
//!
//! Only used for human-readable prose. Every caller keeps a deterministic
//! fallback, so a missing or failing generator never changes scores or
//! selections.

use crate::error::NarrativeError;

/// Produces analysis prose from a prompt
#[async_trait::async_trait]
pub trait NarrativeGenerator: Send + Sync {
    /// Generate text for `prompt`
    ///
    /// # Errors
    /// `NarrativeError` when the generator is unavailable or fails; callers
    /// substitute template text.
    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError>;
}
