/// Failures that can arise inside the sandbox's module graph. Never an
/// HTTP concern (policy violations aren't wire errors), kept entirely
/// separate from `honeycomb_common::HoneycombError`.
#[derive(thiserror::Error, Debug, Clone)]
pub enum SandboxError {
    #[error("module '{0}' is still under construction (re-entrant access detected)")]
    ReentrantConstruction(String),

    #[error("module '{module}' is not authorized to access '{target}'")]
    PolicyViolation { module: String, target: String },

    #[error("no module named '{0}' is registered")]
    NotFound(String),

    #[error("constructor for module '{0}' failed: {1}")]
    ConstructionFailed(String, String),
}
