//! Error types for the prodscribe pipeline.
//!
//! Every stage reports failures through [`PipelineError`]. Whether a
//! [`PipelineError::GenerationFailed`] ends the run or becomes a skipped
//! product is decided by the orchestrator's
//! [`FailurePolicy`](crate::pipeline::FailurePolicy), never by the stage.

use std::path::PathBuf;

use thiserror::Error;

use crate::models::PromptRole;
use crate::pipeline::PipelineState;

/// All errors surfaced by the pipeline stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The input file does not exist.
    #[error("Input file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// The input file cannot be read or does not have the expected shape.
    #[error("Malformed input '{path}': {detail}")]
    InputMalformed { path: PathBuf, detail: String },

    /// A completion call for one product failed (network, API or timeout).
    #[error("{stage} generation failed for '{product}': {reason}")]
    GenerationFailed {
        product: String,
        stage: PromptRole,
        reason: String,
    },

    /// The template document could not be loaded.
    #[error("Template not usable: '{path}': {detail}")]
    TemplateMissing { path: PathBuf, detail: String },

    /// Binding data into the template failed.
    #[error("Rendering failed: {detail}")]
    RenderFailed { detail: String },

    /// The rendered document could not be written.
    #[error("Failed to write output file '{path}': {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration rejected before any work starts.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The orchestrator was asked for a step its current state does not allow.
    #[error("Illegal pipeline transition {from:?} -> {to:?}")]
    IllegalTransition {
        from: PipelineState,
        to: PipelineState,
    },
}

impl PipelineError {
    /// True for errors a retry might fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, PipelineError::GenerationFailed { .. })
    }
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_failed_display_names_product_and_stage() {
        let e = PipelineError::GenerationFailed {
            product: "Widget".into(),
            stage: PromptRole::Content,
            reason: "HTTP 500".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Widget"), "got: {msg}");
        assert!(msg.contains("content"), "got: {msg}");
        assert!(msg.contains("HTTP 500"), "got: {msg}");
    }

    #[test]
    fn only_generation_errors_are_transient() {
        let gen_err = PipelineError::GenerationFailed {
            product: "a".into(),
            stage: PromptRole::Description,
            reason: "timeout".into(),
        };
        assert!(gen_err.is_transient());

        let render_err = PipelineError::RenderFailed {
            detail: "unclosed tag".into(),
        };
        assert!(!render_err.is_transient());
    }
}
