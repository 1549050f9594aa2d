//! Rich diagnostic error types for the khipu engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes, help text, and source chains so users know exactly what
//! went wrong and how to fix it.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the khipu engine.
///
/// Each variant wraps a subsystem-specific error, preserving the full diagnostic
/// chain (error codes, help text, source spans) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum KhipuError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Reference(#[from] ReferenceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Infer(#[from] InferError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Export(#[from] ExportError),
}

// ---------------------------------------------------------------------------
// Reference errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ReferenceError {
    #[error("malformed CURIE: {input:?} ({reason})")]
    #[diagnostic(
        code(khipu::reference::malformed_curie),
        help(
            "A compact identifier has the form `prefix:identifier` with both \
             sides non-empty and no whitespace, e.g. `mesh:C562966`. \
             Check the offending value in your input data."
        )
    )]
    MalformedCurie { input: String, reason: String },

    #[error("reference ID space exhausted: cannot intern more than u32::MAX references")]
    #[diagnostic(
        code(khipu::reference::exhausted),
        help(
            "The interner holds over four billion distinct references. \
             If you see this error, the input is almost certainly degenerate; \
             check for identifier columns being mis-parsed as unique strings."
        )
    )]
    Exhausted,
}

// ---------------------------------------------------------------------------
// Mapping errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum MappingError {
    #[error("self-mapping rejected: subject and object are both reference {reference}")]
    #[diagnostic(
        code(khipu::mapping::self_mapping),
        help(
            "A mapping must relate two distinct references. Self-mappings carry \
             no information and are never constructed; drop the row upstream."
        )
    )]
    SelfMapping { reference: u32 },

    #[error("mapping ({subject}, {predicate}, {object}) has no evidence")]
    #[diagnostic(
        code(khipu::mapping::empty_evidence),
        help(
            "Every mapping carries at least one evidence record justifying it. \
             Attach a simple evidence (e.g. a mapping-set row) before inserting."
        )
    )]
    EmptyEvidence {
        subject: u32,
        predicate: u32,
        object: u32,
    },
}

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    #[error("source {kind:?} unavailable: {message}")]
    #[diagnostic(
        code(khipu::source::unavailable),
        help(
            "The source adapter reported a transient failure (network, cache miss, \
             missing file). The pipeline can be configured to skip unavailable \
             sources with `skip_unavailable_sources = true`."
        )
    )]
    Unavailable { kind: String, message: String },

    #[error("source {kind:?} produced malformed data: {message}")]
    #[diagnostic(
        code(khipu::source::malformed),
        help(
            "The adapter handed over data the core could not accept. This is not \
             recoverable; fix the adapter or the upstream resource."
        )
    )]
    Malformed { kind: String, message: String },

    #[error("no adapter registered for source kind {kind:?}")]
    #[diagnostic(
        code(khipu::source::unknown_kind),
        help(
            "Register an adapter for this `source_kind` on the SourceRegistry \
             before running the pipeline, or remove the input from the \
             configuration."
        )
    )]
    UnknownKind { kind: String },
}

// ---------------------------------------------------------------------------
// Inference errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum InferError {
    #[error("inference cancelled")]
    #[diagnostic(
        code(khipu::infer::cancelled),
        help(
            "The cancellation token was triggered mid-round. Previously \
             materialized artifacts remain valid; the current stage was discarded."
        )
    )]
    Cancelled,
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("invalid configuration: {message}")]
    #[diagnostic(
        code(khipu::pipeline::invalid_config),
        help("The configuration document failed validation before any stage ran. {message}")
    )]
    InvalidConfiguration { message: String },

    #[error("pipeline cancelled at stage {stage:?}")]
    #[diagnostic(
        code(khipu::pipeline::cancelled),
        help(
            "The cancellation token was triggered at a stage boundary. Artifacts \
             from completed stages remain valid."
        )
    )]
    Cancelled { stage: String },

    #[error("artifact sink error: {message}")]
    #[diagnostic(
        code(khipu::pipeline::sink),
        help("A serializer rejected a materialized artifact. Check the sink's destination.")
    )]
    Sink { message: String },
}

// ---------------------------------------------------------------------------
// Export errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ExportError {
    #[error("serialization error: {message}")]
    #[diagnostic(
        code(khipu::export::serialize),
        help(
            "A record could not be serialized. This usually means a float field \
             held a non-finite value; check evidence confidences."
        )
    )]
    Serialize { message: String },

    #[error("I/O error: {source}")]
    #[diagnostic(
        code(khipu::export::io),
        help("A write to the output stream failed. Check the destination and disk space.")
    )]
    Io {
        #[source]
        source: std::io::Error,
    },

    #[error("archive stream is not well-formed at line {line}: {message}")]
    #[diagnostic(
        code(khipu::export::archive),
        help(
            "Each archive line must be a complete JSON mapping record. A parent \
             referenced by hash must have been emitted earlier in the stream."
        )
    )]
    Archive { line: usize, message: String },
}

/// Convenience alias for functions returning khipu results.
pub type KhipuResult<T> = std::result::Result<T, KhipuError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_error_converts_to_khipu_error() {
        let err = ReferenceError::MalformedCurie {
            input: "nocolon".into(),
            reason: "missing ':'".into(),
        };
        let top: KhipuError = err.into();
        assert!(matches!(
            top,
            KhipuError::Reference(ReferenceError::MalformedCurie { .. })
        ));
    }

    #[test]
    fn source_error_converts_to_khipu_error() {
        let err = SourceError::UnknownKind { kind: "sssom".into() };
        let top: KhipuError = err.into();
        assert!(matches!(top, KhipuError::Source(SourceError::UnknownKind { .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = ReferenceError::MalformedCurie {
            input: "a b:c".into(),
            reason: "whitespace in prefix".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("a b:c"));
        assert!(msg.contains("whitespace"));
    }

    #[test]
    fn cancelled_carries_stage_name() {
        let err = PipelineError::Cancelled { stage: "infer".into() };
        assert!(format!("{err}").contains("infer"));
    }
}
