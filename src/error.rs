//! User-facing error kinds for the ingest and query paths.

use crate::extract::ExtractError;

/// Outcome classes surfaced to whoever called the pipeline.
///
/// `EmptyInput`, `IndexUnavailable` and `NoMatch` are expected conditions,
/// not faults: the CLI prints them as notices and the HTTP server maps them
/// to 4xx responses.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("No text found in the uploaded documents.")]
    EmptyInput,

    #[error("No index available. Upload documents before asking questions.")]
    IndexUnavailable,

    #[error("No relevant information found in the uploaded documents.")]
    NoMatch,

    #[error("question must not be empty")]
    EmptyQuery,

    #[error("feedback must not be empty")]
    EmptyFeedback,

    #[error("{0}")]
    Extract(#[from] ExtractError),

    #[error("external service failed: {0}")]
    ExternalService(String),

    #[error("unexpected error: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

impl PipelineError {
    /// Machine-readable code used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::EmptyInput => "empty_input",
            PipelineError::IndexUnavailable => "index_unavailable",
            PipelineError::NoMatch => "no_match",
            PipelineError::EmptyQuery => "empty_query",
            PipelineError::EmptyFeedback => "empty_feedback",
            PipelineError::Extract(_) => "extract_failed",
            PipelineError::ExternalService(_) => "external_service",
            PipelineError::Unexpected(_) => "internal",
        }
    }

    /// Whether this is an expected, user-visible condition rather than a fault.
    pub fn is_notice(&self) -> bool {
        matches!(
            self,
            PipelineError::EmptyInput | PipelineError::IndexUnavailable | PipelineError::NoMatch
        )
    }

    pub(crate) fn external(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        tracing::warn!(error = %message, "external service call failed");
        PipelineError::ExternalService(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notices_are_distinguished_from_faults() {
        assert!(PipelineError::NoMatch.is_notice());
        assert!(PipelineError::IndexUnavailable.is_notice());
        assert!(!PipelineError::ExternalService("quota".into()).is_notice());
        assert!(!PipelineError::Unexpected(anyhow::anyhow!("disk")).is_notice());
    }

    #[test]
    fn external_keeps_underlying_message() {
        let err = PipelineError::external(anyhow::anyhow!("OpenAI API error 429: slow down"));
        assert_eq!(err.code(), "external_service");
        assert!(err.to_string().contains("429: slow down"));
    }
}
