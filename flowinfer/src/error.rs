use thiserror::Error;

type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Root cause attached to every failed session call.
///
/// Public functions return `anyhow::Result`; callers that need to branch on
/// the failure kind use `err.downcast_ref::<SessionError>()`.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("requested output `{name}` is not a variable of this graph")]
    UnknownOutputName { name: String },
    #[error("placeholder `{name}` is required but has no input binding")]
    UnboundPlaceholder { name: String },
    #[error("binding for placeholder `{name}` does not match its declaration: {detail}")]
    PlaceholderMismatch { name: String, detail: String },
    #[error("kernel for op `{op}` failed at {context}: {source}")]
    KernelExecutionFailure {
        op: String,
        context: String,
        #[source]
        source: BoxedError,
    },
    #[error("invalid control flow state at `{op}` ({context}): {detail}")]
    InvalidControlFlowState {
        op: String,
        context: String,
        detail: String,
    },
    #[error("invalid graph: {detail}")]
    InvalidGraph { detail: String },
    #[error("session has finished running; construct a new session to run again")]
    SessionFinished,
}

impl SessionError {
    pub(crate) fn invalid_graph(detail: impl Into<String>) -> Self {
        SessionError::InvalidGraph {
            detail: detail.into(),
        }
    }

    pub(crate) fn control_flow(
        op: impl Into<String>,
        context: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        SessionError::InvalidControlFlowState {
            op: op.into(),
            context: context.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn kernel(op: impl Into<String>, context: impl Into<String>, source: anyhow::Error) -> Self {
        SessionError::KernelExecutionFailure {
            op: op.into(),
            context: context.into(),
            source: source.into(),
        }
    }
}
