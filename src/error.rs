//! Error types for the selector and action-readiness core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing selectors, evaluating queries, or
/// driving an action-readiness poll.
#[derive(Error, Debug)]
pub enum Error {
    /// A selector string referenced an engine name not present in the registry.
    #[error("Unknown engine \"{0}\" while parsing selector")]
    UnknownEngine(String),

    /// The selector string is malformed (bad quoting, dangling `>>`, empty part, ...).
    #[error("Malformed selector \"{selector}\": {reason}")]
    MalformedSelector { selector: String, reason: String },

    /// A capture mark (`*`) preceded an `nth` part.
    #[error("\"nth\" engine cannot be used after a capture (`*`) part")]
    NthAfterCapture,

    /// `query_selector(strict=true)` matched more than one distinct element.
    #[error("strict mode violation: \"{selector}\" resolved to {count} elements:\n{previews}")]
    StrictViolation { selector: String, count: usize, previews: String },

    /// A state check or action ran against an element of the wrong kind.
    #[error("{0}")]
    TypeMismatch(String),

    /// `fill` was asked to write into an unfillable input type, or the
    /// supplied value could not be round-tripped through the control.
    #[error("{0}")]
    FillError(String),

    /// `expect` was asked to evaluate an expression not in the supported table.
    #[error("Unknown expect matcher: {0}")]
    UnknownExpectMatcher(String),

    /// The target element is not connected to the document.
    ///
    /// Recovered locally by callers that retry rather than treated as a hard
    /// failure — see `element_state`.
    #[error("Element is not connected")]
    NotConnected,

    /// `element_state(Checked)` was asked of something that is neither a
    /// `checkbox` nor a `radio`.
    ///
    /// Recovered locally, same as `NotConnected`.
    #[error("Not a checkbox or radio button")]
    NotCheckbox,

    /// Custom-engine (`extend`) JS evaluation failed.
    #[error("Custom engine error: {0}")]
    CustomEngineError(String),

    /// Generic error, used for stackless diagnostics (`stackless_error`).
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Builds an [`Error::Other`] carrying no synthesizer-internal stack frames —
/// the closest Rust analogue of suppressing injected-script frame noise,
/// since `thiserror` variants never populate a backtrace to begin with.
pub fn stackless_error(msg: impl Into<String>) -> Error {
    Error::Other(msg.into())
}
