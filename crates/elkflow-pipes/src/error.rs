use std::fmt::Write as _;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] elkflow_core::Error),
    #[error("pipes are not connected: {}", describe_breaks(.broken))]
    BrokenPipe { broken: Vec<(usize, usize)> },
    #[error("pipe `{pipe}` failed: {source}")]
    PipeFailure {
        pipe: String,
        #[source]
        source: Box<Error>,
    },
    #[error("run was cancelled")]
    Cancelled,
    #[error("external service error: {message}")]
    Service { message: String },
    #[error("invalid flow pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn service(message: impl Into<String>) -> Self {
        Self::Service {
            message: message.into(),
        }
    }

    /// The innermost error, looking through [`Error::PipeFailure`] wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::PipeFailure { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

fn describe_breaks(broken: &[(usize, usize)]) -> String {
    let mut out = String::new();
    for (i, (from, to)) in broken.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{from} -> {to}");
    }
    out
}
