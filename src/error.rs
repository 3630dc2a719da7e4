use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds raised by content service calls and migration phases.
#[derive(Debug, Error)]
pub enum Error {
    /// The remote side rejected an operation, or the operation could not be
    /// attempted for a known reason.
    #[error("{0}")]
    Domain(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("skip signaled: {0}")]
    Skip(String),

    /// Stops the run like [`Error::Unrecoverable`].
    #[error("terminate signaled: {0}")]
    Terminate(String),

    /// The rest of the run cannot proceed (the model no longer reconciles).
    #[error("unrecoverable: {0}")]
    Unrecoverable(String),

    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl Error {
    pub fn domain(message: impl Into<String>) -> Self {
        Self::Domain(message.into())
    }

    /// Whether this failure must abort the whole run instead of being
    /// recorded against a single entity.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Terminate(_) | Self::Unrecoverable(_))
    }

    /// Whether this failure is one the tool expects to see in normal
    /// operation. Anything else is logged with its full chain.
    #[must_use]
    pub fn is_expected(&self) -> bool {
        !matches!(self, Self::Unexpected(_))
    }
}
