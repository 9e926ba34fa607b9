/// Result alias that carries the custom [`SceneError`] type.
pub type Result<T> = std::result::Result<T, SceneError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    /// Free-form failure raised by a subsystem that has no dedicated variant.
    #[error("{0}")]
    Message(String),
    /// The source locator of a media item could not be resolved into tracks.
    #[error("cannot resolve `{source_ref}`: {reason}")]
    Resolve { source_ref: String, reason: String },
    /// The pipeline engine refused a request.
    #[error("engine: {0}")]
    Engine(String),
    /// The scene is not accepting new items or events.
    #[error("scene is not live")]
    SceneNotLive,
    /// A shared lock was poisoned by a panicking thread.
    #[error("{0} lock has been poisoned")]
    Poisoned(&'static str),
    /// Configuration values failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around configuration parse errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl SceneError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Creates an engine failure from any printable reason.
    pub fn engine<T: Into<String>>(reason: T) -> Self {
        Self::Engine(reason.into())
    }

    pub fn resolve(source_ref: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Resolve {
            source_ref: source_ref.into(),
            reason: reason.into(),
        }
    }
}

impl From<&str> for SceneError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for SceneError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
