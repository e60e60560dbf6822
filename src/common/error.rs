use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaceLensError {
    #[error("Camera error: {0}")]
    Camera(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Connection error: {0}")]
    Transport(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("{0}")]
    Validation(String),

    #[error("Chart error: {0}")]
    Chart(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// How a failure surfaces to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Camera or local file failure; the session keeps running without it.
    Device,
    /// Network or payload failure; the next tick retries implicitly.
    Transport,
    /// Blocked locally, nothing was sent.
    Validation,
    /// The backend answered but reported a failure.
    Backend,
}

impl FaceLensError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            FaceLensError::Camera(_)
            | FaceLensError::Encode(_)
            | FaceLensError::Image(_)
            | FaceLensError::Chart(_)
            | FaceLensError::Io(_) => ErrorCategory::Device,
            FaceLensError::Validation(_) | FaceLensError::Config(_) => ErrorCategory::Validation,
            FaceLensError::Backend(_) => ErrorCategory::Backend,
            FaceLensError::Transport(_)
            | FaceLensError::Decode(_)
            | FaceLensError::Http(_)
            | FaceLensError::Other(_) => ErrorCategory::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, FaceLensError>;
