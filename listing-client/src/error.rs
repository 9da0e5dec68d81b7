use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The backend answered with `{"error": ...}`; the message is kept verbatim.
    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Text suitable for a toast.
    pub fn message(&self) -> String {
        match self {
            ApiError::Backend { message, .. } => message.clone(),
            ApiError::Transport(_) => "Network error, please check your connection".to_string(),
            ApiError::Decode(_) => "Unexpected response from server".to_string(),
        }
    }
}
