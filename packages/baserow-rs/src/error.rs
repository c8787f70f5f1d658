use thiserror::Error;

pub type Result<T> = std::result::Result<T, BaserowError>;

#[derive(Error, Debug)]
pub enum BaserowError {
    #[error("Baserow login failed ({status}): {message}")]
    Login { status: u16, message: String },

    #[error("Baserow login response did not include a token")]
    MissingToken,

    #[error("Baserow API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Baserow rejected credentials after refresh")]
    Unauthorized,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl BaserowError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BaserowError::Login { status, .. } | BaserowError::Api { status, .. } => Some(*status),
            BaserowError::Unauthorized => Some(401),
            BaserowError::Http(e) => e.status().map(|s| s.as_u16()),
            BaserowError::MissingToken => None,
        }
    }
}
