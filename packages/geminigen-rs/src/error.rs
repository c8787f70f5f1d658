use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeminiGenError>;

#[derive(Error, Debug)]
pub enum GeminiGenError {
    #[error("GeminiGen API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("GeminiGen response did not include a generation uuid")]
    MissingUuid,

    #[error("GeminiGen reported completion without a video url")]
    MissingMediaUrl,

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}
