use thiserror::Error;

#[derive(Debug, Error)]
pub enum CozeError {
    #[error("Coze configuration error: {0}")]
    Config(String),

    #[error("Coze transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Coze API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Coze stream error: {0}")]
    Remote(String),

    #[error("Coze stream ended without usable content")]
    EmptyResult,
}

pub type Result<T> = std::result::Result<T, CozeError>;
