use lexio_coze::CozeError;
use lexio_persist::PersistError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LearnError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("会话不存在")]
    ChatNotFound,

    #[error("会话已结束，请开启新对话")]
    ChatCompleted,

    #[error("每次对话最多持续{0}轮")]
    RoundCapReached(u32),

    #[error("短文不存在")]
    StoryNotFound,

    #[error(transparent)]
    Gateway(#[from] CozeError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Coarse classification the HTTP layer maps to status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    Config,
    Upstream,
    Internal,
}

impl LearnError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LearnError::InvalidInput(_)
            | LearnError::ChatCompleted
            | LearnError::RoundCapReached(_) => ErrorKind::BadRequest,
            LearnError::ChatNotFound | LearnError::StoryNotFound => ErrorKind::NotFound,
            LearnError::Gateway(CozeError::Config(_)) => ErrorKind::Config,
            LearnError::Gateway(_) => ErrorKind::Upstream,
            LearnError::Persist(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, LearnError>;
