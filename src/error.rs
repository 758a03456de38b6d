use crate::resp::RespError;

#[derive(Debug, thiserror::Error)]
pub enum RedlogError {
    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArgCount(String),

    #[error("ERR Protocol error: {0}")]
    Protocol(#[from] RespError),

    #[error("append-only log I/O failed: {0}")]
    Aof(#[source] std::io::Error),

    #[error("corrupt append-only log: {0}")]
    CorruptLog(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type RedlogResult<T> = Result<T, RedlogError>;
