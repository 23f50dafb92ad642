use thiserror::Error;

/// Failure classes surfaced by the client. `Config`, `Validation` and
/// `Policy` are raised before any network I/O; `Api` and `Network` come out
/// of the transport after the retry budget is spent.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Policy(String),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn validation(msg: impl Into<String>) -> Error {
    Error::Validation(msg.into())
}
