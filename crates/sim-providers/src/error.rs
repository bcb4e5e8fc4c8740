use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// A collaborator call failed and would not succeed on retry (bad request, auth
    /// failure, validation error from the backend).
    Collaborator(String),
    /// `CallWithRetry` exhausted `max_retries` attempts; carries the last failure's
    /// message.
    RetriesExhausted { attempts: u32, last_error: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {err}"),
            Error::Json(err) => write!(f, "JSON error: {err}"),
            Error::Collaborator(msg) => write!(f, "collaborator error: {msg}"),
            Error::RetriesExhausted {
                attempts,
                last_error,
            } => write!(f, "exhausted {attempts} retries, last error: {last_error}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Collaborator(_) | Error::RetriesExhausted { .. } => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
