use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Core(sim_core::Error),
    Provider(sim_providers::Error),
    Graph(sim_graph::Error),
    Profile(sim_profile::Error),
    Json(serde_json::Error),
    NotFound(String),
    InvalidOperation(String),
    Timeout(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Core(err) => write!(f, "storage error: {err}"),
            Error::Provider(err) => write!(f, "collaborator error: {err}"),
            Error::Graph(err) => write!(f, "graph error: {err}"),
            Error::Profile(err) => write!(f, "profile synthesis error: {err}"),
            Error::Json(err) => write!(f, "json error: {err}"),
            Error::NotFound(what) => write!(f, "not found: {what}"),
            Error::InvalidOperation(msg) => write!(f, "invalid operation: {msg}"),
            Error::Timeout(msg) => write!(f, "timed out: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Core(err) => Some(err),
            Error::Provider(err) => Some(err),
            Error::Graph(err) => Some(err),
            Error::Profile(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::NotFound(_) | Error::InvalidOperation(_) | Error::Timeout(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<sim_core::Error> for Error {
    fn from(err: sim_core::Error) -> Self {
        Error::Core(err)
    }
}

impl From<sim_providers::Error> for Error {
    fn from(err: sim_providers::Error) -> Self {
        Error::Provider(err)
    }
}

impl From<sim_graph::Error> for Error {
    fn from(err: sim_graph::Error) -> Self {
        Error::Graph(err)
    }
}

impl From<sim_profile::Error> for Error {
    fn from(err: sim_profile::Error) -> Self {
        Error::Profile(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
