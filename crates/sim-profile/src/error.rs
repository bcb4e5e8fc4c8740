use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    Provider(sim_providers::Error),
    Graph(sim_graph::Error),
    Core(sim_core::Error),
    Csv(csv::Error),
    /// No agent is type-compatible with an initial post and none exist at all to fall
    /// back to.
    NoAgentsAvailable,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "io error: {err}"),
            Error::Provider(err) => write!(f, "collaborator error: {err}"),
            Error::Graph(err) => write!(f, "graph error: {err}"),
            Error::Core(err) => write!(f, "storage error: {err}"),
            Error::Csv(err) => write!(f, "csv error: {err}"),
            Error::NoAgentsAvailable => write!(f, "no agents available to assign an initial post to"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Provider(err) => Some(err),
            Error::Graph(err) => Some(err),
            Error::Core(err) => Some(err),
            Error::Csv(err) => Some(err),
            Error::NoAgentsAvailable => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
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

impl From<sim_core::Error> for Error {
    fn from(err: sim_core::Error) -> Self {
        Error::Core(err)
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Csv(err)
    }
}
