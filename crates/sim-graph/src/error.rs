use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    Provider(sim_providers::Error),
    /// A chunk's episode ingestion exhausted retries. Fails the whole task unless
    /// `PartialFailurePolicy::KeepPartial` is selected.
    IngestionFailed {
        graph_id: String,
        chunk_index: usize,
        source: String,
    },
    /// Global episode-processing timeout elapsed.
    ProcessingTimeout { graph_id: String },
    /// `FilterDefined` with zero matching entities.
    NoEntities,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Provider(err) => write!(f, "collaborator error: {err}"),
            Error::IngestionFailed {
                graph_id,
                chunk_index,
                source,
            } => write!(
                f,
                "ingestion of chunk {chunk_index} into graph {graph_id} failed: {source}"
            ),
            Error::ProcessingTimeout { graph_id } => {
                write!(f, "timed out waiting for graph {graph_id} to finish processing")
            }
            Error::NoEntities => write!(f, "no entities matched the requested types"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Provider(err) => Some(err),
            _ => None,
        }
    }
}

impl From<sim_providers::Error> for Error {
    fn from(err: sim_providers::Error) -> Self {
        Error::Provider(err)
    }
}
