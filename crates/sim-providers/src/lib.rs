pub mod default;
pub mod error;
pub mod retry;
pub mod traits;

pub use default::{EchoLlmClient, InMemoryGraphClient, PlainTextExtractor, RuleBasedOntologyService, UnavailableLlmClient};
pub use error::{Error, Result};
pub use retry::{call_batch_with_retry, call_with_retry, BatchFailure, RetryPolicy};
pub use traits::{EpisodeId, GraphClient, GraphEdge, GraphNode, LlmClient, OntologyService, TextExtractor};
