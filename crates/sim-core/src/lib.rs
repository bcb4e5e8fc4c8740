pub mod config;
pub mod error;
pub mod path;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use store::{read_json, read_json_opt, write_atomic, write_atomic_json, Store};
