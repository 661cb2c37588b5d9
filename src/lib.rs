pub mod cli;
pub mod config;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod flat;
pub mod guard;
pub mod index;
pub mod ingest;
pub mod ivf;
pub mod kmeans;
pub mod knn;
mod metrics;
pub mod prefs;
pub mod sampler;
mod server;
pub mod store;
pub mod utils;

pub use config::Opts;
pub use engine::{SearchEngine, SearchEngineBuilder, SearchRequest};
pub use error::{Error, Result};
