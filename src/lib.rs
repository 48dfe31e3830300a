pub mod cli;
pub mod config;
pub mod errors;
pub mod graph;
pub mod handlers;
pub mod indexer;
pub mod logging;
pub mod navigate;
pub mod retrieval;
pub mod storage;
pub mod text;
pub mod tools;

pub use config::Config;
pub use graph::{CallerEntry, CallerGraphResolver};
pub use handlers::AppState;
pub use retrieval::{SearchHit, SearchSession};
pub use storage::sqlite::RecordStore;
