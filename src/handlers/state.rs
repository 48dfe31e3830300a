//! Application state

use crate::config::Config;
use crate::graph::CallerGraphResolver;
use crate::indexer::pipeline::IndexPipeline;
use crate::storage::sqlite::RecordStore;
use crate::tools::XrefTool;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<RecordStore>,
    pub tool: Arc<dyn XrefTool>,
    pub indexer: IndexPipeline,
    pub resolver: Arc<Mutex<CallerGraphResolver>>,
}

impl AppState {
    /// Opens the record store at `config.db_path` and wires every component
    /// to `tool`.
    pub fn new(config: Config, tool: Arc<dyn XrefTool>) -> Result<Self> {
        let store = Arc::new(RecordStore::open(&config.db_path)?);
        Ok(Self::with_store(config, store, tool))
    }

    pub fn with_store(config: Config, store: Arc<RecordStore>, tool: Arc<dyn XrefTool>) -> Self {
        let config = Arc::new(config);
        let indexer = IndexPipeline::new(config.clone(), store.clone(), tool.clone());
        let resolver = Arc::new(Mutex::new(CallerGraphResolver::new(tool.clone())));
        Self {
            config,
            store,
            tool,
            indexer,
            resolver,
        }
    }
}
