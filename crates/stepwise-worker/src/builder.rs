//! Wires a [`TaskWorker`] from settings.

use std::sync::Arc;
use stepwise_memory::{EmbeddingProvider, HashingEmbedder, MemoryProvisioner, OpenAiEmbeddings};
use stepwise_queue::TaskBroker;
use stepwise_runtime::{AgentRuntime, ModelProvider, OpenAiProvider, ToolUsingRuntime};
use stepwise_store::SqliteStore;
use stepwise_tools::{BuiltinTools, ToolAssembler, ToolFactoryRegistry, ToolPlugin};
use tracing::info;

use crate::error::WorkerResult;
use crate::invoker::AgentRuntimeInvoker;
use crate::pipeline::StepPipeline;
use crate::scheduler::ExecutionScheduler;
use crate::settings::WorkerSettings;
use crate::worker::TaskWorker;

/// Open the relational store named by the settings, sized for the worker.
pub fn open_store(settings: &WorkerSettings) -> WorkerResult<SqliteStore> {
    Ok(SqliteStore::open(&settings.database_path, settings.worker_pool_size())?)
}

/// Connect to the broker named by the settings.
pub async fn open_scheduler(settings: &WorkerSettings) -> WorkerResult<ExecutionScheduler> {
    // Redelivery waits at least as long as a crashed step's lease
    let broker =
        stepwise_queue::connect(&settings.broker_url, &settings.queue_name, settings.lease_ttl).await?;
    Ok(ExecutionScheduler::new(broker))
}

/// Builds a [`TaskWorker`]; every collaborator not given explicitly is
/// derived from the settings.
pub struct WorkerBuilder {
    settings: WorkerSettings,
    registry: ToolFactoryRegistry,
    store: Option<SqliteStore>,
    broker: Option<Arc<dyn TaskBroker>>,
    runtime: Option<Arc<dyn AgentRuntime>>,
    models: Option<Arc<dyn ModelProvider>>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
}

impl WorkerBuilder {
    pub fn new(settings: WorkerSettings) -> Self {
        let mut registry = ToolFactoryRegistry::new();
        registry.install(&BuiltinTools);
        Self {
            settings,
            registry,
            store: None,
            broker: None,
            runtime: None,
            models: None,
            embedder: None,
        }
    }

    /// Register the tool factories of a plugin.
    pub fn with_plugin(mut self, plugin: &dyn ToolPlugin) -> Self {
        self.registry.install(plugin);
        self
    }

    pub fn with_store(mut self, store: SqliteStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_broker(mut self, broker: Arc<dyn TaskBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn with_runtime(mut self, runtime: Arc<dyn AgentRuntime>) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn with_model_provider(mut self, models: Arc<dyn ModelProvider>) -> Self {
        self.models = Some(models);
        self
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub async fn build(self) -> WorkerResult<TaskWorker> {
        let settings = self.settings;

        let store = match self.store {
            Some(store) => store,
            None => open_store(&settings)?,
        };
        let scheduler = match self.broker {
            Some(broker) => ExecutionScheduler::new(broker),
            None => open_scheduler(&settings).await?,
        };

        let embedder = self.embedder.unwrap_or_else(|| default_embedder(&settings));
        let models = self.models.unwrap_or_else(|| {
            let mut provider = OpenAiProvider::new(settings.openai_api_key.clone());
            if let Some(base_url) = &settings.openai_base_url {
                provider = provider.with_base_url(base_url.as_str());
            }
            Arc::new(provider)
        });
        let runtime = self.runtime.unwrap_or_else(|| Arc::new(ToolUsingRuntime::new()));

        info!(
            database = %settings.database_path.display(),
            tool_factories = self.registry.len(),
            embedder = embedder.name(),
            ltm_default = %settings.memory.default_backend,
            "Worker components ready"
        );

        let pipeline = StepPipeline::new(
            ToolAssembler::new(self.registry, settings.tools.clone()),
            Arc::new(MemoryProvisioner::new(settings.memory.clone(), embedder)),
            AgentRuntimeInvoker::new(runtime, models),
        );

        Ok(TaskWorker::new(store, scheduler, Arc::new(pipeline))
            .with_step_delay(settings.step_delay)
            .with_lease_ttl(settings.lease_ttl))
    }
}

/// OpenAI embeddings when a key is configured, local hashing otherwise.
fn default_embedder(settings: &WorkerSettings) -> Arc<dyn EmbeddingProvider> {
    match &settings.openai_api_key {
        Some(key) => {
            let mut embeddings = OpenAiEmbeddings::new(key.clone(), None);
            if let Some(base_url) = &settings.openai_base_url {
                embeddings = embeddings.with_base_url(base_url.as_str());
            }
            Arc::new(embeddings)
        }
        None => Arc::new(HashingEmbedder::default()),
    }
}
