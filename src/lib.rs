//! Coordination substrate for a multi-agent executive-team assistant.
//!
//! Five cooperating components, built bottom-up: the [`retrieval`] index,
//! the [`bus`], the [`tasks`] manager, the [`delegation`] engine, and the
//! [`coordinator`] façade that ties them together behind a non-blocking
//! `submit`/`poll`/`cancel` surface. Transports (HTTP, chat adapters, CLIs)
//! are external collaborators that call into [`CoreSystem`] — this crate
//! does not embed a server.

pub mod agents;
pub mod bus;
pub mod config;
pub mod coordinator;
pub mod delegation;
pub mod error;
pub mod logging;
pub mod retrieval;
pub mod tasks;
pub mod tokenize;

pub use agents::{Agent, AgentRegistry, Role};
pub use bus::MessageBus;
pub use config::CoreConfig;
pub use coordinator::{GenerationParams, LlmBackend, RequestCoordinator};
pub use delegation::DelegationEngine;
pub use error::{CoreError, CoreResult};
pub use retrieval::{EmbeddingBackend, RetrievalIndex};
pub use tasks::TaskManager;

use std::sync::Arc;

/// Wires the five components together from a [`CoreConfig`] plus the two
/// external collaborators (embedding backend, LLM backend). This is the
/// construction path a transport layer uses to get a working
/// [`RequestCoordinator`].
pub struct CoreSystem {
    pub registry: Arc<AgentRegistry>,
    pub bus: Arc<MessageBus>,
    pub tasks: Arc<TaskManager>,
    pub delegation: Arc<DelegationEngine>,
    pub retrieval: Arc<RetrievalIndex>,
    pub coordinator: RequestCoordinator,
}

impl CoreSystem {
    pub fn new(
        config: &CoreConfig,
        embedding_backend: Arc<dyn EmbeddingBackend>,
        llm_backend: Arc<dyn LlmBackend>,
        persist: bool,
    ) -> CoreResult<Self> {
        let registry = Arc::new(AgentRegistry::new());
        let bus = Arc::new(MessageBus::new(config.message_history_capacity));
        let tasks = Arc::new(TaskManager::new());
        let delegation = Arc::new(DelegationEngine::new(
            registry.clone(),
            tasks.clone(),
            bus.clone(),
            config.delegation_threshold,
            config.max_delegation_depth,
        ));
        let retrieval = Arc::new(RetrievalIndex::new(config, embedding_backend, persist)?);
        let coordinator = RequestCoordinator::new(
            config,
            registry.clone(),
            bus.clone(),
            tasks.clone(),
            delegation.clone(),
            retrieval.clone(),
            llm_backend,
        );

        Ok(Self {
            registry,
            bus,
            tasks,
            delegation,
            retrieval,
            coordinator,
        })
    }

    /// In-process equivalent of the external `health` contract (§6): the
    /// message bus and task manager are in-memory and never degrade on
    /// their own; the retrieval index is the only component that can hit a
    /// persistence `Fatal` error and stay degraded.
    pub fn health(&self) -> HealthReport {
        let retrieval_degraded = self.retrieval.is_degraded();
        let mut components = std::collections::HashMap::new();
        components.insert("message_bus", ComponentStatus::Ok);
        components.insert("task_manager", ComponentStatus::Ok);
        components.insert(
            "retrieval_index",
            if retrieval_degraded {
                ComponentStatus::Degraded
            } else {
                ComponentStatus::Ok
            },
        );
        HealthReport {
            status: if retrieval_degraded {
                ComponentStatus::Degraded
            } else {
                ComponentStatus::Ok
            },
            components,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Ok,
    Degraded,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthReport {
    pub status: ComponentStatus,
    pub components: std::collections::HashMap<&'static str, ComponentStatus>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct NullEmbedder;

    #[async_trait]
    impl EmbeddingBackend for NullEmbedder {
        async fn embed(&self, _text: &str) -> CoreResult<Vec<f32>> {
            Ok(vec![0.0; 8])
        }
    }

    struct NullLlm;

    #[async_trait]
    impl LlmBackend for NullLlm {
        async fn generate(
            &self,
            _role: Role,
            _system_prompt: &str,
            _user_prompt: &str,
            _context_snippets: &[String],
            _params: &GenerationParams,
        ) -> CoreResult<String> {
            Ok("ok".to_string())
        }
    }

    #[test]
    fn fresh_system_reports_ok_health() {
        let mut config = CoreConfig::default();
        config.embedding_dimensions = 8;
        let system = CoreSystem::new(&config, Arc::new(NullEmbedder), Arc::new(NullLlm), false).unwrap();
        let report = system.health();
        assert_eq!(report.status, ComponentStatus::Ok);
        assert_eq!(report.components["retrieval_index"], ComponentStatus::Ok);
    }
}
