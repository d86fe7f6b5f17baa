//! Non-blocking façade: `submit` kicks off delegation + retrieval + an LLM
//! call on a bounded worker pool; `poll` reads back the current state by
//! message id; `cancel` races a still-running job to an `Error` terminal
//! state.

pub mod llm;
pub mod worker;

pub use llm::{GenerationParams, LlmBackend};

use crate::agents::{roles::build_role_prompt, AgentRegistry};
use crate::bus::MessageBus;
use crate::config::CoreConfig;
use crate::delegation::DelegationEngine;
use crate::error::{CoreError, CoreResult};
use crate::logging::log_warn;
use crate::retrieval::RetrievalIndex;
use crate::tasks::TaskManager;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::RwLock;
use tokio::sync::Semaphore;
use uuid::Uuid;

const DEFAULT_KB_LIMIT: usize = 4;
const DEFAULT_SEMANTIC_WEIGHT: f64 = 0.7;
const DEFAULT_KEYWORD_WEIGHT: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PendingStatus {
    Generating,
    Complete,
    Error,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PendingRequest {
    pub message_id: Uuid,
    pub user_text: String,
    pub target_role: Option<String>,
    pub assigned_agent_id: String,
    pub status: PendingStatus,
    pub response_text: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

struct Inner {
    registry: Arc<AgentRegistry>,
    bus: Arc<MessageBus>,
    tasks: Arc<TaskManager>,
    delegation: Arc<DelegationEngine>,
    retrieval: Arc<RetrievalIndex>,
    llm_backend: Arc<dyn LlmBackend>,
    pending: RwLock<HashMap<Uuid, PendingRequest>>,
    message_tasks: RwLock<HashMap<Uuid, Uuid>>,
    semaphore: Arc<Semaphore>,
    llm_timeout: std::time::Duration,
}

#[derive(Clone)]
pub struct RequestCoordinator {
    inner: Arc<Inner>,
}

impl RequestCoordinator {
    pub fn new(
        config: &CoreConfig,
        registry: Arc<AgentRegistry>,
        bus: Arc<MessageBus>,
        tasks: Arc<TaskManager>,
        delegation: Arc<DelegationEngine>,
        retrieval: Arc<RetrievalIndex>,
        llm_backend: Arc<dyn LlmBackend>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                bus,
                tasks,
                delegation,
                retrieval,
                llm_backend,
                pending: RwLock::new(HashMap::new()),
                message_tasks: RwLock::new(HashMap::new()),
                semaphore: Arc::new(Semaphore::new(config.worker_pool_size.max(1))),
                llm_timeout: config.llm_request_timeout,
            }),
        }
    }

    /// Non-blocking: resolves the assignee, records a `Generating` pending
    /// request, and hands the LLM call to the worker pool. Returns
    /// immediately with the message id used to `poll` later.
    pub async fn submit(
        &self,
        message_text: impl Into<String>,
        role_hint: Option<String>,
        use_kb: bool,
        params: GenerationParams,
    ) -> CoreResult<Uuid> {
        let message_text = message_text.into();
        let delegation = self
            .inner
            .delegation
            .delegate(&message_text, role_hint.as_deref(), "user")?;
        let assignee = self.inner.registry.id_for_role(delegation.role)?;
        let message_id = Uuid::new_v4();

        let pending = PendingRequest {
            message_id,
            user_text: message_text.clone(),
            target_role: role_hint,
            assigned_agent_id: assignee.clone(),
            status: PendingStatus::Generating,
            response_text: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.inner.pending.write().unwrap().insert(message_id, pending);
        let task_id = delegation.task.id;
        self.inner.message_tasks.write().unwrap().insert(message_id, task_id);
        let _ = self
            .inner
            .tasks
            .update_status(task_id, crate::tasks::TaskStatus::InProgress, None, None);

        let inner = self.inner.clone();
        let role = delegation.role;
        tokio::spawn(async move {
            let _permit = inner.semaphore.clone().acquire_owned().await;
            let outcome = run_generation(&inner, role, &message_text, use_kb, &params).await;
            finalize(&inner, message_id, task_id, outcome);
        });

        Ok(message_id)
    }

    pub fn poll(&self, message_id: Uuid) -> CoreResult<PendingRequest> {
        self.inner
            .pending
            .read()
            .unwrap()
            .get(&message_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("pending_request", message_id.to_string()))
    }

    /// Transitions a still-`Generating` request to `Error("cancelled")`.
    /// A no-op if the request already reached a terminal state.
    pub fn cancel(&self, message_id: Uuid) -> CoreResult<()> {
        let mut pending = self.inner.pending.write().unwrap();
        let request = pending
            .get_mut(&message_id)
            .ok_or_else(|| CoreError::not_found("pending_request", message_id.to_string()))?;
        let was_generating = request.status == PendingStatus::Generating;
        if was_generating {
            request.status = PendingStatus::Error;
            request.error = Some("cancelled".to_string());
            request.completed_at = Some(Utc::now());
        }
        drop(pending);
        if was_generating && let Some(task_id) = self.inner.message_tasks.read().unwrap().get(&message_id).copied() {
            let _ = self
                .inner
                .tasks
                .update_status(task_id, crate::tasks::TaskStatus::Cancelled, None, None);
        }
        Ok(())
    }
}

async fn run_generation(
    inner: &Inner,
    role: crate::agents::Role,
    message_text: &str,
    use_kb: bool,
    params: &GenerationParams,
) -> CoreResult<String> {
    let context_snippets = if use_kb {
        let hits = inner
            .retrieval
            .search(
                message_text,
                DEFAULT_KB_LIMIT,
                DEFAULT_SEMANTIC_WEIGHT,
                DEFAULT_KEYWORD_WEIGHT,
                None,
            )
            .await?;
        hits.into_iter().map(|h| h.content).collect()
    } else {
        vec![]
    };

    let system_prompt = build_role_prompt(role, "Respond to the user's request directly and concretely.");
    let backend = inner.llm_backend.clone();
    let system_prompt_owned = system_prompt.clone();
    let user_prompt = message_text.to_string();
    let params = params.clone();

    let attempt = worker::retry_with_backoff(worker::RetryConfig::default(), move || {
        let backend = backend.clone();
        let system_prompt = system_prompt_owned.clone();
        let user_prompt = user_prompt.clone();
        let context_snippets = context_snippets.clone();
        let params = params.clone();
        async move {
            backend
                .generate(role, &system_prompt, &user_prompt, &context_snippets, &params)
                .await
        }
    });

    tokio::time::timeout(inner.llm_timeout, attempt)
        .await
        .map_err(|_| CoreError::transient("llm request timed out"))?
}

fn finalize(inner: &Inner, message_id: Uuid, task_id: Uuid, outcome: CoreResult<String>) {
    let mut pending = inner.pending.write().unwrap();
    let Some(request) = pending.get_mut(&message_id) else {
        return;
    };
    if request.status != PendingStatus::Generating {
        // Already cancelled (or, impossibly, already finalized) — first
        // terminal write wins.
        return;
    }
    let succeeded = outcome.is_ok();
    let response_text = match outcome {
        Ok(text) => {
            request.status = PendingStatus::Complete;
            request.response_text = Some(text.clone());
            Some(text)
        }
        Err(err) => {
            log_warn!(message_id = %message_id, error = %err, "generation failed");
            request.status = PendingStatus::Error;
            request.error = Some(err.to_string());
            None
        }
    };
    request.completed_at = Some(Utc::now());
    let assignee = request.assigned_agent_id.clone();
    drop(pending);
    let _ = inner.registry.with_agent_mut_by_id(&assignee, |agent| {
        if succeeded {
            agent.record_success(0);
        } else {
            agent.record_failure();
        }
    });
    if let Some(text) = response_text
        && let Ok(response) = crate::bus::Message::new(
            assignee.clone(),
            vec![assignee.clone()],
            text,
            crate::bus::MessageKind::Response,
            serde_json::json!({ "message_id": message_id.to_string() }),
        )
    {
        let _ = inner.bus.publish(response);
    }
    let final_status = if succeeded {
        crate::tasks::TaskStatus::Completed
    } else {
        crate::tasks::TaskStatus::Failed
    };
    let _ = inner.tasks.update_status(task_id, final_status, None, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::Role;
    use crate::bus::MessageBus;
    use crate::retrieval::embedding::EmbeddingBackend;
    use async_trait::async_trait;
    use std::time::Duration;

    struct EchoBackend;

    #[async_trait]
    impl LlmBackend for EchoBackend {
        async fn generate(
            &self,
            _role: Role,
            _system_prompt: &str,
            user_prompt: &str,
            _context: &[String],
            _params: &GenerationParams,
        ) -> CoreResult<String> {
            Ok(format!("echo: {user_prompt}"))
        }
    }

    struct SlowBackend;

    #[async_trait]
    impl LlmBackend for SlowBackend {
        async fn generate(
            &self,
            _role: Role,
            _system_prompt: &str,
            _user_prompt: &str,
            _context: &[String],
            _params: &GenerationParams,
        ) -> CoreResult<String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok("never".to_string())
        }
    }

    struct NullEmbedder;

    #[async_trait]
    impl EmbeddingBackend for NullEmbedder {
        async fn embed(&self, _text: &str) -> CoreResult<Vec<f32>> {
            Ok(vec![0.0; 8])
        }
    }

    fn build_coordinator(llm: Arc<dyn LlmBackend>, timeout: Duration) -> RequestCoordinator {
        let mut config = CoreConfig::default();
        config.embedding_dimensions = 8;
        config.llm_request_timeout = timeout;
        let registry = Arc::new(AgentRegistry::new());
        let bus = Arc::new(MessageBus::new(100));
        let tasks = Arc::new(TaskManager::new());
        let delegation = Arc::new(DelegationEngine::new(
            registry.clone(),
            tasks.clone(),
            bus.clone(),
            config.delegation_threshold,
            config.max_delegation_depth,
        ));
        let retrieval = Arc::new(
            RetrievalIndex::new(&config, Arc::new(NullEmbedder), false).unwrap(),
        );
        RequestCoordinator::new(&config, registry, bus, tasks, delegation, retrieval, llm)
    }

    #[tokio::test]
    async fn submit_then_poll_reaches_complete() {
        let coordinator = build_coordinator(Arc::new(EchoBackend), Duration::from_secs(5));
        let id = coordinator
            .submit("What is our Q3 revenue forecast?", None, false, GenerationParams::default())
            .await
            .unwrap();

        let mut request = coordinator.poll(id).unwrap();
        for _ in 0..50 {
            if request.status != PendingStatus::Generating {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            request = coordinator.poll(id).unwrap();
        }
        assert_eq!(request.status, PendingStatus::Complete);
        assert!(request.response_text.unwrap().contains("Q3 revenue"));
    }

    #[tokio::test]
    async fn timeout_surfaces_as_error() {
        let coordinator = build_coordinator(Arc::new(SlowBackend), Duration::from_millis(50));
        let id = coordinator
            .submit("deploy the service", None, false, GenerationParams::default())
            .await
            .unwrap();

        let mut request = coordinator.poll(id).unwrap();
        for _ in 0..100 {
            if request.status != PendingStatus::Generating {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            request = coordinator.poll(id).unwrap();
        }
        assert_eq!(request.status, PendingStatus::Error);
        assert!(request.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn cancel_is_a_noop_after_completion() {
        let coordinator = build_coordinator(Arc::new(EchoBackend), Duration::from_secs(5));
        let id = coordinator
            .submit("hello", None, false, GenerationParams::default())
            .await
            .unwrap();
        let mut request = coordinator.poll(id).unwrap();
        for _ in 0..50 {
            if request.status != PendingStatus::Generating {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            request = coordinator.poll(id).unwrap();
        }
        coordinator.cancel(id).unwrap();
        assert_eq!(coordinator.poll(id).unwrap().status, PendingStatus::Complete);
    }
}
