// Shared fixtures for the black-box scenario tests. One file per concern in
// `tests/`, same convention the rest of the suite follows.

use async_trait::async_trait;
use exec_team_core::{CoreConfig, CoreResult, CoreSystem, EmbeddingBackend, GenerationParams, LlmBackend, Role};
use std::sync::Arc;
use std::time::Duration;

pub struct EchoBackend;

#[async_trait]
impl LlmBackend for EchoBackend {
    async fn generate(
        &self,
        role: Role,
        _system_prompt: &str,
        user_prompt: &str,
        _context_snippets: &[String],
        _params: &GenerationParams,
    ) -> CoreResult<String> {
        Ok(format!("[{}] {}", role.name(), user_prompt))
    }
}

pub struct SleepyBackend {
    pub delay: Duration,
}

#[async_trait]
impl LlmBackend for SleepyBackend {
    async fn generate(
        &self,
        _role: Role,
        _system_prompt: &str,
        _user_prompt: &str,
        _context_snippets: &[String],
        _params: &GenerationParams,
    ) -> CoreResult<String> {
        tokio::time::sleep(self.delay).await;
        Ok("too slow".to_string())
    }
}

/// A deterministic bag-of-letters embedder: no model, no network, but
/// stable and similarity-meaningful enough to exercise ranking behavior.
pub struct DeterministicEmbedder {
    pub dims: usize,
}

#[async_trait]
impl EmbeddingBackend for DeterministicEmbedder {
    async fn embed(&self, text: &str) -> CoreResult<Vec<f32>> {
        let mut vector = vec![0.0f32; self.dims];
        for token in exec_team_core::tokenize::tokenize(text) {
            let mut acc = 0u32;
            for b in token.bytes() {
                acc = acc.wrapping_mul(131).wrapping_add(b as u32);
            }
            vector[(acc as usize) % self.dims] += 1.0;
        }
        Ok(vector)
    }
}

#[allow(dead_code)]
pub fn system_with(llm: Arc<dyn LlmBackend>) -> CoreSystem {
    let mut config = CoreConfig::default();
    config.embedding_dimensions = 32;
    CoreSystem::new(&config, Arc::new(DeterministicEmbedder { dims: 32 }), llm, false).unwrap()
}

#[allow(dead_code)]
pub async fn wait_for_completion(
    coordinator: &exec_team_core::RequestCoordinator,
    message_id: uuid::Uuid,
) -> exec_team_core::coordinator::PendingRequest {
    let mut request = coordinator.poll(message_id).unwrap();
    for _ in 0..200 {
        if !matches!(request.status, exec_team_core::coordinator::PendingStatus::Generating) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        request = coordinator.poll(message_id).unwrap();
    }
    request
}
