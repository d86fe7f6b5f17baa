//! The LLM backend contract. Concrete providers (remote API, local model)
//! are external collaborators implementing this trait.

use crate::agents::Role;
use crate::error::CoreResult;
use async_trait::async_trait;

#[derive(Debug, Clone, Default)]
pub struct GenerationParams {
    pub model_hint: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn generate(
        &self,
        role: Role,
        system_prompt: &str,
        user_prompt: &str,
        context_snippets: &[String],
        params: &GenerationParams,
    ) -> CoreResult<String>;
}
