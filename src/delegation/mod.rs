//! Maps an inbound request to a concrete assignee by scoring role-specific
//! keyword lexicons, then creates the task and publishes it on the message
//! bus. Pure over `(message_text, role_hint, registry snapshot)` — never
//! blocks on I/O.

use crate::agents::{AgentRegistry, Role};
use crate::bus::{Message, MessageBus, MessageKind};
use crate::error::{CoreError, CoreResult};
use crate::tasks::{Task, TaskManager};
use crate::tokenize::tokenize;
use std::sync::Arc;
use uuid::Uuid;

pub struct DelegationEngine {
    registry: Arc<AgentRegistry>,
    tasks: Arc<TaskManager>,
    bus: Arc<MessageBus>,
    threshold: f64,
    max_depth: u32,
}

#[derive(Debug, Clone)]
pub struct DelegationResult {
    pub role: Role,
    pub task: Task,
}

impl DelegationEngine {
    pub fn new(
        registry: Arc<AgentRegistry>,
        tasks: Arc<TaskManager>,
        bus: Arc<MessageBus>,
        threshold: f64,
        max_depth: u32,
    ) -> Self {
        Self {
            registry,
            tasks,
            bus,
            threshold,
            max_depth,
        }
    }

    /// Entry point for a fresh user request (no parent task).
    pub fn delegate(
        &self,
        message_text: &str,
        role_hint: Option<&str>,
        originator: &str,
    ) -> CoreResult<DelegationResult> {
        self.delegate_inner(message_text, role_hint, originator, None)
    }

    /// Entry point for an agent re-delegating work it received. `parent_task_id`
    /// anchors the depth check and is recorded in the new task's metadata.
    pub fn re_delegate(
        &self,
        message_text: &str,
        role_hint: Option<&str>,
        originator: &str,
        parent_task_id: Uuid,
    ) -> CoreResult<DelegationResult> {
        self.delegate_inner(message_text, role_hint, originator, Some(parent_task_id))
    }

    fn delegate_inner(
        &self,
        message_text: &str,
        role_hint: Option<&str>,
        originator: &str,
        parent_task_id: Option<Uuid>,
    ) -> CoreResult<DelegationResult> {
        let depth = match parent_task_id {
            None => 0,
            Some(parent_id) => {
                let parent = self.tasks.get_task(parent_id)?;
                let parent_depth = parent
                    .metadata
                    .get("delegation_depth")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(0) as u32;
                let depth = parent_depth + 1;
                if depth > self.max_depth {
                    return Err(CoreError::conflict(format!(
                        "max delegation depth ({}) exceeded",
                        self.max_depth
                    )));
                }
                depth
            }
        };

        let role = self.resolve_role(message_text, role_hint);
        let assignee = self.registry.id_for_role(role)?;

        let mut metadata = serde_json::json!({ "delegation_depth": depth });
        if let Some(parent_id) = parent_task_id {
            metadata["delegated_from"] = serde_json::Value::String(parent_id.to_string());
        }

        let title: String = message_text.chars().take(60).collect();
        let task = self.tasks.create_task(
            title,
            message_text,
            assignee.clone(),
            originator,
            3,
            None,
            vec![],
            metadata,
        )?;

        let message = Message::new(
            originator,
            vec![assignee],
            message_text,
            MessageKind::Task,
            serde_json::json!({ "task_id": task.id.to_string() }),
        )?;
        self.bus.publish(message)?;

        Ok(DelegationResult { role, task })
    }

    /// Resolves the assignee role: explicit hint first, else the
    /// highest-scoring lexicon match above `threshold`, else Director.
    fn resolve_role(&self, message_text: &str, role_hint: Option<&str>) -> Role {
        if let Some(hint) = role_hint
            && let Some(role) = Role::from_str(hint)
        {
            return role;
        }

        let tokens = tokenize(message_text);
        if tokens.is_empty() {
            return Role::Director;
        }
        let token_set: std::collections::HashSet<&str> =
            tokens.iter().map(String::as_str).collect();

        let mut best: Option<(Role, f64)> = None;
        for &role in Role::all() {
            if role == Role::Director {
                continue;
            }
            let lexicon = role.keyword_lexicon();
            let matched = lexicon
                .iter()
                .filter(|kw| token_set.contains(*kw))
                .count();
            if matched == 0 {
                continue;
            }
            let score = matched as f64 / token_set.len() as f64;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((role, score));
            }
        }

        match best {
            Some((role, score)) if score >= self.threshold => role,
            _ => Role::Director,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;

    fn engine() -> DelegationEngine {
        let registry = Arc::new(AgentRegistry::new());
        let tasks = Arc::new(TaskManager::new());
        let bus = Arc::new(MessageBus::new(100));
        let cfg = CoreConfig::default();
        DelegationEngine::new(
            registry,
            tasks,
            bus,
            cfg.delegation_threshold,
            cfg.max_delegation_depth,
        )
    }

    #[test]
    fn keyword_match_routes_to_cfo() {
        let engine = engine();
        let result = engine
            .delegate(
                "What is the projected cash burn and revenue forecast for Q3?",
                None,
                "user",
            )
            .unwrap();
        assert_eq!(result.role, Role::Cfo);
    }

    #[test]
    fn explicit_hint_overrides_scoring() {
        let engine = engine();
        let result = engine
            .delegate("deploy the api to staging", Some("cfo"), "user")
            .unwrap();
        assert_eq!(result.role, Role::Cfo);
    }

    #[test]
    fn low_confidence_falls_back_to_director() {
        let engine = engine();
        let result = engine.delegate("hello there", None, "user").unwrap();
        assert_eq!(result.role, Role::Director);
    }

    #[test]
    fn re_delegation_records_parent_and_depth() {
        let engine = engine();
        let parent = engine
            .delegate("deploy the new service to staging", None, "user")
            .unwrap();
        assert_eq!(parent.role, Role::Cto);

        let child = engine
            .re_delegate("write a deploy checklist", Some("coo"), "cto-agent", parent.task.id)
            .unwrap();
        assert_eq!(
            child.task.metadata["delegated_from"],
            serde_json::Value::String(parent.task.id.to_string())
        );
        assert_eq!(child.task.metadata["delegation_depth"], 1);
    }

    #[test]
    fn depth_beyond_max_is_rejected() {
        let engine = engine();
        let mut current = engine.delegate("deploy the api", None, "user").unwrap();
        for _ in 0..3 {
            current = engine
                .re_delegate("deploy the api again", None, "cto-agent", current.task.id)
                .unwrap();
        }
        let result = engine.re_delegate("deploy once more", None, "cto-agent", current.task.id);
        assert!(result.is_err());
    }
}
