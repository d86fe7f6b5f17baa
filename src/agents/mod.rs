//! Agent registry: one active agent per role, with status and metrics.

pub mod roles;

pub use roles::Role;

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AgentStatus {
    Active,
    Inactive,
    Error,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AgentMetrics {
    pub total_queries: u64,
    pub successful: u64,
    pub failed: u64,
    pub total_latency_ms: u64,
}

impl AgentMetrics {
    pub fn average_latency_ms(&self) -> f64 {
        if self.total_queries == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.total_queries as f64
        }
    }
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            total_queries: 0,
            successful: 0,
            failed: 0,
            total_latency_ms: 0,
        }
    }
}

/// One conversational turn retained in an agent's bounded memory ring.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct MemoryEntry {
    pub sender: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub role: Role,
    pub display_name: String,
    pub status: AgentStatus,
    pub last_active: DateTime<Utc>,
    pub metrics: AgentMetrics,
    #[serde(skip)]
    history: VecDeque<MemoryEntry>,
    pub max_history_length: usize,
}

impl Agent {
    fn new(role: Role, display_name: impl Into<String>) -> Self {
        Self {
            agent_id: Uuid::new_v4().to_string(),
            role,
            display_name: display_name.into(),
            status: AgentStatus::Active,
            last_active: Utc::now(),
            metrics: AgentMetrics::default(),
            history: VecDeque::new(),
            max_history_length: 50,
        }
    }

    pub fn remember(&mut self, entry: MemoryEntry) {
        if self.history.len() >= self.max_history_length {
            self.history.pop_front();
        }
        self.history.push_back(entry);
        self.last_active = Utc::now();
    }

    pub fn history(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.history.iter()
    }

    pub fn record_success(&mut self, latency_ms: u64) {
        self.metrics.total_queries += 1;
        self.metrics.successful += 1;
        self.metrics.total_latency_ms += latency_ms;
    }

    pub fn record_failure(&mut self) {
        self.metrics.total_queries += 1;
        self.metrics.failed += 1;
    }
}

/// Registry mapping each [`Role`] to exactly one active [`Agent`].
///
/// Role → agent is a total function over the closed role set: the registry
/// is seeded with every role at construction and never drops one.
pub struct AgentRegistry {
    agents: RwLock<HashMap<Role, Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        let mut agents = HashMap::new();
        for &role in Role::all() {
            let display = format!("{} Agent", role.name().to_uppercase());
            agents.insert(role, Agent::new(role, display));
        }
        Self {
            agents: RwLock::new(agents),
        }
    }

    pub fn get(&self, role: Role) -> Option<Agent> {
        self.agents.read().unwrap().get(&role).cloned()
    }

    pub fn id_for_role(&self, role: Role) -> CoreResult<String> {
        self.agents
            .read()
            .unwrap()
            .get(&role)
            .map(|a| a.agent_id.clone())
            .ok_or_else(|| CoreError::not_found("agent", role.name()))
    }

    pub fn id_for_name(&self, display_name: &str) -> Option<String> {
        self.agents
            .read()
            .unwrap()
            .values()
            .find(|a| a.display_name == display_name)
            .map(|a| a.agent_id.clone())
    }

    pub fn role_for_id(&self, agent_id: &str) -> Option<Role> {
        self.agents
            .read()
            .unwrap()
            .values()
            .find(|a| a.agent_id == agent_id)
            .map(|a| a.role)
    }

    pub fn list(&self) -> Vec<Agent> {
        self.agents.read().unwrap().values().cloned().collect()
    }

    pub fn with_agent_mut<F, R>(&self, role: Role, f: F) -> CoreResult<R>
    where
        F: FnOnce(&mut Agent) -> R,
    {
        let mut agents = self.agents.write().unwrap();
        let agent = agents
            .get_mut(&role)
            .ok_or_else(|| CoreError::not_found("agent", role.name()))?;
        Ok(f(agent))
    }

    pub fn with_agent_mut_by_id<F, R>(&self, agent_id: &str, f: F) -> CoreResult<R>
    where
        F: FnOnce(&mut Agent) -> R,
    {
        let mut agents = self.agents.write().unwrap();
        let agent = agents
            .values_mut()
            .find(|a| a.agent_id == agent_id)
            .ok_or_else(|| CoreError::not_found("agent", agent_id))?;
        Ok(f(agent))
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}
