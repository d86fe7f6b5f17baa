//! Process-wide message bus: per-recipient inboxes, read receipts, and a
//! capped global history.
//!
//! Delivery is synchronous with respect to the history/inbox append —
//! `publish` returns only after every subscribed recipient's callback has
//! run (or failed and been logged). There is no cross-recipient ordering
//! guarantee, but for any single recipient messages arrive in publish order.

use crate::error::{CoreError, CoreResult};
use crate::logging::log_warn;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum MessageKind {
    Task,
    StatusUpdate,
    Response,
    Query,
    Notification,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_agent_id: String,
    pub recipient_agent_ids: Vec<String>,
    pub content: String,
    pub kind: MessageKind,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub read_by: HashSet<String>,
}

impl Message {
    pub fn new(
        sender_agent_id: impl Into<String>,
        recipient_agent_ids: Vec<String>,
        content: impl Into<String>,
        kind: MessageKind,
        metadata: serde_json::Value,
    ) -> CoreResult<Self> {
        if recipient_agent_ids.is_empty() {
            return Err(CoreError::validation(
                "message must have at least one recipient",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            sender_agent_id: sender_agent_id.into(),
            recipient_agent_ids,
            content: content.into(),
            kind,
            metadata,
            timestamp: Utc::now(),
            read_by: HashSet::new(),
        })
    }
}

type Callback = Box<dyn Fn(&Message) -> CoreResult<()> + Send + Sync>;

pub struct MessageBus {
    capacity: usize,
    history: Mutex<VecDeque<Message>>,
    inboxes: Mutex<HashMap<String, VecDeque<Uuid>>>,
    subscribers: Mutex<HashMap<String, Callback>>,
}

impl MessageBus {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            history: Mutex::new(VecDeque::new()),
            inboxes: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// Registers (or replaces) a delivery callback for `agent_id`.
    pub fn subscribe<F>(&self, agent_id: impl Into<String>, callback: F)
    where
        F: Fn(&Message) -> CoreResult<()> + Send + Sync + 'static,
    {
        self.subscribers
            .lock()
            .unwrap()
            .insert(agent_id.into(), Box::new(callback));
    }

    pub fn unsubscribe(&self, agent_id: &str) {
        self.subscribers.lock().unwrap().remove(agent_id);
    }

    /// Appends to history (evicting the oldest entry past capacity), fans the
    /// message id into every recipient's inbox, then invokes each recipient's
    /// subscribed callback. A callback error is logged and does not stop
    /// delivery to the remaining recipients.
    pub fn publish(&self, message: Message) -> CoreResult<()> {
        let evicted = {
            let mut history = self.history.lock().unwrap();
            history.push_back(message.clone());
            if history.len() > self.capacity {
                history.pop_front().map(|m| m.id)
            } else {
                None
            }
        };

        {
            let mut inboxes = self.inboxes.lock().unwrap();
            if let Some(evicted_id) = evicted {
                for inbox in inboxes.values_mut() {
                    inbox.retain(|id| *id != evicted_id);
                }
            }
            for recipient in &message.recipient_agent_ids {
                inboxes
                    .entry(recipient.clone())
                    .or_default()
                    .push_back(message.id);
            }
        }

        let subscribers = self.subscribers.lock().unwrap();
        for recipient in &message.recipient_agent_ids {
            if let Some(callback) = subscribers.get(recipient)
                && let Err(err) = callback(&message)
            {
                log_warn!(recipient = %recipient, error = %err, "message callback failed");
            }
        }
        Ok(())
    }

    /// Inbox contents in insertion order. Ids that aged out of history
    /// (evicted) are silently skipped rather than returned as dangling.
    pub fn messages_for(&self, agent_id: &str, unread_only: bool) -> Vec<Message> {
        let ids: Vec<Uuid> = self
            .inboxes
            .lock()
            .unwrap()
            .get(agent_id)
            .map(|q| q.iter().copied().collect())
            .unwrap_or_default();
        let history = self.history.lock().unwrap();
        ids.iter()
            .filter_map(|id| history.iter().find(|m| m.id == *id))
            .filter(|m| !unread_only || !m.read_by.contains(agent_id))
            .cloned()
            .collect()
    }

    pub fn get_by_id(&self, message_id: Uuid) -> Option<Message> {
        self.history
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
    }

    /// Idempotent: marking an already-read message (or an unknown one) is a no-op.
    pub fn mark_read(&self, message_id: Uuid, agent_id: &str) {
        let mut history = self.history.lock().unwrap();
        if let Some(message) = history.iter_mut().find(|m| m.id == message_id) {
            message.read_by.insert(agent_id.to_string());
        }
    }

    pub fn clear_history(&self) {
        self.history.lock().unwrap().clear();
        self.inboxes.lock().unwrap().clear();
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn msg(recipients: Vec<&str>) -> Message {
        Message::new(
            "sender",
            recipients.into_iter().map(String::from).collect(),
            "hello",
            MessageKind::Notification,
            serde_json::Value::Null,
        )
        .unwrap()
    }

    #[test]
    fn fifo_delivery_per_recipient() {
        let bus = MessageBus::new(100);
        bus.publish(msg(vec!["a"])).unwrap();
        bus.publish(msg(vec!["a"])).unwrap();
        let inbox = bus.messages_for("a", false);
        assert_eq!(inbox.len(), 2);
        assert!(inbox[0].timestamp <= inbox[1].timestamp);
    }

    #[test]
    fn mark_read_is_idempotent() {
        let bus = MessageBus::new(100);
        bus.publish(msg(vec!["a"])).unwrap();
        let id = bus.messages_for("a", false)[0].id;
        bus.mark_read(id, "a");
        bus.mark_read(id, "a");
        assert!(bus.messages_for("a", true).is_empty());
    }

    #[test]
    fn eviction_prunes_inboxes() {
        let bus = MessageBus::new(2);
        bus.publish(msg(vec!["a"])).unwrap();
        bus.publish(msg(vec!["a"])).unwrap();
        bus.publish(msg(vec!["a"])).unwrap();
        assert_eq!(bus.history_len(), 2);
        assert_eq!(bus.messages_for("a", false).len(), 2);
    }

    #[test]
    fn callback_error_does_not_block_other_recipients() {
        let bus = MessageBus::new(100);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_a = calls.clone();
        bus.subscribe("a", move |_| {
            calls_a.fetch_add(1, Ordering::SeqCst);
            Err(CoreError::transient("boom"))
        });
        let calls_b = calls.clone();
        bus.subscribe("b", move |_| {
            calls_b.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        bus.publish(msg(vec!["a", "b"])).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn rejects_message_with_no_recipients() {
        let result = Message::new(
            "sender",
            vec![],
            "hello",
            MessageKind::Notification,
            serde_json::Value::Null,
        );
        assert!(result.is_err());
    }
}
