mod common;

use exec_team_core::bus::{Message, MessageBus, MessageKind};

#[test]
fn history_eviction_prunes_stale_inbox_entries() {
    let bus = MessageBus::new(10_000);
    for i in 0..10_001 {
        let message = Message::new(
            "sender",
            vec!["agent-1".to_string()],
            format!("message {i}"),
            MessageKind::Notification,
            serde_json::Value::Null,
        )
        .unwrap();
        bus.publish(message).unwrap();
    }

    assert_eq!(bus.history_len(), 10_000);
    let inbox = bus.messages_for("agent-1", false);
    assert_eq!(inbox.len(), 10_000);
    assert_eq!(inbox[0].content, "message 1");
    assert_eq!(inbox.last().unwrap().content, "message 10000");
}

#[test]
fn read_receipts_are_scoped_per_recipient() {
    let bus = MessageBus::new(100);
    let message = Message::new(
        "sender",
        vec!["a".to_string(), "b".to_string()],
        "shared",
        MessageKind::Query,
        serde_json::Value::Null,
    )
    .unwrap();
    bus.publish(message).unwrap();
    let id = bus.messages_for("a", false)[0].id;

    bus.mark_read(id, "a");
    assert!(bus.messages_for("a", true).is_empty());
    assert_eq!(bus.messages_for("b", true).len(), 1);
}
