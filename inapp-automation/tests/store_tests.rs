use inapp_automation::{DataStore, InAppEvent, ListenerRegistry, MemoryDataStore};
use inapp_types::{DisplayContent, Message, MessageSource, Resolution};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

// ── MemoryDataStore ──────────────────────────────────────────────

#[test]
fn put_get_remove() {
    let store = MemoryDataStore::new();
    assert!(!store.contains("key"));

    store.put("key", json!({ "a": 1 })).unwrap();
    assert_eq!(store.get("key"), Some(json!({ "a": 1 })));
    assert!(store.contains("key"));

    store.remove("key").unwrap();
    assert_eq!(store.get("key"), None);
}

#[test]
fn typed_reads_fall_back_on_mismatch() {
    let store = MemoryDataStore::new();
    store.put("number", json!(42)).unwrap();
    store.put("flag", json!(true)).unwrap();
    store.put("text", json!("nope")).unwrap();

    assert_eq!(store.get_i64("number", -1), 42);
    assert_eq!(store.get_i64("text", -1), -1);
    assert_eq!(store.get_i64("missing", -1), -1);
    assert!(store.get_bool("flag", false));
    assert!(store.get_bool("text", true));
}

// ── ListenerRegistry ─────────────────────────────────────────────

trait Named: Send + Sync {
    fn name(&self) -> &str;
}

struct Listener(&'static str);

impl Named for Listener {
    fn name(&self) -> &str {
        self.0
    }
}

#[test]
fn registry_keeps_order_and_removes_by_identity() {
    let registry: ListenerRegistry<dyn Named> = ListenerRegistry::default();
    let first: Arc<dyn Named> = Arc::new(Listener("first"));
    let second: Arc<dyn Named> = Arc::new(Listener("second"));
    let lookalike: Arc<dyn Named> = Arc::new(Listener("first"));

    registry.add(first.clone());
    registry.add(second.clone());
    assert_eq!(registry.len(), 2);

    assert!(!registry.remove(&lookalike));
    let names: Vec<String> = registry
        .snapshot()
        .iter()
        .map(|l| l.name().to_string())
        .collect();
    assert_eq!(names, vec!["first".to_string(), "second".to_string()]);

    assert!(registry.remove(&first));
    assert!(registry.remove(&second));
    assert!(registry.is_empty());
}

// ── Events ───────────────────────────────────────────────────────

#[test]
fn resolution_event_json_shape() {
    let message = Message::from_json(&json!({
        "message_id": "promo",
        "display_type": "banner",
        "display": {},
        "source": "remote-data",
        "campaigns": { "categories": ["sale"] }
    }))
    .unwrap();

    let event = InAppEvent::resolution("s1", &message, Resolution::button_click("ok"), 1_200);
    let value = serde_json::to_value(&event).unwrap();

    assert_eq!(value["type"], json!("resolution"));
    assert_eq!(value["schedule_id"], json!("s1"));
    assert_eq!(value["source"], json!("remote-data"));
    assert_eq!(value["campaigns"], json!({ "categories": ["sale"] }));
    assert_eq!(value["display_time_ms"], json!(1_200));
    assert_eq!(value["resolution"]["type"], json!("button_click"));
    assert_eq!(value["resolution"]["button_id"], json!("ok"));
}

#[test]
fn app_defined_events_carry_no_campaigns() {
    let message = Message::new("m1", DisplayContent::Custom(json!({}))).unwrap();

    let event = InAppEvent::display("s1", &message);

    assert_eq!(event.source, MessageSource::AppDefined);
    assert_eq!(event.campaigns, None);
}
