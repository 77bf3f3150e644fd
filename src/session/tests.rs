use super::*;
use std::sync::Arc;

fn history_of(len: usize) -> Vec<Turn> {
    (0..len)
        .map(|i| {
            if i % 2 == 0 {
                Turn::user(format!("question {}", i))
            } else {
                Turn::assistant(format!("answer {}", i))
            }
        })
        .collect()
}

#[test]
fn missing_session_is_created_empty() {
    let store = InMemorySessionStore::new();
    assert!(store.is_empty());

    let history = store.get_or_create("abc");
    assert!(history.is_empty());
    assert_eq!(store.len(), 1);
    assert_eq!(store.session_ids(10), vec!["abc".to_string()]);
}

#[test]
fn replace_overwrites_history() {
    let store = InMemorySessionStore::new();
    store.replace("abc", history_of(4));
    store.replace("abc", history_of(2));

    assert_eq!(store.get_or_create("abc"), history_of(2));
    assert_eq!(store.len(), 1);
}

#[test]
fn append_creates_and_extends() {
    let store = InMemorySessionStore::new();
    store.append_turn("abc", Role::User, "What is concrete?");
    store.append_turn("abc", Role::Assistant, "A building material.");

    let history = store.get_or_create("abc");
    assert_eq!(
        history,
        vec![
            Turn::user("What is concrete?"),
            Turn::assistant("A building material.")
        ]
    );
}

#[test]
fn truncation_keeps_most_recent_turns() {
    let history = history_of(25);
    let truncated = truncate_history(&history, 10);

    assert_eq!(truncated.len(), 10);
    assert_eq!(truncated[0], history[15]);
    assert_eq!(truncated[9], history[24]);

    assert_eq!(truncate_history(&history_of(3), 10).len(), 3);
    assert!(truncate_history(&[], 10).is_empty());
}

#[test]
fn stored_history_bounded_after_exchange() {
    let store = InMemorySessionStore::new();
    store.replace("abc", truncate_history(&history_of(40), 10));
    store.append_turn("abc", Role::User, "next question");
    store.append_turn("abc", Role::Assistant, "next answer");

    assert_eq!(store.get_or_create("abc").len(), 12);
}

#[test]
fn clear_existing_and_missing() {
    let store = InMemorySessionStore::new();
    store.get_or_create("abc");

    assert!(store.clear("abc"));
    assert!(!store.clear("abc"));
    assert!(!store.clear("never-existed"));
    assert!(store.is_empty());
    assert!(store.session_ids(10).is_empty());
}

#[test]
fn eviction_keeps_most_recently_inserted() {
    let store = InMemorySessionStore::new();
    for i in 0..101 {
        store.get_or_create(&format!("session-{}", i));
    }

    let removed = store.evict_if_over_capacity(100, 50);

    assert_eq!(removed, 51);
    assert_eq!(store.len(), 50);
    let ids = store.session_ids(100);
    assert_eq!(ids.first().map(String::as_str), Some("session-51"));
    assert_eq!(ids.last().map(String::as_str), Some("session-100"));
    assert!(store.get_or_create("session-51").is_empty());
}

#[test]
fn eviction_noop_at_capacity() {
    let store = InMemorySessionStore::new();
    for i in 0..100 {
        store.get_or_create(&format!("session-{}", i));
    }

    assert_eq!(store.evict_if_over_capacity(100, 50), 0);
    assert_eq!(store.len(), 100);
}

#[test]
fn overwriting_does_not_refresh_insertion_order() {
    let store = InMemorySessionStore::new();
    store.get_or_create("first");
    store.get_or_create("second");
    store.replace("first", history_of(2));

    assert_eq!(
        store.session_ids(10),
        vec!["first".to_string(), "second".to_string()]
    );
}

#[test]
fn cleared_session_reinserted_at_end() {
    let store = InMemorySessionStore::new();
    store.get_or_create("first");
    store.get_or_create("second");
    store.clear("first");
    store.get_or_create("first");

    assert_eq!(
        store.session_ids(10),
        vec!["second".to_string(), "first".to_string()]
    );
}

#[test]
fn session_ids_respects_limit() {
    let store = InMemorySessionStore::new();
    for i in 0..15 {
        store.get_or_create(&format!("s{}", i));
    }

    let ids = store.session_ids(10);
    assert_eq!(ids.len(), 10);
    assert_eq!(ids[0], "s0");
    assert_eq!(ids[9], "s9");
}

#[test]
fn concurrent_appends_are_not_lost_across_sessions() {
    let store = Arc::new(InMemorySessionStore::new());
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..50 {
                    store.append_turn(&format!("worker-{}", worker), Role::User, &i.to_string());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("worker should not panic");
    }

    assert_eq!(store.len(), 8);
    for worker in 0..8 {
        assert_eq!(store.get_or_create(&format!("worker-{}", worker)).len(), 50);
    }
}

#[test]
fn role_serialization() {
    let turn: Turn = serde_json::from_str(r#"{"role": "assistant", "content": "hi"}"#)
        .expect("turn should deserialize");
    assert_eq!(turn, Turn::assistant("hi"));
    assert_eq!(Role::User.label(), "User");

    let invalid: Result<Turn, _> = serde_json::from_str(r#"{"role": "system", "content": "x"}"#);
    assert!(invalid.is_err());
}
