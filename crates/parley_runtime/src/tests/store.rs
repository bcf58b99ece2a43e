use parley_core::{ChatMessage, Role};

use crate::{ConversationStore, InMemoryConversationStore, RuntimeError};

fn finished(id: &str) -> ChatMessage {
    let mut message = ChatMessage::new(id, Role::Assistant);
    message.append_text(format!("message {id}")).unwrap();
    message.finish().unwrap();
    message
}

#[tokio::test]
async fn test_append_then_load_in_order() {
    let store = InMemoryConversationStore::new();
    store.append("conv-1", finished("m1")).await.unwrap();
    store.append("conv-1", finished("m2")).await.unwrap();
    store.append("conv-2", finished("m1")).await.unwrap();

    let ids: Vec<String> = store
        .load("conv-1")
        .await
        .unwrap()
        .iter()
        .map(|m| m.id().to_string())
        .collect();
    assert_eq!(ids, vec!["m1", "m2"]);
    assert_eq!(store.load("conv-2").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_load_unknown_conversation_is_empty() {
    let store = InMemoryConversationStore::new();
    assert!(store.load("missing").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_rejects_unfinished_message() {
    let store = InMemoryConversationStore::new();
    let err = store
        .append("conv-1", ChatMessage::new("m1", Role::Assistant))
        .await
        .unwrap_err();
    assert!(matches!(err, RuntimeError::Store(_)));
}

#[tokio::test]
async fn test_rejects_duplicate_message_id() {
    let store = InMemoryConversationStore::new();
    store.append("conv-1", finished("m1")).await.unwrap();
    let err = store.append("conv-1", finished("m1")).await.unwrap_err();
    assert!(matches!(err, RuntimeError::Store(_)));
}

#[tokio::test]
async fn test_conversation_rechecks_integrity() {
    let store = InMemoryConversationStore::new();
    let mut orphan = ChatMessage::new("m1", Role::Assistant);
    orphan
        .append_tool_call_result("r1", "c-missing", "fetch", "x")
        .unwrap();
    orphan.finish().unwrap();
    store.append("conv-1", orphan).await.unwrap();

    let err = store.conversation("conv-1").await.unwrap_err();
    assert!(matches!(err, RuntimeError::Store(_)));
}
