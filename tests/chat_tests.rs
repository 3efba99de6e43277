mod common;

use common::*;
use project_dashboard::db::{Assistant, ChatRepository, MessageRole};

#[tokio::test]
async fn deleting_a_group_keeps_its_chats() {
    let db = test_pool().await;
    seed_user(&db, "alice").await;
    let project = seed_project(&db, "alice", "Apollo").await;

    let group = ChatRepository::create_group(&db, Assistant::Sql, &project.id, "alice", "Reports")
        .await
        .unwrap();
    let chat = ChatRepository::create_chat(&db, Assistant::Sql, &project.id, "alice", "Monthly")
        .await
        .unwrap();
    let chat = ChatRepository::set_chat_group(&db, Assistant::Sql, &chat.id, Some(&group.id))
        .await
        .unwrap();
    assert_eq!(chat.group_id.as_deref(), Some(group.id.as_str()));

    ChatRepository::delete_group(&db, Assistant::Sql, &group.id).await.unwrap();

    let chat = ChatRepository::get_chat(&db, Assistant::Sql, &chat.id)
        .await
        .unwrap()
        .unwrap();
    assert!(chat.group_id.is_none());
    assert!(ChatRepository::list_groups(&db, Assistant::Sql, &project.id, "alice")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn deleting_a_chat_removes_its_messages() {
    let db = test_pool().await;
    seed_user(&db, "alice").await;
    let project = seed_project(&db, "alice", "Apollo").await;

    let chat = ChatRepository::create_chat(&db, Assistant::General, &project.id, "alice", "Ideas")
        .await
        .unwrap();
    ChatRepository::add_message(&db, Assistant::General, &chat.id, MessageRole::User, "hi", 1, None)
        .await
        .unwrap();

    ChatRepository::delete_chat(&db, Assistant::General, &chat.id).await.unwrap();

    let messages = ChatRepository::list_messages(&db, Assistant::General, &chat.id)
        .await
        .unwrap();
    assert!(messages.is_empty());
}

#[tokio::test]
async fn chats_of_other_users_are_forbidden() {
    let db = test_pool().await;
    seed_user(&db, "alice").await;
    seed_user(&db, "mallory").await;
    let project = seed_project(&db, "alice", "Apollo").await;

    let chat = ChatRepository::create_chat(&db, Assistant::General, &project.id, "alice", "Ideas")
        .await
        .unwrap();

    let err = ChatRepository::get_owned_chat(&db, Assistant::General, &chat.id, "mallory")
        .await
        .unwrap_err();
    assert!(matches!(err, project_dashboard::error::AppError::Forbidden(_)));
}
