use super::*;

fn participant<'a>(name: &'a str, email: &'a str) -> NewUser<'a> {
    NewUser {
        name,
        email,
        password_hash: "$2b$12$fakehashfakehashfakehash",
        permission: true,
        user_telegram: None,
        course: None,
        discord: None,
        disabilities: &[],
        is_student: false,
    }
}

fn sample_question(index: i64, title: &str) -> NewQuestion {
    NewQuestion {
        index,
        title: title.to_string(),
        question: "What walks on four legs in the morning?".to_string(),
        img_url: None,
        clue: Some("Think of a lifetime.".to_string()),
        answer: "man".to_string(),
        is_legendary: false,
    }
}

#[tokio::test]
async fn create_and_find_user_roundtrips_profile_fields() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let disabilities = vec!["low vision".to_string()];
    let user_id = storage
        .create_user(NewUser {
            name: "Alice",
            email: "alice@example.com",
            password_hash: "hash",
            permission: true,
            user_telegram: Some("@alice"),
            course: Some("Computer Science"),
            discord: Some("alice#1234"),
            disabilities: &disabilities,
            is_student: true,
        })
        .await
        .expect("user");

    let stored = storage
        .find_user_by_email("alice@example.com")
        .await
        .expect("query")
        .expect("found");
    assert_eq!(stored.user_id, user_id);
    assert_eq!(stored.name, "Alice");
    assert_eq!(stored.role, Role::Participant);
    assert_eq!(stored.user_telegram.as_deref(), Some("@alice"));
    assert_eq!(stored.disabilities, disabilities);
    assert!(stored.is_student);

    assert!(storage
        .find_user_by_email("nobody@example.com")
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn duplicate_email_insert_fails() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage
        .create_user(participant("Alice", "alice@example.com"))
        .await
        .expect("first insert");
    let err = storage
        .create_user(participant("Other Alice", "alice@example.com"))
        .await;
    assert!(err.is_err());
}

#[tokio::test]
async fn set_role_promotes_to_admin() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let user_id = storage
        .create_user(participant("Alice", "alice@example.com"))
        .await
        .expect("user");

    assert!(storage.set_role(user_id, Role::Admin).await.expect("update"));
    let stored = storage.load_user(user_id).await.expect("query").expect("found");
    assert_eq!(stored.role, Role::Admin);

    assert!(!storage
        .set_role(UserId(9999), Role::Admin)
        .await
        .expect("update missing"));
}

#[tokio::test]
async fn question_crud_roundtrip() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    let second = storage
        .create_question(&sample_question(2, "Second"))
        .await
        .expect("create");
    let first = storage
        .create_question(&sample_question(1, "First"))
        .await
        .expect("create");

    let listed = storage.list_questions().await.expect("list");
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].question_id, first, "ordered by idx");
    assert_eq!(listed[1].question_id, second);

    let mut changed = sample_question(1, "First, revised");
    changed.is_legendary = true;
    assert!(storage.update_question(first, &changed).await.expect("update"));
    let reloaded = storage
        .load_question(first)
        .await
        .expect("load")
        .expect("found");
    assert_eq!(reloaded.title, "First, revised");
    assert!(reloaded.is_legendary);
    assert!(reloaded.updated_at >= reloaded.created_at);

    assert!(!storage
        .update_question(QuestionId(9999), &changed)
        .await
        .expect("update missing"));

    let deleted = storage
        .delete_question(first)
        .await
        .expect("delete")
        .expect("was present");
    assert_eq!(deleted.title, "First, revised");
    assert!(storage.load_question(first).await.expect("load").is_none());
    assert!(storage
        .delete_question(first)
        .await
        .expect("second delete")
        .is_none());
}

#[tokio::test]
async fn latest_reset_code_tracks_most_recent_and_used_flag() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let user_id = storage
        .create_user(participant("Alice", "alice@example.com"))
        .await
        .expect("user");

    assert!(storage
        .latest_reset_code(user_id)
        .await
        .expect("query")
        .is_none());

    storage
        .insert_reset_code(user_id, "111111")
        .await
        .expect("first code");
    let second = storage
        .insert_reset_code(user_id, "222222")
        .await
        .expect("second code");

    let latest = storage
        .latest_reset_code(user_id)
        .await
        .expect("query")
        .expect("found");
    assert_eq!(latest.reset_id, second);
    assert_eq!(latest.code, "222222");
    assert!(!latest.used);

    storage.mark_reset_code_used(second).await.expect("mark used");
    let latest = storage
        .latest_reset_code(user_id)
        .await
        .expect("query")
        .expect("found");
    assert!(latest.used);
}
