use super::*;
use axum::{body, body::Body, http::Request};
use shared::domain::Role;
use tower::ServiceExt;

fn signup_request(name: &str, email: &str, password: &str) -> SignupRequest {
    SignupRequest {
        name: name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        permission: false,
        user_telegram: None,
        course: None,
        discord: None,
        disabilities: Vec::new(),
        is_student: false,
    }
}

/// Router plus one admin token and one participant token.
async fn test_app() -> (Router, String, String) {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let api = ApiContext {
        storage,
        auth: AuthConfig {
            token_secret: "test-secret".to_string(),
            token_ttl_seconds: 3600,
        },
        mailer: Arc::new(LogMailer::new(MailerConfig {
            from_address: "noreply@test".to_string(),
        })),
    };

    let admin = server_api::signup(
        &api,
        signup_request("Event Admin", "admin@example.com", "admin-password"),
    )
    .await
    .expect("admin signup");
    api.storage
        .set_role(admin.user.user_id, Role::Admin)
        .await
        .expect("promote");
    let participant = server_api::signup(
        &api,
        signup_request("Player One", "player@example.com", "player-password"),
    )
    .await
    .expect("participant signup");

    let app = build_router(Arc::new(AppState { api }));
    (app, admin.token, participant.token)
}

fn question_body(index: i64, title: &str) -> serde_json::Value {
    serde_json::json!({
        "index": index,
        "title": title,
        "question": "What has keys but opens no locks?",
        "answer": "piano",
        "isLegendary": false,
        "clue": "It sings.",
    })
}

fn admin_request(
    method: &str,
    uri: &str,
    token: &str,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {token}"));
    match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

#[tokio::test]
async fn healthz_reports_ok_when_storage_is_ready() {
    let (app, _, _) = test_app().await;
    let request = Request::get("/healthz")
        .body(Body::empty())
        .expect("request");
    let response = app.oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    assert_eq!(bytes.as_ref(), b"ok");
}

#[tokio::test]
async fn signup_and_login_routes_issue_sessions() {
    let (app, _, _) = test_app().await;

    let signup = Request::post("/signup")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "name": "Route User",
                "email": "route@example.com",
                "password": "route-password",
                "isStudent": true,
                "course": "Information Systems",
            })
            .to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(signup).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let session = json_body(response).await;
    assert!(session["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(session["user"]["email"], "route@example.com");

    let duplicate = Request::post("/signup")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "name": "Route User",
                "email": "route@example.com",
                "password": "route-password",
            })
            .to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(duplicate).await.expect("response");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let login = Request::post("/login")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "email": "route@example.com", "password": "route-password" })
                .to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(login).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let bad_login = Request::post("/login")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "email": "route@example.com", "password": "wrong" }).to_string(),
        ))
        .expect("request");
    let response = app.oneshot(bad_login).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forgot_password_route_answers_ok_for_any_email() {
    let (app, _, _) = test_app().await;
    let request = Request::post("/forgot-password")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({ "email": "nobody@example.com" }).to_string(),
        ))
        .expect("request");
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let reset = Request::post("/reset-password")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "email": "player@example.com",
                "code": "000000",
                "newPassword": "fresh-password",
            })
            .to_string(),
        ))
        .expect("request");
    let response = app.oneshot(reset).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_routes_reject_missing_and_non_admin_tokens() {
    let (app, _, participant_token) = test_app().await;

    let anonymous = Request::get("/admin/riddle-questions/")
        .body(Body::empty())
        .expect("request");
    let response = app.clone().oneshot(anonymous).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let garbage = admin_request("GET", "/admin/riddle-questions/", "not-a-token", None);
    let response = app.clone().oneshot(garbage).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let participant = admin_request(
        "POST",
        "/admin/riddle-questions/",
        &participant_token,
        Some(question_body(1, "Smuggled")),
    );
    let response = app.oneshot(participant).await.expect("response");
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_with_missing_required_field_never_reaches_the_service() {
    let (app, admin_token, _) = test_app().await;

    let mut body = question_body(1, "Broken");
    body.as_object_mut()
        .expect("object")
        .remove("isLegendary");
    let request = admin_request("POST", "/admin/riddle-questions/", &admin_token, Some(body));
    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let error = json_body(response).await;
    assert_eq!(error["message"], "Invalid field 'isLegendary'");

    let list = admin_request("GET", "/admin/riddle-questions/", &admin_token, None);
    let response = app.oneshot(list).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let questions = json_body(response).await;
    assert_eq!(questions.as_array().expect("array").len(), 0);
}

#[tokio::test]
async fn question_crud_roundtrip_over_routes() {
    let (app, admin_token, _) = test_app().await;

    let create = admin_request(
        "POST",
        "/admin/riddle-questions/",
        &admin_token,
        Some(question_body(1, "Opening riddle")),
    );
    let response = app.clone().oneshot(create).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let created = json_body(response).await;
    assert_eq!(created["title"], "Opening riddle");
    assert_eq!(created["isLegendary"], false);
    let id = created["id"].as_i64().expect("id");

    let update = admin_request(
        "PUT",
        &format!("/admin/riddle-questions/{id}"),
        &admin_token,
        Some(question_body(1, "Opening riddle, revised")),
    );
    let response = app.clone().oneshot(update).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert_eq!(updated["title"], "Opening riddle, revised");

    let missing = admin_request(
        "PUT",
        "/admin/riddle-questions/9999",
        &admin_token,
        Some(question_body(2, "Ghost")),
    );
    let response = app.clone().oneshot(missing).await.expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let delete = admin_request(
        "DELETE",
        &format!("/admin/riddle-questions/{id}"),
        &admin_token,
        None,
    );
    let response = app.clone().oneshot(delete).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let deleted = json_body(response).await;
    assert_eq!(deleted["id"].as_i64(), Some(id));
    assert_eq!(deleted["title"], "Opening riddle, revised");

    let list = admin_request("GET", "/admin/riddle-questions/", &admin_token, None);
    let response = app.oneshot(list).await.expect("response");
    let questions = json_body(response).await;
    assert_eq!(questions.as_array().expect("array").len(), 0);
}
