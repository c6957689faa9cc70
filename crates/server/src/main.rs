use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Extension, Json, Router,
};
use mailer::{LogMailer, MailerConfig};
use server_api::{auth::AuthConfig, ApiContext};
use shared::{
    domain::QuestionId,
    error::{ApiError, ErrorCode},
    protocol::{
        AuthSession, ForgotPasswordRequest, LoginRequest, QuestionDraft, QuestionPayload,
        ResetPasswordRequest, SignupRequest,
    },
};
use storage::Storage;
use tracing::{error, info};

mod auth;
mod config;
mod validate;

use auth::AuthUser;
use config::{load_settings, prepare_database_url};

#[derive(Clone)]
struct AppState {
    api: ApiContext,
}

type Rejection = (StatusCode, Json<ApiError>);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open sqlite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;
    let api = ApiContext {
        storage,
        auth: AuthConfig {
            token_secret: settings.token_secret,
            token_ttl_seconds: settings.token_ttl_seconds,
        },
        mailer: Arc::new(LogMailer::new(MailerConfig {
            from_address: settings.mail_from,
        })),
    };

    let app = build_router(Arc::new(AppState { api }));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .nest(
            "/admin/riddle-questions/",
            admin_question_routes(state.clone()),
        )
        .with_state(state)
}

/// Admin CRUD for riddle questions. Both auth gates run before any handler:
/// layers apply outside-in, so `authenticate` is added last.
fn admin_question_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_questions).post(create_question))
        .route("/:id", put(update_question).delete(delete_question))
        .layer(middleware::from_fn(auth::require_admin))
        .layer(middleware::from_fn_with_state(state, auth::authenticate))
}

async fn healthz(State(state): State<Arc<AppState>>) -> Result<&'static str, Rejection> {
    state
        .api
        .storage
        .health_check()
        .await
        .map_err(|e| reject(ApiError::new(ErrorCode::Internal, e.to_string())))?;
    Ok("ok")
}

async fn signup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<AuthSession>, Rejection> {
    let session = server_api::signup(&state.api, request).await.map_err(reject)?;
    Ok(Json(session))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthSession>, Rejection> {
    let session = server_api::login(&state.api, &request.email, &request.password)
        .await
        .map_err(reject)?;
    Ok(Json(session))
}

async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<StatusCode, Rejection> {
    server_api::forgot_password(&state.api, &request.email)
        .await
        .map_err(reject)?;
    Ok(StatusCode::OK)
}

async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<StatusCode, Rejection> {
    server_api::reset_password(&state.api, &request.email, &request.code, &request.new_password)
        .await
        .map_err(reject)?;
    Ok(StatusCode::OK)
}

async fn list_questions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<QuestionPayload>>, Rejection> {
    let questions = server_api::list_questions(&state.api).await.map_err(reject)?;
    Ok(Json(questions))
}

async fn create_question(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Json(draft): Json<QuestionDraft>,
) -> Result<Json<QuestionPayload>, Rejection> {
    let question = validate::question_draft(&draft).map_err(reject)?;
    let payload = server_api::create_question(&state.api, &admin.0, question)
        .await
        .map_err(reject)?;
    Ok(Json(payload))
}

async fn update_question(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(draft): Json<QuestionDraft>,
) -> Result<Json<QuestionPayload>, Rejection> {
    let question = validate::question_draft(&draft).map_err(reject)?;
    let payload = server_api::update_question(&state.api, &admin.0, QuestionId(id), question)
        .await
        .map_err(reject)?;
    Ok(Json(payload))
}

async fn delete_question(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<Json<QuestionPayload>, Rejection> {
    let payload = server_api::delete_question(&state.api, &admin.0, QuestionId(id))
        .await
        .map_err(reject)?;
    Ok(Json(payload))
}

fn reject(error: ApiError) -> Rejection {
    (status_for(error.code), Json(error))
}

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
