use std::sync::Arc;

use chrono::{Duration, Utc};
use mailer::{reset_code_mail, Mailer};
use rand::Rng;
use shared::{
    domain::{QuestionId, Role, UserId, UserSummary},
    error::{ApiError, ErrorCode},
    protocol::{AuthSession, NewQuestion, QuestionPayload, SignupRequest},
};
use storage::{NewUser, Storage, StoredQuestion, StoredUser};
use tracing::info;

pub mod auth;

use auth::{mint_token, verify_token, AuthConfig};

pub const MIN_PASSWORD_LEN: usize = 8;
pub const MIN_NAME_LEN: usize = 3;
const RESET_CODE_TTL_MINUTES: i64 = 30;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub auth: AuthConfig,
    pub mailer: Arc<dyn Mailer>,
}

pub async fn signup(ctx: &ApiContext, request: SignupRequest) -> Result<AuthSession, ApiError> {
    let name = request.name.trim();
    if name.chars().count() < MIN_NAME_LEN {
        return Err(ApiError::validation(format!(
            "name must have at least {MIN_NAME_LEN} characters"
        )));
    }
    let email = normalize_email(&request.email);
    if !email.contains('@') {
        return Err(ApiError::validation("a valid email is required"));
    }
    if request.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if ctx
        .storage
        .find_user_by_email(&email)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::new(
            ErrorCode::Conflict,
            "email is already registered",
        ));
    }

    let password_hash = bcrypt::hash(&request.password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::new(ErrorCode::Internal, e.to_string()))?;

    let user_id = ctx
        .storage
        .create_user(NewUser {
            name,
            email: &email,
            password_hash: &password_hash,
            permission: request.permission,
            user_telegram: request.user_telegram.as_deref(),
            course: request.course.as_deref(),
            discord: request.discord.as_deref(),
            disabilities: &request.disabilities,
            is_student: request.is_student,
        })
        .await
        .map_err(internal)?;

    info!(user_id = user_id.0, "user signed up");
    session_for(ctx, user_id, name, &email, Role::Participant)
}

pub async fn login(ctx: &ApiContext, email: &str, password: &str) -> Result<AuthSession, ApiError> {
    let email = normalize_email(email);
    let Some(user) = ctx
        .storage
        .find_user_by_email(&email)
        .await
        .map_err(internal)?
    else {
        return Err(invalid_credentials());
    };

    let password_matches = bcrypt::verify(password, &user.password_hash).unwrap_or(false);
    if !password_matches {
        return Err(invalid_credentials());
    }

    session_for(ctx, user.user_id, &user.name, &user.email, user.role)
}

/// Always answers Ok so responses do not reveal whether an account exists;
/// a code is stored and mailed only when the email matches a user.
pub async fn forgot_password(ctx: &ApiContext, email: &str) -> Result<(), ApiError> {
    let email = normalize_email(email);
    let Some(user) = ctx
        .storage
        .find_user_by_email(&email)
        .await
        .map_err(internal)?
    else {
        info!("password reset requested for unknown email");
        return Ok(());
    };

    let code = generate_reset_code();
    ctx.storage
        .insert_reset_code(user.user_id, &code)
        .await
        .map_err(internal)?;
    ctx.mailer
        .send(reset_code_mail(&user.email, &code))
        .await
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("failed to send reset mail: {e}")))?;

    info!(user_id = user.user_id.0, "password reset code issued");
    Ok(())
}

pub async fn reset_password(
    ctx: &ApiContext,
    email: &str,
    code: &str,
    new_password: &str,
) -> Result<(), ApiError> {
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must have at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let email = normalize_email(email);
    let Some(user) = ctx
        .storage
        .find_user_by_email(&email)
        .await
        .map_err(internal)?
    else {
        return Err(invalid_reset_code());
    };
    let Some(latest) = ctx
        .storage
        .latest_reset_code(user.user_id)
        .await
        .map_err(internal)?
    else {
        return Err(invalid_reset_code());
    };

    let expired = Utc::now() - latest.created_at > Duration::minutes(RESET_CODE_TTL_MINUTES);
    if latest.used || expired || latest.code != code {
        return Err(invalid_reset_code());
    }

    ctx.storage
        .mark_reset_code_used(latest.reset_id)
        .await
        .map_err(internal)?;
    let password_hash = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)
        .map_err(|e| ApiError::new(ErrorCode::Internal, e.to_string()))?;
    ctx.storage
        .update_password(user.user_id, &password_hash)
        .await
        .map_err(internal)?;

    info!(user_id = user.user_id.0, "password reset completed");
    Ok(())
}

pub async fn authenticate(ctx: &ApiContext, token: &str) -> Result<StoredUser, ApiError> {
    let identity = verify_token(&ctx.auth, token)
        .map_err(|_| ApiError::new(ErrorCode::Unauthorized, "invalid session token"))?;
    ctx.storage
        .load_user(identity.user_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "session user no longer exists"))
}

pub fn ensure_admin(user: &StoredUser) -> Result<(), ApiError> {
    if user.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::new(ErrorCode::Forbidden, "user is not an admin"))
    }
}

pub async fn list_questions(ctx: &ApiContext) -> Result<Vec<QuestionPayload>, ApiError> {
    let questions = ctx.storage.list_questions().await.map_err(internal)?;
    Ok(questions.into_iter().map(question_payload).collect())
}

pub async fn create_question(
    ctx: &ApiContext,
    admin: &StoredUser,
    question: NewQuestion,
) -> Result<QuestionPayload, ApiError> {
    let question_id = ctx
        .storage
        .create_question(&question)
        .await
        .map_err(internal)?;
    let stored = ctx
        .storage
        .load_question(question_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Internal, "created question not found"))?;

    info!(
        admin = admin.user_id.0,
        question_id = question_id.0,
        "riddle question created"
    );
    Ok(question_payload(stored))
}

pub async fn update_question(
    ctx: &ApiContext,
    admin: &StoredUser,
    question_id: QuestionId,
    question: NewQuestion,
) -> Result<QuestionPayload, ApiError> {
    let updated = ctx
        .storage
        .update_question(question_id, &question)
        .await
        .map_err(internal)?;
    if !updated {
        return Err(ApiError::not_found("question not found"));
    }
    let stored = ctx
        .storage
        .load_question(question_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Internal, "updated question not found"))?;

    info!(
        admin = admin.user_id.0,
        question_id = question_id.0,
        "riddle question updated"
    );
    Ok(question_payload(stored))
}

pub async fn delete_question(
    ctx: &ApiContext,
    admin: &StoredUser,
    question_id: QuestionId,
) -> Result<QuestionPayload, ApiError> {
    let stored = ctx
        .storage
        .delete_question(question_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found("question not found"))?;

    info!(
        admin = admin.user_id.0,
        question_id = question_id.0,
        "riddle question deleted"
    );
    Ok(question_payload(stored))
}

fn question_payload(stored: StoredQuestion) -> QuestionPayload {
    QuestionPayload {
        id: stored.question_id,
        index: stored.index,
        title: stored.title,
        question: stored.question,
        img_url: stored.img_url,
        clue: stored.clue,
        answer: stored.answer,
        is_legendary: stored.is_legendary,
        updated_at: stored.updated_at,
    }
}

fn session_for(
    ctx: &ApiContext,
    user_id: UserId,
    name: &str,
    email: &str,
    role: Role,
) -> Result<AuthSession, ApiError> {
    let token = mint_token(&ctx.auth, user_id, role)
        .map_err(|e| ApiError::new(ErrorCode::Internal, format!("token mint failed: {e}")))?;
    Ok(AuthSession {
        token,
        user: UserSummary {
            user_id,
            name: name.to_string(),
            email: email.to_string(),
            role,
        },
    })
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

fn generate_reset_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000))
}

fn invalid_credentials() -> ApiError {
    ApiError::new(ErrorCode::Unauthorized, "invalid email or password")
}

fn invalid_reset_code() -> ApiError {
    ApiError::validation("invalid or expired reset code")
}

fn internal(err: anyhow::Error) -> ApiError {
    ApiError::new(ErrorCode::Internal, err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
