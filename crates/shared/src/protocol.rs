use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{QuestionId, UserSummary};

/// Full admin-facing representation of a riddle question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    pub id: QuestionId,
    pub index: i64,
    pub title: String,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clue: Option<String>,
    pub answer: String,
    pub is_legendary: bool,
    pub updated_at: DateTime<Utc>,
}

/// Create/update body as received, before field-presence validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDraft {
    #[serde(default)]
    pub index: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub img_url: Option<String>,
    #[serde(default)]
    pub clue: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub is_legendary: Option<bool>,
}

/// A draft whose required fields are all present and non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewQuestion {
    pub index: i64,
    pub title: String,
    pub question: String,
    pub img_url: Option<String>,
    pub clue: Option<String>,
    pub answer: String,
    pub is_legendary: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub permission: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_telegram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord: Option<String>,
    #[serde(default)]
    pub disabilities: Vec<String>,
    #[serde(default)]
    pub is_student: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

/// Issued after a successful signup or login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    pub user: UserSummary,
}
