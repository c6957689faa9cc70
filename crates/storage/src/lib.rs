use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{fs, path::Path, str::FromStr};

use shared::domain::{QuestionId, ResetRequestId, Role, UserId};
use shared::protocol::NewQuestion;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub permission: bool,
    pub user_telegram: Option<String>,
    pub course: Option<String>,
    pub discord: Option<String>,
    pub disabilities: Vec<String>,
    pub is_student: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
    pub permission: bool,
    pub user_telegram: Option<&'a str>,
    pub course: Option<&'a str>,
    pub discord: Option<&'a str>,
    pub disabilities: &'a [String],
    pub is_student: bool,
}

#[derive(Debug, Clone)]
pub struct StoredQuestion {
    pub question_id: QuestionId,
    pub index: i64,
    pub title: String,
    pub question: String,
    pub img_url: Option<String>,
    pub clue: Option<String>,
    pub answer: String,
    pub is_legendary: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct StoredResetCode {
    pub reset_id: ResetRequestId,
    pub user_id: UserId,
    pub code: String,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, user: NewUser<'_>) -> Result<UserId> {
        let disabilities = serde_json::to_string(user.disabilities)?;
        let rec = sqlx::query(
            "INSERT INTO users (name, email, password_hash, role, permission, user_telegram, course, discord, disabilities, is_student, created_at)
             VALUES (?, ?, ?, 'participant', ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.permission)
        .bind(user.user_telegram)
        .bind(user.course)
        .bind(user.discord)
        .bind(disabilities)
        .bind(user.is_student)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, role, permission, user_telegram, course, discord, disabilities, is_student, created_at
             FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    pub async fn load_user(&self, user_id: UserId) -> Result<Option<StoredUser>> {
        let row = sqlx::query(
            "SELECT id, name, email, password_hash, role, permission, user_telegram, course, discord, disabilities, is_student, created_at
             FROM users WHERE id = ?",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(user_from_row))
    }

    pub async fn set_role(&self, user_id: UserId, role: Role) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role_to_str(role))
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_password(&self, user_id: UserId, password_hash: &str) -> Result<()> {
        sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn insert_reset_code(&self, user_id: UserId, code: &str) -> Result<ResetRequestId> {
        let rec = sqlx::query(
            "INSERT INTO password_reset_codes (user_id, code, used, created_at)
             VALUES (?, ?, 0, ?) RETURNING id",
        )
        .bind(user_id.0)
        .bind(code)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(ResetRequestId(rec.get::<i64, _>(0)))
    }

    pub async fn latest_reset_code(&self, user_id: UserId) -> Result<Option<StoredResetCode>> {
        let row = sqlx::query(
            "SELECT id, user_id, code, used, created_at
             FROM password_reset_codes WHERE user_id = ?
             ORDER BY id DESC LIMIT 1",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| StoredResetCode {
            reset_id: ResetRequestId(r.get::<i64, _>(0)),
            user_id: UserId(r.get::<i64, _>(1)),
            code: r.get::<String, _>(2),
            used: r.get::<bool, _>(3),
            created_at: r.get::<DateTime<Utc>, _>(4),
        }))
    }

    pub async fn mark_reset_code_used(&self, reset_id: ResetRequestId) -> Result<()> {
        sqlx::query("UPDATE password_reset_codes SET used = 1 WHERE id = ?")
            .bind(reset_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_questions(&self) -> Result<Vec<StoredQuestion>> {
        let rows = sqlx::query(
            "SELECT id, idx, title, question, img_url, clue, answer, is_legendary, created_at, updated_at
             FROM riddle_questions ORDER BY idx ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(question_from_row).collect())
    }

    pub async fn create_question(&self, question: &NewQuestion) -> Result<QuestionId> {
        let now = Utc::now();
        let rec = sqlx::query(
            "INSERT INTO riddle_questions (idx, title, question, img_url, clue, answer, is_legendary, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        )
        .bind(question.index)
        .bind(&question.title)
        .bind(&question.question)
        .bind(question.img_url.as_deref())
        .bind(question.clue.as_deref())
        .bind(&question.answer)
        .bind(question.is_legendary)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;
        Ok(QuestionId(rec.get::<i64, _>(0)))
    }

    pub async fn load_question(&self, question_id: QuestionId) -> Result<Option<StoredQuestion>> {
        let row = sqlx::query(
            "SELECT id, idx, title, question, img_url, clue, answer, is_legendary, created_at, updated_at
             FROM riddle_questions WHERE id = ?",
        )
        .bind(question_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(question_from_row))
    }

    pub async fn update_question(
        &self,
        question_id: QuestionId,
        question: &NewQuestion,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE riddle_questions
             SET idx = ?, title = ?, question = ?, img_url = ?, clue = ?, answer = ?, is_legendary = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(question.index)
        .bind(&question.title)
        .bind(&question.question)
        .bind(question.img_url.as_deref())
        .bind(question.clue.as_deref())
        .bind(&question.answer)
        .bind(question.is_legendary)
        .bind(Utc::now())
        .bind(question_id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes the question and hands back the row as it was, so callers can
    /// return the deleted representation.
    pub async fn delete_question(
        &self,
        question_id: QuestionId,
    ) -> Result<Option<StoredQuestion>> {
        let Some(stored) = self.load_question(question_id).await? else {
            return Ok(None);
        };
        sqlx::query("DELETE FROM riddle_questions WHERE id = ?")
            .bind(question_id.0)
            .execute(&self.pool)
            .await?;
        Ok(Some(stored))
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Participant => "participant",
    }
}

fn role_from_str(raw: &str) -> Role {
    match raw {
        "admin" => Role::Admin,
        _ => Role::Participant,
    }
}

fn user_from_row(r: sqlx::sqlite::SqliteRow) -> StoredUser {
    let disabilities: Vec<String> =
        serde_json::from_str(&r.get::<String, _>(9)).unwrap_or_default();
    StoredUser {
        user_id: UserId(r.get::<i64, _>(0)),
        name: r.get::<String, _>(1),
        email: r.get::<String, _>(2),
        password_hash: r.get::<String, _>(3),
        role: role_from_str(&r.get::<String, _>(4)),
        permission: r.get::<bool, _>(5),
        user_telegram: r.get::<Option<String>, _>(6),
        course: r.get::<Option<String>, _>(7),
        discord: r.get::<Option<String>, _>(8),
        disabilities,
        is_student: r.get::<bool, _>(10),
        created_at: r.get::<DateTime<Utc>, _>(11),
    }
}

fn question_from_row(r: sqlx::sqlite::SqliteRow) -> StoredQuestion {
    StoredQuestion {
        question_id: QuestionId(r.get::<i64, _>(0)),
        index: r.get::<i64, _>(1),
        title: r.get::<String, _>(2),
        question: r.get::<String, _>(3),
        img_url: r.get::<Option<String>, _>(4),
        clue: r.get::<Option<String>, _>(5),
        answer: r.get::<String, _>(6),
        is_legendary: r.get::<bool, _>(7),
        created_at: r.get::<DateTime<Utc>, _>(8),
        updated_at: r.get::<DateTime<Utc>, _>(9),
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return Ok(());
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if path.is_empty() {
        return Ok(());
    }

    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory '{}'", parent.display())
            })?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
