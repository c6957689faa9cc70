use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shared::{
    error::{ApiError, ApiException},
    protocol::{AuthSession, ForgotPasswordRequest, ResetPasswordRequest, SignupRequest},
};
use tokio::sync::broadcast;
use tracing::warn;
use url::Url;

pub mod validation;

pub const SIGNUP_STEP_IDENTITY: usize = 0;
pub const SIGNUP_STEP_PROFILE: usize = 1;
pub const SIGNUP_STEPS: usize = 2;

pub const RESET_STEP_EMAIL: usize = 0;
pub const RESET_STEP_CODE: usize = 1;
pub const RESET_STEP_DONE: usize = 2;
pub const RESET_STEPS: usize = 3;

/// Accumulated form value shared by every step of a wizard. Step views push
/// partial updates; the form therefore always carries the values of every
/// step. Updates merge key by key and the last write to a key wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    fields: serde_json::Map<String, Value>,
}

impl FormState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow-merges `partial` into the form. Anything but a JSON object is
    /// ignored.
    pub fn merge(&mut self, partial: Value) {
        if let Value::Object(entries) = partial {
            for (key, value) in entries {
                self.fields.insert(key, value);
            }
        }
    }

    /// A trimmed, non-empty text field; empty strings count as absent.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    pub fn flag(&self, key: &str) -> bool {
        self.fields.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.fields
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Events a front-end renders: step changes, user-facing notices from
/// validation, failed remote actions, and flow completion.
#[derive(Debug, Clone)]
pub enum WizardEvent {
    StepChanged(usize),
    Notice(String),
    ActionFailed(String),
    Completed,
}

/// Remote boundary of the wizards.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn signup(&self, request: SignupRequest) -> Result<AuthSession>;
    async fn forgot_password(&self, email: &str) -> Result<()>;
    async fn reset_password(&self, request: ResetPasswordRequest) -> Result<()>;
}

pub struct MissingAuthBackend;

#[async_trait]
impl AuthBackend for MissingAuthBackend {
    async fn signup(&self, _request: SignupRequest) -> Result<AuthSession> {
        Err(anyhow!("auth backend is unavailable"))
    }

    async fn forgot_password(&self, _email: &str) -> Result<()> {
        Err(anyhow!("auth backend is unavailable"))
    }

    async fn reset_password(&self, _request: ResetPasswordRequest) -> Result<()> {
        Err(anyhow!("auth backend is unavailable"))
    }
}

pub struct HttpAuthBackend {
    http: Client,
    server_url: Url,
}

impl HttpAuthBackend {
    pub fn new(server_url: &str) -> Result<Self> {
        let mut server_url = Url::parse(server_url)?;
        if !server_url.path().ends_with('/') {
            let path = format!("{}/", server_url.path());
            server_url.set_path(&path);
        }
        Ok(Self {
            http: Client::new(),
            server_url,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.server_url.join(path)?)
    }
}

/// Decodes error bodies into the shared `ApiError` so callers see the
/// server's own message instead of a bare status code.
async fn into_api_result(response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(error) => Err(ApiException::from(error).into()),
        Err(_) => Err(anyhow!("request failed with status {status}")),
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    async fn signup(&self, request: SignupRequest) -> Result<AuthSession> {
        let response = self
            .http
            .post(self.endpoint("signup")?)
            .json(&request)
            .send()
            .await?;
        let response = into_api_result(response).await?;
        Ok(response.json().await?)
    }

    async fn forgot_password(&self, email: &str) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint("forgot-password")?)
            .json(&ForgotPasswordRequest {
                email: email.to_string(),
            })
            .send()
            .await?;
        into_api_result(response).await?;
        Ok(())
    }

    async fn reset_password(&self, request: ResetPasswordRequest) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint("reset-password")?)
            .json(&request)
            .send()
            .await?;
        into_api_result(response).await?;
        Ok(())
    }
}

/// Two-step signup: identity (name/email/password) then profile. One busy
/// flag guards every entry point against double submission; there is no
/// queueing or retry.
pub struct SignupWizard {
    backend: Arc<dyn AuthBackend>,
    step: usize,
    form: FormState,
    signing_up: bool,
    session: Option<AuthSession>,
    events: broadcast::Sender<WizardEvent>,
}

impl SignupWizard {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            backend,
            step: SIGNUP_STEP_IDENTITY,
            form: FormState::new(),
            signing_up: false,
            session: None,
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn is_signing_up(&self) -> bool {
        self.signing_up
    }

    /// The session issued by the backend once signup completed.
    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn update_form_value(&mut self, partial: Value) {
        self.form.merge(partial);
    }

    /// Step ball click: a forward move passes through the current step's
    /// validation gate, a backward move is free.
    pub fn handle_step_click(&mut self, new_step: usize) {
        if self.signing_up || new_step >= SIGNUP_STEPS {
            return;
        }
        if self.step == SIGNUP_STEP_IDENTITY && new_step == SIGNUP_STEP_PROFILE {
            self.submit_identity_step();
        } else {
            self.set_step(new_step);
        }
    }

    pub fn submit_identity_step(&mut self) {
        if self.signing_up {
            return;
        }
        match validation::signup_identity(&self.form) {
            Ok(()) => self.set_step(SIGNUP_STEP_PROFILE),
            Err(notice) => self.notify(notice),
        }
    }

    pub async fn submit_profile_step(&mut self) {
        if self.signing_up {
            return;
        }
        if let Err(notice) = validation::signup_profile(&self.form) {
            self.notify(notice);
            return;
        }
        // Identity fields were validated on step 0, but the user may have
        // navigated back and edited them since.
        if let Err(notice) = validation::signup_identity(&self.form) {
            self.notify(notice);
            return;
        }

        let request = self.signup_request();
        self.signing_up = true;
        match self.backend.signup(request).await {
            Ok(session) => {
                self.session = Some(session);
                let _ = self.events.send(WizardEvent::Completed);
            }
            Err(error) => {
                warn!(%error, "signup request failed");
                let _ = self
                    .events
                    .send(WizardEvent::ActionFailed(error.to_string()));
            }
        }
        self.signing_up = false;
    }

    fn signup_request(&self) -> SignupRequest {
        SignupRequest {
            name: self.form.text("name").unwrap_or_default().to_string(),
            email: self.form.text("email").unwrap_or_default().to_string(),
            password: self.form.text("password").unwrap_or_default().to_string(),
            permission: self.form.flag("canShareData"),
            user_telegram: self.form.text("userTelegram").map(str::to_string),
            course: self.form.text("course").map(str::to_string),
            discord: self.form.text("discord").map(str::to_string),
            disabilities: self.form.string_list("disabilities"),
            is_student: self.form.flag("isStudent"),
        }
    }

    fn set_step(&mut self, step: usize) {
        self.step = step;
        let _ = self.events.send(WizardEvent::StepChanged(step));
    }

    fn notify(&self, message: String) {
        let _ = self.events.send(WizardEvent::Notice(message));
    }
}

/// Three-step password reset: email, code + new password, done. The two
/// async actions have their own busy flags and both gate every entry point.
pub struct ResetPasswordWizard {
    backend: Arc<dyn AuthBackend>,
    step: usize,
    form: FormState,
    sending_code: bool,
    resetting_password: bool,
    events: broadcast::Sender<WizardEvent>,
}

impl ResetPasswordWizard {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            backend,
            step: RESET_STEP_EMAIL,
            form: FormState::new(),
            sending_code: false,
            resetting_password: false,
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WizardEvent> {
        self.events.subscribe()
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn form(&self) -> &FormState {
        &self.form
    }

    pub fn is_sending_code(&self) -> bool {
        self.sending_code
    }

    pub fn is_resetting_password(&self) -> bool {
        self.resetting_password
    }

    pub fn is_busy(&self) -> bool {
        self.sending_code || self.resetting_password
    }

    pub fn update_form_value(&mut self, partial: Value) {
        self.form.merge(partial);
    }

    pub async fn handle_step_click(&mut self, new_step: usize) {
        if self.is_busy() || new_step >= RESET_STEPS {
            return;
        }
        if self.step == RESET_STEP_EMAIL && new_step > RESET_STEP_EMAIL {
            self.submit_email_step().await;
        } else if self.step == RESET_STEP_CODE && new_step > RESET_STEP_CODE {
            self.submit_code_step().await;
        } else {
            self.set_step(new_step);
        }
    }

    pub async fn submit_email_step(&mut self) {
        if self.is_busy() {
            return;
        }
        let email = match validation::reset_email(&self.form) {
            Ok(email) => email,
            Err(notice) => {
                self.notify(notice);
                return;
            }
        };

        self.sending_code = true;
        match self.backend.forgot_password(&email).await {
            Ok(()) => self.set_step(RESET_STEP_CODE),
            Err(error) => {
                warn!(%error, "failed to request reset code");
                let _ = self
                    .events
                    .send(WizardEvent::ActionFailed(error.to_string()));
            }
        }
        self.sending_code = false;
    }

    pub async fn submit_code_step(&mut self) {
        if self.is_busy() {
            return;
        }
        let request = match validation::reset_submission(&self.form) {
            Ok(request) => request,
            Err(notice) => {
                self.notify(notice);
                return;
            }
        };

        self.resetting_password = true;
        match self.backend.reset_password(request).await {
            Ok(()) => {
                self.set_step(RESET_STEP_DONE);
                let _ = self.events.send(WizardEvent::Completed);
            }
            Err(error) => {
                warn!(%error, "failed to reset password");
                let _ = self
                    .events
                    .send(WizardEvent::ActionFailed(error.to_string()));
            }
        }
        self.resetting_password = false;
    }

    fn set_step(&mut self, step: usize) {
        self.step = step;
        let _ = self.events.send(WizardEvent::StepChanged(step));
    }

    fn notify(&self, message: String) {
        let _ = self.events.send(WizardEvent::Notice(message));
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
