use std::{
    io::{self, Write},
    sync::Arc,
};

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{
    HttpAuthBackend, ResetPasswordWizard, SignupWizard, WizardEvent, RESET_STEP_CODE,
    RESET_STEP_EMAIL, SIGNUP_STEP_IDENTITY,
};
use serde_json::json;
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server_url: String,
    #[command(subcommand)]
    flow: Flow,
}

#[derive(Subcommand, Debug)]
enum Flow {
    /// Create an account step by step.
    Signup,
    /// Request a reset code and set a new password.
    ResetPassword,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("warn").init();
    let args = Args::parse();
    let backend = Arc::new(HttpAuthBackend::new(&args.server_url)?);

    match args.flow {
        Flow::Signup => run_signup(backend).await,
        Flow::ResetPassword => run_reset(backend).await,
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn yes(answer: &str) -> bool {
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}

fn print_events(rx: &mut broadcast::Receiver<WizardEvent>) {
    while let Ok(event) = rx.try_recv() {
        match event {
            WizardEvent::StepChanged(step) => println!("-> step {step}"),
            WizardEvent::Notice(message) => println!("!  {message}"),
            WizardEvent::ActionFailed(message) => println!("!! {message}"),
            WizardEvent::Completed => println!("done."),
        }
    }
}

async fn run_signup(backend: Arc<HttpAuthBackend>) -> Result<()> {
    let mut wizard = SignupWizard::new(backend);
    let mut events = wizard.subscribe_events();

    while wizard.step() == SIGNUP_STEP_IDENTITY {
        wizard.update_form_value(json!({
            "name": prompt("name")?,
            "email": prompt("email")?,
            "password": prompt("password")?,
        }));
        wizard.submit_identity_step();
        print_events(&mut events);
    }

    while wizard.session().is_none() {
        wizard.update_form_value(json!({
            "isStudent": yes(&prompt("student? [y/N]")?),
            "course": prompt("course (blank if none)")?,
            "discord": prompt("discord tag (blank if none)")?,
            "userTelegram": prompt("telegram (blank if none)")?,
            "canShareData": yes(&prompt("share data with partners? [y/N]")?),
        }));
        wizard.submit_profile_step().await;
        print_events(&mut events);
    }

    if let Some(session) = wizard.session() {
        println!("signed up as {}", session.user.email);
    }
    Ok(())
}

async fn run_reset(backend: Arc<HttpAuthBackend>) -> Result<()> {
    let mut wizard = ResetPasswordWizard::new(backend);
    let mut events = wizard.subscribe_events();

    while wizard.step() == RESET_STEP_EMAIL {
        wizard.update_form_value(json!({ "email": prompt("email")? }));
        wizard.submit_email_step().await;
        print_events(&mut events);
    }

    while wizard.step() == RESET_STEP_CODE {
        wizard.update_form_value(json!({
            "code": prompt("verification code")?,
            "newPassword": prompt("new password")?,
        }));
        wizard.submit_code_step().await;
        print_events(&mut events);
    }

    println!("password updated.");
    Ok(())
}
