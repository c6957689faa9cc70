use shared::protocol::ResetPasswordRequest;

use crate::FormState;

pub const MIN_NAME_LEN: usize = 3;
pub const MIN_PASSWORD_LEN: usize = 8;

/// Step-0 rules of the signup flow: identity fields.
pub fn signup_identity(form: &FormState) -> Result<(), String> {
    let Some(name) = form.text("name") else {
        return Err("You must provide a name!".to_string());
    };
    if name.chars().count() < MIN_NAME_LEN {
        return Err("Your name must have at least three characters!".to_string());
    }
    let Some(email) = form.text("email") else {
        return Err("You must provide an email!".to_string());
    };
    if !email.contains('@') {
        return Err("You must provide a valid email!".to_string());
    }
    let Some(password) = form.text("password") else {
        return Err("You must provide a password!".to_string());
    };
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Your password must have at least 8 characters!".to_string());
    }
    Ok(())
}

/// Step-1 rules of the signup flow: profile fields.
pub fn signup_profile(form: &FormState) -> Result<(), String> {
    if form.flag("isStudent") && form.text("course").is_none() {
        return Err("You must provide a course if you are a student!".to_string());
    }
    if let Some(discord) = form.text("discord") {
        if !valid_discord_tag(discord) {
            return Err("You must provide a valid Discord tag!".to_string());
        }
    }
    Ok(())
}

/// Step-0 rule of the reset flow. Returns the email so the caller can hand
/// it to the backend without re-reading the form.
pub fn reset_email(form: &FormState) -> Result<String, String> {
    let Some(email) = form.text("email") else {
        return Err("You must provide an email!".to_string());
    };
    if !email.contains('@') {
        return Err("You must provide a valid email!".to_string());
    }
    Ok(email.to_string())
}

/// Step-1 rules of the reset flow, producing the request to submit.
pub fn reset_submission(form: &FormState) -> Result<ResetPasswordRequest, String> {
    let Some(code) = form.text("code") else {
        return Err("You must provide a verification code!".to_string());
    };
    let Some(new_password) = form.text("newPassword") else {
        return Err("You must provide a password!".to_string());
    };
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err("Your password must have at least 8 characters!".to_string());
    }
    Ok(ResetPasswordRequest {
        email: form.text("email").unwrap_or_default().to_string(),
        code: code.to_string(),
        new_password: new_password.to_string(),
    })
}

/// A Discord tag reads username#discriminator, the discriminator being
/// exactly four digits after the first '#'.
fn valid_discord_tag(tag: &str) -> bool {
    let Some((_, discriminator)) = tag.split_once('#') else {
        return false;
    };
    discriminator.len() == 4 && discriminator.chars().all(|c| c.is_ascii_digit())
}
