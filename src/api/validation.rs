//! Input validation for API requests.

use lazy_static::lazy_static;
use regex::Regex;
use url::Url;

lazy_static! {
    /// Loose email pattern: something, an @, a domain with a dot. Matches
    /// what the account schema has always accepted.
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Minimum password length. Strength policy beyond this lives in the UI.
const MIN_PASSWORD_LEN: usize = 6;

pub fn validate_name(name: &str) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("Name is required".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }
    Ok(())
}

/// Check that an image URL is syntactically well-formed and http(s).
/// Called before any network traffic is spent on it.
pub fn validate_image_url(input: &str) -> Result<(), String> {
    let url = Url::parse(input).map_err(|_| "Invalid URL".to_string())?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(format!("Unsupported URL scheme: {}", other)),
    }
}
