//! Credential resolution for the ICANN account API
//!
//! Credentials come from, in order of precedence, the configuration file,
//! the environment (`CZDS_USERNAME` / `CZDS_PASSWORD`, `.env` honoured), and
//! finally an interactive prompt. The password never appears in logs or
//! `Debug` output.

use std::env;
use std::fmt;
use std::io::{self, Write};

use crate::constants::env as env_constants;
use crate::errors::{AuthError, AuthResult};

/// Maximum accepted username length (ICANN usernames are e-mail addresses)
const MAX_USERNAME_LENGTH: usize = 254;

/// Username/password pair exchanged for a bearer token
///
/// Immutable once constructed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Create credentials, rejecting empty or malformed input
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> AuthResult<Self> {
        let username = username.into().trim().to_string();
        let password = password.into();

        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        if !is_valid_username(&username) {
            return Err(AuthError::InvalidInput {
                reason: "Username must not contain whitespace or control characters".to_string(),
            });
        }

        Ok(Self { username, password })
    }

    /// Account username
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Account password
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Validate username format
fn is_valid_username(username: &str) -> bool {
    username.len() <= MAX_USERNAME_LENGTH
        && !username
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
}

/// Check if credentials exist in environment variables
pub fn check_credentials() -> bool {
    env_value(env_constants::USERNAME).is_some() && env_value(env_constants::PASSWORD).is_some()
}

/// Read a non-empty environment variable
fn env_value(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

/// Pick the first non-empty value, config file first
fn first_present(configured: Option<String>, from_env: Option<String>) -> Option<String> {
    configured
        .filter(|value| !value.trim().is_empty())
        .or(from_env)
}

/// Resolve credentials from the config file, the environment, and (if
/// allowed) the terminal
///
/// # Errors
///
/// Returns `AuthError::MissingCredentials` if a value is still missing after
/// every source was consulted, or `AuthError::Prompt` if the terminal cannot
/// be read.
pub fn resolve_credentials(
    configured_username: Option<String>,
    configured_password: Option<String>,
    interactive: bool,
) -> AuthResult<Credentials> {
    let username = first_present(configured_username, env_value(env_constants::USERNAME));
    let password = first_present(configured_password, env_value(env_constants::PASSWORD));

    let username = match username {
        Some(username) => username,
        None if interactive => prompt_username()?,
        None => return Err(AuthError::MissingCredentials),
    };

    let password = match password {
        Some(password) => password,
        None if interactive => prompt_password()?,
        None => return Err(AuthError::MissingCredentials),
    };

    tracing::debug!("Resolved credentials for user: {}", username);
    Credentials::new(username, password)
}

/// Prompt user for the account username
pub fn prompt_username() -> AuthResult<String> {
    print!("ICANN username: ");
    io::stdout().flush()?;

    let mut username = String::new();
    io::stdin().read_line(&mut username)?;
    let username = username.trim().to_string();

    if username.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(username)
}

/// Prompt user for the account password without echoing it
pub fn prompt_password() -> AuthResult<String> {
    let password = rpassword::prompt_password("ICANN password: ")?;
    accept_prompted_password(password)
}

/// Keep a typed password exactly as entered; only an empty entry is refused
fn accept_prompted_password(password: String) -> AuthResult<String> {
    if password.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(password)
}
