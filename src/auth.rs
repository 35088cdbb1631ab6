//! Credential embedding for clone URLs
//!
//! Authenticated URLs carry the token in their userinfo. They must never be
//! logged as-is: use [`redact_url`] or [`mask_secrets`] on anything derived
//! from them before it leaves the process.

use url::Url;

use crate::error::AuthUrlError;

/// Replacement shown wherever a secret was removed
pub const REDACTED: &str = "***";

/// Username and token used for authenticated transport
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    token: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Embed these credentials into `url`
    pub fn embed(&self, url: &str) -> Result<String, AuthUrlError> {
        embed_auth(url, &self.user, &self.token)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("token", &REDACTED)
            .finish()
    }
}

/// Rewrite the authority of `url` to carry `user:token@`
///
/// Scheme, host, port, path, query and fragment are preserved. Any
/// credentials already present are replaced.
pub fn embed_auth(url: &str, user: &str, token: &str) -> Result<String, AuthUrlError> {
    let mut parsed = Url::parse(url).map_err(|e| AuthUrlError::InvalidUrl {
        url: redact_url(url),
        reason: e.to_string(),
    })?;

    if parsed.cannot_be_a_base() || !parsed.has_host() {
        return Err(AuthUrlError::CannotHaveCredentials(redact_url(url)));
    }

    parsed
        .set_username(user)
        .map_err(|_| AuthUrlError::CannotHaveCredentials(redact_url(url)))?;
    parsed
        .set_password(Some(token))
        .map_err(|_| AuthUrlError::CannotHaveCredentials(redact_url(url)))?;

    Ok(parsed.into())
}

/// Replace the password component of `url`, if any, with `***`
///
/// Strings that do not parse as URLs are returned unchanged.
pub fn redact_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if parsed.password().is_some() => {
            if parsed.set_password(Some(REDACTED)).is_err() {
                return REDACTED.to_string();
            }
            parsed.into()
        }
        _ => url.to_string(),
    }
}

/// Extract the password carried by `url`, if it has one
pub fn url_password(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.password().map(str::to_string))
}

/// Replace every occurrence of each non-empty secret in `text`
pub fn mask_secrets(text: &str, secrets: &[String]) -> String {
    secrets
        .iter()
        .filter(|secret| !secret.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret.as_str(), REDACTED))
}
