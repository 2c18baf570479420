//! Bearer credentials for mutating catalog calls.
//!
//! The core only ever reads a credential; login/logout belongs to the host,
//! which decides which provider to hand to the API client.

use std::sync::{Arc, RwLock};

pub trait CredentialProvider: Send + Sync {
    /// Current bearer token, or `None` when nobody is signed in.
    fn bearer_token(&self) -> Option<String>;
}

/// No credential at all; every mutating call fails fast.
#[derive(Debug, Clone, Default)]
pub struct NoCredentials;

impl CredentialProvider for NoCredentials {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl CredentialProvider for StaticCredentials {
    fn bearer_token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

/// Reads the token from an environment variable on every call, so a rotated
/// token is picked up without a restart.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl CredentialProvider for EnvCredentials {
    fn bearer_token(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

/// Host-settable credential slot (set on login, cleared on logout).
#[derive(Debug, Clone, Default)]
pub struct SharedCredentials {
    token: Arc<RwLock<Option<String>>>,
}

impl SharedCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: impl Into<String>) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token.into());
        }
    }

    pub fn clear(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
        }
    }
}

impl CredentialProvider for SharedCredentials {
    fn bearer_token(&self) -> Option<String> {
        self.token.read().ok().and_then(|t| t.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_credentials_login_logout() {
        let creds = SharedCredentials::new();
        assert!(creds.bearer_token().is_none());

        creds.set("abc123");
        let observer = creds.clone();
        assert_eq!(observer.bearer_token().as_deref(), Some("abc123"));

        creds.clear();
        assert!(observer.bearer_token().is_none());
    }

    #[test]
    fn test_env_credentials_missing_var() {
        let creds = EnvCredentials::new("PULPIT_TEST_TOKEN_THAT_IS_NEVER_SET");
        assert!(creds.bearer_token().is_none());
    }

    #[test]
    fn test_static_and_none() {
        assert_eq!(StaticCredentials::new("t").bearer_token().as_deref(), Some("t"));
        assert!(NoCredentials.bearer_token().is_none());
    }
}
