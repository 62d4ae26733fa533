//! Runtime secret resolution.
//!
//! Config YAML stores only env var NAMES (`auth.admin_key_env`). The value is
//! looked up once at startup and handed to the daemon state. Error messages
//! name the variable, never its value; `Debug` redacts.

use anyhow::{bail, Result};
use serde_json::Value;

/// Env var consulted when `auth.admin_key_env` is absent.
pub const DEFAULT_ADMIN_KEY_ENV: &str = "ADG_ADMIN_API_KEY";

/// Secrets resolved from the environment. **Values are redacted in `Debug` output.**
#[derive(Clone, Default)]
pub struct ResolvedSecrets {
    /// Name of the env var the admin key was read from.
    pub admin_key_env: String,
    /// `None` if the named env var was absent or blank.
    pub admin_api_key: Option<String>,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field("admin_key_env", &self.admin_key_env)
            .field(
                "admin_api_key",
                &self.admin_api_key.as_ref().map(|_| "<REDACTED>"),
            )
            .finish()
    }
}

impl ResolvedSecrets {
    /// Fails with the env var NAME when no admin key is available.
    pub fn require_admin_key(&self) -> Result<&str> {
        match self.admin_api_key.as_deref() {
            Some(k) => Ok(k),
            None => bail!(
                "SECRETS_MISSING: required env var '{}' (admin api key) is not set or empty",
                self.admin_key_env
            ),
        }
    }
}

/// Read a non-empty string at `pointer`; blank counts as absent.
pub(crate) fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve every secret the service uses.
///
/// A missing admin key is not an error here; the HTTP layer answers
/// "admin authentication not configured" instead so the health route keeps working.
pub fn resolve_secrets(config_json: &Value) -> ResolvedSecrets {
    let admin_key_env = read_str_at(config_json, "/auth/admin_key_env")
        .unwrap_or_else(|| DEFAULT_ADMIN_KEY_ENV.to_string());
    let admin_api_key = resolve_env(&admin_key_env);
    ResolvedSecrets {
        admin_key_env,
        admin_api_key,
    }
}
