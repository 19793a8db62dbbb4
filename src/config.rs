//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::auth::{AuthContext, AuthSession};
use crate::error::ConfigError;

/// Wizard engine configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    /// Quiet period after the last change before a draft is written.
    pub autosave_debounce: Duration,
    /// Prefix for draft keys. The workflow kind is appended, so each wizard
    /// type gets exactly one draft slot.
    pub draft_namespace: String,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            autosave_debounce: Duration::from_millis(400),
            draft_namespace: "wizard_draft".to_string(),
        }
    }
}

impl WizardConfig {
    /// Draft key for a wizard type, e.g. `wizard_draft:campaign`.
    pub fn persistence_key(&self, kind: &str) -> String {
        format!("{}:{}", self.draft_namespace, kind)
    }
}

/// Runtime configuration for the `wayfare` binary.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the hosted table API. Offline mode when unset.
    pub api_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub access_token: Option<SecretString>,
    pub user_id: Option<String>,
    /// Local libSQL file holding drafts (and records in offline mode).
    pub db_path: PathBuf,
    pub wizard: WizardConfig,
}

impl AppConfig {
    /// Load from `WAYFARE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_url = non_empty("WAYFARE_API_URL").map(|u| u.trim_end_matches('/').to_string());
        let api_key = non_empty("WAYFARE_API_KEY").map(SecretString::from);
        if api_url.is_some() && api_key.is_none() {
            return Err(ConfigError::MissingEnvVar("WAYFARE_API_KEY".to_string()));
        }

        let mut wizard = WizardConfig::default();
        if let Some(raw) = non_empty("WAYFARE_DRAFT_DEBOUNCE_MS") {
            let ms: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "WAYFARE_DRAFT_DEBOUNCE_MS".to_string(),
                message: format!("expected milliseconds, got {raw:?}"),
            })?;
            wizard.autosave_debounce = Duration::from_millis(ms);
        }
        if let Some(namespace) = non_empty("WAYFARE_DRAFT_NAMESPACE") {
            wizard.draft_namespace = namespace;
        }

        Ok(Self {
            api_url,
            api_key,
            access_token: non_empty("WAYFARE_ACCESS_TOKEN").map(SecretString::from),
            user_id: non_empty("WAYFARE_USER_ID"),
            db_path: non_empty("WAYFARE_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/wayfare.db")),
            wizard,
        })
    }

    /// Auth context for submissions. Offline mode accepts a user id without a token.
    pub fn auth_context(&self) -> AuthContext {
        match &self.user_id {
            Some(user_id) => {
                let token = self
                    .access_token
                    .clone()
                    .unwrap_or_else(|| SecretString::from(String::new()));
                AuthContext::authenticated(AuthSession::new(user_id.clone(), token))
            }
            None => AuthContext::anonymous(),
        }
    }
}
