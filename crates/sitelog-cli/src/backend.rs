//! Backend connection settings shared by every subcommand.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sitelog_core::{MemorySession, OPERATOR_ID_KEY, SessionStore, TOKEN_KEY};
use sitelog_sync::{HttpTransport, Transport};

/// Custom `Debug` redacts the token.
#[derive(clap::Args, Clone)]
pub struct BackendArgs {
    /// Backend base URL.
    #[arg(long, env = "SITELOG_BASE_URL", global = true, default_value = "http://localhost:8080/api")]
    pub base_url: String,

    /// Bearer token of the signed-in session.
    #[arg(long, env = "SITELOG_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Operator id stamped on check-ins and sent as `meId` with list requests.
    #[arg(long, env = "SITELOG_OPERATOR_ID", global = true)]
    pub operator_id: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "SITELOG_TIMEOUT_SECS", global = true, default_value_t = 30)]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for BackendArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendArgs")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("operator_id", &self.operator_id)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl BackendArgs {
    /// Session seeded from the command line / environment.
    pub fn session(&self) -> Arc<MemorySession> {
        let session = MemorySession::new();
        if let Some(token) = &self.token {
            session.set(TOKEN_KEY, token);
        }
        if let Some(operator) = &self.operator_id {
            session.set(OPERATOR_ID_KEY, operator);
        }
        Arc::new(session)
    }

    pub fn transport(&self, session: Arc<dyn SessionStore>) -> anyhow::Result<Arc<dyn Transport>> {
        let transport = HttpTransport::new(
            &self.base_url,
            Duration::from_secs(self.timeout_secs),
            session,
        )
        .context("building HTTP client")?;
        Ok(Arc::new(transport))
    }
}
