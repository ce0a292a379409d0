//! Camera and location authorization.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Camera,
    Location,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// Resolved answer to a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    Denied,
}

impl From<Decision> for PermissionStatus {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Granted => PermissionStatus::Granted,
            Decision::Denied => PermissionStatus::Denied,
        }
    }
}

/// The device's permission API.
#[async_trait]
pub trait PermissionPlatform: Send + Sync {
    async fn check(&self, capability: Capability) -> PermissionStatus;
    /// Show the system dialog and wait for the user's answer.
    async fn prompt(&self, capability: Capability) -> PermissionStatus;
}

#[derive(Debug, Default, Clone, Copy)]
struct Record {
    /// Requests resolved so far; lets a waiter see that another caller
    /// already prompted while it was queued.
    resolved: u64,
    last: Option<Decision>,
}

pub struct PermissionNegotiator {
    platform: Arc<dyn PermissionPlatform>,
    records: Mutex<HashMap<Capability, Record>>,
    prompting: tokio::sync::Mutex<()>,
}

impl PermissionNegotiator {
    pub fn new(platform: Arc<dyn PermissionPlatform>) -> Self {
        Self {
            platform,
            records: Mutex::new(HashMap::new()),
            prompting: tokio::sync::Mutex::new(()),
        }
    }

    fn record(&self, capability: Capability) -> Record {
        self.records
            .lock()
            .get(&capability)
            .copied()
            .unwrap_or_default()
    }

    pub async fn current_status(&self, capability: Capability) -> PermissionStatus {
        if self.record(capability).last == Some(Decision::Granted) {
            return PermissionStatus::Granted;
        }
        self.platform.check(capability).await
    }

    /// Ask for `capability`, prompting only while the platform reports it
    /// undetermined.
    ///
    /// A platform-level denial is returned without a dialog; nothing is
    /// retried.
    pub async fn request(&self, capability: Capability) -> Decision {
        let seen = self.record(capability);
        if seen.last == Some(Decision::Granted) {
            return Decision::Granted;
        }

        let _turn = self.prompting.lock().await;

        let current = self.record(capability);
        if current.last == Some(Decision::Granted) {
            return Decision::Granted;
        }
        if current.resolved != seen.resolved {
            if let Some(decision) = current.last {
                debug!(?capability, ?decision, "sharing result of concurrent prompt");
                return decision;
            }
        }

        let decision = match self.platform.check(capability).await {
            PermissionStatus::Granted => Decision::Granted,
            PermissionStatus::Denied => {
                debug!(?capability, "denied at platform level, not prompting");
                Decision::Denied
            }
            PermissionStatus::Undetermined => match self.platform.prompt(capability).await {
                PermissionStatus::Granted => Decision::Granted,
                _ => Decision::Denied,
            },
        };
        info!(?capability, ?decision, "permission resolved");

        let mut records = self.records.lock();
        let record = records.entry(capability).or_default();
        record.resolved += 1;
        record.last = Some(decision);
        decision
    }
}
