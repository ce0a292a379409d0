//! Single cached location fix.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sitelog_core::LocationFix;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocationError {
    #[error("location unavailable: {0}")]
    Unavailable(String),
    #[error("location request timed out after {0:?}")]
    TimedOut(Duration),
}

/// The device's location API.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    async fn current_fix(&self) -> Result<LocationFix, LocationError>;
}

#[derive(Debug, Clone)]
pub struct GeolocationConfig {
    /// Upper bound on one platform location call.
    pub timeout: Duration,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
        }
    }
}

/// Fetches fixes and keeps the most recent one.
///
/// Not guarded against concurrent `acquire` calls; the capture state machine
/// only calls it while awaiting preconditions.
pub struct GeolocationAcquirer {
    provider: Arc<dyn LocationProvider>,
    config: GeolocationConfig,
    cached: Mutex<Option<LocationFix>>,
}

impl GeolocationAcquirer {
    pub fn new(provider: Arc<dyn LocationProvider>, config: GeolocationConfig) -> Self {
        Self {
            provider,
            config,
            cached: Mutex::new(None),
        }
    }

    /// Fetch a fresh fix. On success it replaces the cached fix; on failure
    /// the cached fix is kept.
    pub async fn acquire(&self) -> Result<LocationFix, LocationError> {
        let result = tokio::time::timeout(self.config.timeout, self.provider.current_fix())
            .await
            .unwrap_or(Err(LocationError::TimedOut(self.config.timeout)));

        match result {
            Ok(fix) => {
                debug!(lat = fix.latitude, long = fix.longitude, "location fix acquired");
                *self.cached.lock() = Some(fix);
                Ok(fix)
            }
            Err(e) => {
                warn!(error = %e, has_previous = self.cached.lock().is_some(), "location fix failed");
                Err(e)
            }
        }
    }

    /// The most recent successful fix, if any.
    pub fn latest(&self) -> Option<LocationFix> {
        *self.cached.lock()
    }
}
