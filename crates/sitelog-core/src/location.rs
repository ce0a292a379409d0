//! Device location fixes and their wire rendering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sent in the `*_Lat_Long` fields when no fix has been acquired.
pub const LOCATION_UNAVAILABLE: &str = "unavailable";

/// A single geolocation reading, valid at `captured_at`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

impl LocationFix {
    /// A fix taken now.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self::at(latitude, longitude, Utc::now())
    }

    pub fn at(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            captured_at,
        }
    }

    /// Comma-joined `"lat,long"`.
    pub fn lat_long(&self) -> String {
        format!("{},{}", self.latitude, self.longitude)
    }
}

/// Render an optional fix for the wire. Absence is never substituted with a
/// coordinate.
pub fn lat_long_field(fix: Option<&LocationFix>) -> String {
    match fix {
        Some(fix) => fix.lat_long(),
        None => LOCATION_UNAVAILABLE.to_string(),
    }
}
