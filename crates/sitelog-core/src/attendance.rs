//! Attendance check-in submissions and their backend wire shape.

use serde::{Deserialize, Serialize};

use crate::location::{LocationFix, lat_long_field};
use crate::scan::ScanEvent;
use crate::selection::ChosenSite;

/// One check-in request. Immutable once built.
///
/// A single scan produces a single submission: the "out" leg repeats the
/// operator and location of the "in" leg.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceSubmission {
    site: ChosenSite,
    scan: ScanEvent,
    location: Option<LocationFix>,
    operator_id: String,
}

impl AttendanceSubmission {
    pub fn new(
        site: ChosenSite,
        scan: ScanEvent,
        location: Option<LocationFix>,
        operator_id: impl Into<String>,
    ) -> Self {
        Self {
            site,
            scan,
            location,
            operator_id: operator_id.into(),
        }
    }

    pub fn site(&self) -> ChosenSite {
        self.site
    }

    pub fn scan(&self) -> &ScanEvent {
        &self.scan
    }

    pub fn location(&self) -> Option<&LocationFix> {
        self.location.as_ref()
    }

    pub fn operator_id(&self) -> &str {
        &self.operator_id
    }

    pub fn has_location(&self) -> bool {
        self.location.is_some()
    }

    /// The JSON body expected by the attendance endpoint.
    pub fn body(&self) -> AttendanceBody {
        let lat_long = lat_long_field(self.location.as_ref());
        AttendanceBody {
            vid: self.scan.vendor_id(),
            cw_id: self.scan.worker_id(),
            taker_in_id: self.operator_id.clone(),
            in_lat_long: lat_long.clone(),
            project_id: self.site.project_id,
            sub_project_id: self.site.sub_project_id,
            taker_out_id: self.operator_id.clone(),
            out_lat_long: lat_long,
        }
    }
}

/// Backend field names are fixed by the existing API and kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceBody {
    pub vid: i64,
    #[serde(rename = "CW_Id")]
    pub cw_id: i64,
    #[serde(rename = "Attendance_Taker_IN_Id")]
    pub taker_in_id: String,
    #[serde(rename = "In_Lat_Long")]
    pub in_lat_long: String,
    #[serde(rename = "ProjectId")]
    pub project_id: i64,
    #[serde(rename = "SubProjectId")]
    pub sub_project_id: i64,
    #[serde(rename = "Attendance_Taker_OUT_Id")]
    pub taker_out_id: String,
    #[serde(rename = "Out_Lat_Long")]
    pub out_lat_long: String,
}
