//! Attendance check-in capture pipeline.
//!
//! A [`CaptureStateMachine`] gathers preconditions through the
//! [`PermissionNegotiator`] and [`GeolocationAcquirer`], turns badge scans into
//! [`AttendanceSubmission`](sitelog_core::AttendanceSubmission)s behind a
//! [`SubmissionGate`], and reports through a [`FeedbackChannel`] that re-arms
//! scanning after a fixed delay.

pub mod feedback;
pub mod gate;
pub mod geolocation;
pub mod machine;
pub mod permission;

pub use feedback::{FeedbackChannel, FeedbackHandle, Notifier, Outcome, OutcomeKind};
pub use gate::{GatePass, SubmissionGate};
pub use geolocation::{GeolocationAcquirer, GeolocationConfig, LocationError, LocationProvider};
pub use machine::{
    CaptureConfig, CaptureDeps, CaptureError, CaptureState, CaptureStateMachine, FeedbackKind,
    ScanDisposition,
};
pub use permission::{
    Capability, Decision, PermissionNegotiator, PermissionPlatform, PermissionStatus,
};
