//! Shared types for site attendance capture and paginated list sync.

pub mod attendance;
pub mod loading;
pub mod location;
pub mod page;
pub mod response;
pub mod scan;
pub mod selection;
pub mod session;

pub use attendance::{AttendanceBody, AttendanceSubmission};
pub use loading::{LoadingGuard, LoadingSignal, NoLoadingSignal};
pub use location::{LOCATION_UNAVAILABLE, LocationFix, lat_long_field};
pub use page::{FetchPage, PageRequest, PageRows};
pub use response::ApiResponse;
pub use scan::{ScanEvent, ScanParseError};
pub use selection::{ChosenSite, Selection, SelectionError};
pub use session::{MemorySession, OPERATOR_ID_KEY, SessionStore, TOKEN_KEY, clear_credentials};
