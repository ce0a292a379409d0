//! Sync layer: the backend transport contract and the paginated list protocol
//! shared by every list screen.

pub mod paginate;
pub mod transport;

#[cfg(feature = "http")]
pub mod http;

pub use paginate::{
    FetchError, FetchState, LoadOutcome, PageSource, PaginatedFetchController, SkipReason,
    TransportPageSource,
};
pub use transport::{Transport, TransportError};

#[cfg(feature = "http")]
pub use http::HttpTransport;
