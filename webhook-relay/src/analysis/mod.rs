//! Analysis result fetching.
//!
//! After Cyanite reports a finished analysis, the full result is pulled with a
//! single GraphQL query authenticated by a bearer token. The response is passed
//! on untouched.

pub mod client;
pub mod query;

pub use client::{AnalysisClient, FetchError, TrackFetcher};
pub use query::{GraphQlRequest, LIBRARY_TRACK_QUERY};
