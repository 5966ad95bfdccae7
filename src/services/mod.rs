//! Service layer for the result analyser.
//!
//! This module contains the acquisition logic:
//! - Request admission (`RequestGate`)
//! - Page fetching with retry and URL fallback (`Fetcher`)
//! - Result page parsing (`RecordParser`)
//! - Range acquisition and single lookups (`Acquisition`)

mod acquisition;
mod fetcher;
mod limiter;
mod parser;

pub use acquisition::{Acquisition, ProgressUpdate};
pub use fetcher::{Fetched, Fetcher, HttpTransport, RawResponse, Transport, TransportError};
pub use limiter::RequestGate;
pub use parser::RecordParser;
