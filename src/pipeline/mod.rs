//! Pipeline entry points for analyser operations.
//!
//! - `run_acquisition`: Fetch a registration range, store it and report it
//! - `run_lookup`: Fetch a single registration number
//! - `run_ranking`: Recompute rankings from a stored run
//! - `run_trend`: Classify SGPA trends across stored semesters

pub mod acquire;
pub mod rank;

pub use acquire::{run_acquisition, run_lookup};
pub use rank::{run_ranking, run_trend};
