//! # Perfshot Load
//!
//! Drives a target with a fixed-length, reproducible sequence of requests.
//!
//! - [`prng`]: the seeded generator and bounded draw that make endpoint
//!   selection reproducible
//! - [`ammunition`]: the fixed, ordered endpoint list
//! - [`issuer`]: one blocking request, no retry
//! - [`scheduler`]: the shot loop

pub mod ammunition;
pub mod issuer;
pub mod prng;
pub mod scheduler;

pub use ammunition::Ammunition;
pub use issuer::{parse_endpoint, HttpIssuer, RequestIssuer, RequestOutcome};
pub use prng::Mt19937;
pub use scheduler::{LoadConfig, LoadReport, LoadScheduler, ShotFailure, MAX_RECORDED_FAILURES};
