//! Regional value content calculation and certificate-of-origin workflows for USMCA compliance.

pub mod config;
pub mod error;
pub mod gateway;
pub mod telemetry;
pub mod workflows;
