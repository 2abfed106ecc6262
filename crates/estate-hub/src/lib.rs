//! Property lifecycle and access-control engine for a multi-tenant listing marketplace.

pub mod config;
pub mod error;
pub mod listings;
pub mod telemetry;
