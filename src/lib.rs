//! Biowetter Library
//!
//! Acquisition and normalization of biometeorological data for one region.
//! The binary and the integration tests use these modules.

pub mod aggregate;
pub mod cli;
pub mod config;
pub mod data;
pub mod metrics;
pub mod server;
pub mod source;
