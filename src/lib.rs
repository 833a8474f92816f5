//! # Auth Registry Library
//!
//! Runtime registry of pluggable authentication providers, administration of
//! their configuration rows, and conversion of externally authenticated
//! accounts to locally managed (builtin) credentials.

pub mod admin;
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod persistence;
pub mod providers;
pub mod telemetry;
pub use migration;
