//! Client for a remote ingestion service.
//!
//! Submits ingestion jobs, follows them by polling until they finish, and
//! remembers the job in flight so a restarted client can resume watching it.
//! See [`core::JobMonitor`] for the entry point.

pub mod api;
pub mod cli;
pub mod config;
pub mod context;
pub mod core;
pub mod logging;
