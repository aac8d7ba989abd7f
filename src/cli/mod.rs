//! Command-line presentation.
//!
//! The library core never prints; the CLI plugs [`console::ConsoleSink`] into
//! the monitor and formats one-shot queries.

pub mod console;

pub use console::ConsoleSink;
