//! Shared plumbing for the Avalon crates.
//!
//! Currently this is only the [`observability`] module: a single place that
//! wires `tracing` into a rolling log file so that every consumer (tests,
//! embedding applications) logs the same way.
//!
//! ```rust
//! use avalon_common::observability::{LogConfig, LogFormat};
//!
//! let cfg = LogConfig {
//!     format: LogFormat::Json,
//!     ..LogConfig::default()
//! };
//! assert_eq!(cfg.app_name, "avalon");
//! assert_eq!(cfg.default_filter, "info");
//! ```

pub mod observability;
