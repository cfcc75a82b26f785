//! CLI command implementations.
//!
//! - [`cache`] - Disk cache inspection and clearing
//! - [`config`] - Show the configuration
//! - [`fetch`] - Resolve sources through the loader
//! - [`init`] - Write the default configuration file

pub mod cache;
pub mod config;
pub mod fetch;
pub mod init;
