//! Confyg API library
//!
//! Layered configuration resolution and the service components built from
//! it: logger, database pool and HTTP router.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod server;
