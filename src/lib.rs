#![forbid(unsafe_code)]

//! Local dev-process supervisor.
//!
//! Starts, stops and reports on one long-running process per target, tails
//! its log and runs allow-listed `make` builds. Requests arrive through a
//! browser native messaging host ([`transport::native`]) or a loopback HTTP
//! API ([`transport::http`]); both are answered by [`Supervisor`].

#[cfg(not(unix))]
compile_error!("shipctl supervises POSIX process groups and only builds on unix targets");

pub mod config;
pub mod detect;
pub mod env_file;
pub mod errors;
pub mod models;
pub mod service;
pub mod supervisor;
pub mod transport;

pub use config::HostConfig;
pub use errors::{AppError, Result};
pub use service::Supervisor;
