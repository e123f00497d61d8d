//! Process supervision: state, liveness, launch, termination and builds.
//!
//! Every operation receives its collaborators explicitly; nothing here
//! computes ambient paths or holds cross-request state.

pub mod health;
pub mod launcher;
pub mod liveness;
pub mod log_sink;
pub mod make_runner;
pub mod state_store;
pub mod target;
pub mod terminator;
pub mod tool_resolver;
