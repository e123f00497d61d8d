//! Request transports.
//!
//! [`native`] answers one length-prefixed frame on stdio per launch, framed
//! by [`codec`]. [`http`] serves the same actions as JSON routes.

pub mod codec;
pub mod http;
pub mod native;
