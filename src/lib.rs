//! This crate contains the core logic of hostbridge.
//!
//! It routes path-addressed calls from a presentation tier to handlers on the
//! host process, and dispatches validated queries to data-access handlers.

pub mod api;
pub mod bus;
pub mod config;
pub mod core;
pub mod handler;
pub mod handlers;
pub mod logging;
pub mod routing;
pub mod store;
pub mod transport;
