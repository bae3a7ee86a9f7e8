//! Core abstractions for hostbridge
//!
//! Error types, the per-call request context, startup wiring and the
//! readiness flag.

pub mod container;
pub mod context;
pub mod error;
pub mod status;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use container::ServiceContainer;
pub use context::RequestContext;
pub use error::{BridgeError, BridgeResult, ErrorCode};
