//! Inter-process transport: routing calls to handlers and wrapping outcomes.

pub mod adapter;
pub mod channel;
pub mod envelope;

pub use adapter::{channel_name, ChannelCall, IpcCall, IpcRouter, RouteHandler};
pub use channel::{ChannelServer, Reply};
pub use envelope::{Envelope, ErrorBody, RouteError};
