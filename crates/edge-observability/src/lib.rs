//! Structured logging for the edge rendering bridge.
//!
//! The logger is injected into the server rather than installed globally.
//! A child logger is derived per request and carries the request id and
//! matched route; entries are handed to a [`LogSink`], by default emitted
//! as `tracing` events so the host decides where they go.

mod logging;

pub use logging::*;

pub use edge_core::RequestId;
