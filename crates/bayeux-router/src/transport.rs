//! Transport seam
//!
//! The engine never touches sockets. Whatever carries the HTTP
//! long-poll (or a test harness) hands each request's reply channel to
//! the dispatcher as a [`Transport`]. Closing after a write is what
//! completes the client's poll, so implementations must treat `close`
//! as the normal end of a request, not an error path.

use std::sync::Arc;

/// One client-visible reply channel, bound to a connection until the
/// client polls again.
pub trait Transport: Send + Sync {
    /// Whether a write would currently reach the client.
    fn is_writable(&self) -> bool;

    /// Write the full response body.
    fn write(&self, payload: &str);

    /// Release the channel, completing the client's poll.
    fn close(&self);
}

/// Shared transport handle as stored on a connection.
pub type TransportHandle = Arc<dyn Transport>;
