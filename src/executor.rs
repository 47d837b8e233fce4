use std::sync::Arc;

use bytes::Bytes;

/// Capabilities the connection side offers the task side for one request.
///
/// The machines never call these methods themselves. They hold the handle
/// as an opaque reference, carry it through their actions so the owner can
/// make the call, and drop it on terminal transitions. Implementations are
/// expected to hop to the connection's event loop before touching the
/// channel.
pub trait RequestExecutor: Send + Sync {
    /// Write one request body part to the channel.
    fn write_request_body_part(&self, part: Bytes);

    /// Signal that the request body is complete.
    fn finish_request_body_stream(&self);

    /// Signal that the task wants another chunk of the response body.
    fn demand_response_body_stream(&self);

    /// Tear the request down.
    fn cancel_request(&self);
}

/// Capability to remove a request from a scheduler queue before execution
/// has started.
///
/// The handle is per-request; the implementor captures which queued request
/// it stands for.
pub trait RequestScheduler: Send + Sync {
    /// Remove the queued request.
    fn cancel_request(&self);
}

/// Shared handle to a [`RequestExecutor`].
pub type SharedExecutor = Arc<dyn RequestExecutor>;

/// Shared handle to a [`RequestScheduler`].
pub type SharedScheduler = Arc<dyn RequestScheduler>;
