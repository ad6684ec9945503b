use crate::core::{ServiceRequest, ServiceResponse};

/// A named request handler the dispatcher can route to.
///
/// Implementations are built once at startup and shared across every worker
/// thread, so they must be `Send + Sync`. `handle` runs on a blocking thread
/// and may do synchronous I/O.
pub trait Service: Send + Sync + 'static {
    /// Route names this service answers to. Each is a single path segment
    /// made of letters, digits and `_`.
    fn names(&self) -> &[String];

    /// Produce a response for `req`.
    ///
    /// An `Err` (or a panic) is a handler failure. Whether the caller sees it
    /// depends on the dispatcher's debug mode.
    fn handle(&self, req: &ServiceRequest) -> eyre::Result<ServiceResponse>;
}
