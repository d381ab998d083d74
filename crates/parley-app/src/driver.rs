//! Gateway transport seam.
//!
//! The [`GatewayDriver`] trait decouples the runtime from the concrete
//! transport. Production plugs in a socket client; tests plug in the
//! in-memory gateway from `parley-harness`.

use std::future::Future;

use parley_proto::GatewayFrame;

/// One bidirectional connection to the messaging gateway.
///
/// # Contract
///
/// - After a successful [`open`](Self::open) the gateway confirms the session
///   by delivering a `connect` (or `connected`) frame through
///   [`recv`](Self::recv).
/// - [`recv`](Self::recv) must be cancel-safe: the runtime polls it inside
///   `select!`.
/// - [`recv`](Self::recv) returns `None` once the transport is gone; after that
///   [`is_open`](Self::is_open) is `false`.
pub trait GatewayDriver: Send {
    /// Driver-specific error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open the transport with a bearer token.
    fn open(&mut self, token: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send one frame.
    fn send(&mut self, frame: GatewayFrame) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Next inbound frame, or `None` if the transport closed.
    fn recv(&mut self) -> impl Future<Output = Option<GatewayFrame>> + Send;

    /// Close the transport. Closing a closed transport is a no-op.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// True while the transport is open.
    fn is_open(&self) -> bool;
}
