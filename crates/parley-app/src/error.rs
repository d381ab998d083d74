//! Runtime error types.

use parley_proto::ProtocolError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised around the sync engine.
///
/// None of these stop the runtime. Transport failures are fed back into the
/// client as a lost connection; directory failures are logged and the request
/// is dropped.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime task has exited.
    #[error("runtime stopped")]
    Stopped,

    /// Gateway transport failure.
    #[error("gateway driver: {0}")]
    Driver(#[source] BoxError),

    /// Conversation directory failure.
    #[error("conversation directory: {0}")]
    Directory(#[source] BoxError),

    /// Outbound event could not be encoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl RuntimeError {
    pub(crate) fn driver(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Driver(Box::new(err))
    }

    pub(crate) fn directory(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Directory(Box::new(err))
    }
}
