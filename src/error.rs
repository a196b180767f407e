/// Errors with a meaning for application code. They are returned wrapped in `anyhow::Error`,
///  so callers can classify them with `err.downcast_ref::<RdpError>()`.
///
/// NB: Malformed datagrams and a full send window are not represented here: the former are
///      dropped silently, the latter is retried internally until the write timeout expires
#[derive(Debug, thiserror::Error)]
pub enum RdpError {
    #[error("write timed out waiting for room in the send window")]
    WriteTimeout,

    #[error("stream is closed")]
    StreamClosed,

    #[error("handshake timed out: no DialAck received")]
    HandshakeTimeout,

    #[error("message of length {len} exceeds the maximum of {max}")]
    MessageTooLarge { len: usize, max: usize },

    #[error("read buffer of length {available} is too small for a message of length {required}")]
    ReadBufferTooSmall { required: usize, available: usize },

    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),
}

impl RdpError {
    /// convenience for checking the kind of an error returned through `anyhow`
    pub fn is_closed(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<RdpError>(), Some(RdpError::StreamClosed))
    }

    pub fn is_timeout(err: &anyhow::Error) -> bool {
        matches!(err.downcast_ref::<RdpError>(), Some(RdpError::WriteTimeout))
    }
}
