use async_trait::async_trait;

/// A reliable, ordered, message-oriented duplex stream. This is the contract a connection
///  layer programs against, so it does not need to know which transport protocol it runs on.
///
/// Messages are delivered exactly once and in the order they were written. A reader always
///  receives a complete message, never a fragment.
#[async_trait]
pub trait ReliableStream: Send + Sync {
    /// Sends a message, blocking while the transport has no capacity for it. This fails with
    ///  a timeout if capacity does not become available in time, or if the stream is closed.
    async fn write(&self, message: &[u8]) -> anyhow::Result<()>;

    /// Receives the next message into `buf`, returning its length
    async fn read(&self, buf: &mut [u8]) -> anyhow::Result<usize>;

    /// Closes the stream. Pending and future operations fail with a 'closed' error, and no
    ///  data is sent after this returns.
    async fn close(&self);
}
