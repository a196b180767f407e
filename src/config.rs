use std::time::Duration;
use anyhow::bail;
use crate::datagram::CHECKSUM_LEN;
use crate::packet_header::PacketHeader;
use crate::segment::Segment;

pub struct RdpConfig {
    /// This is the maximum size of a datagram (UDP payload) including the checksum. RDP never
    ///  sends bigger datagrams, and it drops received datagrams that do not fit.
    ///
    /// RDP is intended for small, latency sensitive messages, and it does not attempt MTU
    ///  discovery. The default leaves a generous margin below typical Ethernet MTUs to avoid
    ///  IP level fragmentation on routes with tunneling or optional IP headers.
    pub mtu: usize,

    /// This is the number of *segments* (not bytes) that the send and receive windows can
    ///  hold. It must be a power of two, and both peers must use the same value.
    pub window_size: u32,

    /// This is the maximum number of previously sent, still unacknowledged segments that are
    ///  sent again with every new segment. This is RDP's primary mechanism for recovering
    ///  from isolated packet loss without waiting for a flush.
    pub redundant_num: u32,

    /// A write blocks while the send window is full. If there is no room after this timeout,
    ///  the write fails.
    pub write_timeout: Duration,

    /// While blocked, a writer re-checks the send window at least this often, even if no
    ///  acknowledgement arrived.
    pub write_block_poll: Duration,

    /// interval between two flushes, i.e. re-sends of unacknowledged segments
    pub flush_interval: Duration,

    /// interval between two DIAL messages while a handshake is in progress
    pub dial_interval: Duration,
    /// `None` means that a handshake waits indefinitely
    pub dial_timeout: Option<Duration>,

    /// upper bound for the length of a single write - there is no protocol limit, but
    ///  arbitrarily large writes would tie up the send window for arbitrarily long periods
    pub max_write_len: usize,

    /// Every stream owns a buffer pool for datagrams and segment bodies. This is the number of
    ///  buffers per buffer size that will be pooled at a given time - buffers in excess of this
    ///  number are discarded when they are returned.
    pub buffer_pool_size: usize,

    /// The first sequence number of a stream. Both peers must use the same value since the
    ///  handshake does not exchange sequence numbers.
    pub initial_seq: u32,
}

impl Default for RdpConfig {
    fn default() -> Self {
        RdpConfig {
            mtu: 1200,
            window_size: 256,
            redundant_num: 3,
            write_timeout: Duration::from_secs(5),
            write_block_poll: Duration::from_millis(100),
            flush_interval: Duration::from_millis(10),
            dial_interval: Duration::from_millis(50),
            dial_timeout: Some(Duration::from_secs(15)),
            max_write_len: 2*1024*1024,
            buffer_pool_size: 1024,
            initial_seq: 0,
        }
    }
}

impl RdpConfig {
    /// The maximum body size of a single segment: a datagram with a DATA header, a single
    ///  segment and the checksum must fit into the MTU.
    pub fn max_segment_size(&self) -> usize {
        self.mtu.saturating_sub(PacketHeader::SERIALIZED_LEN_DATA + Segment::OVERHEAD + CHECKSUM_LEN)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_segment_size() == 0 {
            bail!("MTU of {} is too small to carry any data", self.mtu);
        }
        if self.mtu < PacketHeader::SERIALIZED_LEN_ACK + CHECKSUM_LEN {
            bail!("MTU of {} is too small for an ACK datagram", self.mtu);
        }
        if self.max_segment_size() > u16::MAX as usize {
            bail!("MTU of {} is too big: segment size must fit in 16 bits", self.mtu);
        }
        if self.window_size == 0 {
            bail!("window size must be positive");
        }
        if self.window_size > i32::MAX as u32 {
            bail!("window size must be less than half the sequence number range");
        }
        if !self.window_size.is_power_of_two() {
            // slots are assigned modulo window size, which must stay consistent when sequence numbers wrap around
            bail!("window size must be a power of two, is {}", self.window_size);
        }
        if self.flush_interval.is_zero() || self.dial_interval.is_zero() {
            bail!("timer intervals must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_is_valid() {
        let config = RdpConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_segment_size(), 1187);
    }

    #[rstest]
    #[case::mtu_too_small(RdpConfig { mtu: 13, ..Default::default() })]
    #[case::mtu_too_big(RdpConfig { mtu: 70_000, ..Default::default() })]
    #[case::zero_window(RdpConfig { window_size: 0, ..Default::default() })]
    #[case::huge_window(RdpConfig { window_size: u32::MAX, ..Default::default() })]
    #[case::window_not_power_of_two(RdpConfig { window_size: 100, ..Default::default() })]
    #[case::zero_flush_interval(RdpConfig { flush_interval: Duration::ZERO, ..Default::default() })]
    fn test_invalid(#[case] config: RdpConfig) {
        assert!(config.validate().is_err());
    }

    #[rstest]
    #[case::minimal(14, 1)]
    #[case::small(100, 87)]
    fn test_max_segment_size(#[case] mtu: usize, #[case] expected: usize) {
        let config = RdpConfig { mtu, ..Default::default() };
        assert_eq!(config.max_segment_size(), expected);
    }
}
