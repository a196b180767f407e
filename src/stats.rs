use std::sync::atomic::{AtomicU64, Ordering};

/// Traffic counters of a single stream. They are updated without locking and are intended for
///  monitoring, so a [StatsSnapshot] is not guaranteed to be consistent across counters.
#[derive(Debug, Default)]
pub struct StreamStats {
    datagrams_sent: AtomicU64,
    bytes_sent: AtomicU64,
    datagrams_received: AtomicU64,
    bytes_received: AtomicU64,
    malformed_dropped: AtomicU64,
    segments_piggybacked: AtomicU64,
    segments_resent: AtomicU64,
    segments_acked: AtomicU64,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StatsSnapshot {
    pub datagrams_sent: u64,
    pub bytes_sent: u64,
    pub datagrams_received: u64,
    pub bytes_received: u64,
    /// datagrams that failed verification or parsing
    pub malformed_dropped: u64,
    /// previously sent segments that were sent again along with a new segment
    pub segments_piggybacked: u64,
    /// segments that were sent again by a flush
    pub segments_resent: u64,
    pub segments_acked: u64,
}

impl StreamStats {
    pub fn on_sent(&self, num_bytes: usize) {
        self.datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(num_bytes as u64, Ordering::Relaxed);
    }

    pub fn on_received(&self, num_bytes: usize) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(num_bytes as u64, Ordering::Relaxed);
    }

    pub fn on_malformed(&self) {
        self.malformed_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn on_piggybacked(&self, num_segments: usize) {
        self.segments_piggybacked.fetch_add(num_segments as u64, Ordering::Relaxed);
    }

    pub fn on_resent(&self, num_segments: usize) {
        self.segments_resent.fetch_add(num_segments as u64, Ordering::Relaxed);
    }

    pub fn on_acked(&self, num_segments: usize) {
        self.segments_acked.fetch_add(num_segments as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            datagrams_sent: self.datagrams_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            segments_piggybacked: self.segments_piggybacked.load(Ordering::Relaxed),
            segments_resent: self.segments_resent.load(Ordering::Relaxed),
            segments_acked: self.segments_acked.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot() {
        let stats = StreamStats::default();
        stats.on_sent(100);
        stats.on_sent(20);
        stats.on_received(7);
        stats.on_malformed();
        stats.on_piggybacked(3);
        stats.on_resent(2);
        stats.on_acked(4);
        stats.on_acked(1);

        assert_eq!(stats.snapshot(), StatsSnapshot {
            datagrams_sent: 2,
            bytes_sent: 120,
            datagrams_received: 1,
            bytes_received: 7,
            malformed_dropped: 1,
            segments_piggybacked: 3,
            segments_resent: 2,
            segments_acked: 5,
        });
    }
}
