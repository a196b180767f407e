use std::cell::Cell;
use std::time::Duration;

const RTT_WINDOW_SIZE: usize = 4;

/// Tracks recent round-trip times as observed by acknowledgements. The minimum of the most
///  recent samples is the threshold for re-sending unacknowledged segments: a segment that is
///  older than the fastest recent round trip without being acknowledged is likely lost.
///
/// Both minimums are [Duration::ZERO] until the first sample is added, which makes all
///  unacknowledged segments eligible for re-sending.
#[derive(Debug, Default)]
pub struct RttWindow {
    samples: [Duration; RTT_WINDOW_SIZE],
    next_index: usize,
    num_samples: usize,
    /// cached minimum of `samples`, `None` if it needs to be recalculated
    recent_min: Cell<Option<Duration>>,
    historical_min: Option<Duration>,
}

impl RttWindow {
    pub fn new() -> RttWindow {
        Default::default()
    }

    pub fn append(&mut self, sample: Duration) {
        self.samples[self.next_index] = sample;
        self.next_index = (self.next_index + 1) % RTT_WINDOW_SIZE;
        self.num_samples = (self.num_samples + 1).min(RTT_WINDOW_SIZE);

        // a new minimum can be cached directly. Otherwise, the overwritten sample may have been
        //  the minimum, so the minimum is recalculated lazily
        match self.recent_min.get() {
            Some(cached) if sample < cached => self.recent_min.set(Some(sample)),
            _ => self.recent_min.set(None),
        }

        if self.historical_min.map_or(true, |m| sample < m) {
            self.historical_min = Some(sample);
        }
    }

    /// the minimum of the most recent samples
    pub fn recent_min(&self) -> Duration {
        if let Some(cached) = self.recent_min.get() {
            return cached;
        }
        if self.num_samples == 0 {
            return Duration::ZERO;
        }

        let min = self.samples[..self.num_samples].iter()
            .copied()
            .min()
            .unwrap_or_default();
        self.recent_min.set(Some(min));
        min
    }

    /// the minimum of all samples ever added
    pub fn historical_min(&self) -> Duration {
        self.historical_min.unwrap_or_default()
    }

    pub fn num_samples(&self) -> usize {
        self.num_samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::empty(vec![], 0, 0)]
    #[case::single(vec![10], 10, 10)]
    #[case::decreasing(vec![10, 8, 5], 5, 5)]
    #[case::increasing(vec![5, 8, 10], 5, 5)]
    #[case::full(vec![7, 3, 9, 4], 3, 3)]
    #[case::min_overwritten(vec![3, 7, 9, 4, 8], 4, 3)]
    #[case::all_overwritten(vec![1, 2, 3, 4, 20, 21, 22, 23], 20, 1)]
    #[case::new_min_after_overwrite(vec![3, 7, 9, 4, 8, 2], 2, 2)]
    #[case::zero(vec![5, 0, 6], 0, 0)]
    fn test_min(#[case] samples: Vec<u64>, #[case] expected_recent: u64, #[case] expected_historical: u64) {
        let mut window = RttWindow::new();
        for s in &samples {
            window.append(Duration::from_millis(*s));
        }
        assert_eq!(window.recent_min(), Duration::from_millis(expected_recent));
        assert_eq!(window.historical_min(), Duration::from_millis(expected_historical));
        assert_eq!(window.num_samples(), samples.len().min(RTT_WINDOW_SIZE));
    }

    #[test]
    fn test_recent_min_interleaved_with_appends() {
        let mut window = RttWindow::new();

        window.append(Duration::from_millis(10));
        assert_eq!(window.recent_min(), Duration::from_millis(10));
        window.append(Duration::from_millis(6));
        assert_eq!(window.recent_min(), Duration::from_millis(6));
        window.append(Duration::from_millis(20));
        assert_eq!(window.recent_min(), Duration::from_millis(6));
        window.append(Duration::from_millis(30));
        window.append(Duration::from_millis(40)); // overwrites 10
        assert_eq!(window.recent_min(), Duration::from_millis(6));
        window.append(Duration::from_millis(50)); // overwrites 6
        assert_eq!(window.recent_min(), Duration::from_millis(20));
        assert_eq!(window.historical_min(), Duration::from_millis(6));
    }
}
