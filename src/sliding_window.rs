use tokio::time::Instant;
use tracing::trace;
use crate::rtt_window::RttWindow;
use crate::segment::Segment;
use crate::seq_number::SeqNumber;

/// Number of sequence numbers after the cumulative ack that are covered by the selective ack
///  bitmap
const SELECTIVE_ACK_BITS: u32 = u32::BITS;

/// A fixed-capacity ring buffer of segments, indexed by sequence number modulo capacity. The
///  window's position is determined by its `base_seq`, which only ever moves forward.
///
/// The same data structure serves two roles:
/// * as a **send window**, it holds segments that were sent but not acknowledged yet. New
///    segments are added with [SlidingWindow::write], acknowledgements remove them and move
///    `base_seq` forward.
/// * as a **receive window**, it holds segments that were received but not delivered to the
///    application yet. Received segments are added with [SlidingWindow::set] in any order, and
///    [SlidingWindow::read] takes them out strictly in sequence.
///
/// NB: A slot is 'known' iff it contains a segment, and a segment is always stored in the slot
///      that corresponds to its sequence number. Since several sequence numbers map to the
///      same slot, a lookup must always compare the stored segment's sequence number.
pub struct SlidingWindow {
    base_seq: SeqNumber,
    capacity: u32,
    slots: Vec<Option<Segment>>,
    num_segments: usize,
}

impl SlidingWindow {
    pub fn new(capacity: u32, base_seq: SeqNumber) -> SlidingWindow {
        assert!(capacity > 0);
        SlidingWindow {
            base_seq,
            capacity,
            slots: (0..capacity).map(|_| None).collect(),
            num_segments: 0,
        }
    }

    pub fn base_seq(&self) -> SeqNumber {
        self.base_seq
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// number of segments currently stored in the window
    pub fn len(&self) -> usize {
        self.num_segments
    }

    pub fn is_empty(&self) -> bool {
        self.num_segments == 0
    }

    fn lookup(&self, seq: SeqNumber) -> Option<&Segment> {
        self.slots[seq.slot(self.capacity)].as_ref()
            .filter(|s| s.seq == seq)
    }

    /// removes the segment with a given sequence number, if it is stored in the window
    fn remove(&mut self, seq: SeqNumber) -> Option<Segment> {
        let slot = &mut self.slots[seq.slot(self.capacity)];
        if slot.as_ref().map(|s| s.seq) != Some(seq) {
            return None;
        }
        self.num_segments -= 1;
        slot.take()
    }

    fn store(&mut self, segment: Segment) {
        let slot = &mut self.slots[segment.seq.slot(self.capacity)];
        if slot.is_none() {
            self.num_segments += 1;
        }
        *slot = Some(segment);
    }

    // ----------------------------------- send role

    /// Adds a segment to the send window. Writing a segment that is already in the window is a
    ///  no-op. If there is no room for the segment because its slot is occupied by a different
    ///  segment or it is too far ahead of the window's base, the window is full, and the
    ///  segment is handed back to the caller.
    pub fn write(&mut self, segment: Segment) -> Result<(), Segment> {
        match segment.seq.offset_from(self.base_seq) {
            Some(offset) if offset < self.capacity => {}
            _ => {
                trace!("send window full: segment #{} is outside the window starting at #{}", segment.seq, self.base_seq);
                return Err(segment);
            }
        }

        match &self.slots[segment.seq.slot(self.capacity)] {
            None => {
                self.store(segment);
                Ok(())
            }
            Some(existing) if existing.seq == segment.seq => Ok(()),
            Some(_) => {
                trace!("send window full: slot for segment #{} is occupied", segment.seq);
                Err(segment)
            }
        }
    }

    /// the segment at a given offset from the window's base, if it is (still) in the window
    pub fn get(&self, offset: u32) -> Option<&Segment> {
        self.lookup(self.base_seq.plus(offset))
    }

    /// the segment with a given sequence number, regardless of its offset from the window's base
    pub fn get_by_seq(&self, seq: SeqNumber) -> Option<&Segment> {
        self.lookup(seq)
    }

    /// Removes a single segment without moving the window, e.g. because it could not be sent
    ///  in the first place
    pub fn clear(&mut self, seq: SeqNumber) -> bool {
        self.remove(seq).is_some()
    }

    fn clear_acknowledged(&mut self, seq: SeqNumber, rtt_window: &mut RttWindow, now: Instant) -> bool {
        match self.remove(seq) {
            Some(segment) => {
                rtt_window.append(now.saturating_duration_since(segment.sent_at));
                true
            }
            None => false,
        }
    }

    /// Processes an acknowledgement, removing all acknowledged segments from the send window
    ///  and feeding their round-trip times into the RTT window. Returns the number of segments
    ///  that were removed.
    ///
    /// All segments before the cumulative ack are acknowledged, moving the window's base
    ///  forward. Bit `i` of the selective ack bitmap acknowledges segment `ack + 1 + i`
    ///  without moving the window.
    ///
    /// An ack that is behind the window's base or more than its capacity ahead of it can not
    ///  refer to segments from this window, and it is ignored.
    pub fn ack(&mut self, ack: SeqNumber, ack_bits: u32, rtt_window: &mut RttWindow, now: Instant) -> usize {
        let Some(advance_by) = ack.offset_from(self.base_seq).filter(|&n| n <= self.capacity) else {
            trace!("ignoring ack #{} outside the send window starting at #{}", ack, self.base_seq);
            return 0;
        };

        let mut num_cleared = 0;
        for _ in 0..advance_by {
            if self.clear_acknowledged(self.base_seq, rtt_window, now) {
                num_cleared += 1;
            }
            self.base_seq = self.base_seq.next();
        }

        let mut remaining_bits = ack_bits;
        let mut offset = 1;
        while remaining_bits != 0 {
            if remaining_bits & 1 != 0 && self.clear_acknowledged(ack.plus(offset), rtt_window, now) {
                num_cleared += 1;
            }
            remaining_bits >>= 1;
            offset += 1;
        }

        trace!("ack #{} / {:032b}: cleared {} segments, base is now #{}", ack, ack_bits, num_cleared, self.base_seq);
        num_cleared
    }

    // ----------------------------------- receive role

    /// Stores a received segment. Segments behind the window's base (i.e. already delivered)
    ///  or more than its capacity ahead of it are rejected, and so are segments whose slot is
    ///  already occupied.
    ///
    /// As an exception, a segment with the base sequence number replaces whatever is in its
    ///  slot: this is the segment a reader is waiting for.
    pub fn set(&mut self, segment: Segment) -> bool {
        if !segment.seq.offset_from(self.base_seq).is_some_and(|offset| offset <= self.capacity) {
            trace!("received segment #{} is outside the receive window starting at #{} - dropping", segment.seq, self.base_seq);
            return false;
        }

        if let Some(existing) = &self.slots[segment.seq.slot(self.capacity)] {
            if segment.seq != self.base_seq {
                trace!("slot for received segment #{} is occupied by #{} - dropping", segment.seq, existing.seq);
                return false;
            }
            trace!("replacing segment #{} by #{} in the receive window's base slot", existing.seq, segment.seq);
        }

        self.store(segment);
        true
    }

    /// takes the next in-sequence segment out of the receive window, moving its base forward
    pub fn read(&mut self) -> Option<Segment> {
        let result = self.remove(self.base_seq)?;
        self.base_seq = self.base_seq.next();
        Some(result)
    }

    /// Returns the cumulative ack (i.e. the next sequence number to be read) and a selective
    ///  ack bitmap for the segments after it that are in the window.
    pub fn get_ack(&self) -> (SeqNumber, u32) {
        let mut ack_bits = 0u32;
        for i in 0..SELECTIVE_ACK_BITS.min(self.capacity) {
            if self.lookup(self.base_seq.plus(1 + i)).is_some() {
                ack_bits |= 1 << i;
            }
        }
        (self.base_seq, ack_bits)
    }
}
