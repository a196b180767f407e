use anyhow::bail;
use bytes::{Buf, BufMut};
use tokio::time::Instant;
use crate::buffers::buffer_pool::PooledBuf;
use crate::safe_converter::{PrecheckedCast, SafeCast};
use crate::seq_number::SeqNumber;

/// A segment is the unit of application data on the wire. A single write is split into
///  segments that are small enough to fit into a datagram, and a datagram can contain several
///  segments packed back to back:
///
/// ```ascii
/// 0: sequence number (u32 BE)
/// 4: body size (u16 BE)
/// 6: continuation flag (u8): 1 if more segments of the same write follow, 0 for the last one
/// 7: body
/// ```
#[derive(Debug)]
pub struct Segment {
    pub seq: SeqNumber,
    pub is_continuation: bool,
    pub body: PooledBuf,
    /// local timestamp of the segment's first transmission, never sent over the wire
    pub sent_at: Instant,
}

impl Segment {
    pub const OVERHEAD: usize = 7;

    pub fn size(&self) -> usize {
        self.body.len()
    }

    pub fn serialized_len(&self) -> usize {
        Self::OVERHEAD + self.size()
    }

    /// NB: This writes nothing if there is not enough room for the entire segment
    pub fn ser(&self, buf: &mut impl BufMut) -> anyhow::Result<()> {
        if buf.remaining_mut() < self.serialized_len() {
            bail!("no room for segment #{}: {} bytes required, {} available", self.seq, self.serialized_len(), buf.remaining_mut());
        }

        buf.put_u32(self.seq.to_raw());
        buf.put_u16(self.size().prechecked_cast());
        buf.put_u8(if self.is_continuation { 1 } else { 0 });
        buf.put_slice(self.body.as_ref());
        Ok(())
    }

    /// Parses a segment, copying its body into a buffer provided by the caller. This fails if
    ///  the buffer does not contain a complete segment, or if the body does not fit into the
    ///  provided body buffer.
    pub fn deser(buf: &mut impl Buf, mut body: PooledBuf, received_at: Instant) -> anyhow::Result<Segment> {
        if buf.remaining() < Self::OVERHEAD {
            bail!("incomplete segment header");
        }

        let seq = SeqNumber::from_raw(buf.get_u32());
        let size: usize = buf.get_u16().safe_cast();
        let is_continuation = buf.get_u8() != 0;

        if size > buf.remaining() {
            bail!("segment #{} declares a body size of {} but only {} bytes are left", seq, size, buf.remaining());
        }
        if size > body.capacity() {
            bail!("segment #{} declares a body size of {} which exceeds the maximum segment size of {}", seq, size, body.capacity());
        }

        body.truncate(size);
        buf.copy_to_slice(body.as_mut());

        Ok(Segment {
            seq,
            is_continuation,
            body,
            sent_at: received_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::buffer_pool::BufferPool;
    use rstest::rstest;

    fn segment(pool: &std::sync::Arc<BufferPool>, seq: u32, is_continuation: bool, body: &[u8]) -> Segment {
        let mut buf = pool.get_from_pool(1187);
        buf.put_slice(body);
        Segment {
            seq: SeqNumber::from_raw(seq),
            is_continuation,
            body: buf,
            sent_at: Instant::now(),
        }
    }

    #[rstest]
    #[case::empty(0, false, vec![], vec![0,0,0,0, 0,0, 0])]
    #[case::simple(0x01020304, false, vec![b'a', b'b'], vec![1,2,3,4, 0,2, 0, b'a', b'b'])]
    #[case::continuation(7, true, vec![9], vec![0,0,0,7, 0,1, 1, 9])]
    #[case::max_seq(u32::MAX, true, vec![1,2,3], vec![255,255,255,255, 0,3, 1, 1,2,3])]
    fn test_ser(#[case] seq: u32, #[case] is_continuation: bool, #[case] body: Vec<u8>, #[case] expected: Vec<u8>) {
        let pool = BufferPool::new(4);
        let segment = segment(&pool, seq, is_continuation, &body);

        let mut buf = Vec::new();
        segment.ser(&mut buf).unwrap();
        assert_eq!(buf, expected);
        assert_eq!(segment.serialized_len(), expected.len());
    }

    #[rstest]
    #[case::empty(0, false, 0)]
    #[case::small(12345, true, 17)]
    #[case::max_size(u32::MAX, false, 1187)]
    fn test_round_trip(#[case] seq: u32, #[case] is_continuation: bool, #[case] size: usize) {
        let pool = BufferPool::new(4);
        let body = (0..size).map(|i| i as u8).collect::<Vec<_>>();
        let original = segment(&pool, seq, is_continuation, &body);

        let mut buf = Vec::new();
        original.ser(&mut buf).unwrap();

        let mut b: &[u8] = &buf;
        let deser = Segment::deser(&mut b, pool.get_from_pool(1187), Instant::now()).unwrap();
        assert!(b.is_empty());
        assert_eq!(deser.seq, original.seq);
        assert_eq!(deser.is_continuation, is_continuation);
        assert_eq!(deser.size(), size);
        assert_eq!(deser.body.as_ref(), body.as_slice());
    }

    #[test]
    fn test_deser_consecutive() {
        let raw = vec![
            0,0,0,1, 0,2, 1, b'a', b'b',
            0,0,0,2, 0,1, 0, b'c',
            0,0,0,3, // incomplete trailing segment
        ];
        let pool = BufferPool::new(4);

        let mut b: &[u8] = &raw;
        let mut parsed = Vec::new();
        while let Ok(segment) = Segment::deser(&mut b, pool.get_from_pool(100), Instant::now()) {
            parsed.push((segment.seq.to_raw(), segment.is_continuation, segment.body.as_ref().to_vec()));
        }

        assert_eq!(parsed, vec![
            (1, true, b"ab".to_vec()),
            (2, false, b"c".to_vec()),
        ]);
    }

    #[rstest]
    #[case::empty(vec![], 100)]
    #[case::incomplete_header(vec![0,0,0,1, 0,2], 100)]
    #[case::incomplete_body(vec![0,0,0,1, 0,3, 0, 1,2], 100)]
    #[case::body_exceeds_capacity(vec![0,0,0,1, 0,3, 0, 1,2,3], 2)]
    fn test_deser_invalid(#[case] raw: Vec<u8>, #[case] body_capacity: usize) {
        let pool = BufferPool::new(4);
        let mut b: &[u8] = &raw;
        assert!(Segment::deser(&mut b, pool.get_from_pool(body_capacity), Instant::now()).is_err());
    }

    #[test]
    fn test_ser_no_room() {
        let pool = BufferPool::new(4);
        let segment = segment(&pool, 1, false, b"abc");

        let mut storage = [0u8; 9];
        let mut buf: &mut [u8] = &mut storage;
        assert!(segment.ser(&mut buf).is_err());
        assert_eq!(buf.len(), 9);
    }
}
