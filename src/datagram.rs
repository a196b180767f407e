//! Framing of datagrams on the wire: every datagram starts with the protocol id and ends with
//!  a checksum over everything before it.
//!
//! ```ascii
//! 0:   protocol id (u8) - always 67
//! 1:   packet kind (u8) - see [crate::packet_header]
//! ...: rest of the payload
//! n-4: checksum (u32 BE): CRC32 (IEEE) of bytes 0..n-4, XOR'ed with a magic number
//! ```
//!
//! The magic number makes it unlikely that datagrams of some unrelated protocol that happens
//!  to use a plain CRC32 are accepted as valid.

use bytes::BufMut;
use crc::{Crc, CRC_32_ISO_HDLC};
use anyhow::bail;
use crate::buffers::fixed_buffer::FixedBuf;

pub const PROTOCOL_ID: u8 = 67;
pub const MAGIC: u32 = 0x5A11_ADFC;
pub const CHECKSUM_LEN: usize = size_of::<u32>();

/// protocol id and packet kind are the bare minimum of a valid payload
const MIN_DATAGRAM_LEN: usize = 2 + CHECKSUM_LEN;

static CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

fn checksum(payload: &[u8]) -> u32 {
    CRC32.checksum(payload) ^ MAGIC
}

/// Appends the checksum to a buffer containing a datagram's payload. This fails only if
///  there is no room left for the checksum.
pub fn seal(buf: &mut FixedBuf) -> anyhow::Result<()> {
    if buf.remaining_mut() < CHECKSUM_LEN {
        bail!("no room for checksum: datagram payload of length {} fills the buffer", buf.len());
    }
    let checksum = checksum(buf.as_ref());
    buf.put_u32(checksum);
    Ok(())
}

/// Verifies a received datagram, returning the length of its payload (i.e. without the
///  checksum) if it is valid. Datagrams that are too short, belong to a different protocol or
///  have a checksum mismatch are rejected with `None`.
pub fn open(datagram: &[u8]) -> Option<usize> {
    if datagram.len() < MIN_DATAGRAM_LEN {
        return None;
    }
    if datagram[0] != PROTOCOL_ID {
        return None;
    }

    let payload_len = datagram.len() - CHECKSUM_LEN;
    let mut received_checksum = [0u8; CHECKSUM_LEN];
    received_checksum.copy_from_slice(&datagram[payload_len..]);

    if u32::from_be_bytes(received_checksum) != checksum(&datagram[..payload_len]) {
        return None;
    }
    Some(payload_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::dial(vec![67,2], vec![67,2, 46,146,194,233])]
    #[case::dial_ack(vec![67,3], vec![67,3, 89,149,242,127])]
    #[case::ack(vec![67,1, 0,0,0,5, 0,0,0,3], vec![67,1, 0,0,0,5, 0,0,0,3, 138,132,179,160])]
    fn test_seal(#[case] payload: Vec<u8>, #[case] expected: Vec<u8>) {
        let mut buf = FixedBuf::new(100);
        buf.put_slice(&payload);

        seal(&mut buf).unwrap();

        assert_eq!(buf.as_ref(), expected.as_slice());
        assert_eq!(open(buf.as_ref()), Some(payload.len()));
    }

    #[rstest]
    #[case::exact_fit(8, true)]
    #[case::spare_room(20, true)]
    #[case::partial_room(7, false)]
    #[case::no_room(4, false)]
    fn test_seal_room(#[case] capacity: usize, #[case] expected_ok: bool) {
        let mut buf = FixedBuf::new(capacity);
        buf.put_slice(&[PROTOCOL_ID, 0, 1, 2]);
        assert_eq!(seal(&mut buf).is_ok(), expected_ok);
    }

    #[rstest]
    #[case::short(vec![67,2, 46,146,194])]
    #[case::empty(vec![])]
    #[case::foreign_protocol(vec![68,2, 46,146,194,233])]
    #[case::checksum_mismatch(vec![67,2, 46,146,194,234])]
    #[case::payload_mismatch(vec![67,3, 46,146,194,233])]
    fn test_open_rejects(#[case] datagram: Vec<u8>) {
        assert_eq!(open(&datagram), None);
    }

    #[rstest]
    #[case::minimal(vec![67, 0])]
    #[case::small(vec![67, 0, 1, 2, 3])]
    #[case::big((0..1196).map(|i| if i == 0 { PROTOCOL_ID } else { i as u8 }).collect())]
    fn test_round_trip(#[case] payload: Vec<u8>) {
        let mut buf = FixedBuf::new(1200);
        buf.put_slice(&payload);
        seal(&mut buf).unwrap();

        let payload_len = open(buf.as_ref()).unwrap();
        assert_eq!(&buf.as_ref()[..payload_len], payload.as_slice());
    }

    #[test]
    fn test_single_bit_flips_are_detected() {
        let mut buf = FixedBuf::new(100);
        buf.put_slice(&[PROTOCOL_ID, 0, 0,0,0,9, 0,3, 1, b'a', b'b', b'c']);
        seal(&mut buf).unwrap();
        let sealed = buf.as_ref().to_vec();

        for byte_idx in 0..sealed.len() {
            for bit in 0..8 {
                let mut corrupted = sealed.clone();
                corrupted[byte_idx] ^= 1 << bit;
                assert_eq!(open(&corrupted), None, "flipping bit {} of byte {} was not detected", bit, byte_idx);
            }
        }
    }
}
