use anyhow::bail;
use bytes::{Buf, BufMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};
use crate::datagram::PROTOCOL_ID;
use crate::seq_number::SeqNumber;

#[derive(Copy, Clone, Debug, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PacketKind {
    /// followed by zero or more segments
    Data = 0,
    /// followed by cumulative ack and selective ack bitmap
    Ack = 1,
    /// handshake request, no body
    Dial = 2,
    /// handshake response, no body
    DialAck = 3,
}

/// The header at the start of every datagram payload. The protocol id is part of the header
///  (and shared with the framing): `protocol_id (u8) | kind (u8)`, and for ACK packets
///  additionally `cumulative ack (u32 BE) | selective ack bitmap (u32 BE)`.
///
/// `ack` and `ack_bits` are meaningful only for ACK packets and are zero otherwise.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PacketHeader {
    pub kind: PacketKind,
    /// the next sequence number the receiver expects - all sequence numbers before it are
    ///  acknowledged implicitly
    pub ack: SeqNumber,
    /// bit i is set iff sequence number `ack + 1 + i` was received
    pub ack_bits: u32,
}

impl PacketHeader {
    pub const SERIALIZED_LEN_DATA: usize = 2;
    pub const SERIALIZED_LEN_ACK: usize = 10;

    pub fn new(kind: PacketKind) -> PacketHeader {
        PacketHeader {
            kind,
            ack: SeqNumber::ZERO,
            ack_bits: 0,
        }
    }

    pub fn new_ack(ack: SeqNumber, ack_bits: u32) -> PacketHeader {
        PacketHeader {
            kind: PacketKind::Ack,
            ack,
            ack_bits,
        }
    }

    pub fn serialized_len(&self) -> usize {
        match self.kind {
            PacketKind::Ack => Self::SERIALIZED_LEN_ACK,
            _ => Self::SERIALIZED_LEN_DATA,
        }
    }

    /// NB: This writes nothing if there is not enough room for the entire header
    pub fn ser(&self, buf: &mut impl BufMut) -> anyhow::Result<()> {
        if buf.remaining_mut() < self.serialized_len() {
            bail!("no room for packet header: {} bytes required, {} available", self.serialized_len(), buf.remaining_mut());
        }

        buf.put_u8(PROTOCOL_ID);
        buf.put_u8(self.kind.into());
        if self.kind == PacketKind::Ack {
            buf.put_u32(self.ack.to_raw());
            buf.put_u32(self.ack_bits);
        }
        Ok(())
    }

    pub fn deser(buf: &mut impl Buf) -> anyhow::Result<PacketHeader> {
        let protocol_id = buf.try_get_u8()?;
        if protocol_id != PROTOCOL_ID {
            bail!("unsupported protocol id {}", protocol_id);
        }

        let kind = PacketKind::try_from(buf.try_get_u8()?)?;
        if kind != PacketKind::Ack {
            return Ok(PacketHeader::new(kind));
        }

        let ack = buf.try_get_u32()?;
        let ack_bits = buf.try_get_u32()?;
        Ok(PacketHeader::new_ack(SeqNumber::from_raw(ack), ack_bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::data(PacketHeader::new(PacketKind::Data), vec![67,0])]
    #[case::dial(PacketHeader::new(PacketKind::Dial), vec![67,2])]
    #[case::dial_ack(PacketHeader::new(PacketKind::DialAck), vec![67,3])]
    #[case::ack(PacketHeader::new_ack(SeqNumber::from_raw(0x01020304), 0x0a0b0c0d), vec![67,1, 1,2,3,4, 10,11,12,13])]
    #[case::ack_zero(PacketHeader::new_ack(SeqNumber::ZERO, 0), vec![67,1, 0,0,0,0, 0,0,0,0])]
    fn test_ser(#[case] header: PacketHeader, #[case] expected: Vec<u8>) {
        let mut buf = Vec::new();
        header.ser(&mut buf).unwrap();
        assert_eq!(buf, expected);
        assert_eq!(header.serialized_len(), expected.len());

        let mut b: &[u8] = &buf;
        assert_eq!(PacketHeader::deser(&mut b).unwrap(), header);
        assert!(b.is_empty());
    }

    #[rstest]
    #[case::data(PacketKind::Data, 1)]
    #[case::ack(PacketKind::Ack, 9)]
    fn test_ser_no_room(#[case] kind: PacketKind, #[case] room: usize) {
        let mut storage = vec![0u8; room];
        let mut buf: &mut [u8] = storage.as_mut_slice();
        assert!(PacketHeader::new(kind).ser(&mut buf).is_err());
        assert_eq!(buf.len(), room, "nothing should have been written");
    }

    #[rstest]
    #[case::data(vec![67,0, 9,9,9], PacketHeader::new(PacketKind::Data), 3)]
    #[case::ack_with_remainder(vec![67,1, 0,0,0,7, 0,0,0,1, 5], PacketHeader::new_ack(SeqNumber::from_raw(7), 1), 1)]
    fn test_deser_leaves_remainder(#[case] raw: Vec<u8>, #[case] expected: PacketHeader, #[case] remaining: usize) {
        let mut b: &[u8] = &raw;
        assert_eq!(PacketHeader::deser(&mut b).unwrap(), expected);
        assert_eq!(b.len(), remaining);
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::no_kind(vec![67])]
    #[case::wrong_protocol(vec![68,0])]
    #[case::unknown_kind(vec![67,4])]
    #[case::truncated_ack(vec![67,1, 0,0,0,1, 0,0,0])]
    fn test_deser_invalid(#[case] raw: Vec<u8>) {
        let mut b: &[u8] = &raw;
        assert!(PacketHeader::deser(&mut b).is_err());
    }
}
