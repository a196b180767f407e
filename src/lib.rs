//! RDP ("redundant datagram protocol") is a reliable, ordered message transport on top of UDP.
//!  It is optimized for small, latency sensitive messages (e.g. real-time state sync) where
//!  sending data twice is cheaper than waiting for a retransmission timeout.
//!
//! ## Design goals
//!
//! * The abstraction is sending / receiving *messages*, i.e. defined-length chunks of data as
//!   opposed to a stream of bytes
//!   * big messages are split into *segments* that fit into a single datagram, and they are
//!     reassembled before delivery - a reader never sees a partial message
//! * Messages are delivered exactly once and in the order they were written, despite
//!   duplication, reordering and loss on the network
//! * Recover from isolated packet loss without waiting: every datagram carrying a new segment
//!   also carries the most recently sent segments that were not acknowledged yet
//!   ('piggy-backing')
//! * There are no retransmission timers and no exponential backoff. Unacknowledged segments
//!   are re-sent by a periodic flush once they are older than the fastest recently observed
//!   round trip
//! * Acknowledgements are cumulative (the next expected sequence number) plus a selective ack
//!   bitmap for the 32 sequence numbers after it
//! * There is a checksum per datagram, and datagrams failing verification are dropped silently
//! * explicitly *not* goals: congestion control, bandwidth estimation, MTU discovery, NAT
//!   traversal, encryption
//!
//! ## Datagram structure
//!
//! All numbers are in network byte order (BE).
//!
//! ```ascii
//! 0:   protocol id (u8) - always 67
//! 1:   packet kind (u8): 0 DATA, 1 ACK, 2 DIAL, 3 DIAL_ACK
//! 2:   (ACK only) cumulative ack (u32)
//! 6:   (ACK only) selective ack bitmap (u32): bit i is set iff `ack + 1 + i` was received
//! 2:   (DATA only) zero or more segments, packed back to back:
//!      0: sequence number (u32)
//!      4: body size (u16)
//!      6: continuation flag (u8): 1 if more segments of the same message follow
//!      7: body
//! n-4: checksum (u32): CRC32 of all preceding bytes, XOR'ed with a magic number
//! ```
//!
//! ## Handshake
//!
//! The dialing peer sends DIAL every 50ms (by default) until it receives DIAL_ACK. The
//!  accepting peer replies to DIAL with DIAL_ACK - initially and whenever it receives DIAL
//!  later on, since the DIAL_ACK may have been lost. Both peers start with the same
//!  configured sequence number.
//!
//! ## Sliding windows
//!
//! Sender and receiver each have a fixed-size window of segments, indexed by sequence number
//!  modulo window size. A writer blocks while its send window is full, and acknowledgements
//!  move the window forward. Sequence numbers wrap around at 2^32 and are always compared
//!  by their signed difference.

pub mod buffers;
pub mod config;
pub mod datagram;
pub mod datagram_socket;
pub mod error;
pub mod packet_header;
pub mod rdp_stream;
pub mod reliable_stream;
pub mod rtt_window;
pub mod safe_converter;
pub mod segment;
pub mod seq_number;
pub mod sliding_window;
pub mod stats;
pub mod test_util;
