//! In-memory datagram transport for tests and simulations. It connects two
//!  [DatagramSocket](crate::datagram_socket::DatagramSocket)s without any I/O, and it can drop
//!  datagrams in each direction based on a [LossPolicy] that can be replaced at any time.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::trace;
use crate::datagram_socket::DatagramSocket;

/// Decides which datagrams are 'lost' on their way to the peer
pub enum LossPolicy {
    None,
    /// drops each datagram with the given probability, using a seeded RNG for reproducible
    ///  test runs
    Random { probability: f64, rng: StdRng },
    /// drops every n-th datagram, starting with the n-th datagram after the policy was set
    EveryNth { n: u64, counter: u64 },
    /// drops a datagram iff the function returns `true`
    Custom(Box<dyn FnMut(&[u8]) -> bool + Send>),
}

impl LossPolicy {
    pub fn random(probability: f64, seed: u64) -> LossPolicy {
        LossPolicy::Random { probability, rng: StdRng::seed_from_u64(seed) }
    }

    pub fn every_nth(n: u64) -> LossPolicy {
        assert!(n > 0);
        LossPolicy::EveryNth { n, counter: 0 }
    }

    pub fn custom(f: impl FnMut(&[u8]) -> bool + Send + 'static) -> LossPolicy {
        LossPolicy::Custom(Box::new(f))
    }

    fn should_drop(&mut self, datagram: &[u8]) -> bool {
        match self {
            LossPolicy::None => false,
            LossPolicy::Random { probability, rng } => rng.gen_bool(*probability),
            LossPolicy::EveryNth { n, counter } => {
                *counter += 1;
                *counter % *n == 0
            }
            LossPolicy::Custom(f) => f(datagram),
        }
    }
}

/// One end of an in-memory datagram channel, see [memory_channel]
pub struct MemorySocket {
    name: &'static str,
    outgoing: mpsc::UnboundedSender<Vec<u8>>,
    incoming: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    send_loss: Mutex<LossPolicy>,
    num_sent: AtomicU64,
    num_dropped: AtomicU64,
}

impl MemorySocket {
    /// replaces the loss policy for datagrams sent from this end
    pub fn set_send_loss(&self, policy: LossPolicy) {
        *self.send_loss.lock().unwrap() = policy;
    }

    /// number of datagrams sent from this end, including those that were dropped
    pub fn num_sent(&self) -> u64 {
        self.num_sent.load(Ordering::Relaxed)
    }

    /// number of datagrams sent from this end that were dropped by the loss policy
    pub fn num_dropped(&self) -> u64 {
        self.num_dropped.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl DatagramSocket for MemorySocket {
    async fn send(&self, datagram: &[u8]) -> io::Result<usize> {
        self.num_sent.fetch_add(1, Ordering::Relaxed);
        if self.send_loss.lock().unwrap().should_drop(datagram) {
            trace!("{}: dropping datagram of length {}", self.name, datagram.len());
            self.num_dropped.fetch_add(1, Ordering::Relaxed);
            return Ok(datagram.len());
        }

        // like UDP, sending succeeds even if nobody is listening on the other end
        let _ = self.outgoing.send(datagram.to_vec());
        Ok(datagram.len())
    }

    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut incoming = self.incoming.lock().await;
        match incoming.recv().await {
            Some(datagram) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok(len)
            }
            None => {
                // the peer is gone: like a UDP socket, wait for datagrams that never arrive
                std::future::pending().await
            }
        }
    }
}

/// Creates two connected in-memory sockets, `a` and `b`, without any loss
pub fn memory_channel() -> (Arc<MemorySocket>, Arc<MemorySocket>) {
    let (a_to_b_send, a_to_b_recv) = mpsc::unbounded_channel();
    let (b_to_a_send, b_to_a_recv) = mpsc::unbounded_channel();

    let a = MemorySocket {
        name: "a",
        outgoing: a_to_b_send,
        incoming: tokio::sync::Mutex::new(b_to_a_recv),
        send_loss: Mutex::new(LossPolicy::None),
        num_sent: Default::default(),
        num_dropped: Default::default(),
    };
    let b = MemorySocket {
        name: "b",
        outgoing: b_to_a_send,
        incoming: tokio::sync::Mutex::new(a_to_b_recv),
        send_loss: Mutex::new(LossPolicy::None),
        num_sent: Default::default(),
        num_dropped: Default::default(),
    };
    (Arc::new(a), Arc::new(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[tokio::test]
    async fn test_memory_channel() {
        let (a, b) = memory_channel();

        a.send(b"abc").await.unwrap();
        b.send(b"xy").await.unwrap();
        a.send(b"d").await.unwrap();

        let mut buf = [0u8; 10];
        let len = b.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"abc");
        let len = b.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"d");
        let len = a.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], b"xy");
    }

    #[tokio::test]
    async fn test_recv_truncates() {
        let (a, b) = memory_channel();
        a.send(b"abcdef").await.unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(b.recv(&mut buf).await.unwrap(), 4);
        assert_eq!(&buf, b"abcd");
    }

    #[rstest]
    #[case::none(LossPolicy::None, vec![1,2,3,4,5,6])]
    #[case::every_2nd(LossPolicy::every_nth(2), vec![1,3,5])]
    #[case::every_3rd(LossPolicy::every_nth(3), vec![1,2,4,5])]
    #[case::custom(LossPolicy::custom(|d| d[0] > 4), vec![1,2,3,4])]
    #[tokio::test]
    async fn test_loss_policy(#[case] policy: LossPolicy, #[case] expected: Vec<u8>) {
        let (a, b) = memory_channel();
        a.set_send_loss(policy);

        for i in 1..=6u8 {
            a.send(&[i]).await.unwrap();
        }
        drop(a);

        let mut received = Vec::new();
        let mut buf = [0u8; 1];
        while let Ok(Ok(_)) = tokio::time::timeout(std::time::Duration::from_millis(10), b.recv(&mut buf)).await {
            received.push(buf[0]);
        }
        assert_eq!(received, expected);
    }

    #[test]
    fn test_random_loss_is_reproducible() {
        let outcomes = |seed| {
            let mut policy = LossPolicy::random(0.2, seed);
            (0..100).map(|_| policy.should_drop(&[])).collect::<Vec<_>>()
        };

        let first = outcomes(42);
        assert_eq!(first, outcomes(42));
        let num_dropped = first.iter().filter(|d| **d).count();
        assert!(num_dropped > 5 && num_dropped < 40, "{} dropped", num_dropped);
    }
}
