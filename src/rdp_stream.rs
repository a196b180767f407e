use std::cmp::min;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use anyhow::bail;
use async_trait::async_trait;
use bytes::{Buf, BufMut};
use tokio::select;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, interval_at, sleep, timeout, Instant};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;
use crate::buffers::buffer_pool::{BufferPool, PooledBuf};
use crate::config::RdpConfig;
use crate::datagram::{open, seal, CHECKSUM_LEN};
use crate::datagram_socket::DatagramSocket;
use crate::error::RdpError;
use crate::packet_header::{PacketHeader, PacketKind};
use crate::reliable_stream::ReliableStream;
use crate::rtt_window::RttWindow;
use crate::segment::Segment;
use crate::seq_number::SeqNumber;
use crate::sliding_window::SlidingWindow;
use crate::stats::{StatsSnapshot, StreamStats};

/// Send-side state that is touched by both the writer (adding segments) and the reader
///  (processing acks). It is protected by a plain mutex that is never held across an await.
struct SendState {
    window: SlidingWindow,
    rtt_window: RttWindow,
}

/// Receive-side state, owned by whoever holds the read section
struct ReadState {
    window: SlidingWindow,
    /// the message that is currently being reassembled from its segments
    message: Vec<u8>,
    /// `true` once `message` contains a complete message that was not handed to a reader yet,
    ///  e.g. because the reader's buffer was too small
    is_message_complete: bool,
    /// `true` if data was received since the last ack was sent
    is_ack_pending: bool,
}

struct RdpStreamInner {
    stream_id: Uuid,
    config: Arc<RdpConfig>,
    socket: Arc<dyn DatagramSocket>,
    buffer_pool: Arc<BufferPool>,

    send_state: Mutex<SendState>,
    /// The write section serializes writers and the flush, which must never run concurrently.
    ///  It holds the next sequence number to be assigned.
    write_section: tokio::sync::Mutex<SeqNumber>,
    read_section: tokio::sync::Mutex<ReadState>,

    /// notified whenever an ack removes segments from the send window
    window_freed: Notify,
    closed: watch::Sender<bool>,
    /// set when a write sends a datagram, causing the next flush tick to be skipped
    has_sent_since_tick: AtomicBool,

    stats: StreamStats,
}

impl RdpStreamInner {
    fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn check_open(&self) -> anyhow::Result<()> {
        if self.is_closed() {
            return Err(RdpError::StreamClosed.into());
        }
        Ok(())
    }

    /// completes once the stream is closed
    async fn closed_signal(&self) {
        let mut closed = self.closed.subscribe();
        let _ = closed.wait_for(|is_closed| *is_closed).await;
    }

    /// Marks the stream as closed and wakes blocked writers. This does not wait for anything,
    ///  so it can be called while holding the read or write section. Returns `true` if the
    ///  stream was open before.
    fn mark_closed(&self) -> bool {
        let was_closed = self.closed.send_replace(true);
        self.window_freed.notify_waiters();
        !was_closed
    }

    async fn send_datagram(&self, datagram: &[u8]) -> std::io::Result<()> {
        self.socket.send(datagram).await?;
        self.stats.on_sent(datagram.len());
        Ok(())
    }

    fn control_datagram(&self, header: PacketHeader) -> anyhow::Result<PooledBuf> {
        let mut buf = self.buffer_pool.get_from_pool(self.config.mtu);
        header.ser(&mut *buf)?;
        seal(&mut buf)?;
        Ok(buf)
    }

    async fn send_control(&self, header: PacketHeader) -> anyhow::Result<()> {
        let datagram = self.control_datagram(header)?;
        self.send_datagram(datagram.as_ref()).await
            .map_err(RdpError::Socket)?;
        Ok(())
    }

    async fn send_ack(&self, read_state: &mut ReadState) {
        let (ack, ack_bits) = read_state.window.get_ack();
        read_state.is_ack_pending = false;

        trace!("{}: sending ACK #{} / {:032b}", self.stream_id, ack, ack_bits);
        if let Err(e) = self.send_control(PacketHeader::new_ack(ack, ack_bits)).await {
            warn!("{}: error sending ACK: {}", self.stream_id, e);
        }
    }

    // ----------------------------------- receiving

    /// Receives a single datagram from the socket and processes it. This is the only place
    ///  where the stream reads from its socket after the handshake.
    async fn receive_datagram(&self, read_state: &mut ReadState) -> anyhow::Result<()> {
        let mut buf = self.buffer_pool.get_from_pool(self.config.mtu);
        buf.maximize_len();

        let received = select! {
            r = self.socket.recv(buf.as_mut()) => r,
            _ = self.closed_signal() => return Err(RdpError::StreamClosed.into()),
        };
        let len = received.map_err(RdpError::Socket)?;
        buf.truncate(len);
        self.stats.on_received(len);

        self.on_datagram(read_state, buf.as_ref()).await;
        Ok(())
    }

    async fn on_datagram(&self, read_state: &mut ReadState, datagram: &[u8]) {
        let Some(payload_len) = open(datagram) else {
            debug!("{}: dropping datagram of length {} that failed verification", self.stream_id, datagram.len());
            self.stats.on_malformed();
            return;
        };

        let mut payload = &datagram[..payload_len];
        let header = match PacketHeader::deser(&mut payload) {
            Ok(header) => header,
            Err(e) => {
                debug!("{}: dropping datagram with invalid header: {}", self.stream_id, e);
                self.stats.on_malformed();
                return;
            }
        };

        match header.kind {
            PacketKind::Data => self.on_data(read_state, payload),
            PacketKind::Ack => self.on_ack(header.ack, header.ack_bits),
            PacketKind::Dial => {
                debug!("{}: received DIAL on an established stream - replying with DIAL_ACK", self.stream_id);
                if let Err(e) = self.send_control(PacketHeader::new(PacketKind::DialAck)).await {
                    warn!("{}: error sending DIAL_ACK: {}", self.stream_id, e);
                }
            }
            PacketKind::DialAck => {
                trace!("{}: ignoring late DIAL_ACK", self.stream_id);
            }
        }
    }

    fn on_data(&self, read_state: &mut ReadState, mut payload: &[u8]) {
        let received_at = Instant::now();
        while payload.has_remaining() {
            let body = self.buffer_pool.get_from_pool(self.config.max_segment_size());
            match Segment::deser(&mut payload, body, received_at) {
                Ok(segment) => {
                    let seq = segment.seq;
                    if read_state.window.set(segment) {
                        trace!("{}: received segment #{}", self.stream_id, seq);
                    }
                }
                Err(e) => {
                    debug!("{}: dropping rest of DATA datagram: {}", self.stream_id, e);
                    self.stats.on_malformed();
                    break;
                }
            }
        }
        // duplicates are acknowledged as well: the peer re-sends because it did not see our ack
        read_state.is_ack_pending = true;
    }

    fn on_ack(&self, ack: SeqNumber, ack_bits: u32) {
        let num_cleared = {
            let mut send_state = self.send_state.lock().unwrap();
            let send_state = &mut *send_state;
            send_state.window.ack(ack, ack_bits, &mut send_state.rtt_window, Instant::now())
        };

        if num_cleared > 0 {
            self.stats.on_acked(num_cleared);
            self.window_freed.notify_waiters();
        }
    }

    // ----------------------------------- sending

    /// Builds a DATA datagram for a newly added segment, adding previously sent segments that
    ///  are still unacknowledged (most recent first) as long as they fit.
    fn data_datagram_for(&self, seq: SeqNumber) -> anyhow::Result<(PooledBuf, usize)> {
        let send_state = self.send_state.lock().unwrap();
        let Some(segment) = send_state.window.get_by_seq(seq) else {
            bail!("segment #{} is not in the send window", seq);
        };

        let mut buf = self.buffer_pool.get_from_pool(self.config.mtu);
        PacketHeader::new(PacketKind::Data).ser(&mut *buf)?;
        segment.ser(&mut *buf)?;

        let mut num_piggybacked = 0;
        for i in 1..=self.config.redundant_num {
            let Some(previous) = send_state.window.get_by_seq(seq.minus(i)) else {
                continue;
            };
            if buf.len() + previous.serialized_len() + CHECKSUM_LEN > self.config.mtu {
                break;
            }
            previous.ser(&mut *buf)?;
            num_piggybacked += 1;
        }

        seal(&mut buf)?;
        Ok((buf, num_piggybacked))
    }

    /// Builds DATA datagrams for all unacknowledged segments that are old enough to be sent
    ///  again, packing as many segments into each datagram as the MTU permits.
    fn flush_datagrams(&self) -> anyhow::Result<(Vec<PooledBuf>, usize)> {
        let send_state = self.send_state.lock().unwrap();
        let now = Instant::now();
        let threshold = send_state.rtt_window.recent_min();

        let mut datagrams = Vec::new();
        let mut current: Option<PooledBuf> = None;
        let mut num_segments = 0;

        let mut num_unvisited = send_state.window.len();
        for offset in 0..send_state.window.capacity() {
            if num_unvisited == 0 {
                break;
            }
            let Some(segment) = send_state.window.get(offset) else {
                continue;
            };
            num_unvisited -= 1;

            if now.saturating_duration_since(segment.sent_at) < threshold {
                continue;
            }

            let is_full = current.as_ref()
                .is_some_and(|buf| buf.len() + segment.serialized_len() + CHECKSUM_LEN > self.config.mtu);
            if is_full {
                if let Some(mut full) = current.take() {
                    seal(&mut full)?;
                    datagrams.push(full);
                }
            }
            let buf = match &mut current {
                Some(buf) => buf,
                None => {
                    let mut buf = self.buffer_pool.get_from_pool(self.config.mtu);
                    PacketHeader::new(PacketKind::Data).ser(&mut *buf)?;
                    current.insert(buf)
                }
            };
            segment.ser(&mut **buf)?;
            num_segments += 1;
        }

        if let Some(mut last) = current {
            seal(&mut last)?;
            datagrams.push(last);
        }
        Ok((datagrams, num_segments))
    }

    /// re-sends eligible unacknowledged segments - the caller must hold the write section
    async fn flush(&self) -> anyhow::Result<()> {
        let (datagrams, num_segments) = self.flush_datagrams()?;
        if datagrams.is_empty() {
            return Ok(());
        }

        trace!("{}: flush - re-sending {} segments in {} datagrams", self.stream_id, num_segments, datagrams.len());
        for datagram in &datagrams {
            if let Err(e) = self.send_datagram(datagram.as_ref()).await {
                error!("{}: error re-sending segments - closing stream: {}", self.stream_id, e);
                self.mark_closed();
                return Err(RdpError::Socket(e).into());
            }
        }
        self.stats.on_resent(num_segments);
        Ok(())
    }

    /// Called by a writer while the send window is full: receive a datagram if no reader is
    ///  active (there may be an ack waiting), flush, and wait for an ack to free space in the
    ///  send window or for the poll interval to expire.
    async fn wait_for_window(&self, deadline: Instant) -> anyhow::Result<()> {
        let window_freed = self.window_freed.notified();
        tokio::pin!(window_freed);
        window_freed.as_mut().enable();

        let max_wait = min(self.config.write_block_poll, deadline.saturating_duration_since(Instant::now()));

        if let Ok(mut read_state) = self.read_section.try_lock() {
            match timeout(max_wait, self.receive_datagram(&mut read_state)).await {
                Ok(Err(e)) if !RdpError::is_closed(&e) => debug!("{}: error receiving while blocked in write: {}", self.stream_id, e),
                _ => {}
            }
        }

        self.check_open()?;
        self.flush().await?;

        let max_wait = min(self.config.write_block_poll, deadline.saturating_duration_since(Instant::now()));
        select! {
            _ = &mut window_freed => {}
            _ = sleep(max_wait) => {}
        }
        self.check_open()
    }

    async fn write_segment(&self, next_seq: &mut SeqNumber, chunk: &[u8], is_continuation: bool) -> anyhow::Result<()> {
        let seq = *next_seq;
        let mut body = self.buffer_pool.get_from_pool(self.config.max_segment_size());
        body.put_slice(chunk);
        let mut segment = Segment {
            seq,
            is_continuation,
            body,
            sent_at: Instant::now(),
        };

        let deadline = Instant::now() + self.config.write_timeout;
        loop {
            segment.sent_at = Instant::now();
            let result = self.send_state.lock().unwrap()
                .window.write(segment);
            match result {
                Ok(()) => break,
                Err(rejected) => segment = rejected,
            }

            if Instant::now() >= deadline {
                debug!("{}: write timed out waiting for room for segment #{}", self.stream_id, seq);
                return Err(RdpError::WriteTimeout.into());
            }
            trace!("{}: send window full - waiting to add segment #{}", self.stream_id, seq);
            self.wait_for_window(deadline).await?;
        }

        let (datagram, num_piggybacked) = self.data_datagram_for(seq)?;
        trace!("{}: sending segment #{} with {} piggy-backed segments", self.stream_id, seq, num_piggybacked);

        if let Err(e) = self.send_datagram(datagram.as_ref()).await {
            error!("{}: error sending segment #{} - closing stream: {}", self.stream_id, seq, e);
            self.send_state.lock().unwrap()
                .window.clear(seq);
            self.mark_closed();
            return Err(RdpError::Socket(e).into());
        }

        self.has_sent_since_tick.store(true, Ordering::Release);
        self.stats.on_piggybacked(num_piggybacked);
        *next_seq = seq.next();
        Ok(())
    }

    async fn run_flush_ticker(self: Arc<Self>) {
        let flush_interval = self.config.flush_interval;
        let mut ticks = interval_at(Instant::now() + flush_interval, flush_interval);

        loop {
            select! {
                _ = ticks.tick() => {}
                _ = self.closed_signal() => break,
            }

            if self.has_sent_since_tick.swap(false, Ordering::AcqRel) {
                continue;
            }
            let Ok(_write_section) = self.write_section.try_lock() else {
                // a writer is active, and it flushes while it is blocked
                continue;
            };
            if self.is_closed() {
                break;
            }
            if self.flush().await.is_err() {
                break;
            }
        }
        debug!("{}: flush ticker stopped", self.stream_id);
    }
}

/// Returns the packet kind of a raw datagram, or `None` if the datagram is malformed
fn packet_kind(datagram: &[u8]) -> Option<PacketKind> {
    let payload_len = open(datagram)?;
    let mut payload = &datagram[..payload_len];
    PacketHeader::deser(&mut payload)
        .ok()
        .map(|h| h.kind)
}

/// A reliable, ordered message stream over a [DatagramSocket] that is connected to a single
///  peer.
///
/// A stream is created by a handshake, either actively ([RdpStream::connect]) or passively
///  ([RdpStream::accept]). Once it is established, a single reader and a single writer can
///  use it concurrently; concurrent writers (or readers) are serialized. A background task
///  periodically re-sends unacknowledged segments until the stream is closed.
///
/// NB: Acknowledgements are processed as part of reading. An application that only writes
///      must still read (e.g. in a background task), otherwise the send window fills up
///      and writes are slowed down to one per `write_block_poll` interval.
pub struct RdpStream {
    inner: Arc<RdpStreamInner>,
    ticker_handle: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for RdpStream {
    fn drop(&mut self) {
        self.inner.mark_closed();
        if let Ok(mut handle) = self.ticker_handle.lock() {
            if let Some(handle) = handle.take() {
                handle.abort();
            }
        }
    }
}

impl RdpStream {
    /// Establishes a stream by sending DIAL messages to the peer until it replies with a
    ///  DIAL_ACK. This fails with [RdpError::HandshakeTimeout] if the handshake does not
    ///  complete within the configured `dial_timeout`.
    pub async fn connect(config: Arc<RdpConfig>, socket: Arc<dyn DatagramSocket>) -> anyhow::Result<RdpStream> {
        config.validate()?;
        let stream_id = Uuid::new_v4();
        let buffer_pool = BufferPool::new(config.buffer_pool_size);
        debug!("{}: dialing", stream_id);

        let handshake = Self::do_dial(stream_id, &config, socket.as_ref(), &buffer_pool);
        match config.dial_timeout {
            Some(dial_timeout) => timeout(dial_timeout, handshake).await
                .map_err(|_| {
                    info!("{}: handshake timed out after {:?}", stream_id, dial_timeout);
                    RdpError::HandshakeTimeout
                })??,
            None => handshake.await?,
        }

        info!("{}: stream established (dialed)", stream_id);
        Ok(Self::new_established(stream_id, config, socket, buffer_pool))
    }

    async fn do_dial(stream_id: Uuid, config: &RdpConfig, socket: &dyn DatagramSocket, buffer_pool: &Arc<BufferPool>) -> anyhow::Result<()> {
        let mut dial = buffer_pool.get_from_pool(config.mtu);
        PacketHeader::new(PacketKind::Dial).ser(&mut *dial)?;
        seal(&mut dial)?;

        let mut recv_buf = buffer_pool.get_from_pool(config.mtu);
        let mut dial_ticks = interval(config.dial_interval);

        loop {
            recv_buf.maximize_len();
            let received = select! {
                _ = dial_ticks.tick() => None,
                r = socket.recv(recv_buf.as_mut()) => Some(r),
            };

            match received {
                None => {
                    trace!("{}: sending DIAL", stream_id);
                    if let Err(e) = socket.send(dial.as_ref()).await {
                        error!("{}: error sending DIAL: {}", stream_id, e);
                    }
                }
                Some(Ok(len)) => {
                    match packet_kind(&recv_buf.as_ref()[..len]) {
                        Some(PacketKind::DialAck) => return Ok(()),
                        kind => trace!("{}: ignoring {:?} while dialing", stream_id, kind),
                    }
                }
                Some(Err(e)) => {
                    // e.g. ICMP 'port unreachable' while the peer is not up yet
                    debug!("{}: error receiving while dialing: {}", stream_id, e);
                    sleep(config.dial_interval).await;
                }
            }
        }
    }

    /// Waits for a peer's DIAL message, replies with DIAL_ACK and returns the established
    ///  stream. Everything other than DIAL is ignored, and there is no timeout.
    ///
    /// The peer keeps dialing until a DIAL_ACK gets through, so an established stream replies
    ///  to every DIAL it receives.
    pub async fn accept(config: Arc<RdpConfig>, socket: Arc<dyn DatagramSocket>) -> anyhow::Result<RdpStream> {
        config.validate()?;
        let stream_id = Uuid::new_v4();
        let buffer_pool = BufferPool::new(config.buffer_pool_size);
        debug!("{}: waiting for DIAL", stream_id);

        let mut recv_buf = buffer_pool.get_from_pool(config.mtu);
        loop {
            recv_buf.maximize_len();
            match socket.recv(recv_buf.as_mut()).await {
                Ok(len) => match packet_kind(&recv_buf.as_ref()[..len]) {
                    Some(PacketKind::Dial) => break,
                    kind => trace!("{}: ignoring {:?} while waiting for DIAL", stream_id, kind),
                }
                Err(e) => {
                    debug!("{}: error receiving while waiting for DIAL: {}", stream_id, e);
                    sleep(config.dial_interval).await;
                }
            }
        }
        drop(recv_buf);

        let stream = Self::new_established(stream_id, config, socket, buffer_pool);
        stream.inner.send_control(PacketHeader::new(PacketKind::DialAck)).await?;
        info!("{}: stream established (accepted)", stream_id);
        Ok(stream)
    }

    fn new_established(stream_id: Uuid, config: Arc<RdpConfig>, socket: Arc<dyn DatagramSocket>, buffer_pool: Arc<BufferPool>) -> RdpStream {
        let initial_seq = SeqNumber::from_raw(config.initial_seq);
        let (closed, _) = watch::channel(false);

        let inner = Arc::new(RdpStreamInner {
            stream_id,
            send_state: Mutex::new(SendState {
                window: SlidingWindow::new(config.window_size, initial_seq),
                rtt_window: RttWindow::new(),
            }),
            write_section: tokio::sync::Mutex::new(initial_seq),
            read_section: tokio::sync::Mutex::new(ReadState {
                window: SlidingWindow::new(config.window_size, initial_seq),
                message: Vec::new(),
                is_message_complete: false,
                is_ack_pending: false,
            }),
            window_freed: Notify::new(),
            closed,
            has_sent_since_tick: AtomicBool::new(false),
            stats: StreamStats::default(),
            config,
            socket,
            buffer_pool,
        });

        let ticker_handle = tokio::spawn(inner.clone().run_flush_ticker());
        RdpStream {
            inner,
            ticker_handle: Mutex::new(Some(ticker_handle)),
        }
    }

    pub fn stream_id(&self) -> Uuid {
        self.inner.stream_id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// the round-trip times observed by acknowledgements as `(recent minimum, historical minimum)`
    pub fn rtt(&self) -> (Duration, Duration) {
        let send_state = self.inner.send_state.lock().unwrap();
        (send_state.rtt_window.recent_min(), send_state.rtt_window.historical_min())
    }

    /// Writes a message, splitting it into segments as necessary. This blocks while the send
    ///  window is full, and it fails with [RdpError::WriteTimeout] if a segment does not fit
    ///  into the send window within `write_timeout`.
    ///
    /// If a write fails after part of the message was sent, the peer could never complete the
    ///  message, so the stream is closed.
    pub async fn write(&self, message: &[u8]) -> anyhow::Result<()> {
        self.inner.check_open()?;
        if message.len() > self.inner.config.max_write_len {
            return Err(RdpError::MessageTooLarge { len: message.len(), max: self.inner.config.max_write_len }.into());
        }
        if message.is_empty() {
            return Ok(());
        }

        let mut next_seq = self.inner.write_section.lock().await;
        self.inner.check_open()?;

        let max_segment_size = self.inner.config.max_segment_size();
        let num_segments = message.len().div_ceil(max_segment_size);
        trace!("{}: writing message of length {} in {} segments", self.inner.stream_id, message.len(), num_segments);

        for (i, chunk) in message.chunks(max_segment_size).enumerate() {
            let is_continuation = i + 1 < num_segments;
            let result = match self.inner.check_open() {
                Ok(()) => self.inner.write_segment(&mut next_seq, chunk, is_continuation).await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                if i > 0 && self.inner.mark_closed() {
                    warn!("{}: write failed after {} of {} segments - closing stream", self.inner.stream_id, i, num_segments);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Reads the next complete message into `buf`, returning its length. This blocks until a
    ///  message is available.
    ///
    /// If `buf` is too small for the message, this fails with
    ///  [RdpError::ReadBufferTooSmall], and the message is returned by the next call with a
    ///  sufficiently large buffer.
    pub async fn read(&self, buf: &mut [u8]) -> anyhow::Result<usize> {
        self.inner.check_open()?;
        let mut read_state = self.inner.read_section.lock().await;

        loop {
            self.inner.check_open()?;

            if read_state.is_message_complete {
                let len = read_state.message.len();
                if len > buf.len() {
                    return Err(RdpError::ReadBufferTooSmall { required: len, available: buf.len() }.into());
                }
                buf[..len].copy_from_slice(&read_state.message);
                read_state.message.clear();
                read_state.is_message_complete = false;
                return Ok(len);
            }

            if let Some(segment) = read_state.window.read() {
                if read_state.message.len() + segment.size() > self.inner.config.max_write_len {
                    error!("{}: received message exceeds the maximum length of {} - closing stream", self.inner.stream_id, self.inner.config.max_write_len);
                    self.inner.mark_closed();
                    return Err(RdpError::MessageTooLarge { len: read_state.message.len() + segment.size(), max: self.inner.config.max_write_len }.into());
                }

                read_state.message.extend_from_slice(segment.body.as_ref());
                read_state.is_message_complete = !segment.is_continuation;
                drop(segment);

                self.inner.send_ack(&mut read_state).await;
                continue;
            }

            if read_state.is_ack_pending {
                self.inner.send_ack(&mut read_state).await;
            }
            self.inner.receive_datagram(&mut read_state).await?;
        }
    }

    /// Closes the stream: all pending and future operations fail with
    ///  [RdpError::StreamClosed]. When this returns, the flush ticker is stopped and no
    ///  further datagrams are sent.
    pub async fn close(&self) {
        if self.inner.mark_closed() {
            info!("{}: closing stream", self.inner.stream_id);
        }

        let ticker_handle = self.ticker_handle.lock().unwrap().take();
        if let Some(ticker_handle) = ticker_handle {
            if let Err(e) = ticker_handle.await {
                warn!("{}: flush ticker terminated abnormally: {}", self.inner.stream_id, e);
            }
        }

        // wait for in-flight operations to notice the close
        drop(self.inner.write_section.lock().await);
        drop(self.inner.read_section.lock().await);
    }
}

#[async_trait]
impl ReliableStream for RdpStream {
    async fn write(&self, message: &[u8]) -> anyhow::Result<()> {
        RdpStream::write(self, message).await
    }

    async fn read(&self, buf: &mut [u8]) -> anyhow::Result<usize> {
        RdpStream::read(self, buf).await
    }

    async fn close(&self) {
        RdpStream::close(self).await
    }
}
