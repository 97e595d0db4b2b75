//! Connection engine over a raw device byte stream.
//!
//! A [`Connection`] owns the write half and the read half of a device
//! session. Once started, a background task drains the read half in
//! [`READ_CHUNK_SIZE`] chunks and hands each chunk to a rendezvous queue;
//! read operations consume from that queue into a per-call
//! [`StreamBuffer`] and race it against a per-call timeout, the caller's
//! cancellation token and a [`POLL_INTERVAL`] tick on which the completion
//! predicate is evaluated.
//!
//! ```text
//!  device ──► source ──► ingest task ──► mpsc(1) ──► read_until_func ──► Vec<u8>
//!  device ◄── sink ◄──────────────────────────────── send
//! ```
//!
//! Lifecycle is `Stopped → Running → Closed`. `Closed` is terminal: once the
//! device link is gone (EOF, read error, cancellation or [`Connection::stop`])
//! every read reports [`ChannelError::Closed`] and the caller needs a new
//! session.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use log::{debug, error, trace, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, mpsc};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::buffer::StreamBuffer;
use super::patterns::PromptMatcher;
use crate::error::{ChannelError, Error, Result};

/// Size of the scratch buffer used for each read from the device.
pub const READ_CHUNK_SIZE: usize = 1024;

/// Cadence at which read predicates are evaluated.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

type BoxedSource = Box<dyn AsyncRead + Send + Unpin>;
type BoxedSink = Box<dyn AsyncWrite + Send + Unpin>;
type ChunkReceiver = Arc<AsyncMutex<mpsc::Receiver<Bytes>>>;

enum Lifecycle {
    /// Not started yet; the source waits here until `start`.
    Stopped { source: BoxedSource },

    /// Ingestion task alive. The receiver exists only in this state.
    Running {
        receiver: ChunkReceiver,
        stop: CancellationToken,
    },

    /// Link gone. Terminal.
    Closed,
}

impl Lifecycle {
    fn name(&self) -> &'static str {
        match self {
            Lifecycle::Stopped { .. } => "stopped",
            Lifecycle::Running { .. } => "running",
            Lifecycle::Closed => "closed",
        }
    }
}

/// State shared between the connection handle and its ingestion task.
struct Shared {
    state: Mutex<Lifecycle>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Lifecycle> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move a running connection to `Closed`. Returns whether it was running.
    fn stop(&self) -> bool {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, Lifecycle::Closed) {
            Lifecycle::Running { stop, .. } => {
                stop.cancel();
                true
            }
            other => {
                *state = other;
                false
            }
        }
    }
}

/// One open logical session to a device.
///
/// All methods take `&self`; share a connection between a driver and its
/// caller with an `Arc`. Only one read operation may be active at a time,
/// a concurrent second read fails with [`ChannelError::ReaderBusy`].
pub struct Connection {
    sink: AsyncMutex<BoxedSink>,
    shared: Arc<Shared>,
}

impl Connection {
    /// Create a stopped connection over a device's write sink and read source.
    pub fn new<W, R>(sink: W, source: R) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self {
            sink: AsyncMutex::new(Box::new(sink)),
            shared: Arc::new(Shared {
                state: Mutex::new(Lifecycle::Stopped {
                    source: Box::new(source),
                }),
            }),
        }
    }

    /// Start the ingestion task.
    ///
    /// A no-op when already running. The task's lifetime is bound to a child
    /// of `token`: cancelling `token` tears the connection down.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self, token: &CancellationToken) -> Result<()> {
        let mut state = self.shared.lock();
        let source = match std::mem::replace(&mut *state, Lifecycle::Closed) {
            Lifecycle::Stopped { source } => source,
            running @ Lifecycle::Running { .. } => {
                *state = running;
                return Ok(());
            }
            Lifecycle::Closed => return Err(ChannelError::Closed.into()),
        };

        let (tx, rx) = mpsc::channel(1);
        let stop = token.child_token();
        *state = Lifecycle::Running {
            receiver: Arc::new(AsyncMutex::new(rx)),
            stop: stop.clone(),
        };
        drop(state);

        tokio::spawn(ingest(source, tx, stop, Arc::downgrade(&self.shared)));
        Ok(())
    }

    /// Stop the ingestion task and close the queue.
    ///
    /// A no-op when not running. Pending readers observe
    /// [`ChannelError::Closed`].
    pub fn stop(&self) -> Result<()> {
        if self.shared.stop() {
            debug!("Stopping connection...");
        } else {
            debug!("connection already stopped");
        }
        Ok(())
    }

    /// Check if the ingestion task is running.
    pub fn is_running(&self) -> bool {
        matches!(*self.shared.lock(), Lifecycle::Running { .. })
    }

    /// Read until `predicate` holds on everything received since the call.
    ///
    /// The predicate is evaluated every [`POLL_INTERVAL`], not on every
    /// chunk. When it returns `true` the whole buffer is returned untrimmed;
    /// deciding where the delimiter sits is up to the caller.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::ParentCancelled`] when `token` fires, with the
    ///   bytes received so far.
    /// - [`ChannelError::Timeout`] when `timeout` elapses, with the bytes
    ///   received so far.
    /// - [`ChannelError::Closed`] when the connection stops mid-read.
    /// - [`ChannelError::ReaderBusy`] when another read is in progress.
    pub async fn read_until_func<F>(
        &self,
        token: &CancellationToken,
        timeout: Duration,
        mut predicate: F,
    ) -> Result<Vec<u8>>
    where
        F: FnMut(&[u8]) -> bool,
    {
        let mut receiver = self.acquire_reader(token)?;
        let mut buffer = StreamBuffer::new();

        let deadline = time::sleep(timeout);
        tokio::pin!(deadline);

        let mut ticker = time::interval_at(time::Instant::now() + POLL_INTERVAL, POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    return Err(ChannelError::ParentCancelled {
                        partial: buffer.into_vec(),
                    }
                    .into());
                }
                _ = &mut deadline => {
                    return Err(ChannelError::Timeout {
                        timeout,
                        partial: buffer.into_vec(),
                    }
                    .into());
                }
                _ = ticker.tick() => {
                    if predicate(buffer.as_slice()) {
                        return Ok(buffer.into_vec());
                    }
                }
                chunk = receiver.recv() => match chunk {
                    Some(chunk) => buffer.extend(&chunk),
                    None => {
                        error!("channel closed while reading ({} bytes discarded)", buffer.len());
                        return Err(ChannelError::Closed.into());
                    }
                },
            }
        }
    }

    /// Read until `pattern` matches anywhere in the received bytes.
    ///
    /// Same cancellation, timeout and closure behavior as
    /// [`read_until_func`](Self::read_until_func).
    pub async fn read_until_match<P>(
        &self,
        token: &CancellationToken,
        timeout: Duration,
        pattern: &P,
    ) -> Result<Vec<u8>>
    where
        P: PromptMatcher + ?Sized,
    {
        self.read_until_func(token, timeout, |data| pattern.is_match(data))
            .await
    }

    /// Collect everything the device sends during `window`.
    ///
    /// There is no completion predicate, so a read that runs the whole
    /// window ends in [`ChannelError::Timeout`] carrying everything
    /// collected. Cancellation and closure fail as in
    /// [`read_until_func`](Self::read_until_func).
    pub async fn read_for(&self, token: &CancellationToken, window: Duration) -> Result<Vec<u8>> {
        let mut receiver = self.acquire_reader(token)?;
        let mut buffer = StreamBuffer::new();

        let deadline = time::sleep(window);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;

                _ = token.cancelled() => {
                    return Err(ChannelError::ParentCancelled {
                        partial: buffer.into_vec(),
                    }
                    .into());
                }
                _ = &mut deadline => {
                    return Err(ChannelError::Timeout {
                        timeout: window,
                        partial: buffer.into_vec(),
                    }
                    .into());
                }
                chunk = receiver.recv() => match chunk {
                    Some(chunk) => buffer.extend(&chunk),
                    None => {
                        error!("channel closed while reading ({} bytes discarded)", buffer.len());
                        return Err(ChannelError::Closed.into());
                    }
                },
            }
        }
    }

    /// Discard whatever the device sends during `window`.
    ///
    /// Returns the number of bytes dropped. Useful after login, where
    /// banners and MOTD text would otherwise land in the first command's
    /// output.
    pub async fn flush_for(&self, token: &CancellationToken, window: Duration) -> Result<usize> {
        let flushed = match self.read_for(token, window).await {
            Ok(data) => data.len(),
            Err(Error::Channel(ChannelError::Timeout { partial, .. })) => partial.len(),
            Err(e) => return Err(e),
        };
        debug!("flushed {} bytes", flushed);
        Ok(flushed)
    }

    /// Write `data` to the device.
    ///
    /// No buffering and no retry: a sink error is returned as
    /// [`ChannelError::Send`].
    pub async fn send(&self, data: &[u8]) -> Result<()> {
        let mut sink = self.sink.lock().await;
        sink.write_all(data).await.map_err(ChannelError::Send)?;
        sink.flush().await.map_err(ChannelError::Send)?;
        trace!("sent {} bytes", data.len());
        Ok(())
    }

    /// Start if needed and take exclusive ownership of the chunk queue.
    fn acquire_reader(
        &self,
        token: &CancellationToken,
    ) -> Result<OwnedMutexGuard<mpsc::Receiver<Bytes>>> {
        if token.is_cancelled() {
            return Err(ChannelError::ParentCancelled {
                partial: Vec::new(),
            }
            .into());
        }

        self.start(token)?;

        let receiver = match &*self.shared.lock() {
            Lifecycle::Running { receiver, .. } => receiver.clone(),
            _ => return Err(ChannelError::Closed.into()),
        };

        receiver
            .try_lock_owned()
            .map_err(|_| ChannelError::ReaderBusy.into())
    }

    #[cfg(test)]
    fn receiver_handle(&self) -> Option<ChunkReceiver> {
        match &*self.shared.lock() {
            Lifecycle::Running { receiver, .. } => Some(receiver.clone()),
            _ => None,
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shared.stop();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("state", &self.shared.lock().name())
            .finish_non_exhaustive()
    }
}

/// Ingestion loop: device source → chunk queue.
///
/// Teardown is the only place the queue gets closed (by dropping `tx`), so a
/// send can never hit a closed queue.
async fn ingest(
    mut source: BoxedSource,
    tx: mpsc::Sender<Bytes>,
    stop: CancellationToken,
    shared: Weak<Shared>,
) {
    debug!("started reader");
    let mut scratch = vec![0u8; READ_CHUNK_SIZE];

    loop {
        let n = tokio::select! {
            _ = stop.cancelled() => {
                debug!("reader stopped");
                break;
            }
            read = source.read(&mut scratch) => match read {
                Ok(0) => {
                    warn!("EOF received");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    error!("connection errored out: {}", e);
                    break;
                }
            },
        };

        let chunk = Bytes::copy_from_slice(&scratch[..n]);
        tokio::select! {
            _ = stop.cancelled() => {
                warn!("context stopped in reader, dropping {} bytes", n);
                break;
            }
            sent = tx.send(chunk) => {
                if sent.is_err() {
                    debug!("chunk queue has no receiver");
                    break;
                }
            }
        }
        trace!("processed {} bytes from device", n);
    }

    if let Some(shared) = shared.upgrade() {
        shared.stop();
    }
    drop(tx);
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::time::Instant;

    use regex::bytes::Regex;
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::testing::{connection_pair, feed};

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let (conn, _device) = connection_pair();
        let token = CancellationToken::new();
        assert!(!conn.is_running());

        conn.start(&token).unwrap();
        let first = conn.receiver_handle().unwrap();
        conn.start(&token).unwrap();
        let second = conn.receiver_handle().unwrap();

        assert!(conn.is_running());
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_stop_when_not_running_is_noop() {
        let (conn, _device) = connection_pair();
        conn.stop().unwrap();
        conn.stop().unwrap();
        assert!(!conn.is_running());

        // Never started, so it can still be started.
        conn.start(&CancellationToken::new()).unwrap();
        assert!(conn.is_running());
    }

    #[tokio::test]
    async fn test_read_until_match_across_chunks() {
        let (conn, device) = connection_pair();
        feed(
            device,
            &["cmd\n", "result line\n", "switch#"],
            Duration::from_millis(50),
        );

        let prompt = Regex::new(r"#$").unwrap();
        let data = conn
            .read_until_match(&CancellationToken::new(), Duration::from_secs(2), &prompt)
            .await
            .unwrap();

        assert_eq!(data, b"cmd\nresult line\nswitch#");
    }

    #[tokio::test]
    async fn test_match_and_func_agree() {
        let prompt = Regex::new(r"switch# $").unwrap();
        let chunks = ["show ver\n", "1.0\n", "switch# "];

        let (by_match, device) = connection_pair();
        feed(device, &chunks, Duration::from_millis(20));
        let (by_func, device) = connection_pair();
        feed(device, &chunks, Duration::from_millis(20));

        let token = CancellationToken::new();
        let a = by_match
            .read_until_match(&token, Duration::from_secs(2), &prompt)
            .await
            .unwrap();
        let b = by_func
            .read_until_func(&token, Duration::from_secs(2), |data| prompt.is_match(data))
            .await
            .unwrap();

        assert_eq!(a, b);
        assert_eq!(a, b"show ver\n1.0\nswitch# ");
    }

    #[tokio::test]
    async fn test_returned_bytes_are_what_predicate_saw() {
        let (conn, device) = connection_pair();
        feed(
            device,
            &["abc", "def", "ghi"],
            Duration::from_millis(30),
        );

        let mut seen = Vec::new();
        let data = conn
            .read_until_func(&CancellationToken::new(), Duration::from_secs(2), |buf| {
                seen = buf.to_vec();
                buf.ends_with(b"ghi")
            })
            .await
            .unwrap();

        assert_eq!(data, seen);
        assert_eq!(data, b"abcdefghi");
    }

    #[tokio::test]
    async fn test_timeout_returns_partial_bytes() {
        let (conn, device) = connection_pair();
        feed(device, &["partial output"], Duration::from_millis(10));

        let start = Instant::now();
        let err = conn
            .read_until_func(&CancellationToken::new(), Duration::from_millis(200), |_| false)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(err.partial_output(), Some(&b"partial output"[..]));
        assert!(start.elapsed() < Duration::from_secs(1));
        // A timeout does not end the session.
        assert!(conn.is_running());
    }

    #[tokio::test]
    async fn test_precancelled_token_returns_promptly() {
        let (conn, _device) = connection_pair();
        let token = CancellationToken::new();
        token.cancel();

        let prompt = Regex::new(r"#$").unwrap();
        let start = Instant::now();
        let err = conn
            .read_until_match(&token, Duration::from_secs(5), &prompt)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(start.elapsed() < POLL_INTERVAL);
        assert!(!conn.is_running());
    }

    #[tokio::test]
    async fn test_cancel_mid_read_keeps_partial_bytes() {
        let (conn, device) = connection_pair();
        feed(device, &["abc"], Duration::from_millis(10));

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            canceller.cancel();
        });

        let err = conn
            .read_until_func(&token, Duration::from_secs(5), |_| false)
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.partial_output(), Some(&b"abc"[..]));
    }

    #[tokio::test]
    async fn test_stop_closes_pending_and_later_reads() {
        let (conn, _device) = connection_pair();
        let conn = Arc::new(conn);

        let reader = {
            let conn = conn.clone();
            tokio::spawn(async move {
                let token = CancellationToken::new();
                conn.read_until_func(&token, Duration::from_secs(5), |_| false)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        conn.stop().unwrap();

        let err = reader.await.unwrap().unwrap_err();
        assert!(err.is_closed());
        assert!(!conn.is_running());

        let err = conn
            .read_for(&CancellationToken::new(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_closed());

        // Stopping again is still fine.
        conn.stop().unwrap();
    }

    #[tokio::test]
    async fn test_eof_closes_connection() {
        let (conn, mut device) = connection_pair();
        device.write_all(b"bye").await.unwrap();
        drop(device);

        let err = conn
            .read_until_func(&CancellationToken::new(), Duration::from_secs(2), |_| false)
            .await
            .unwrap_err();

        assert!(err.is_closed());
        assert!(err.partial_output().is_none());
        assert!(!conn.is_running());
    }

    #[tokio::test]
    async fn test_read_for_times_out_with_window_contents() {
        let (conn, device) = connection_pair();
        feed(
            device,
            &["banner line\n", "switch# "],
            Duration::from_millis(20),
        );

        let err = conn
            .read_for(&CancellationToken::new(), Duration::from_millis(300))
            .await
            .unwrap_err();
        match err {
            Error::Channel(ChannelError::Timeout { timeout, partial }) => {
                assert_eq!(timeout, Duration::from_millis(300));
                assert_eq!(partial, b"banner line\nswitch# ");
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(conn.is_running());
    }

    #[tokio::test]
    async fn test_read_for_cancel_keeps_partial_bytes() {
        let (conn, device) = connection_pair();
        feed(device, &["Press any key"], Duration::from_millis(10));

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            canceller.cancel();
        });

        let err = conn
            .read_for(&token, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(err.is_cancelled());
        assert_eq!(err.partial_output(), Some(&b"Press any key"[..]));
    }

    #[tokio::test]
    async fn test_read_for_eof_closes_connection() {
        let (conn, mut device) = connection_pair();
        device.write_all(b"logout").await.unwrap();
        drop(device);

        let err = conn
            .read_for(&CancellationToken::new(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(err.is_closed());
        assert!(!conn.is_running());

        let err = conn
            .flush_for(&CancellationToken::new(), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn test_flush_for_counts_discarded_bytes() {
        let (conn, device) = connection_pair();
        feed(device, &["Press any key"], Duration::from_millis(10));

        let flushed = conn
            .flush_for(&CancellationToken::new(), Duration::from_millis(200))
            .await
            .unwrap();
        assert_eq!(flushed, 13);
    }

    #[tokio::test]
    async fn test_concurrent_reader_is_rejected() {
        let (conn, _device) = connection_pair();
        let conn = Arc::new(conn);

        let first = {
            let conn = conn.clone();
            tokio::spawn(async move {
                conn.read_for(&CancellationToken::new(), Duration::from_millis(300))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let err = conn
            .read_until_func(&CancellationToken::new(), Duration::from_secs(1), |_| true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Channel(ChannelError::ReaderBusy)));

        assert!(first.await.unwrap().unwrap_err().is_timeout());
    }

    #[tokio::test]
    async fn test_send_writes_to_sink() {
        let sink = tokio_test::io::Builder::new()
            .write(b"show version\n")
            .build();
        let conn = Connection::new(sink, tokio::io::empty());

        conn.send(b"show version\n").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_failure_is_surfaced() {
        let sink = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::BrokenPipe, "link down"))
            .build();
        let conn = Connection::new(sink, tokio::io::empty());

        match conn.send(b"no page\n").await {
            Err(Error::Channel(ChannelError::Send(e))) => {
                assert_eq!(e.kind(), io::ErrorKind::BrokenPipe)
            }
            other => panic!("expected send failure, got {:?}", other),
        }
    }
}
