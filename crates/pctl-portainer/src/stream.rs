use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc;

/// Receiving half of a bounded in-memory byte pipe.
///
/// The producer (a blocking tar writer, a child process' stdout pump)
/// pushes chunks through a [`ByteStreamSender`] while the consumer —
/// typically an HTTP request body — polls this end as a stream. The
/// channel bound is the backpressure: a full pipe blocks the producer
/// until the consumer catches up, so an archive is never materialized
/// in memory as a whole.
///
/// An `Err` chunk terminates the stream and fails whatever request is
/// consuming it, which is how producer-side failures (unreadable file,
/// nonzero exit of a local build) propagate without a side channel.
pub struct ByteStream {
    rx: mpsc::Receiver<io::Result<Bytes>>,
}

/// Sending half of the pipe. Dropping it ends the stream cleanly.
#[derive(Clone)]
pub struct ByteStreamSender {
    tx: mpsc::Sender<io::Result<Bytes>>,
}

impl ByteStream {
    /// Create a pipe holding at most `capacity` in-flight chunks.
    pub fn channel(capacity: usize) -> (ByteStreamSender, ByteStream) {
        let (tx, rx) = mpsc::channel(capacity);
        (ByteStreamSender { tx }, ByteStream { rx })
    }

    /// A stream over a payload that is already in memory.
    pub fn from_bytes(data: impl Into<Bytes>) -> ByteStream {
        let (sender, stream) = ByteStream::channel(1);
        // Channel of capacity 1 is empty, the send cannot fail.
        let _ = sender.tx.try_send(Ok(data.into()));
        stream
    }

    /// Drain the stream into a single buffer (test helper).
    pub async fn collect(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }
}

impl Stream for ByteStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl ByteStreamSender {
    /// Push a chunk, waiting for capacity. Returns `false` when the
    /// consumer is gone.
    pub async fn send(&self, chunk: Bytes) -> bool {
        self.tx.send(Ok(chunk)).await.is_ok()
    }

    /// Push a chunk from blocking (non-async) code.
    pub fn blocking_send(&self, chunk: Bytes) -> bool {
        self.tx.blocking_send(Ok(chunk)).is_ok()
    }

    /// Terminate the stream with an error.
    pub async fn fail(self, err: io::Error) {
        let _ = self.tx.send(Err(err)).await;
    }

    /// Terminate the stream with an error from blocking code.
    pub fn blocking_fail(self, err: io::Error) {
        let _ = self.tx.blocking_send(Err(err));
    }
}
