//! Producer/consumer handoff for logs delivered on two separate streams
//!
//! Backends that hand stdout and stderr over as independent byte streams,
//! with a separate call that blocks until the log stream is exhausted, drain
//! through a bounded queue:
//!
//! - one pump per stream forwards chunks in the order they were read;
//! - once the completion call has returned *and* both pumps hit end of
//!   stream, the producer sends [`LogEvent::End`];
//! - the consumer writes every chunk to the sink and only stops on `End`.
//!
//! A queue that closes without `End` means the producer bailed out, and the
//! consumer reports it instead of returning a silently truncated log.

use crate::{ProviderError, Result};
use std::future::Future;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;

/// Queue depth between the pumps and the sink writer
pub const DEFAULT_LOG_QUEUE: usize = 20;

/// Which stream a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    Stdout,
    Stderr,
}

/// Message carried by the log queue
#[derive(Debug)]
pub enum LogEvent {
    Chunk { source: LogSource, data: Vec<u8> },
    End,
}

/// Totals reported once the consumer has seen `End`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub chunks: usize,
    pub bytes: u64,
}

/// Create a bounded log queue
pub fn log_channel(capacity: usize) -> (LogSender, LogReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (LogSender { tx }, LogReceiver { rx })
}

/// Producer half of the log queue
#[derive(Clone)]
pub struct LogSender {
    tx: mpsc::Sender<LogEvent>,
}

impl LogSender {
    /// Queue one chunk, waiting while the queue is full
    pub async fn send(&self, source: LogSource, data: Vec<u8>) -> Result<()> {
        self.tx
            .send(LogEvent::Chunk { source, data })
            .await
            .map_err(|_| ProviderError::LogStream("log consumer stopped early".to_string()))
    }

    /// Forward `reader` line by line until end of stream.
    ///
    /// Returns the number of bytes forwarded. A trailing line without a
    /// newline is forwarded as-is.
    pub async fn pump<R>(&self, source: LogSource, reader: R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let mut reader = BufReader::new(reader);
        let mut total = 0u64;
        loop {
            let mut line = Vec::new();
            let read = reader.read_until(b'\n', &mut line).await?;
            if read == 0 {
                return Ok(total);
            }
            total += read as u64;
            self.send(source, line).await?;
        }
    }

    /// End-of-stream handshake. Call only after every pump has returned.
    pub async fn finish(self) -> Result<()> {
        self.tx
            .send(LogEvent::End)
            .await
            .map_err(|_| ProviderError::LogStream("log consumer stopped early".to_string()))
    }
}

/// Consumer half of the log queue
pub struct LogReceiver {
    rx: mpsc::Receiver<LogEvent>,
}

impl LogReceiver {
    /// Write every queued chunk to `sink` until the producer sends `End`
    pub async fn drain_into<W>(mut self, sink: &mut W) -> Result<DrainSummary>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let mut summary = DrainSummary::default();
        loop {
            match self.rx.recv().await {
                Some(LogEvent::Chunk { data, .. }) => {
                    sink.write_all(&data).await?;
                    summary.chunks += 1;
                    summary.bytes += data.len() as u64;
                }
                Some(LogEvent::End) => {
                    sink.flush().await?;
                    return Ok(summary);
                }
                None => {
                    sink.flush().await?;
                    return Err(ProviderError::LogStream(
                        "log stream closed without end-of-stream marker".to_string(),
                    ));
                }
            }
        }
    }
}

/// Drain `stdout` and `stderr` into `sink` while `completion` runs.
///
/// `completion` is the call that blocks until the backend's log stream is
/// exhausted. The sink sees each stream's chunks in order; chunks from the
/// two streams may interleave.
pub async fn drain_streams<O, E, C, W>(
    stdout: O,
    stderr: E,
    completion: C,
    sink: &mut W,
    capacity: usize,
) -> Result<DrainSummary>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
    C: Future<Output = Result<()>>,
    W: AsyncWrite + Unpin + ?Sized,
{
    let (tx, rx) = log_channel(capacity);

    let producer = async move {
        let (completed, out, err) = tokio::join!(
            completion,
            tx.pump(LogSource::Stdout, stdout),
            tx.pump(LogSource::Stderr, stderr)
        );
        completed?;
        let out = out?;
        let err = err?;
        tracing::debug!("Log streams exhausted: stdout={}B stderr={}B", out, err);
        tx.finish().await
    };

    let (produced, drained) = tokio::join!(producer, rx.drain_into(sink));
    produced?;
    drained
}
