//! Blocking `Write` adapter over a bounded channel of byte chunks.

use std::io::{self, Write};

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc::Sender;

/// Sends buffered bytes as `Ok(Bytes)` chunks.
///
/// Writes block while the channel is full, so a slow reader throttles the
/// encoder. Must only be used off the async runtime (`spawn_blocking`).
/// A closed receiver surfaces as [`io::ErrorKind::BrokenPipe`].
pub struct ChannelWriter<E> {
    tx: Sender<Result<Bytes, E>>,
    buffer: BytesMut,
    chunk_size: usize,
    sent: u64,
}

impl<E: Send + 'static> ChannelWriter<E> {
    pub fn new(tx: Sender<Result<Bytes, E>>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            tx,
            buffer: BytesMut::with_capacity(chunk_size),
            chunk_size,
            sent: 0,
        }
    }

    /// Bytes handed to the channel so far.
    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }

    fn send_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = self.buffer.split().freeze();
        let len = chunk.len() as u64;
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "export receiver closed"))?;
        self.sent += len;
        Ok(())
    }
}

impl<E: Send + 'static> Write for ChannelWriter<E> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.tx.is_closed() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "export receiver closed"));
        }
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= self.chunk_size {
            self.send_buffer()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send_buffer()
    }
}
