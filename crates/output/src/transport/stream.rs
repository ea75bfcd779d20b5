use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::transport::Transport;

/// A [`Transport`] writing to a tokio [`AsyncWrite`], such as the write half of a
/// `TcpStream`.
///
/// Flushes are serialized by an async mutex, so the writer is never shared between two
/// in-flight flushes.
#[derive(Debug)]
pub struct StreamTransport<W> {
    writer: Mutex<W>,
}

impl<W> StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }

    /// Shuts the writer down once the response output is complete.
    pub async fn shutdown(&self) -> io::Result<()> {
        self.writer.lock().await.shutdown().await
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W> Transport for StreamTransport<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn flush(&self, buf: &[u8]) -> io::Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await?;
        writer.flush().await
    }
}
