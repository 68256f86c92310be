//! Byte transports the engine reads chunks from and writes frames to.
//!
//! The engine never touches sockets directly. [`StreamTransport`] adapts any
//! tokio stream (TCP in production, `tokio::io::duplex` in tests), and
//! [`Cancellable`] bounds a transport's reads by a cancellation token and an
//! optional deadline, so a caller can stop a wait that would otherwise block
//! forever.

use bytes::Bytes;
use std::future::Future;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    constants::SOCKET_BUF_SIZE,
    error::{AmiError, AmiResult},
};

/// Receive half of a transport.
pub trait TransportRecv: Send {
    /// Next chunk of raw input, as soon as any is available.
    ///
    /// A chunk may hold part of a frame or several frames. Returns
    /// [`AmiError::ConnectionClosed`] at end of stream; cancellation and
    /// deadlines surface as [`AmiError::Cancelled`] / [`AmiError::Timeout`].
    fn recv(&mut self) -> impl Future<Output = AmiResult<Bytes>> + Send;
}

/// Send half of a transport.
pub trait TransportSend: Send {
    /// Write one encoded frame in full.
    fn send(&mut self, frame: &str) -> impl Future<Output = AmiResult<()>> + Send;

    /// Close the write side. The default does nothing.
    fn close(&mut self) -> impl Future<Output = AmiResult<()>> + Send {
        async { Ok(()) }
    }
}

/// A bidirectional transport that can be split for a dedicated reader task.
pub trait Transport: TransportRecv + TransportSend {
    /// Owned receive half.
    type RecvHalf: TransportRecv + 'static;
    /// Owned send half.
    type SendHalf: TransportSend + 'static;

    /// Split into independently owned halves.
    fn into_split(self) -> (Self::RecvHalf, Self::SendHalf);
}

/// Transport over a tokio byte stream.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
    read_buffer: Box<[u8]>,
}

/// TCP transport.
pub type TcpTransport = StreamTransport<TcpStream>;

/// Send half of a split [`TcpTransport`].
pub type TcpSendHalf = StreamSend<WriteHalf<TcpStream>>;

impl<S> StreamTransport<S> {
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            read_buffer: vec![0u8; SOCKET_BUF_SIZE].into_boxed_slice(),
        }
    }

    /// The wrapped stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }
}

impl StreamTransport<TcpStream> {
    /// Open a TCP connection, failing after `connect_timeout`.
    pub async fn connect(host: &str, port: u16, connect_timeout: Duration) -> AmiResult<Self> {
        match timeout(connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                debug!("[CONNECT] TCP connection established to {}:{}", host, port);
                Ok(Self::new(stream))
            }
            Ok(Err(e)) => {
                warn!("[CONNECT] TCP connect failed: {}", e);
                Err(AmiError::Io(e))
            }
            Err(_) => {
                let timeout_ms = connect_timeout.as_millis() as u64;
                warn!("[CONNECT] TCP connect timed out after {}ms", timeout_ms);
                Err(AmiError::Timeout { timeout_ms })
            }
        }
    }
}

async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> AmiResult<Bytes> {
    let n = reader
        .read(buf)
        .await?;
    if n == 0 {
        return Err(AmiError::ConnectionClosed);
    }
    trace!("[RECV] Read {} bytes", n);
    Ok(Bytes::copy_from_slice(&buf[..n]))
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &str) -> AmiResult<()> {
    writer
        .write_all(frame.as_bytes())
        .await?;
    writer
        .flush()
        .await?;
    Ok(())
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> TransportRecv for StreamTransport<S> {
    async fn recv(&mut self) -> AmiResult<Bytes> {
        read_chunk(&mut self.stream, &mut self.read_buffer).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send> TransportSend for StreamTransport<S> {
    async fn send(&mut self, frame: &str) -> AmiResult<()> {
        write_frame(&mut self.stream, frame).await
    }

    async fn close(&mut self) -> AmiResult<()> {
        self.stream
            .shutdown()
            .await?;
        Ok(())
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin + Send + 'static> Transport for StreamTransport<S> {
    type RecvHalf = StreamRecv<ReadHalf<S>>;
    type SendHalf = StreamSend<WriteHalf<S>>;

    fn into_split(self) -> (Self::RecvHalf, Self::SendHalf) {
        let (r, w) = tokio::io::split(self.stream);
        (
            StreamRecv {
                reader: r,
                read_buffer: self.read_buffer,
            },
            StreamSend { writer: w },
        )
    }
}

/// Receive half of a [`StreamTransport`].
#[derive(Debug)]
pub struct StreamRecv<R> {
    reader: R,
    read_buffer: Box<[u8]>,
}

impl<R: AsyncRead + Unpin + Send> TransportRecv for StreamRecv<R> {
    async fn recv(&mut self) -> AmiResult<Bytes> {
        read_chunk(&mut self.reader, &mut self.read_buffer).await
    }
}

/// Send half of a [`StreamTransport`].
#[derive(Debug)]
pub struct StreamSend<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> TransportSend for StreamSend<W> {
    async fn send(&mut self, frame: &str) -> AmiResult<()> {
        write_frame(&mut self.writer, frame).await
    }

    async fn close(&mut self) -> AmiResult<()> {
        self.writer
            .shutdown()
            .await?;
        Ok(())
    }
}

/// Bounds a transport's reads by a cancellation token and optional deadline.
///
/// A cancelled token makes `recv` return [`AmiError::Cancelled`]; a passed
/// deadline makes it return [`AmiError::Timeout`]. Sends are not bounded.
#[derive(Debug)]
pub struct Cancellable<T> {
    inner: T,
    token: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl<T> Cancellable<T> {
    /// Wrap `inner`, cancelling reads when `token` fires.
    pub fn new(inner: T, token: CancellationToken) -> Self {
        Self {
            inner,
            token,
            deadline: None,
        }
    }

    /// Additionally fail reads once `after` has elapsed from now.
    pub fn with_timeout(mut self, after: Duration) -> Self {
        self.deadline = Some((Instant::now() + after, after));
        self
    }

    /// Clear the deadline.
    pub fn clear_timeout(&mut self) {
        self.deadline = None;
    }

    /// The token this wrapper watches.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Unwrap the inner transport.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: TransportRecv> TransportRecv for Cancellable<T> {
    async fn recv(&mut self) -> AmiResult<Bytes> {
        let deadline = self.deadline;
        let sleep = async move {
            match deadline {
                Some((at, _)) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(AmiError::Cancelled),
            _ = sleep => Err(AmiError::Timeout {
                timeout_ms: deadline
                    .map(|(_, d)| d.as_millis() as u64)
                    .unwrap_or(0),
            }),
            chunk = self.inner.recv() => chunk,
        }
    }
}

impl<T: TransportSend> TransportSend for Cancellable<T> {
    async fn send(&mut self, frame: &str) -> AmiResult<()> {
        self.inner
            .send(frame)
            .await
    }

    async fn close(&mut self) -> AmiResult<()> {
        self.inner
            .close()
            .await
    }
}
