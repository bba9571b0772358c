use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::logger::{Logger, TracingLogger};
use crate::TransportError;

/// Largest accepted line, terminator excluded.
pub const MAX_FRAME: usize = 4096;

/// One line-oriented connection.
///
/// Received bytes are buffered internally and split on `\n`, so a read that
/// is cancelled (e.g. by [`try_read`](Stream::try_read) timing out) never
/// loses data: the next read picks up where the last one stopped.
///
/// A frame that outgrows [`MAX_FRAME`] is rejected as a whole: everything up
/// to its terminator is dropped, even bytes that arrive after the error.
pub struct Stream<S = TcpStream> {
    io: S,
    pending: Vec<u8>,
    /// Set while skipping the rest of an oversized frame.
    discarding: bool,
    peer: Option<SocketAddr>,
    logger: Arc<dyn Logger>,
}

impl Stream<TcpStream> {
    /// Client role: connects to `addr`.
    pub async fn connect<A>(addr: A) -> Result<Self, TransportError>
    where
        A: ToSocketAddrs + std::fmt::Display,
    {
        let label = addr.to_string();
        let tcp = TcpStream::connect(addr)
            .await
            .map_err(|source| TransportError::Connect { addr: label, source })?;
        Ok(Self::from_tcp(tcp))
    }

    pub(crate) fn from_tcp(tcp: TcpStream) -> Self {
        // Replies are tiny and strictly request/response.
        let _ = tcp.set_nodelay(true);
        let peer = tcp.peer_addr().ok();
        let mut stream = Self::new(tcp);
        stream.peer = peer;
        stream
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.io.local_addr().ok()
    }
}

impl<S> Stream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(io: S) -> Self {
        Self {
            io,
            pending: Vec::with_capacity(MAX_FRAME),
            discarding: false,
            peer: None,
            logger: Arc::new(TracingLogger::new("stream")),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Sends one line, adding the `\n` terminator if it is missing.
    pub async fn write(&mut self, line: &str) -> Result<(), TransportError> {
        self.logger.debug(&format!("-> {}", line.trim_end()));
        self.io.write_all(line.as_bytes()).await.map_err(TransportError::Write)?;
        if !line.ends_with('\n') {
            self.io.write_all(b"\n").await.map_err(TransportError::Write)?;
        }
        self.io.flush().await.map_err(TransportError::Write)
    }

    /// Waits for the next complete line.
    ///
    /// Control characters (including the `\r\n` terminator) are stripped and
    /// blank lines are skipped. A line that is not valid UTF-8 is consumed
    /// and reported as a [`TransportError::Read`].
    pub async fn read(&mut self) -> Result<String, TransportError> {
        let mut chunk = [0u8; MAX_FRAME];
        loop {
            while let Some(line) = self.take_line()? {
                if !line.is_empty() {
                    self.logger.debug(&format!("<- {}", line));
                    return Ok(line);
                }
            }
            if self.discarding {
                self.pending.clear();
            } else if self.pending.len() > MAX_FRAME {
                let len = self.pending.len();
                self.pending.clear();
                self.discarding = true;
                self.logger.warning(&format!("dropping oversized frame ({} bytes so far)", len));
                return Err(TransportError::FrameTooLarge { len, max: MAX_FRAME });
            }

            let n = self.io.read(&mut chunk).await.map_err(|e| {
                self.logger.error(&format!("read failed: {}", e));
                TransportError::Read(e)
            })?;
            if n == 0 {
                self.logger.error("end of communication");
                return Err(TransportError::EndOfCommunication);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Like [`read`](Stream::read) but gives up after `timeout`, returning
    /// `Ok(None)`. Partial data received before the timeout is kept.
    pub async fn try_read(&mut self, timeout: Duration) -> Result<Option<String>, TransportError> {
        match tokio::time::timeout(timeout, self.read()).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }

    fn take_line(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            let Some(pos) = self.pending.iter().position(|&b| b == b'\n') else {
                return Ok(None);
            };
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            if self.discarding {
                // Tail of a frame already reported as too large.
                self.discarding = false;
                continue;
            }
            if pos > MAX_FRAME {
                return Err(TransportError::FrameTooLarge { len: pos, max: MAX_FRAME });
            }
            let text = String::from_utf8(raw)
                .map_err(|e| TransportError::Read(io::Error::new(io::ErrorKind::InvalidData, e)))?;
            return Ok(Some(clean(&text)));
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.io
    }

    pub fn into_inner(self) -> S {
        self.io
    }
}

fn clean(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect::<String>().trim().to_string()
}
