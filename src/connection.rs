//! Read/write halves of the AMI TCP socket.
//!
//! Mirrors the teacher's `Connection`, which owns a `BufWriter<TcpStream>`
//! plus a read buffer and exposes frame-level `read_frame`/`write_frame`
//! methods so callers never see raw bytes. Here the socket is split up
//! front into an [`AmiReader`] and [`AmiWriter`] instead, because the
//! session engine needs the read half owned exclusively by the reader task
//! (C2) while the write half is shared under a lock by concurrent callers
//! (C3) — a single `Connection` value can't satisfy both at once the way
//! it can in a request/response-per-connection server.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::AmiError;
use crate::frame::{Message, MessageParser};

/// Read half: owns the socket's read side and the line-reassembly buffer.
pub struct AmiReader {
    stream: OwnedReadHalf,
    parser: MessageParser,
    pending: std::collections::VecDeque<Message>,
    read_buf: BytesMut,
}

impl AmiReader {
    pub(crate) fn new(stream: OwnedReadHalf, capacity: usize) -> Self {
        AmiReader {
            stream,
            parser: MessageParser::with_capacity(capacity),
            pending: std::collections::VecDeque::new(),
            read_buf: BytesMut::with_capacity(4096),
        }
    }

    /// Consume the server's connect-time banner line (e.g.
    /// `Asterisk Call Manager/9.0.0\r\n`), the one line of the protocol
    /// that is not itself a `Key: Value` message (`spec.md` §4.2).
    pub(crate) async fn read_banner(&mut self) -> Result<String, AmiError> {
        loop {
            if let Some(pos) = find_crlf(&self.read_buf) {
                let line = self.read_buf.split_to(pos + 2);
                let line = String::from_utf8_lossy(&line[..line.len() - 2]).into_owned();
                return Ok(line);
            }
            let n = self.fill_buf().await?;
            if n == 0 {
                return Err(AmiError::Connection(
                    "connection closed before banner was received".into(),
                ));
            }
        }
    }

    /// Read the next fully-assembled message, blocking on socket reads as
    /// needed. Returns `Ok(None)` on a clean EOF.
    ///
    /// Bytes already sitting in `read_buf` (e.g. the remainder of the TCP
    /// segment `read_banner` split the banner line off of) are drained into
    /// the parser before ever blocking on a socket read, so a message that
    /// arrived in the same packet as the banner — or the same packet as the
    /// one that triggers EOF — is never stalled or dropped.
    pub(crate) async fn read_message(&mut self) -> Result<Option<Message>, AmiError> {
        loop {
            if let Some(msg) = self.pending.pop_front() {
                return Ok(Some(msg));
            }
            if !self.read_buf.is_empty() {
                let chunk = self.read_buf.split();
                let messages = self.parser.feed(&chunk)?;
                self.pending.extend(messages);
                continue;
            }
            let n = self.fill_buf().await?;
            if n == 0 {
                // read_buf and pending are both already drained at this
                // point (checked above), so EOF here means nothing is left
                // to hand back.
                return Ok(None);
            }
        }
    }

    async fn fill_buf(&mut self) -> Result<usize, AmiError> {
        let mut tmp = [0u8; 8192];
        let n = self.stream.read(&mut tmp).await?;
        self.read_buf.extend_from_slice(&tmp[..n]);
        Ok(n)
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Write half: owns the socket's write side, buffered the way the
/// teacher's `Connection` buffers writes before flushing.
pub struct AmiWriter {
    stream: BufWriter<OwnedWriteHalf>,
}

impl AmiWriter {
    pub(crate) fn new(stream: OwnedWriteHalf) -> Self {
        AmiWriter {
            stream: BufWriter::new(stream),
        }
    }

    /// Write one outbound action frame: `Action:`/`ActionID:` lines, the
    /// caller-supplied key/value lines, then the blank-line terminator
    /// (`spec.md` §4.3). No trailing newline beyond the terminator.
    pub(crate) async fn write_action(
        &mut self,
        action: &str,
        action_id: i64,
        params: &[(String, String)],
    ) -> Result<(), AmiError> {
        self.stream
            .write_all(format!("Action: {action}\r\n").as_bytes())
            .await?;
        self.stream
            .write_all(format!("ActionID: {action_id}\r\n").as_bytes())
            .await?;
        for (key, value) in params {
            self.stream
                .write_all(format!("{key}: {value}\r\n").as_bytes())
                .await?;
        }
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await?;
        Ok(())
    }

    pub(crate) async fn shutdown(&mut self) -> Result<(), AmiError> {
        self.stream.get_mut().shutdown().await?;
        Ok(())
    }
}

/// Split a freshly-connected socket into its reader/writer halves.
pub(crate) fn split(stream: TcpStream, buffer_capacity: usize) -> (AmiReader, AmiWriter) {
    let (read_half, write_half) = stream.into_split();
    (
        AmiReader::new(read_half, buffer_capacity),
        AmiWriter::new(write_half),
    )
}

/// Parameter strings must not contain embedded CRLF (`spec.md` §4.3); this
/// is the guard the action builder runs before handing params to
/// `write_action`.
pub fn validate_param(key: &str, value: &str) -> Result<(), AmiError> {
    if key.contains('\r') || key.contains('\n') || value.contains('\r') || value.contains('\n') {
        return Err(AmiError::Usage(format!(
            "action parameter '{key}' must not contain CR or LF"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt as _;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn reads_banner_then_messages() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(b"Asterisk Call Manager/9.0.0\r\n").await.unwrap();
            sock.write_all(b"Response: Success\r\nActionID: 1\r\n\r\n")
                .await
                .unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut reader, _writer) = split(stream, crate::frame::DEFAULT_BUFFER_CAPACITY);
        let banner = reader.read_banner().await.unwrap();
        assert_eq!(banner, "Asterisk Call Manager/9.0.0");

        let msg = reader.read_message().await.unwrap().unwrap();
        assert_eq!(msg.get("Response"), Some("Success"));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn banner_and_message_in_one_segment_are_both_delivered() {
        // Exercises the case a single `write_all` reliably reproduces: the
        // banner and the first message arrive in the same read, so the
        // message's bytes are already sitting in `read_buf` once
        // `read_banner` returns, with no further socket activity to trigger
        // on. The peer then closes immediately, so a buggy implementation
        // that only feeds `read_buf` after a blocking read would see EOF
        // and drop the message instead of returning it.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            sock.write_all(
                b"Asterisk Call Manager/9.0.0\r\nResponse: Success\r\nActionID: 1\r\n\r\n",
            )
            .await
            .unwrap();
            sock.shutdown().await.unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (mut reader, _writer) = split(stream, crate::frame::DEFAULT_BUFFER_CAPACITY);
        let banner = reader.read_banner().await.unwrap();
        assert_eq!(banner, "Asterisk Call Manager/9.0.0");

        let msg = reader.read_message().await.unwrap().unwrap();
        assert_eq!(msg.get("Response"), Some("Success"));

        assert!(reader.read_message().await.unwrap().is_none());

        server.await.unwrap();
    }

    #[test]
    fn validate_param_rejects_embedded_crlf() {
        assert!(validate_param("Channel", "SIP/1\r\nActionID: evil").is_err());
        assert!(validate_param("Channel", "SIP/1").is_ok());
    }
}
