//! Connects to the upstream media source process by stream name and
//! speaks its line-oriented command protocol.
//!
//! Mirrors the original connector's `Util::Stream::getStream(streamname)`
//! followed by `waitForMeta`: the upstream is reached over a per-stream
//! Unix domain socket named by convention, and the first thing it sends
//! is a JSON-encoded [`Meta`] document before any packets flow. This is
//! the connection-abstraction seam called out as an external collaborator;
//! only the naming convention and handshake shape are fixed here, the
//! packet framing past the handshake is the upstream's.
//!
//! [`Upstream`] and [`Connector`] are traits, not the concrete Unix-socket
//! types, so the driver in `connection.rs` can be exercised against an
//! in-process test double instead of a real socket.

use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

use hss_mux::model::Meta;

#[derive(Debug)]
pub enum ConnectError {
    Io(tokio::io::Error),
    NoMeta,
    BadMeta(serde_json::Error),
}

impl From<tokio::io::Error> for ConnectError {
    fn from(e: tokio::io::Error) -> Self {
        ConnectError::Io(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Audio,
    Video,
    /// Signals the end of the currently playing fragment.
    PauseMark,
    Metadata,
}

#[derive(Debug, Clone)]
pub struct Packet {
    pub kind: PacketKind,
    pub payload: Bytes,
}

/// A live connection to a single upstream source, already past the
/// metadata handshake. Implemented for a real Unix-socket connection by
/// [`UnixUpstream`]; tests implement this against an in-memory double.
#[async_trait]
pub trait Upstream: Send {
    fn meta(&self) -> &Meta;

    /// Sends `t <trackID>`, `s <ms>`, or `p [<ms>]` (newline-terminated).
    async fn send_command(&mut self, command: &str) -> Result<(), tokio::io::Error>;

    /// Sends a client stats line upstream; framing is opaque to us.
    async fn send_stats(&mut self, line: &str) -> Result<(), tokio::io::Error> {
        self.send_command(line).await
    }

    /// Reads the next packet. Returns `None` on clean upstream close.
    async fn recv_packet(&mut self) -> Result<Option<Packet>, tokio::io::Error>;
}

/// Resolves an `X-Stream` name to a live [`Upstream`]. Implemented for
/// real traffic by [`Registry`]; tests implement this against a fixed
/// in-memory stream table.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, stream_name: &str) -> Result<Box<dyn Upstream>, ConnectError>;
}

/// Resolves stream names to upstream socket paths under the Mist-style
/// temp directory convention (`<base>/stream_<name>`).
#[derive(Clone)]
pub struct Registry {
    base_dir: PathBuf,
}

impl Registry {
    pub fn new(base_dir: PathBuf) -> Self {
        Registry { base_dir }
    }

    fn socket_path(&self, stream_name: &str) -> PathBuf {
        self.base_dir.join(format!("stream_{}", stream_name))
    }
}

#[async_trait]
impl Connector for Registry {
    async fn connect(&self, stream_name: &str) -> Result<Box<dyn Upstream>, ConnectError> {
        let path = self.socket_path(stream_name);
        let conn = UnixStream::connect(&path).await?;
        let mut reader = BufReader::new(conn);

        let mut meta_line = String::new();
        let bytes_read = reader.read_line(&mut meta_line).await?;
        if bytes_read == 0 {
            return Err(ConnectError::NoMeta);
        }

        let meta: Meta = serde_json::from_str(meta_line.trim_end()).map_err(ConnectError::BadMeta)?;

        Ok(Box::new(UnixUpstream { reader, meta }))
    }
}

/// The real upstream connection: a Unix domain socket, framed as
/// newline-terminated command lines out and `<kind> <len>\n<payload>`
/// packets in.
pub struct UnixUpstream {
    reader: BufReader<UnixStream>,
    meta: Meta,
}

#[async_trait]
impl Upstream for UnixUpstream {
    fn meta(&self) -> &Meta {
        &self.meta
    }

    async fn send_command(&mut self, command: &str) -> Result<(), tokio::io::Error> {
        let conn = self.reader.get_mut();
        conn.write_all(command.as_bytes()).await?;
        conn.write_all(b"\n").await
    }

    /// Reads one newline-delimited packet header (`<kind> <len>`) followed
    /// by `len` raw payload bytes.
    async fn recv_packet(&mut self) -> Result<Option<Packet>, tokio::io::Error> {
        let mut header = String::new();
        let bytes_read = self.reader.read_line(&mut header).await?;
        if bytes_read == 0 {
            return Ok(None);
        }

        let mut parts = header.trim_end().splitn(2, ' ');
        let kind = match parts.next() {
            Some("audio") => PacketKind::Audio,
            Some("video") => PacketKind::Video,
            Some("pause") => PacketKind::PauseMark,
            Some("meta") => PacketKind::Metadata,
            _ => return Ok(None),
        };

        let len: usize = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let mut payload = vec![0u8; len];
        if len > 0 {
            tokio::io::AsyncReadExt::read_exact(&mut self.reader, &mut payload).await?;
        }

        Ok(Some(Packet { kind, payload: Bytes::from(payload) }))
    }
}
