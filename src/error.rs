//! Error kinds that can terminate a connection outright. Anything the
//! driver can recover from (malformed URL, stream not found, gate
//! rejection) is turned into an HTTP response inline and never reaches
//! these types — see `connection::run`.

use derive_more::From;

#[derive(Debug, From)]
pub enum ConnectionError {
    Io(tokio::io::Error),
    Http(httparse::Error),
    HeadersTooLong,
    /// The client disconnected mid-request or mid-stream.
    PeerClosed,
}
