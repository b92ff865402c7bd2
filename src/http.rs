//! Minimal HTTP/1.1 request parsing and response emission: buffered
//! (manifest, XAP, gate rejections) and chunked (fragments).
//!
//! The request-parsing loop is the teacher's `icecast::http::parse`
//! pattern: grow a fixed buffer until `httparse` reports a complete
//! request, then read the two proxy headers HSS relies on.

use httparse::Request;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::ConnectionError;

#[derive(Debug)]
pub struct ParsedRequest {
    pub path: String,
    pub x_origin: Option<String>,
    pub x_stream: Option<String>,
    pub keep_alive: bool,
}

/// Reads one HTTP request off `stream`, growing `buf` as needed.
///
/// `buf` persists across calls on the same connection: a pipelined
/// client can land more than one request in a single `read`, so on
/// success only the bytes the parsed request consumed are drained,
/// leaving any trailing bytes for the next call.
pub async fn read_request<S>(stream: &mut S, buf: &mut Vec<u8>) -> Result<ParsedRequest, ConnectionError>
where
    S: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 4096];

    loop {
        {
            let mut headers = [httparse::EMPTY_HEADER; 32];
            let mut request = Request::new(&mut headers);

            if let httparse::Status::Complete(consumed) = request.parse(buf)? {
                let parsed = to_parsed_request(&request);
                buf.drain(0..consumed);
                return Ok(parsed);
            }
        }

        if buf.len() > 64 * 1024 {
            return Err(ConnectionError::HeadersTooLong);
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Err(ConnectionError::PeerClosed);
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

fn to_parsed_request(request: &Request) -> ParsedRequest {
    let header = |name: &str| -> Option<String> {
        request.headers.iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .and_then(|h| std::str::from_utf8(h.value).ok())
            .map(|s| s.to_owned())
    };

    let keep_alive = header("connection")
        .map(|v| !v.eq_ignore_ascii_case("close"))
        .unwrap_or(true);

    ParsedRequest {
        path: request.path.unwrap_or("/").to_owned(),
        x_origin: header("x-origin"),
        x_stream: header("x-stream"),
        keep_alive,
    }
}

/// Writes a complete, buffered HTTP response: status line, headers,
/// `Content-Length`, then the body in one write.
pub async fn write_buffered<S>(
    stream: &mut S,
    status: &str,
    content_type: &str,
    extra_headers: &[(&str, &str)],
    body: &[u8],
) -> Result<(), ConnectionError>
where
    S: AsyncWrite + Unpin,
{
    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n",
        status, content_type, body.len()
    );

    for (name, value) in extra_headers {
        head.push_str(name);
        head.push_str(": ");
        head.push_str(value);
        head.push_str("\r\n");
    }

    head.push_str("\r\n");

    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    Ok(())
}

/// Writes the head of a chunked fragment response. Fragment bodies
/// always use `Content-Type: video/mp4` and the fixed `Pragma`/`ETag`
/// headers some HSS clients inspect.
pub async fn write_fragment_head<S>(stream: &mut S) -> Result<(), ConnectionError>
where
    S: AsyncWrite + Unpin,
{
    let head = concat!(
        "HTTP/1.1 200 OK\r\n",
        "Content-Type: video/mp4\r\n",
        "Pragma: IISMS/5.0,IIS Media Services Premium by Microsoft\r\n",
        "ETag: 3b517e5a0586303\r\n",
        "Transfer-Encoding: chunked\r\n",
        "\r\n",
    );

    stream.write_all(head.as_bytes()).await?;
    Ok(())
}

/// Writes one HTTP chunk: hex length, CRLF, data, CRLF. An empty slice
/// writes the terminating zero-length chunk.
pub async fn write_chunk<S>(stream: &mut S, data: &[u8]) -> Result<(), ConnectionError>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(format!("{:x}\r\n", data.len()).as_bytes()).await?;
    stream.write_all(data).await?;
    stream.write_all(b"\r\n").await?;
    Ok(())
}
