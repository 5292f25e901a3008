//! Minimal HTTP/1.0 transport for pre-rendered update requests.
//!
//! Provider requests are rendered to raw request text up front, so the
//! transport only moves bytes: connect, write the request verbatim, read the
//! reply until the server closes the connection (or the announced body is
//! complete) and split it into status and body. TLS is not handled here.

use std::error::Error;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Port used when the server name carries none.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Default connect/read/write timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Replies larger than this are cut off and rejected.
pub const MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// A completed HTTP exchange, as handed to a provider for interpretation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpTransaction {
    pub status: u16,
    /// Everything after the header block
    pub body: String,
}

impl HttpTransaction {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the status line says the body can be trusted.
    pub fn status_valid(&self) -> bool {
        is_status_acceptable(self.status)
    }
}

/// Only a plain `200` is a response worth interpreting.
pub fn is_status_acceptable(status: u16) -> bool {
    status == 200
}

/// Send a rendered request to `server` (`host` or `host:port`) and collect the reply.
///
/// The connection goes out over IPv6 when `ipv6` is set, IPv4 otherwise:
/// the server records the address the request came from.
pub fn send(server: &str, request: &[u8], timeout: Duration, ipv6: bool) -> Result<HttpTransaction, Box<dyn Error>> {
    let (host, port) = split_host_port(server);

    let addrs = (host, port)
        .to_socket_addrs()
        .map_err(|e| format!("Failed to resolve {}: {}", host, e))?;
    let addr = pick_address(addrs, ipv6).ok_or_else(|| {
        format!("No {} address found for {}", if ipv6 { "IPv6" } else { "IPv4" }, host)
    })?;

    log::debug!("Connecting to {} ({})", server, addr);

    let mut stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| format!("Failed to connect to {}: {}", server, e))?;
    stream.set_read_timeout(Some(timeout))?;
    stream.set_write_timeout(Some(timeout))?;

    stream.write_all(request)?;
    stream.flush()?;

    let raw = read_response(&mut stream, MAX_RESPONSE_SIZE)?;
    log::debug!("Received {} bytes from {}", raw.len(), server);

    parse_response(&raw)
}

/// Parse a raw HTTP response into status and body.
///
/// The header block ends at the first empty line; the body is decoded
/// lossily as UTF-8.
pub fn parse_response(raw: &[u8]) -> Result<HttpTransaction, Box<dyn Error>> {
    let text = String::from_utf8_lossy(raw);

    let (head, body) = split_head(&text).ok_or("Incomplete HTTP response: missing end of headers")?;
    let status_line = head.lines().next().ok_or("Empty HTTP response")?;
    let status = parse_status_line(status_line)?;

    Ok(HttpTransaction::new(status, body))
}

/// Parse `HTTP/x.y NNN reason` into its status code.
fn parse_status_line(line: &str) -> Result<u16, Box<dyn Error>> {
    let mut parts = line.split_whitespace();

    match parts.next() {
        Some(version) if version.starts_with("HTTP/") => {}
        _ => return Err(format!("Malformed HTTP status line: '{}'", line).into()),
    }

    let code = parts
        .next()
        .ok_or_else(|| format!("Missing status code in '{}'", line))?;

    code.parse::<u16>()
        .map_err(|_| format!("Invalid status code '{}' in '{}'", code, line).into())
}

fn split_head(text: &str) -> Option<(&str, &str)> {
    if let Some(pos) = text.find("\r\n\r\n") {
        return Some((&text[..pos], &text[pos + 4..]));
    }
    text.find("\n\n").map(|pos| (&text[..pos], &text[pos + 2..]))
}

fn content_length(head: &str) -> Option<usize> {
    head.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}

/// First resolved address of the wanted family.
fn pick_address(addrs: impl IntoIterator<Item = SocketAddr>, ipv6: bool) -> Option<SocketAddr> {
    addrs.into_iter().find(|addr| addr.is_ipv6() == ipv6)
}

fn split_host_port(server: &str) -> (&str, u16) {
    if let Some((host, port)) = server.rsplit_once(':') {
        if !host.contains(':') {
            if let Ok(port) = port.parse() {
                return (host, port);
            }
        }
    }
    (server, DEFAULT_HTTP_PORT)
}

/// Byte offset of the body, just past the blank line ending the headers.
fn body_offset(raw: &[u8]) -> Option<usize> {
    if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
        return Some(pos + 4);
    }
    raw.windows(2).position(|w| w == b"\n\n").map(|pos| pos + 2)
}

/// Read until EOF, or until the body announced by Content-Length is in.
fn read_response<R: Read>(reader: &mut R, limit: usize) -> Result<Vec<u8>, Box<dyn Error>> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
        if raw.len() > limit {
            return Err(format!("HTTP response exceeds {} bytes", limit).into());
        }

        if let Some(offset) = body_offset(&raw) {
            let head = String::from_utf8_lossy(&raw[..offset]);
            if let Some(len) = content_length(&head) {
                if raw.len() - offset >= len {
                    break;
                }
            }
        }
    }

    Ok(raw)
}
