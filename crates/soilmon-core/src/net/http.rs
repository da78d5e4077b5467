//! Just enough HTTP/1.1 for a firmware: request-line parsing, response
//! writing and status-line parsing.

use alloc::string::String;
use core::fmt::Write as _;

use embedded_io_async::Write;

use super::{NetError, io_error};

/// Extract the request target (`/path?query`) from a raw request.
///
/// Only the first line is looked at. A request line with fewer than two
/// space-separated parts yields an empty target.
pub fn request_target(request: &str) -> &str {
    let first_line = request.split('\n').next().unwrap_or_default();
    first_line.split(' ').nth(1).unwrap_or_default()
}

/// Split a request target into path and optional query string.
pub fn split_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

pub const fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}

/// A complete response with a body known up front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<'a> {
    pub status: u16,
    pub content_type: &'a str,
    pub body: &'a [u8],
}

impl<'a> Response<'a> {
    pub const fn new(status: u16, content_type: &'a str, body: &'a [u8]) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    pub const fn html(body: &'a str) -> Self {
        Self::new(200, "text/html; charset=utf-8", body.as_bytes())
    }

    pub const fn json(body: &'a str) -> Self {
        Self::new(200, "application/json", body.as_bytes())
    }

    pub const fn not_found() -> Self {
        Self::new(404, "text/plain", b"Not Found")
    }

    /// Status line and headers, including the blank line.
    pub fn head(&self) -> String {
        let mut head = String::with_capacity(128);
        let _ = write!(
            head,
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len()
        );
        head
    }

    pub async fn write_to<W: Write>(&self, conn: &mut W) -> Result<(), NetError> {
        conn.write_all(self.head().as_bytes())
            .await
            .map_err(io_error)?;
        conn.write_all(self.body).await.map_err(io_error)?;
        conn.flush().await.map_err(io_error)
    }
}

/// Parse the status code out of a response's first line
/// (`HTTP/1.1 201 Created`).
pub fn parse_status_line(response: &[u8]) -> Option<u16> {
    let line_end = response.iter().position(|&b| b == b'\n')?;
    let line = core::str::from_utf8(&response[..line_end]).ok()?;
    let mut parts = line.trim_end().split(' ');

    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    let status: u16 = parts.next()?.parse().ok()?;
    (100..1000).contains(&status).then_some(status)
}
