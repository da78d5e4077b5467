//! URL decoding, query parsing and endpoint splitting.
//!
//! Pure string functions, independent of any socket.

use alloc::string::String;
use alloc::vec::Vec;

use thiserror_no_std::Error;

/// Decode an `application/x-www-form-urlencoded` value.
///
/// `+` becomes a space and `%XX` the byte `0xXX`. A `%` not followed by two
/// hex digits is kept literally and decoding continues with the next
/// character. Decoded bytes that are not valid UTF-8 are replaced with U+FFFD.
pub fn url_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => match (hex_value(bytes.get(i + 1)), hex_value(bytes.get(i + 2))) {
                (Some(hi), Some(lo)) => {
                    out.push(hi << 4 | lo);
                    i += 2;
                }
                _ => out.push(b'%'),
            },
            b => out.push(b),
        }
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: Option<&u8>) -> Option<u8> {
    let digit = char::from(*byte?).to_digit(16)?;
    Some(digit as u8)
}

/// Decoded `key=value` pairs of a query string, in order of appearance.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parse `a=1&b=2`. Values are URL-decoded, keys are taken verbatim. A
    /// pair without `=` maps its key to an empty value.
    pub fn parse(query: &str) -> Self {
        let pairs = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| match pair.split_once('=') {
                Some((key, value)) => (String::from(key), url_decode(value)),
                None => (String::from(pair), String::new()),
            })
            .collect();

        Self { pairs }
    }

    /// Value of `key`. When a key repeats, the last occurrence wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlError {
    #[error("only plain http:// URLs are supported")]
    UnsupportedScheme,
    #[error("URL has no host")]
    MissingHost,
    #[error("URL port is not a number")]
    InvalidPort,
}

/// The parts of an `http://host[:port][/path]` URL needed to open a socket
/// and write a request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
    /// Path and query, always starting with `/`.
    pub path: &'a str,
}

impl<'a> Endpoint<'a> {
    pub fn parse(url: &'a str) -> Result<Self, UrlError> {
        let rest = url
            .strip_prefix("http://")
            .ok_or(UrlError::UnsupportedScheme)?;

        let (authority, path) = match rest.find('/') {
            Some(idx) => rest.split_at(idx),
            None => (rest, "/"),
        };

        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, port.parse().map_err(|_| UrlError::InvalidPort)?),
            None => (authority, 80),
        };

        if host.is_empty() {
            return Err(UrlError::MissingHost);
        }

        Ok(Self { host, port, path })
    }
}
