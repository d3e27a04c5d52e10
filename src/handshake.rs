//! The HTTP/1.1 upgrade handshake.

use std::{borrow::Cow, fmt::Write as _};

use base64::{Engine as _, engine::general_purpose};
use httparse::Status;
use sha1::{Digest, Sha1};

use crate::error::HandshakeError;

const GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

pub(crate) const BAD_REQUEST: &[u8] = b"HTTP/1.1 400 Bad Request\r\n\r\n";
pub(crate) const FORBIDDEN: &[u8] = b"HTTP/1.1 403 Forbidden\r\n\r\n";

/// Computes `Sec-WebSocket-Accept` for a `Sec-WebSocket-Key`.
pub fn accept_key(sec_key: &[u8]) -> String {
    let mut sha1 = Sha1::new();

    sha1.update(sec_key);
    sha1.update(GUID);

    general_purpose::STANDARD.encode(sha1.finalize())
}

fn lowercase(value: &str) -> Cow<'_, str> {
    match value.bytes().any(|b| b.is_ascii_uppercase()) {
        true => Cow::Owned(value.to_ascii_lowercase()),
        false => Cow::Borrowed(value),
    }
}

fn uppercase(value: &str) -> Cow<'_, str> {
    match value.bytes().any(|b| b.is_ascii_lowercase()) {
        true => Cow::Owned(value.to_ascii_uppercase()),
        false => Cow::Borrowed(value),
    }
}

/// Request headers in arrival order, keys lower-cased.
///
/// Repeated keys keep every value. Single-value lookups return the last one.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders<'buf> {
    entries: Vec<(Cow<'buf, str>, &'buf str)>,
}

impl<'buf> RequestHeaders<'buf> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, name: &'buf str, value: &'buf str) {
        self.entries.push((lowercase(name), value));
    }

    /// Returns the last value of `name`, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&'buf str> {
        self.get_all(name).last()
    }

    /// Returns every value of `name` in arrival order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'buf str> + 'a {
        self.entries
            .iter()
            .filter(move |(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    /// Returns how many times `name` appears.
    pub fn count(&self, name: &str) -> usize {
        self.get_all(name).count()
    }

    /// Iterates over `(key, value)` pairs in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &'buf str)> {
        self.entries.iter().map(|(key, value)| (key.as_ref(), *value))
    }

    /// Returns the number of header lines.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the request carries no headers.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed request block, borrowing from the connection buffer.
#[derive(Debug, Clone)]
pub struct Request<'buf> {
    method: Cow<'buf, str>,
    path: &'buf str,
    headers: RequestHeaders<'buf>,
    len: usize,
}

impl<'buf> Request<'buf> {
    /// The upper-cased request method.
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request target, as received.
    pub const fn path(&self) -> &'buf str {
        self.path
    }

    /// The request headers.
    pub const fn headers(&self) -> &RequestHeaders<'buf> {
        &self.headers
    }

    /// Shorthand for `headers().get(name)`.
    pub fn header(&self, name: &str) -> Option<&'buf str> {
        self.headers.get(name)
    }

    /// The length of the request line and headers, terminator included.
    pub const fn len(&self) -> usize {
        self.len
    }
}

fn find_terminator(src: &[u8]) -> Option<usize> {
    src.windows(4).position(|window| window == b"\r\n\r\n")
}

/// Parses the request block at the start of `src`.
///
/// Returns `Ok(None)` until `\r\n\r\n` has been received. Once it has, the
/// block either parses completely or is malformed, there is no partial state.
///
/// The request line needs a method and a path, each followed by a space. Header
/// lines are split at the first colon, key and value trimmed of spaces.
pub fn parse_request(src: &[u8], max_headers: usize) -> Result<Option<Request<'_>>, HandshakeError> {
    let Some(end) = find_terminator(src) else {
        return Ok(None);
    };

    let block = &src[..end + 4];

    match parse_http1(block, max_headers) {
        Some(request) => Ok(Some(request)),
        None => parse_lines(block, max_headers).map(Some),
    }
}

/// Parses a well-formed `HTTP/1.x` request with `httparse`.
fn parse_http1(block: &[u8], max_headers: usize) -> Option<Request<'_>> {
    let mut headers = vec![httparse::EMPTY_HEADER; max_headers];
    let mut request = httparse::Request::new(&mut headers);

    match request.parse(block) {
        Ok(Status::Complete(len)) if len == block.len() => {}
        _ => return None,
    }

    let mut parsed = RequestHeaders::with_capacity(request.headers.len());

    for header in request.headers.iter() {
        let value = core::str::from_utf8(header.value).ok()?;

        parsed.push(header.name, value.trim_matches(' '));
    }

    Some(Request {
        method: uppercase(request.method?),
        path: request.path?,
        headers: parsed,
        len: block.len(),
    })
}

/// Parses what `httparse` refuses, such as `Host : x` or another protocol version.
fn parse_lines(block: &[u8], max_headers: usize) -> Result<Request<'_>, HandshakeError> {
    let text = core::str::from_utf8(block).map_err(|_| HandshakeError::InvalidEncoding)?;

    let mut lines = text[..text.len() - 4].split("\r\n");

    let request_line = lines.next().unwrap_or_default();

    let (method, rest) = request_line
        .split_once(' ')
        .ok_or(HandshakeError::MalformedRequestLine)?;

    let (path, _) = rest
        .split_once(' ')
        .ok_or(HandshakeError::MalformedRequestLine)?;

    let mut headers = RequestHeaders::default();

    for line in lines {
        if headers.len() == max_headers {
            return Err(HandshakeError::TooManyHeaders);
        }

        let (name, value) = line.split_once(':').ok_or(HandshakeError::MalformedHeader)?;

        headers.push(name.trim_matches(' '), value.trim_matches(' '));
    }

    Ok(Request {
        method: uppercase(method),
        path,
        headers,
        len: block.len(),
    })
}

/// Returns `true` if the comma-separated `value` holds `token`, ignoring case and whitespace.
pub(crate) fn header_contains(value: &str, token: &str) -> bool {
    value
        .split(',')
        .any(|item| item.trim_matches([' ', '\t']).eq_ignore_ascii_case(token))
}

/// A request that may be upgraded once the application accepts it.
#[derive(Debug, Clone)]
pub struct Upgrade<'buf> {
    request: Request<'buf>,
    accept: String,
    echo_version: bool,
}

impl<'buf> Upgrade<'buf> {
    /// The upgrade request.
    pub const fn request(&self) -> &Request<'buf> {
        &self.request
    }

    /// The computed `Sec-WebSocket-Accept` value.
    pub fn accept(&self) -> &str {
        &self.accept
    }

    /// Builds the `101 Switching Protocols` response.
    ///
    /// `Sec-WebSocket-Version: 13` is included when the client asked for another version.
    pub fn response(&self) -> Vec<u8> {
        let version = match self.echo_version {
            true => "Sec-WebSocket-Version: 13\r\n",
            false => "",
        };

        format!(
            "HTTP/1.1 101 Switching Protocols\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             {version}\
             Sec-WebSocket-Accept: {}\r\n\r\n",
            self.accept
        )
        .into_bytes()
    }
}

/// What to do with the bytes received before the handshake completed.
#[derive(Debug)]
pub enum Handshake<'buf> {
    /// The request block is not complete yet.
    Partial,
    /// Answer with `400 Bad Request` and tear down.
    Malformed(HandshakeError),
    /// A plain HTTP request, answered once and torn down.
    Http(Request<'buf>),
    /// A valid WebSocket upgrade.
    Upgrade(Upgrade<'buf>),
}

/// Parses and validates the handshake at the start of `src`.
pub fn classify(src: &[u8], max_headers: usize) -> Handshake<'_> {
    let request = match parse_request(src, max_headers) {
        Ok(Some(request)) => request,
        Ok(None) => return Handshake::Partial,
        Err(err) => return Handshake::Malformed(err),
    };

    let Some(upgrade) = request.header("upgrade") else {
        return Handshake::Http(request);
    };

    if !upgrade.eq_ignore_ascii_case("websocket") {
        return Handshake::Malformed(HandshakeError::InvalidUpgrade);
    }

    match validate(&request) {
        Ok((accept, echo_version)) => Handshake::Upgrade(Upgrade {
            request,
            accept,
            echo_version,
        }),
        Err(err) => Handshake::Malformed(err),
    }
}

fn validate(request: &Request<'_>) -> Result<(String, bool), HandshakeError> {
    if request.method() != "GET" {
        return Err(HandshakeError::WrongHttpMethod);
    }

    if !request
        .header("connection")
        .is_some_and(|value| header_contains(value, "upgrade"))
    {
        return Err(HandshakeError::MissingOrInvalidConnection);
    }

    let version = request
        .header("sec-websocket-version")
        .ok_or(HandshakeError::MissingSecVersion)?;

    let sec_key = request
        .header("sec-websocket-key")
        .ok_or(HandshakeError::MissingSecKey)?;

    Ok((accept_key(sec_key.as_bytes()), version != "13"))
}

/// The default connection check.
///
/// Rejects repeated `Host` or `Origin` headers, and an `Origin` that differs
/// from `Host`. Accepts when either is absent.
pub fn same_origin(request: &Request<'_>) -> bool {
    let headers = request.headers();

    if headers.count("host") > 1 || headers.count("origin") > 1 {
        return false;
    }

    match (headers.get("host"), headers.get("origin")) {
        (Some(host), Some(origin)) => host == origin,
        _ => true,
    }
}

/// The answer to a plain HTTP request.
///
/// Without a status or body the response is `404`. `Connection: close` and
/// `Content-Length` are always written by the server and cannot be overridden.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    status: u16,
    body: Vec<u8>,
    headers: Vec<(String, String)>,
}

impl HttpResponse {
    /// Creates an empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the status code.
    pub fn status(&mut self, code: u16) -> &mut Self {
        self.status = code;
        self
    }

    /// Appends to the body, defaulting the status to `200`.
    pub fn send(&mut self, body: impl AsRef<[u8]>) -> &mut Self {
        if self.status == 0 {
            self.status = 200;
        }

        self.body.extend_from_slice(body.as_ref());
        self
    }

    /// Appends a response header.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The status that will be written: `404` if unset, `500` if outside `200..1000`.
    pub fn status_code(&self) -> u16 {
        match self.status {
            0 => 404,
            code if !(200..1000).contains(&code) => 500,
            code => code,
        }
    }

    /// The body written so far.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let code = self.status_code();

        let reason = http::StatusCode::from_u16(code)
            .ok()
            .and_then(|status| status.canonical_reason())
            .unwrap_or("Unknown");

        let mut head = format!(
            "HTTP/1.1 {code} {reason}\r\nConnection: close\r\nContent-Length: {}\r\n",
            self.body.len()
        );

        for (name, value) in self.headers.iter().filter(|(name, _)| {
            !name.eq_ignore_ascii_case("connection") && !name.eq_ignore_ascii_case("content-length")
        }) {
            let _ = write!(head, "{name}: {value}\r\n");
        }

        head.push_str("\r\n");

        let mut bytes = head.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}
