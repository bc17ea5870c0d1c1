//! HTTP/1.0 request reading
//!
//! Only the parts the control panel needs are parsed: the method, the target
//! path, `Content-Length`, `Accept-Language` and a bounded body. Every read
//! is guarded by the idle timeout; a read that times out degrades to an empty
//! value instead of failing the request.

use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::{debug, trace};

/// Longest request line accepted, longer lines are truncated
pub const MAX_REQUEST_LINE: usize = 1022;

/// Longest header line accepted, longer lines are truncated
pub const MAX_HEADER_LINE: usize = 8190;

/// Request method, numbered the way the control panel has always numbered it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Unrecognised method, malformed request or failed session check
    Unknown,
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `HEAD`: headers only
    Head,
}

impl Method {
    /// Classify a request line by its case-insensitive method prefix
    pub fn from_request_line(line: &str) -> Self {
        let lower = line.get(..5).unwrap_or(line).to_ascii_lowercase();
        if lower.starts_with("get ") {
            Method::Get
        } else if lower.starts_with("post ") {
            Method::Post
        } else if lower.starts_with("head ") {
            Method::Head
        } else {
            Method::Unknown
        }
    }

    /// Numeric code: 0 unknown, 1 GET, 2 POST, 10 HEAD
    pub fn code(self) -> u8 {
        match self {
            Method::Unknown => 0,
            Method::Get => 1,
            Method::Post => 2,
            Method::Head => 10,
        }
    }

    /// Whether the method is one the server answers
    pub fn is_known(self) -> bool {
        self != Method::Unknown
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Unknown => write!(f, "UNKNOWN"),
            Method::Get => write!(f, "GET"),
            Method::Post => write!(f, "POST"),
            Method::Head => write!(f, "HEAD"),
        }
    }
}

/// Bounds applied while reading a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    /// Idle timeout for each line and for the body
    pub timeout: Duration,
    /// Largest body kept; the rest is ignored
    pub max_body: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_body: 32 * 1024,
        }
    }
}

/// A request as read from the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Classified method
    pub method: Method,
    /// Request line, CR/LF stripped
    pub line: String,
    /// Target path including the query string, when well-formed
    pub target: Option<String>,
    /// `Content-Length` header value
    pub content_length: Option<usize>,
    /// First two characters of `Accept-Language`
    pub accept_language: Option<String>,
    /// Request body, possibly truncated
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Parse the request line only; headers and body are read separately
    pub fn from_request_line(line: &str) -> Self {
        Self {
            method: Method::from_request_line(line),
            line: line.to_string(),
            target: request_target(line).map(str::to_string),
            content_length: None,
            accept_language: None,
            body: Vec::new(),
        }
    }

    /// Form fields of the body, see [`parse_form`]
    pub fn form(&self) -> Vec<(String, String)> {
        parse_form(&self.body)
    }
}

/// Read one request
///
/// Returns `None` when no request line arrived before the timeout, in which
/// case nothing is answered.
pub async fn read_request<R>(reader: &mut R, limits: &RequestLimits) -> Option<HttpRequest>
where
    R: AsyncBufRead + Unpin,
{
    let line = read_line(reader, MAX_REQUEST_LINE, limits.timeout).await;
    if line.is_empty() {
        debug!("No request line received");
        return None;
    }
    debug!("Request: {}", line);

    let mut request = HttpRequest::from_request_line(&line);
    if !request.method.is_known() {
        return Some(request);
    }

    loop {
        let header = read_line(reader, MAX_HEADER_LINE, limits.timeout).await;
        if header.is_empty() {
            break;
        }
        trace!("Header: {}", header);
        if let Some(value) = header_value(&header, "content-length:") {
            request.content_length = value.trim().parse().ok();
        } else if let Some(value) = header_value(&header, "accept-language:") {
            let value = value.trim_start_matches(' ');
            request.accept_language = Some(value.chars().take(2).collect());
        }
    }

    if request.method == Method::Post {
        let length = request
            .content_length
            .unwrap_or(limits.max_body)
            .min(limits.max_body);
        if length > 0 {
            match read_body(reader, length, limits.timeout).await {
                Some(body) => request.body = body,
                None => {
                    debug!("No request body received, ignoring the request");
                    request.method = Method::Unknown;
                }
            }
        }
    }

    Some(request)
}

/// Read a line of at most `max` bytes, CR/LF stripped; empty on timeout
async fn read_line<R>(reader: &mut R, max: usize, timeout: Duration) -> String
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let mut limited = (&mut *reader).take(max as u64);
    match tokio::time::timeout(timeout, limited.read_until(b'\n', &mut buf)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => {
            debug!("Read failed: {}", e);
            return String::new();
        }
        Err(_) => {
            debug!("Read timed out after {:?}", timeout);
            return String::new();
        }
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Read up to `length` body bytes; `None` when nothing arrived in time
async fn read_body<R>(reader: &mut R, length: usize, timeout: Duration) -> Option<Vec<u8>>
where
    R: AsyncBufRead + Unpin,
{
    let mut body = Vec::with_capacity(length);
    let mut chunk = [0u8; 4096];
    while body.len() < length {
        let want = (length - body.len()).min(chunk.len());
        match tokio::time::timeout(timeout, reader.read(&mut chunk[..want])).await {
            Ok(Ok(0)) => break,
            Ok(Ok(n)) => body.extend_from_slice(&chunk[..n]),
            Ok(Err(e)) => {
                debug!("Body read failed: {}", e);
                break;
            }
            Err(_) => {
                debug!("Body read timed out with {} of {} bytes", body.len(), length);
                break;
            }
        }
    }
    if body.is_empty() {
        None
    } else {
        Some(body)
    }
}

/// Path part of the request line: after the first space, starting with `/`,
/// followed by another space
fn request_target(line: &str) -> Option<&str> {
    let (_, rest) = line.split_once(' ')?;
    let (target, _) = rest.split_once(' ')?;
    if target.starts_with('/') {
        Some(target)
    } else {
        None
    }
}

fn header_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let head = line.get(..name.len())?;
    if head.eq_ignore_ascii_case(name) {
        line.get(name.len()..)
    } else {
        None
    }
}

/// Decode an `application/x-www-form-urlencoded` body
///
/// Values are percent-decoded, and a value of `on` (any case), as sent by
/// checkboxes, becomes `1`. Fields with an empty name are dropped.
pub fn parse_form(body: &[u8]) -> Vec<(String, String)> {
    form_urlencoded::parse(body)
        .filter(|(key, _)| !key.is_empty())
        .map(|(key, value)| {
            let value = if value.eq_ignore_ascii_case("on") {
                "1".to_string()
            } else {
                value.into_owned()
            };
            (key.into_owned(), value)
        })
        .collect()
}
