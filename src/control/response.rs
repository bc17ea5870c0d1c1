//! HTTP/1.0 response assembly

use std::fmt;

/// Value of the `Server` header
pub const SERVER_NAME: &str = "webhttrack-server";

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 200
    Ok,
    /// 302, used to turn form posts into page loads
    Redirect,
    /// 404
    NotFound,
    /// 500, debug builds only
    ServerError,
}

impl Status {
    /// Numeric status code
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Redirect => 302,
            Status::NotFound => 404,
            Status::ServerError => 500,
        }
    }

    fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Redirect => "Redirect",
            Status::NotFound => "Not Found",
            Status::ServerError => "Server Error",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// How a served file is delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// A template, rendered and never cached
    Html,
    /// Plain text, sent verbatim
    Text,
    /// An image or other binary asset, sent verbatim
    Image(&'static str),
}

impl ContentKind {
    /// Classify a file by name
    pub fn from_path(file: &str) -> Self {
        let lower = file.to_ascii_lowercase();
        if lower.contains(".htm") {
            ContentKind::Html
        } else if lower.contains(".txt") {
            ContentKind::Text
        } else {
            ContentKind::Image(image_type(&lower))
        }
    }

    /// `Content-Type` value
    pub fn content_type(self) -> &'static str {
        match self {
            ContentKind::Html => "text/html",
            ContentKind::Text => "text/plain",
            ContentKind::Image(mime) => mime,
        }
    }
}

/// Whether a path names an image, which stays reachable while a mirror runs
pub fn is_image(file: &str) -> bool {
    let lower = file.to_ascii_lowercase();
    IMAGE_TYPES.iter().any(|(ext, _)| lower.ends_with(ext))
}

const IMAGE_TYPES: &[(&str, &str)] = &[
    (".gif", "image/gif"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".ico", "image/x-icon"),
];

fn image_type(lower: &str) -> &'static str {
    IMAGE_TYPES
        .iter()
        .find(|(ext, _)| lower.ends_with(ext))
        .map(|(_, mime)| *mime)
        .unwrap_or("application/octet-stream")
}

/// A complete response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status line
    pub status: Status,
    /// Extra headers, in order
    pub headers: Vec<(String, String)>,
    /// Body; its length is always announced
    pub body: Vec<u8>,
    /// Whether the body is written after the headers
    pub send_body: bool,
}

impl HttpResponse {
    /// 200 with content
    pub fn content(kind: ContentKind, body: Vec<u8>) -> Self {
        let mut headers = vec![("Content-Type".to_string(), kind.content_type().to_string())];
        if kind == ContentKind::Html {
            headers.push((
                "Cache-Control".to_string(),
                "no-cache, must-revalidate, private".to_string(),
            ));
            headers.push(("Pragma".to_string(), "no-cache".to_string()));
        }
        Self {
            status: Status::Ok,
            headers,
            body,
            send_body: true,
        }
    }

    /// 302 to `location`, no body
    pub fn redirect(location: &str) -> Self {
        Self {
            status: Status::Redirect,
            headers: vec![("Location".to_string(), location.to_string())],
            body: Vec::new(),
            send_body: false,
        }
    }

    /// 404 page
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
            body: b"Page not found.\r\n".to_vec(),
            send_body: true,
        }
    }

    /// 500 page
    pub fn server_error() -> Self {
        Self {
            status: Status::ServerError,
            headers: vec![("Content-Type".to_string(), "text/html".to_string())],
            body: b"Server error.\r\n".to_vec(),
            send_body: true,
        }
    }

    /// Keep the headers, including the length, but drop the body
    pub fn headers_only(mut self) -> Self {
        self.send_body = false;
        self
    }

    /// Serialise status line, headers and, when sent, the body
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!(
            "HTTP/1.0 {}\r\nConnection: close\r\nServer: {}\r\n",
            self.status, SERVER_NAME
        )
        .into_bytes();
        for (name, value) in &self.headers {
            out.extend_from_slice(format!("{}: {}\r\n", name, value).as_bytes());
        }
        out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", self.body.len()).as_bytes());
        if self.send_body {
            out.extend_from_slice(&self.body);
        }
        out
    }
}
