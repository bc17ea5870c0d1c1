//! Browser-facing control panel
//!
//! A minimal HTTP/1.0 server. Every request runs through the same cycle in
//! [`ServerContext::handle`]; pages are templates rendered against the shared
//! state store.

mod dispatch;
mod handler;
mod request;
mod response;
mod server;

pub use dispatch::{Command, CommandDispatcher, DispatchOutcome, ERROR_PAGE};
pub use handler::{
    Reply, ServerContext, SharedContext, FINISHED_PAGE, HTML_DIR, INDEX_PAGE, REFRESH_PAGE,
    VIRTUAL_PREFIX,
};
pub use request::{
    parse_form, read_request, HttpRequest, Method, RequestLimits, MAX_HEADER_LINE,
    MAX_REQUEST_LINE,
};
pub use response::{is_image, ContentKind, HttpResponse, Status, SERVER_NAME};
pub use server::{candidate_ports, ControlServer};
