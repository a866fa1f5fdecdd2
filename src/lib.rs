//! A client-side HTTP/1.1 request engine.
//!
//! One OS thread is spawned per request; the caller observes the
//! exchange through a [`ResponseHandler`] of streaming callbacks
//! (`on_connected`, `on_parse_header_done`, `on_data`, and exactly one
//! of `on_disconnected`/`on_error`). Sockets are non-blocking and
//! polled with `select()`; TLS, when the `tls` feature is enabled, is
//! driven the same way through `rustls`.

pub mod buffer;
pub mod engine;
pub mod error;
pub mod init;
pub mod method;
pub mod request;
pub mod response;
pub mod socket;
pub mod time;
pub mod url;

pub use buffer::ByteBuffer;
pub use engine::Engine;
pub use error::{Error, ErrorInfo, ResultCode};
pub use method::HttpMethod;
pub use request::{IpVersion, RequestInfo, ResponseHandler};
pub use response::ResponseHeader;
pub use url::Url;
