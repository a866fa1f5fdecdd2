//! The request engine: worker thread, connect/send/receive state
//! machine, redirect handling, and deadline accounting.

use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use rand::Rng;

use crate::buffer::ByteBuffer;
use crate::error::{Error, ErrorInfo, ResultCode};
use crate::request::{IpVersion, RequestInfo, ResponseHandler};
use crate::response::{parse_response_header, ChunkDecoder, ResponseHeader};
use crate::socket::plain::PlainTransport;
#[cfg(feature = "tls")]
use crate::socket::tls::TlsTransport;
use crate::socket::{self, Transport};
use crate::time::TimeStamp;
use crate::url::Url;

const REDIRECT_MAX_COUNT: u8 = 7;
const REQUEST_ID_LEN: usize = 20;
const REQUEST_ID_ALPHABET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ1234567890";

fn random_request_id() -> String {
    let mut rng = rand::thread_rng();
    (0..REQUEST_ID_LEN)
        .map(|_| REQUEST_ID_ALPHABET[rng.gen_range(0..REQUEST_ID_ALPHABET.len())] as char)
        .collect()
}

/// A handle to an in-flight request. Dropping it blocks until the
/// worker thread finishes, matching `~Request()` joining its worker.
pub struct Engine {
    req_id: String,
    valid: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl Engine {
    pub fn new(info: RequestInfo, handler: ResponseHandler) -> Self {
        let req_id = random_request_id();
        let valid = Arc::new(AtomicBool::new(true));

        let worker_req_id = req_id.clone();
        let worker_valid = valid.clone();
        let worker = thread::spawn(move || {
            let mut state = RequestState {
                info,
                handler,
                req_id: worker_req_id,
                valid: worker_valid,
                start: TimeStamp::now(),
                redirect_count: 0,
                disconnected_fired: false,
            };
            state.process();
        });

        Self {
            req_id,
            valid,
            worker: Some(worker),
        }
    }

    pub fn req_id(&self) -> &str {
        &self.req_id
    }

    /// Silently stop the request. No further callbacks fire once
    /// cancelled, matching the original's `isValid_`-gated callbacks.
    pub fn cancel(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

struct RequestState {
    info: RequestInfo,
    handler: ResponseHandler,
    req_id: String,
    valid: Arc<AtomicBool>,
    start: TimeStamp,
    redirect_count: u8,
    disconnected_fired: bool,
}

impl RequestState {
    fn remain_time(&self) -> i64 {
        let deadline = self.start.add_millis(self.info.timeout.as_millis() as i64);
        crate::time::remaining_millis(deadline)
    }

    fn process(&mut self) {
        if !self.info.method.is_known() {
            self.handle_error(Error::new(ResultCode::MethodError));
            return;
        }

        let url = Url::parse(&self.info.url);
        if !url.is_valid() {
            self.handle_error(Error::new(ResultCode::UrlInvalid));
            return;
        }
        if !url.is_http_scheme() {
            self.handle_error(Error::new(ResultCode::SchemeNotSupported));
            return;
        }

        self.send_request(url);
    }

    fn resolve(&self, url: &Url) -> Result<(SocketAddr, IpVersion), Error> {
        let host = url.host.trim_start_matches('[').trim_end_matches(']');
        let port: u16 = url.port.parse().unwrap_or(if url.is_https() { 443 } else { 80 });
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|_| Error::new(ResultCode::GetAddressFailed))?
            .collect();
        if addrs.is_empty() {
            return Err(Error::new(ResultCode::GetAddressFailed));
        }
        let chosen = match self.info.ip_version {
            IpVersion::V4 => addrs.iter().find(|a| a.is_ipv4()).copied(),
            IpVersion::V6 => addrs.iter().find(|a| a.is_ipv6()).copied(),
            IpVersion::Auto => addrs.first().copied(),
        };
        let addr = chosen.ok_or_else(|| Error::new(ResultCode::ConnectTypeInconsistent))?;
        let resolved_version = if addr.is_ipv4() { IpVersion::V4 } else { IpVersion::V6 };
        Ok((addr, resolved_version))
    }

    fn send_request(&mut self, url: Url) {
        let (addr, _resolved_version) = match self.resolve(&url) {
            Ok(v) => v,
            Err(e) => return self.handle_error(e),
        };

        let timeout = self.remain_time();
        if timeout <= 0 {
            return self.handle_error(Error::new(ResultCode::Timeout));
        }

        let mut transport: Box<dyn Transport> = if url.is_https() {
            match self.connect_tls(addr, &url, timeout) {
                Ok(t) => t,
                Err(e) => {
                    log::warn!("req_id={} connect {addr} failed: {e}", self.req_id);
                    return self.handle_error(e);
                }
            }
        } else {
            match socket::connect_nonblocking(addr, timeout) {
                Ok(raw) => Box::new(PlainTransport::new(raw)),
                Err(e) => {
                    log::warn!("req_id={} connect {addr} failed: {e}", self.req_id);
                    return self.handle_error(e);
                }
            }
        };

        log::debug!("req_id={} connected to {addr}", self.req_id);
        if let Some(cb) = &self.handler.on_connected {
            cb(&self.req_id);
        }

        self.send(transport.as_mut(), &url);
        self.receive(transport.as_mut());
    }

    #[cfg(feature = "tls")]
    fn connect_tls(&self, addr: SocketAddr, url: &Url, timeout: i64) -> Result<Box<dyn Transport>, Error> {
        let raw = socket::connect_nonblocking(addr, timeout)?;
        let stream: TcpStream = raw.into();
        let mut tls = TlsTransport::new(stream, &url.host)?;
        let result = tls.handshake(self.remain_time());
        if !result.is_success() {
            return Err(result.into());
        }
        Ok(Box::new(tls))
    }

    #[cfg(not(feature = "tls"))]
    fn connect_tls(&self, _addr: SocketAddr, _url: &Url, _timeout: i64) -> Result<Box<dyn Transport>, Error> {
        Err(Error::new(ResultCode::SchemeNotSupported))
    }

    fn redirect(&mut self, location: &str) {
        if location.is_empty() {
            return self.handle_error(Error::new(ResultCode::RedirectError));
        }
        if self.redirect_count >= REDIRECT_MAX_COUNT {
            return self.handle_error(Error::new(ResultCode::RedirectReachMaxCount));
        }
        self.redirect_count += 1;

        let url = Url::parse(location);
        if !url.is_valid() || !url.is_http_scheme() {
            return self.handle_error(Error::new(ResultCode::RedirectError));
        }
        log::debug!(
            "req_id={} redirecting ({}/{REDIRECT_MAX_COUNT}) to {location}",
            self.req_id,
            self.redirect_count
        );
        self.send_request(url);
    }

    fn send(&mut self, transport: &mut dyn Transport, url: &Url) {
        let can_send = transport.can_send(self.remain_time());
        if !can_send.is_success() {
            return self.handle_error(can_send.into());
        }
        std::thread::sleep(std::time::Duration::from_millis(1));

        let wire = crate::request::serialize(&self.info, url);
        let mut remaining = wire.view();
        loop {
            if remaining.is_empty() {
                break;
            }
            let (result, sent) = transport.send(remaining);
            if !result.is_success() {
                return self.handle_error(result.into());
            }
            remaining = &remaining[sent..];
        }
    }

    fn is_receivable(&mut self, transport: &dyn Transport) -> bool {
        loop {
            if !self.valid.load(Ordering::SeqCst) {
                self.disconnected();
                return false;
            }
            let timeout = self.remain_time();
            let can_receive = transport.can_receive(timeout);
            if can_receive.is_success() {
                return true;
            }
            let timeout = self.remain_time();
            if timeout > 0 && can_receive.code == ResultCode::Retry {
                continue;
            }
            self.handle_error(can_receive.into());
            return false;
        }
    }

    fn receive(&mut self, transport: &mut dyn Transport) {
        let mut header: Option<ResponseHeader> = None;
        let mut recv_buf = ByteBuffer::new();
        let mut content_length: i64 = i64::MAX;
        let mut recv_length: i64 = 0;
        let mut chunked = false;
        let mut chunk_decoder = ChunkDecoder::new();

        loop {
            if !self.is_receivable(transport) {
                return;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));

            let (recv_result, mut data) = transport.receive();
            let completed_signal = recv_result.code == ResultCode::Completed
                || recv_result.code == ResultCode::Disconnected;

            if !recv_result.is_success() {
                if recv_result.code == ResultCode::Retry {
                    continue;
                }
                if completed_signal {
                    self.disconnected();
                } else {
                    self.handle_error(recv_result.into());
                }
                return;
            }

            let mut is_completed = completed_signal;

            if header.is_none() {
                recv_buf.append(&data);
                match parse_response_header(recv_buf.view()) {
                    Some((parsed, header_size)) => {
                        if parsed.is_need_redirect() && self.info.is_allow_redirect {
                            let location = parsed.header("Location").unwrap_or("").to_string();
                            self.redirect(&location);
                            return;
                        }
                        if let Some(cl) = parsed.header("Content-Length") {
                            content_length = cl.parse().unwrap_or(i64::MAX);
                        }
                        chunked = parsed
                            .header("Transfer-Encoding")
                            .map(|v| v.eq_ignore_ascii_case("chunked"))
                            .unwrap_or(false);
                        self.response_header(&parsed);
                        data = recv_buf.copy_from(header_size);
                        recv_buf.destroy();
                        header = Some(parsed);
                    }
                    None => continue,
                }
            }

            recv_length += data.len() as i64;
            if chunked {
                recv_buf.append(&data);
                let result = chunk_decoder.decode(recv_buf.view(), |chunk| {
                    self.response_data(&chunk);
                });
                match result {
                    Ok((chunk_completed, leftover)) => {
                        recv_buf = leftover;
                        is_completed = is_completed || chunk_completed;
                    }
                    Err(e) => {
                        log::warn!("req_id={} {e}", self.req_id);
                        self.handle_error(e);
                        return;
                    }
                }
            } else {
                is_completed = is_completed || recv_length >= content_length;
                if header.is_some() && !data.empty() {
                    self.response_data(&data);
                }
            }

            if is_completed {
                self.disconnected();
                return;
            }
        }
    }

    fn handle_error(&mut self, error: Error) {
        if let Some(cb) = &self.handler.on_error {
            let info: ErrorInfo = error;
            cb(&self.req_id, &info);
        }
        self.disconnected();
    }

    fn response_header(&self, header: &ResponseHeader) {
        if self.valid.load(Ordering::SeqCst) {
            if let Some(cb) = &self.handler.on_parse_header_done {
                cb(&self.req_id, header);
            }
        }
    }

    fn response_data(&self, data: &ByteBuffer) {
        if self.valid.load(Ordering::SeqCst) {
            if let Some(cb) = &self.handler.on_data {
                cb(&self.req_id, data);
            }
        }
    }

    fn disconnected(&mut self) {
        if self.disconnected_fired {
            return;
        }
        if self.valid.load(Ordering::SeqCst) {
            log::debug!("req_id={} disconnected", self.req_id);
            if let Some(cb) = &self.handler.on_disconnected {
                cb(&self.req_id);
            }
            self.disconnected_fired = true;
        }
    }
}
