//! TLS transport, built directly on `rustls::ClientConnection` rather
//! than `rustls::StreamOwned`, so the handshake and data phases can
//! drive the same `select()`-based want-read/want-write retry loop
//! the plaintext transport uses.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::sync::{Arc, OnceLock};

use rustls::{ClientConfig, ClientConnection, RootCertStore};
use rustls_pki_types::ServerName;

use super::{select, SelectType, SocketResult, Transport, DEFAULT_READ_SIZE, MAX_RETRY_COUNT};
use crate::buffer::ByteBuffer;
use crate::error::ResultCode;

type ConfiguratorFn = dyn Fn(&mut ClientConfig) + Send + Sync;

static CONFIGURATOR: OnceLock<Box<ConfiguratorFn>> = OnceLock::new();
static SHARED_CONTEXT: OnceLock<Arc<ClientConfig>> = OnceLock::new();

/// Install a one-shot hook that customizes the shared `ClientConfig`
/// the first time it is built. Calling this after the context has
/// already been created has no effect, matching the original's
/// `call_once`-guarded `configContext`.
pub fn set_context_configurator<F>(f: F)
where
    F: Fn(&mut ClientConfig) + Send + Sync + 'static,
{
    let _ = CONFIGURATOR.set(Box::new(f));
}

fn shared_context() -> Arc<ClientConfig> {
    SHARED_CONTEXT
        .get_or_init(|| {
            let mut roots = RootCertStore::empty();
            for cert in rustls_native_certs::load_native_certs().certs {
                let _ = roots.add(cert);
            }

            let mut config = ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth();

            if let Some(hook) = CONFIGURATOR.get() {
                hook(&mut config);
            }

            Arc::new(config)
        })
        .clone()
}

pub struct TlsTransport {
    stream: TcpStream,
    conn: ClientConnection,
}

impl TlsTransport {
    pub fn new(stream: TcpStream, server_name: &str) -> Result<Self, crate::error::Error> {
        stream
            .set_nonblocking(true)
            .map_err(|e| crate::error::Error::from_io_error(ResultCode::SetFlagsFailed, &e))?;
        let name = ServerName::try_from(server_name.to_string())
            .map_err(|_| crate::error::Error::new(ResultCode::UrlInvalid))?;
        let conn = ClientConnection::new(shared_context(), name)
            .map_err(|_| crate::error::Error::new(ResultCode::Failed))?;
        Ok(Self { stream, conn })
    }

    /// Drive the handshake, retrying on want-read/want-write exactly as
    /// `TSLSocket::connect` waits on `select()` for the direction
    /// OpenSSL reported.
    pub fn handshake(&mut self, timeout_ms: i64) -> SocketResult {
        let fd = self.stream.as_raw_fd();
        let deadline = crate::time::TimeStamp::now().add_millis(timeout_ms);
        while self.conn.is_handshaking() {
            let remaining = crate::time::remaining_millis(deadline);
            if remaining <= 0 {
                return SocketResult::failed(ResultCode::Timeout, 0);
            }
            if self.conn.wants_write() {
                let _ = select(SelectType::Write, fd, remaining);
                if let Err(e) = self.conn.write_tls(&mut self.stream) {
                    if e.kind() != std::io::ErrorKind::WouldBlock {
                        return SocketResult::failed(ResultCode::Failed, e.raw_os_error().unwrap_or(0));
                    }
                }
            }
            if self.conn.wants_read() {
                let _ = select(SelectType::Read, fd, remaining);
                match self.conn.read_tls(&mut self.stream) {
                    Ok(0) => return SocketResult::failed(ResultCode::Disconnected, 0),
                    Ok(_) => {
                        if let Err(e) = self.conn.process_new_packets() {
                            let _ = e;
                            return SocketResult::failed(ResultCode::Failed, 0);
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(e) => return SocketResult::failed(ResultCode::Failed, e.raw_os_error().unwrap_or(0)),
                }
            }
        }
        SocketResult::default()
    }
}

impl Transport for TlsTransport {
    fn send(&mut self, data: &[u8]) -> (SocketResult, usize) {
        let mut retry_count = 0u32;
        loop {
            retry_count += 1;
            match self.conn.writer().write(data) {
                Ok(0) => return (SocketResult::failed(ResultCode::Disconnected, 0), 0),
                Ok(n) => {
                    let _ = self.conn.write_tls(&mut self.stream);
                    return (SocketResult::default(), n);
                }
                Err(e) => {
                    let would_block = e.kind() == std::io::ErrorKind::WouldBlock;
                    if retry_count >= MAX_RETRY_COUNT {
                        return (SocketResult::failed(ResultCode::RetryReachMaxCount, 0), 0);
                    }
                    if !would_block {
                        return (SocketResult::failed(ResultCode::Failed, e.raw_os_error().unwrap_or(0)), 0);
                    }
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
            }
        }
    }

    fn receive(&mut self) -> (SocketResult, ByteBuffer) {
        let mut retry_count = 0u32;
        loop {
            retry_count += 1;
            match self.conn.read_tls(&mut self.stream) {
                Ok(0) => return (SocketResult::failed(ResultCode::Disconnected, 0), ByteBuffer::new()),
                Ok(_) => {
                    if self.conn.process_new_packets().is_err() {
                        return (SocketResult::failed(ResultCode::Failed, 0), ByteBuffer::new());
                    }
                    let mut buf = vec![0u8; DEFAULT_READ_SIZE];
                    match self.conn.reader().read(&mut buf) {
                        Ok(0) => return (SocketResult::failed(ResultCode::Disconnected, 0), ByteBuffer::new()),
                        Ok(n) => {
                            buf.truncate(n);
                            return (SocketResult::default(), ByteBuffer::from(buf));
                        }
                        Err(_) => return (SocketResult::default(), ByteBuffer::new()),
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    if retry_count >= MAX_RETRY_COUNT {
                        return (SocketResult::failed(ResultCode::Retry, 0), ByteBuffer::new());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(1));
                }
                Err(e) => return (SocketResult::failed(ResultCode::Failed, e.raw_os_error().unwrap_or(0)), ByteBuffer::new()),
            }
        }
    }

    fn can_send(&self, timeout_ms: i64) -> SocketResult {
        select(SelectType::Write, self.stream.as_raw_fd(), timeout_ms)
    }

    /// Short-circuits to success when rustls already has buffered
    /// plaintext, matching `SSL_pending() > 0`.
    fn can_receive(&self, timeout_ms: i64) -> SocketResult {
        if self.conn.wants_read() {
            select(SelectType::Read, self.stream.as_raw_fd(), timeout_ms)
        } else {
            SocketResult::default()
        }
    }
}
