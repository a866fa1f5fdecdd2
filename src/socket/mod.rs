//! Non-blocking socket primitive: readiness polling, connect, and the
//! plaintext/TLS transport split.

pub mod plain;
#[cfg(feature = "tls")]
pub mod tls;

use std::io;
use std::net::SocketAddr;
use std::os::fd::{AsRawFd, RawFd};

use socket2::{Domain, Protocol, Socket as RawSocket, Type};

use crate::buffer::ByteBuffer;
use crate::error::{Error, ResultCode};

pub const DEFAULT_READ_SIZE: usize = 4 * 1024;

/// Bounded retry budget for EINTR-class send/receive retries.
/// An implementation choice; the original leaves this unspecified.
pub const MAX_RETRY_COUNT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectType {
    Read,
    Write,
}

/// Outcome of a socket-level operation, paired with the raw `errno`
/// when one was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketResult {
    pub code: ResultCode,
    pub errno: i32,
}

impl Default for SocketResult {
    fn default() -> Self {
        Self {
            code: ResultCode::Success,
            errno: 0,
        }
    }
}

impl SocketResult {
    pub fn is_success(&self) -> bool {
        self.code == ResultCode::Success
    }

    pub fn failed(code: ResultCode, errno: i32) -> Self {
        Self { code, errno }
    }
}

impl From<SocketResult> for Error {
    fn from(r: SocketResult) -> Self {
        Error::with_errno(r.code, r.errno)
    }
}

fn last_errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

/// Wait for `fd` to become readable or writable, up to `timeout_ms`.
/// A negative timeout blocks indefinitely; the engine never actually
/// passes one since every wait here is deadline-bound.
pub fn select(kind: SelectType, fd: RawFd, timeout_ms: i64) -> SocketResult {
    unsafe {
        let mut read_set: libc::fd_set = std::mem::zeroed();
        let mut write_set: libc::fd_set = std::mem::zeroed();
        libc::FD_ZERO(&mut read_set);
        libc::FD_ZERO(&mut write_set);
        libc::FD_SET(fd, if kind == SelectType::Read { &mut read_set } else { &mut write_set });

        let mut tv = libc::timeval {
            tv_sec: (timeout_ms / 1000) as libc::time_t,
            tv_usec: ((timeout_ms % 1000) * 1000) as libc::suseconds_t,
        };
        let tv_ptr = if timeout_ms >= 0 {
            &mut tv as *mut libc::timeval
        } else {
            std::ptr::null_mut()
        };

        let read_ptr = if kind == SelectType::Read { &mut read_set as *mut _ } else { std::ptr::null_mut() };
        let write_ptr = if kind == SelectType::Write { &mut write_set as *mut _ } else { std::ptr::null_mut() };

        let ret = libc::select(fd + 1, read_ptr, write_ptr, std::ptr::null_mut(), tv_ptr);
        if ret < 0 {
            let errno = last_errno();
            let code = if errno == libc::EINTR { ResultCode::Retry } else { ResultCode::Failed };
            SocketResult::failed(code, errno)
        } else if ret == 0 {
            SocketResult::failed(ResultCode::Timeout, 0)
        } else {
            SocketResult::default()
        }
    }
}

/// Resolve, create, and connect a non-blocking TCP socket to `addr`.
pub fn connect_nonblocking(addr: SocketAddr, timeout_ms: i64) -> Result<RawSocket, Error> {
    let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = RawSocket::new(domain, Type::STREAM, Some(Protocol::TCP))
        .map_err(|e| Error::from_io_error(ResultCode::CreateSocketFailed, &e))?;

    socket
        .set_nonblocking(true)
        .map_err(|e| Error::from_io_error(ResultCode::SetFlagsFailed, &e))?;

    #[cfg(target_os = "macos")]
    {
        socket
            .set_nosigpipe(true)
            .map_err(|e| Error::from_io_error(ResultCode::SetNoSigPipeFailed, &e))?;
    }

    match socket.connect(&addr.into()) {
        Ok(()) => {}
        Err(e) if matches!(e.raw_os_error(), Some(code) if code == libc::EINPROGRESS || code == libc::EINTR) => {}
        Err(e) => return Err(Error::from_io_error(ResultCode::ConnectGenericError, &e)),
    }

    check_connect_result(&socket, timeout_ms)?;
    Ok(socket)
}

fn check_connect_result(socket: &RawSocket, timeout_ms: i64) -> Result<(), Error> {
    let fd = socket.as_raw_fd();
    let deadline = crate::time::TimeStamp::now().add_millis(timeout_ms);
    loop {
        let remaining = crate::time::remaining_millis(deadline);
        if remaining <= 0 {
            return Err(Error::new(ResultCode::Timeout));
        }
        let result = select(SelectType::Write, fd, remaining);
        if result.is_success() {
            break;
        }
        if result.code != ResultCode::Retry {
            return Err(result.into());
        }
    }

    match socket.take_error() {
        Ok(None) => Ok(()),
        Ok(Some(e)) => {
            log::warn!("connect SO_ERROR: {e}");
            Err(Error::from_io_error(ResultCode::ConnectGenericError, &e))
        }
        Err(e) => {
            log::warn!("getsockopt(SO_ERROR) failed: {e}");
            Err(Error::from_io_error(ResultCode::ConnectGenericError, &e))
        }
    }
}

/// A transport: either plaintext TCP or TLS-over-TCP. Both variants
/// expose the same bounded-retry send/receive/readiness discipline.
pub trait Transport: Send {
    fn send(&mut self, data: &[u8]) -> (SocketResult, usize);
    fn receive(&mut self) -> (SocketResult, ByteBuffer);
    fn can_send(&self, timeout_ms: i64) -> SocketResult;
    fn can_receive(&self, timeout_ms: i64) -> SocketResult;
}
