//! Plaintext TCP transport.

use std::os::fd::AsRawFd;

use socket2::Socket as RawSocket;

use super::{select, SelectType, SocketResult, Transport, DEFAULT_READ_SIZE, MAX_RETRY_COUNT};
use crate::buffer::ByteBuffer;
use crate::error::ResultCode;

pub struct PlainTransport {
    socket: RawSocket,
}

impl PlainTransport {
    pub fn new(socket: RawSocket) -> Self {
        Self { socket }
    }
}

impl Transport for PlainTransport {
    fn send(&mut self, data: &[u8]) -> (SocketResult, usize) {
        let mut result = SocketResult::default();
        let mut sent: isize = -1;
        let mut retry_count = 0u32;
        loop {
            retry_count += 1;
            match self.socket.send(data) {
                Ok(n) => {
                    sent = n as isize;
                    result = SocketResult::default();
                    break;
                }
                Err(e) => {
                    let errno = e.raw_os_error().unwrap_or(0);
                    result = SocketResult::failed(ResultCode::Failed, errno);
                    if !(retry_count < MAX_RETRY_COUNT && errno == libc::EINTR) {
                        break;
                    }
                }
            }
        }

        if sent < 0 {
            let code = if result.errno == libc::EINTR {
                ResultCode::RetryReachMaxCount
            } else {
                ResultCode::Failed
            };
            (SocketResult::failed(code, result.errno), 0)
        } else if sent == 0 {
            (SocketResult::failed(ResultCode::Disconnected, 0), 0)
        } else {
            (SocketResult::default(), sent as usize)
        }
    }

    fn receive(&mut self) -> (SocketResult, ByteBuffer) {
        let mut buf = ByteBuffer::with_capacity(DEFAULT_READ_SIZE);
        let mut received: isize = -1;
        let mut errno = 0i32;
        let mut retry_count = 0u32;
        loop {
            retry_count += 1;
            let mut tmp = vec![std::mem::MaybeUninit::new(0u8); DEFAULT_READ_SIZE];
            match self.socket.recv(&mut tmp) {
                Ok(n) => {
                    let bytes: Vec<u8> = tmp[..n].iter().map(|b| unsafe { b.assume_init() }).collect();
                    buf = ByteBuffer::from(bytes);
                    received = n as isize;
                    errno = 0;
                    break;
                }
                Err(e) => {
                    errno = e.raw_os_error().unwrap_or(0);
                    if !(retry_count < MAX_RETRY_COUNT && errno == libc::EINTR) {
                        break;
                    }
                }
            }
        }

        if received < 0 {
            let code = if errno == libc::EINTR {
                ResultCode::RetryReachMaxCount
            } else if errno == libc::EAGAIN || errno == libc::EWOULDBLOCK {
                ResultCode::Retry
            } else {
                ResultCode::Failed
            };
            (SocketResult::failed(code, errno), ByteBuffer::new())
        } else if buf.empty() {
            (SocketResult::failed(ResultCode::Disconnected, 0), buf)
        } else {
            (SocketResult::default(), buf)
        }
    }

    fn can_send(&self, timeout_ms: i64) -> SocketResult {
        select(SelectType::Write, self.socket.as_raw_fd(), timeout_ms)
    }

    fn can_receive(&self, timeout_ms: i64) -> SocketResult {
        select(SelectType::Read, self.socket.as_raw_fd(), timeout_ms)
    }
}
