//! Error taxonomy for the request engine.

use std::fmt;

/// The full set of outcomes a request can reach.
///
/// Mirrors the C++ `ResultCode` enum this engine is modeled on: most
/// variants name a specific failure point in the connect/send/receive
/// pipeline rather than grouping causes into a handful of buckets.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Success,
    UrlInvalid,
    SchemeNotSupported,
    MethodError,
    GetAddressFailed,
    ConnectAddressError,
    ConnectTypeInconsistent,
    ConnectGenericError,
    CreateSocketFailed,
    GetFlagsFailed,
    SetFlagsFailed,
    SetNoSigPipeFailed,
    Timeout,
    Retry,
    RetryReachMaxCount,
    Disconnected,
    Completed,
    Failed,
    ChunkSizeError,
    RedirectError,
    RedirectReachMaxCount,
}

impl ResultCode {
    pub fn is_success(self) -> bool {
        matches!(self, ResultCode::Success | ResultCode::Completed)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultCode::Success => "success",
            ResultCode::UrlInvalid => "url is invalid",
            ResultCode::SchemeNotSupported => "scheme not supported",
            ResultCode::MethodError => "method is invalid",
            ResultCode::GetAddressFailed => "failed to resolve address",
            ResultCode::ConnectAddressError => "failed to connect to address",
            ResultCode::ConnectTypeInconsistent => "resolved address family does not match socket",
            ResultCode::ConnectGenericError => "connect failed",
            ResultCode::CreateSocketFailed => "failed to create socket",
            ResultCode::GetFlagsFailed => "failed to read socket flags",
            ResultCode::SetFlagsFailed => "failed to set socket flags",
            ResultCode::SetNoSigPipeFailed => "failed to disable SIGPIPE on socket",
            ResultCode::Timeout => "operation timed out",
            ResultCode::Retry => "operation should be retried",
            ResultCode::RetryReachMaxCount => "retry budget exhausted",
            ResultCode::Disconnected => "peer disconnected",
            ResultCode::Completed => "request completed",
            ResultCode::Failed => "operation failed",
            ResultCode::ChunkSizeError => "malformed chunk size",
            ResultCode::RedirectError => "redirect location missing or invalid",
            ResultCode::RedirectReachMaxCount => "too many redirects",
        };
        f.write_str(name)
    }
}

/// An error carrying both the outcome and, where relevant, the
/// underlying `errno` captured at the syscall boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Error {
    pub code: ResultCode,
    pub errno: i32,
}

impl Error {
    pub fn new(code: ResultCode) -> Self {
        Self { code, errno: 0 }
    }

    pub fn with_errno(code: ResultCode, errno: i32) -> Self {
        Self { code, errno }
    }

    pub fn from_io_error(code: ResultCode, err: &std::io::Error) -> Self {
        Self {
            code,
            errno: err.raw_os_error().unwrap_or(0),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errno != 0 {
            write!(f, "{} (errno {})", self.code, self.errno)
        } else {
            write!(f, "{}", self.code)
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Alias used at the `on_error` callback boundary, where the field
/// names `retCode`/`errorCode` in the original map onto `code`/`errno`.
pub type ErrorInfo = Error;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_completed_report_success() {
        assert!(ResultCode::Success.is_success());
        assert!(ResultCode::Completed.is_success());
        assert!(!ResultCode::Failed.is_success());
    }

    #[test]
    fn display_includes_errno_when_nonzero() {
        let err = Error::with_errno(ResultCode::ConnectGenericError, 111);
        assert!(err.to_string().contains("111"));
        let err = Error::new(ResultCode::UrlInvalid);
        assert!(!err.to_string().contains("errno"));
    }
}
