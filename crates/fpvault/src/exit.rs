use std::fmt;
use std::io;

use fpvault_frame::FrameError;
use fpvault_host::HostError;
use fpvault_proto::Status;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::PayloadTooLarge { .. } | FrameError::InvalidUtf8 { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::LinkClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn host_error(context: &str, err: HostError) -> CliError {
    match err {
        HostError::Io(source) => io_error(context, source),
        HostError::Frame(source) => frame_error(context, source),
        HostError::DeviceUnreachable { .. } => CliError::new(TIMEOUT, format!("{context}: {err}")),
        HostError::DeviceLocked | HostError::BiometricRejected => {
            CliError::new(PERMISSION_DENIED, format!("{context}: {err}"))
        }
        HostError::Json(source) => CliError::new(DATA_INVALID, format!("{context}: {source}")),
        HostError::Request { status, .. } => {
            let code = match status {
                Status::MissingParam | Status::MalformedReq | Status::BadMethod => DATA_INVALID,
                _ => FAILURE,
            };
            CliError::new(code, format!("{context}: {err}"))
        }
        HostError::UnexpectedBody { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
