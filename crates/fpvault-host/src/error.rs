use fpvault_proto::Status;

/// Errors surfaced by the host client.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error(transparent)]
    Frame(#[from] fpvault_frame::FrameError),

    #[error("payload decoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Every send attempt timed out without a response frame.
    #[error("device unreachable after {attempts} attempts")]
    DeviceUnreachable { attempts: u32 },

    /// The device reported `NOT_VERIFIED`: no master-password session.
    #[error("device is locked; verify the master password first")]
    DeviceLocked,

    /// The device reported `FAILED_BIOMETRICS` for this request.
    #[error("fingerprint not recognized by the device")]
    BiometricRejected,

    /// Any other non-success status from the device.
    #[error("device refused request ({status}): {message}")]
    Request { status: Status, message: String },

    /// The response status was success but the body did not carry the
    /// fields this method returns.
    #[error("unexpected response body for {method}")]
    UnexpectedBody { method: &'static str },
}

impl HostError {
    /// Whether resending the request may help. Only timeouts qualify;
    /// a closed link or a device refusal will not change on resend.
    pub fn is_retryable(&self) -> bool {
        let kind = match self {
            HostError::Io(err) => err.kind(),
            HostError::Frame(fpvault_frame::FrameError::Io(err)) => err.kind(),
            _ => return false,
        };
        matches!(
            kind,
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
        )
    }
}

pub type Result<T> = std::result::Result<T, HostError>;
