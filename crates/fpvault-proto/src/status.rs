use serde::{Deserialize, Serialize};

/// Wire status codes. Serialized as bare integers in the `status` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Status {
    /// Request handled successfully.
    Success,
    /// A required parameter is absent from the request.
    MissingParam,
    /// The payload is not a well-formed request object.
    MalformedReq,
    /// The `method` field names no known method.
    BadMethod,
    /// Biometric capture ran and did not match.
    FailedBiometrics,
    /// No master-password session is established (or the device is
    /// locked out until power cycle).
    NotVerified,
    /// Unexpected internal fault; `error` carries a diagnostic string.
    UnknownErr,
    /// The request was valid but the operation failed at the data layer
    /// (unknown site, duplicate site, and similar).
    ApiOtherError,
    /// Reserved for methods that are defined but not yet available.
    NotYetImplemented,
}

impl From<Status> for u8 {
    fn from(status: Status) -> u8 {
        match status {
            Status::Success => 0,
            Status::MissingParam => 3,
            Status::MalformedReq => 4,
            Status::BadMethod => 5,
            Status::FailedBiometrics => 6,
            Status::NotVerified => 7,
            Status::UnknownErr => 10,
            Status::ApiOtherError => 11,
            Status::NotYetImplemented => 12,
        }
    }
}

impl TryFrom<u8> for Status {
    type Error = UnknownStatus;

    fn try_from(code: u8) -> Result<Self, UnknownStatus> {
        match code {
            0 => Ok(Status::Success),
            3 => Ok(Status::MissingParam),
            4 => Ok(Status::MalformedReq),
            5 => Ok(Status::BadMethod),
            6 => Ok(Status::FailedBiometrics),
            7 => Ok(Status::NotVerified),
            10 => Ok(Status::UnknownErr),
            11 => Ok(Status::ApiOtherError),
            12 => Ok(Status::NotYetImplemented),
            other => Err(UnknownStatus(other)),
        }
    }
}

/// A status integer outside the protocol's closed code set.
#[derive(Debug, thiserror::Error)]
#[error("unknown status code {0}")]
pub struct UnknownStatus(pub u8);

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Status::Success => "SUCCESS",
            Status::MissingParam => "MISSING_PARAM",
            Status::MalformedReq => "MALFORMED_REQ",
            Status::BadMethod => "BAD_METHOD",
            Status::FailedBiometrics => "FAILED_BIOMETRICS",
            Status::NotVerified => "NOT_VERIFIED",
            Status::UnknownErr => "UNKNOWN_ERR",
            Status::ApiOtherError => "API_OTHER_ERROR",
            Status::NotYetImplemented => "NOT_YET_IMPLEMENTED",
        };
        write!(f, "{name}")
    }
}
