use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::status::Status;

/// A response payload: `status` and `error` are always present on the
/// wire (`error` is null on success), plus the method-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: Status,
    pub error: Option<String>,
    #[serde(flatten)]
    pub body: Body,
}

/// Method-specific result fields. Variants have disjoint key sets, so
/// the untagged representation is unambiguous; `Empty` matches last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    SiteNames {
        sitenames: Vec<String>,
    },
    Credential {
        username: String,
        password: String,
    },
    Settings {
        settings: Settings,
    },
    Fingerprint {
        #[serde(rename = "fpId")]
        fp_id: u16,
        #[serde(rename = "fpHash")]
        fp_hash: String,
    },
    Valid {
        valid: bool,
    },
    Empty {},
}

impl Response {
    /// A bare success with no result fields.
    pub fn ok() -> Self {
        Self::with_body(Body::Empty {})
    }

    /// A success carrying result fields.
    pub fn with_body(body: Body) -> Self {
        Self {
            status: Status::Success,
            error: None,
            body,
        }
    }

    /// A failure with a status code and a descriptive error string.
    pub fn failure(status: Status, error: impl Into<String>) -> Self {
        Self {
            status,
            error: Some(error.into()),
            body: Body::Empty {},
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}
