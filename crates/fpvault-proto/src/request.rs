use serde::{Deserialize, Serialize};

use crate::settings::Settings;

/// A request from the host, tagged by its `method` field.
///
/// The method set is closed: dispatch is a match over these variants,
/// and an unrecognized method name is rejected with `BAD_METHOD` before
/// deserialization is attempted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum Request {
    /// List stored site names. Unprivileged — labels only.
    #[serde(rename = "getAllSiteNames")]
    GetAllSiteNames,

    /// Fetch the stored (ciphertext) credential pair for a site.
    #[serde(rename = "getPassword")]
    GetPassword { sitename: String },

    /// Store a new entry. Fails if the site already exists.
    #[serde(rename = "addPassword")]
    AddPassword {
        sitename: String,
        username: String,
        password: String,
    },

    /// Replace the stored username for a site.
    #[serde(rename = "changeUsername")]
    ChangeUsername { sitename: String, newusername: String },

    /// Replace the stored password for a site.
    #[serde(rename = "changePassword")]
    ChangePassword { sitename: String, newpassword: String },

    /// Remove a site entry.
    #[serde(rename = "removePassword")]
    RemovePassword { sitename: String },

    /// Read device settings (fingerprint registry, remaining capacity).
    #[serde(rename = "getSettings")]
    GetSettings,

    /// Replace device settings.
    #[serde(rename = "setSettings")]
    SetSettings { settings: Settings },

    /// Establish or check the master-password session. `hash` is the
    /// hex-encoded 4-byte token derived from SHA-256 of the master
    /// password.
    #[serde(rename = "verifyMasterHash")]
    VerifyMasterHash { hash: String },

    /// Enroll a new fingerprint under a display name.
    #[serde(rename = "enrollFingerprint")]
    EnrollFingerprint {
        #[serde(rename = "fpName")]
        fp_name: String,
    },

    /// Delete an enrolled fingerprint by slot id.
    #[serde(rename = "deleteFingerprint")]
    DeleteFingerprint {
        #[serde(rename = "fpId")]
        fp_id: u16,
    },

    /// Run one capture/match cycle and report the matched template.
    #[serde(rename = "verifyFingerprint")]
    VerifyFingerprint,
}

impl Request {
    /// All method names the protocol recognizes.
    pub const METHODS: &'static [&'static str] = &[
        "getAllSiteNames",
        "getPassword",
        "addPassword",
        "changeUsername",
        "changePassword",
        "removePassword",
        "getSettings",
        "setSettings",
        "verifyMasterHash",
        "enrollFingerprint",
        "deleteFingerprint",
        "verifyFingerprint",
    ];

    /// Required parameter names for a method, or `None` for an unknown
    /// method. Presence is checked before typed deserialization so a
    /// missing field reports `MISSING_PARAM` rather than `MALFORMED_REQ`.
    pub fn required_params(method: &str) -> Option<&'static [&'static str]> {
        match method {
            "getAllSiteNames" | "getSettings" | "verifyFingerprint" => Some(&[]),
            "getPassword" | "removePassword" => Some(&["sitename"]),
            "addPassword" => Some(&["sitename", "username", "password"]),
            "changeUsername" => Some(&["sitename", "newusername"]),
            "changePassword" => Some(&["sitename", "newpassword"]),
            "setSettings" => Some(&["settings"]),
            "verifyMasterHash" => Some(&["hash"]),
            "enrollFingerprint" => Some(&["fpName"]),
            "deleteFingerprint" => Some(&["fpId"]),
            _ => None,
        }
    }

    /// The wire name of this request's method.
    pub fn method(&self) -> &'static str {
        match self {
            Request::GetAllSiteNames => "getAllSiteNames",
            Request::GetPassword { .. } => "getPassword",
            Request::AddPassword { .. } => "addPassword",
            Request::ChangeUsername { .. } => "changeUsername",
            Request::ChangePassword { .. } => "changePassword",
            Request::RemovePassword { .. } => "removePassword",
            Request::GetSettings => "getSettings",
            Request::SetSettings { .. } => "setSettings",
            Request::VerifyMasterHash { .. } => "verifyMasterHash",
            Request::EnrollFingerprint { .. } => "enrollFingerprint",
            Request::DeleteFingerprint { .. } => "deleteFingerprint",
            Request::VerifyFingerprint => "verifyFingerprint",
        }
    }

    /// Whether the dispatcher must pass a biometric check before
    /// handling this request. Site labels, the master-hash check, and
    /// the capture cycle itself are the only unprivileged methods.
    pub fn is_privileged(&self) -> bool {
        !matches!(
            self,
            Request::GetAllSiteNames | Request::VerifyMasterHash { .. } | Request::VerifyFingerprint
        )
    }
}
