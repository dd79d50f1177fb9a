use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::BytesMut;

use fpvault_frame::{decode_frame, encode_frame, FrameError, DEFAULT_MAX_PAYLOAD, STOP};
use fpvault_proto::{Body, Request, Response, Settings, Status};

use crate::error::{HostError, Result};
use crate::token::auth_token_hex;

const READ_CHUNK: usize = 1024;

/// Resend policy for one request/response exchange.
///
/// The link carries no acknowledgements of its own, so the client
/// treats a read timeout as a lost frame and resends the whole request.
/// Device handlers are idempotent per request id-free design: a
/// duplicate `addPassword` fails loudly rather than double-writing.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total send attempts before giving up.
    pub attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
    /// The read timeout the link should be configured with; the client
    /// counts a timed-out read as a lost exchange.
    pub read_timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff: Duration::from_millis(200),
            read_timeout: Duration::from_secs(2),
        }
    }
}

/// Typed client over one byte link to the device.
///
/// The caller configures the link's read timeout (serial port or socket)
/// to match [`RetryConfig::read_timeout`] before handing it over; the
/// client itself only sees `Read + Write`.
pub struct HostClient<T> {
    link: T,
    retry: RetryConfig,
    rx: BytesMut,
    tx: BytesMut,
    max_payload: usize,
}

impl<T: Read + Write> HostClient<T> {
    pub fn new(link: T) -> Self {
        Self::with_retry(link, RetryConfig::default())
    }

    pub fn with_retry(link: T, retry: RetryConfig) -> Self {
        Self {
            link,
            retry,
            rx: BytesMut::with_capacity(READ_CHUNK),
            tx: BytesMut::with_capacity(READ_CHUNK),
            max_payload: DEFAULT_MAX_PAYLOAD,
        }
    }

    pub fn retry(&self) -> &RetryConfig {
        &self.retry
    }

    /// Send one request and wait for its response, resending on timeout
    /// up to the attempt budget.
    pub fn communicate(&mut self, request: &Request) -> Result<Response> {
        let payload = serde_json::to_vec(request)?;
        // Anything left over belongs to an abandoned exchange.
        self.rx.clear();

        for attempt in 1..=self.retry.attempts {
            if attempt > 1 {
                std::thread::sleep(self.retry.backoff);
            }
            match self.exchange(&payload) {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() => {
                    tracing::warn!(
                        attempt,
                        max = self.retry.attempts,
                        method = request.method(),
                        "no response, resending"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Err(HostError::DeviceUnreachable {
            attempts: self.retry.attempts,
        })
    }

    fn exchange(&mut self, payload: &[u8]) -> Result<Response> {
        self.send(payload)?;
        let frame = self.read_frame()?;
        Ok(serde_json::from_slice(&frame)?)
    }

    fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.tx.clear();
        encode_frame(payload, &mut self.tx)?;
        let mut offset = 0;
        while offset < self.tx.len() {
            match self.link.write(&self.tx[offset..]) {
                Ok(0) => return Err(FrameError::LinkClosed.into()),
                Ok(written) => offset += written,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(HostError::Io(err)),
            }
        }
        loop {
            match self.link.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(HostError::Io(err)),
            }
        }
    }

    fn read_frame(&mut self) -> Result<bytes::Bytes> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match decode_frame(&mut self.rx, self.max_payload)? {
                Some(frame) => return Ok(frame),
                // A discarded prefix may leave a complete frame behind.
                None if self.rx.iter().any(|&b| b == STOP) => continue,
                None => {}
            }
            match self.link.read(&mut chunk) {
                Ok(0) => return Err(FrameError::LinkClosed.into()),
                Ok(read) => self.rx.extend_from_slice(&chunk[..read]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(HostError::Io(err)),
            }
        }
    }

    /// Run `request` and demand a success status, mapping refusals onto
    /// typed errors.
    fn request_ok(&mut self, request: &Request) -> Result<Response> {
        let response = self.communicate(request)?;
        if response.is_success() {
            return Ok(response);
        }
        let message = response.error.unwrap_or_default();
        Err(match response.status {
            Status::NotVerified => HostError::DeviceLocked,
            Status::FailedBiometrics => HostError::BiometricRejected,
            status => HostError::Request { status, message },
        })
    }

    pub fn get_all_site_names(&mut self) -> Result<Vec<String>> {
        let response = self.request_ok(&Request::GetAllSiteNames)?;
        match response.body {
            Body::SiteNames { sitenames } => Ok(sitenames),
            _ => Err(HostError::UnexpectedBody {
                method: "getAllSiteNames",
            }),
        }
    }

    /// Fetch the stored (ciphertext) credential pair for a site.
    pub fn get_password(&mut self, sitename: &str) -> Result<(String, String)> {
        let response = self.request_ok(&Request::GetPassword {
            sitename: sitename.to_string(),
        })?;
        match response.body {
            Body::Credential { username, password } => Ok((username, password)),
            _ => Err(HostError::UnexpectedBody {
                method: "getPassword",
            }),
        }
    }

    pub fn add_password(&mut self, sitename: &str, username: &str, password: &str) -> Result<()> {
        self.request_ok(&Request::AddPassword {
            sitename: sitename.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        })?;
        Ok(())
    }

    pub fn change_username(&mut self, sitename: &str, newusername: &str) -> Result<()> {
        self.request_ok(&Request::ChangeUsername {
            sitename: sitename.to_string(),
            newusername: newusername.to_string(),
        })?;
        Ok(())
    }

    pub fn change_password(&mut self, sitename: &str, newpassword: &str) -> Result<()> {
        self.request_ok(&Request::ChangePassword {
            sitename: sitename.to_string(),
            newpassword: newpassword.to_string(),
        })?;
        Ok(())
    }

    pub fn remove_password(&mut self, sitename: &str) -> Result<()> {
        self.request_ok(&Request::RemovePassword {
            sitename: sitename.to_string(),
        })?;
        Ok(())
    }

    pub fn get_settings(&mut self) -> Result<Settings> {
        let response = self.request_ok(&Request::GetSettings)?;
        match response.body {
            Body::Settings { settings } => Ok(settings),
            _ => Err(HostError::UnexpectedBody {
                method: "getSettings",
            }),
        }
    }

    pub fn set_settings(&mut self, settings: Settings) -> Result<()> {
        self.request_ok(&Request::SetSettings { settings })?;
        Ok(())
    }

    /// Establish (or check) the master-password session. The token is
    /// derived locally; the password itself never crosses the link.
    pub fn verify_master_hash(&mut self, master_password: &str) -> Result<bool> {
        let response = self.request_ok(&Request::VerifyMasterHash {
            hash: auth_token_hex(master_password),
        })?;
        match response.body {
            Body::Valid { valid } => Ok(valid),
            _ => Err(HostError::UnexpectedBody {
                method: "verifyMasterHash",
            }),
        }
    }

    /// Enroll a fingerprint; returns the assigned slot id and template
    /// digest.
    pub fn enroll_fingerprint(&mut self, fp_name: &str) -> Result<(u16, String)> {
        let response = self.request_ok(&Request::EnrollFingerprint {
            fp_name: fp_name.to_string(),
        })?;
        match response.body {
            Body::Fingerprint { fp_id, fp_hash } => Ok((fp_id, fp_hash)),
            _ => Err(HostError::UnexpectedBody {
                method: "enrollFingerprint",
            }),
        }
    }

    pub fn delete_fingerprint(&mut self, fp_id: u16) -> Result<()> {
        self.request_ok(&Request::DeleteFingerprint { fp_id })?;
        Ok(())
    }

    /// One capture/match cycle on the device; returns the matched slot
    /// id and template digest.
    pub fn verify_fingerprint(&mut self) -> Result<(u16, String)> {
        let response = self.request_ok(&Request::VerifyFingerprint)?;
        match response.body {
            Body::Fingerprint { fp_id, fp_hash } => Ok((fp_id, fp_hash)),
            _ => Err(HostError::UnexpectedBody {
                method: "verifyFingerprint",
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io;

    /// A link whose reads are scripted: each entry is one `read` result,
    /// and an exhausted script times out forever.
    struct ScriptedLink {
        reads: VecDeque<io::Result<Vec<u8>>>,
        written: Vec<u8>,
    }

    impl ScriptedLink {
        fn new(reads: impl IntoIterator<Item = io::Result<Vec<u8>>>) -> Self {
            Self {
                reads: reads.into_iter().collect(),
                written: Vec::new(),
            }
        }
    }

    impl Read for ScriptedLink {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }
                Some(Err(err)) => Err(err),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "scripted timeout")),
            }
        }
    }

    impl Write for ScriptedLink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn timeout() -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::TimedOut, "scripted timeout"))
    }

    fn framed(json: &str) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(json.as_bytes(), &mut buf).unwrap();
        buf.to_vec()
    }

    fn fast_retry(attempts: u32) -> RetryConfig {
        RetryConfig {
            attempts,
            backoff: Duration::from_millis(1),
            read_timeout: Duration::from_millis(10),
        }
    }

    #[test]
    fn response_on_first_attempt() {
        let link = ScriptedLink::new([Ok(framed(r#"{"status":0,"error":null}"#))]);
        let mut client = HostClient::with_retry(link, fast_retry(3));
        let resp = client.communicate(&Request::GetAllSiteNames).unwrap();
        assert!(resp.is_success());
    }

    #[test]
    fn resends_after_timeouts() {
        let link = ScriptedLink::new([
            timeout(),
            timeout(),
            Ok(framed(
                r#"{"status":0,"error":null,"sitenames":["a.com"]}"#,
            )),
        ]);
        let mut client = HostClient::with_retry(link, fast_retry(5));
        let sites = client.get_all_site_names().unwrap();
        assert_eq!(sites, vec!["a.com".to_string()]);
    }

    #[test]
    fn exhausted_attempts_is_device_unreachable() {
        let link = ScriptedLink::new([]);
        let mut client = HostClient::with_retry(link, fast_retry(3));
        let err = client.communicate(&Request::GetAllSiteNames).unwrap_err();
        assert!(matches!(
            err,
            HostError::DeviceUnreachable { attempts: 3 }
        ));
    }

    #[test]
    fn each_attempt_resends_the_whole_request() {
        let link = ScriptedLink::new([]);
        let mut client = HostClient::with_retry(link, fast_retry(3));
        let _ = client.communicate(&Request::GetAllSiteNames);

        let sent = &client.link.written;
        let frames = sent.iter().filter(|&&b| b == fpvault_frame::START).count();
        assert_eq!(frames, 3);
    }

    #[test]
    fn response_arriving_byte_by_byte() {
        let frame = framed(r#"{"status":0,"error":null,"valid":true}"#);
        let link = ScriptedLink::new(frame.iter().map(|&b| Ok(vec![b])));
        let mut client = HostClient::with_retry(link, fast_retry(1));
        assert!(client.verify_master_hash("hunter2").unwrap());
    }

    #[test]
    fn closed_link_is_not_retried() {
        let link = ScriptedLink::new([Ok(Vec::new())]); // EOF
        let mut client = HostClient::with_retry(link, fast_retry(5));
        let err = client.communicate(&Request::GetAllSiteNames).unwrap_err();
        assert!(matches!(err, HostError::Frame(FrameError::LinkClosed)));
        // Only one frame was ever sent.
        let frames = client
            .link
            .written
            .iter()
            .filter(|&&b| b == fpvault_frame::START)
            .count();
        assert_eq!(frames, 1);
    }

    #[test]
    fn not_verified_maps_to_device_locked() {
        let link = ScriptedLink::new([Ok(framed(r#"{"status":7,"error":"locked"}"#))]);
        let mut client = HostClient::with_retry(link, fast_retry(1));
        let err = client.get_settings().unwrap_err();
        assert!(matches!(err, HostError::DeviceLocked));
    }

    #[test]
    fn failed_biometrics_maps_to_biometric_rejected() {
        let link = ScriptedLink::new([Ok(framed(r#"{"status":6,"error":"no match"}"#))]);
        let mut client = HostClient::with_retry(link, fast_retry(1));
        let err = client.remove_password("a.com").unwrap_err();
        assert!(matches!(err, HostError::BiometricRejected));
    }

    #[test]
    fn other_refusals_carry_status_and_message() {
        let link =
            ScriptedLink::new([Ok(framed(r#"{"status":11,"error":"sitename not known"}"#))]);
        let mut client = HostClient::with_retry(link, fast_retry(1));
        let err = client.get_password("nowhere.test").unwrap_err();
        match err {
            HostError::Request { status, message } => {
                assert_eq!(status, Status::ApiOtherError);
                assert_eq!(message, "sitename not known");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn success_with_wrong_body_is_unexpected_body() {
        let link = ScriptedLink::new([Ok(framed(r#"{"status":0,"error":null}"#))]);
        let mut client = HostClient::with_retry(link, fast_retry(1));
        let err = client.get_password("a.com").unwrap_err();
        assert!(matches!(
            err,
            HostError::UnexpectedBody {
                method: "getPassword"
            }
        ));
    }
}
