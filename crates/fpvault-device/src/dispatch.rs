use serde_json::Value;

use fpvault_proto::{parse_auth_token, Body, Request, Response, Status};

use crate::auth::AuthEngine;
use crate::error::DeviceError;
use crate::flash::FlashMedium;
use crate::sensor::FingerprintSensor;
use crate::store::{CredentialStore, StoreError};

/// Pre-encoded fallback for the impossible case where a response fails
/// to serialize. Keeps `process` infallible.
const ENCODE_FAILURE: &[u8] = br#"{"status":10,"error":"response encoding failed"}"#;

/// Routes decoded request payloads to the auth engine and the store.
///
/// Every payload in yields exactly one response payload out, whatever
/// happens in between. Validation runs in fixed order so each failure
/// reports its most specific status: unknown method before parameter
/// checks, parameter presence before typed decoding, and the privilege
/// gate only once the request is fully decoded.
pub struct Dispatcher<S, F> {
    auth: AuthEngine<S>,
    store: CredentialStore<F>,
}

impl<S: FingerprintSensor, F: FlashMedium> Dispatcher<S, F> {
    pub fn new(auth: AuthEngine<S>, store: CredentialStore<F>) -> Self {
        Self { auth, store }
    }

    /// Handle one raw request payload, producing the response payload.
    pub fn process(&mut self, raw: &[u8]) -> Vec<u8> {
        let response = self.handle(raw);
        if !response.is_success() {
            tracing::debug!(status = %response.status, error = ?response.error, "request failed");
        }
        serde_json::to_vec(&response).unwrap_or_else(|err| {
            tracing::error!(error = %err, "response serialization failed");
            ENCODE_FAILURE.to_vec()
        })
    }

    fn handle(&mut self, raw: &[u8]) -> Response {
        let value: Value = match serde_json::from_slice(raw) {
            Ok(value) => value,
            Err(err) => {
                return Response::failure(
                    Status::MalformedReq,
                    format!("request is not valid JSON: {err}"),
                );
            }
        };
        let Some(method) = value.get("method").and_then(Value::as_str) else {
            return Response::failure(Status::MalformedReq, "request has no method field");
        };
        let Some(required) = Request::required_params(method) else {
            return Response::failure(Status::BadMethod, format!("unknown method {method:?}"));
        };
        for param in required {
            if value.get(param).is_none() {
                return Response::failure(
                    Status::MissingParam,
                    format!("method {method:?} requires parameter {param:?}"),
                );
            }
        }
        let method = method.to_string();
        let request: Request = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(err) => {
                return Response::failure(
                    Status::MalformedReq,
                    format!("malformed {method:?} request: {err}"),
                );
            }
        };

        if request.is_privileged() {
            if !self.auth.session_active() {
                return Response::failure(
                    Status::NotVerified,
                    "no master-password session established",
                );
            }
            match self.auth.authenticate() {
                Ok(true) => {}
                Ok(false) => {
                    return Response::failure(Status::FailedBiometrics, "fingerprint not recognized");
                }
                Err(err) => return self.failure_response(err.into()),
            }
        }

        match self.route(request) {
            Ok(response) => response,
            Err(err) => self.failure_response(err),
        }
    }

    fn route(&mut self, request: Request) -> Result<Response, DeviceError> {
        let response = match request {
            Request::GetAllSiteNames => Response::with_body(Body::SiteNames {
                sitenames: self.store.all_sites(),
            }),
            Request::GetPassword { sitename } => {
                let (username, password) = self.store.get(&sitename)?;
                Response::with_body(Body::Credential {
                    username: username.to_string(),
                    password: password.to_string(),
                })
            }
            Request::AddPassword {
                sitename,
                username,
                password,
            } => {
                self.store.add(&sitename, &username, &password)?;
                Response::ok()
            }
            Request::ChangeUsername {
                sitename,
                newusername,
            } => {
                self.store.update(&sitename, Some(&newusername), None)?;
                Response::ok()
            }
            Request::ChangePassword {
                sitename,
                newpassword,
            } => {
                self.store.update(&sitename, None, Some(&newpassword))?;
                Response::ok()
            }
            Request::RemovePassword { sitename } => {
                self.store.delete(&sitename)?;
                Response::ok()
            }
            Request::GetSettings => Response::with_body(Body::Settings {
                settings: self.store.settings(),
            }),
            Request::SetSettings { settings } => {
                self.store.set_settings(settings)?;
                Response::ok()
            }
            Request::VerifyMasterHash { hash } => {
                let Some(token) = parse_auth_token(&hash) else {
                    return Ok(Response::failure(
                        Status::MalformedReq,
                        format!("hash must be {} hex characters", fpvault_proto::TOKEN_HEX_LEN),
                    ));
                };
                let valid = self.auth.verify_master_hash(token)?;
                Response::with_body(Body::Valid { valid })
            }
            Request::EnrollFingerprint { fp_name } => {
                let (fp_id, fp_hash) = self.auth.enroll()?;
                self.store.register_fingerprint(fp_id, &fp_name)?;
                Response::with_body(Body::Fingerprint { fp_id, fp_hash })
            }
            Request::DeleteFingerprint { fp_id } => {
                self.auth.delete(fp_id)?;
                self.store.unregister_fingerprint(fp_id)?;
                Response::ok()
            }
            Request::VerifyFingerprint => match self.auth.verify_fingerprint()? {
                Some((fp_id, fp_hash)) => Response::with_body(Body::Fingerprint { fp_id, fp_hash }),
                None => Response::failure(Status::ApiOtherError, "no fingerprint match"),
            },
        };
        Ok(response)
    }

    /// Single emission point mapping handler errors onto wire statuses.
    /// Domain refusals from the store become `API_OTHER_ERROR`; anything
    /// that smells like a fault (flash I/O, sensor link, encoding) is
    /// `UNKNOWN_ERR` with the diagnostic carried in `error`.
    fn failure_response(&self, err: DeviceError) -> Response {
        match err {
            DeviceError::Store(err)
                if !matches!(err, StoreError::Flash(_) | StoreError::Encode(_)) =>
            {
                Response::failure(Status::ApiOtherError, err.to_string())
            }
            err => {
                tracing::error!(error = %err, "internal fault while handling request");
                Response::failure(Status::UnknownErr, err.to_string())
            }
        }
    }

    pub fn auth(&self) -> &AuthEngine<S> {
        &self.auth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flash::MemFlash;
    use crate::sensor::ScriptedSensor;
    use serde_json::json;

    type TestDispatcher = Dispatcher<ScriptedSensor, MemFlash>;

    fn dispatcher_with(sensor: ScriptedSensor) -> TestDispatcher {
        let auth = AuthEngine::boot(sensor).unwrap();
        let store = CredentialStore::open(MemFlash::new()).unwrap();
        Dispatcher::new(auth, store)
    }

    /// Factory-fresh sensor whose every capture matches, so privileged
    /// methods pass the gate.
    fn open_dispatcher() -> TestDispatcher {
        dispatcher_with(ScriptedSensor::always_matching())
    }

    fn send(dispatcher: &mut TestDispatcher, request: Value) -> Response {
        let raw = dispatcher.process(request.to_string().as_bytes());
        serde_json::from_slice(&raw).unwrap()
    }

    #[test]
    fn invalid_json_is_malformed() {
        let resp = send_raw(&mut open_dispatcher(), b"{not json");
        assert_eq!(resp.status, Status::MalformedReq);
    }

    fn send_raw(dispatcher: &mut TestDispatcher, raw: &[u8]) -> Response {
        serde_json::from_slice(&dispatcher.process(raw)).unwrap()
    }

    #[test]
    fn missing_method_field_is_malformed() {
        let resp = send(&mut open_dispatcher(), json!({"sitename": "a.com"}));
        assert_eq!(resp.status, Status::MalformedReq);
    }

    #[test]
    fn unknown_method_is_bad_method() {
        let resp = send(&mut open_dispatcher(), json!({"method": "dropTables"}));
        assert_eq!(resp.status, Status::BadMethod);
        assert!(resp.error.unwrap().contains("dropTables"));
    }

    #[test]
    fn absent_parameter_is_missing_param() {
        let resp = send(&mut open_dispatcher(), json!({"method": "getPassword"}));
        assert_eq!(resp.status, Status::MissingParam);
        assert!(resp.error.unwrap().contains("sitename"));
    }

    #[test]
    fn wrongly_typed_parameter_is_malformed() {
        let resp = send(
            &mut open_dispatcher(),
            json!({"method": "deleteFingerprint", "fpId": "nine"}),
        );
        assert_eq!(resp.status, Status::MalformedReq);
    }

    #[test]
    fn privileged_method_without_session_is_not_verified() {
        // A bootstrapped sensor boots without a session.
        let mut dispatcher =
            dispatcher_with(ScriptedSensor::new().with_password([1, 2, 3, 4]));
        let resp = send(&mut dispatcher, json!({"method": "getSettings"}));
        assert_eq!(resp.status, Status::NotVerified);
    }

    #[test]
    fn unprivileged_methods_skip_the_gate() {
        let mut dispatcher =
            dispatcher_with(ScriptedSensor::new().with_password([1, 2, 3, 4]));
        let resp = send(&mut dispatcher, json!({"method": "getAllSiteNames"}));
        assert_eq!(resp.status, Status::Success);
        assert_eq!(resp.body, Body::SiteNames { sitenames: vec![] });
    }

    #[test]
    fn biometric_mismatch_is_failed_biometrics() {
        // Session is open (factory boot) but no capture ever matches.
        let mut dispatcher = dispatcher_with(ScriptedSensor::new().with_template(1, b"t"));
        let resp = send(&mut dispatcher, json!({"method": "getSettings"}));
        assert_eq!(resp.status, Status::FailedBiometrics);
    }

    #[test]
    fn lockout_turns_failures_into_not_verified() {
        let mut dispatcher = dispatcher_with(ScriptedSensor::new().with_template(1, b"t"));
        for _ in 0..crate::auth::DEFAULT_MAX_ATTEMPTS {
            let resp = send(&mut dispatcher, json!({"method": "getSettings"}));
            assert_eq!(resp.status, Status::FailedBiometrics);
        }
        assert!(dispatcher.auth().is_reset());

        let resp = send(&mut dispatcher, json!({"method": "getSettings"}));
        assert_eq!(resp.status, Status::NotVerified);
    }

    #[test]
    fn credential_lifecycle_roundtrip() {
        let mut dispatcher = open_dispatcher();

        let resp = send(
            &mut dispatcher,
            json!({
                "method": "addPassword",
                "sitename": "example.com",
                "username": "dXNlcg==",
                "password": "cGFzcw==",
            }),
        );
        assert_eq!(resp.status, Status::Success);

        let resp = send(&mut dispatcher, json!({"method": "getAllSiteNames"}));
        assert_eq!(
            resp.body,
            Body::SiteNames {
                sitenames: vec!["example.com".to_string()]
            }
        );

        // Stored ciphertext comes back byte for byte.
        let resp = send(
            &mut dispatcher,
            json!({"method": "getPassword", "sitename": "example.com"}),
        );
        assert_eq!(
            resp.body,
            Body::Credential {
                username: "dXNlcg==".to_string(),
                password: "cGFzcw==".to_string(),
            }
        );

        let resp = send(
            &mut dispatcher,
            json!({
                "method": "changeUsername",
                "sitename": "example.com",
                "newusername": "bmV3",
            }),
        );
        assert_eq!(resp.status, Status::Success);
        let resp = send(
            &mut dispatcher,
            json!({"method": "getPassword", "sitename": "example.com"}),
        );
        assert_eq!(
            resp.body,
            Body::Credential {
                username: "bmV3".to_string(),
                password: "cGFzcw==".to_string(),
            }
        );

        let resp = send(
            &mut dispatcher,
            json!({"method": "removePassword", "sitename": "example.com"}),
        );
        assert_eq!(resp.status, Status::Success);
        let resp = send(&mut dispatcher, json!({"method": "getAllSiteNames"}));
        assert_eq!(resp.body, Body::SiteNames { sitenames: vec![] });
    }

    #[test]
    fn duplicate_site_is_api_other_error() {
        let mut dispatcher = open_dispatcher();
        let add = json!({
            "method": "addPassword",
            "sitename": "a.com",
            "username": "u",
            "password": "p",
        });
        assert_eq!(send(&mut dispatcher, add.clone()).status, Status::Success);

        let resp = send(&mut dispatcher, add);
        assert_eq!(resp.status, Status::ApiOtherError);
        assert!(resp.error.unwrap().contains("a.com"));
    }

    #[test]
    fn unknown_site_is_api_other_error() {
        let resp = send(
            &mut open_dispatcher(),
            json!({"method": "getPassword", "sitename": "nowhere.test"}),
        );
        assert_eq!(resp.status, Status::ApiOtherError);
    }

    #[test]
    fn verify_master_hash_rejects_bad_hex() {
        let resp = send(
            &mut open_dispatcher(),
            json!({"method": "verifyMasterHash", "hash": "xyz"}),
        );
        assert_eq!(resp.status, Status::MalformedReq);
    }

    #[test]
    fn master_hash_bootstrap_then_login() {
        let mut dispatcher = open_dispatcher();
        assert!(dispatcher.auth().is_default_pswd());

        let resp = send(
            &mut dispatcher,
            json!({"method": "verifyMasterHash", "hash": "f20015ad"}),
        );
        assert_eq!(resp.body, Body::Valid { valid: true });
        assert!(!dispatcher.auth().is_default_pswd());

        // Wrong token reports invalid without disturbing the session.
        let resp = send(
            &mut dispatcher,
            json!({"method": "verifyMasterHash", "hash": "00000001"}),
        );
        assert_eq!(resp.body, Body::Valid { valid: false });
        assert!(dispatcher.auth().session_active());
    }

    #[test]
    fn fingerprint_enroll_verify_delete() {
        let mut dispatcher = open_dispatcher();

        let resp = send(
            &mut dispatcher,
            json!({"method": "enrollFingerprint", "fpName": "left index"}),
        );
        assert_eq!(resp.status, Status::Success);
        let Body::Fingerprint { fp_id, .. } = resp.body else {
            panic!("expected fingerprint body, got {:?}", resp.body);
        };
        assert_eq!(fp_id, 2); // slot 1 holds the always-matching template

        let resp = send(&mut dispatcher, json!({"method": "getSettings"}));
        let Body::Settings { settings } = resp.body else {
            panic!("expected settings body, got {:?}", resp.body);
        };
        assert_eq!(settings.fingerprints.get(&2).unwrap(), "left index");

        let resp = send(
            &mut dispatcher,
            json!({"method": "deleteFingerprint", "fpId": 2}),
        );
        assert_eq!(resp.status, Status::Success);
        let resp = send(&mut dispatcher, json!({"method": "getSettings"}));
        let Body::Settings { settings } = resp.body else {
            panic!("expected settings body, got {:?}", resp.body);
        };
        assert!(!settings.fingerprints.contains_key(&2));
    }

    #[test]
    fn verify_fingerprint_reports_match_or_api_error() {
        let mut dispatcher = open_dispatcher();

        let resp = send(&mut dispatcher, json!({"method": "verifyFingerprint"}));
        let Body::Fingerprint { fp_id, fp_hash } = resp.body else {
            panic!("expected fingerprint body, got {:?}", resp.body);
        };
        assert_eq!(fp_id, 1);
        assert_eq!(fp_hash.len(), 64);

        let mut dispatcher = dispatcher_with(ScriptedSensor::new());
        let resp = send(&mut dispatcher, json!({"method": "verifyFingerprint"}));
        assert_eq!(resp.status, Status::ApiOtherError);
    }

    #[test]
    fn settings_survive_set_and_get() {
        let mut dispatcher = open_dispatcher();
        let resp = send(
            &mut dispatcher,
            json!({
                "method": "setSettings",
                "settings": {"fingerprints": {"3": "thumb"}, "numPswdAvail": 0},
            }),
        );
        assert_eq!(resp.status, Status::Success);

        let resp = send(&mut dispatcher, json!({"method": "getSettings"}));
        let Body::Settings { settings } = resp.body else {
            panic!("expected settings body, got {:?}", resp.body);
        };
        assert_eq!(settings.fingerprints.get(&3).unwrap(), "thumb");
        // numPswdAvail is recomputed on read, never trusted from input.
        assert_eq!(settings.num_pswd_avail, 125);
    }
}
