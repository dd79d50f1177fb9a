use sha2::{Digest, Sha256};

use fpvault_proto::{encode_auth_token, AuthToken};

/// Derive the device auth token from the master password: the last 4
/// bytes of `SHA-256(masterPassword)`.
///
/// The full password never leaves the host; the device only ever sees
/// this truncated digest, which doubles as the sensor command-password.
pub fn derive_auth_token(master_password: &str) -> AuthToken {
    let digest = Sha256::digest(master_password.as_bytes());
    let mut token = AuthToken::default();
    token.copy_from_slice(&digest[digest.len() - 4..]);
    token
}

/// The wire (hex) form of the derived token.
pub fn auth_token_hex(master_password: &str) -> String {
    encode_auth_token(derive_auth_token(master_password))
}
