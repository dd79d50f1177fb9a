/// The 4-byte sensor command-password token, derived host-side as the
/// last 4 bytes of `SHA-256(masterPassword)`.
pub type AuthToken = [u8; 4];

/// Wire length of the hex-encoded token.
pub const TOKEN_HEX_LEN: usize = 8;

/// Decode the wire `hash` field into the raw 4-byte token.
///
/// The token is raw digest bytes, which a JSON string cannot carry
/// directly, so the wire form is 8 hex characters. Returns `None` for
/// anything that is not exactly that.
pub fn parse_auth_token(hash: &str) -> Option<AuthToken> {
    if hash.len() != TOKEN_HEX_LEN {
        return None;
    }
    let bytes = hex::decode(hash).ok()?;
    bytes.try_into().ok()
}

/// Encode a raw token for the wire `hash` field.
pub fn encode_auth_token(token: AuthToken) -> String {
    hex::encode(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let token = [0xde, 0xad, 0xbe, 0xef];
        let hash = encode_auth_token(token);
        assert_eq!(hash, "deadbeef");
        assert_eq!(parse_auth_token(&hash), Some(token));
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(parse_auth_token(""), None);
        assert_eq!(parse_auth_token("abcd"), None);
        assert_eq!(parse_auth_token("0011223344"), None);
    }

    #[test]
    fn rejects_non_hex() {
        assert_eq!(parse_auth_token("zzzzzzzz"), None);
        assert_eq!(parse_auth_token("0011g233"), None);
    }

    #[test]
    fn accepts_uppercase_hex() {
        assert_eq!(parse_auth_token("DEADBEEF"), Some([0xde, 0xad, 0xbe, 0xef]));
    }
}
