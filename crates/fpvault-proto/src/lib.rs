//! Request/response types and status codes for the fpvault wire protocol.
//!
//! Every payload on the wire is a JSON object. Requests carry a `method`
//! tag and method-specific fields; responses always carry `status`
//! (integer) and `error` (string or null) plus the method's result
//! fields. The method set is closed — unknown methods are rejected at
//! the dispatch boundary, never looked up dynamically.

pub mod request;
pub mod response;
pub mod settings;
pub mod status;
pub mod token;

pub use request::Request;
pub use response::{Body, Response};
pub use settings::Settings;
pub use status::{Status, UnknownStatus};
pub use token::{encode_auth_token, parse_auth_token, AuthToken, TOKEN_HEX_LEN};
