//! Host-side client for the fpvault device.
//!
//! [`HostClient`] wraps any `Read + Write` byte link (a serial port, a
//! simulator socket) with the frame codec and a bounded resend loop:
//! each request is retried with backoff until a response frame arrives
//! or the attempt budget runs out. Typed wrappers cover every wire
//! method and map refusal statuses onto [`HostError`] variants.
//!
//! The client never sends the master password itself. [`token`] derives
//! the 4-byte auth token from it locally; only the token's hex form
//! crosses the wire.

pub mod client;
pub mod error;
pub mod token;

pub use client::{HostClient, RetryConfig};
pub use error::{HostError, Result};
pub use token::{auth_token_hex, derive_auth_token};
