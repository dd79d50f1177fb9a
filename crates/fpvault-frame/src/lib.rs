//! Marker-delimited message framing for the fpvault serial protocol.
//!
//! Every message on the wire is a UTF-8 JSON payload bracketed by two
//! single-byte markers:
//! - `START` (0xFF) immediately before the payload
//! - `STOP` (0xFE) immediately after it
//!
//! Both marker values are excluded from the UTF-8 byte-value space, so a
//! well-formed payload can never contain either one and no escaping is
//! needed. A stream that loses sync recovers on the next STOP marker.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, START, STOP};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
