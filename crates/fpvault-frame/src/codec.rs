use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Start-of-frame marker. 0xFF never occurs inside valid UTF-8.
pub const START: u8 = 0xFF;

/// End-of-frame marker. 0xFE never occurs inside valid UTF-8.
pub const STOP: u8 = 0xFE;

/// Default maximum payload size: 8 KiB. Requests and responses are small
/// JSON objects; anything larger indicates a desynchronized stream.
pub const DEFAULT_MAX_PAYLOAD: usize = 8 * 1024;

/// Encode a payload into the wire format.
///
/// Wire format:
/// ```text
/// ┌────────────┬──────────────────────┬────────────┐
/// │ START (1B) │ UTF-8 JSON payload   │ STOP (1B)  │
/// │ 0xFF       │                      │ 0xFE       │
/// └────────────┴──────────────────────┴────────────┘
/// ```
///
/// No interior escaping: the markers are outside the UTF-8 byte-value
/// space, so a payload containing either one is rejected instead.
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if let Some(pos) = payload.iter().position(|&b| b == START || b == STOP) {
        return Err(FrameError::MarkerInPayload {
            byte: payload[pos],
            offset: pos,
        });
    }
    dst.reserve(payload.len() + 2);
    dst.put_u8(START);
    dst.put_slice(payload);
    dst.put_u8(STOP);
    Ok(())
}

/// Decode one frame from an accumulator buffer.
///
/// Returns `Ok(None)` when the buffer holds no complete frame yet; the
/// buffer keeps any partial data, so decoding is restartable across
/// polled reads.
///
/// On a STOP marker with no preceding START, everything through the STOP
/// is discarded and `Ok(None)` is returned — the stream resynchronizes on
/// the next frame. A STOP whose delimited payload is not valid UTF-8
/// consumes only that frame and yields an error; later frames in the
/// buffer are unaffected.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Bytes>> {
    let Some(stop) = src.iter().position(|&b| b == STOP) else {
        // No STOP yet. Bound the accumulator so a stream that never
        // produces one cannot grow it without limit.
        if src.len() > max_payload + 2 {
            let size = src.len();
            src.clear();
            return Err(FrameError::PayloadTooLarge {
                size,
                max: max_payload,
            });
        }
        return Ok(None);
    };

    let Some(start) = src[..stop].iter().rposition(|&b| b == START) else {
        tracing::warn!(discarded = stop + 1, "frame without START marker, resynchronizing");
        src.advance(stop + 1);
        return Ok(None);
    };

    let payload_len = stop - start - 1;
    if payload_len > max_payload {
        src.advance(stop + 1);
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    // Split off everything through STOP, then carve the payload out of it
    // (bytes before the last START are garbage from a torn frame).
    let mut head = src.split_to(stop + 1);
    let mut payload = head.split_off(start + 1);
    payload.truncate(payload_len);

    if std::str::from_utf8(&payload).is_err() {
        return Err(FrameError::InvalidUtf8 { len: payload_len });
    }

    Ok(Some(payload.freeze()))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 8 KiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
