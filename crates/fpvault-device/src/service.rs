use std::io::{ErrorKind, Read, Write};

use bytes::BytesMut;

use fpvault_frame::{decode_frame, encode_frame, FrameError, DEFAULT_MAX_PAYLOAD, STOP};
use fpvault_proto::{Response, Status};

use crate::dispatch::Dispatcher;
use crate::error::{DeviceError, Result};
use crate::flash::FlashMedium;
use crate::sensor::FingerprintSensor;

const READ_CHUNK: usize = 1024;

/// Serves the dispatcher over one byte link.
///
/// Single-threaded by construction: the device handles one request at a
/// time, in arrival order, and a response is fully written before the
/// next frame is decoded. Frame-level damage (bad UTF-8, oversized
/// payloads) is answered with `MALFORMED_REQ` and the link stays up;
/// only link-level faults end the loop.
pub struct DeviceService<L, S, F> {
    link: L,
    dispatcher: Dispatcher<S, F>,
    rx: BytesMut,
    tx: BytesMut,
    max_payload: usize,
}

impl<L, S, F> DeviceService<L, S, F>
where
    L: Read + Write,
    S: FingerprintSensor,
    F: FlashMedium,
{
    pub fn new(link: L, dispatcher: Dispatcher<S, F>) -> Self {
        Self::with_max_payload(link, dispatcher, DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(link: L, dispatcher: Dispatcher<S, F>, max_payload: usize) -> Self {
        Self {
            link,
            dispatcher,
            rx: BytesMut::with_capacity(READ_CHUNK),
            tx: BytesMut::with_capacity(READ_CHUNK),
            max_payload,
        }
    }

    /// Serve requests until the host closes the link.
    pub fn run(&mut self) -> Result<()> {
        tracing::info!("device service up");
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.link.read(&mut chunk) {
                Ok(0) => {
                    tracing::info!("host closed the link");
                    return Ok(());
                }
                Ok(read) => {
                    self.rx.extend_from_slice(&chunk[..read]);
                    self.drain()?;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue
                }
                Err(err) => return Err(DeviceError::Io(err)),
            }
        }
    }

    /// Decode and answer every complete frame in the accumulator.
    fn drain(&mut self) -> Result<()> {
        loop {
            match decode_frame(&mut self.rx, self.max_payload) {
                Ok(Some(payload)) => {
                    let response = self.dispatcher.process(&payload);
                    self.send(&response)?;
                }
                Ok(None) => {
                    // A discarded malformed prefix may leave another
                    // complete frame behind it.
                    if self.rx.iter().any(|&b| b == STOP) {
                        continue;
                    }
                    return Ok(());
                }
                Err(err @ FrameError::InvalidUtf8 { .. })
                | Err(err @ FrameError::PayloadTooLarge { .. }) => {
                    tracing::warn!(error = %err, "discarded malformed frame");
                    let failure = Response::failure(Status::MalformedReq, err.to_string());
                    let bytes = serde_json::to_vec(&failure)?;
                    self.send(&bytes)?;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn send(&mut self, payload: &[u8]) -> Result<()> {
        self.tx.clear();
        encode_frame(payload, &mut self.tx)?;
        let mut offset = 0;
        while offset < self.tx.len() {
            match self.link.write(&self.tx[offset..]) {
                Ok(0) => return Err(FrameError::LinkClosed.into()),
                Ok(written) => offset += written,
                Err(err)
                    if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) =>
                {
                    continue
                }
                Err(err) => return Err(DeviceError::Io(err)),
            }
        }
        loop {
            match self.link.flush() {
                Ok(()) => return Ok(()),
                Err(err)
                    if matches!(err.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) =>
                {
                    continue
                }
                Err(err) => return Err(DeviceError::Io(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthEngine;
    use crate::flash::MemFlash;
    use crate::sensor::ScriptedSensor;
    use crate::store::CredentialStore;
    use fpvault_frame::FrameReader;
    use serde_json::json;
    use std::os::unix::net::UnixStream;
    use std::thread;

    fn spawn_service(link: UnixStream) -> thread::JoinHandle<Result<()>> {
        let auth = AuthEngine::boot(ScriptedSensor::always_matching()).unwrap();
        let store = CredentialStore::open(MemFlash::new()).unwrap();
        let mut service = DeviceService::new(link, Dispatcher::new(auth, store));
        thread::spawn(move || service.run())
    }

    fn send_json(stream: &mut UnixStream, value: serde_json::Value) {
        let mut buf = BytesMut::new();
        encode_frame(value.to_string().as_bytes(), &mut buf).unwrap();
        stream.write_all(&buf).unwrap();
    }

    #[test]
    fn serves_requests_until_host_disconnects() {
        let (host, device) = UnixStream::pair().unwrap();
        let handle = spawn_service(device);

        let mut writer = host.try_clone().unwrap();
        let mut reader = FrameReader::new(host);

        send_json(
            &mut writer,
            json!({
                "method": "addPassword",
                "sitename": "example.com",
                "username": "u",
                "password": "p",
            }),
        );
        let resp: Response = serde_json::from_slice(&reader.read_frame().unwrap()).unwrap();
        assert!(resp.is_success());

        send_json(&mut writer, json!({"method": "getAllSiteNames"}));
        let resp: Response = serde_json::from_slice(&reader.read_frame().unwrap()).unwrap();
        assert_eq!(
            resp.body,
            fpvault_proto::Body::SiteNames {
                sitenames: vec!["example.com".to_string()]
            }
        );

        drop(writer);
        drop(reader);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn pipelined_frames_answered_in_order() {
        let (host, device) = UnixStream::pair().unwrap();
        let handle = spawn_service(device);

        let mut writer = host.try_clone().unwrap();
        let mut reader = FrameReader::new(host);

        // Two frames in one write; responses come back in arrival order.
        let mut buf = BytesMut::new();
        encode_frame(
            json!({"method": "getAllSiteNames"}).to_string().as_bytes(),
            &mut buf,
        )
        .unwrap();
        encode_frame(
            json!({"method": "dropTables"}).to_string().as_bytes(),
            &mut buf,
        )
        .unwrap();
        writer.write_all(&buf).unwrap();

        let first: Response = serde_json::from_slice(&reader.read_frame().unwrap()).unwrap();
        assert!(first.is_success());
        let second: Response = serde_json::from_slice(&reader.read_frame().unwrap()).unwrap();
        assert_eq!(second.status, Status::BadMethod);

        drop(writer);
        drop(reader);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn malformed_frame_answered_and_link_survives() {
        let (host, device) = UnixStream::pair().unwrap();
        let handle = spawn_service(device);

        let mut writer = host.try_clone().unwrap();
        let mut reader = FrameReader::new(host);

        // Non-UTF-8 payload between valid markers.
        writer.write_all(&[0xFF, 0x80, 0x81, 0xFE]).unwrap();
        let resp: Response = serde_json::from_slice(&reader.read_frame().unwrap()).unwrap();
        assert_eq!(resp.status, Status::MalformedReq);

        // The link is still serving.
        send_json(&mut writer, json!({"method": "getAllSiteNames"}));
        let resp: Response = serde_json::from_slice(&reader.read_frame().unwrap()).unwrap();
        assert!(resp.is_success());

        drop(writer);
        drop(reader);
        handle.join().unwrap().unwrap();
    }

    #[test]
    fn line_noise_before_frame_is_discarded() {
        let (host, device) = UnixStream::pair().unwrap();
        let handle = spawn_service(device);

        let mut writer = host.try_clone().unwrap();
        let mut reader = FrameReader::new(host);

        let mut bytes = b"line noise\xFE".to_vec();
        let mut framed = BytesMut::new();
        encode_frame(
            json!({"method": "getAllSiteNames"}).to_string().as_bytes(),
            &mut framed,
        )
        .unwrap();
        bytes.extend_from_slice(&framed);
        writer.write_all(&bytes).unwrap();

        let resp: Response = serde_json::from_slice(&reader.read_frame().unwrap()).unwrap();
        assert!(resp.is_success());

        drop(writer);
        drop(reader);
        handle.join().unwrap().unwrap();
    }
}
