//! Device-resident subsystem of the fpvault password manager.
//!
//! Three tightly coupled pieces live here:
//! - the block-structured flash credential store ([`store`]),
//! - the fingerprint auth engine with its dual-secret state machine
//!   ([`auth`]) over a sensor capability ([`sensor`]),
//! - the request dispatcher ([`dispatch`]) that gates privileged
//!   methods behind the engine and routes to the store.
//!
//! [`service`] ties them to a byte link with a single-threaded
//! cooperative poll loop. Credentials are opaque ciphertext throughout:
//! the device stores and returns what the host sent, byte for byte.

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod flash;
pub mod sensor;
pub mod service;
pub mod store;

pub use auth::{AuthEngine, DEFAULT_MAX_ATTEMPTS};
pub use dispatch::Dispatcher;
pub use error::DeviceError;
pub use flash::{FileFlash, FlashError, FlashMedium, MemFlash, BLOCK_SIZE, REGION_BLOCKS, SETTINGS_BLOCKS};
pub use sensor::{FingerprintSensor, ScriptedSensor, SensorError, SensorPassword, FACTORY_PASSWORD};
pub use service::DeviceService;
pub use store::{CredentialEntry, CredentialStore, StoreError};
