use crate::flash::FlashError;
use crate::sensor::SensorError;
use crate::store::StoreError;

/// Umbrella error for the device subsystem.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sensor(#[from] SensorError),

    #[error(transparent)]
    Flash(#[from] FlashError),

    #[error(transparent)]
    Frame(#[from] fpvault_frame::FrameError),

    #[error("payload encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DeviceError>;
