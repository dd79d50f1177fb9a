use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Fixed-size addressable unit of the flash region. One credential
/// entry occupies exactly one block.
pub const BLOCK_SIZE: usize = 256;

/// Blocks reserved at offset 0 for the JSON-encoded settings.
pub const SETTINGS_BLOCKS: usize = 3;

/// Total region size in blocks (settings + entries).
pub const REGION_BLOCKS: usize = 128;

/// Errors from the flash layer.
#[derive(Debug, thiserror::Error)]
pub enum FlashError {
    /// Region writes must cover whole blocks.
    #[error("write of {len} bytes is not {block}-byte block aligned", block = BLOCK_SIZE)]
    NotAligned { len: usize },

    /// The write exceeds the region capacity.
    #[error("write of {len} bytes exceeds region capacity {capacity}")]
    TooLarge { len: usize, capacity: usize },

    /// Underlying storage I/O failed.
    #[error("flash I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FlashError>;

/// One contiguous flash region, read and written whole.
///
/// The store is the only writer and rewrites the entire region on every
/// mutation — no in-place patching — so the trait deliberately offers
/// nothing finer-grained.
pub trait FlashMedium {
    /// Region capacity in bytes. Constant for the life of the medium.
    fn capacity(&self) -> usize;

    /// Read the whole region. Shorter results mean the tail was never
    /// written and reads as zero-filled.
    fn read_region(&mut self) -> Result<Vec<u8>>;

    /// Replace the whole region. `bytes` must be block-aligned and at
    /// most `capacity()` long; the write is durable when this returns.
    fn write_region(&mut self, bytes: &[u8]) -> Result<()>;
}

/// File-backed flash region.
///
/// The file handle is opened per operation and closed on every exit
/// path; there is no long-lived handle whose mode has to be juggled
/// between reads and writes.
pub struct FileFlash {
    path: PathBuf,
    capacity: usize,
}

impl FileFlash {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_capacity(path, REGION_BLOCKS * BLOCK_SIZE)
    }

    pub fn with_capacity(path: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            path: path.into(),
            capacity,
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl FlashMedium for FileFlash {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_region(&mut self) -> Result<Vec<u8>> {
        let mut file = match OpenOptions::new().read(true).open(&self.path) {
            Ok(file) => file,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(FlashError::Io(err)),
        };
        let mut bytes = Vec::with_capacity(self.capacity);
        file.read_to_end(&mut bytes)?;
        bytes.truncate(self.capacity);
        Ok(bytes)
    }

    fn write_region(&mut self, bytes: &[u8]) -> Result<()> {
        check_region(bytes, self.capacity)?;
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }
}

/// In-memory flash region, for tests and the device simulator.
#[derive(Debug, Clone)]
pub struct MemFlash {
    bytes: Vec<u8>,
    capacity: usize,
}

impl MemFlash {
    pub fn new() -> Self {
        Self::with_capacity(REGION_BLOCKS * BLOCK_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: Vec::new(),
            capacity,
        }
    }

    /// Seed the region with raw bytes (corruption tests).
    pub fn preload(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }
}

impl Default for MemFlash {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashMedium for MemFlash {
    fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_region(&mut self) -> Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }

    fn write_region(&mut self, bytes: &[u8]) -> Result<()> {
        check_region(bytes, self.capacity)?;
        self.bytes = bytes.to_vec();
        Ok(())
    }
}

fn check_region(bytes: &[u8], capacity: usize) -> Result<()> {
    if bytes.len() % BLOCK_SIZE != 0 {
        return Err(FlashError::NotAligned { len: bytes.len() });
    }
    if bytes.len() > capacity {
        return Err(FlashError::TooLarge {
            len: bytes.len(),
            capacity,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mem_flash_roundtrip() {
        let mut flash = MemFlash::new();
        assert!(flash.read_region().unwrap().is_empty());

        let block = vec![0xAA; BLOCK_SIZE];
        flash.write_region(&block).unwrap();
        assert_eq!(flash.read_region().unwrap(), block);
    }

    #[test]
    fn unaligned_write_rejected() {
        let mut flash = MemFlash::new();
        let err = flash.write_region(&[0u8; 100]).unwrap_err();
        assert!(matches!(err, FlashError::NotAligned { len: 100 }));
    }

    #[test]
    fn oversized_write_rejected() {
        let mut flash = MemFlash::with_capacity(BLOCK_SIZE);
        let err = flash.write_region(&vec![0u8; 2 * BLOCK_SIZE]).unwrap_err();
        assert!(matches!(err, FlashError::TooLarge { .. }));
    }

    #[test]
    fn file_flash_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut flash = FileFlash::new(dir.path().join("storage.bin"));
        assert!(flash.read_region().unwrap().is_empty());
    }

    #[test]
    fn file_flash_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.bin");

        let block = vec![0x42; BLOCK_SIZE];
        FileFlash::new(&path).write_region(&block).unwrap();

        let mut reopened = FileFlash::new(&path);
        assert_eq!(reopened.read_region().unwrap(), block);
    }

    #[test]
    fn file_flash_truncates_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.bin");
        let mut flash = FileFlash::new(&path);

        flash.write_region(&vec![1u8; 4 * BLOCK_SIZE]).unwrap();
        flash.write_region(&vec![2u8; BLOCK_SIZE]).unwrap();

        assert_eq!(flash.read_region().unwrap(), vec![2u8; BLOCK_SIZE]);
    }
}
