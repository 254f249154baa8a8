use std::io::{self, Read, Write};

use sa_tensor::{EngineConfig, DEFAULT_CAPACITY, DEFAULT_TILE_SIZE};

use crate::error::{Result, RuntimeError};

/// The four-byte magic number identifying a kernel image: ASCII "SAKI".
pub const IMAGE_MAGIC: [u8; 4] = *b"SAKI";

/// The only kernel image format version understood by this runtime.
pub const IMAGE_VERSION: u32 = 1;

/// Size in bytes of the fixed image header.
pub const HEADER_LEN: usize = 16;

/// Parsed kernel image header.
///
/// An image is the little-endian header followed by an opaque payload.
/// The header carries the engine parameters the device is programmed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelImage {
    /// Image format version.
    pub version: u32,
    /// Tile edge length of the programmed engine.
    pub tile_size: u32,
    /// Working buffer capacity, in elements.
    pub capacity: u32,
}

impl KernelImage {
    pub fn new(tile_size: u32, capacity: u32) -> Self {
        Self {
            version: IMAGE_VERSION,
            tile_size,
            capacity,
        }
    }

    /// Parse an image header from the beginning of a reader.
    ///
    /// Validates the magic and version, then reads tile size and capacity
    /// (both u32 LE). Zero values are rejected. A truncated header is
    /// reported as [`RuntimeError::InvalidImage`].
    pub fn parse(reader: &mut impl Read) -> Result<KernelImage> {
        let mut magic = [0u8; 4];
        read_exact(reader, &mut magic)?;
        if magic != IMAGE_MAGIC {
            return Err(RuntimeError::InvalidImage(format!(
                "bad magic {magic:02x?}"
            )));
        }

        let version = read_u32(reader)?;
        if version != IMAGE_VERSION {
            return Err(RuntimeError::UnsupportedImageVersion(version));
        }

        let tile_size = read_u32(reader)?;
        let capacity = read_u32(reader)?;
        if tile_size == 0 {
            return Err(RuntimeError::InvalidImage("zero tile size".to_string()));
        }
        if capacity == 0 {
            return Err(RuntimeError::InvalidImage("zero capacity".to_string()));
        }

        Ok(KernelImage {
            version,
            tile_size,
            capacity,
        })
    }

    pub fn from_bytes(mut bytes: &[u8]) -> Result<KernelImage> {
        Self::parse(&mut bytes)
    }

    /// Write the header. No payload is emitted.
    pub fn write_to(&self, writer: &mut impl Write) -> io::Result<()> {
        writer.write_all(&IMAGE_MAGIC)?;
        writer.write_all(&self.version.to_le_bytes())?;
        writer.write_all(&self.tile_size.to_le_bytes())?;
        writer.write_all(&self.capacity.to_le_bytes())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN);
        out.extend_from_slice(&IMAGE_MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.tile_size.to_le_bytes());
        out.extend_from_slice(&self.capacity.to_le_bytes());
        out
    }

    /// Capacity of one working buffer, in elements.
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Engine configuration the device runs with once programmed.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let config = EngineConfig::new(self.tile_size as usize, self.capacity as usize);
        config.validate()?;
        Ok(config)
    }
}

impl Default for KernelImage {
    fn default() -> Self {
        // DEFAULT_CAPACITY (1536 * 1536) fits in u32.
        Self::new(DEFAULT_TILE_SIZE as u32, DEFAULT_CAPACITY as u32)
    }
}

fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => RuntimeError::InvalidImage("truncated header".to_string()),
        _ => RuntimeError::Io(e),
    })
}

fn read_u32(reader: &mut impl Read) -> Result<u32> {
    let mut buf4 = [0u8; 4];
    read_exact(reader, &mut buf4)?;
    Ok(u32::from_le_bytes(buf4))
}
