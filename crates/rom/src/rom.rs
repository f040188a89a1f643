use std::path::Path;

use thiserror::Error;

use crate::address::{Address, BANK_SIZE};

#[derive(Debug, Error)]
pub enum RomError {
    #[error("address {address} is outside the ROM image")]
    OutOfImage { address: Address },
    #[error("ROM image is empty")]
    Empty,
    #[error("failed to read '{path}'")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Read access to an immutable ROM image. Reads only fail for addresses that
/// have no byte in the image.
pub trait ByteSource: Send + Sync {
    fn len(&self) -> usize;

    fn byte(&self, addr: Address) -> Result<u8, RomError>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, addr: Address) -> bool {
        addr.physical()
            .is_some_and(|physical| (physical as usize) < self.len())
    }

    fn word(&self, addr: Address) -> Result<u16, RomError> {
        let lo = self.byte(addr)?;
        let hi = self.byte(addr.offset(1))?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn read(&self, addr: Address, len: usize) -> Result<Vec<u8>, RomError> {
        (0..len)
            .map(|index| self.byte(addr.offset(index as i32)))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Rom {
    data: Vec<u8>,
}

impl Rom {
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, RomError> {
        if data.is_empty() {
            return Err(RomError::Empty);
        }
        Ok(Self { data })
    }

    pub fn load(path: &Path) -> Result<Self, RomError> {
        let data = std::fs::read(path).map_err(|source| RomError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_bytes(data)
    }

    pub fn num_banks(&self) -> usize {
        self.data.len().div_ceil(BANK_SIZE as usize).max(1)
    }
}

impl ByteSource for Rom {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn byte(&self, addr: Address) -> Result<u8, RomError> {
        addr.physical()
            .and_then(|physical| self.data.get(physical as usize).copied())
            .ok_or(RomError::OutOfImage { address: addr })
    }
}
