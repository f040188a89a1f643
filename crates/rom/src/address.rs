use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const BANK_SIZE: u32 = 0x4000;
pub const SWITCHABLE_START: u16 = 0x4000;
pub const ROM_WINDOW_END: u16 = 0x8000;

/// Named regions of the CPU-visible address space that have no fixed ROM
/// location. `ROMX` is the switchable window when the bank is not known.
const REGIONS: &[(&str, u16, u16)] = &[
    ("ROMX", 0x4000, 0x7FFF),
    ("VRAM", 0x8000, 0x9FFF),
    ("SRAM", 0xA000, 0xBFFF),
    ("WRAM", 0xC000, 0xDFFF),
    ("ECHO", 0xE000, 0xFDFF),
    ("OAM", 0xFE00, 0xFE9F),
    ("UNUSED", 0xFEA0, 0xFEFF),
    ("IO", 0xFF00, 0xFF7F),
    ("HRAM", 0xFF80, 0xFFFE),
    ("IO", 0xFFFF, 0xFFFF),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("malformed address '{text}'")]
    Format { text: String },
    #[error("bank {bank:#06X} cannot map virtual address {virtual_address:#06X}")]
    InvalidBank { virtual_address: u16, bank: u16 },
}

/// A ROM location seen through three coordinate systems: the flat physical
/// offset into the image, the bank plus CPU-visible virtual address, and the
/// canonical `BANK:OFFSET` string.
///
/// `bank` is `Some` exactly when the address has a physical location: always
/// for the fixed bank, only with a known bank inside the switchable window,
/// never for RAM and I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    virtual_address: u16,
    bank: Option<u16>,
}

impl Address {
    pub fn from_physical(physical: u32) -> Self {
        let bank = u16::try_from(physical / BANK_SIZE).unwrap_or(u16::MAX);
        let within = (physical % BANK_SIZE) as u16;
        let virtual_address = if bank == 0 {
            within
        } else {
            SWITCHABLE_START + within
        };
        Self {
            virtual_address,
            bank: Some(bank),
        }
    }

    pub fn from_virtual(virtual_address: u16) -> Self {
        let bank = (virtual_address < SWITCHABLE_START).then_some(0);
        Self {
            virtual_address,
            bank,
        }
    }

    pub fn from_virtual_and_bank(virtual_address: u16, bank: u16) -> Result<Self, AddressError> {
        if virtual_address >= ROM_WINDOW_END {
            return Ok(Self::from_virtual(virtual_address));
        }
        let fixed = virtual_address < SWITCHABLE_START;
        if fixed != (bank == 0) {
            return Err(AddressError::InvalidBank {
                virtual_address,
                bank,
            });
        }
        Ok(Self {
            virtual_address,
            bank: Some(bank),
        })
    }

    /// Resolves a CPU-visible address the way code running at `current` sees
    /// it: the switchable window inherits the bank `current` lives in.
    pub fn from_virtual_and_current(virtual_address: u16, current: Address) -> Self {
        let in_window = (SWITCHABLE_START..ROM_WINDOW_END).contains(&virtual_address);
        match current.bank {
            Some(bank) if in_window && bank > 0 => Self {
                virtual_address,
                bank: Some(bank),
            },
            _ => Self::from_virtual(virtual_address),
        }
    }

    pub fn from_conventional(text: &str) -> Result<Self, AddressError> {
        let format_error = || AddressError::Format {
            text: text.to_string(),
        };
        let (prefix, offset) = text.split_once(':').ok_or_else(format_error)?;
        let virtual_address = parse_hex_u16(offset).ok_or_else(format_error)?;

        if let Some(bank) = parse_hex_u16(prefix) {
            if virtual_address >= ROM_WINDOW_END {
                return Err(format_error());
            }
            return Self::from_virtual_and_bank(virtual_address, bank).map_err(|_| format_error());
        }

        let region = region_name(virtual_address).ok_or_else(format_error)?;
        if region != prefix {
            return Err(format_error());
        }
        Ok(Self {
            virtual_address,
            bank: None,
        })
    }

    pub fn bank(&self) -> Option<u16> {
        self.bank
    }

    pub fn virtual_address(&self) -> u16 {
        self.virtual_address
    }

    pub fn physical(&self) -> Option<u32> {
        let bank = u32::from(self.bank?);
        let virtual_address = u32::from(self.virtual_address);
        if bank == 0 {
            Some(virtual_address)
        } else {
            Some(bank * BANK_SIZE + (virtual_address - u32::from(SWITCHABLE_START)))
        }
    }

    pub fn in_physical_mem(&self) -> bool {
        self.bank.is_some()
    }

    /// Moves by `delta` bytes. Physical addresses move through the flat image
    /// and may cross into the next bank; others wrap in the 16-bit space.
    pub fn offset(&self, delta: i32) -> Self {
        if let Some(physical) = self.physical()
            && let Ok(moved) = u32::try_from(i64::from(physical) + i64::from(delta))
        {
            return Self::from_physical(moved);
        }
        Self::from_virtual(self.virtual_address.wrapping_add(delta as u16))
    }

    fn sort_key(&self) -> u64 {
        match self.physical() {
            Some(physical) => u64::from(physical),
            None => (1 << 32) | u64::from(self.virtual_address),
        }
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bank {
            Some(bank) => write!(f, "{bank:04X}:{:04X}", self.virtual_address),
            None => {
                let region = region_name(self.virtual_address).unwrap_or("ROMX");
                write!(f, "{region}:{:04X}", self.virtual_address)
            }
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::from_conventional(text)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

fn region_name(virtual_address: u16) -> Option<&'static str> {
    REGIONS
        .iter()
        .find(|(_, start, end)| (*start..=*end).contains(&virtual_address))
        .map(|(name, _, _)| *name)
}

fn parse_hex_u16(text: &str) -> Option<u16> {
    if text.is_empty() || text.len() > 4 || !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(text, 16).ok()
}
