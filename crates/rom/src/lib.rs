mod address;
mod rom;

pub use address::{Address, AddressError, BANK_SIZE, ROM_WINDOW_END, SWITCHABLE_START};
pub use rom::{ByteSource, Rom, RomError};
