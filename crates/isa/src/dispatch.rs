use gbdec_rom::{Address, ByteSource};
use tracing::{debug, warn};

use crate::catalog::{CB_PREFIX, SM83_CB, SM83_PRIMARY};
use crate::instruction::Instruction;
use crate::spec::OpcodeSpec;
use crate::{DecodeError, SpecError};

type Table = [Option<usize>; 256];

/// Byte-indexed decoder table compiled from catalog lines.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    specs: Vec<OpcodeSpec>,
    primary: Table,
    prefixed: Table,
    has_prefixed: bool,
}

impl Dispatcher {
    /// Compiles `primary` lines for the opcode byte and `prefixed` lines for
    /// the byte following a `CB` prefix. Blank lines are skipped.
    pub fn new(primary: &str, prefixed: &str) -> Result<Self, SpecError> {
        let mut dispatcher = Self {
            specs: Vec::new(),
            primary: [None; 256],
            prefixed: [None; 256],
            has_prefixed: false,
        };
        for line in primary.lines().filter(|line| !line.trim().is_empty()) {
            dispatcher.add(OpcodeSpec::parse(line)?);
        }
        for line in prefixed.lines().filter(|line| !line.trim().is_empty()) {
            dispatcher.add(OpcodeSpec::parse_prefixed(line, Some(CB_PREFIX))?);
            dispatcher.has_prefixed = true;
        }
        Ok(dispatcher)
    }

    /// The built-in Game Boy CPU catalog.
    pub fn sm83() -> Result<Self, SpecError> {
        Self::new(SM83_PRIMARY, SM83_CB)
    }

    fn add(&mut self, spec: OpcodeSpec) {
        let index = self.specs.len();
        let table = if spec.prefix().is_some() {
            &mut self.prefixed
        } else {
            &mut self.primary
        };
        for (byte, slot) in table.iter_mut().enumerate() {
            if !spec.matches(byte as u8) {
                continue;
            }
            if let Some(previous) = slot.replace(index) {
                debug!(
                    byte = format_args!("{byte:#04X}"),
                    previous = self.specs[previous].mnemonic(),
                    mnemonic = spec.mnemonic(),
                    "opcode slot overridden"
                );
            }
        }
        self.specs.push(spec);
    }

    pub fn spec_for(&self, opcode: u8) -> Option<&OpcodeSpec> {
        self.primary[usize::from(opcode)].map(|index| &self.specs[index])
    }

    pub fn prefixed_spec_for(&self, opcode: u8) -> Option<&OpcodeSpec> {
        self.prefixed[usize::from(opcode)].map(|index| &self.specs[index])
    }

    /// Decodes the instruction at `addr`. A byte no line matches decodes as a
    /// one-byte invalid instruction and is logged, never an error.
    pub fn decode(&self, rom: &dyn ByteSource, addr: Address) -> Result<Instruction, DecodeError> {
        let opcode = rom.byte(addr)?;
        let spec = if opcode == CB_PREFIX && self.has_prefixed {
            self.prefixed_spec_for(rom.byte(addr.offset(1))?)
        } else {
            self.spec_for(opcode)
        };
        let Some(spec) = spec else {
            warn!(address = %addr, opcode = format_args!("{opcode:#04X}"), "bad opcode");
            return Ok(Instruction::invalid(addr, opcode));
        };
        let raw = rom.read(addr, spec.length())?;
        spec.decode(&raw, addr)
    }
}
