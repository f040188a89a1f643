mod catalog;
mod dispatch;
mod effect;
mod instruction;
mod placeholders;
mod spec;

use gbdec_expr::{BindError, ParseError};
use gbdec_rom::{Address, RomError};
use thiserror::Error;

pub use catalog::{CB_PREFIX, SM83_CB, SM83_PRIMARY};
pub use dispatch::Dispatcher;
pub use instruction::{Effect, Flow, Footprint, Instruction, JumpTarget, Target};
pub use placeholders::placeholder;
pub use spec::OpcodeSpec;

/// A malformed catalog line. These are configuration defects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecError {
    #[error("opcode line '{line}' is missing its {field}")]
    Missing { line: String, field: &'static str },
    #[error("bit pattern '{pattern}' must be eight bits or parameter letters")]
    Pattern { pattern: String },
    #[error("invalid cycle count '{text}'")]
    Cycles { text: String },
    #[error("invalid template '{text}'")]
    Template {
        text: String,
        #[source]
        source: ParseError,
    },
    #[error("unrecognized effect statement '{text}'")]
    Statement { text: String },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("{mnemonic} at {address} is {expected} bytes long, got {got}")]
    LengthMismatch {
        address: Address,
        mnemonic: String,
        expected: usize,
        got: usize,
    },
    #[error("byte {opcode:#04X} does not match the pattern of {mnemonic}")]
    PatternMismatch { opcode: u8, mnemonic: String },
    #[error("effect target '{target}' of {mnemonic} is not a register or memory location")]
    Target { mnemonic: String, target: String },
    #[error(transparent)]
    Rom(#[from] RomError),
    #[error(transparent)]
    Bind(#[from] BindError),
}
