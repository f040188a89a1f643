use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::{Arc, PoisonError, RwLock};

use gbdec_isa::{DecodeError, Dispatcher, Instruction};
use gbdec_rom::{Address, BANK_SIZE, ByteSource, Rom};
use rustc_hash::FxHashMap;
use tracing::trace;

use crate::config::ProjectConfig;

/// What an analysis needs to know about the ROM it is working on.
pub trait ProjectContext: Send + Sync {
    fn rom(&self) -> &dyn ByteSource;

    /// Decodes the instruction at `addr`, reusing an earlier decode of the
    /// same address.
    fn decode_and_cache(&self, addr: Address) -> Result<Arc<Instruction>, DecodeError>;

    /// Entry-count cap configured for the jump table starting at `addr`.
    fn manual_jumptable_limit(&self, addr: Address) -> Option<usize>;

    /// The first known procedure entry strictly after `addr`.
    fn next_owned_address_after(&self, addr: Address) -> Option<Address>;
}

pub struct Project {
    rom: Rom,
    dispatcher: Dispatcher,
    config: ProjectConfig,
    procedures: BTreeSet<Address>,
    dispatchers: BTreeSet<Address>,
    cache: RwLock<FxHashMap<Address, Arc<Instruction>>>,
}

impl Project {
    pub fn new(rom: Rom, dispatcher: Dispatcher, config: ProjectConfig) -> Self {
        let procedures = config.procedures.iter().copied().collect();
        let dispatchers = config.switch_dispatchers.iter().copied().collect();
        Self {
            rom,
            dispatcher,
            config,
            procedures,
            dispatchers,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    /// Known procedure entries in address order.
    pub fn procedures(&self) -> impl Iterator<Item = Address> + '_ {
        self.procedures.iter().copied()
    }

    pub fn cached_instructions(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn decode_uncached(&self, addr: Address) -> Result<Instruction, DecodeError> {
        let instr = self.dispatcher.decode(&self.rom, addr)?;
        let dispatches = instr.condition().is_none()
            && instr
                .calls()
                .iter()
                .any(|target| self.dispatchers.contains(target));
        Ok(if dispatches {
            instr.into_switch()
        } else {
            instr
        })
    }
}

impl ProjectContext for Project {
    fn rom(&self) -> &dyn ByteSource {
        &self.rom
    }

    fn decode_and_cache(&self, addr: Address) -> Result<Arc<Instruction>, DecodeError> {
        if let Some(instr) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&addr)
        {
            return Ok(Arc::clone(instr));
        }

        let decoded = Arc::new(self.decode_uncached(addr)?);
        trace!(address = %addr, instr = %decoded, "decoded");
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(addr).or_insert(decoded)))
    }

    fn manual_jumptable_limit(&self, addr: Address) -> Option<usize> {
        self.config.jumptables.get(&addr).copied()
    }

    fn next_owned_address_after(&self, addr: Address) -> Option<Address> {
        self.procedures
            .range((Bound::Excluded(addr), Bound::Unbounded))
            .next()
            .copied()
    }
}

/// Upper bound for the analysis of a procedure entered at `addr`: the end of
/// its bank or the next known procedure, whichever comes first.
pub fn procedure_limit(ctx: &dyn ProjectContext, addr: Address) -> Address {
    let bank_end = match addr.bank() {
        Some(bank) => Address::from_physical((u32::from(bank) + 1) * BANK_SIZE),
        None => Address::from_virtual(0xFFFF),
    };
    match ctx.next_owned_address_after(addr) {
        Some(next) if next < bank_end => next,
        _ => bank_end,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::testing::project_with;

    fn at(virtual_address: u16) -> Address {
        Address::from_virtual(virtual_address)
    }

    #[test]
    fn repeated_decodes_share_one_instruction() {
        let project = project_with(&[(0x150, &[0x3E, 0x05])], default_config());
        let first = project.decode_and_cache(at(0x150)).expect("decode");
        let second = project.decode_and_cache(at(0x150)).expect("decode");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(project.cached_instructions(), 1);
        assert_eq!(first.to_string(), "LD A, 0x05");
    }

    #[test]
    fn calls_to_dispatchers_become_switches() {
        let project = project_with(
            &[(0x150, &[0xC7, 0xCD, 0x00, 0x20, 0xCC, 0x00, 0x00])],
            default_config(),
        );
        let rst = project.decode_and_cache(at(0x150)).expect("decode");
        assert!(rst.is_switch());
        assert_eq!(rst.to_string(), "SWITCH 0000:0151");

        let call = project.decode_and_cache(at(0x151)).expect("decode");
        assert!(!call.is_switch());
        let conditional = project.decode_and_cache(at(0x154)).expect("decode");
        assert!(!conditional.is_switch());
    }

    #[test]
    fn limit_stops_at_bank_end_or_next_procedure() {
        let mut config = default_config();
        config.procedures = vec![at(0x0200), at(0x4000)];
        let project = project_with(&[], config);

        assert_eq!(procedure_limit(&project, at(0x0150)), at(0x0200));
        assert_eq!(
            procedure_limit(&project, at(0x0300)),
            Address::from_physical(0x4000)
        );
        assert_eq!(project.next_owned_address_after(at(0x0200)), Some(at(0x4000)));

        let banked = Address::from_virtual_and_bank(0x4100, 1).expect("address");
        assert_eq!(procedure_limit(&project, banked), Address::from_physical(0x8000));
        assert_eq!(procedure_limit(&project, at(0xC000)), at(0xFFFF));
    }

    #[test]
    fn manual_limits_come_from_config() {
        let mut config = default_config();
        config.jumptables.insert(at(0x0151), 4);
        let project = project_with(&[], config);
        assert_eq!(project.manual_jumptable_limit(at(0x0151)), Some(4));
        assert_eq!(project.manual_jumptable_limit(at(0x0152)), None);
    }
}
