use gbdec_rom::Address;

/// Game Boy hardware registers, sorted by address.
static HARDWARE_REGISTERS: &[(u16, &str)] = &[
    (0xFF00, "IO:JOYP"),
    (0xFF01, "IO:SB"),
    (0xFF02, "IO:SC"),
    (0xFF04, "IO:DIV"),
    (0xFF05, "IO:TIMA"),
    (0xFF06, "IO:TMA"),
    (0xFF07, "IO:TAC"),
    (0xFF0F, "IO:IF"),
    (0xFF10, "IO:NR10"),
    (0xFF11, "IO:NR11"),
    (0xFF12, "IO:NR12"),
    (0xFF13, "IO:NR13"),
    (0xFF14, "IO:NR14"),
    (0xFF16, "IO:NR21"),
    (0xFF17, "IO:NR22"),
    (0xFF18, "IO:NR23"),
    (0xFF19, "IO:NR24"),
    (0xFF1A, "IO:NR30"),
    (0xFF1B, "IO:NR31"),
    (0xFF1C, "IO:NR32"),
    (0xFF1D, "IO:NR33"),
    (0xFF1E, "IO:NR34"),
    (0xFF20, "IO:NR41"),
    (0xFF21, "IO:NR42"),
    (0xFF22, "IO:NR43"),
    (0xFF23, "IO:NR44"),
    (0xFF24, "IO:NR50"),
    (0xFF25, "IO:NR51"),
    (0xFF26, "IO:NR52"),
    (0xFF40, "IO:LCDC"),
    (0xFF41, "IO:STAT"),
    (0xFF42, "IO:SCY"),
    (0xFF43, "IO:SCX"),
    (0xFF44, "IO:LY"),
    (0xFF45, "IO:LYC"),
    (0xFF46, "IO:DMA"),
    (0xFF47, "IO:BGP"),
    (0xFF48, "IO:OBP0"),
    (0xFF49, "IO:OBP1"),
    (0xFF4A, "IO:WY"),
    (0xFF4B, "IO:WX"),
    (0xFF4D, "IO:KEY1"),
    (0xFF4F, "IO:VBK"),
    (0xFF51, "IO:HDMA1"),
    (0xFF52, "IO:HDMA2"),
    (0xFF53, "IO:HDMA3"),
    (0xFF54, "IO:HDMA4"),
    (0xFF55, "IO:HDMA5"),
    (0xFF56, "IO:RP"),
    (0xFF68, "IO:BGPI"),
    (0xFF69, "IO:BGPD"),
    (0xFF6A, "IO:OBPI"),
    (0xFF6B, "IO:OBPD"),
    (0xFF6C, "IO:UNKN1"),
    (0xFF70, "IO:SVBK"),
    (0xFF72, "IO:UNKN2"),
    (0xFF73, "IO:UNKN3"),
    (0xFF74, "IO:UNKN4"),
    (0xFF75, "IO:UNKN5"),
    (0xFF76, "IO:UNKN6"),
    (0xFF77, "IO:UNKN7"),
    (0xFFFF, "IO:IE"),
];

/// Conventional name of a hardware register address.
pub fn default_symbol(addr: Address) -> Option<&'static str> {
    if addr.bank().is_some() {
        return None;
    }
    HARDWARE_REGISTERS
        .binary_search_by_key(&addr.virtual_address(), |(at, _)| *at)
        .ok()
        .map(|index| HARDWARE_REGISTERS[index].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_sorted() {
        assert!(HARDWARE_REGISTERS.windows(2).all(|pair| pair[0].0 < pair[1].0));
    }

    #[test]
    fn names_io_registers_only() {
        assert_eq!(default_symbol(Address::from_virtual(0xFF40)), Some("IO:LCDC"));
        assert_eq!(default_symbol(Address::from_virtual(0xFFFF)), Some("IO:IE"));
        assert_eq!(default_symbol(Address::from_virtual(0xFF03)), None);
        assert_eq!(default_symbol(Address::from_physical(0xFF40)), None);
    }
}
