pub mod text;

use gbdec_core::{ProcedureGraph, ProcedureRange};

pub use text::TextRenderer;

pub fn format_range(range: &ProcedureRange) -> String {
    let mut text = TextRenderer::new();
    range.render(&mut text);
    text.finish()
}

pub fn format_graph(graph: &ProcedureGraph) -> String {
    let mut text = TextRenderer::new();
    graph.render(&mut text);
    text.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gbdec_core::{Project, analyze_procedure, default_config, load_graph};
    use gbdec_isa::Dispatcher;
    use gbdec_rom::{Address, Rom};

    fn project(bytes: &[u8]) -> Project {
        let mut data = vec![0u8; 0x8000];
        data[0x150..0x150 + bytes.len()].copy_from_slice(bytes);
        let rom = Rom::from_bytes(data).expect("rom");
        Project::new(rom, Dispatcher::sm83().expect("catalog"), default_config())
    }

    #[test]
    fn range_listing_has_labels_and_symbols() {
        // LDH A, [FF44]; CP 0x90; JR NZ, 0150; RET
        let project = project(&[0xF0, 0x44, 0xFE, 0x90, 0x20, 0xFA, 0xC9]);
        let range = analyze_procedure(&project, Address::from_virtual(0x150)).expect("range");
        assert_eq!(
            format_range(&range),
            "0000:0150:\n\
             0000:0150  LD A, [0xFF44]\n\
             0000:0152  CP 0x90\n\
             0000:0154  JR not FZ, 0000:0150\n\
             0000:0156  RET\n"
        );
    }

    #[test]
    fn graph_listing_names_blocks_and_edges() {
        let project = project(&[0x3E, 0x01, 0xC0, 0x3C, 0xC9]);
        let graph = load_graph(&project, Address::from_virtual(0x150)).expect("graph");
        let listing = format_graph(&graph);
        assert!(listing.starts_with("; ----"));
        assert!(listing.contains("; Proc graph 0000:0150\n"));
        assert!(listing.contains("; BLOCK 0 0000:0150\n"));
        assert!(listing.contains("    0000:0152  RET not FZ\n"));
        assert!(listing.contains("    ; -> BLOCK 1, return\n"));
        assert!(listing.contains("    0000:0153  INC A\n"));
        assert!(!listing.contains("0000:0154  RET\n"));
    }
}
