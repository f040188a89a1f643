use super::*;
use crate::config::default_config;
use crate::testing::project_with;

fn at(virtual_address: u16) -> Address {
    Address::from_virtual(virtual_address)
}

fn set(addrs: &[u16]) -> BTreeSet<Address> {
    addrs.iter().map(|&addr| at(addr)).collect()
}

/// `JR` over three one-byte `RET` targets into an `RST 00` dispatch whose
/// table lists them, followed by a slot pointing into the interrupt vectors.
const SWITCH_PROC: &[u8] = &[
    0x18, 0x03, // JR 0155
    0xC9, 0xC9, 0xC9, // RET x3
    0xC7, // RST 00
    0x52, 0x01, 0x53, 0x01, 0x54, 0x01, 0x10, 0x00,
];

#[test]
fn straight_line_owns_exactly_its_instructions() {
    let project = project_with(&[(0x150, &[0x3E, 0x05, 0x3C, 0xC9])], default_config());
    let range = analyze_procedure(&project, at(0x150)).expect("analysis");

    assert_eq!(range.owned(), &set(&[0x150, 0x151, 0x152, 0x153]));
    assert_eq!(range.block_starts(), &set(&[0x150]));
    assert!(range.labels().is_empty());
    assert_eq!(range.limit(), at(0x154));
    assert_eq!(range.length(), 4);
    assert!(range.warnings().is_empty());
    assert_eq!(range.visited().count(), 3);
}

#[test]
fn jump_table_stops_at_implausible_target() {
    let project = project_with(&[(0x150, SWITCH_PROC)], default_config());
    let range = analyze_procedure(&project, at(0x150)).expect("analysis");

    assert_eq!(range.jumptable_size(at(0x156)), 3);
    assert!(range.suspicious_switch());
    assert_eq!(
        range.warnings(),
        &[AnalysisWarning::SuspiciousJumpTable {
            table: at(0x156),
            target: Some(at(0x0010)),
        }]
    );
    assert_eq!(range.limit(), at(0x15C));
    assert_eq!(range.block_starts(), &set(&[0x150, 0x152, 0x153, 0x154, 0x155]));
    assert_eq!(range.labels(), &set(&[0x152, 0x153, 0x154, 0x155]));
}

#[test]
fn manual_cap_ends_expansion_as_suspicious() {
    let mut config = default_config();
    config.jumptables.insert(at(0x156), 2);
    let project = project_with(&[(0x150, SWITCH_PROC)], config);
    let range = analyze_procedure(&project, at(0x150)).expect("analysis");

    assert!(range.suspicious_switch());
    assert!(range.warnings().contains(&AnalysisWarning::SuspiciousJumpTable {
        table: at(0x156),
        target: None,
    }));
    // The third target was never reached, so its byte is the first gap.
    assert_eq!(range.limit(), at(0x154));
}

#[test]
fn table_ends_quietly_where_code_begins() {
    let project = project_with(
        &[(0x150, &[0xC7, 0x55, 0x01, 0x57, 0x01, 0x00, 0xC9, 0xC9])],
        default_config(),
    );
    let range = analyze_procedure(&project, at(0x150)).expect("analysis");

    assert_eq!(range.jumptable_size(at(0x151)), 2);
    assert!(!range.suspicious_switch());
    assert!(range.warnings().is_empty());
    assert_eq!(range.limit(), at(0x158));
}

#[test]
fn pre_claimed_byte_is_a_conflict_and_cut_off() {
    let project = project_with(&[(0x150, &[0x3E, 0x05, 0x3C, 0xC9])], default_config());
    let range = ProcedureRangeAnalysis::new(at(0x150), at(0x4000))
        .with_claimed([at(0x152)])
        .run(&project)
        .expect("analysis");

    assert!(range.ownership_warning());
    assert!(range.warnings().contains(&AnalysisWarning::OwnershipConflict {
        address: at(0x152),
    }));
    assert!(!range.owned().contains(&at(0x152)));
    assert_eq!(range.owned(), &set(&[0x150, 0x151]));
    assert_eq!(range.limit(), at(0x152));
    assert_eq!(range.visited().collect::<Vec<_>>(), vec![at(0x150)]);
}

#[test]
fn claimed_entry_leaves_nothing_to_own() {
    let project = project_with(&[(0x150, &[0x3E, 0x05, 0xC9])], default_config());
    let err = ProcedureRangeAnalysis::new(at(0x150), at(0x200))
        .with_claimed([at(0x150)])
        .run(&project)
        .expect_err("entry is taken");

    assert!(matches!(err, AnalysisError::EmptyRange { address } if address == at(0x150)));
}

#[test]
fn empty_window_is_an_error() {
    let project = project_with(&[(0x150, &[0xC9])], default_config());
    let err = ProcedureRangeAnalysis::new(at(0x150), at(0x150))
        .run(&project)
        .expect_err("no room");

    assert_eq!(err.to_string(), "procedure at 0000:0150 owns no bytes");
}

#[test]
fn call_into_the_window_shrinks_it() {
    let project = project_with(
        &[(0x150, &[0xCD, 0x58, 0x01, 0x20, 0x05, 0xC9, 0x00, 0x00, 0xC9, 0x00, 0xC9])],
        default_config(),
    );
    let range = analyze_procedure(&project, at(0x150)).expect("analysis");

    assert_eq!(range.limit(), at(0x156));
    assert_eq!(
        range.visited().collect::<Vec<_>>(),
        vec![at(0x150), at(0x153), at(0x155)]
    );
    assert_eq!(range.block_starts(), &set(&[0x150, 0x155]));
    assert!(range.labels().is_empty());
}

#[test]
fn recursive_call_keeps_the_window() {
    let project = project_with(
        &[(0x150, &[0x20, 0x03, 0xCD, 0x50, 0x01, 0xC9])],
        default_config(),
    );
    let range = analyze_procedure(&project, at(0x150)).expect("analysis");
    assert_eq!(range.limit(), at(0x156));
    assert_eq!(range.block_starts(), &set(&[0x150, 0x152, 0x155]));
}

#[test]
fn bad_opcode_is_flagged_and_ends_the_path() {
    let project = project_with(&[(0x150, &[0x00, 0xD3, 0xC9])], default_config());
    let range = analyze_procedure(&project, at(0x150)).expect("analysis");

    assert!(range.has_suspicious_instr());
    assert_eq!(
        range.warnings(),
        &[AnalysisWarning::UnknownOpcode { address: at(0x151) }]
    );
    assert_eq!(range.owned(), &set(&[0x150, 0x151]));
}

#[test]
fn decoding_past_the_image_is_an_overrun() {
    let project = project_with(&[(0x7FFF, &[0x01])], default_config());
    let start = Address::from_physical(0x7FFF);
    let err = analyze_procedure(&project, start).expect_err("overrun");
    assert!(matches!(err, AnalysisError::RangeOverrun { address, .. } if address == start));
}

#[test]
fn warnings_render_with_canonical_addresses() {
    let warning = AnalysisWarning::SuspiciousJumpTable {
        table: at(0x156),
        target: Some(at(0x10)),
    };
    assert_eq!(
        warning.to_string(),
        "jump table 0000:0156 has implausible target 0000:0010"
    );
}
