use super::*;
use crate::config::default_config;
use crate::testing::project_with;

fn at(virtual_address: u16) -> Address {
    Address::from_virtual(virtual_address)
}

const SWITCH_PROC: &[u8] = &[
    0x18, 0x03, // JR 0155
    0xC9, 0xC9, 0xC9, // RET x3
    0xC7, // RST 00
    0x52, 0x01, 0x53, 0x01, 0x54, 0x01, 0x10, 0x00,
];

#[test]
fn switch_fans_out_to_table_targets() {
    let project = project_with(&[(0x150, SWITCH_PROC)], default_config());
    let graph = load_graph(&project, at(0x150)).expect("graph");

    assert_eq!(graph.vertices().len(), 5);
    assert_eq!(graph.block_id(at(0x155)), Some(4));
    assert_eq!(graph.successors(0), &[Successor::Block(4)]);
    assert!(graph.block(0).body().is_empty());
    assert!(graph.is_switch(4));
    assert_eq!(
        graph.successors(4),
        &[
            Successor::Block(1),
            Successor::Block(2),
            Successor::Block(3)
        ]
    );
    assert_eq!(graph.parents(Successor::Block(4)), &[0]);
    assert_eq!(graph.parents(Successor::Return), &[1, 2, 3]);
    assert!(graph.suspicious_switch());
    assert_eq!(graph.procedure_length(), 12);
}

#[test]
fn return_only_blocks_collapse_into_return_edges() {
    let project = project_with(&[(0x150, SWITCH_PROC)], default_config());
    let graph = load_graph(&project, at(0x150)).expect("graph");

    assert_eq!(graph.skip_simple_jumps(1), Successor::Return);
    assert_eq!(graph.skip_simple_jumps(0), Successor::Block(0));
    assert_eq!(graph.skip_simple_jumps(4), Successor::Block(4));
    assert!(graph.last(1).is_some_and(|instr| instr.is_return()));
}

#[test]
fn jump_out_of_the_procedure_is_a_tail_call() {
    let mut config = default_config();
    config.procedures = vec![at(0x0200)];
    let project = project_with(
        &[(0x150, &[0x20, 0x03, 0xC3, 0x00, 0x03, 0xC9])],
        config,
    );
    let graph = load_graph(&project, at(0x150)).expect("graph");

    assert_eq!(graph.end_address(), at(0x156));
    assert_eq!(
        graph.successors(0),
        &[Successor::Block(1), Successor::Block(2)]
    );
    assert!(graph.condition(0).is_some());
    assert_eq!(graph.successors(1), &[Successor::Block(3)]);
    assert!(graph.block(3).is_tail_call());
    assert_eq!(graph.block(3).start(), at(0x0300));
    assert_eq!(graph.successors(3), &[Successor::Return]);
    assert_eq!(graph.parents(Successor::Return), &[2, 3]);
    assert_eq!(graph.skip_simple_jumps(1), Successor::Block(1));
    assert_eq!(graph.skip_simple_jumps(3), Successor::Block(3));
}

#[test]
fn parents_keep_duplicate_edges() {
    let project = project_with(&[(0x150, &[0x20, 0x00, 0xC9])], default_config());
    let graph = load_graph(&project, at(0x150)).expect("graph");

    assert_eq!(
        graph.successors(0),
        &[Successor::Block(1), Successor::Block(1)]
    );
    assert_eq!(graph.parents(Successor::Block(1)), &[0, 0]);
}

#[test]
fn blocks_split_at_block_starts() {
    let project = project_with(
        &[(0x150, &[0x3E, 0x01, 0xC0, 0x3C, 0x3C, 0xC9])],
        default_config(),
    );
    let graph = load_graph(&project, at(0x150)).expect("graph");

    // LD A, 1; RET NZ | INC A; INC A; RET
    assert_eq!(graph.vertices().len(), 2);
    assert_eq!(graph.block(0).body().len(), 2);
    assert_eq!(
        graph.successors(0),
        &[Successor::Block(1), Successor::Return]
    );
    assert_eq!(graph.block(1).body().len(), 2);
    assert_eq!(graph.block(1).instructions().count(), 3);
    assert_eq!(graph.successors(1), &[Successor::Return]);
}
