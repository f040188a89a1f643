use std::sync::Arc;

use gbdec_expr::Expr;
use gbdec_isa::{Flow, Instruction};
use gbdec_rom::Address;
use indexmap::IndexSet;
use tracing::debug;

use crate::project::ProjectContext;
use crate::range::{AnalysisError, ProcedureRange, analyze_procedure, distance};
use crate::render::{Renderer, Scope, render_instruction};

/// Edge target in a procedure graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Successor {
    Block(usize),
    /// Control leaves the procedure back to its caller.
    Return,
}

#[derive(Debug, Clone)]
pub struct Block {
    start: Address,
    body: Vec<Arc<Instruction>>,
    /// Final jump or return whose only effect is the block's out edges.
    elided: Option<Arc<Instruction>>,
    tail_call: bool,
}

impl Block {
    fn tail_call(target: Address) -> Self {
        Self {
            start: target,
            body: Vec::new(),
            elided: None,
            tail_call: true,
        }
    }

    pub fn start(&self) -> Address {
        self.start
    }

    /// Instructions that still need rendering, without an elided terminator.
    pub fn body(&self) -> &[Arc<Instruction>] {
        &self.body
    }

    /// Synthesized block standing for a jump out of the procedure.
    pub fn is_tail_call(&self) -> bool {
        self.tail_call
    }

    pub fn last(&self) -> Option<&Arc<Instruction>> {
        self.elided.as_ref().or_else(|| self.body.last())
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Arc<Instruction>> {
        self.body.iter().chain(self.elided.iter())
    }
}

/// Basic blocks of one procedure with their edges. Block 0 is the entry.
#[derive(Debug, Clone)]
pub struct ProcedureGraph {
    start: Address,
    end: Address,
    starts: IndexSet<Address>,
    blocks: Vec<Block>,
    successors: Vec<Vec<Successor>>,
    parents: Vec<Vec<usize>>,
    return_parents: Vec<usize>,
    suspicious_switch: bool,
    ownership_warning: bool,
}

impl ProcedureGraph {
    pub fn build(ctx: &dyn ProjectContext, range: &ProcedureRange) -> Result<Self, AnalysisError> {
        if !range.block_starts().contains(&range.start()) {
            return Err(AnalysisError::EmptyRange {
                address: range.start(),
            });
        }
        let starts: IndexSet<Address> = range.block_starts().iter().copied().collect();
        let count = starts.len();
        let mut graph = Self {
            start: range.start(),
            end: range.limit(),
            starts,
            blocks: Vec::with_capacity(count),
            successors: Vec::with_capacity(count),
            parents: Vec::new(),
            return_parents: Vec::new(),
            suspicious_switch: range.suspicious_switch(),
            ownership_warning: range.ownership_warning(),
        };

        let mut edges = Vec::with_capacity(count);
        for index in 0..count {
            let start = graph.starts[index];
            let end = graph
                .starts
                .get_index(index + 1)
                .copied()
                .unwrap_or(range.limit());
            let (block, targets) = add_block(ctx, range, start, end)?;
            graph.blocks.push(block);
            edges.push(targets);
        }

        for targets in edges {
            let successors: Vec<Successor> = targets
                .into_iter()
                .map(|target| match target {
                    Some(addr) => Successor::Block(graph.block_at(addr)),
                    None => Successor::Return,
                })
                .collect();
            graph.successors.push(successors);
        }
        // Tail-call blocks have the caller as their only successor.
        while graph.successors.len() < graph.blocks.len() {
            graph.successors.push(vec![Successor::Return]);
        }

        graph.parents = vec![Vec::new(); graph.blocks.len()];
        for (parent, successors) in graph.successors.iter().enumerate() {
            for successor in successors {
                match successor {
                    Successor::Block(child) => graph.parents[*child].push(parent),
                    Successor::Return => graph.return_parents.push(parent),
                }
            }
        }
        Ok(graph)
    }

    /// Id of the block starting at `addr`, adding a tail-call block for
    /// addresses outside the procedure.
    fn block_at(&mut self, addr: Address) -> usize {
        let (id, added) = self.starts.insert_full(addr);
        if added {
            debug!(target = %addr, "tail call");
            self.blocks.push(Block::tail_call(addr));
        }
        id
    }

    pub fn start_address(&self) -> Address {
        self.start
    }

    pub fn end_address(&self) -> Address {
        self.end
    }

    /// Id of the entry block.
    pub fn start(&self) -> usize {
        0
    }

    pub fn vertices(&self) -> std::ops::Range<usize> {
        0..self.blocks.len()
    }

    pub fn block(&self, id: usize) -> &Block {
        &self.blocks[id]
    }

    pub fn block_id(&self, addr: Address) -> Option<usize> {
        self.starts.get_index_of(&addr)
    }

    pub fn successors(&self, id: usize) -> &[Successor] {
        &self.successors[id]
    }

    /// Blocks with an edge into `vertex`, once per edge.
    pub fn parents(&self, vertex: Successor) -> &[usize] {
        match vertex {
            Successor::Block(id) => &self.parents[id],
            Successor::Return => &self.return_parents,
        }
    }

    pub fn last(&self, id: usize) -> Option<&Arc<Instruction>> {
        self.blocks[id].last()
    }

    pub fn is_switch(&self, id: usize) -> bool {
        self.last(id).is_some_and(|instr| instr.is_switch())
    }

    pub fn condition(&self, id: usize) -> Option<&Expr> {
        self.last(id).and_then(|instr| instr.condition())
    }

    /// Follows `id` through a block that has nothing left to run but a
    /// return, yielding a direct return edge instead.
    pub fn skip_simple_jumps(&self, id: usize) -> Successor {
        let block = &self.blocks[id];
        if id != self.start()
            && block.body.is_empty()
            && !block.tail_call
            && self.successors[id] == [Successor::Return]
        {
            Successor::Return
        } else {
            Successor::Block(id)
        }
    }

    pub fn suspicious_switch(&self) -> bool {
        self.suspicious_switch
    }

    pub fn ownership_warning(&self) -> bool {
        self.ownership_warning
    }

    pub fn procedure_length(&self) -> usize {
        distance(self.start, self.end)
    }

    pub fn render<R: Renderer>(&self, renderer: &mut R) {
        renderer.scoped(Scope::Comment, |out| {
            out.hline();
            out.write("Proc graph ");
            out.write_symbol(self.start);
            out.new_line();
            out.hline();
        });
        for id in self.vertices() {
            let block = &self.blocks[id];
            renderer.scoped(Scope::Comment, |out| {
                out.write(&format!("BLOCK {id} "));
                out.write_symbol(block.start);
            });
            renderer.scoped(Scope::Indent, |out| {
                if block.tail_call {
                    out.scoped(Scope::LineAddr(block.start), |line| {
                        line.write("tail call ");
                        line.write_symbol(block.start);
                    });
                }
                for instr in &block.body {
                    render_instruction(out, instr);
                }
                let edges: Vec<String> = self.successors[id]
                    .iter()
                    .map(|successor| match self.skip_simple_jumps_of(*successor) {
                        Successor::Block(child) => format!("BLOCK {child}"),
                        Successor::Return => "return".to_string(),
                    })
                    .collect();
                out.scoped(Scope::Comment, |comment| {
                    comment.write("-> ");
                    comment.render_list(&edges);
                });
            });
        }
    }

    fn skip_simple_jumps_of(&self, successor: Successor) -> Successor {
        match successor {
            Successor::Block(id) => self.skip_simple_jumps(id),
            Successor::Return => Successor::Return,
        }
    }
}

/// Decodes one block and returns it with its out edges, `None` standing for
/// a return.
fn add_block(
    ctx: &dyn ProjectContext,
    range: &ProcedureRange,
    start: Address,
    end: Address,
) -> Result<(Block, Vec<Option<Address>>), AnalysisError> {
    let decode = |addr: Address| {
        ctx.decode_and_cache(addr)
            .map_err(|source| AnalysisError::from_decode(addr, source))
    };

    let mut body = Vec::new();
    let mut last = decode(start)?;
    loop {
        let next = last.next_address();
        if !last.has_fallthrough() || next >= end {
            break;
        }
        body.push(last);
        last = decode(next)?;
    }

    let mut targets = Vec::new();
    let mut elide = false;
    if last.has_fallthrough() {
        targets.push(Some(end));
    }
    match last.flow() {
        Flow::Jump { .. } => {
            let jumps = last.jumps();
            elide = last.is_unconditional() && !jumps.is_empty();
            targets.extend(jumps.into_iter().map(Some));
        }
        Flow::Switch { table } => {
            for entry in 0..range.jumptable_size(*table) {
                let slot = table.offset(2 * entry as i32);
                let raw = ctx
                    .rom()
                    .word(slot)
                    .map_err(|source| AnalysisError::from_decode(slot, source.into()))?;
                targets.push(Some(Address::from_virtual_and_current(raw, range.start())));
            }
        }
        Flow::Return { .. } => {
            targets.push(None);
            elide = !last.has_fallthrough();
        }
        Flow::Next | Flow::Call { .. } | Flow::Invalid => {}
    }

    let (body, elided) = if elide {
        (body, Some(last))
    } else {
        body.push(last);
        (body, None)
    };
    let block = Block {
        start,
        body,
        elided,
        tail_call: false,
    };
    Ok((block, targets))
}

/// Range analysis followed by graph construction.
pub fn load_graph(ctx: &dyn ProjectContext, addr: Address) -> Result<ProcedureGraph, AnalysisError> {
    let range = analyze_procedure(ctx, addr)?;
    ProcedureGraph::build(ctx, &range)
}

#[cfg(test)]
mod tests;
