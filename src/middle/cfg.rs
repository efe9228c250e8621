//! The CFG pass (spec §4.4): reachability, predecessor rebuilding, and
//! block ordering via Tarjan's SCC algorithm. Total on any parsed
//! `Procedure` — there is no error return, since a procedure with zero
//! blocks never survives the parser (spec §4.4 "Failure: none by design").
//!
//! Grounded in `cfg.go`'s `reachable`/`predecessors`/`topologicalSort`, with
//! two corrections over that source: reachability is an actual depth-first
//! walk (the source's `reachable` never recurses into successors, which
//! would leave every non-entry block unreached), and the SCC counter is
//! monotonically increasing rather than reset to zero at every root (spec
//! §9 REDESIGN FLAGS).

use crate::common::{BlockRef, Map};
use crate::front::ir::{BasicBlock, Procedure};

/// Runs reachability, predecessor rebuilding, and SCC-ordered reindexing on
/// `proc`, in that order (spec §4.4).
pub fn build(proc: &mut Procedure) {
    let total_blocks = proc.blocks.len();
    drop_unreachable(proc);
    log::trace!("{}: {} of {} blocks reachable", proc.name, proc.blocks.len(), total_blocks);

    rebuild_predecessors(proc);
    let successors: Vec<[Option<usize>; 2]> = proc
        .blocks
        .iter()
        .map(|b| [b.successors[0].map(|r| r.0), b.successors[1].map(|r| r.0)])
        .collect();
    let (scc, order) = tarjan(&successors);
    let scc_count = scc.iter().collect::<crate::common::Set<_>>().len();
    reorder(proc, order, scc);
    log::debug!("{}: cfg built, {} blocks, {} sccs", proc.name, proc.blocks.len(), scc_count);
}

fn remap_refs(blocks: &mut [BasicBlock], mapping: &Map<usize, usize>) {
    for b in blocks.iter_mut() {
        for s in b.successors.iter_mut() {
            if let Some(r) = s {
                r.0 = mapping[&r.0];
            }
        }
        for p in b.predecessors.iter_mut() {
            p.0 = mapping[&p.0];
        }
    }
}

/// Depth-first from the entry block; blocks never reached are dropped and
/// every remaining `BlockRef` is reindexed to close the resulting gaps
/// (spec §4.4(a)).
fn drop_unreachable(proc: &mut Procedure) {
    let n = proc.blocks.len();
    let mut visited = vec![false; n];
    let mut stack = vec![proc.entry_point.0];
    visited[proc.entry_point.0] = true;
    while let Some(idx) = stack.pop() {
        for succ in proc.blocks[idx].successors.into_iter().flatten() {
            if !visited[succ.0] {
                visited[succ.0] = true;
                stack.push(succ.0);
            }
        }
    }

    let mut mapping = Map::new();
    let mut kept = Vec::new();
    for (old_idx, block) in proc.blocks.iter().enumerate() {
        if visited[old_idx] {
            mapping.insert(old_idx, kept.len());
            kept.push(block.clone());
        }
    }

    remap_refs(&mut kept, &mapping);
    proc.entry_point = BlockRef(mapping[&proc.entry_point.0]);
    proc.blocks = kept;
}

/// Rebuilds every block's predecessor list from scratch off the current
/// successor edges (spec §4.4(b)): no duplicate entry for a block that
/// targets itself through both successor slots.
fn rebuild_predecessors(proc: &mut Procedure) {
    for block in proc.blocks.iter_mut() {
        block.predecessors.clear();
    }

    let edges: Vec<(BlockRef, [Option<BlockRef>; 2])> =
        proc.blocks.iter().enumerate().map(|(i, b)| (BlockRef(i), b.successors)).collect();

    for (from, succs) in edges {
        if let Some(s0) = succs[0] {
            proc.blocks[s0.0].predecessors.push(from);
        }
        if let Some(s1) = succs[1] {
            if Some(s1) != succs[0] {
                proc.blocks[s1.0].predecessors.push(from);
            }
        }
    }
}

/// Tarjan's SCC algorithm over a plain adjacency list. Returns the SCC
/// number of each node and the final reverse-postorder sequence of node
/// indices (spec §4.4(c)).
fn tarjan(successors: &[[Option<usize>; 2]]) -> (Vec<usize>, Vec<usize>) {
    let n = successors.len();
    let mut indices: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut onstack = vec![false; n];
    let mut stack = Vec::new();
    let mut index = 0usize;
    let mut scc_counter = 0usize;
    let mut scc = vec![0usize; n];
    let mut order = Vec::new();

    #[allow(clippy::too_many_arguments)]
    fn strongconnect(
        v: usize,
        successors: &[[Option<usize>; 2]],
        indices: &mut [Option<usize>],
        lowlink: &mut [usize],
        onstack: &mut [bool],
        stack: &mut Vec<usize>,
        index: &mut usize,
        scc_counter: &mut usize,
        scc: &mut [usize],
        order: &mut Vec<usize>,
    ) {
        indices[v] = Some(*index);
        lowlink[v] = *index;
        *index += 1;
        onstack[v] = true;
        stack.push(v);

        for succ in successors[v].into_iter().flatten() {
            if indices[succ].is_none() {
                strongconnect(succ, successors, indices, lowlink, onstack, stack, index, scc_counter, scc, order);
                lowlink[v] = lowlink[v].min(lowlink[succ]);
            } else if onstack[succ] {
                lowlink[v] = lowlink[v].min(indices[succ].expect("visited node has an index"));
            }
        }

        if lowlink[v] == indices[v].expect("v was just assigned an index") {
            loop {
                let w = stack.pop().expect("v's own frame is still on the stack");
                onstack[w] = false;
                scc[w] = *scc_counter;
                order.push(w);
                if w == v {
                    break;
                }
            }
            // Monotonically increasing, unlike the source this is grounded
            // on — that version reset this to 0 at every root, numbering
            // every SCC as 0 (spec §9 REDESIGN FLAGS).
            *scc_counter += 1;
        }
    }

    for v in 0..n {
        if indices[v].is_none() {
            strongconnect(v, successors, &mut indices, &mut lowlink, &mut onstack, &mut stack, &mut index, &mut scc_counter, &mut scc, &mut order);
        }
    }

    order.reverse();
    (scc, order)
}

/// Physically reorders `proc.blocks` into `order` (already reverse-postorder)
/// and stamps each block's `scc_component`, remapping every `BlockRef`.
fn reorder(proc: &mut Procedure, order: Vec<usize>, scc: Vec<usize>) {
    let mut mapping = Map::new();
    for (new_idx, &old_idx) in order.iter().enumerate() {
        mapping.insert(old_idx, new_idx);
    }

    let mut new_blocks = Vec::with_capacity(order.len());
    for &old_idx in &order {
        let mut block = proc.blocks[old_idx].clone();
        block.scc_component = scc[old_idx];
        new_blocks.push(block);
    }

    remap_refs(&mut new_blocks, &mapping);
    proc.entry_point = BlockRef(mapping[&proc.entry_point.0]);
    proc.blocks = new_blocks;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::front::parse;

    fn build_procedure(source: &str) -> Procedure {
        let mut result = None;
        parse("t", source, &mut |p| {
            result = Some(p.clone());
            Ok(())
        })
        .expect("parses");
        let mut proc = result.expect("one procedure");
        build(&mut proc);
        proc
    }

    #[test]
    fn single_block_is_its_own_trivial_component() {
        let proc = build_procedure("func f() u64 {\n  a: reti 0\n}\n");
        assert_eq!(proc.blocks.len(), 1);
        assert_eq!(proc.blocks[0].predecessors, Vec::<BlockRef>::new());
        assert_eq!(proc.blocks[0].scc_component, 0);
    }

    #[test]
    fn forward_jump_has_correct_predecessors() {
        let proc = build_procedure("func f(a u64) u64 {\n  entry: jmp done\n  done: ret a\n}\n");
        let done = proc.blocks.iter().find(|b| b.name == "done").unwrap();
        assert_eq!(done.predecessors.len(), 1);
    }

    #[test]
    fn s5_loop_and_scc_tagging() {
        let source = "func cfg(z u64) u64 {\n  x: jnz z, b, c\n  b: jmp d\n  d: jmp g\n  g: jmp d\n  c: jmp e\n  e: jmp m\n  m: jmp c\n}\n";
        let proc = build_procedure(source);
        assert_eq!(proc.blocks.len(), 7);
        assert_eq!(proc.blocks[0].name, "x");

        let scc_of = |name: &str| proc.blocks.iter().find(|b| b.name == name).unwrap().scc_component;
        assert_eq!(scc_of("d"), scc_of("g"));
        assert_eq!(scc_of("c"), scc_of("e"));
        assert_eq!(scc_of("e"), scc_of("m"));
        assert_ne!(scc_of("d"), scc_of("c"));
        assert_ne!(scc_of("x"), scc_of("b"));
    }

    #[test]
    fn s6_collapsed_jnz_has_single_successor() {
        let proc = build_procedure("func one(a u64) u64 {\n  entry: jnz a, L, L\n  L: ret a\n}\n");
        let entry = proc.blocks.iter().find(|b| b.name == "entry").unwrap();
        assert_eq!(entry.successors[1], None);
    }

    #[test]
    fn unreachable_block_is_dropped() {
        let source = "func f() u64 {\n  entry: reti 0\n  dead: jmp dead\n}\n";
        let proc = build_procedure(source);
        assert_eq!(proc.blocks.len(), 1);
        assert_eq!(proc.blocks[0].name, "entry");
    }

    #[test]
    fn cfg_pass_is_idempotent() {
        let source = "func cfg(z u64) u64 {\n  x: jnz z, b, c\n  b: jmp d\n  d: jmp g\n  g: jmp d\n  c: jmp e\n  e: jmp m\n  m: jmp c\n}\n";
        let mut proc = build_procedure(source);
        let names_before: Vec<String> = proc.blocks.iter().map(|b| b.name.clone()).collect();
        let sccs_before: Vec<usize> = proc.blocks.iter().map(|b| b.scc_component).collect();
        build(&mut proc);
        let names_after: Vec<String> = proc.blocks.iter().map(|b| b.name.clone()).collect();
        let sccs_after: Vec<usize> = proc.blocks.iter().map(|b| b.scc_component).collect();
        assert_eq!(names_before, names_after);
        assert_eq!(sccs_before, sccs_after);
    }
}
