//! CFG and natural-loop analysis.
//!
//! Computes predecessor/successor lists, reverse postorder, immediate
//! dominators (Cooper-Harvey-Kennedy), and the natural-loop forest the
//! emitter's loop-aware block walk requires. A natural loop is defined by a
//! back edge (tail -> header) where the header dominates the tail; loops
//! sharing a header are merged, and nesting is recovered from body
//! containment. The CFG is assumed reducible (the host pipeline runs
//! CFG simplification first).

use std::collections::HashSet;

use super::ir::{Function, InstKind};

/// Successor block indices of each block, read off the terminators.
pub fn build_successors(func: &Function) -> Vec<Vec<usize>> {
    let mut succs: Vec<Vec<usize>> = vec![Vec::new(); func.blocks.len()];
    for (i, block) in func.blocks.iter().enumerate() {
        let mut push = |target: usize| {
            if !succs[i].contains(&target) {
                succs[i].push(target);
            }
        };
        match &block.terminator().kind {
            InstKind::Br { dest } => push(dest.index()),
            InstKind::CondBr { on_true, on_false, .. } => {
                push(on_true.index());
                push(on_false.index());
            }
            InstKind::Switch { default, cases, .. } => {
                push(default.index());
                for (_, target) in cases {
                    push(target.index());
                }
            }
            InstKind::Invoke { normal, unwind, .. } => {
                push(normal.index());
                push(unwind.index());
            }
            InstKind::Ret { .. } | InstKind::Unwind | InstKind::Unreachable => {}
            other => panic!("Instruction = {:?}\nblock does not end in a terminator", other),
        }
    }
    succs
}

/// Predecessor lists, inverted from the successor lists.
pub fn build_predecessors(num_blocks: usize, succs: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); num_blocks];
    for (block, targets) in succs.iter().enumerate() {
        for &t in targets {
            preds[t].push(block);
        }
    }
    preds
}

/// Reverse postorder over the CFG from the entry block.
fn compute_reverse_postorder(num_blocks: usize, succs: &[Vec<usize>]) -> Vec<usize> {
    fn dfs(node: usize, succs: &[Vec<usize>], visited: &mut [bool], postorder: &mut Vec<usize>) {
        visited[node] = true;
        for &succ in &succs[node] {
            if !visited[succ] {
                dfs(succ, succs, visited, postorder);
            }
        }
        postorder.push(node);
    }

    let mut visited = vec![false; num_blocks];
    let mut postorder = Vec::with_capacity(num_blocks);
    if num_blocks > 0 {
        dfs(0, succs, &mut visited, &mut postorder);
    }
    postorder.reverse();
    postorder
}

const UNDEF: usize = usize::MAX;

/// Immediate dominators via the Cooper-Harvey-Kennedy iteration.
/// `idom[entry] == entry`; unreachable blocks stay `usize::MAX`.
pub fn compute_dominators(num_blocks: usize, preds: &[Vec<usize>], succs: &[Vec<usize>]) -> Vec<usize> {
    let rpo = compute_reverse_postorder(num_blocks, succs);
    let mut rpo_number = vec![UNDEF; num_blocks];
    for (order, &block) in rpo.iter().enumerate() {
        rpo_number[block] = order;
    }

    let mut idom = vec![UNDEF; num_blocks];
    if rpo.is_empty() {
        return idom;
    }
    idom[rpo[0]] = rpo[0];

    let mut changed = true;
    while changed {
        changed = false;
        for &b in rpo.iter().skip(1) {
            let mut new_idom = UNDEF;
            for &p in &preds[b] {
                if idom[p] != UNDEF {
                    new_idom = p;
                    break;
                }
            }
            if new_idom == UNDEF {
                continue;
            }
            for &p in &preds[b] {
                if p != new_idom && idom[p] != UNDEF {
                    new_idom = intersect(new_idom, p, &idom, &rpo_number);
                }
            }
            if idom[b] != new_idom {
                idom[b] = new_idom;
                changed = true;
            }
        }
    }
    idom
}

fn intersect(mut finger1: usize, mut finger2: usize, idom: &[usize], rpo_number: &[usize]) -> usize {
    while finger1 != finger2 {
        while rpo_number[finger1] > rpo_number[finger2] {
            finger1 = idom[finger1];
        }
        while rpo_number[finger2] > rpo_number[finger1] {
            finger2 = idom[finger2];
        }
    }
    finger1
}

/// A natural loop: its header, its member blocks (header first, the rest in
/// layout order), and its position in the loop forest.
#[derive(Debug)]
pub struct NaturalLoop {
    pub header: usize,
    pub blocks: Vec<usize>,
    pub parent: Option<usize>,
}

/// The loop forest of a function plus an innermost-loop-per-block index.
#[derive(Debug, Default)]
pub struct LoopInfo {
    loops: Vec<NaturalLoop>,
    innermost: Vec<Option<usize>>,
}

impl LoopInfo {
    pub fn compute(func: &Function) -> LoopInfo {
        let num_blocks = func.blocks.len();
        if num_blocks == 0 {
            return LoopInfo::default();
        }
        let succs = build_successors(func);
        let preds = build_predecessors(num_blocks, &succs);
        let idom = compute_dominators(num_blocks, &preds, &succs);

        let dominates = |a: usize, mut b: usize| -> bool {
            loop {
                if b == a {
                    return true;
                }
                if idom[b] == b || idom[b] == UNDEF {
                    return false;
                }
                b = idom[b];
            }
        };

        // Back edges, with bodies merged per header.
        let mut headers: Vec<usize> = Vec::new();
        let mut bodies: Vec<HashSet<usize>> = Vec::new();
        for tail in 0..num_blocks {
            for &header in &succs[tail] {
                if idom[tail] != UNDEF && dominates(header, tail) {
                    let body = loop_body(header, tail, &preds);
                    match headers.iter().position(|&h| h == header) {
                        Some(i) => bodies[i].extend(body),
                        None => {
                            headers.push(header);
                            bodies.push(body);
                        }
                    }
                }
            }
        }

        // Order members header-first, then by layout; recover nesting from
        // body containment (smallest strict superset wins).
        let mut loops: Vec<NaturalLoop> = headers
            .iter()
            .zip(&bodies)
            .map(|(&header, body)| {
                let mut blocks: Vec<usize> = body.iter().copied().filter(|&b| b != header).collect();
                blocks.sort_unstable();
                blocks.insert(0, header);
                NaturalLoop { header, blocks, parent: None }
            })
            .collect();

        for i in 0..loops.len() {
            let mut parent: Option<usize> = None;
            for j in 0..loops.len() {
                if i == j || !bodies[j].contains(&loops[i].header) || bodies[j].len() <= bodies[i].len() {
                    continue;
                }
                if parent.map_or(true, |p| bodies[j].len() < bodies[p].len()) {
                    parent = Some(j);
                }
            }
            loops[i].parent = parent;
        }

        let mut innermost: Vec<Option<usize>> = vec![None; num_blocks];
        for (i, body) in bodies.iter().enumerate() {
            for &b in body {
                match innermost[b] {
                    Some(cur) if bodies[cur].len() <= body.len() => {}
                    _ => innermost[b] = Some(i),
                }
            }
        }

        LoopInfo { loops, innermost }
    }

    /// The innermost loop containing `block`, if any.
    pub fn loop_for(&self, block: usize) -> Option<usize> {
        self.innermost.get(block).copied().flatten()
    }

    pub fn get(&self, index: usize) -> &NaturalLoop {
        &self.loops[index]
    }
}

/// The body of the natural loop of back edge tail -> header: all blocks
/// that reach the tail without passing through the header.
fn loop_body(header: usize, tail: usize, preds: &[Vec<usize>]) -> HashSet<usize> {
    let mut body = HashSet::new();
    body.insert(header);
    if header == tail {
        return body;
    }
    let mut stack = vec![tail];
    body.insert(tail);
    while let Some(block) = stack.pop() {
        for &p in &preds[block] {
            if body.insert(p) {
                stack.push(p);
            }
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::parse::parse_module;

    fn loops_of(src: &str) -> (LoopInfo, usize) {
        let module = parse_module(src, "test.ll").expect("parse failed");
        let func = &module.functions[0];
        (LoopInfo::compute(func), func.blocks.len())
    }

    #[test]
    fn straight_line_has_no_loops() {
        let (info, n) = loops_of(
            "define i32 @f() {\n\
             entry:\n  br label %exit\n\
             exit:\n  ret i32 0\n}\n",
        );
        for b in 0..n {
            assert!(info.loop_for(b).is_none());
        }
    }

    #[test]
    fn single_back_edge_forms_a_loop() {
        let (info, _) = loops_of(
            "define i32 @f(i32 %n) {\n\
             entry:\n  br label %head\n\
             head:\n  %c = icmp slt i32 %n, 10\n  br i1 %c, label %body, label %exit\n\
             body:\n  br label %head\n\
             exit:\n  ret i32 0\n}\n",
        );
        // Blocks: entry=0, head=1, body=2, exit=3.
        assert!(info.loop_for(0).is_none());
        let l = info.loop_for(1).expect("header in loop");
        assert_eq!(info.loop_for(2), Some(l));
        assert!(info.loop_for(3).is_none());
        let natural = info.get(l);
        assert_eq!(natural.header, 1);
        assert_eq!(natural.blocks, vec![1, 2]);
        assert!(natural.parent.is_none());
    }

    #[test]
    fn nested_loops_recover_parent() {
        let (info, _) = loops_of(
            "define void @f(i32 %n) {\n\
             entry:\n  br label %outer\n\
             outer:\n  %c = icmp slt i32 %n, 10\n  br i1 %c, label %inner, label %exit\n\
             inner:\n  %d = icmp slt i32 %n, 5\n  br i1 %d, label %inner, label %latch\n\
             latch:\n  br label %outer\n\
             exit:\n  ret void\n}\n",
        );
        // Blocks: entry=0, outer=1, inner=2, latch=3, exit=4.
        let outer = info.loop_for(1).expect("outer header");
        let inner = info.loop_for(2).expect("inner header");
        assert_ne!(outer, inner);
        assert_eq!(info.get(inner).parent, Some(outer));
        assert!(info.get(outer).parent.is_none());
        assert_eq!(info.get(inner).blocks, vec![2]);
        assert_eq!(info.get(outer).blocks, vec![1, 2, 3]);
    }
}
