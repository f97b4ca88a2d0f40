//! Control-flow emission: φ-copies at edges, branches, select, switch,
//! and the natural-loop block walk.

use crate::ir::ir::{BlockId, Constant, Inst, InstKind, Operand};

use super::JvmWriter;

/// The operand denoting an instruction's own result.
pub(super) fn result_operand(inst: &Inst) -> Operand {
    match inst.result {
        Some(id) => Operand::Local {
            id,
            ty: inst.ty.clone(),
            name: inst.name.clone(),
        },
        None => panic!("Instruction = {}\ninstruction has no result", inst),
    }
}

impl<'m> JvmWriter<'m> {
    /// Lower the φ-nodes of `dest` for the edge from `src`: one
    /// load-then-store per φ, in the order the φs appear. Undefined
    /// incoming values are skipped. Cyclic parallel copies are assumed to
    /// have been broken by earlier passes.
    pub(super) fn print_phi_copy(&mut self, src: BlockId, dest: BlockId) {
        let func = self.func();
        for phi in func.block(dest).phis() {
            let incoming = match &phi.kind {
                InstKind::Phi { incoming } => incoming,
                _ => unreachable!(),
            };
            let val = match incoming.iter().find(|entry| entry.1 == src) {
                Some(entry) => &entry.0,
                None => panic!("Instruction = {}\nno incoming value for predecessor", phi),
            };
            if matches!(val, Operand::Const(Constant::Undef(_))) {
                continue;
            }
            self.print_value_load(val);
            self.print_value_store(&result_operand(phi));
        }
    }

    /// Print an unconditional branch from `cur` to `dest`.
    pub(super) fn print_branch_to(&mut self, cur: BlockId, dest: BlockId) {
        self.print_phi_copy(cur, dest);
        let label = self.label_name(dest);
        self.print_simple_instruction_arg("goto", &label);
    }

    /// Print a conditional branch; the condition is on top of the stack.
    /// When the true successor begins with a φ, an intermediate
    /// `$phi<uid>` block performs its copy-in so the fall-through copies
    /// are not executed on the true path.
    pub(super) fn print_cond_branch_to(&mut self, cur: BlockId, on_true: BlockId, on_false: BlockId) {
        if on_true == on_false {
            self.print_simple_instruction("pop");
            self.print_branch_to(cur, on_true);
            return;
        }
        let func = self.func();
        let true_has_phi = func.block(on_true).starts_with_phi();
        let false_has_phi = func.block(on_false).starts_with_phi();

        let mut labelname = self.label_name(on_true);
        if true_has_phi {
            labelname = format!("{}$phi{}", labelname, self.get_uid());
        }
        self.print_simple_instruction_arg("ifne", &labelname);

        if false_has_phi {
            self.print_phi_copy(cur, on_false);
        }
        let false_label = self.label_name(on_false);
        self.print_simple_instruction_arg("goto", &false_label);

        if true_has_phi {
            self.print_label(&labelname);
            self.print_phi_copy(cur, on_true);
            let true_label = self.label_name(on_true);
            self.print_simple_instruction_arg("goto", &true_label);
        }
    }

    /// Print a branch instruction.
    pub(super) fn print_branch_instruction(&mut self, cur: BlockId, inst: &Inst) {
        match &inst.kind {
            InstKind::Br { dest } => self.print_branch_to(cur, *dest),
            InstKind::CondBr { cond, on_true, on_false } => {
                self.print_value_load(cond);
                self.print_cond_branch_to(cur, *on_true, *on_false);
            }
            _ => unreachable!(),
        }
    }

    /// Print a select: branch over the two value loads, leaving the
    /// chosen value on the stack.
    pub(super) fn print_select_instruction(
        &mut self,
        cond: &Operand,
        on_true: &Operand,
        on_false: &Operand,
    ) {
        let labelname = format!("select{}", self.get_uid());
        self.print_value_load(cond);
        self.print_simple_instruction_arg("ifeq", &format!("{}a", labelname));
        self.print_value_load(on_true);
        self.print_simple_instruction_arg("goto", &format!("{}b", labelname));
        self.print_label(&format!("{}a", labelname));
        self.print_value_load(on_false);
        self.print_label(&format!("{}b", labelname));
    }

    /// Print a switch as a `lookupswitch` with cases in ascending order.
    /// Successors beginning with φ-nodes are assumed to have been split
    /// by the host pipeline's switch-lowering pass; no copy-ins are
    /// emitted on these edges.
    pub(super) fn print_switch_instruction(
        &mut self,
        cond: &Operand,
        default: BlockId,
        cases: &[(i64, BlockId)],
    ) {
        let mut sorted: Vec<(i64, BlockId)> = cases.to_vec();
        sorted.sort_by_key(|(value, _)| *value);

        self.print_value_load(cond);
        self.out.emit("\tlookupswitch");
        for (value, target) in sorted {
            let label = self.label_name(target);
            self.out.emit_fmt(format_args!("\t\t{} : {}", value, label));
        }
        let label = self.label_name(default);
        self.out.emit_fmt(format_args!("\t\tdefault : {}", label));
    }

    /// Print a natural loop: member blocks whose innermost loop is this
    /// one directly, child loops recursively, then the back-edge `goto`.
    /// The header is the first member block, so the block walk labels it
    /// exactly once.
    pub(super) fn print_loop(&mut self, loop_index: usize) {
        let (header, blocks) = {
            let l = self.loop_info.get(loop_index);
            (l.header, l.blocks.clone())
        };
        for block in blocks {
            match self.loop_info.loop_for(block) {
                Some(inner) if inner == loop_index => {
                    self.print_basic_block(BlockId(block as u32));
                }
                Some(inner) => {
                    let (inner_header, inner_parent) = {
                        let l = self.loop_info.get(inner);
                        (l.header, l.parent)
                    };
                    if inner_header == block && inner_parent == Some(loop_index) {
                        // this block heads an immediate child loop
                        self.print_loop(inner);
                    }
                }
                None => {}
            }
        }
        let header_label = self.label_name(BlockId(header as u32));
        self.print_simple_instruction_arg("goto", &header_label);
    }
}
