//! The block driver: label, per-instruction dispatch, `.line` markers,
//! and the trailing store of each non-void result.
//!
//! φ-nodes never emit code at their own position; their copy-ins are
//! performed on every incoming edge by the branch emission.

use crate::ir::ir::{BlockId, Inst, InstKind};

use super::branch::result_operand;
use super::types::type_prefix;
use super::JvmWriter;

impl<'m> JvmWriter<'m> {
    /// Print the given basic block.
    pub(super) fn print_basic_block(&mut self, block_id: BlockId) {
        let label = self.label_name(block_id);
        self.print_label(&label);
        let func = self.func();
        for inst in &func.block(block_id).insts {
            self.inst_num += 1;
            if self.debug >= 3 {
                // print the instruction as a comment; continuation lines
                // keep the ';' prefix
                let text = inst.to_string();
                for line in text.split('\n') {
                    self.out.emit_fmt(format_args!(";{}", line));
                }
            }
            if self.debug >= 1 {
                self.print_simple_instruction_arg(".line", &self.inst_num.to_string());
            }

            if inst.is_phi() {
                // don't handle phi instructions in the current block
                continue;
            }
            self.print_instruction(block_id, inst);
            if !inst.ty.is_void() && !matches!(inst.kind, InstKind::Invoke { .. }) {
                // invoke stores its return value itself
                self.print_value_store(&result_operand(inst));
            }
        }
    }

    /// Dispatch one instruction to its lowering.
    fn print_instruction(&mut self, block_id: BlockId, inst: &Inst) {
        match &inst.kind {
            InstKind::Ret { value } => {
                self.print_invoke_static("lljvm/runtime/Memory/destroyStackFrame()V");
                match value {
                    Some(v) => {
                        self.print_value_load(v);
                        let prefix = type_prefix(&v.ty(), true);
                        self.print_simple_instruction(&format!("{}return", prefix));
                    }
                    None => self.print_simple_instruction("return"),
                }
            }
            InstKind::Unwind => {
                self.print_simple_instruction_arg(
                    "getstatic",
                    "lljvm/runtime/Instruction$Unwind/instance Llljvm/runtime/Instruction$Unwind;",
                );
                self.print_simple_instruction("athrow");
            }
            InstKind::Unreachable => {
                self.print_simple_instruction_arg(
                    "getstatic",
                    "lljvm/runtime/Instruction$Unreachable/instance Llljvm/runtime/Instruction$Unreachable;",
                );
                self.print_simple_instruction("athrow");
            }
            InstKind::Binary { op, lhs, rhs } => self.print_arithmetic_instruction(*op, lhs, rhs),
            InstKind::Cast { op, value } => {
                let src_ty = value.ty();
                self.print_cast_instruction(*op, value, &inst.ty, &src_ty);
            }
            InstKind::Cmp { pred, lhs, rhs } => self.print_cmp_instruction(*pred, lhs, rhs),
            InstKind::Br { .. } | InstKind::CondBr { .. } => {
                self.print_branch_instruction(block_id, inst);
            }
            InstKind::Select { cond, on_true, on_false } => {
                self.print_select_instruction(cond, on_true, on_false);
            }
            InstKind::Load { ptr } => self.print_indirect_load(ptr),
            InstKind::Store { val, ptr } => self.print_indirect_store(ptr, val),
            InstKind::Gep { base, indices } => self.print_gep_instruction(base, indices),
            InstKind::Call { .. } => self.print_call_instruction(inst),
            InstKind::Invoke { .. } => self.print_invoke_instruction(block_id, inst),
            InstKind::Switch { cond, default, cases } => {
                self.print_switch_instruction(cond, *default, cases);
            }
            InstKind::Alloca { allocated, count } => {
                self.print_alloca_instruction(allocated, count);
            }
            InstKind::VaArg { list } => self.print_va_arg_instruction(list, &inst.ty),
            InstKind::Phi { .. } => unreachable!("phi emitted at its position"),
        }
    }
}
