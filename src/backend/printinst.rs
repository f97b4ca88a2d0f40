//! Small emission primitives: mnemonic lines, labels, binary operations,
//! and the virtual instructions supplied by the runtime `Instruction`
//! class.

use crate::ir::ir::Operand;

use super::JvmWriter;

impl<'m> JvmWriter<'m> {
    /// Print a single mnemonic line.
    pub(super) fn print_simple_instruction(&mut self, inst: &str) {
        self.out.emit_fmt(format_args!("\t{}", inst));
    }

    /// Print a mnemonic line with one operand.
    pub(super) fn print_simple_instruction_arg(&mut self, inst: &str, operand: &str) {
        self.out.emit_fmt(format_args!("\t{} {}", inst, operand));
    }

    /// Print an `invokestatic` of a symbolic method reference.
    pub(super) fn print_invoke_static(&mut self, sig: &str) {
        self.print_simple_instruction_arg("invokestatic", sig);
    }

    /// Load both operands and print the given instruction.
    pub(super) fn print_binary_instruction(&mut self, name: &str, left: &Operand, right: &Operand) {
        self.print_value_load(left);
        self.print_value_load(right);
        self.out.emit_fmt(format_args!("\t{}", name));
    }

    /// Print the virtual instruction with the given signature.
    pub(super) fn print_virtual_instruction(&mut self, sig: &str) {
        self.out
            .emit_fmt(format_args!("\tinvokestatic lljvm/runtime/Instruction/{}", sig));
    }

    /// Load the operand and print the virtual instruction.
    pub(super) fn print_virtual_instruction_unary(&mut self, sig: &str, operand: &Operand) {
        self.print_value_load(operand);
        self.print_virtual_instruction(sig);
    }

    /// Load both operands and print the virtual instruction.
    pub(super) fn print_virtual_instruction_binary(
        &mut self,
        sig: &str,
        left: &Operand,
        right: &Operand,
    ) {
        self.print_value_load(left);
        self.print_value_load(right);
        self.print_virtual_instruction(sig);
    }

    /// Print a label line.
    pub(super) fn print_label(&mut self, label: &str) {
        self.out.emit_fmt(format_args!("{}:", label));
    }
}
