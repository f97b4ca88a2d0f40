//! SSA value load/store and the indirect load/store protocol.
//!
//! Value loads push one typed value; value stores pop one into the
//! value's local slot, truncating narrow integers first so slots always
//! hold canonical 32-bit representations. Every pointer dereference is
//! funnelled through the runtime `Memory` class, which owns the flat
//! heap.

use crate::common::types::Type;
use crate::ir::ir::{Constant, Operand};

use super::calls::get_call_signature;
use super::types::{bit_width, type_descriptor, type_postfix, type_prefix};
use super::JvmWriter;

impl<'m> JvmWriter<'m> {
    /// Push the given value onto the operand stack.
    pub(super) fn print_value_load(&mut self, v: &Operand) {
        match v {
            Operand::Const(Constant::FuncRef { name, ty }) => {
                // A function pointer is an integer issued by the runtime
                // registry for (owning class, signature).
                let fn_ty = match ty.fn_type() {
                    Some(f) => f.clone(),
                    None => panic!("Value = @{}\nInvalid function reference", name),
                };
                let sig = format!("{}{}", self.global_name(name), get_call_signature(&fn_ty));
                if self.is_extern_ref(name) {
                    self.print_simple_instruction_arg("CLASSFORMETHOD", &sig);
                } else {
                    let cls = format!("\"{}\"", self.classname);
                    self.print_simple_instruction_arg("ldc", &cls);
                }
                self.print_simple_instruction_arg("ldc", &format!("\"{}\"", sig));
                self.print_invoke_static(
                    "lljvm/runtime/Function/getFunctionPointer(Ljava/lang/String;Ljava/lang/String;)I",
                );
            }
            Operand::Const(Constant::GlobalRef { name, .. }) => {
                let field = if self.is_extern_ref(name) {
                    format!("{} I", self.global_name(name))
                } else {
                    format!("{}/{} I", self.classname, self.global_name(name))
                };
                self.print_simple_instruction_arg("getstatic", &field);
            }
            Operand::Const(Constant::Null(_)) => self.print_ptr_load(0),
            Operand::Const(Constant::Expr(e)) => self.print_constant_expr(e),
            Operand::Const(c) => self.print_const_load(c),
            Operand::Local { id, ty, .. } => {
                let slot = self.local_var_number(*id, ty);
                let prefix = type_prefix(ty, true);
                let comment = self.value_name(v);
                if slot <= 3 {
                    self.print_simple_instruction(&format!("{}load_{} ; {}", prefix, slot, comment));
                } else {
                    self.print_simple_instruction_arg(
                        &format!("{}load", prefix),
                        &format!("{} ; {}", slot, comment),
                    );
                }
            }
        }
    }

    /// Store the value on top of the stack into the local slot of `v`.
    /// Storing to a constant, global, or function is a bug in the input.
    pub(super) fn print_value_store(&mut self, v: &Operand) {
        let (id, ty) = match v {
            Operand::Local { id, ty, .. } => (*id, ty.clone()),
            other => panic!("Value = {}\nInvalid value", other),
        };
        // truncate int
        let bits = bit_width(&ty, false);
        if bits == 16 {
            self.print_simple_instruction("i2s");
        } else if bits == 8 {
            self.print_simple_instruction("i2b");
        } else if bits == 1 {
            self.print_simple_instruction("iconst_1");
            self.print_simple_instruction("iand");
        }
        let slot = self.local_var_number(id, &ty);
        let prefix = type_prefix(&ty, true);
        let comment = self.value_name(v);
        if slot <= 3 {
            self.print_simple_instruction(&format!("{}store_{} ; {}", prefix, slot, comment));
        } else {
            self.print_simple_instruction_arg(
                &format!("{}store", prefix),
                &format!("{} ; {}", slot, comment),
            );
        }
    }

    /// Load a value from the address held by `v`.
    pub(super) fn print_indirect_load(&mut self, v: &Operand) {
        self.print_value_load(v);
        let ty = v.ty();
        let ty = match ty.pointee() {
            Some(inner) => inner.clone(),
            None => ty,
        };
        self.print_indirect_load_type(&ty);
    }

    /// Load a value of the given type from the address on top of the
    /// stack.
    pub(super) fn print_indirect_load_type(&mut self, ty: &Type) {
        self.print_invoke_static(&format!(
            "lljvm/runtime/Memory/load_{}(I){}",
            type_postfix(ty, false),
            type_descriptor(ty, false)
        ));
    }

    /// Store a value at the given address.
    pub(super) fn print_indirect_store(&mut self, ptr: &Operand, val: &Operand) {
        self.print_value_load(ptr);
        self.print_value_load(val);
        self.print_invoke_static(&format!(
            "lljvm/runtime/Memory/store(I{})V",
            type_descriptor(&val.ty(), false)
        ));
    }
}
