//! Call emission: direct and indirect calls, the variadic operand pack,
//! the `setjmp` marker protocol, intrinsic dispatch, and `invoke`
//! try/catch regions.

use crate::common::types::FuncType;
use crate::ir::ir::{BlockId, Constant, Inst, InstKind, Operand};

use super::branch::result_operand;
use super::types::{type_descriptor, type_postfix};
use super::JvmWriter;

/// The call signature of a function type, in `(params…)return` syntax.
/// An empty string is returned for a non-prototyped function (varargs
/// with no fixed parameters).
pub(super) fn get_call_signature(ty: &FuncType) -> String {
    if ty.vararg && ty.params.is_empty() {
        // non-prototyped function
        return String::new();
    }
    let mut sig = String::from("(");
    for param in &ty.params {
        sig.push_str(&type_descriptor(param, false));
    }
    if ty.vararg {
        sig.push('I');
    }
    sig.push(')');
    sig.push_str(&type_descriptor(&ty.ret, false));
    sig
}

impl<'m> JvmWriter<'m> {
    /// Pack the given operands into a freshly allocated on-stack area,
    /// leaving its address on top of the stack. `pack` returns the
    /// advanced address, so the running pointer chains through the calls
    /// and is popped at the end.
    pub(super) fn print_operand_pack(&mut self, operands: &[Operand]) {
        let size: u64 = operands
            .iter()
            .map(|op| self.target.type_alloc_size(&op.ty()))
            .sum();

        self.print_simple_instruction_arg("bipush", &size.to_string());
        self.print_invoke_static("lljvm/runtime/Memory/allocateStack(I)I");
        self.print_simple_instruction("dup");

        for op in operands {
            self.print_value_load(op);
            self.print_invoke_static(&format!(
                "lljvm/runtime/Memory/pack(I{})I",
                type_descriptor(&op.ty(), false)
            ));
        }
        self.print_simple_instruction("pop");
    }

    /// Print a direct or indirect call.
    pub(super) fn print_function_call(&mut self, callee: &Operand, args: &[Operand]) {
        if let Operand::Const(Constant::FuncRef { name, ty }) = callee {
            // direct call
            let fn_ty = match ty.fn_type() {
                Some(f) => f.clone(),
                None => panic!("Value = @{}\nInvalid callee", name),
            };
            for arg in args.iter().take(fn_ty.params.len()) {
                self.print_value_load(arg);
            }
            if fn_ty.vararg {
                self.print_operand_pack(&args[fn_ty.params.len()..]);
            }

            let sig = format!("{}{}", self.global_name(name), get_call_signature(&fn_ty));
            if self.is_extern_ref(name) {
                self.print_invoke_static(&sig);
            } else {
                let qualified = format!("{}/{}", self.classname, sig);
                self.print_invoke_static(&qualified);
            }

            if name == "setjmp" {
                // The jump id is parked in a fresh slot and the call
                // itself reports 0; longjmp re-enters at the marker label
                // through the catch-jump trailer.
                let var_num = self.used_registers;
                self.used_registers += 1;
                self.print_simple_instruction_arg("istore", &var_num.to_string());
                self.print_simple_instruction("iconst_0");
                self.print_label(&format!("setjmp${}", var_num));
            }
        } else {
            // indirect call
            self.print_value_load(callee);
            let ret = match callee.ty().fn_type() {
                Some(f) => f.ret.clone(),
                None => panic!("Value = {}\nInvalid callee", callee),
            };
            self.print_operand_pack(args);
            self.print_invoke_static(&format!(
                "lljvm/runtime/Function/invoke_{}(II){}",
                type_postfix(&ret, false),
                type_descriptor(&ret, false)
            ));
        }
    }

    /// Print a call instruction, dispatching intrinsics by name.
    pub(super) fn print_call_instruction(&mut self, inst: &Inst) {
        let (callee, args) = match &inst.kind {
            InstKind::Call { callee, args } => (callee, args),
            _ => unreachable!(),
        };
        if let Operand::Const(Constant::FuncRef { name, .. }) = callee {
            if let Some(rest) = name.strip_prefix("llvm.") {
                self.print_intrinsic_call(rest, args, inst);
                return;
            }
        }
        self.print_function_call(callee, args);
    }

    /// Print a call to an intrinsic function. `name` is the intrinsic
    /// name with the `llvm.` prefix stripped (overload suffixes remain).
    fn print_intrinsic_call(&mut self, name: &str, args: &[Operand], inst: &Inst) {
        let family = name.split('.').next().unwrap_or(name);
        match family {
            "va_start" | "va_copy" | "va_end" => self.print_va_intrinsic(family, args),
            "memcpy" | "memmove" | "memset" => self.print_mem_intrinsic(family, args),
            "flt" => self.print_simple_instruction("iconst_m1"),
            "dbg" => {} // ignore debugging intrinsics
            "pow" | "exp" | "log" | "log10" | "sqrt" => self.print_math_intrinsic(family, args),
            "bswap" => self.print_bit_intrinsic(args),
            _ => panic!("Intrinsic = {}\nInvalid intrinsic function", inst),
        }
    }

    /// Print an invoke: the call wrapped in a `.catch` region for the
    /// runtime's unwind sentinel.
    pub(super) fn print_invoke_instruction(&mut self, block_id: BlockId, inst: &Inst) {
        let (callee, args, normal, unwind) = match &inst.kind {
            InstKind::Invoke { callee, args, normal, unwind } => (callee, args, *normal, *unwind),
            _ => unreachable!(),
        };
        let labelname = format!("{}$invoke", self.get_uid());
        self.print_label(&format!("{}_begin", labelname));
        self.print_function_call(callee, args);
        if !inst.ty.is_void() {
            self.print_value_store(&result_operand(inst)); // save return value
        }
        self.print_label(&format!("{}_end", labelname));
        self.print_branch_to(block_id, normal);
        self.print_label(&format!("{}_catch", labelname));
        self.print_simple_instruction("pop");
        self.print_branch_to(block_id, unwind);
        self.print_simple_instruction_arg(
            ".catch lljvm/runtime/System$Unwind",
            &format!(
                "from {}_begin to {}_end using {}_catch",
                labelname, labelname, labelname
            ),
        );
    }
}
