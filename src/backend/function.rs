//! The function driver: method header, slot allocation, local
//! pre-declaration, stack-depth accounting, the loop-aware body walk,
//! and the `longjmp` catch trailer.

use log::debug;

use crate::ir::ir::{BlockId, Constant, Function, Inst, InstKind, Operand};

use super::types::{type_descriptor, type_prefix};
use super::JvmWriter;

impl<'m> JvmWriter<'m> {
    /// Allocate (and zero-initialise) the local variable holding the
    /// given instruction's result. The initialisation keeps the bytecode
    /// verifier happy on paths where the block defining the value has not
    /// run yet.
    fn print_local_variable(&mut self, inst: &Inst) {
        let ty = inst.ty.clone();
        let result = match inst.result {
            Some(id) => id,
            None => panic!("Instruction = {}\nexpected a result", inst),
        };
        let var_num = self.local_var_number(result, &ty);
        if self.debug >= 2 {
            let name = match &inst.name {
                Some(n) => format!("_{}", super::names::sanitize_name(n)),
                None => format!("_{}", var_num),
            };
            self.print_simple_instruction(&format!(
                ".var {} is {} {} from begin_method to end_method",
                var_num,
                name,
                type_descriptor(&ty, false)
            ));
        }
        let prefix = type_prefix(&ty, true);
        self.print_simple_instruction(&format!("{}const_0", prefix));
        self.print_simple_instruction_arg(&format!("{}store", prefix), &var_num.to_string());
    }

    /// Walk the function's blocks in layout order, emitting outermost
    /// loops through the loop walk and everything else directly.
    fn print_function_body(&mut self, func: &'m Function) {
        for index in 0..func.blocks.len() {
            match self.loop_info.loop_for(index) {
                Some(l) => {
                    let (header, parent) = {
                        let natural = self.loop_info.get(l);
                        (natural.header, natural.parent)
                    };
                    if header == index && parent.is_none() {
                        self.print_loop(l);
                    }
                }
                None => self.print_basic_block(BlockId(index as u32)),
            }
        }
    }

    /// Print the block that catches `Jump` objects thrown by `longjmp`:
    /// compare the jump id against every stored `setjmp` id and re-enter
    /// at the matching marker, rethrowing when none matches.
    fn print_catch_jump(&mut self, num_jumps: u32) {
        let jump_var = self.used_registers;
        self.used_registers += 1;
        self.print_simple_instruction(
            ".catch lljvm/runtime/Jump from begin_method to catch_jump using catch_jump",
        );
        self.print_label("catch_jump");
        self.print_simple_instruction_arg("astore", &jump_var.to_string());
        self.print_simple_instruction_arg("aload", &jump_var.to_string());
        self.print_simple_instruction_arg("getfield", "lljvm/runtime/Jump/value I");
        for i in (jump_var - num_jumps)..jump_var {
            if self.debug >= 2 {
                self.print_simple_instruction(&format!(
                    ".var {} is setjmp_id_{} I from begin_method to end_method",
                    i, i
                ));
            }
            self.print_simple_instruction_arg("aload", &jump_var.to_string());
            self.print_simple_instruction_arg("getfield", "lljvm/runtime/Jump/id I");
            self.print_simple_instruction_arg("iload", &i.to_string());
            self.print_simple_instruction_arg("if_icmpeq", &format!("setjmp${}", i));
        }
        self.print_simple_instruction("pop");
        self.print_simple_instruction_arg("aload", &jump_var.to_string());
        self.print_simple_instruction("athrow");
        if self.debug >= 2 {
            self.print_simple_instruction(&format!(
                ".var {} is jump Llljvm/runtime/Jump; from begin_method to end_method",
                jump_var
            ));
        }
    }

    /// Print the given function definition.
    pub(super) fn print_function(&mut self, func: &'m Function) {
        debug!("emitting method for @{}", func.name);
        self.reset_for_function(func);

        self.out.emit("");
        let mut header = format!(
            ".method {} static {}(",
            if func.linkage.is_local() { "private" } else { "public" },
            self.global_name(&func.name)
        );
        for param in &func.params {
            header.push_str(&type_descriptor(&param.ty, false));
        }
        if func.vararg {
            header.push('I');
        }
        header.push(')');
        header.push_str(&type_descriptor(&func.ret, false));
        self.out.emit(&header);

        for param in &func.params {
            let var_num = self.local_var_number(param.id, &param.ty);
            if self.debug >= 2 {
                let name = match &param.name {
                    Some(n) => format!("_{}", super::names::sanitize_name(n)),
                    None => format!("_{}", var_num),
                };
                self.print_simple_instruction(&format!(
                    ".var {} is {} {} from begin_method to end_method",
                    var_num,
                    name,
                    type_descriptor(&param.ty, false)
                ));
            }
        }
        if func.vararg {
            let var_num = self.used_registers;
            self.used_registers += 1;
            self.va_arg_num = Some(var_num);
            if self.debug >= 2 {
                self.print_simple_instruction(&format!(
                    ".var {} is varargptr I from begin_method to end_method",
                    var_num
                ));
            }
        }

        // Pre-walk: stack-depth upper bound, a zero-initialised local for
        // every result, and the number of setjmp call sites.
        let mut stack_depth: usize = 8;
        let mut num_jumps: u32 = 0;
        for block in &func.blocks {
            for inst in &block.insts {
                stack_depth = stack_depth.max(inst.operand_count());
                if !inst.ty.is_void() {
                    self.print_local_variable(inst);
                }
                if let InstKind::Call { callee: Operand::Const(Constant::FuncRef { name, .. }), .. } =
                    &inst.kind
                {
                    if name == "setjmp" {
                        num_jumps += 1;
                    }
                }
            }
        }

        // initialise jump ids to prevent class verification errors
        for i in 0..num_jumps {
            self.print_simple_instruction("iconst_0");
            self.print_simple_instruction_arg("istore", &(self.used_registers + i).to_string());
        }

        self.print_label("begin_method");
        self.print_invoke_static("lljvm/runtime/Memory/createStackFrame()V");
        self.print_function_body(func);
        if num_jumps > 0 {
            self.print_catch_jump(num_jumps);
        }
        self.print_simple_instruction_arg(".limit stack", &(stack_depth * 2).to_string());
        self.print_simple_instruction_arg(".limit locals", &self.used_registers.to_string());
        self.print_label("end_method");
        self.out.emit(".end method");
    }
}
