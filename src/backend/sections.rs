//! Module-level emission: class header, field declarations, external
//! methods, the constructor, the class initialiser, and the `main`
//! trampoline.

use crate::common::types::Type;
use crate::ir::ir::{Global, Module};

use super::calls::get_call_signature;
use super::types::type_descriptor;
use super::JvmWriter;

impl<'m> JvmWriter<'m> {
    /// Emit the module-level sections in order. This runs before any
    /// function body and populates `extern_refs` as a side effect of the
    /// field and external-method listings.
    pub(super) fn print_module_sections(&mut self) {
        self.print_header();
        self.print_fields();
        self.print_external_methods();
        self.print_constructor();
        self.print_clinit();
        self.print_main_method();
    }

    fn print_header(&mut self) {
        if self.debug >= 1 {
            self.out.emit_fmt(format_args!(".source {}", self.sourcename));
        }
        self.out.emit_fmt(format_args!(".class public final {}", self.classname));
        self.out.emit(".super java/lang/Object");
        self.out.emit(".implements lljvm/runtime/CustomLibrary");
        self.out.emit("");
    }

    /// One integer field per concrete global (its address in the flat
    /// heap); declared globals become `.extern field` and are recorded as
    /// external references.
    fn print_fields(&mut self) {
        self.out.emit("; Fields");
        self.out.emit(".field private final __env Llljvm/runtime/Environment;");
        let module = self.module;
        for global in &module.globals {
            let descriptor = type_descriptor(&global.ty.clone().pointer_to(), false);
            let mut line = if global.is_declaration() {
                self.extern_refs.insert(global.name.clone());
                format!(".extern field {} {}", self.global_name(&global.name), descriptor)
            } else {
                format!(
                    ".field {} static final {} {}",
                    if global.linkage.is_local() { "private" } else { "public" },
                    self.global_name(&global.name),
                    descriptor
                )
            };
            if self.debug >= 3 {
                line.push_str(&format!(" ; @{} = global {}", global.name, global.ty));
            }
            self.out.emit(&line);
        }
        self.out.emit("");
    }

    fn print_external_methods(&mut self) {
        self.out.emit("; External methods");
        let module = self.module;
        for func in &module.functions {
            if func.is_declaration() && !func.is_intrinsic() {
                let sig = get_call_signature(&func.fn_type());
                let mut line =
                    format!(".extern method {}{}", self.global_name(&func.name), sig);
                if self.debug >= 3 {
                    line.push_str(&format!(" ; {}", Type::Func(Box::new(func.fn_type()))));
                }
                self.out.emit(&line);
                self.extern_refs.insert(func.name.clone());
            }
        }
        self.out.emit("");
    }

    fn print_constructor(&mut self) {
        self.out.emit("; Constructor");
        self.out.emit(".method public <init>()V");
        self.print_simple_instruction("aload_0");
        self.print_simple_instruction_arg("invokespecial", "java/lang/Object/<init>()V");
        self.print_simple_instruction("return");
        self.out.emit(".end method");
        self.out.emit("");
    }

    /// The class initialiser: store the environment, allocate heap space
    /// for every concrete global, then pack the constant initialisers.
    fn print_clinit(&mut self) {
        self.out
            .emit(".method public initialiseEnvironment(Llljvm/runtime/Environment;)V");
        self.print_simple_instruction(".limit stack 5");
        self.print_simple_instruction(".limit locals 2");

        self.out.emit("");
        self.out.emit("\t; load environment into class");
        self.print_simple_instruction("aload_0");
        self.print_simple_instruction("aload_1");
        let putfield = format!("putfield {}/__env Llljvm/runtime/Environment;", self.classname);
        self.print_simple_instruction(&putfield);

        self.out.emit("");
        self.out.emit("\t; allocate global variables");
        let module = self.module;
        for global in concrete_globals(module) {
            let init = global.init.as_ref().expect("concrete global has an initializer");
            let size = self.target.type_alloc_size(&init.ty());
            self.print_const_load_int(32, size as u32 as i32 as i64);
            self.print_invoke_static("lljvm/runtime/Memory/allocateData(I)I");
            let field = format!("{}/{} I", self.classname, self.global_name(&global.name));
            self.print_simple_instruction_arg("putstatic", &field);
        }

        self.out.emit("");
        self.out.emit("\t; initialise global variables");
        for global in concrete_globals(module) {
            let init = global.init.as_ref().expect("concrete global has an initializer");
            let field = format!("{}/{} I", self.classname, self.global_name(&global.name));
            self.print_simple_instruction_arg("getstatic", &field);
            self.print_static_constant(init);
            self.print_simple_instruction("pop");
            self.out.emit("");
        }

        self.print_simple_instruction("return");
        self.out.emit(".end method");
        self.out.emit("");
    }

    /// The `main` trampoline: instantiate the class, wire it into a fresh
    /// `Environment`, call `main`, and hand the result to the C library's
    /// `exit`.
    fn print_main_method(&mut self) {
        let module = self.module;
        let func = match module.get_function("main") {
            Some(f) if !f.is_declaration() => f,
            _ => return,
        };

        self.out.emit(".method public static main([Ljava/lang/String;)V");
        self.print_simple_instruction(".limit stack 6");
        self.print_simple_instruction(".limit locals 2");

        self.out.emit("");
        self.out.emit("\t; create an instance of this class and register it");
        self.print_simple_instruction_arg("new", &self.classname.clone());
        self.print_simple_instruction("dup");
        let ctor = format!("{}/<init>()V", self.classname);
        self.print_simple_instruction_arg("invokespecial", &ctor);
        self.print_simple_instruction("astore_1");
        self.print_simple_instruction_arg("new", "lljvm/runtime/Environment");
        self.print_simple_instruction("dup");
        self.print_simple_instruction_arg("invokespecial", "lljvm/runtime/Environment/<init>()V");
        self.print_simple_instruction("dup");
        self.print_simple_instruction("aload_1");
        self.print_simple_instruction_arg(
            "invokevirtual",
            "lljvm/runtime/Environment/loadCustomLibrary(Llljvm/runtime/CustomLibrary;)V",
        );

        self.out.emit("");
        self.out.emit("\t; call the entry point");
        let sig = match func.params.len() {
            0 => format!("{}/{}()I", self.classname, self.global_name("main")),
            2 => {
                if !func.params[0].ty.is_integer() || !func.params[1].ty.is_pointer() {
                    panic!("main function has invalid type signature");
                }
                self.print_simple_instruction("aload_0");
                self.print_simple_instruction("arraylength");
                self.print_simple_instruction("aload_0");
                self.print_invoke_static("lljvm/runtime/Memory/storeStack([Ljava/lang/String;)I");
                format!(
                    "{}/{}({}{})I",
                    self.classname,
                    self.global_name("main"),
                    type_descriptor(&func.params[0].ty, false),
                    type_descriptor(&func.params[1].ty, false)
                )
            }
            _ => panic!("main function has invalid number of arguments"),
        };
        self.print_invoke_static(&sig);

        self.out.emit("");
        self.out.emit("\t; pass the result to exit()");
        self.print_simple_instruction("swap");
        self.print_simple_instruction_arg("ldc", "\"lljvm/lib/c\"");
        self.print_simple_instruction_arg(
            "invokevirtual",
            "lljvm/runtime/Environment/getInstanceByName(Ljava/lang/String;)Llljvm/runtime/CustomLibrary;",
        );
        self.print_simple_instruction_arg("checkcast", "lljvm/lib/c");
        self.print_simple_instruction("swap");
        self.print_simple_instruction_arg("invokevirtual", "lljvm/lib/c/exit(I)V");
        self.print_simple_instruction("return");
        self.out.emit(".end method");
    }
}

fn concrete_globals(module: &Module) -> impl Iterator<Item = &Global> {
    module.globals.iter().filter(|g| !g.is_declaration())
}
