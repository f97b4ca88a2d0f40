//! Constant loading and static-initializer packing.
//!
//! Literal loads pick the shortest instruction for the value. Static
//! constants are written into the flat heap through `Memory.pack`, which
//! returns the first address past the written value so packing chains;
//! `Memory.zero` behaves the same way for `zeroinitializer` regions.

use crate::common::types::Type;
use crate::ir::ir::{Constant, ConstExpr, ConstExprKind, Operand};

use super::types::type_descriptor;
use super::JvmWriter;

impl<'m> JvmWriter<'m> {
    /// Load a pointer constant. Pointers are 32-bit heap addresses.
    pub(super) fn print_ptr_load(&mut self, n: u64) {
        if self.target.pointer_size() != 32 {
            panic!("Only 32-bit pointers are allowed");
        }
        self.print_const_load_int(32, n as u32 as i32 as i64);
    }

    /// Load an integer constant, choosing the shortest instruction.
    pub(super) fn print_const_load_int(&mut self, bits: u32, value: i64) {
        if bits <= 32 {
            if value == -1 {
                self.print_simple_instruction("iconst_m1");
            } else if (0..=5).contains(&value) {
                self.print_simple_instruction(&format!("iconst_{}", value));
            } else if (-0x80..=0x7f).contains(&value) {
                self.print_simple_instruction_arg("bipush", &value.to_string());
            } else if (-0x8000..=0x7fff).contains(&value) {
                self.print_simple_instruction_arg("sipush", &value.to_string());
            } else {
                self.print_simple_instruction_arg("ldc", &value.to_string());
            }
        } else if value == 0 {
            self.print_simple_instruction("lconst_0");
        } else if value == 1 {
            self.print_simple_instruction("lconst_1");
        } else {
            self.print_simple_instruction_arg("ldc2_w", &value.to_string());
        }
    }

    /// Load a single-precision float constant.
    pub(super) fn print_const_load_float(&mut self, f: f32) {
        if f == 0.0 {
            self.print_simple_instruction("fconst_0");
        } else if f == 1.0 {
            self.print_simple_instruction("fconst_1");
        } else if f == 2.0 {
            self.print_simple_instruction("fconst_2");
        } else if f.is_nan() {
            self.print_simple_instruction_arg("getstatic", "java/lang/Float/NaN F");
        } else if f.is_infinite() && f > 0.0 {
            self.print_simple_instruction_arg("getstatic", "java/lang/Float/POSITIVE_INFINITY F");
        } else if f.is_infinite() {
            self.print_simple_instruction_arg("getstatic", "java/lang/Float/NEGATIVE_INFINITY F");
        } else {
            self.print_simple_instruction_arg("ldc", &format!("{:?}", f));
        }
    }

    /// Load a double-precision float constant.
    pub(super) fn print_const_load_double(&mut self, d: f64) {
        if d == 0.0 {
            self.print_simple_instruction("dconst_0");
        } else if d == 1.0 {
            self.print_simple_instruction("dconst_1");
        } else if d.is_nan() {
            self.print_simple_instruction_arg("getstatic", "java/lang/Double/NaN D");
        } else if d.is_infinite() && d > 0.0 {
            self.print_simple_instruction_arg("getstatic", "java/lang/Double/POSITIVE_INFINITY D");
        } else if d.is_infinite() {
            self.print_simple_instruction_arg("getstatic", "java/lang/Double/NEGATIVE_INFINITY D");
        } else {
            self.print_simple_instruction_arg("ldc2_w", &format!("{:?}", d));
        }
    }

    /// Load a scalar constant.
    pub(super) fn print_const_load(&mut self, c: &Constant) {
        match c {
            Constant::Int { bits, value } => self.print_const_load_int(*bits, *value),
            Constant::Float(f) => self.print_const_load_float(*f),
            Constant::Double(d) => self.print_const_load_double(*d),
            Constant::Undef(_) => self.print_ptr_load(0),
            other => panic!("Constant = {}\nInvalid constant value", other),
        }
    }

    /// Load a string constant. For C strings the trailing NUL is dropped
    /// and ordinary escapes are used; otherwise each byte is emitted as a
    /// `\u00XX` escape so the exact bytes survive the class-file round
    /// trip.
    pub(super) fn print_string_load(&mut self, bytes: &[u8], cstring: bool) {
        let mut line = String::from("\tldc \"");
        if cstring {
            for &b in &bytes[..bytes.len() - 1] {
                match b {
                    b'\\' => line.push_str("\\\\"),
                    0x08 => line.push_str("\\b"),
                    b'\t' => line.push_str("\\t"),
                    b'\n' => line.push_str("\\n"),
                    0x0c => line.push_str("\\f"),
                    b'\r' => line.push_str("\\r"),
                    b'"' => line.push_str("\\\""),
                    b'\'' => line.push_str("\\'"),
                    _ => line.push(b as char),
                }
            }
        } else {
            for &b in bytes {
                line.push_str(&format!("\\u00{:X}{:X}", (b >> 4) & 0xf, b & 0xf));
            }
        }
        line.push('"');
        self.out.emit(&line);
    }

    /// Store a static constant to the address on top of the stack, leaving
    /// the first address past the constant on the stack afterwards.
    pub(super) fn print_static_constant(&mut self, c: &Constant) {
        if matches!(c, Constant::Zero(_)) {
            // zero initialised region
            self.print_ptr_load(self.target.type_alloc_size(&c.ty()));
            self.print_invoke_static("lljvm/runtime/Memory/zero(II)I");
            return;
        }
        let ty = c.ty();
        let type_descriptor = type_descriptor(&ty, false);
        match &ty {
            Type::Int(_) | Type::Float | Type::Double => {
                self.print_const_load(c);
                self.print_invoke_static(&format!("lljvm/runtime/Memory/pack(I{})I", type_descriptor));
            }
            Type::Array(..) | Type::Vector(..) | Type::Struct(_) => match c {
                Constant::Str { bytes, .. } => {
                    let cstring = Constant::is_cstring(bytes);
                    self.print_string_load(bytes, cstring);
                    if cstring {
                        self.print_invoke_static("lljvm/runtime/Memory/pack(ILjava/lang/String;)I");
                    } else {
                        self.print_simple_instruction_arg(
                            "invokevirtual",
                            "java/lang/String/toCharArray()[C",
                        );
                        self.print_invoke_static("lljvm/runtime/Memory/pack(I[C)I");
                    }
                }
                Constant::Aggregate { elems, .. } => {
                    for elem in elems {
                        self.print_static_constant(elem);
                    }
                }
                other => panic!("Constant = {}\nInvalid type in printStaticConstant()", other),
            },
            Type::Pointer(_) => {
                match c {
                    Constant::FuncRef { .. } | Constant::GlobalRef { .. } => {
                        // initialise with the address of the referent
                        self.print_value_load(&Operand::Const(c.clone()));
                    }
                    Constant::Null(_) => self.print_simple_instruction("iconst_0"),
                    Constant::Expr(e) => self.print_constant_expr(e),
                    other => panic!("Constant = {}\nInvalid static initializer", other),
                }
                self.print_invoke_static(&format!("lljvm/runtime/Memory/pack(I{})I", type_descriptor));
            }
            other => panic!("TypeID = {}\nInvalid type in printStaticConstant()", other),
        }
    }

    /// Lower a constant expression through the ordinary instruction
    /// lowering for its opcode.
    pub(super) fn print_constant_expr(&mut self, ce: &ConstExpr) {
        match &ce.kind {
            ConstExprKind::Cast { op, value } => {
                let src_ty = value.ty();
                self.print_cast_instruction(*op, &Operand::Const(value.clone()), &ce.ty, &src_ty);
            }
            ConstExprKind::Binary { op, lhs, rhs } => {
                self.print_arithmetic_instruction(
                    *op,
                    &Operand::Const(lhs.clone()),
                    &Operand::Const(rhs.clone()),
                );
            }
            ConstExprKind::Cmp { pred, lhs, rhs } => {
                self.print_cmp_instruction(
                    *pred,
                    &Operand::Const(lhs.clone()),
                    &Operand::Const(rhs.clone()),
                );
            }
            ConstExprKind::Gep { base, indices } => {
                let base = Operand::Const(base.clone());
                let indices: Vec<Operand> =
                    indices.iter().cloned().map(Operand::Const).collect();
                self.print_gep_instruction(&base, &indices);
            }
            ConstExprKind::Select { cond, on_true, on_false } => {
                self.print_select_instruction(
                    &Operand::Const(cond.clone()),
                    &Operand::Const(on_true.clone()),
                    &Operand::Const(on_false.clone()),
                );
            }
        }
    }
}
