//! Lowering of data-flow instructions: compares, arithmetic, the cast
//! matrix, getelementptr offset arithmetic, alloca, va_arg, and the
//! va/mem/math/bit intrinsic families.

use crate::common::types::{align_offset, Type};
use crate::ir::ir::{BinOp, CastOp, Constant, FloatPred, IntPred, Operand, Pred};

use super::types::{bit_width, type_descriptor, type_postfix, type_prefix};
use super::JvmWriter;

impl<'m> JvmWriter<'m> {
    /// Print an icmp/fcmp instruction as a virtual runtime operation
    /// returning `Z`.
    pub(super) fn print_cmp_instruction(&mut self, pred: Pred, left: &Operand, right: &Operand) {
        let inst = match pred {
            Pred::Int(p) => match p {
                IntPred::Eq => "icmp_eq",
                IntPred::Ne => "icmp_ne",
                IntPred::Ule => "icmp_ule",
                IntPred::Sle => "icmp_sle",
                IntPred::Uge => "icmp_uge",
                IntPred::Sge => "icmp_sge",
                IntPred::Ult => "icmp_ult",
                IntPred::Slt => "icmp_slt",
                IntPred::Ugt => "icmp_ugt",
                IntPred::Sgt => "icmp_sgt",
            },
            Pred::Float(p) => match p {
                FloatPred::Ugt => "fcmp_ugt",
                FloatPred::Ogt => "fcmp_ogt",
                FloatPred::Uge => "fcmp_uge",
                FloatPred::Oge => "fcmp_oge",
                FloatPred::Ult => "fcmp_ult",
                FloatPred::Olt => "fcmp_olt",
                FloatPred::Ule => "fcmp_ule",
                FloatPred::Ole => "fcmp_ole",
                FloatPred::Ueq => "fcmp_ueq",
                FloatPred::Oeq => "fcmp_oeq",
                FloatPred::Une => "fcmp_une",
                FloatPred::One => "fcmp_one",
                FloatPred::Ord => "fcmp_ord",
                FloatPred::Uno => "fcmp_uno",
            },
        };
        let sig = format!(
            "{}({}{})Z",
            inst,
            type_descriptor(&left.ty(), true),
            type_descriptor(&right.ty(), true)
        );
        self.print_virtual_instruction_binary(&sig, left, right);
    }

    /// Print an arithmetic instruction. The stack-op family is chosen
    /// from the left operand's type.
    pub(super) fn print_arithmetic_instruction(&mut self, op: BinOp, left: &Operand, right: &Operand) {
        self.print_value_load(left);
        self.print_value_load(right);
        let left_ty = left.ty();
        let type_prefix = type_prefix(&left_ty, true);
        let type_descriptor = type_descriptor(&left_ty, false);
        match op {
            BinOp::Add => self.print_simple_instruction(&format!("{}add", type_prefix)),
            BinOp::Sub => self.print_simple_instruction(&format!("{}sub", type_prefix)),
            BinOp::Mul => self.print_simple_instruction(&format!("{}mul", type_prefix)),
            BinOp::Div => self.print_simple_instruction(&format!("{}div", type_prefix)),
            BinOp::Rem => self.print_simple_instruction(&format!("{}rem", type_prefix)),
            BinOp::And => self.print_simple_instruction(&format!("{}and", type_prefix)),
            BinOp::Or => self.print_simple_instruction(&format!("{}or", type_prefix)),
            BinOp::Xor => self.print_simple_instruction(&format!("{}xor", type_prefix)),
            BinOp::Shl => {
                // JVM shifts take an int count.
                if bit_width(&right.ty(), false) == 64 {
                    self.print_simple_instruction("l2i");
                }
                self.print_simple_instruction(&format!("{}shl", type_prefix));
            }
            BinOp::LShr => {
                if bit_width(&right.ty(), false) == 64 {
                    self.print_simple_instruction("l2i");
                }
                self.print_simple_instruction(&format!("{}ushr", type_prefix));
            }
            BinOp::AShr => {
                if bit_width(&right.ty(), false) == 64 {
                    self.print_simple_instruction("l2i");
                }
                self.print_simple_instruction(&format!("{}shr", type_prefix));
            }
            BinOp::UDiv => {
                self.print_virtual_instruction(&format!(
                    "udiv({}{}){}",
                    type_descriptor, type_descriptor, type_descriptor
                ));
            }
            BinOp::URem => {
                self.print_virtual_instruction(&format!(
                    "urem({}{}){}",
                    type_descriptor, type_descriptor, type_descriptor
                ));
            }
        }
    }

    /// Print a bitcast. Same-category bitcasts are the identity; the
    /// int/float reinterpretations go through the boxed bit methods.
    pub(super) fn print_bitcast_instruction(&mut self, ty: &Type, src_ty: &Type) {
        let type_id = super::types::type_id(ty, false);
        let src_type_id = super::types::type_id(src_ty, false);
        if src_type_id == 'J' && type_id == 'D' {
            self.print_invoke_static("java/lang/Double/longBitsToDouble(J)D");
        } else if src_type_id == 'I' && type_id == 'F' {
            self.print_invoke_static("java/lang/Float/intBitsToFloat(I)F");
        }
        if src_type_id == 'D' && type_id == 'J' {
            self.print_invoke_static("java/lang/Double/doubleToRawLongBits(D)J");
        } else if src_type_id == 'F' && type_id == 'I' {
            self.print_invoke_static("java/lang/Float/floatToRawIntBits(F)I");
        }
    }

    /// Emit `<src>2<dst>` when the prefixes differ.
    pub(super) fn print_cast_prefix(&mut self, type_prefix: &str, src_type_prefix: &str) {
        if src_type_prefix != type_prefix {
            self.print_simple_instruction(&format!("{}2{}", src_type_prefix, type_prefix));
        }
    }

    /// Print a cast instruction: load the value, then convert.
    pub(super) fn print_cast_instruction(
        &mut self,
        op: CastOp,
        v: &Operand,
        ty: &Type,
        src_ty: &Type,
    ) {
        self.print_value_load(v);
        match op {
            CastOp::SIToFP | CastOp::FPToSI | CastOp::FPTrunc | CastOp::FPExt | CastOp::SExt => {
                if bit_width(src_ty, false) < 32 {
                    self.print_cast_prefix(type_prefix(src_ty, false), "i");
                }
                self.print_cast_prefix(type_prefix(ty, true), type_prefix(src_ty, true));
            }
            CastOp::Trunc => {
                if bit_width(src_ty, false) == 64 && bit_width(ty, false) < 32 {
                    self.print_simple_instruction("l2i");
                    self.print_cast_prefix(type_prefix(ty, false), "i");
                } else {
                    self.print_cast_prefix(type_prefix(ty, false), type_prefix(src_ty, true));
                }
            }
            CastOp::IntToPtr => self.print_cast_prefix("i", type_prefix(src_ty, true)),
            CastOp::PtrToInt => self.print_cast_prefix(type_prefix(ty, false), "i"),
            CastOp::ZExt => {
                self.print_virtual_instruction(&format!(
                    "zext_{}({}){}",
                    type_postfix(ty, true),
                    type_descriptor(src_ty, false),
                    type_descriptor(ty, true)
                ));
            }
            CastOp::UIToFP => {
                self.print_virtual_instruction(&format!(
                    "uitofp_{}({}){}",
                    type_postfix(ty, false),
                    type_descriptor(src_ty, false),
                    type_descriptor(ty, false)
                ));
            }
            CastOp::FPToUI => {
                self.print_virtual_instruction(&format!(
                    "fptoui_{}({}){}",
                    type_postfix(ty, false),
                    type_descriptor(src_ty, false),
                    type_descriptor(ty, false)
                ));
            }
            CastOp::BitCast => self.print_bitcast_instruction(ty, src_ty),
        }
    }

    /// Load a value and coerce it to a 32-bit address.
    fn print_ptr_coerce(&mut self, v: &Operand) {
        self.print_value_load(v);
        self.print_cast_prefix("i", type_prefix(&v.ty(), true));
    }

    /// Print a getelementptr: load the base address, then add the offset
    /// contribution of every indexed step.
    pub(super) fn print_gep_instruction(&mut self, base: &Operand, indices: &[Operand]) {
        // load address
        self.print_ptr_coerce(base);

        // calculate offset
        let mut cur = base.ty();
        for index_value in indices {
            match cur {
                Type::Struct(fields) => {
                    let field_index = match index_value {
                        Operand::Const(Constant::Int { value, .. }) => *value as usize,
                        other => panic!("Value = {}\nstructure index must be constant", other),
                    };
                    let mut size = 0u64;
                    for f in 0..field_index {
                        size = align_offset(
                            size + self.target.type_alloc_size(&fields[f]),
                            self.target.abi_alignment(&fields[f + 1]),
                        );
                    }
                    self.print_ptr_load(size);
                    self.print_simple_instruction("iadd");
                    cur = fields[field_index].clone();
                }
                Type::Pointer(elem) | Type::Array(_, elem) | Type::Vector(_, elem) => {
                    let size = self.target.type_alloc_size(&elem);
                    match index_value {
                        Operand::Const(Constant::Int { value, .. }) => {
                            // constant optimisation
                            if *value == 0 {
                                // do nothing
                            } else if *value < 0 {
                                self.print_ptr_load(value.unsigned_abs() * size);
                                self.print_simple_instruction("isub");
                            } else {
                                self.print_ptr_load(*value as u64 * size);
                                self.print_simple_instruction("iadd");
                            }
                        }
                        _ => {
                            self.print_ptr_load(size);
                            self.print_ptr_coerce(index_value);
                            self.print_simple_instruction("imul");
                            self.print_simple_instruction("iadd");
                        }
                    }
                    cur = *elem;
                }
                other => panic!("Type = {}\ncannot index into type", other),
            }
        }
    }

    /// Print an alloca: reserve `count * allocSize` bytes in the current
    /// runtime stack frame.
    pub(super) fn print_alloca_instruction(&mut self, allocated: &Type, count: &Operand) {
        let size = self.target.type_alloc_size(allocated);
        match count {
            Operand::Const(Constant::Int { value, .. }) => {
                // constant optimisation
                self.print_ptr_load(*value as u64 * size);
            }
            _ => {
                self.print_ptr_load(size);
                self.print_value_load(count);
                self.print_simple_instruction("imul");
            }
        }
        self.print_invoke_static("lljvm/runtime/Memory/allocateStack(I)I");
    }

    /// Print a va_arg: read the next argument out of the packed vararg
    /// area and advance the stored pointer past it.
    pub(super) fn print_va_arg_instruction(&mut self, list: &Operand, result_ty: &Type) {
        self.print_indirect_load(list);
        self.print_simple_instruction("dup");
        self.print_const_load_int(32, self.target.type_alloc_size(result_ty) as i64);
        self.print_simple_instruction("iadd");
        self.print_value_load(list);
        self.print_simple_instruction("swap");
        let valist = Type::Int(8).pointer_to();
        self.print_invoke_static(&format!(
            "lljvm/runtime/Memory/store(I{})V",
            type_descriptor(&valist, false)
        ));
        self.print_indirect_load_type(result_ty);
    }

    /// Print a va_start/va_copy/va_end intrinsic.
    pub(super) fn print_va_intrinsic(&mut self, which: &str, args: &[Operand]) {
        let valist = Type::Int(8).pointer_to();
        let store_sig = format!("lljvm/runtime/Memory/store(I{})V", type_descriptor(&valist, false));
        match which {
            "va_start" => {
                self.print_value_load(&args[0]);
                let va_arg_num = self.va_arg_num.expect("va_start outside a variadic function");
                self.print_simple_instruction_arg("iload", &format!("{} ; varargptr", va_arg_num));
                self.print_invoke_static(&store_sig);
            }
            "va_copy" => {
                self.print_value_load(&args[0]);
                self.print_value_load(&args[1]);
                self.print_indirect_load_type(&valist);
                self.print_invoke_static(&store_sig);
            }
            _ => {} // va_end
        }
    }

    /// Print a memcpy/memmove/memset intrinsic.
    pub(super) fn print_mem_intrinsic(&mut self, which: &str, args: &[Operand]) {
        self.print_value_load(&args[0]);
        self.print_value_load(&args[1]);
        self.print_value_load(&args[2]);
        self.print_value_load(&args[3]);
        let len_descriptor = type_descriptor(&args[2].ty(), true);
        match which {
            "memcpy" => self.print_invoke_static(&format!(
                "lljvm/runtime/Memory/memcpy(II{}I)V",
                len_descriptor
            )),
            "memmove" => self.print_invoke_static(&format!(
                "lljvm/runtime/Memory/memmove(II{}I)V",
                len_descriptor
            )),
            _ => self.print_invoke_static(&format!(
                "lljvm/runtime/Memory/memset(IB{}I)V",
                len_descriptor
            )),
        }
    }

    /// Print a mathematical intrinsic: promote float operands to double,
    /// dispatch to `java/lang/Math`, demote the result back if needed.
    pub(super) fn print_math_intrinsic(&mut self, which: &str, args: &[Operand]) {
        let f32_mode = bit_width(&args[0].ty(), false) == 32;
        self.print_value_load(&args[0]);
        if f32_mode {
            self.print_simple_instruction("f2d");
        }
        if args.len() >= 2 {
            self.print_value_load(&args[1]);
            if f32_mode {
                self.print_simple_instruction("f2d");
            }
        }
        match which {
            "exp" => self.print_invoke_static("java/lang/Math/exp(D)D"),
            "log" => self.print_invoke_static("java/lang/Math/log(D)D"),
            "log10" => self.print_invoke_static("java/lang/Math/log10(D)D"),
            "sqrt" => self.print_invoke_static("java/lang/Math/sqrt(D)D"),
            _ => self.print_invoke_static("java/lang/Math/pow(DD)D"),
        }
        if f32_mode {
            self.print_simple_instruction("d2f");
        }
    }

    /// Print a bit-manipulation intrinsic.
    pub(super) fn print_bit_intrinsic(&mut self, args: &[Operand]) {
        let value = &args[0];
        let type_descriptor = type_descriptor(&value.ty(), false);
        self.print_virtual_instruction_unary(
            &format!("bswap({}){}", type_descriptor, type_descriptor),
            value,
        );
    }
}
