//! Textual rendering of IR constructs.
//!
//! Used for the `-g3` commented-IR annotations and for diagnostics. Locals
//! render as `%N` by value number; named results keep their name.

use std::fmt;

use super::ir::*;

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Local { id, name, .. } => match name {
                Some(n) => write!(f, "%{}", n),
                None => write!(f, "%{}", id.0),
            },
            Operand::Const(c) => write!(f, "{}", c),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int { value, .. } => write!(f, "{}", value),
            Constant::Float(v) => write!(f, "{:e}", v),
            Constant::Double(v) => write!(f, "{:e}", v),
            Constant::Null(_) => write!(f, "null"),
            Constant::Undef(_) => write!(f, "undef"),
            Constant::Zero(_) => write!(f, "zeroinitializer"),
            Constant::Str { bytes, .. } => {
                write!(f, "c\"")?;
                for &b in bytes {
                    if (0x20..0x7f).contains(&b) && b != b'"' && b != b'\\' {
                        write!(f, "{}", b as char)?;
                    } else {
                        write!(f, "\\{:02X}", b)?;
                    }
                }
                write!(f, "\"")
            }
            Constant::Aggregate { ty, elems } => {
                let (open, close) = match ty {
                    crate::common::types::Type::Struct(_) => ("{", "}"),
                    crate::common::types::Type::Vector(..) => ("<", ">"),
                    _ => ("[", "]"),
                };
                write!(f, "{}", open)?;
                for (i, e) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", e.ty(), e)?;
                }
                write!(f, "{}", close)
            }
            Constant::GlobalRef { name, .. } | Constant::FuncRef { name, .. } => {
                write!(f, "@{}", name)
            }
            Constant::Expr(e) => write!(f, "{}", e),
        }
    }
}

impl fmt::Display for ConstExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ConstExprKind::Cast { op, value } => {
                write!(f, "{} ({} {} to {})", cast_name(*op), value.ty(), value, self.ty)
            }
            ConstExprKind::Binary { op, lhs, rhs } => {
                write!(f, "{} ({} {}, {})", binop_name(*op), lhs.ty(), lhs, rhs)
            }
            ConstExprKind::Cmp { pred, lhs, rhs } => {
                let (kw, name) = pred_name(*pred);
                write!(f, "{} {} ({} {}, {})", kw, name, lhs.ty(), lhs, rhs)
            }
            ConstExprKind::Gep { base, indices } => {
                write!(f, "getelementptr ({} {}", base.ty(), base)?;
                for idx in indices {
                    write!(f, ", {} {}", idx.ty(), idx)?;
                }
                write!(f, ")")
            }
            ConstExprKind::Select { cond, on_true, on_false } => {
                write!(
                    f,
                    "select (i1 {}, {} {}, {} {})",
                    cond,
                    on_true.ty(),
                    on_true,
                    on_false.ty(),
                    on_false
                )
            }
        }
    }
}

impl fmt::Display for Inst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = self.result {
            match &self.name {
                Some(name) => write!(f, "%{} = ", name)?,
                None => write!(f, "%{} = ", result.0)?,
            }
        }
        match &self.kind {
            InstKind::Binary { op, lhs, rhs } => {
                write!(f, "{} {} {}, {}", binop_name(*op), lhs.ty(), lhs, rhs)
            }
            InstKind::Cmp { pred, lhs, rhs } => {
                let (kw, name) = pred_name(*pred);
                write!(f, "{} {} {} {}, {}", kw, name, lhs.ty(), lhs, rhs)
            }
            InstKind::Cast { op, value } => {
                write!(f, "{} {} {} to {}", cast_name(*op), value.ty(), value, self.ty)
            }
            InstKind::Gep { base, indices } => {
                write!(f, "getelementptr {} {}", base.ty(), base)?;
                for idx in indices {
                    write!(f, ", {} {}", idx.ty(), idx)?;
                }
                Ok(())
            }
            InstKind::Alloca { allocated, count } => {
                write!(f, "alloca {}, i32 {}", allocated, count)
            }
            InstKind::Load { ptr } => write!(f, "load {} {}", ptr.ty(), ptr),
            InstKind::Store { val, ptr } => {
                write!(f, "store {} {}, {} {}", val.ty(), val, ptr.ty(), ptr)
            }
            InstKind::Phi { incoming } => {
                write!(f, "phi {} ", self.ty)?;
                for (i, (val, block)) in incoming.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "[ {}, %{} ]", val, block.0)?;
                }
                Ok(())
            }
            InstKind::Select { cond, on_true, on_false } => {
                write!(
                    f,
                    "select i1 {}, {} {}, {} {}",
                    cond,
                    on_true.ty(),
                    on_true,
                    on_false.ty(),
                    on_false
                )
            }
            InstKind::Call { callee, args } => {
                write!(f, "call {} {}(", self.ty, callee)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", a.ty(), a)?;
                }
                write!(f, ")")
            }
            InstKind::Invoke { callee, args, normal, unwind } => {
                write!(f, "invoke {} {}(", self.ty, callee)?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", a.ty(), a)?;
                }
                write!(f, ") to label %{} unwind label %{}", normal.0, unwind.0)
            }
            InstKind::VaArg { list } => write!(f, "va_arg {} {}, {}", list.ty(), list, self.ty),
            InstKind::Br { dest } => write!(f, "br label %{}", dest.0),
            InstKind::CondBr { cond, on_true, on_false } => {
                write!(f, "br i1 {}, label %{}, label %{}", cond, on_true.0, on_false.0)
            }
            InstKind::Switch { cond, default, cases } => {
                write!(f, "switch {} {}, label %{} [", cond.ty(), cond, default.0)?;
                for (value, block) in cases {
                    write!(f, " {}, label %{}", value, block.0)?;
                }
                write!(f, " ]")
            }
            InstKind::Ret { value: Some(v) } => write!(f, "ret {} {}", v.ty(), v),
            InstKind::Ret { value: None } => write!(f, "ret void"),
            InstKind::Unwind => write!(f, "unwind"),
            InstKind::Unreachable => write!(f, "unreachable"),
        }
    }
}

pub fn binop_name(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "sub",
        BinOp::Mul => "mul",
        BinOp::Div => "sdiv",
        BinOp::UDiv => "udiv",
        BinOp::Rem => "srem",
        BinOp::URem => "urem",
        BinOp::And => "and",
        BinOp::Or => "or",
        BinOp::Xor => "xor",
        BinOp::Shl => "shl",
        BinOp::LShr => "lshr",
        BinOp::AShr => "ashr",
    }
}

pub fn cast_name(op: CastOp) -> &'static str {
    match op {
        CastOp::Trunc => "trunc",
        CastOp::ZExt => "zext",
        CastOp::SExt => "sext",
        CastOp::FPTrunc => "fptrunc",
        CastOp::FPExt => "fpext",
        CastOp::UIToFP => "uitofp",
        CastOp::SIToFP => "sitofp",
        CastOp::FPToUI => "fptoui",
        CastOp::FPToSI => "fptosi",
        CastOp::PtrToInt => "ptrtoint",
        CastOp::IntToPtr => "inttoptr",
        CastOp::BitCast => "bitcast",
    }
}

pub fn pred_name(pred: Pred) -> (&'static str, &'static str) {
    match pred {
        Pred::Int(p) => (
            "icmp",
            match p {
                IntPred::Eq => "eq",
                IntPred::Ne => "ne",
                IntPred::Ugt => "ugt",
                IntPred::Uge => "uge",
                IntPred::Ult => "ult",
                IntPred::Ule => "ule",
                IntPred::Sgt => "sgt",
                IntPred::Sge => "sge",
                IntPred::Slt => "slt",
                IntPred::Sle => "sle",
            },
        ),
        Pred::Float(p) => (
            "fcmp",
            match p {
                FloatPred::Oeq => "oeq",
                FloatPred::Ogt => "ogt",
                FloatPred::Oge => "oge",
                FloatPred::Olt => "olt",
                FloatPred::Ole => "ole",
                FloatPred::One => "one",
                FloatPred::Ord => "ord",
                FloatPred::Ueq => "ueq",
                FloatPred::Ugt => "ugt",
                FloatPred::Uge => "uge",
                FloatPred::Ult => "ult",
                FloatPred::Ule => "ule",
                FloatPred::Une => "une",
                FloatPred::Uno => "uno",
            },
        ),
    }
}
