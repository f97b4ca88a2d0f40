//! Recursive-descent parser for the textual IR form.
//!
//! Accepts an LLVM-style listing: `target` lines, global definitions and
//! declarations with full constant initializers, `declare`/`define`, and
//! the instruction set the backend lowers. Both the classic one-type
//! spelling (`load i32* %p`) and the typed spelling (`load i32, i32* %p`)
//! are accepted for `load` and `getelementptr`. Parse errors carry the
//! source line and abort the run.
//!
//! Block labels and local values may be referenced before they are
//! defined (φ-nodes, branches); references are interned during the parse
//! and resolved in a fixup pass once the function (for labels) or module
//! (for global/function references) is complete.

use std::collections::HashMap;

use crate::common::error::BackendError;
use crate::common::types::{FuncType, Type};

use super::ir::*;

/// Parse a textual IR module. `file` is used in diagnostics and becomes
/// the module identifier.
pub fn parse_module(src: &str, file: &str) -> Result<Module, BackendError> {
    let mut parser = Parser {
        src: src.as_bytes(),
        pos: 0,
        line: 1,
        file: file.to_string(),
    };
    let mut module = Module::new(file.to_string());
    parser.run(&mut module)?;
    resolve_global_refs(&mut module)?;
    Ok(module)
}

struct Parser<'s> {
    src: &'s [u8],
    pos: usize,
    line: u32,
    file: String,
}

/// Per-function parse state: interned local values and block labels.
struct FuncCtx {
    locals: HashMap<String, ValueId>,
    next_value: u32,
    /// Label name -> interim id, assigned on first mention.
    label_ids: HashMap<String, u32>,
    /// Interim ids in block-definition order.
    label_order: Vec<u32>,
}

impl FuncCtx {
    fn new() -> Self {
        FuncCtx {
            locals: HashMap::new(),
            next_value: 0,
            label_ids: HashMap::new(),
            label_order: Vec::new(),
        }
    }

    fn local(&mut self, name: &str) -> ValueId {
        if let Some(&id) = self.locals.get(name) {
            return id;
        }
        let id = ValueId(self.next_value);
        self.next_value += 1;
        self.locals.insert(name.to_string(), id);
        id
    }

    /// A fresh id for an unnamed non-void result.
    fn fresh(&mut self) -> ValueId {
        let id = ValueId(self.next_value);
        self.next_value += 1;
        id
    }

    /// Interim block id for a label, allocated on first mention.
    fn label(&mut self, name: &str) -> BlockId {
        if let Some(&id) = self.label_ids.get(name) {
            return BlockId(id);
        }
        let id = self.label_ids.len() as u32;
        self.label_ids.insert(name.to_string(), id);
        BlockId(id)
    }

    fn define_label(&mut self, name: &str) -> BlockId {
        let id = self.label(name);
        self.label_order.push(id.0);
        id
    }
}

impl<'s> Parser<'s> {
    fn run(&mut self, module: &mut Module) -> Result<(), BackendError> {
        loop {
            self.skip_ws();
            if self.at_eof() {
                return Ok(());
            }
            match self.peek() {
                b'@' => {
                    let global = self.parse_global()?;
                    module.globals.push(global);
                }
                _ => {
                    let word = self.word().ok_or_else(|| self.err("expected top-level entity"))?;
                    match word.as_str() {
                        "target" => self.parse_target()?,
                        "declare" => {
                            let func = self.parse_declare()?;
                            module.functions.push(func);
                        }
                        "define" => {
                            let func = self.parse_define()?;
                            module.functions.push(func);
                        }
                        other => {
                            return Err(self.err(&format!("unexpected token '{}'", other)));
                        }
                    }
                }
            }
        }
    }

    // ── Top-level entities ───────────────────────────────────────────────

    fn parse_target(&mut self) -> Result<(), BackendError> {
        let kind = self.word().ok_or_else(|| self.err("expected 'datalayout' or 'triple'"))?;
        self.expect(b'=')?;
        let value = self.quoted_string()?;
        if kind == "datalayout" {
            // The backend is hard-wired to 32-bit pointers.
            for spec in value.split('-') {
                if let Some(rest) = spec.strip_prefix("p:") {
                    if rest.split(':').next() != Some("32") {
                        return Err(self.err("only 32-bit pointers are allowed"));
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_global(&mut self) -> Result<Global, BackendError> {
        self.expect(b'@')?;
        let name = self.ident()?;
        self.expect(b'=')?;

        let mut linkage = Linkage::External;
        let mut is_declaration = false;
        loop {
            let word = self.peek_word();
            match word.as_deref() {
                Some("internal") | Some("private") => {
                    linkage = Linkage::Internal;
                    self.word();
                }
                Some("external") => {
                    is_declaration = true;
                    self.word();
                }
                Some("common") | Some("weak") | Some("linkonce") | Some("thread_local")
                | Some("unnamed_addr") | Some("dso_local") => {
                    self.word();
                }
                Some("global") | Some("constant") => {
                    self.word();
                    break;
                }
                _ => return Err(self.err("expected 'global' or 'constant'")),
            }
        }

        let ty = self.parse_type()?;
        let init = if is_declaration {
            None
        } else {
            Some(self.parse_constant(&ty)?)
        };
        self.skip_tail_clauses()?;
        Ok(Global { name, ty, linkage, init })
    }

    fn parse_declare(&mut self) -> Result<Function, BackendError> {
        self.skip_attr_words();
        let ret = self.parse_type()?;
        self.expect(b'@')?;
        let name = self.ident()?;
        self.expect(b'(')?;
        let mut params = Vec::new();
        let mut vararg = false;
        let mut index = 0u32;
        if !self.eat(b')') {
            loop {
                if self.eat_word("...") {
                    vararg = true;
                    self.expect(b')')?;
                    break;
                }
                let ty = self.parse_type()?;
                self.skip_attr_words();
                self.skip_ws();
                // Parameter names are permitted but unused in declarations.
                if self.peek() == b'%' {
                    self.advance();
                    self.ident()?;
                }
                params.push(Param { id: ValueId(index), name: None, ty });
                index += 1;
                if self.eat(b')') {
                    break;
                }
                self.expect(b',')?;
            }
        }
        self.skip_attr_words();
        Ok(Function {
            name,
            ret,
            params,
            vararg,
            linkage: Linkage::External,
            blocks: Vec::new(),
        })
    }

    fn parse_define(&mut self) -> Result<Function, BackendError> {
        let mut linkage = Linkage::External;
        loop {
            match self.peek_word().as_deref() {
                Some("internal") | Some("private") => {
                    linkage = Linkage::Internal;
                    self.word();
                }
                Some("external") | Some("linkonce") | Some("weak") | Some("dso_local")
                | Some("hidden") | Some("protected") => {
                    self.word();
                }
                _ => break,
            }
        }
        let ret = self.parse_type()?;
        self.expect(b'@')?;
        let name = self.ident()?;

        let mut ctx = FuncCtx::new();
        self.expect(b'(')?;
        let mut params = Vec::new();
        let mut vararg = false;
        if !self.eat(b')') {
            loop {
                if self.eat_word("...") {
                    vararg = true;
                    self.expect(b')')?;
                    break;
                }
                let ty = self.parse_type()?;
                self.skip_attr_words();
                self.skip_ws();
                let pname = if self.peek() == b'%' {
                    self.advance();
                    self.ident()?
                } else {
                    params.len().to_string()
                };
                let id = ctx.local(&pname);
                params.push(Param { id, name: Some(pname), ty });
                if self.eat(b')') {
                    break;
                }
                self.expect(b',')?;
            }
        }
        self.skip_attr_words();
        self.expect(b'{')?;
        let blocks = self.parse_body(&mut ctx)?;
        Ok(Function { name, ret, params, vararg, linkage, blocks })
    }

    // ── Function bodies ──────────────────────────────────────────────────

    fn parse_body(&mut self, ctx: &mut FuncCtx) -> Result<Vec<BasicBlock>, BackendError> {
        let mut blocks: Vec<BasicBlock> = Vec::new();
        let mut current: Vec<Inst> = Vec::new();
        let mut started = false;

        loop {
            self.skip_ws();
            if self.eat(b'}') {
                if started {
                    blocks.push(BasicBlock { insts: current });
                }
                break;
            }
            if self.at_eof() {
                return Err(self.err("unexpected end of input in function body"));
            }
            if let Some(label) = self.try_label()? {
                if started {
                    blocks.push(BasicBlock { insts: std::mem::take(&mut current) });
                }
                ctx.define_label(&label);
                started = true;
                continue;
            }
            if !started {
                // Entry block without an explicit label.
                ctx.define_label("<entry>");
                started = true;
            }
            let inst = self.parse_instruction(ctx)?;
            current.push(inst);
        }

        // Rewrite interim label ids to final block indices.
        let mut final_index = vec![u32::MAX; ctx.label_ids.len()];
        for (pos, &interim) in ctx.label_order.iter().enumerate() {
            final_index[interim as usize] = pos as u32;
        }
        let resolve = |b: &mut BlockId| -> Result<(), BackendError> {
            let idx = final_index[b.0 as usize];
            if idx == u32::MAX {
                return Err(BackendError::Parse {
                    file: self.file.clone(),
                    line: self.line,
                    msg: "branch to undefined label".to_string(),
                });
            }
            b.0 = idx;
            Ok(())
        };
        for block in &mut blocks {
            for inst in &mut block.insts {
                match &mut inst.kind {
                    InstKind::Br { dest } => resolve(dest)?,
                    InstKind::CondBr { on_true, on_false, .. } => {
                        resolve(on_true)?;
                        resolve(on_false)?;
                    }
                    InstKind::Switch { default, cases, .. } => {
                        resolve(default)?;
                        for (_, target) in cases {
                            resolve(target)?;
                        }
                    }
                    InstKind::Invoke { normal, unwind, .. } => {
                        resolve(normal)?;
                        resolve(unwind)?;
                    }
                    InstKind::Phi { incoming } => {
                        for (_, block) in incoming {
                            resolve(block)?;
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(blocks)
    }

    /// Try to consume `name:` at the start of a statement.
    fn try_label(&mut self) -> Result<Option<String>, BackendError> {
        self.skip_ws();
        let save = (self.pos, self.line);
        if let Some(word) = self.word() {
            if self.peek() == b':' {
                self.advance();
                return Ok(Some(word));
            }
        }
        self.pos = save.0;
        self.line = save.1;
        Ok(None)
    }

    fn parse_instruction(&mut self, ctx: &mut FuncCtx) -> Result<Inst, BackendError> {
        let mut result_name = None;
        self.skip_ws();
        if self.peek() == b'%' {
            self.advance();
            result_name = Some(self.ident()?);
            self.expect(b'=')?;
        }
        let opcode = self.word().ok_or_else(|| self.err("expected an opcode"))?;

        let (ty, kind) = match opcode.as_str() {
            "add" | "fadd" | "sub" | "fsub" | "mul" | "fmul" | "sdiv" | "fdiv" | "udiv"
            | "srem" | "frem" | "urem" | "and" | "or" | "xor" | "shl" | "lshr" | "ashr" => {
                let op = binop_from_name(&opcode);
                while matches!(self.peek_word().as_deref(), Some("nsw") | Some("nuw") | Some("exact")) {
                    self.word();
                }
                let ty = self.parse_type()?;
                let lhs = self.parse_operand(ctx, &ty)?;
                self.expect(b',')?;
                let rhs = self.parse_operand(ctx, &ty)?;
                (ty, InstKind::Binary { op, lhs, rhs })
            }
            "icmp" | "fcmp" => {
                let pred_word = self.word().ok_or_else(|| self.err("expected a predicate"))?;
                let pred = if opcode == "icmp" {
                    Pred::Int(int_pred_from_name(&pred_word).ok_or_else(|| {
                        self.err(&format!("Predicate = {}\nInvalid cmp predicate", pred_word))
                    })?)
                } else {
                    Pred::Float(float_pred_from_name(&pred_word).ok_or_else(|| {
                        self.err(&format!("Predicate = {}\nInvalid cmp predicate", pred_word))
                    })?)
                };
                let ty = self.parse_type()?;
                let lhs = self.parse_operand(ctx, &ty)?;
                self.expect(b',')?;
                let rhs = self.parse_operand(ctx, &ty)?;
                (Type::Int(1), InstKind::Cmp { pred, lhs, rhs })
            }
            "trunc" | "zext" | "sext" | "fptrunc" | "fpext" | "uitofp" | "sitofp" | "fptoui"
            | "fptosi" | "ptrtoint" | "inttoptr" | "bitcast" => {
                let op = cast_from_name(&opcode);
                let src_ty = self.parse_type()?;
                let value = self.parse_operand(ctx, &src_ty)?;
                self.expect_word("to")?;
                let dest_ty = self.parse_type()?;
                (dest_ty, InstKind::Cast { op, value })
            }
            "getelementptr" => {
                self.eat_word("inbounds");
                let first = self.parse_type()?;
                self.skip_ws();
                let base_ty = if self.peek() == b',' {
                    // Typed spelling: the pointee annotation precedes the base.
                    self.expect(b',')?;
                    self.parse_type()?
                } else {
                    first
                };
                let base = self.parse_operand(ctx, &base_ty)?;
                let mut indices = Vec::new();
                while self.eat(b',') {
                    let ity = self.parse_type()?;
                    indices.push(self.parse_operand(ctx, &ity)?);
                }
                let result = gep_result_type(self, &base_ty, &indices)?;
                (result, InstKind::Gep { base, indices })
            }
            "alloca" => {
                let allocated = self.parse_type()?;
                let mut count = Operand::Const(Constant::Int { bits: 32, value: 1 });
                while self.eat(b',') {
                    if self.eat_word("align") {
                        self.number()?;
                    } else {
                        let cty = self.parse_type()?;
                        count = self.parse_operand(ctx, &cty)?;
                    }
                }
                (allocated.clone().pointer_to(), InstKind::Alloca { allocated, count })
            }
            "load" => {
                self.eat_word("volatile");
                let first = self.parse_type()?;
                self.skip_ws();
                let (ptr_ty, value_ty) = if self.peek() == b',' {
                    self.expect(b',')?;
                    let ptr_ty = self.parse_type()?;
                    (ptr_ty, first)
                } else {
                    let value_ty = first
                        .pointee()
                        .cloned()
                        .ok_or_else(|| self.err("load requires a pointer operand"))?;
                    (first, value_ty)
                };
                let ptr = self.parse_operand(ctx, &ptr_ty)?;
                self.skip_align_clause()?;
                (value_ty, InstKind::Load { ptr })
            }
            "store" => {
                self.eat_word("volatile");
                let val_ty = self.parse_type()?;
                let val = self.parse_operand(ctx, &val_ty)?;
                self.expect(b',')?;
                let ptr_ty = self.parse_type()?;
                let ptr = self.parse_operand(ctx, &ptr_ty)?;
                self.skip_align_clause()?;
                (Type::Void, InstKind::Store { val, ptr })
            }
            "phi" => {
                let ty = self.parse_type()?;
                let mut incoming = Vec::new();
                loop {
                    self.expect(b'[')?;
                    let val = self.parse_operand(ctx, &ty)?;
                    self.expect(b',')?;
                    self.expect(b'%')?;
                    let label = self.ident()?;
                    self.expect(b']')?;
                    incoming.push((val, ctx.label(&label)));
                    if !self.eat(b',') {
                        break;
                    }
                }
                (ty, InstKind::Phi { incoming })
            }
            "select" => {
                let cond_ty = self.parse_type()?;
                let cond = self.parse_operand(ctx, &cond_ty)?;
                self.expect(b',')?;
                let ty = self.parse_type()?;
                let on_true = self.parse_operand(ctx, &ty)?;
                self.expect(b',')?;
                let false_ty = self.parse_type()?;
                let on_false = self.parse_operand(ctx, &false_ty)?;
                (ty, InstKind::Select { cond, on_true, on_false })
            }
            "tail" | "call" => {
                if opcode == "tail" {
                    self.expect_word("call")?;
                }
                let (ret, callee, args) = self.parse_call_tail(ctx)?;
                (ret, InstKind::Call { callee, args })
            }
            "invoke" => {
                let (ret, callee, args) = self.parse_call_tail(ctx)?;
                self.expect_word("to")?;
                self.expect_word("label")?;
                self.expect(b'%')?;
                let normal = ctx.label(&self.ident()?);
                self.expect_word("unwind")?;
                self.expect_word("label")?;
                self.expect(b'%')?;
                let unwind = ctx.label(&self.ident()?);
                (ret, InstKind::Invoke { callee, args, normal, unwind })
            }
            "va_arg" => {
                let list_ty = self.parse_type()?;
                let list = self.parse_operand(ctx, &list_ty)?;
                self.expect(b',')?;
                let ty = self.parse_type()?;
                (ty, InstKind::VaArg { list })
            }
            "br" => {
                if self.eat_word("label") {
                    self.expect(b'%')?;
                    let dest = ctx.label(&self.ident()?);
                    (Type::Void, InstKind::Br { dest })
                } else {
                    let cond_ty = self.parse_type()?;
                    let cond = self.parse_operand(ctx, &cond_ty)?;
                    self.expect(b',')?;
                    self.expect_word("label")?;
                    self.expect(b'%')?;
                    let on_true = ctx.label(&self.ident()?);
                    self.expect(b',')?;
                    self.expect_word("label")?;
                    self.expect(b'%')?;
                    let on_false = ctx.label(&self.ident()?);
                    (Type::Void, InstKind::CondBr { cond, on_true, on_false })
                }
            }
            "switch" => {
                let cond_ty = self.parse_type()?;
                let cond = self.parse_operand(ctx, &cond_ty)?;
                self.expect(b',')?;
                self.expect_word("label")?;
                self.expect(b'%')?;
                let default = ctx.label(&self.ident()?);
                self.expect(b'[')?;
                let mut cases = Vec::new();
                while !self.eat(b']') {
                    self.parse_type()?;
                    let value = self.number()?;
                    self.expect(b',')?;
                    self.expect_word("label")?;
                    self.expect(b'%')?;
                    let target = ctx.label(&self.ident()?);
                    cases.push((value as i64, target));
                }
                (Type::Void, InstKind::Switch { cond, default, cases })
            }
            "ret" => {
                if self.eat_word("void") {
                    (Type::Void, InstKind::Ret { value: None })
                } else {
                    let ty = self.parse_type()?;
                    let value = self.parse_operand(ctx, &ty)?;
                    (Type::Void, InstKind::Ret { value: Some(value) })
                }
            }
            "unwind" => (Type::Void, InstKind::Unwind),
            "unreachable" => (Type::Void, InstKind::Unreachable),
            other => return Err(self.err(&format!("Instruction = {}\nUnsupported instruction", other))),
        };

        let result = match (&result_name, &ty) {
            (Some(name), ty) if !ty.is_void() => Some(ctx.local(name)),
            (Some(_), _) => return Err(self.err("cannot name a void result")),
            // An unnamed non-void result still defines a value (and needs
            // a slot, or the stack would be left unbalanced).
            (None, ty) if !ty.is_void() => Some(ctx.fresh()),
            (None, _) => None,
        };
        Ok(Inst { result, name: result_name, ty, kind })
    }

    /// The shared `<ty> <callee>(<args>)` tail of call and invoke. Returns
    /// the return type, the callee operand, and the argument list.
    fn parse_call_tail(&mut self, ctx: &mut FuncCtx) -> Result<(Type, Operand, Vec<Operand>), BackendError> {
        while matches!(self.peek_word().as_deref(), Some("ccc") | Some("fastcc") | Some("coldcc")) {
            self.word();
        }
        let ty = self.parse_type()?;
        let fn_ty = ty.fn_type().cloned();
        let ret = match &fn_ty {
            Some(f) => f.ret.clone(),
            None => ty.clone(),
        };
        self.skip_ws();
        let callee_ty = match fn_ty {
            Some(f) => Type::Func(Box::new(f)).pointer_to(),
            // Only the return type was spelled out; the full function type
            // is recovered from the argument list (or the declaration, in
            // the post-parse fixup).
            None => Type::Void,
        };
        let callee = if self.peek() == b'%' {
            self.advance();
            let name = self.ident()?;
            let id = ctx.local(&name);
            Operand::Local { id, ty: callee_ty, name: Some(name) }
        } else {
            self.expect(b'@')?;
            let name = self.ident()?;
            Operand::Const(Constant::GlobalRef { name, ty: callee_ty })
        };

        self.expect(b'(')?;
        let mut args = Vec::new();
        if !self.eat(b')') {
            loop {
                let aty = self.parse_type()?;
                self.skip_attr_words();
                args.push(self.parse_operand(ctx, &aty)?);
                if self.eat(b')') {
                    break;
                }
                self.expect(b',')?;
            }
        }
        self.skip_attr_words();

        // Reconstruct the callee's type when only a return type was given.
        let callee = match callee {
            Operand::Const(Constant::GlobalRef { name, ty }) if ty.is_void() => {
                let fn_ty = FuncType {
                    ret: ret.clone(),
                    params: args.iter().map(|a| a.ty()).collect(),
                    vararg: false,
                };
                Operand::Const(Constant::GlobalRef {
                    name,
                    ty: Type::Func(Box::new(fn_ty)).pointer_to(),
                })
            }
            Operand::Local { id, ty, name } if ty.is_void() => {
                let fn_ty = FuncType {
                    ret: ret.clone(),
                    params: args.iter().map(|a| a.ty()).collect(),
                    vararg: false,
                };
                Operand::Local { id, ty: Type::Func(Box::new(fn_ty)).pointer_to(), name }
            }
            other => other,
        };
        Ok((ret, callee, args))
    }

    // ── Operands and constants ───────────────────────────────────────────

    fn parse_operand(&mut self, ctx: &mut FuncCtx, ty: &Type) -> Result<Operand, BackendError> {
        self.skip_ws();
        if self.peek() == b'%' {
            self.advance();
            let name = self.ident()?;
            let id = ctx.local(&name);
            return Ok(Operand::Local { id, ty: ty.clone(), name: Some(name) });
        }
        Ok(Operand::Const(self.parse_constant(ty)?))
    }

    fn parse_constant(&mut self, ty: &Type) -> Result<Constant, BackendError> {
        self.skip_ws();
        match self.peek() {
            b'-' | b'0'..=b'9' => {
                if matches!(ty, Type::Float | Type::Double) {
                    let value = self.float_number()?;
                    return Ok(match ty {
                        Type::Float => Constant::Float(value as f32),
                        _ => Constant::Double(value),
                    });
                }
                let raw = self.number()?;
                let bits = match ty {
                    Type::Int(bits) => *bits,
                    _ => 32,
                };
                Ok(Constant::Int { bits, value: sign_extend(raw, bits) })
            }
            b'c' if self.peek_at(1) == b'"' => {
                self.advance();
                let bytes = self.string_bytes()?;
                Ok(Constant::Str { ty: ty.clone(), bytes })
            }
            b'[' | b'{' | b'<' => {
                let close = match self.peek() {
                    b'[' => b']',
                    b'{' => b'}',
                    _ => b'>',
                };
                self.advance();
                let mut elems = Vec::new();
                self.skip_ws();
                if !self.eat(close) {
                    loop {
                        let ety = self.parse_type()?;
                        elems.push(self.parse_constant(&ety)?);
                        if self.eat(close) {
                            break;
                        }
                        self.expect(b',')?;
                    }
                }
                Ok(Constant::Aggregate { ty: ty.clone(), elems })
            }
            b'@' => {
                self.advance();
                let name = self.ident()?;
                Ok(Constant::GlobalRef { name, ty: ty.clone() })
            }
            _ => {
                let word = self.word().ok_or_else(|| self.err("expected a constant"))?;
                match word.as_str() {
                    "null" => Ok(Constant::Null(ty.clone())),
                    "undef" => Ok(Constant::Undef(ty.clone())),
                    "zeroinitializer" => Ok(Constant::Zero(ty.clone())),
                    "true" => Ok(Constant::Int { bits: 1, value: -1 }),
                    "false" => Ok(Constant::Int { bits: 1, value: 0 }),
                    "getelementptr" => {
                        self.eat_word("inbounds");
                        self.expect(b'(')?;
                        let first = self.parse_type()?;
                        self.skip_ws();
                        let base_ty = if self.peek() == b',' {
                            self.expect(b',')?;
                            self.parse_type()?
                        } else {
                            first
                        };
                        let base = self.parse_constant(&base_ty)?;
                        let mut indices = Vec::new();
                        while self.eat(b',') {
                            let ity = self.parse_type()?;
                            indices.push(self.parse_constant(&ity)?);
                        }
                        self.expect(b')')?;
                        let index_ops: Vec<Operand> =
                            indices.iter().cloned().map(Operand::Const).collect();
                        let result = gep_result_type(self, &base_ty, &index_ops)?;
                        Ok(Constant::Expr(Box::new(ConstExpr {
                            ty: result,
                            kind: ConstExprKind::Gep { base, indices },
                        })))
                    }
                    "bitcast" | "inttoptr" | "ptrtoint" | "trunc" | "zext" | "sext" => {
                        let op = cast_from_name(&word);
                        self.expect(b'(')?;
                        let src_ty = self.parse_type()?;
                        let value = self.parse_constant(&src_ty)?;
                        self.expect_word("to")?;
                        let dest_ty = self.parse_type()?;
                        self.expect(b')')?;
                        Ok(Constant::Expr(Box::new(ConstExpr {
                            ty: dest_ty,
                            kind: ConstExprKind::Cast { op, value },
                        })))
                    }
                    other => Err(self.err(&format!("Constant = {}\nInvalid constant value", other))),
                }
            }
        }
    }

    // ── Types ────────────────────────────────────────────────────────────

    fn parse_type(&mut self) -> Result<Type, BackendError> {
        self.skip_ws();
        let mut ty = match self.peek() {
            b'[' => {
                self.advance();
                let n = self.number()? as u64;
                self.expect_word("x")?;
                let elem = self.parse_type()?;
                self.expect(b']')?;
                Type::Array(n, Box::new(elem))
            }
            b'<' => {
                self.advance();
                let n = self.number()? as u64;
                self.expect_word("x")?;
                let elem = self.parse_type()?;
                self.expect(b'>')?;
                Type::Vector(n, Box::new(elem))
            }
            b'{' => {
                self.advance();
                let mut fields = Vec::new();
                self.skip_ws();
                if !self.eat(b'}') {
                    loop {
                        fields.push(self.parse_type()?);
                        if self.eat(b'}') {
                            break;
                        }
                        self.expect(b',')?;
                    }
                }
                Type::Struct(fields)
            }
            _ => {
                let word = self.word().ok_or_else(|| self.err("expected a type"))?;
                match word.as_str() {
                    "void" => Type::Void,
                    "float" => Type::Float,
                    "double" => Type::Double,
                    _ => {
                        let bits = word
                            .strip_prefix('i')
                            .and_then(|w| w.parse::<u32>().ok())
                            .ok_or_else(|| self.err(&format!("Type = {}\nInvalid type", word)))?;
                        if !matches!(bits, 1 | 8 | 16 | 32 | 64) {
                            return Err(self.err(&format!("Bits = {}\nUnsupported integer width", bits)));
                        }
                        Type::Int(bits)
                    }
                }
            }
        };
        loop {
            self.skip_ws_no_comment();
            match self.peek() {
                b'*' => {
                    self.advance();
                    ty = ty.pointer_to();
                }
                b'(' => {
                    self.advance();
                    let mut params = Vec::new();
                    let mut vararg = false;
                    self.skip_ws();
                    if !self.eat(b')') {
                        loop {
                            if self.eat_word("...") {
                                vararg = true;
                                self.expect(b')')?;
                                break;
                            }
                            params.push(self.parse_type()?);
                            if self.eat(b')') {
                                break;
                            }
                            self.expect(b',')?;
                        }
                    }
                    ty = Type::Func(Box::new(FuncType { ret: ty, params, vararg }));
                }
                _ => break,
            }
        }
        Ok(ty)
    }

    // ── Lexical helpers ──────────────────────────────────────────────────

    fn at_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn peek(&self) -> u8 {
        if self.pos < self.src.len() {
            self.src[self.pos]
        } else {
            0
        }
    }

    fn peek_at(&self, offset: usize) -> u8 {
        if self.pos + offset < self.src.len() {
            self.src[self.pos + offset]
        } else {
            0
        }
    }

    fn advance(&mut self) {
        if self.peek() == b'\n' {
            self.line += 1;
        }
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' | b'\n' => self.advance(),
                b';' => {
                    while !self.at_eof() && self.peek() != b'\n' {
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Skip spaces but not comments or newlines; used between a type and
    /// its `*`/`(` suffixes.
    fn skip_ws_no_comment(&mut self) {
        while self.peek() == b' ' || self.peek() == b'\t' {
            self.advance();
        }
    }

    fn eat(&mut self, byte: u8) -> bool {
        self.skip_ws();
        if self.peek() == byte {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), BackendError> {
        if self.eat(byte) {
            Ok(())
        } else {
            Err(self.err(&format!("expected '{}'", byte as char)))
        }
    }

    fn is_word_byte(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'$' | b'-')
    }

    fn word(&mut self) -> Option<String> {
        self.skip_ws();
        let start = self.pos;
        while Self::is_word_byte(self.peek()) {
            self.advance();
        }
        if self.pos == start {
            None
        } else {
            Some(String::from_utf8_lossy(&self.src[start..self.pos]).into_owned())
        }
    }

    fn peek_word(&mut self) -> Option<String> {
        let save = (self.pos, self.line);
        let word = self.word();
        self.pos = save.0;
        self.line = save.1;
        word
    }

    fn eat_word(&mut self, expected: &str) -> bool {
        let save = (self.pos, self.line);
        match self.word() {
            Some(w) if w == expected => true,
            _ => {
                self.pos = save.0;
                self.line = save.1;
                false
            }
        }
    }

    fn expect_word(&mut self, expected: &str) -> Result<(), BackendError> {
        if self.eat_word(expected) {
            Ok(())
        } else {
            Err(self.err(&format!("expected '{}'", expected)))
        }
    }

    /// An identifier after `@` or `%`: a bare word or a quoted name.
    fn ident(&mut self) -> Result<String, BackendError> {
        if self.peek() == b'"' {
            return self.quoted_string();
        }
        self.word().ok_or_else(|| self.err("expected an identifier"))
    }

    fn quoted_string(&mut self) -> Result<String, BackendError> {
        self.skip_ws();
        if self.peek() != b'"' {
            return Err(self.err("expected a string"));
        }
        self.advance();
        let start = self.pos;
        while !self.at_eof() && self.peek() != b'"' {
            self.advance();
        }
        let s = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        self.expect(b'"')?;
        Ok(s)
    }

    /// Bytes of a `c"..."` string: `\XX` hex escapes, `\\` for backslash.
    fn string_bytes(&mut self) -> Result<Vec<u8>, BackendError> {
        if self.peek() != b'"' {
            return Err(self.err("expected a string constant"));
        }
        self.advance();
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                b'"' => {
                    self.advance();
                    break;
                }
                b'\\' => {
                    self.advance();
                    if self.peek() == b'\\' {
                        self.advance();
                        bytes.push(b'\\');
                    } else {
                        let hi = hex_digit(self.peek()).ok_or_else(|| self.err("bad string escape"))?;
                        self.advance();
                        let lo = hex_digit(self.peek()).ok_or_else(|| self.err("bad string escape"))?;
                        self.advance();
                        bytes.push((hi << 4) | lo);
                    }
                }
                0 => return Err(self.err("unterminated string constant")),
                b => {
                    self.advance();
                    bytes.push(b);
                }
            }
        }
        Ok(bytes)
    }

    fn number(&mut self) -> Result<i128, BackendError> {
        self.skip_ws();
        let negative = if self.peek() == b'-' {
            self.advance();
            true
        } else {
            false
        };
        let start = self.pos;
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.pos == start {
            return Err(self.err("expected a number"));
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        let value: i128 = text
            .parse::<u128>()
            .map_err(|_| self.err("integer literal out of range"))? as i128;
        Ok(if negative { -value } else { value })
    }

    /// A float literal: decimal with optional fraction/exponent, or the
    /// `0x...` form carrying raw IEEE double bits.
    fn float_number(&mut self) -> Result<f64, BackendError> {
        self.skip_ws();
        let start = self.pos;
        if self.peek() == b'-' {
            self.advance();
        }
        if self.peek() == b'0' && (self.peek_at(1) == b'x' || self.peek_at(1) == b'X') {
            self.advance();
            self.advance();
            let hex_start = self.pos;
            while self.peek().is_ascii_hexdigit() {
                self.advance();
            }
            let text = std::str::from_utf8(&self.src[hex_start..self.pos]).unwrap();
            let bits = u64::from_str_radix(text, 16).map_err(|_| self.err("bad float literal"))?;
            let value = f64::from_bits(bits);
            return Ok(if self.src[start] == b'-' { -value } else { value });
        }
        while self.peek().is_ascii_digit() {
            self.advance();
        }
        if self.peek() == b'.' {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        if self.peek() == b'e' || self.peek() == b'E' {
            self.advance();
            if self.peek() == b'+' || self.peek() == b'-' {
                self.advance();
            }
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }
        let text = std::str::from_utf8(&self.src[start..self.pos]).unwrap();
        text.parse::<f64>().map_err(|_| self.err("bad float literal"))
    }

    fn skip_align_clause(&mut self) -> Result<(), BackendError> {
        let save = (self.pos, self.line);
        if self.eat(b',') {
            if self.eat_word("align") {
                self.number()?;
            } else {
                self.pos = save.0;
                self.line = save.1;
            }
        }
        Ok(())
    }

    /// Skip `, align N` / `, section "..."` tails on globals.
    fn skip_tail_clauses(&mut self) -> Result<(), BackendError> {
        loop {
            let save = (self.pos, self.line);
            if !self.eat(b',') {
                return Ok(());
            }
            if self.eat_word("align") {
                self.number()?;
            } else if self.eat_word("section") {
                self.quoted_string()?;
            } else {
                self.pos = save.0;
                self.line = save.1;
                return Ok(());
            }
        }
    }

    fn skip_attr_words(&mut self) {
        const ATTRS: &[&str] = &[
            "nounwind", "readnone", "readonly", "noinline", "alwaysinline", "nocapture",
            "noalias", "zeroext", "signext", "inreg", "byval", "sret", "nest", "ssp",
            "sspreq", "noreturn", "nsw", "nuw",
        ];
        loop {
            match self.peek_word() {
                Some(w) if ATTRS.contains(&w.as_str()) => {
                    self.word();
                }
                _ => return,
            }
        }
    }

    fn err(&self, msg: &str) -> BackendError {
        BackendError::Parse {
            file: self.file.clone(),
            line: self.line,
            msg: msg.to_string(),
        }
    }
}

/// Walk the type structure indexed by a GEP to compute its result type.
fn gep_result_type(
    parser: &Parser<'_>,
    base_ty: &Type,
    indices: &[Operand],
) -> Result<Type, BackendError> {
    let mut cur = base_ty
        .pointee()
        .cloned()
        .ok_or_else(|| parser.err("getelementptr requires a pointer base"))?;
    for idx in &indices[1.min(indices.len())..] {
        cur = match cur {
            Type::Array(_, elem) | Type::Vector(_, elem) => *elem,
            Type::Pointer(elem) => *elem,
            Type::Struct(fields) => {
                let field = match idx {
                    Operand::Const(Constant::Int { value, .. }) => *value as usize,
                    _ => return Err(parser.err("structure index must be a constant")),
                };
                fields
                    .get(field)
                    .cloned()
                    .ok_or_else(|| parser.err("structure index out of range"))?
            }
            other => return Err(parser.err(&format!("Type = {}\ncannot index into type", other))),
        };
    }
    Ok(cur.pointer_to())
}

fn sign_extend(value: i128, bits: u32) -> i64 {
    if bits >= 64 {
        return value as i64;
    }
    let shift = 64 - bits;
    (((value as i64) << shift) >> shift) as i64
}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn binop_from_name(name: &str) -> BinOp {
    match name {
        "add" | "fadd" => BinOp::Add,
        "sub" | "fsub" => BinOp::Sub,
        "mul" | "fmul" => BinOp::Mul,
        "sdiv" | "fdiv" => BinOp::Div,
        "udiv" => BinOp::UDiv,
        "srem" | "frem" => BinOp::Rem,
        "urem" => BinOp::URem,
        "and" => BinOp::And,
        "or" => BinOp::Or,
        "xor" => BinOp::Xor,
        "shl" => BinOp::Shl,
        "lshr" => BinOp::LShr,
        "ashr" => BinOp::AShr,
        _ => unreachable!("binop_from_name called with non-binop"),
    }
}

fn cast_from_name(name: &str) -> CastOp {
    match name {
        "trunc" => CastOp::Trunc,
        "zext" => CastOp::ZExt,
        "sext" => CastOp::SExt,
        "fptrunc" => CastOp::FPTrunc,
        "fpext" => CastOp::FPExt,
        "uitofp" => CastOp::UIToFP,
        "sitofp" => CastOp::SIToFP,
        "fptoui" => CastOp::FPToUI,
        "fptosi" => CastOp::FPToSI,
        "ptrtoint" => CastOp::PtrToInt,
        "inttoptr" => CastOp::IntToPtr,
        "bitcast" => CastOp::BitCast,
        _ => unreachable!("cast_from_name called with non-cast"),
    }
}

fn int_pred_from_name(name: &str) -> Option<IntPred> {
    Some(match name {
        "eq" => IntPred::Eq,
        "ne" => IntPred::Ne,
        "ugt" => IntPred::Ugt,
        "uge" => IntPred::Uge,
        "ult" => IntPred::Ult,
        "ule" => IntPred::Ule,
        "sgt" => IntPred::Sgt,
        "sge" => IntPred::Sge,
        "slt" => IntPred::Slt,
        "sle" => IntPred::Sle,
        _ => return None,
    })
}

fn float_pred_from_name(name: &str) -> Option<FloatPred> {
    Some(match name {
        "oeq" => FloatPred::Oeq,
        "ogt" => FloatPred::Ogt,
        "oge" => FloatPred::Oge,
        "olt" => FloatPred::Olt,
        "ole" => FloatPred::Ole,
        "one" => FloatPred::One,
        "ord" => FloatPred::Ord,
        "ueq" => FloatPred::Ueq,
        "ugt" => FloatPred::Ugt,
        "uge" => FloatPred::Uge,
        "ult" => FloatPred::Ult,
        "ule" => FloatPred::Ule,
        "une" => FloatPred::Une,
        "uno" => FloatPred::Uno,
        _ => return None,
    })
}

/// Post-parse fixup: `@name` references resolve against the module. A
/// reference to a declared or defined function becomes a `FuncRef`
/// carrying the real function type (so vararg call sites split their
/// arguments correctly); a reference to an unknown name is an error.
fn resolve_global_refs(module: &mut Module) -> Result<(), BackendError> {
    // Collect function signatures first; the walk below needs them while
    // the module is mutably borrowed.
    let fn_types: HashMap<String, Type> = module
        .functions
        .iter()
        .map(|f| (f.name.clone(), Type::Func(Box::new(f.fn_type())).pointer_to()))
        .collect();
    let global_names: Vec<String> = module.globals.iter().map(|g| g.name.clone()).collect();

    let fix_constant = |c: &mut Constant| -> Result<(), BackendError> {
        fix_constant_rec(c, &fn_types, &global_names)
    };

    for global in &mut module.globals {
        if let Some(init) = &mut global.init {
            fix_constant(init)?;
        }
    }
    for func in &mut module.functions {
        for block in &mut func.blocks {
            for inst in &mut block.insts {
                visit_operands_mut(&mut inst.kind, &mut |op| {
                    if let Operand::Const(c) = op {
                        fix_constant(c)?;
                    }
                    Ok(())
                })?;
            }
        }
    }
    Ok(())
}

fn fix_constant_rec(
    c: &mut Constant,
    fn_types: &HashMap<String, Type>,
    global_names: &[String],
) -> Result<(), BackendError> {
    match c {
        Constant::GlobalRef { name, .. } => {
            if let Some(fn_ty) = fn_types.get(name) {
                *c = Constant::FuncRef { name: name.clone(), ty: fn_ty.clone() };
            } else if !global_names.iter().any(|g| g == name) {
                return Err(BackendError::Parse {
                    file: String::new(),
                    line: 0,
                    msg: format!("reference to undefined global @{}", name),
                });
            }
        }
        Constant::Aggregate { elems, .. } => {
            for e in elems {
                fix_constant_rec(e, fn_types, global_names)?;
            }
        }
        Constant::Expr(e) => match &mut e.kind {
            ConstExprKind::Cast { value, .. } => fix_constant_rec(value, fn_types, global_names)?,
            ConstExprKind::Binary { lhs, rhs, .. } | ConstExprKind::Cmp { lhs, rhs, .. } => {
                fix_constant_rec(lhs, fn_types, global_names)?;
                fix_constant_rec(rhs, fn_types, global_names)?;
            }
            ConstExprKind::Gep { base, indices } => {
                fix_constant_rec(base, fn_types, global_names)?;
                for i in indices {
                    fix_constant_rec(i, fn_types, global_names)?;
                }
            }
            ConstExprKind::Select { cond, on_true, on_false } => {
                fix_constant_rec(cond, fn_types, global_names)?;
                fix_constant_rec(on_true, fn_types, global_names)?;
                fix_constant_rec(on_false, fn_types, global_names)?;
            }
        },
        _ => {}
    }
    Ok(())
}

fn visit_operands_mut(
    kind: &mut InstKind,
    visit: &mut dyn FnMut(&mut Operand) -> Result<(), BackendError>,
) -> Result<(), BackendError> {
    match kind {
        InstKind::Binary { lhs, rhs, .. } | InstKind::Cmp { lhs, rhs, .. } => {
            visit(lhs)?;
            visit(rhs)
        }
        InstKind::Cast { value, .. } => visit(value),
        InstKind::Gep { base, indices } => {
            visit(base)?;
            for idx in indices {
                visit(idx)?;
            }
            Ok(())
        }
        InstKind::Alloca { count, .. } => visit(count),
        InstKind::Load { ptr } => visit(ptr),
        InstKind::Store { val, ptr } => {
            visit(val)?;
            visit(ptr)
        }
        InstKind::Phi { incoming } => {
            for (val, _) in incoming {
                visit(val)?;
            }
            Ok(())
        }
        InstKind::Select { cond, on_true, on_false } => {
            visit(cond)?;
            visit(on_true)?;
            visit(on_false)
        }
        InstKind::Call { callee, args } | InstKind::Invoke { callee, args, .. } => {
            visit(callee)?;
            for a in args {
                visit(a)?;
            }
            Ok(())
        }
        InstKind::VaArg { list } => visit(list),
        InstKind::CondBr { cond, .. } => visit(cond),
        InstKind::Switch { cond, .. } => visit(cond),
        InstKind::Ret { value: Some(v) } => visit(v),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_globals_and_declarations() {
        let module = parse_module(
            "@counter = global i32 0\n\
             @msg = internal constant [6 x i8] c\"hello\\00\"\n\
             @ext = external global i32\n\
             declare i32 @printf(i8*, ...)\n",
            "t.ll",
        )
        .unwrap();
        assert_eq!(module.globals.len(), 3);
        assert!(module.globals[2].is_declaration());
        assert_eq!(module.globals[1].linkage, Linkage::Internal);
        match module.globals[1].init.as_ref().unwrap() {
            Constant::Str { bytes, .. } => {
                assert_eq!(bytes, b"hello\0");
                assert!(Constant::is_cstring(bytes));
            }
            other => panic!("expected string constant, got {:?}", other),
        }
        let printf = module.get_function("printf").unwrap();
        assert!(printf.vararg);
        assert!(printf.is_declaration());
    }

    #[test]
    fn parses_function_with_blocks_and_phi() {
        let module = parse_module(
            "define i32 @f(i32 %n) {\n\
             entry:\n\
             \t%c = icmp sgt i32 %n, 0\n\
             \tbr i1 %c, label %pos, label %done\n\
             pos:\n\
             \t%d = add i32 %n, 1\n\
             \tbr label %done\n\
             done:\n\
             \t%r = phi i32 [ %d, %pos ], [ 0, %entry ]\n\
             \tret i32 %r\n\
             }\n",
            "t.ll",
        )
        .unwrap();
        let f = &module.functions[0];
        assert_eq!(f.blocks.len(), 3);
        let done = &f.blocks[2];
        assert!(done.starts_with_phi());
        match &done.insts[0].kind {
            InstKind::Phi { incoming } => {
                assert_eq!(incoming.len(), 2);
                assert_eq!(incoming[0].1, BlockId(1));
                assert_eq!(incoming[1].1, BlockId(0));
            }
            other => panic!("expected phi, got {:?}", other),
        }
    }

    #[test]
    fn call_to_declared_function_becomes_func_ref() {
        let module = parse_module(
            "declare i32 @printf(i8*, ...)\n\
             @fmt = constant [3 x i8] c\"%d\\00\"\n\
             define void @f(i32 %x) {\n\
             entry:\n\
             \t%s = getelementptr [3 x i8]* @fmt, i32 0, i32 0\n\
             \t%r = call i32 (i8*, ...)* @printf(i8* %s, i32 %x)\n\
             \tret void\n\
             }\n",
            "t.ll",
        )
        .unwrap();
        let f = module.get_function("f").unwrap();
        match &f.blocks[0].insts[1].kind {
            InstKind::Call { callee, args } => {
                assert_eq!(args.len(), 2);
                match callee {
                    Operand::Const(Constant::FuncRef { name, ty }) => {
                        assert_eq!(name, "printf");
                        assert!(ty.fn_type().unwrap().vararg);
                    }
                    other => panic!("expected FuncRef callee, got {:?}", other),
                }
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn typed_load_and_gep_spellings() {
        let module = parse_module(
            "@g = global i32 7\n\
             define i32 @f() {\n\
             entry:\n\
             \t%p = getelementptr i32, i32* @g, i32 0\n\
             \t%v = load i32, i32* %p\n\
             \t%w = load i32* %p, align 4\n\
             \t%s = add i32 %v, %w\n\
             \tret i32 %s\n\
             }\n",
            "t.ll",
        )
        .unwrap();
        let f = module.get_function("f").unwrap();
        assert_eq!(f.blocks[0].insts.len(), 5);
        assert_eq!(f.blocks[0].insts[1].ty, Type::Int(32));
        assert_eq!(f.blocks[0].insts[2].ty, Type::Int(32));
    }

    #[test]
    fn switch_and_terminators() {
        let module = parse_module(
            "define void @f(i32 %x) {\n\
             entry:\n\
             \tswitch i32 %x, label %d [ i32 4, label %a\n\
             \t\ti32 6, label %b ]\n\
             a:\n\tret void\n\
             b:\n\tunreachable\n\
             d:\n\tret void\n\
             }\n",
            "t.ll",
        )
        .unwrap();
        let f = module.get_function("f").unwrap();
        match &f.blocks[0].terminator().kind {
            InstKind::Switch { cases, default, .. } => {
                assert_eq!(cases.len(), 2);
                assert_eq!(cases[0].0, 4);
                assert_eq!(*default, BlockId(3));
            }
            other => panic!("expected switch, got {:?}", other),
        }
    }

    #[test]
    fn rejects_wide_pointers() {
        let err = parse_module("target datalayout = \"e-p:64:64:64\"\n", "t.ll").unwrap_err();
        assert!(err.to_string().contains("32-bit"));
    }

    #[test]
    fn negative_and_wide_integers_sign_extend() {
        let module = parse_module("@a = global i8 -1\n@b = global i64 4294967296\n", "t.ll").unwrap();
        match module.globals[0].init.as_ref().unwrap() {
            Constant::Int { bits: 8, value: -1 } => {}
            other => panic!("bad i8 constant: {:?}", other),
        }
        match module.globals[1].init.as_ref().unwrap() {
            Constant::Int { bits: 64, value } => assert_eq!(*value, 1 << 32),
            other => panic!("bad i64 constant: {:?}", other),
        }
    }
}
