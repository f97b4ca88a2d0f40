//! Emitter state: the output buffer plus per-module and per-function
//! bookkeeping.
//!
//! Per-module state lives for the whole pass sequence: the class and
//! source names, the set of external references (consulted to decide
//! whether a symbol is qualified with the class name), the running
//! instruction counter for `.line`, and the unique-id counter for
//! synthesised labels. Per-function state (slot table, register counter,
//! vararg slot, block label ids, loop forest) is reset at every function
//! entry and dies at `.end method`.

use std::collections::{HashMap, HashSet};

use crate::common::types::TargetData;
use crate::ir::analysis::LoopInfo;
use crate::ir::ir::{Function, Module, ValueId};

use super::types::bit_width;

/// Line-oriented assembly output buffer.
pub struct AsmOutput {
    pub buf: String,
}

impl AsmOutput {
    pub fn new() -> Self {
        AsmOutput { buf: String::new() }
    }

    /// Append one line.
    pub fn emit(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    /// Append one formatted line without an intermediate allocation.
    #[inline]
    pub fn emit_fmt(&mut self, args: std::fmt::Arguments<'_>) {
        use std::fmt::Write;
        let _ = self.buf.write_fmt(args);
        self.buf.push('\n');
    }
}

/// The Jasmin writer: one instance per module.
pub struct JvmWriter<'m> {
    pub(super) module: &'m Module,
    pub(super) target: TargetData,
    pub(super) out: AsmOutput,
    /// Binary class name, `/`-separated.
    pub(super) classname: String,
    /// Basename of the module identifier, for `.source`.
    pub(super) sourcename: String,
    /// Debug level 0..3 controlling `.source`/`.line`, `.var`, and
    /// commented-IR annotations.
    pub(super) debug: u32,

    /// Names of declaration-only globals and functions. References to
    /// members are emitted unqualified; everything else is qualified with
    /// the class name.
    pub(super) extern_refs: HashSet<String>,
    /// Running instruction counter for `.line` directives.
    pub(super) inst_num: u32,
    next_uid: u64,

    /// Mapping of values to local variable slots.
    pub(super) local_vars: HashMap<ValueId, u32>,
    /// Next free slot; 64-bit values advance it by two.
    pub(super) used_registers: u32,
    /// Slot holding the packed-vararg-area pointer, if variadic.
    pub(super) va_arg_num: Option<u32>,
    /// Per-block label ids, allocated on first lookup.
    pub(super) block_ids: HashMap<u32, u32>,
    pub(super) next_block_id: u32,

    pub(super) cur_func: Option<&'m Function>,
    pub(super) loop_info: LoopInfo,
}

impl<'m> JvmWriter<'m> {
    pub fn new(module: &'m Module, classname: Option<&str>, debug: u32) -> Self {
        let sourcename = match module.name.rfind('/') {
            Some(pos) => module.name[pos + 1..].to_string(),
            None => module.name.clone(),
        };
        let classname = match classname {
            Some(name) => name.replace('.', "/"),
            None => {
                let stem = match sourcename.rfind('.') {
                    Some(pos) => &sourcename[..pos],
                    None => sourcename.as_str(),
                };
                stem.replace('.', "_")
            }
        };

        JvmWriter {
            module,
            target: TargetData::new(),
            out: AsmOutput::new(),
            classname,
            sourcename,
            debug,
            extern_refs: HashSet::new(),
            inst_num: 0,
            next_uid: 0,
            local_vars: HashMap::new(),
            used_registers: 0,
            va_arg_num: None,
            block_ids: HashMap::new(),
            next_block_id: 0,
            cur_func: None,
            loop_info: LoopInfo::default(),
        }
    }

    /// Run the whole pass sequence: module sections, then every function
    /// definition in module order. Finalisation is a no-op.
    pub fn run(&mut self) {
        self.print_module_sections();
        let module = self.module;
        for func in &module.functions {
            if !func.is_declaration() {
                self.print_function(func);
            }
        }
    }

    pub fn into_output(self) -> String {
        self.out.buf
    }

    /// Reset per-function state at method entry.
    pub(super) fn reset_for_function(&mut self, func: &'m Function) {
        self.local_vars.clear();
        self.block_ids.clear();
        self.next_block_id = 0;
        self.used_registers = 0;
        self.va_arg_num = None;
        self.cur_func = Some(func);
        self.loop_info = LoopInfo::compute(func);
    }

    /// Unique id for synthesised labels (`$phi`, `select`, `$invoke`).
    pub(super) fn get_uid(&mut self) -> u64 {
        self.next_uid += 1;
        self.next_uid
    }

    /// The local variable slot of `v`, allocating on first use. 64-bit
    /// values reserve two consecutive slots.
    pub(super) fn local_var_number(&mut self, v: ValueId, ty: &crate::common::types::Type) -> u32 {
        if let Some(&slot) = self.local_vars.get(&v) {
            return slot;
        }
        let slot = self.used_registers;
        self.used_registers += 1;
        if bit_width(ty, false) == 64 {
            self.used_registers += 1;
        }
        self.local_vars.insert(v, slot);
        slot
    }

    /// The already-assigned slot of `v`, if any.
    pub(super) fn slot_of(&self, v: ValueId) -> Option<u32> {
        self.local_vars.get(&v).copied()
    }

    pub(super) fn is_extern_ref(&self, name: &str) -> bool {
        self.extern_refs.contains(name)
    }

    /// The function currently being emitted.
    pub(super) fn func(&self) -> &'m Function {
        self.cur_func.expect("no current function")
    }
}
