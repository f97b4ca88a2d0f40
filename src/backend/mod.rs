//! The Jasmin emitter.
//!
//! `JvmWriter` is a per-function pass over the module, run in module order
//! after the module-level sections have been written. Its methods are split
//! across the files of this module the way the responsibilities split:
//! type and name oracles, one-line emission primitives, constant loading
//! and static packing, value/indirect load-store, the per-opcode lowering,
//! control flow, calls, the function driver, the section driver, and the
//! block driver.

mod block;
mod branch;
mod calls;
mod constants;
mod function;
mod instructions;
mod loadstore;
mod names;
mod printinst;
mod sections;
mod state;
pub mod types;

#[cfg(test)]
mod tests;

pub use state::JvmWriter;

use crate::ir::ir::Module;

/// Emit the whole module, returning the assembly listing.
pub fn write_module(module: &Module, classname: Option<&str>, debug: u32) -> String {
    let mut writer = JvmWriter::new(module, classname, debug);
    writer.run();
    writer.into_output()
}
