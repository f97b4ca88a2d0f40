//! The name oracle: deterministic, sanitised names for values and labels.

use crate::ir::ir::{BlockId, Constant, Operand};

use super::JvmWriter;

/// Replace any non-alphanumeric character with an underscore.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Mangled external name of a global value.
pub fn mangled_name(name: &str) -> String {
    format!("_{}", name)
}

impl<'m> JvmWriter<'m> {
    /// The emitted name of a global value (variable or function).
    pub(super) fn global_name(&self, name: &str) -> String {
        sanitize_name(&mangled_name(name))
    }

    /// The name of the given operand, for assembly comments.
    pub(super) fn value_name(&self, op: &Operand) -> String {
        match op {
            Operand::Const(Constant::GlobalRef { name, .. })
            | Operand::Const(Constant::FuncRef { name, .. }) => self.global_name(name),
            Operand::Local { name: Some(name), .. } => format!("_{}", sanitize_name(name)),
            Operand::Local { id, .. } => match self.slot_of(*id) {
                Some(slot) => format!("_{}", slot),
                None => "_".to_string(),
            },
            Operand::Const(_) => "_".to_string(),
        }
    }

    /// The label of a basic block. A monotonic id is allocated on first
    /// lookup, guaranteeing label uniqueness across the method.
    pub(super) fn label_name(&mut self, block: BlockId) -> String {
        let next = &mut self.next_block_id;
        let id = *self.block_ids.entry(block.0).or_insert_with(|| {
            *next += 1;
            *next
        });
        sanitize_name(&format!("label{}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_non_alphanumerics() {
        assert_eq!(sanitize_name("a.b-c$d"), "a_b_c_d");
        assert_eq!(sanitize_name("plain123"), "plain123");
    }

    #[test]
    fn mangling_prefixes_an_underscore() {
        assert_eq!(mangled_name("factorial"), "_factorial");
        assert_eq!(sanitize_name(&mangled_name("llvm.x")), "_llvm_x");
    }
}
