//! The type oracle: IR types to JVM type IDs, descriptors, postfixes and
//! stack-op prefixes.
//!
//! `expand` widens sub-32-bit integers to 32 bits, matching how such
//! values actually live on the JVM operand stack and in local slots.

use crate::common::types::Type;

/// Bit width of a type. Aggregates and pointers are 32 (heap addresses).
pub fn bit_width(ty: &Type, expand: bool) -> u32 {
    match ty {
        Type::Array(..) | Type::Vector(..) | Type::Struct(_) | Type::Pointer(_) => 32,
        Type::Int(n) => match n {
            1 | 8 | 16 | 32 => {
                if expand {
                    32
                } else {
                    *n
                }
            }
            64 => 64,
            _ => panic!("Bits = {}\nUnsupported integer width", n),
        },
        Type::Float => 32,
        Type::Double => 64,
        _ => panic!("Bits = 0\nUnsupported integer width"),
    }
}

/// Single-character JVM type ID.
pub fn type_id(ty: &Type, expand: bool) -> char {
    match ty {
        Type::Void => 'V',
        Type::Int(_) => match bit_width(ty, expand) {
            1 => 'Z',
            8 => 'B',
            16 => 'S',
            32 => 'I',
            64 => 'J',
            _ => unreachable!(),
        },
        Type::Float => 'F',
        Type::Double => 'D',
        Type::Pointer(_) | Type::Struct(_) | Type::Array(..) | Type::Vector(..) => 'I',
        _ => panic!("Type = {}\nInvalid type", ty),
    }
}

/// Type descriptor as used in call-signature syntax `(params…)return`.
pub fn type_descriptor(ty: &Type, expand: bool) -> String {
    type_id(ty, expand).to_string()
}

/// Postfix naming the runtime method variant (`load_i32`, `invoke_f64`…).
pub fn type_postfix(ty: &Type, expand: bool) -> String {
    match ty {
        Type::Void => "void".to_string(),
        Type::Int(_) => format!("i{}", bit_width(ty, expand)),
        Type::Float => "f32".to_string(),
        Type::Double => "f64".to_string(),
        Type::Pointer(_) | Type::Struct(_) | Type::Array(..) | Type::Vector(..) => {
            "i32".to_string()
        }
        _ => panic!("Type = {}\nInvalid type", ty),
    }
}

/// Stack-op family prefix (`iload`, `lstore`, `dreturn`…).
pub fn type_prefix(ty: &Type, expand: bool) -> &'static str {
    match type_id(ty, expand) {
        'Z' | 'B' => "b",
        'S' => "s",
        'I' => "i",
        'J' => "l",
        'F' => "f",
        'D' => "d",
        _ => panic!("Type = {}\nvoid has no prefix", ty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Type;

    #[test]
    fn ids_cover_the_matrix() {
        assert_eq!(type_id(&Type::Void, false), 'V');
        assert_eq!(type_id(&Type::Int(1), false), 'Z');
        assert_eq!(type_id(&Type::Int(8), false), 'B');
        assert_eq!(type_id(&Type::Int(16), false), 'S');
        assert_eq!(type_id(&Type::Int(32), false), 'I');
        assert_eq!(type_id(&Type::Int(64), false), 'J');
        assert_eq!(type_id(&Type::Float, false), 'F');
        assert_eq!(type_id(&Type::Double, false), 'D');
        assert_eq!(type_id(&Type::Int(8).pointer_to(), false), 'I');
        assert_eq!(type_id(&Type::Struct(vec![Type::Int(8)]), false), 'I');
    }

    #[test]
    fn expansion_widens_narrow_integers() {
        assert_eq!(type_id(&Type::Int(1), true), 'I');
        assert_eq!(type_id(&Type::Int(8), true), 'I');
        assert_eq!(type_id(&Type::Int(16), true), 'I');
        assert_eq!(type_id(&Type::Int(32), true), 'I');
        assert_eq!(type_id(&Type::Int(64), true), 'J');
        assert_eq!(bit_width(&Type::Int(16), true), 32);
        assert_eq!(bit_width(&Type::Int(16), false), 16);
    }

    #[test]
    fn postfix_and_prefix() {
        assert_eq!(type_postfix(&Type::Int(8), false), "i8");
        assert_eq!(type_postfix(&Type::Int(8), true), "i32");
        assert_eq!(type_postfix(&Type::Double, false), "f64");
        assert_eq!(type_postfix(&Type::Int(32).pointer_to(), false), "i32");
        assert_eq!(type_prefix(&Type::Int(8), false), "b");
        assert_eq!(type_prefix(&Type::Int(8), true), "i");
        assert_eq!(type_prefix(&Type::Int(64), false), "l");
        assert_eq!(type_prefix(&Type::Float, false), "f");
    }

    #[test]
    fn oracle_is_idempotent() {
        let ty = Type::Int(16);
        assert_eq!(type_descriptor(&ty, true), type_descriptor(&ty, true));
        assert_eq!(type_prefix(&ty, false), type_prefix(&ty, false));
    }

    #[test]
    #[should_panic(expected = "void has no prefix")]
    fn void_prefix_is_fatal() {
        type_prefix(&Type::Void, false);
    }
}
