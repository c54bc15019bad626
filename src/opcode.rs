//! Bytecode opcodes. A compiled program is a flat `Vec<u8>` of these; loads,
//! stores and jumps take their operands from side tables indexed by running
//! cursors, so no opcode carries inline operands.

use crate::lexer::Func;

pub const OP_LOAD: u8 = 0;
pub const OP_STORE: u8 = 1;
pub const OP_CLEAR: u8 = 2;
pub const OP_END_INIT: u8 = 3;
pub const OP_JUMP: u8 = 4;
pub const OP_JUMP_ON_FALSE: u8 = 5;
pub const OP_JUMP_ON_TRUE: u8 = 6;
pub const OP_JUMP_LABEL: u8 = 7;
pub const OP_ADD: u8 = 8;
pub const OP_SUB: u8 = 9;
pub const OP_MUL: u8 = 10;
pub const OP_DIV: u8 = 11;
pub const OP_POW: u8 = 12;
pub const OP_NEG: u8 = 13;
pub const OP_MOD: u8 = 14;
pub const OP_LT: u8 = 15;
pub const OP_LE: u8 = 16;
pub const OP_GT: u8 = 17;
pub const OP_GE: u8 = 18;
pub const OP_EQ: u8 = 19;
pub const OP_NE: u8 = 20;
pub const OP_OR: u8 = 21;
pub const OP_AND: u8 = 22;
/// Function opcodes follow, in `Func::ALL` order.
pub const OP_FUNC_BASE: u8 = 23;

pub const OP_COUNT: usize = OP_FUNC_BASE as usize + Func::COUNT;

pub fn func(f: Func) -> u8 {
    OP_FUNC_BASE + f.index() as u8
}

pub fn as_func(op: u8) -> Option<Func> {
    op.checked_sub(OP_FUNC_BASE)
        .and_then(|i| Func::ALL.get(i as usize).copied())
}

/// Mnemonic for dumps.
pub fn name(op: u8) -> &'static str {
    match op {
        OP_LOAD => "load",
        OP_STORE => "store",
        OP_CLEAR => "clear",
        OP_END_INIT => "end_init",
        OP_JUMP => "jump",
        OP_JUMP_ON_FALSE => "jump_on_false",
        OP_JUMP_ON_TRUE => "jump_on_true",
        OP_JUMP_LABEL => "jump_label",
        OP_ADD => "add",
        OP_SUB => "sub",
        OP_MUL => "mul",
        OP_DIV => "div",
        OP_POW => "pow",
        OP_NEG => "neg",
        OP_MOD => "mod",
        OP_LT => "lt",
        OP_LE => "le",
        OP_GT => "gt",
        OP_GE => "ge",
        OP_EQ => "eq",
        OP_NE => "ne",
        OP_OR => "or",
        OP_AND => "and",
        _ => match as_func(op) {
            Some(f) => f.name(),
            None => "?",
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_opcodes_round_trip() {
        for f in Func::ALL {
            assert_eq!(as_func(func(f)), Some(f));
            assert_eq!(name(func(f)), f.name());
        }
        assert_eq!(as_func(OP_AND), None);
        assert_eq!(as_func(OP_COUNT as u8), None);
    }

    #[test]
    fn primitive_names_are_distinct() {
        let mut names: Vec<_> = (0..OP_FUNC_BASE).map(name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), OP_FUNC_BASE as usize);
        assert!(!names.contains(&"?"));
    }
}
