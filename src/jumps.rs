//! Resolve `if`/`elseif`/`else`/`endif` jump targets after compilation.
//!
//! Each jump entry gets the position of the opcode it lands on and the jump
//! table index to continue from. A false `if`/`elseif` condition lands on
//! the next branch of its group; the unconditional jump that ends a taken
//! branch lands on the group's `endif`.

use tracing::trace;

use crate::compiler::{JumpTarget, Program};
use crate::lexer::Jump;
use crate::opcode::*;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JumpError {
    #[error("jump table has {entries} entries but the code has {ops} jump opcodes")]
    CountMismatch { entries: usize, ops: usize },
    #[error("jump entry {index} is a {kind:?} but its opcode is {found}")]
    WrongOpcode {
        index: usize,
        kind: Jump,
        found: &'static str,
    },
    #[error("if/endif blocks are unbalanced")]
    Unbalanced,
}

/// Opcode each entry must correspond to. The two entries an `elseif`
/// queues are the jump out of the previous branch, then its own test.
fn expected_ops(program: &Program) -> Vec<u8> {
    let mut second_half = false;
    program
        .jumps
        .iter()
        .map(|j| match j.kind {
            Jump::If => OP_JUMP_ON_FALSE,
            Jump::ElseIf => {
                second_half = !second_half;
                if second_half { OP_JUMP } else { OP_JUMP_ON_FALSE }
            }
            Jump::Else => OP_JUMP,
            Jump::EndIf => OP_JUMP_LABEL,
        })
        .collect()
}

fn positions(program: &Program) -> Result<Vec<JumpTarget>, JumpError> {
    let expected = expected_ops(program);
    let mut out = Vec::with_capacity(program.jumps.len());
    let (mut loads, mut stores) = (0, 0);
    for (op_ptr, &op) in program.code.iter().enumerate() {
        match op {
            OP_LOAD => loads += 1,
            OP_STORE => stores += 1,
            OP_JUMP | OP_JUMP_ON_FALSE | OP_JUMP_ON_TRUE | OP_JUMP_LABEL => {
                let index = out.len();
                if let Some(&want) = expected.get(index) {
                    if want != op {
                        return Err(JumpError::WrongOpcode {
                            index,
                            kind: program.jumps[index].kind,
                            found: name(op),
                        });
                    }
                }
                out.push(JumpTarget {
                    op_ptr,
                    loads,
                    stores,
                });
            }
            _ => {}
        }
    }
    if out.len() != program.jumps.len() {
        return Err(JumpError::CountMismatch {
            entries: program.jumps.len(),
            ops: out.len(),
        });
    }
    Ok(out)
}

/// Fill every entry of the group closed by the `endif` at `endif`, walking
/// back to its `if`. Returns the index of that `if`.
fn fill_group(program: &mut Program, at: &[JumpTarget], endif: usize) -> Result<usize, JumpError> {
    let mut i = endif;
    let mut next_branch = endif;
    while i > 0 {
        i -= 1;
        match program.jumps[i].kind {
            Jump::If => {
                program.jumps[i].target = at[next_branch];
                program.jumps[i].dest = next_branch + 1;
                return Ok(i);
            }
            Jump::ElseIf => {
                program.jumps[i].target = at[next_branch];
                program.jumps[i].dest = next_branch + 1;
                i = i.checked_sub(1).ok_or(JumpError::Unbalanced)?;
                program.jumps[i].target = at[endif];
                program.jumps[i].dest = endif + 1;
                next_branch = i;
            }
            Jump::Else => {
                program.jumps[i].target = at[endif];
                program.jumps[i].dest = endif + 1;
                next_branch = i;
            }
            Jump::EndIf => i = fill_group(program, at, i)?,
        }
    }
    Err(JumpError::Unbalanced)
}

/// Fill in jump targets. A program without jumps is left alone.
pub fn resolve(program: &mut Program) -> Result<(), JumpError> {
    if program.jumps.is_empty() {
        return Ok(());
    }
    let at = positions(program)?;
    let first = program.jumps.first().map(|j| j.kind);
    let last = program.jumps.last().map(|j| j.kind);
    if first != Some(Jump::If) || last != Some(Jump::EndIf) {
        return Err(JumpError::Unbalanced);
    }
    let mut i = program.jumps.len();
    while i > 0 {
        i -= 1;
        i = fill_group(program, &at, i)?;
    }
    trace!(target: "frm::jumps", entries = program.jumps.len(), "jumps resolved");
    Ok(())
}
