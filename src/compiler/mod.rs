//! Token stream → flat bytecode.
//!
//! Every operator, function, load and store is queued as a pending op with a
//! precedence that drops by 15 per enclosing parenthesis and per `=` already
//! seen in the statement. A recursive pass then emits the queue in postfix
//! order. Statement separators queue a clear with a precedence low enough to
//! flush everything before it.

use std::fmt::Write as _;

use serde::Serialize;
use tracing::{debug, trace};

use crate::backend::Complex;
use crate::env::Environment;
use crate::lexer::{Func, Jump, Op, Paren, Token, TokenKind, Var};
use crate::opcode::{self, *};
use crate::prescan::Stats;

/// Where a variable slot's initial value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotKind {
    Predefined,
    User,
    Constant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slot {
    pub name: String,
    pub kind: SlotKind,
    pub value: Complex<f64>,
}

/// Where execution resumes when a jump is taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JumpTarget {
    /// Index of a jump opcode in `code`; execution continues just after it.
    pub op_ptr: usize,
    /// Load and store cursors at that opcode.
    pub loads: usize,
    pub stores: usize,
}

/// One `if`/`elseif`/`else`/`endif` jump opcode, in source order. `target`
/// and `dest` are filled in by [`crate::jumps::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JumpEntry {
    pub kind: Jump,
    pub target: JumpTarget,
    /// Jump table index to continue from after taking this jump.
    pub dest: usize,
}

impl JumpEntry {
    fn new(kind: Jump) -> Self {
        JumpEntry {
            kind,
            target: JumpTarget::default(),
            dest: 0,
        }
    }
}

/// What the front end needs to know about a formula without running it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormulaInfo {
    pub uses_p1: bool,
    pub uses_p2: bool,
    pub uses_p3: bool,
    pub uses_p4: bool,
    pub uses_p5: bool,
    pub uses_ismand: bool,
    /// Highest `fnN` referenced, 0 if none.
    pub max_fn: u8,
    pub uses_jump: bool,
    pub uses_rand: bool,
}

impl FormulaInfo {
    fn note_var(&mut self, v: Var) {
        match v {
            Var::P1 => self.uses_p1 = true,
            Var::P2 => self.uses_p2 = true,
            Var::P3 => self.uses_p3 = true,
            Var::P4 => self.uses_p4 = true,
            Var::P5 => self.uses_p5 = true,
            Var::IsMand => self.uses_ismand = true,
            Var::Rand => self.uses_rand = true,
            _ => {}
        }
    }
}

/// A compiled formula, independent of numeric backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Program {
    /// The formula as the tokenizer saw it: lowercased, comments and
    /// whitespace removed.
    pub text: String,
    pub code: Vec<u8>,
    pub slots: Vec<Slot>,
    /// Slot read by each load, in execution order.
    pub loads: Vec<usize>,
    /// Slot written by each store, in execution order.
    pub stores: Vec<usize>,
    pub jumps: Vec<JumpEntry>,
    /// An init section (`...:`) exists.
    pub has_init: bool,
    pub info: FormulaInfo,
}

impl Program {
    /// Human-readable listing, one opcode per line.
    pub fn disassemble(&self) -> String {
        let mut out = String::new();
        let (mut lod, mut sto, mut jmp) = (0, 0, 0);
        for (i, &op) in self.code.iter().enumerate() {
            let _ = write!(out, "{i:4}  {:<14}", opcode::name(op));
            match op {
                OP_JUMP | OP_JUMP_ON_FALSE | OP_JUMP_ON_TRUE => {
                    if let Some(j) = self.jumps.get(jmp) {
                        let _ = write!(out, "-> {}", j.target.op_ptr + 1);
                    }
                    jmp += 1;
                }
                OP_JUMP_LABEL => jmp += 1,
                OP_LOAD => {
                    if let Some(slot) = self.loads.get(lod).and_then(|&s| self.slots.get(s)) {
                        let _ = write!(out, "{}", slot.name);
                    }
                    lod += 1;
                }
                OP_STORE => {
                    if let Some(slot) = self.stores.get(sto).and_then(|&s| self.slots.get(s)) {
                        let _ = write!(out, "{}", slot.name);
                    }
                    sto += 1;
                }
                _ => {}
            }
            out.truncate(out.trim_end().len());
            out.push('\n');
        }
        out
    }
}

// ── Compilation ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
struct Pending {
    op: Option<u8>,
    prec: i32,
}

/// Lower than anything an expression can produce, so separators flush.
const FLUSH: i32 = -30000;

struct Compiler {
    pending: Vec<Pending>,
    slots: Vec<Slot>,
    loads: Vec<usize>,
    stores: Vec<usize>,
    jumps: Vec<JumpEntry>,
    info: FormulaInfo,
    has_init: bool,
    paren: i32,
    equals: i32,
    mod_flag: i32,
    mods: Vec<i32>,
    expecting_arg: bool,
}

impl Compiler {
    fn new(env: &Environment, stats: &Stats) -> Self {
        Compiler {
            pending: Vec::with_capacity(stats.ops),
            slots: Var::ALL.iter().map(|&v| predefined_slot(v, env)).collect(),
            loads: Vec::with_capacity(stats.loads),
            stores: Vec::with_capacity(stats.stores),
            jumps: Vec::with_capacity(stats.jumps),
            info: FormulaInfo::default(),
            has_init: false,
            paren: 0,
            equals: 0,
            mod_flag: 999,
            mods: Vec::new(),
            expecting_arg: true,
        }
    }

    fn prec(&self, base: i32) -> i32 {
        base - (self.paren + self.equals) * 15
    }

    fn push(&mut self, op: Option<u8>, prec: i32) {
        self.pending.push(Pending { op, prec });
    }

    fn push_op(&mut self, op: u8, base: i32) {
        let prec = self.prec(base);
        self.push(Some(op), prec);
    }

    fn end_statement(&mut self, marker: u8) {
        self.push(None, 15);
        self.push(Some(marker), FLUSH);
        self.paren = 0;
        self.equals = 0;
        self.expecting_arg = true;
    }

    fn token(&mut self, tok: &Token) {
        match tok.kind {
            TokenKind::Parens(Paren::Open) => self.paren += 1,
            TokenKind::Parens(Paren::Close) => self.paren -= 1,
            TokenKind::Operator(op) => self.operator(op),
            TokenKind::FlowControl(jump) => self.flow(jump),
            TokenKind::Function(f) | TokenKind::ParamFunction(f) => {
                self.expecting_arg = true;
                if let Some(n) = f.param_slot() {
                    self.info.max_fn = self.info.max_fn.max(n as u8 + 1);
                }
                self.push_op(opcode::func(f), 1);
            }
            TokenKind::ParamVariable(_)
            | TokenKind::PredefinedVariable(_)
            | TokenKind::UserNamedVariable => {
                self.expecting_arg = false;
                let slot = self.variable_slot(tok);
                self.load(slot, 1);
            }
            TokenKind::RealConstant | TokenKind::ComplexConstant => {
                self.expecting_arg = false;
                let (slot, nested) = self.constant_slot(tok);
                // A literal `(re,im)` loads one level in, as a group would.
                self.load(slot, if nested { 1 - 15 } else { 1 });
            }
            TokenKind::EndOfFormula | TokenKind::NotAToken(_) => {}
        }
    }

    fn load(&mut self, slot: usize, base: i32) {
        self.loads.push(slot);
        self.push_op(OP_LOAD, base);
    }

    fn operator(&mut self, op: Op) {
        match op {
            Op::Comma => {
                if !self.expecting_arg {
                    self.end_statement(OP_CLEAR);
                }
            }
            Op::Colon => {
                self.end_statement(OP_END_INIT);
                self.has_init = true;
            }
            Op::Modulus => {
                if self.mod_flag == self.paren - 1 {
                    self.paren -= 1;
                    self.mod_flag = self.mods.pop().unwrap_or(999);
                } else {
                    self.mods.push(self.mod_flag);
                    self.push_op(OP_MOD, 2);
                    self.mod_flag = self.paren;
                    self.paren += 1;
                }
            }
            Op::Assign => {
                self.expecting_arg = true;
                let prec = self.prec(5);
                if let Some(last) = self.pending.last_mut() {
                    last.op = Some(OP_STORE);
                    last.prec = prec;
                }
                if let Some(slot) = self.loads.pop() {
                    self.stores.push(slot);
                }
                self.equals += 1;
            }
            Op::Minus if self.expecting_arg => self.push_op(OP_NEG, 2),
            _ => {
                self.expecting_arg = true;
                let (code, base) = match op {
                    Op::Or => (OP_OR, 7),
                    Op::And => (OP_AND, 7),
                    Op::Ne => (OP_NE, 6),
                    Op::Eq => (OP_EQ, 6),
                    Op::Lt => (OP_LT, 6),
                    Op::Le => (OP_LE, 6),
                    Op::Gt => (OP_GT, 6),
                    Op::Ge => (OP_GE, 6),
                    Op::Plus => (OP_ADD, 4),
                    Op::Minus => (OP_SUB, 4),
                    Op::Star => (OP_MUL, 3),
                    Op::Slash => (OP_DIV, 3),
                    Op::Caret => (OP_POW, 2),
                    Op::Comma | Op::Colon | Op::Modulus | Op::Assign => return,
                };
                self.push_op(code, base);
            }
        }
    }

    fn flow(&mut self, jump: Jump) {
        self.info.uses_jump = true;
        match jump {
            Jump::If => {
                self.expecting_arg = true;
                self.jumps.push(JumpEntry::new(Jump::If));
                self.push(Some(OP_JUMP_ON_FALSE), 1);
            }
            Jump::ElseIf => {
                self.expecting_arg = true;
                self.jumps.push(JumpEntry::new(Jump::ElseIf));
                self.jumps.push(JumpEntry::new(Jump::ElseIf));
                self.push(Some(OP_JUMP), 1);
                self.push(None, 15);
                self.push(Some(OP_CLEAR), FLUSH);
                self.push(Some(OP_JUMP_ON_FALSE), 1);
            }
            Jump::Else => {
                self.expecting_arg = false;
                self.jumps.push(JumpEntry::new(Jump::Else));
                self.push(Some(OP_JUMP), 1);
            }
            Jump::EndIf => {
                self.expecting_arg = false;
                self.jumps.push(JumpEntry::new(Jump::EndIf));
                self.push(Some(OP_JUMP_LABEL), 1);
            }
        }
    }

    /// First slot with this name, or a new zeroed user slot.
    fn variable_slot(&mut self, tok: &Token) -> usize {
        if let Some(v) = Var::lookup(&tok.text) {
            self.info.note_var(v);
        }
        if let Some(i) = self
            .slots
            .iter()
            .position(|s| s.name.eq_ignore_ascii_case(&tok.text))
        {
            return i;
        }
        trace!(target: "frm::compile", name = %tok.text, "new user variable");
        self.slots.push(Slot {
            name: tok.text.clone(),
            kind: SlotKind::User,
            value: Complex::default(),
        });
        self.slots.len() - 1
    }

    /// Plain numbers share a slot with an identical earlier literal. A new
    /// slot absorbs a directly preceding unary minus. Returns whether the
    /// literal was a parenthesized pair.
    fn constant_slot(&mut self, tok: &Token) -> (usize, bool) {
        let pair = tok.text.starts_with('(');
        if !pair {
            if let Some(i) = self.slots.iter().position(|s| s.name == tok.text) {
                return (i, false);
            }
        }
        let mut name = tok.text.clone();
        let mut value = tok.value;
        if self.pending.last().is_some_and(|p| p.op == Some(OP_NEG)) {
            self.pending.pop();
            name.insert(0, '-');
            value = Complex::new(-value.x, -value.y);
        }
        self.slots.push(Slot {
            name,
            kind: SlotKind::Constant,
            value,
        });
        (self.slots.len() - 1, pair)
    }

    fn finish(mut self, text: String) -> Program {
        self.push(None, 16);
        let mut code = Vec::with_capacity(self.pending.len());
        let mut next = 0;
        while next < self.pending.len() {
            if self.pending[next].op.is_some() {
                emit(&self.pending, &mut next, &mut code);
            } else {
                next += 1;
            }
        }
        debug!(
            target: "frm::compile",
            ops = code.len(),
            loads = self.loads.len(),
            stores = self.stores.len(),
            jumps = self.jumps.len(),
            "compiled"
        );
        Program {
            text,
            code,
            slots: self.slots,
            loads: self.loads,
            stores: self.stores,
            jumps: self.jumps,
            has_init: self.has_init,
            info: self.info,
        }
    }
}

/// Emit `ops[*next]` after every following op that binds tighter.
fn emit(ops: &[Pending], next: &mut usize, code: &mut Vec<u8>) {
    let this = *next;
    *next += 1;
    while *next < ops.len() && ops[this].prec > ops[*next].prec {
        emit(ops, next, code);
    }
    if let Some(op) = ops[this].op {
        code.push(op);
    }
}

fn predefined_slot(v: Var, env: &Environment) -> Slot {
    let re = |x: f64| Complex::new(x, 0.0);
    let value = match v {
        Var::P1 => env.param(1),
        Var::P2 => env.param(2),
        Var::P3 => env.param(3),
        Var::P4 => env.param(4),
        Var::P5 => env.param(5),
        Var::Pi => re(std::f64::consts::PI),
        Var::E => re(std::f64::consts::E),
        Var::ScrnMax => Complex::new(env.screen.0 as f64, env.screen.1 as f64),
        Var::MaxIt => re(env.max_iterations as f64),
        Var::IsMand => re(if env.is_mandelbrot { 1.0 } else { 0.0 }),
        Var::Center => env.center,
        Var::MagXMag => env.mag,
        Var::RotSkew => env.rot_skew,
        Var::Pixel | Var::Z | Var::LastSqr | Var::Rand | Var::WhiteSq | Var::ScrnPix => {
            Complex::default()
        }
    };
    Slot {
        name: v.name().to_string(),
        kind: SlotKind::Predefined,
        value,
    }
}

/// Compile a prescanned token stream. `tokens` runs up to, and may include,
/// the closing `}`; leading separators are skipped.
pub fn compile(tokens: &[Token], stats: &Stats, env: &Environment) -> Program {
    let mut c = Compiler::new(env, stats);
    let mut text = String::with_capacity(stats.chars);
    let body = tokens
        .iter()
        .skip_while(|t| t.kind == TokenKind::Operator(Op::Comma))
        .take_while(|t| !matches!(t.kind, TokenKind::EndOfFormula | TokenKind::NotAToken(_)));
    for tok in body {
        text.push_str(&tok.text);
        c.token(tok);
    }
    let program = c.finish(text);
    debug_assert!(program.code.len() <= stats.ops);
    program
}

/// Symbolic names for the functions a program calls, for dumps.
pub fn functions_used(program: &Program) -> Vec<Func> {
    let mut out: Vec<Func> = program.code.iter().filter_map(|&op| opcode::as_func(op)).collect();
    out.sort_by_key(|f| f.index());
    out.dedup();
    out
}
