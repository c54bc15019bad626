//! Numeric backends.
//!
//! The VM is generic over [`Numeric`]. Each backend supplies only the leaf
//! arithmetic (add, multiply, divide, compare, convert); every opcode is
//! written once in [`ops`] and instantiated per backend through
//! [`BackendOps`], which is resolved once per load.

pub mod cmath;
#[cfg(feature = "fixed")]
mod fixed;
mod float;
#[cfg(feature = "mp")]
mod mp;
pub(crate) mod ops;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::lexer::Func;
use crate::opcode::{self, OP_COUNT};
use crate::vm::VmState;

#[cfg(feature = "fixed")]
pub use fixed::{Fixed, FixedScale};
#[cfg(feature = "mp")]
pub use mp::Mp;

// ── Math mode ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MathMode {
    #[default]
    Float,
    Fixed,
    Mp,
}

impl MathMode {
    pub fn name(self) -> &'static str {
        match self {
            MathMode::Float => "float",
            MathMode::Fixed => "fixed",
            MathMode::Mp => "mp",
        }
    }
}

impl fmt::Display for MathMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MathMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "float" | "f64" => Ok(MathMode::Float),
            "fixed" | "int" | "integer" => Ok(MathMode::Fixed),
            "mp" => Ok(MathMode::Mp),
            other => Err(format!("unknown math mode '{other}' (expected float, fixed or mp)")),
        }
    }
}

// ── Complex pairs ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Complex<N> {
    pub x: N,
    pub y: N,
}

impl<N> Complex<N> {
    pub const fn new(x: N, y: N) -> Self {
        Complex { x, y }
    }
}

impl Complex<f64> {
    pub fn norm_sqr(self) -> f64 {
        self.x * self.x + self.y * self.y
    }
}

impl fmt::Display for Complex<f64> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Raised when a result does not fit the backend, or a denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("arithmetic overflow")]
pub struct Overflow;

/// A complex value tagged with the representation it came from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Value {
    Float(Complex<f64>),
    #[cfg(feature = "fixed")]
    Fixed { raw: Complex<i32>, shift: u32 },
    #[cfg(feature = "mp")]
    Mp(Complex<Mp>),
}

impl Value {
    /// Nearest `f64` pair, for display and comparison across backends.
    pub fn to_f64(&self) -> Complex<f64> {
        match *self {
            Value::Float(c) => c,
            #[cfg(feature = "fixed")]
            Value::Fixed { raw, shift } => {
                let scale = (1u64 << shift) as f64;
                Complex::new(raw.x as f64 / scale, raw.y as f64 / scale)
            }
            #[cfg(feature = "mp")]
            Value::Mp(c) => Complex::new(c.x.to_f64(), c.y.to_f64()),
        }
    }

    pub fn mode(&self) -> MathMode {
        match self {
            Value::Float(_) => MathMode::Float,
            #[cfg(feature = "fixed")]
            Value::Fixed { .. } => MathMode::Fixed,
            #[cfg(feature = "mp")]
            Value::Mp(_) => MathMode::Mp,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_f64().fmt(f)
    }
}

// ── Leaf arithmetic ────────────────────────────────────────────────────────

/// Scalar arithmetic a backend provides. Complex arithmetic and every opcode
/// are built on top of these in [`ops`].
pub trait Numeric: Copy + Default + PartialEq + PartialOrd + fmt::Debug + 'static {
    /// Per-load parameters, e.g. the fixed-point shift.
    type Ctx: Copy + fmt::Debug;

    const MODE: MathMode;

    fn one(ctx: &Self::Ctx) -> Self;
    fn from_f64(v: f64, ctx: &Self::Ctx) -> Result<Self, Overflow>;
    fn to_f64(self, ctx: &Self::Ctx) -> f64;

    fn add(self, rhs: Self, ctx: &Self::Ctx) -> Self;
    fn sub(self, rhs: Self, ctx: &Self::Ctx) -> Self;
    fn mul(self, rhs: Self, ctx: &Self::Ctx) -> Result<Self, Overflow>;
    fn div(self, rhs: Self, ctx: &Self::Ctx) -> Result<Self, Overflow>;
    fn neg(self) -> Self;
    fn abs(self) -> Self;

    fn is_zero(self) -> bool;
    /// Too small to divide by.
    fn is_tiny(self, ctx: &Self::Ctx) -> bool;

    fn floor(self, ctx: &Self::Ctx) -> Self;
    fn ceil(self, ctx: &Self::Ctx) -> Self;
    fn trunc(self, ctx: &Self::Ctx) -> Self;
    fn round(self, ctx: &Self::Ctx) -> Self;

    /// Integer seed for `srand`.
    fn seed_bits(self, ctx: &Self::Ctx) -> i64;
    /// Map 32 random bits onto `[0, 1)`.
    fn from_random(bits: u32, ctx: &Self::Ctx) -> Self;

    fn tag(c: Complex<Self>, ctx: &Self::Ctx) -> Value;

    fn from_bool(b: bool, ctx: &Self::Ctx) -> Self {
        if b { Self::one(ctx) } else { Self::default() }
    }

    fn complex_from_f64(c: Complex<f64>, ctx: &Self::Ctx) -> Result<Complex<Self>, Overflow> {
        Ok(Complex::new(Self::from_f64(c.x, ctx)?, Self::from_f64(c.y, ctx)?))
    }

    fn complex_to_f64(c: Complex<Self>, ctx: &Self::Ctx) -> Complex<f64> {
        Complex::new(c.x.to_f64(ctx), c.y.to_f64(ctx))
    }
}

// ── Dispatch table ─────────────────────────────────────────────────────────

pub type OpFn<N> = for<'a> fn(&mut VmState<'a, N>);

/// One function per opcode for a chosen backend, with `fn1..fn4` already
/// bound to their targets.
pub struct BackendOps<N: Numeric> {
    table: [OpFn<N>; OP_COUNT],
    bindings: [Func; 4],
}

impl<N: Numeric> BackendOps<N> {
    pub fn new(bindings: [Func; 4]) -> Self {
        let mut table: [OpFn<N>; OP_COUNT] = [ops::nop::<N> as OpFn<N>; OP_COUNT];
        for op in 0..opcode::OP_FUNC_BASE {
            table[op as usize] = ops::primitive::<N>(op);
        }
        for f in Func::ALL {
            table[opcode::func(f) as usize] = ops::function::<N>(f);
        }
        for (slot, target) in bindings.iter().enumerate() {
            table[opcode::func(Func::PARAMS[slot]) as usize] = ops::function::<N>(*target);
        }
        BackendOps { table, bindings }
    }

    #[inline]
    pub fn get(&self, op: u8) -> OpFn<N> {
        self.table
            .get(op as usize)
            .copied()
            .unwrap_or(ops::nop::<N> as OpFn<N>)
    }

    pub fn bindings(&self) -> [Func; 4] {
        self.bindings
    }
}

impl<N: Numeric> fmt::Debug for BackendOps<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendOps")
            .field("mode", &N::MODE)
            .field("bindings", &self.bindings)
            .finish()
    }
}
