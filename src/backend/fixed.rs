//! 32-bit fixed point with a per-load binary point.

use serde::Serialize;

use super::{Complex, MathMode, Numeric, Overflow, Value};

/// Raw fixed-point value: the real number is `raw / 2^shift`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Fixed(pub i32);

/// Position of the binary point for one load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedScale {
    shift: u32,
    fg: f64,
}

impl FixedScale {
    pub const MIN_SHIFT: u32 = 8;
    pub const MAX_SHIFT: u32 = 29;

    pub fn new(shift: u32) -> Option<Self> {
        if !(Self::MIN_SHIFT..=Self::MAX_SHIFT).contains(&shift) {
            return None;
        }
        Some(FixedScale {
            shift,
            fg: (1u64 << shift) as f64,
        })
    }

    pub fn shift(&self) -> u32 {
        self.shift
    }

    /// Largest magnitude representable, in real units.
    pub fn limit(&self) -> f64 {
        i32::MAX as f64 / self.fg
    }
}

fn narrow(v: i64) -> Result<Fixed, Overflow> {
    i32::try_from(v).map(Fixed).map_err(|_| Overflow)
}

impl Numeric for Fixed {
    type Ctx = FixedScale;

    const MODE: MathMode = MathMode::Fixed;

    fn one(ctx: &FixedScale) -> Self {
        Fixed(1 << ctx.shift)
    }

    fn from_f64(v: f64, ctx: &FixedScale) -> Result<Self, Overflow> {
        if v.is_nan() || v.abs() >= ctx.limit() {
            return Err(Overflow);
        }
        Ok(Fixed((v * ctx.fg) as i32))
    }

    fn to_f64(self, ctx: &FixedScale) -> f64 {
        self.0 as f64 / ctx.fg
    }

    fn add(self, rhs: Self, _: &FixedScale) -> Self {
        Fixed(self.0.wrapping_add(rhs.0))
    }

    fn sub(self, rhs: Self, _: &FixedScale) -> Self {
        Fixed(self.0.wrapping_sub(rhs.0))
    }

    fn mul(self, rhs: Self, ctx: &FixedScale) -> Result<Self, Overflow> {
        narrow((self.0 as i64 * rhs.0 as i64) >> ctx.shift)
    }

    fn div(self, rhs: Self, ctx: &FixedScale) -> Result<Self, Overflow> {
        if rhs.0 == 0 {
            return Err(Overflow);
        }
        narrow(((self.0 as i64) << ctx.shift) / rhs.0 as i64)
    }

    fn neg(self) -> Self {
        Fixed(self.0.wrapping_neg())
    }

    fn abs(self) -> Self {
        Fixed(self.0.wrapping_abs())
    }

    fn is_zero(self) -> bool {
        self.0 == 0
    }

    fn is_tiny(self, _: &FixedScale) -> bool {
        self.0 == 0
    }

    fn floor(self, ctx: &FixedScale) -> Self {
        Fixed((self.0 >> ctx.shift) << ctx.shift)
    }

    fn ceil(self, ctx: &FixedScale) -> Self {
        Fixed(((self.0.wrapping_neg() >> ctx.shift) << ctx.shift).wrapping_neg())
    }

    fn trunc(self, ctx: &FixedScale) -> Self {
        if self.0 < 0 { self.ceil(ctx) } else { self.floor(ctx) }
    }

    fn round(self, ctx: &FixedScale) -> Self {
        Fixed(self.0.wrapping_add(1 << (ctx.shift - 1))).floor(ctx)
    }

    fn seed_bits(self, _: &FixedScale) -> i64 {
        self.0 as i64
    }

    fn from_random(bits: u32, ctx: &FixedScale) -> Self {
        Fixed((bits >> (32 - ctx.shift)) as i32)
    }

    fn tag(c: Complex<Self>, ctx: &FixedScale) -> Value {
        Value::Fixed {
            raw: Complex::new(c.x.0, c.y.0),
            shift: ctx.shift,
        }
    }
}
