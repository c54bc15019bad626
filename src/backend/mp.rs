//! Extended-precision binary floating point: a 64-bit normalized mantissa
//! with a wide exponent. Arithmetic is exact to the last mantissa bit
//! (truncating); transcendental functions round-trip through `f64`.

use std::cmp::Ordering;

use serde::Serialize;

use super::{Complex, MathMode, Numeric, Overflow, Value};

/// `(-1)^neg * mant * 2^(exp - 63)`. Zero has `mant == 0`; every other
/// value has the top mantissa bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Mp {
    neg: bool,
    exp: i64,
    mant: u64,
}

const TOP: u64 = 1 << 63;

impl Mp {
    pub const ZERO: Mp = Mp {
        neg: false,
        exp: 0,
        mant: 0,
    };

    pub const ONE: Mp = Mp {
        neg: false,
        exp: 0,
        mant: TOP,
    };

    /// Build from `m * 2^e`.
    fn normalize(neg: bool, e: i64, m: u128) -> Mp {
        if m == 0 {
            return Mp::ZERO;
        }
        let top_bit = 127 - m.leading_zeros() as i64;
        let (mant, e) = if top_bit > 63 {
            ((m >> (top_bit - 63)) as u64, e + (top_bit - 63))
        } else {
            ((m << (63 - top_bit)) as u64, e - (63 - top_bit))
        };
        Mp {
            neg,
            exp: e + 63,
            mant,
        }
    }

    pub fn from_f64(v: f64) -> Mp {
        if v == 0.0 || v.is_nan() {
            return Mp::ZERO;
        }
        let neg = v.is_sign_negative();
        if v.is_infinite() {
            return Mp {
                neg,
                exp: 1024,
                mant: TOP,
            };
        }
        let bits = v.to_bits();
        let biased = ((bits >> 52) & 0x7ff) as i64;
        let frac = bits & ((1u64 << 52) - 1);
        if biased == 0 {
            Mp::normalize(neg, -1074, frac as u128)
        } else {
            Mp::normalize(neg, biased - 1075, (frac | (1u64 << 52)) as u128)
        }
    }

    pub fn to_f64(self) -> f64 {
        if self.mant == 0 {
            return 0.0;
        }
        let sign = if self.neg { -1.0 } else { 1.0 };
        if self.exp > 1023 {
            return sign * f64::INFINITY;
        }
        if self.exp < -1076 {
            return sign * 0.0;
        }
        let m53 = (self.mant >> 11) as f64;
        let e = (self.exp - 52) as i32;
        let v = if e < -1000 {
            m53 * 2f64.powi(-1000) * 2f64.powi(e + 1000)
        } else {
            m53 * 2f64.powi(e)
        };
        sign * v
    }

    pub fn is_zero(self) -> bool {
        self.mant == 0
    }

    pub fn is_negative(self) -> bool {
        self.neg && self.mant != 0
    }

    pub fn neg(self) -> Mp {
        if self.mant == 0 {
            return self;
        }
        Mp {
            neg: !self.neg,
            ..self
        }
    }

    pub fn abs(self) -> Mp {
        Mp { neg: false, ..self }
    }

    pub fn add(self, rhs: Mp) -> Mp {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        let (big, small) = if (self.exp, self.mant) >= (rhs.exp, rhs.mant) {
            (self, rhs)
        } else {
            (rhs, self)
        };
        let shift = (big.exp - small.exp) as u64;
        if shift >= 127 {
            return big;
        }
        let mb = (big.mant as u128) << 62;
        let ms = ((small.mant as u128) << 62) >> shift;
        let e = big.exp - 63 - 62;
        if big.neg == small.neg {
            Mp::normalize(big.neg, e, mb + ms)
        } else {
            Mp::normalize(big.neg, e, mb - ms)
        }
    }

    pub fn sub(self, rhs: Mp) -> Mp {
        self.add(rhs.neg())
    }

    pub fn mul(self, rhs: Mp) -> Mp {
        if self.is_zero() || rhs.is_zero() {
            return Mp::ZERO;
        }
        let m = self.mant as u128 * rhs.mant as u128;
        Mp::normalize(self.neg != rhs.neg, self.exp + rhs.exp - 126, m)
    }

    pub fn div(self, rhs: Mp) -> Result<Mp, Overflow> {
        if rhs.is_zero() {
            return Err(Overflow);
        }
        if self.is_zero() {
            return Ok(Mp::ZERO);
        }
        let m = ((self.mant as u128) << 64) / rhs.mant as u128;
        Ok(Mp::normalize(self.neg != rhs.neg, self.exp - rhs.exp - 64, m))
    }

    /// Integer part, rounding toward zero, plus whether anything was dropped.
    fn trunc_parts(self) -> (Mp, bool) {
        if self.is_zero() || self.exp >= 63 {
            return (self, false);
        }
        if self.exp < 0 {
            return (Mp::ZERO, true);
        }
        let mask = (1u64 << (63 - self.exp)) - 1;
        let dropped = self.mant & mask != 0;
        let kept = Mp {
            mant: self.mant & !mask,
            ..self
        };
        (kept, dropped)
    }

    pub fn trunc(self) -> Mp {
        self.trunc_parts().0
    }

    pub fn floor(self) -> Mp {
        let (t, dropped) = self.trunc_parts();
        if self.is_negative() && dropped {
            t.sub(Mp::ONE)
        } else {
            t
        }
    }

    pub fn ceil(self) -> Mp {
        let (t, dropped) = self.trunc_parts();
        if !self.is_negative() && dropped {
            t.add(Mp::ONE)
        } else {
            t
        }
    }

    pub fn round(self) -> Mp {
        self.add(Mp::from_f64(0.5)).floor()
    }
}

impl PartialOrd for Mp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let sign = |m: &Mp| {
            if m.is_zero() {
                0
            } else if m.neg {
                -1
            } else {
                1
            }
        };
        let (sa, sb) = (sign(self), sign(other));
        if sa != sb || sa == 0 {
            return Some(sa.cmp(&sb));
        }
        let mag = (self.exp, self.mant).cmp(&(other.exp, other.mant));
        Some(if sa < 0 { mag.reverse() } else { mag })
    }
}

impl Numeric for Mp {
    type Ctx = ();

    const MODE: MathMode = MathMode::Mp;

    fn one(_: &()) -> Self {
        Mp::ONE
    }

    fn from_f64(v: f64, _: &()) -> Result<Self, Overflow> {
        Ok(Mp::from_f64(v))
    }

    fn to_f64(self, _: &()) -> f64 {
        Mp::to_f64(self)
    }

    fn add(self, rhs: Self, _: &()) -> Self {
        Mp::add(self, rhs)
    }

    fn sub(self, rhs: Self, _: &()) -> Self {
        Mp::sub(self, rhs)
    }

    fn mul(self, rhs: Self, _: &()) -> Result<Self, Overflow> {
        Ok(Mp::mul(self, rhs))
    }

    fn div(self, rhs: Self, _: &()) -> Result<Self, Overflow> {
        Mp::div(self, rhs)
    }

    fn neg(self) -> Self {
        Mp::neg(self)
    }

    fn abs(self) -> Self {
        Mp::abs(self)
    }

    fn is_zero(self) -> bool {
        Mp::is_zero(self)
    }

    fn is_tiny(self, _: &()) -> bool {
        Mp::is_zero(self)
    }

    fn floor(self, _: &()) -> Self {
        Mp::floor(self)
    }

    fn ceil(self, _: &()) -> Self {
        Mp::ceil(self)
    }

    fn trunc(self, _: &()) -> Self {
        Mp::trunc(self)
    }

    fn round(self, _: &()) -> Self {
        Mp::round(self)
    }

    fn seed_bits(self, _: &()) -> i64 {
        (Mp::to_f64(self) * 65536.0) as i64
    }

    fn from_random(bits: u32, _: &()) -> Self {
        Mp::from_f64((bits >> 16) as f64 / 65536.0)
    }

    fn tag(c: Complex<Self>, _: &()) -> Value {
        Value::Mp(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp(v: f64) -> Mp {
        Mp::from_f64(v)
    }

    #[test]
    fn f64_round_trip() {
        for v in [1.0, -2.5, 0.1, 1e300, -3e-300, 5e-324, 123456.789] {
            assert_eq!(mp(v).to_f64(), v, "{v}");
        }
        assert_eq!(mp(0.0), Mp::ZERO);
        assert_eq!(mp(-0.0), Mp::ZERO);
    }

    #[test]
    fn arithmetic_matches_f64_on_exact_values() {
        assert_eq!(mp(1.5).add(mp(2.25)).to_f64(), 3.75);
        assert_eq!(mp(1.5).sub(mp(2.25)).to_f64(), -0.75);
        assert_eq!(mp(-1.5).mul(mp(4.0)).to_f64(), -6.0);
        assert_eq!(mp(3.0).div(mp(-0.5)).unwrap().to_f64(), -6.0);
        assert_eq!(mp(2.0).sub(mp(2.0)), Mp::ZERO);
    }

    #[test]
    fn division_by_zero_overflows() {
        assert_eq!(mp(1.0).div(Mp::ZERO), Err(Overflow));
    }

    #[test]
    fn more_precise_than_f64() {
        // 1 + 2^-60 is not representable in f64 but survives here.
        let tiny = mp(2f64.powi(-60));
        let sum = Mp::ONE.add(tiny);
        assert_ne!(sum, Mp::ONE);
        assert_eq!(sum.sub(Mp::ONE), tiny);
    }

    #[test]
    fn ordering() {
        assert!(mp(-2.0) < mp(-1.0));
        assert!(mp(-1.0) < Mp::ZERO);
        assert!(Mp::ZERO < mp(1e-300));
        assert!(mp(3.0) > mp(2.5));
        assert_eq!(mp(0.5).partial_cmp(&mp(0.5)), Some(Ordering::Equal));
    }

    #[test]
    fn rounding_family() {
        assert_eq!(mp(2.75).floor().to_f64(), 2.0);
        assert_eq!(mp(-2.25).floor().to_f64(), -3.0);
        assert_eq!(mp(2.25).ceil().to_f64(), 3.0);
        assert_eq!(mp(-2.75).ceil().to_f64(), -2.0);
        assert_eq!(mp(-2.75).trunc().to_f64(), -2.0);
        assert_eq!(mp(0.4).trunc(), Mp::ZERO);
        assert_eq!(mp(2.5).round().to_f64(), 3.0);
        assert_eq!(mp(-2.5).round().to_f64(), -2.0);
    }
}
