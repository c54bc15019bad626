use super::{Complex, MathMode, Numeric, Overflow, Value};

impl Numeric for f64 {
    type Ctx = ();

    const MODE: MathMode = MathMode::Float;

    fn one(_: &()) -> Self {
        1.0
    }

    fn from_f64(v: f64, _: &()) -> Result<Self, Overflow> {
        Ok(v)
    }

    fn to_f64(self, _: &()) -> f64 {
        self
    }

    fn add(self, rhs: Self, _: &()) -> Self {
        self + rhs
    }

    fn sub(self, rhs: Self, _: &()) -> Self {
        self - rhs
    }

    fn mul(self, rhs: Self, _: &()) -> Result<Self, Overflow> {
        Ok(self * rhs)
    }

    fn div(self, rhs: Self, ctx: &()) -> Result<Self, Overflow> {
        if rhs.is_tiny(ctx) {
            return Err(Overflow);
        }
        Ok(self / rhs)
    }

    fn neg(self) -> Self {
        -self
    }

    fn abs(self) -> Self {
        f64::abs(self)
    }

    fn is_zero(self) -> bool {
        self == 0.0
    }

    fn is_tiny(self, _: &()) -> bool {
        f64::abs(self) <= f64::MIN_POSITIVE
    }

    fn floor(self, _: &()) -> Self {
        f64::floor(self)
    }

    fn ceil(self, _: &()) -> Self {
        f64::ceil(self)
    }

    fn trunc(self, _: &()) -> Self {
        f64::trunc(self)
    }

    fn round(self, _: &()) -> Self {
        f64::floor(self + 0.5)
    }

    fn seed_bits(self, _: &()) -> i64 {
        (self * 65536.0) as i64
    }

    fn from_random(bits: u32, _: &()) -> Self {
        (bits >> 16) as f64 / 65536.0
    }

    fn tag(c: Complex<Self>, _: &()) -> Value {
        Value::Float(c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_is_floor_of_half_up() {
        assert_eq!(Numeric::round(2.5, &()), 3.0);
        assert_eq!(Numeric::round(-2.5, &()), -2.0);
        assert_eq!(Numeric::trunc(-2.7, &()), -2.0);
    }

    #[test]
    fn tiny_denominators_overflow() {
        assert_eq!(Numeric::div(1.0, 0.0, &()), Err(Overflow));
        assert_eq!(Numeric::div(1.0, 4.0, &()), Ok(0.25));
    }

    #[test]
    fn random_bits_land_in_unit_interval() {
        assert_eq!(f64::from_random(0, &()), 0.0);
        let top = f64::from_random(u32::MAX, &());
        assert!(top < 1.0 && top > 0.99);
    }
}
