//! Complex functions over `f64`. The fixed-point and extended-precision
//! backends round-trip through these for the transcendental functions.

use super::{Complex, Overflow};

type C = Complex<f64>;

/// Reject denominators too small to divide by.
pub fn check_denom(d: f64) -> Result<f64, Overflow> {
    if d.abs() <= f64::MIN_POSITIVE || d.is_nan() {
        Err(Overflow)
    } else {
        Ok(d)
    }
}

pub fn mul(a: C, b: C) -> C {
    C::new(a.x * b.x - a.y * b.y, a.x * b.y + a.y * b.x)
}

pub fn div(a: C, b: C) -> Result<C, Overflow> {
    let d = check_denom(b.x * b.x + b.y * b.y)?;
    Ok(C::new(
        (a.x * b.x + a.y * b.y) / d,
        (a.y * b.x - a.x * b.y) / d,
    ))
}

pub fn sqr(z: C) -> C {
    C::new(z.x * z.x - z.y * z.y, 2.0 * z.x * z.y)
}

pub fn sin(z: C) -> C {
    C::new(z.x.sin() * z.y.cosh(), z.x.cos() * z.y.sinh())
}

pub fn cos(z: C) -> C {
    C::new(z.x.cos() * z.y.cosh(), -z.x.sin() * z.y.sinh())
}

/// `cos` with the imaginary part's sign flipped.
pub fn cosxx(z: C) -> C {
    let c = cos(z);
    C::new(c.x, -c.y)
}

pub fn sinh(z: C) -> C {
    C::new(z.x.sinh() * z.y.cos(), z.x.cosh() * z.y.sin())
}

pub fn cosh(z: C) -> C {
    C::new(z.x.cosh() * z.y.cos(), z.x.sinh() * z.y.sin())
}

pub fn tan(z: C) -> Result<C, Overflow> {
    let (x, y) = (2.0 * z.x, 2.0 * z.y);
    let d = check_denom(x.cos() + y.cosh())?;
    Ok(C::new(x.sin() / d, y.sinh() / d))
}

pub fn tanh(z: C) -> Result<C, Overflow> {
    let (x, y) = (2.0 * z.x, 2.0 * z.y);
    let d = check_denom(x.cosh() + y.cos())?;
    Ok(C::new(x.sinh() / d, y.sin() / d))
}

pub fn cotan(z: C) -> Result<C, Overflow> {
    let (x, y) = (2.0 * z.x, 2.0 * z.y);
    let d = check_denom(y.cosh() - x.cos())?;
    Ok(C::new(x.sin() / d, -y.sinh() / d))
}

pub fn cotanh(z: C) -> Result<C, Overflow> {
    let (x, y) = (2.0 * z.x, 2.0 * z.y);
    let d = check_denom(x.cosh() - y.cos())?;
    Ok(C::new(x.sinh() / d, -y.sin() / d))
}

/// Principal log; `log(0)` is 0.
pub fn log(z: C) -> C {
    if z.x == 0.0 && z.y == 0.0 {
        return C::default();
    }
    C::new((z.x * z.x + z.y * z.y).sqrt().ln(), z.y.atan2(z.x))
}

pub fn exp(z: C) -> C {
    let m = z.x.exp();
    C::new(m * z.y.cos(), m * z.y.sin())
}

/// `a ^ b` as `exp(log(a) * b)`, with `0 ^ b` = 0.
pub fn pow(a: C, b: C) -> C {
    if a.x == 0.0 && a.y == 0.0 {
        return C::default();
    }
    exp(mul(log(a), b))
}

pub fn sqrt(z: C) -> C {
    if z.x == 0.0 && z.y == 0.0 {
        return C::default();
    }
    let mag = (z.x * z.x + z.y * z.y).sqrt().sqrt();
    let theta = z.y.atan2(z.x) / 2.0;
    C::new(mag * theta.cos(), mag * theta.sin())
}

/// `-i * log(i*z + sqrt(1 - z*z))`
pub fn asin(z: C) -> C {
    let zz = mul(z, z);
    let mut t = sqrt(C::new(1.0 - zz.x, -zz.y));
    t.x -= z.y;
    t.y += z.x;
    let l = log(t);
    C::new(l.y, -l.x)
}

/// `-i * log(z + sqrt(z*z - 1))`
pub fn acos(z: C) -> C {
    let zz = mul(z, z);
    let mut t = sqrt(C::new(zz.x - 1.0, zz.y));
    t.x += z.x;
    t.y += z.y;
    let l = log(t);
    C::new(l.y, -l.x)
}

/// `log(z + sqrt(z*z + 1))`
pub fn asinh(z: C) -> C {
    let zz = mul(z, z);
    let mut t = sqrt(C::new(zz.x + 1.0, zz.y));
    t.x += z.x;
    t.y += z.y;
    log(t)
}

/// `log(z + sqrt(z*z - 1))`
pub fn acosh(z: C) -> C {
    let zz = mul(z, z);
    let mut t = sqrt(C::new(zz.x - 1.0, zz.y));
    t.x += z.x;
    t.y += z.y;
    log(t)
}

/// `log((1 + z) / (1 - z)) / 2`. At the poles `±1` the argument is
/// returned unchanged.
pub fn atanh(z: C) -> Result<C, Overflow> {
    if z.x == 0.0 {
        return Ok(C::new(0.0, z.y.atan()));
    }
    if z.y == 0.0 {
        if z.x.abs() == 1.0 {
            return Ok(z);
        }
        if z.x.abs() < 1.0 {
            return Ok(C::new(((1.0 + z.x) / (1.0 - z.x)).ln() / 2.0, 0.0));
        }
    }
    let q = div(C::new(1.0 + z.x, z.y), C::new(1.0 - z.x, -z.y))?;
    let l = log(q);
    Ok(C::new(0.5 * l.x, 0.5 * l.y))
}

/// `i/2 * log((1 - i*z) / (1 + i*z))`
pub fn atan(z: C) -> Result<C, Overflow> {
    match (z.x == 0.0, z.y == 0.0) {
        (true, true) => Ok(C::default()),
        (false, true) => Ok(C::new(z.x.atan(), 0.0)),
        (true, false) => {
            let t = atanh(C::new(z.y, 0.0))?;
            Ok(C::new(-t.y, t.x))
        }
        (false, false) => {
            let iz = C::new(-z.y, z.x);
            let q = div(C::new(1.0 - iz.x, -iz.y), C::new(1.0 + iz.x, iz.y))?;
            let l = log(q);
            Ok(C::new(-l.y * 0.5, 0.5 * l.x))
        }
    }
}

pub fn cabs(z: C) -> C {
    C::new((z.x * z.x + z.y * z.y).sqrt(), 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: C, b: C) -> bool {
        (a.x - b.x).abs() < 1e-12 && (a.y - b.y).abs() < 1e-12
    }

    #[test]
    fn division_by_zero_overflows() {
        assert_eq!(div(C::new(1.0, 0.0), C::default()), Err(Overflow));
        assert_eq!(div(C::new(1.0, 1.0), C::new(0.0, 2.0)), Ok(C::new(0.5, -0.5)));
    }

    #[test]
    fn log_exp_inverse() {
        let z = C::new(0.3, -1.2);
        assert!(close(exp(log(z)), z));
        assert_eq!(log(C::default()), C::default());
    }

    #[test]
    fn pow_of_zero_is_zero() {
        assert_eq!(pow(C::default(), C::new(2.0, 0.0)), C::default());
        assert!(close(pow(C::new(2.0, 0.0), C::new(3.0, 0.0)), C::new(8.0, 0.0)));
    }

    #[test]
    fn sqrt_squares_back() {
        let z = C::new(-3.0, 4.0);
        let r = sqrt(z);
        assert!(close(sqr(r), z));
    }

    #[test]
    fn trig_identities_on_reals() {
        let x = C::new(0.7, 0.0);
        assert!(close(sin(x), C::new(0.7f64.sin(), 0.0)));
        assert!(close(cos(x), C::new(0.7f64.cos(), 0.0)));
        assert!(close(tan(x).unwrap(), C::new(0.7f64.tan(), 0.0)));
        assert!(close(tanh(x).unwrap(), C::new(0.7f64.tanh(), 0.0)));
        assert!(close(cotan(x).unwrap(), C::new(1.0 / 0.7f64.tan(), 0.0)));
    }

    #[test]
    fn cotan_at_zero_overflows() {
        assert_eq!(cotan(C::default()), Err(Overflow));
        assert_eq!(cotanh(C::default()), Err(Overflow));
    }

    #[test]
    fn cosxx_flips_imaginary() {
        let z = C::new(0.5, 0.25);
        assert_eq!(cosxx(z), C::new(cos(z).x, -cos(z).y));
    }

    #[test]
    fn inverse_functions() {
        let z = C::new(0.3, 0.2);
        assert!(close(sin(asin(z)), z));
        assert!(close(cos(acos(z)), z));
        assert!(close(sinh(asinh(z)), z));
        assert!(close(tanh(atanh(z).unwrap()).unwrap(), z));
        assert!(close(tan(atan(z).unwrap()).unwrap(), z));
    }

    #[test]
    fn atanh_poles_unchanged() {
        assert_eq!(atanh(C::new(1.0, 0.0)), Ok(C::new(1.0, 0.0)));
        assert_eq!(atanh(C::new(-1.0, 0.0)), Ok(C::new(-1.0, 0.0)));
    }

    #[test]
    fn cabs_is_modulus() {
        assert_eq!(cabs(C::new(3.0, 4.0)), C::new(5.0, 0.0));
    }
}
