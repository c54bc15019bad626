//! Values the host supplies: the parameters and screen geometry a formula
//! sees through its predefined variables, and the per-pixel coordinates.

use serde::Serialize;

use crate::backend::Complex;

/// Parameters and view geometry, copied into the predefined variable slots
/// when a formula is loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Environment {
    pub params: [Complex<f64>; 5],
    pub max_iterations: u32,
    /// Screen width and height in pixels.
    pub screen: (u32, u32),
    pub is_mandelbrot: bool,
    pub center: Complex<f64>,
    /// Magnification and x-magnification factor.
    pub mag: Complex<f64>,
    /// Rotation and skew, in degrees.
    pub rot_skew: Complex<f64>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment {
            params: [Complex::default(); 5],
            max_iterations: 150,
            screen: (640, 480),
            is_mandelbrot: true,
            center: Complex::default(),
            mag: Complex::new(1.0, 1.0),
            rot_skew: Complex::default(),
        }
    }
}

impl Environment {
    /// `p1..p5` by 1-based index.
    pub fn param(&self, n: usize) -> Complex<f64> {
        self.params.get(n.wrapping_sub(1)).copied().unwrap_or_default()
    }

    pub fn set_param(&mut self, n: usize, value: Complex<f64>) {
        if let Some(slot) = self.params.get_mut(n.wrapping_sub(1)) {
            *slot = value;
        }
    }
}

/// Circle inversion applied to `pixel` before the init section runs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Inversion {
    pub radius: f64,
    pub center: Complex<f64>,
}

impl Inversion {
    /// `center + radius * (z - center) / |z - center|^2`. A point within
    /// `f64::MIN_POSITIVE` of the center is scaled by `f64::MAX` instead.
    pub fn apply(&self, z: Complex<f64>) -> Complex<f64> {
        let d = Complex::new(z.x - self.center.x, z.y - self.center.y);
        let r2 = d.norm_sqr();
        let factor = if r2 > f64::MIN_POSITIVE {
            self.radius / r2
        } else {
            f64::MAX
        };
        Complex::new(d.x * factor + self.center.x, d.y * factor + self.center.y)
    }
}

/// Where the current pixel is, on screen and in the complex plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Pixel {
    pub col: u32,
    pub row: u32,
    pub coord: Complex<f64>,
}

impl Pixel {
    pub fn at(coord: Complex<f64>) -> Self {
        Pixel {
            col: 0,
            row: 0,
            coord,
        }
    }

    /// `whitesq`: 1 on alternating screen squares.
    pub fn white_square(&self) -> bool {
        (self.row.wrapping_add(self.col)) & 1 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_one_based() {
        let mut env = Environment::default();
        env.set_param(2, Complex::new(1.0, -1.0));
        assert_eq!(env.param(2), Complex::new(1.0, -1.0));
        assert_eq!(env.param(1), Complex::default());
        assert_eq!(env.param(0), Complex::default());
        assert_eq!(env.param(6), Complex::default());
    }

    #[test]
    fn inversion_maps_circle_to_itself() {
        let inv = Inversion {
            radius: 1.0,
            center: Complex::default(),
        };
        assert_eq!(inv.apply(Complex::new(1.0, 0.0)), Complex::new(1.0, 0.0));
        assert_eq!(inv.apply(Complex::new(2.0, 0.0)), Complex::new(0.5, 0.0));
    }

    #[test]
    fn inversion_fixes_the_center() {
        let inv = Inversion {
            radius: 1.0,
            center: Complex::new(0.5, 0.5),
        };
        let out = inv.apply(Complex::new(0.5, 0.5));
        assert_eq!(out, Complex::new(0.5, 0.5));
    }

    #[test]
    fn inversion_near_center_goes_far() {
        let inv = Inversion {
            radius: 1.0,
            center: Complex::default(),
        };
        let out = inv.apply(Complex::new(1e-200, 0.0));
        assert!(out.x > 1e100, "{out}");
        assert_eq!(out.y, 0.0);
    }

    #[test]
    fn white_square_alternates() {
        let mut p = Pixel::default();
        assert!(!p.white_square());
        p.col = 1;
        assert!(p.white_square());
        p.row = 1;
        assert!(!p.white_square());
    }
}
