//! Every opcode, written once over [`Numeric`].
//!
//! Arithmetic goes through the backend's leaf operations. Transcendental
//! functions convert to `f64`, evaluate in [`cmath`], and convert back, so
//! a result the backend cannot hold raises the overflow flag.

use super::{cmath, Complex, Numeric, OpFn, Overflow};
use crate::lexer::{Func, Var};
use crate::opcode::*;
use crate::vm::VmState;

type C = Complex<f64>;

pub(crate) fn nop<N: Numeric>(_: &mut VmState<'_, N>) {}

/// Handler for a primitive (non-function) opcode.
pub(crate) fn primitive<N: Numeric>(op: u8) -> OpFn<N> {
    match op {
        OP_LOAD => load::<N>,
        OP_STORE => store::<N>,
        OP_CLEAR => clear::<N>,
        OP_END_INIT => end_init::<N>,
        OP_JUMP => jump::<N>,
        OP_JUMP_ON_FALSE => jump_on_false::<N>,
        OP_JUMP_ON_TRUE => jump_on_true::<N>,
        OP_JUMP_LABEL => jump_label::<N>,
        OP_ADD => add::<N>,
        OP_SUB => sub::<N>,
        OP_MUL => mul::<N>,
        OP_DIV => div::<N>,
        OP_POW => pow::<N>,
        OP_NEG => neg::<N>,
        OP_MOD => modulus::<N>,
        OP_LT => lt::<N>,
        OP_LE => le::<N>,
        OP_GT => gt::<N>,
        OP_GE => ge::<N>,
        OP_EQ => eq::<N>,
        OP_NE => ne::<N>,
        OP_OR => or::<N>,
        OP_AND => and::<N>,
        _ => nop::<N>,
    }
}

/// Handler for a function opcode. `fn1..fn4` map to nothing here; the
/// dispatch table binds them to their targets.
pub(crate) fn function<N: Numeric>(f: Func) -> OpFn<N> {
    match f {
        Func::Sin => sin::<N>,
        Func::Sinh => sinh::<N>,
        Func::Cos => cos::<N>,
        Func::Cosh => cosh::<N>,
        Func::Sqr => sqr::<N>,
        Func::Log => log::<N>,
        Func::Exp => exp::<N>,
        Func::Abs => abs::<N>,
        Func::Conj => conj::<N>,
        Func::Real => real::<N>,
        Func::Imag => imag::<N>,
        Func::Flip => flip::<N>,
        Func::Tan => tan::<N>,
        Func::Tanh => tanh::<N>,
        Func::Cotan => cotan::<N>,
        Func::Cotanh => cotanh::<N>,
        Func::Cosxx => cosxx::<N>,
        Func::Srand => srand::<N>,
        Func::Asin => asin::<N>,
        Func::Asinh => asinh::<N>,
        Func::Acos => acos::<N>,
        Func::Acosh => acosh::<N>,
        Func::Atan => atan::<N>,
        Func::Atanh => atanh::<N>,
        Func::Sqrt => sqrt::<N>,
        Func::Cabs => cabs::<N>,
        Func::Floor => floor::<N>,
        Func::Ceil => ceil::<N>,
        Func::Trunc => trunc::<N>,
        Func::Round => round::<N>,
        Func::Fn1 | Func::Fn2 | Func::Fn3 | Func::Fn4 => nop::<N>,
    }
}

// ── Complex arithmetic over leaf ops ───────────────────────────────────────

fn c_add<N: Numeric>(a: Complex<N>, b: Complex<N>, ctx: &N::Ctx) -> Complex<N> {
    Complex::new(a.x.add(b.x, ctx), a.y.add(b.y, ctx))
}

fn c_sub<N: Numeric>(a: Complex<N>, b: Complex<N>, ctx: &N::Ctx) -> Complex<N> {
    Complex::new(a.x.sub(b.x, ctx), a.y.sub(b.y, ctx))
}

fn c_mul<N: Numeric>(a: Complex<N>, b: Complex<N>, ctx: &N::Ctx) -> Result<Complex<N>, Overflow> {
    let x = a.x.mul(b.x, ctx)?.sub(a.y.mul(b.y, ctx)?, ctx);
    let y = a.x.mul(b.y, ctx)?.add(a.y.mul(b.x, ctx)?, ctx);
    Ok(Complex::new(x, y))
}

fn modulus_of<N: Numeric>(z: Complex<N>, ctx: &N::Ctx) -> Result<N, Overflow> {
    Ok(z.x.mul(z.x, ctx)?.add(z.y.mul(z.y, ctx)?, ctx))
}

fn c_div<N: Numeric>(a: Complex<N>, b: Complex<N>, ctx: &N::Ctx) -> Result<Complex<N>, Overflow> {
    let d = modulus_of(b, ctx)?;
    if d.is_tiny(ctx) {
        return Err(Overflow);
    }
    let x = a.x.mul(b.x, ctx)?.add(a.y.mul(b.y, ctx)?, ctx);
    let y = a.y.mul(b.x, ctx)?.sub(a.x.mul(b.y, ctx)?, ctx);
    Ok(Complex::new(x.div(d, ctx)?, y.div(d, ctx)?))
}

fn via_f64<N: Numeric>(st: &mut VmState<'_, N>, f: fn(C) -> Result<C, Overflow>) {
    let ctx = st.ctx();
    st.unary(|z| N::complex_from_f64(f(N::complex_to_f64(z, &ctx))?, &ctx));
}

// ── Stack and control ──────────────────────────────────────────────────────

fn load<N: Numeric>(st: &mut VmState<'_, N>) {
    st.load();
}

fn store<N: Numeric>(st: &mut VmState<'_, N>) {
    st.store();
}

fn clear<N: Numeric>(st: &mut VmState<'_, N>) {
    st.clear();
}

fn end_init<N: Numeric>(st: &mut VmState<'_, N>) {
    st.end_init();
}

fn jump<N: Numeric>(st: &mut VmState<'_, N>) {
    st.jump();
}

fn jump_on_false<N: Numeric>(st: &mut VmState<'_, N>) {
    if st.top().x.is_zero() {
        st.jump();
    } else {
        st.skip_jump();
    }
}

fn jump_on_true<N: Numeric>(st: &mut VmState<'_, N>) {
    if st.top().x.is_zero() {
        st.skip_jump();
    } else {
        st.jump();
    }
}

fn jump_label<N: Numeric>(st: &mut VmState<'_, N>) {
    st.skip_jump();
}

// ── Operators ──────────────────────────────────────────────────────────────

fn add<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    st.binary(|a, b| Ok(c_add(a, b, &ctx)));
}

fn sub<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    st.binary(|a, b| Ok(c_sub(a, b, &ctx)));
}

fn mul<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    st.binary(|a, b| c_mul(a, b, &ctx));
}

fn div<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    st.binary(|a, b| c_div(a, b, &ctx));
}

fn pow<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    st.binary(|a, b| {
        let r = cmath::pow(N::complex_to_f64(a, &ctx), N::complex_to_f64(b, &ctx));
        N::complex_from_f64(r, &ctx)
    });
}

fn neg<N: Numeric>(st: &mut VmState<'_, N>) {
    st.unary(|z| Ok(Complex::new(z.x.neg(), z.y.neg())));
}

/// `|z|`: the squared modulus, real.
fn modulus<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    st.unary(|z| Ok(Complex::new(modulus_of(z, &ctx)?, N::default())));
}

fn compare<N: Numeric>(st: &mut VmState<'_, N>, test: fn(N, N) -> bool) {
    let ctx = st.ctx();
    st.binary(|a, b| Ok(Complex::new(N::from_bool(test(a.x, b.x), &ctx), N::default())));
}

fn lt<N: Numeric>(st: &mut VmState<'_, N>) {
    compare(st, |a, b| a < b);
}

fn le<N: Numeric>(st: &mut VmState<'_, N>) {
    compare(st, |a, b| a <= b);
}

fn gt<N: Numeric>(st: &mut VmState<'_, N>) {
    compare(st, |a, b| a > b);
}

fn ge<N: Numeric>(st: &mut VmState<'_, N>) {
    compare(st, |a, b| a >= b);
}

fn eq<N: Numeric>(st: &mut VmState<'_, N>) {
    compare(st, |a, b| a == b);
}

fn ne<N: Numeric>(st: &mut VmState<'_, N>) {
    compare(st, |a, b| a != b);
}

fn or<N: Numeric>(st: &mut VmState<'_, N>) {
    compare(st, |a, b| !a.is_zero() || !b.is_zero());
}

fn and<N: Numeric>(st: &mut VmState<'_, N>) {
    compare(st, |a, b| !a.is_zero() && !b.is_zero());
}

// ── Functions ──────────────────────────────────────────────────────────────

/// `sqr` also leaves `|z|^2` in `lastsqr`.
fn sqr<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    let z = st.top();
    let squares = z.x.mul(z.x, &ctx).and_then(|xx| Ok((xx, z.y.mul(z.y, &ctx)?)));
    match squares {
        Ok((xx, yy)) => {
            st.set_var(Var::LastSqr.slot(), Complex::new(xx.add(yy, &ctx), N::default()));
            st.unary(|z| {
                let xy = z.x.mul(z.y, &ctx)?;
                Ok(Complex::new(xx.sub(yy, &ctx), xy.add(xy, &ctx)))
            });
        }
        Err(Overflow) => st.overflowed(),
    }
}

fn abs<N: Numeric>(st: &mut VmState<'_, N>) {
    st.unary(|z| Ok(Complex::new(z.x.abs(), z.y.abs())));
}

fn conj<N: Numeric>(st: &mut VmState<'_, N>) {
    st.unary(|z| Ok(Complex::new(z.x, z.y.neg())));
}

fn real<N: Numeric>(st: &mut VmState<'_, N>) {
    st.unary(|z| Ok(Complex::new(z.x, N::default())));
}

fn imag<N: Numeric>(st: &mut VmState<'_, N>) {
    st.unary(|z| Ok(Complex::new(z.y, N::default())));
}

fn flip<N: Numeric>(st: &mut VmState<'_, N>) {
    st.unary(|z| Ok(Complex::new(z.y, z.x)));
}

fn floor<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    st.unary(|z| Ok(Complex::new(z.x.floor(&ctx), z.y.floor(&ctx))));
}

fn ceil<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    st.unary(|z| Ok(Complex::new(z.x.ceil(&ctx), z.y.ceil(&ctx))));
}

fn trunc<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    st.unary(|z| Ok(Complex::new(z.x.trunc(&ctx), z.y.trunc(&ctx))));
}

fn round<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    st.unary(|z| Ok(Complex::new(z.x.round(&ctx), z.y.round(&ctx))));
}

/// `srand(z)`: reseed from `z`, then yield the first `rand` value.
fn srand<N: Numeric>(st: &mut VmState<'_, N>) {
    let ctx = st.ctx();
    let z = st.top();
    st.rand().seed(z.x.seed_bits(&ctx), z.y.seed_bits(&ctx));
    st.refresh_rand();
    let r = st.var(Var::Rand.slot());
    st.unary(|_| Ok(r));
}

macro_rules! through_f64 {
    ($($name:ident => $f:expr;)*) => {
        $(
            fn $name<N: Numeric>(st: &mut VmState<'_, N>) {
                via_f64(st, $f);
            }
        )*
    };
}

through_f64! {
    sin => |z| Ok(cmath::sin(z));
    sinh => |z| Ok(cmath::sinh(z));
    cos => |z| Ok(cmath::cos(z));
    cosh => |z| Ok(cmath::cosh(z));
    cosxx => |z| Ok(cmath::cosxx(z));
    log => |z| Ok(cmath::log(z));
    exp => |z| Ok(cmath::exp(z));
    tan => cmath::tan;
    tanh => cmath::tanh;
    cotan => cmath::cotan;
    cotanh => cmath::cotanh;
    asin => |z| Ok(cmath::asin(z));
    asinh => |z| Ok(cmath::asinh(z));
    acos => |z| Ok(cmath::acos(z));
    acosh => |z| Ok(cmath::acosh(z));
    atan => cmath::atan;
    atanh => cmath::atanh;
    sqrt => |z| Ok(cmath::sqrt(z));
    cabs => |z| Ok(cmath::cabs(z));
}
