//! Stack machine for compiled formulas.
//!
//! An [`Executable`] is the read-only half: bytecode, operand tables, jump
//! targets and the backend's dispatch table. [`Registers`] hold everything
//! that changes while running. [`Vm`] pairs one of each; several `Vm`s may be
//! built from clones of one `Executable` to run on separate threads.

pub mod random;

use serde::Serialize;
use tracing::trace;

use crate::backend::{BackendOps, Complex, MathMode, Numeric, Overflow, Value};
use crate::compiler::{JumpEntry, Program};
use crate::env::{Inversion, Pixel};
use crate::lexer::{Func, Var};
use crate::opcode::OP_END_INIT;
use random::RandState;

/// Result of running a section of the formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Keep iterating.
    Continue,
    /// The final value's real part is zero: the orbit has escaped.
    BailedOut,
    /// An operation could not produce a representable result.
    Overflow,
}

impl Outcome {
    pub fn is_done(self) -> bool {
        self != Outcome::Continue
    }
}

#[derive(Debug, thiserror::Error)]
#[error("constant '{name}' does not fit the {mode} backend")]
pub struct ConstantOutOfRange {
    pub name: String,
    pub mode: MathMode,
}

// ── Executable ─────────────────────────────────────────────────────────────

/// A program bound to a numeric backend.
pub struct Executable<N: Numeric> {
    pub(crate) code: Vec<u8>,
    pub(crate) loads: Vec<usize>,
    pub(crate) stores: Vec<usize>,
    pub(crate) jumps: Vec<JumpEntry>,
    pub(crate) has_init: bool,
    pub(crate) ops: BackendOps<N>,
    pub(crate) ctx: N::Ctx,
    names: Vec<String>,
    initial: Vec<Complex<N>>,
    inversion: Option<Inversion>,
}

impl<N: Numeric> Executable<N> {
    /// Convert the program's slot values to `N`. A slot that does not fit
    /// is an error only if the program actually reads it.
    pub fn new(
        program: &Program,
        bindings: [Func; 4],
        ctx: N::Ctx,
        inversion: Option<Inversion>,
    ) -> Result<Self, ConstantOutOfRange> {
        let mut initial = Vec::with_capacity(program.slots.len());
        for (i, slot) in program.slots.iter().enumerate() {
            let value = match N::complex_from_f64(slot.value, &ctx) {
                Ok(v) => v,
                Err(Overflow) if !program.loads.contains(&i) => Complex::default(),
                Err(Overflow) => {
                    return Err(ConstantOutOfRange {
                        name: slot.name.clone(),
                        mode: N::MODE,
                    });
                }
            };
            initial.push(value);
        }
        Ok(Executable {
            code: program.code.clone(),
            loads: program.loads.clone(),
            stores: program.stores.clone(),
            jumps: program.jumps.clone(),
            has_init: program.has_init,
            ops: BackendOps::new(bindings),
            ctx,
            names: program.slots.iter().map(|s| s.name.clone()).collect(),
            initial,
            inversion,
        })
    }

    pub fn len(&self) -> usize {
        self.code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub fn bindings(&self) -> [Func; 4] {
        self.ops.bindings()
    }
}

impl<N: Numeric> Clone for Executable<N> {
    fn clone(&self) -> Self {
        Executable {
            code: self.code.clone(),
            loads: self.loads.clone(),
            stores: self.stores.clone(),
            jumps: self.jumps.clone(),
            has_init: self.has_init,
            ops: BackendOps::new(self.ops.bindings()),
            ctx: self.ctx,
            names: self.names.clone(),
            initial: self.initial.clone(),
            inversion: self.inversion,
        }
    }
}

impl<N: Numeric> std::fmt::Debug for Executable<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executable")
            .field("mode", &N::MODE)
            .field("ops", &self.code.len())
            .field("slots", &self.initial.len())
            .field("jumps", &self.jumps.len())
            .field("has_init", &self.has_init)
            .finish()
    }
}

// ── Registers ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct Cursor {
    pub op_ptr: usize,
    pub loads: usize,
    pub stores: usize,
    pub jump_index: usize,
}

/// Mutable machine state for one evaluation in flight.
#[derive(Debug, Clone)]
pub struct Registers<N> {
    pub(crate) vars: Vec<Complex<N>>,
    /// `stack[top]` is the current value. `stack[0]` also carries the
    /// last statement's result across a clear.
    pub(crate) stack: Vec<Complex<N>>,
    pub(crate) top: usize,
    pub(crate) cur: Cursor,
    /// Where each iteration starts, captured after the init section.
    pub(crate) after_init: Cursor,
    pub(crate) overflow: bool,
    pub(crate) rand: RandState,
}

impl<N: Numeric> Registers<N> {
    fn new(initial: &[Complex<N>], rand: RandState) -> Self {
        Registers {
            vars: initial.to_vec(),
            stack: vec![Complex::default(); 16],
            top: 0,
            cur: Cursor::default(),
            after_init: Cursor::default(),
            overflow: false,
            rand,
        }
    }
}

// ── Operation view ─────────────────────────────────────────────────────────

/// What an opcode handler sees: the program and the registers.
pub struct VmState<'a, N: Numeric> {
    exe: &'a Executable<N>,
    r: &'a mut Registers<N>,
}

impl<'a, N: Numeric> VmState<'a, N> {
    #[inline]
    pub(crate) fn ctx(&self) -> N::Ctx {
        self.exe.ctx
    }

    #[inline]
    pub(crate) fn top(&self) -> Complex<N> {
        self.r.stack[self.r.top]
    }

    pub(crate) fn var(&self, slot: usize) -> Complex<N> {
        self.r.vars.get(slot).copied().unwrap_or_default()
    }

    pub(crate) fn set_var(&mut self, slot: usize, v: Complex<N>) {
        if let Some(s) = self.r.vars.get_mut(slot) {
            *s = v;
        }
    }

    pub(crate) fn overflowed(&mut self) {
        self.r.overflow = true;
    }

    /// Replace the top value. On overflow the value is left as it was.
    #[inline]
    pub(crate) fn unary(&mut self, f: impl FnOnce(Complex<N>) -> Result<Complex<N>, Overflow>) {
        let top = self.r.top;
        match f(self.r.stack[top]) {
            Ok(v) => self.r.stack[top] = v,
            Err(Overflow) => self.r.overflow = true,
        }
    }

    /// Combine the two top values into one.
    #[inline]
    pub(crate) fn binary(
        &mut self,
        f: impl FnOnce(Complex<N>, Complex<N>) -> Result<Complex<N>, Overflow>,
    ) {
        let rhs = self.r.stack[self.r.top];
        self.r.top = self.r.top.saturating_sub(1);
        let top = self.r.top;
        match f(self.r.stack[top], rhs) {
            Ok(v) => self.r.stack[top] = v,
            Err(Overflow) => self.r.overflow = true,
        }
    }

    pub(crate) fn load(&mut self) {
        let slot = self.exe.loads.get(self.r.cur.loads).copied();
        self.r.cur.loads += 1;
        let v = slot.map(|s| self.var(s)).unwrap_or_default();
        self.r.top += 1;
        if self.r.top == self.r.stack.len() {
            self.r.stack.push(v);
        } else {
            self.r.stack[self.r.top] = v;
        }
    }

    pub(crate) fn store(&mut self) {
        let slot = self.exe.stores.get(self.r.cur.stores).copied();
        self.r.cur.stores += 1;
        if let Some(s) = slot {
            let v = self.top();
            self.set_var(s, v);
        }
    }

    pub(crate) fn clear(&mut self) {
        self.r.stack[0] = self.top();
        self.r.top = 0;
    }

    pub(crate) fn end_init(&mut self) {
        self.r.after_init.jump_index = self.r.cur.jump_index;
    }

    pub(crate) fn jump(&mut self) {
        if let Some(entry) = self.exe.jumps.get(self.r.cur.jump_index) {
            self.r.cur.op_ptr = entry.target.op_ptr;
            self.r.cur.loads = entry.target.loads;
            self.r.cur.stores = entry.target.stores;
            self.r.cur.jump_index = entry.dest;
        }
    }

    pub(crate) fn skip_jump(&mut self) {
        self.r.cur.jump_index += 1;
    }

    pub(crate) fn rand(&mut self) -> &mut RandState {
        &mut self.r.rand
    }

    /// Draw a new `rand` value.
    pub(crate) fn refresh_rand(&mut self) {
        let ctx = self.ctx();
        let (x, y) = self.r.rand.draw();
        let v = Complex::new(N::from_random(x, &ctx), N::from_random(y, &ctx));
        self.set_var(Var::Rand.slot(), v);
    }

    /// Execute from the current op pointer to the end, or through the
    /// init marker when `init_only`. Stops early on overflow.
    fn run(&mut self, init_only: bool) {
        let exe = self.exe;
        while self.r.cur.op_ptr < exe.code.len() {
            let op = exe.code[self.r.cur.op_ptr];
            (exe.ops.get(op))(self);
            self.r.cur.op_ptr += 1;
            if self.r.overflow || (init_only && op == OP_END_INIT) {
                return;
            }
        }
    }
}

// ── Machine ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Vm<N: Numeric> {
    exe: Executable<N>,
    regs: Registers<N>,
}

impl<N: Numeric> Vm<N> {
    pub fn new(exe: Executable<N>, rand: RandState) -> Self {
        let regs = Registers::new(&exe.initial, rand);
        Vm { exe, regs }
    }

    pub fn executable(&self) -> &Executable<N> {
        &self.exe
    }

    fn state(&mut self) -> VmState<'_, N> {
        VmState {
            exe: &self.exe,
            r: &mut self.regs,
        }
    }

    /// Set up for a new pixel and run the init section. Returns
    /// `Continue` unless an operation overflowed.
    pub fn per_pixel(&mut self, pixel: &Pixel) -> Outcome {
        let ctx = self.exe.ctx;
        self.regs.overflow = false;
        self.regs.cur = Cursor::default();
        self.regs.after_init = Cursor::default();
        self.regs.top = 0;

        let fixed = N::MODE == MathMode::Fixed;
        let mut coord = pixel.coord;
        if let Some(inv) = self.exe.inversion {
            coord = inv.apply(coord);
            if fixed && coord.norm_sqr() >= 127.0 {
                coord = Complex::new(8.0, 8.0);
            }
        }
        let white = if pixel.white_square() { 1.0 } else { 0.0 };
        let screen = Complex::new(pixel.col as f64, pixel.row as f64);
        let seeded = [
            (Var::ScrnPix, screen),
            (Var::WhiteSq, Complex::new(white, 0.0)),
            (Var::Pixel, coord),
        ];
        for (var, value) in seeded {
            match N::complex_from_f64(value, &ctx) {
                Ok(v) => self.regs.vars[var.slot()] = v,
                Err(Overflow) => {
                    trace!(target: "frm::vm", ?var, "pixel value out of range");
                    self.regs.overflow = true;
                    return Outcome::Overflow;
                }
            }
        }

        if self.exe.has_init {
            self.state().run(true);
        }
        let jump_index = self.regs.after_init.jump_index;
        self.regs.after_init = Cursor {
            jump_index,
            ..self.regs.cur
        };
        if self.regs.overflow {
            Outcome::Overflow
        } else {
            Outcome::Continue
        }
    }

    /// Run the iterated section once.
    pub fn iterate(&mut self) -> Outcome {
        if self.regs.overflow {
            return Outcome::Overflow;
        }
        self.regs.cur = self.regs.after_init;
        self.regs.top = 0;
        if self.regs.rand.active() {
            self.state().refresh_rand();
        }
        self.state().run(false);
        if self.regs.overflow {
            trace!(target: "frm::vm", op = self.regs.cur.op_ptr, "overflow");
            return Outcome::Overflow;
        }
        if self.regs.stack[self.regs.top].x.is_zero() {
            Outcome::BailedOut
        } else {
            Outcome::Continue
        }
    }

    /// Iterate until the formula bails out, overflows, or `max` iterations
    /// pass. Returns the outcome and the number of iterations run.
    pub fn orbit(&mut self, pixel: &Pixel, max: u32) -> (Outcome, u32) {
        if self.per_pixel(pixel) == Outcome::Overflow {
            return (Outcome::Overflow, 0);
        }
        for n in 1..=max {
            let outcome = self.iterate();
            if outcome.is_done() {
                return (outcome, n);
            }
        }
        (Outcome::Continue, max)
    }

    pub fn var(&self, slot: usize) -> Option<Value> {
        self.regs.vars.get(slot).map(|&c| N::tag(c, &self.exe.ctx))
    }

    /// Current value of a variable by name.
    pub fn var_named(&self, name: &str) -> Option<Value> {
        let slot = self.exe.names.iter().position(|n| n.eq_ignore_ascii_case(name))?;
        self.var(slot)
    }

    pub fn z(&self) -> Value {
        N::tag(self.regs.vars[Var::Z.slot()], &self.exe.ctx)
    }

    /// The value left on top of the stack by the last run.
    pub fn top(&self) -> Value {
        N::tag(self.regs.stack[self.regs.top], &self.exe.ctx)
    }

    pub fn overflowed(&self) -> bool {
        self.regs.overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[cfg(feature = "fixed")]
    use crate::backend::{Fixed, FixedScale};
    #[cfg(feature = "mp")]
    use crate::backend::Mp;
    use crate::compiler::compile;
    use crate::env::Environment;
    use crate::jumps::resolve;
    use crate::lexer::lex_body;
    use crate::prescan::prescan;

    const DEFAULT_FNS: [Func; 4] = [Func::Sin, Func::Sqr, Func::Sinh, Func::Cosh];

    fn program(body: &str) -> Program {
        let src = format!("{body}\n}}");
        let stats = prescan(&src, 0).expect("prescan");
        let mut p = compile(&lex_body(&src, 0), &stats, &Environment::default());
        resolve(&mut p).expect("resolve");
        p
    }

    fn float_vm(body: &str) -> Vm<f64> {
        let exe = Executable::<f64>::new(&program(body), DEFAULT_FNS, (), None).unwrap();
        Vm::new(exe, RandState::default())
    }

    fn pixel(x: f64, y: f64) -> Pixel {
        Pixel::at(Complex::new(x, y))
    }

    fn float(v: Value) -> Complex<f64> {
        v.to_f64()
    }

    fn eval(body: &str) -> Complex<f64> {
        let mut vm = float_vm(body);
        vm.per_pixel(&Pixel::default());
        vm.iterate();
        float(vm.top())
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("1+2*3").x, 7.0);
        assert_eq!(eval("(1+2)*3").x, 9.0);
        assert_eq!(eval("2^3^2").x.round(), 64.0);
        assert_eq!(eval("8/2/2").x, 2.0);
        assert_eq!(eval("1-2-3").x, -4.0);
        assert_eq!(eval("-2^2").x.round(), 4.0);
    }

    #[test]
    fn parenthesized_forms_agree() {
        let pairs = [
            ("1+2*3-4/5", "1+(2*3)-(4/5)"),
            ("2*3^2+1", "2*(3^2)+1"),
            ("(1,2)*(3,4)+5", "((1,2)*(3,4))+5"),
        ];
        for (plain, grouped) in pairs {
            let (a, b) = (eval(plain), eval(grouped));
            assert!((a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9, "{plain}");
        }
    }

    #[test]
    fn complex_literals_multiply() {
        assert_eq!(eval("(1,2)*(3,4)"), Complex::new(-5.0, 10.0));
    }

    #[test]
    fn chained_assignment_sets_both() {
        let mut vm = float_vm("a=b=1,a");
        vm.per_pixel(&Pixel::default());
        vm.iterate();
        assert_eq!(float(vm.var_named("a").unwrap()), Complex::new(1.0, 0.0));
        assert_eq!(float(vm.var_named("b").unwrap()), Complex::new(1.0, 0.0));
        assert_eq!(float(vm.top()).x, 1.0);
    }

    #[test]
    fn mandelbrot_step() {
        let mut vm = float_vm("z=pixel,z=z*z+pixel,z");
        assert_eq!(vm.per_pixel(&pixel(-0.5, 0.0)), Outcome::Continue);
        assert_eq!(vm.iterate(), Outcome::Continue);
        assert_eq!(float(vm.top()).x, -0.25);
        assert_eq!(float(vm.z()), Complex::new(-0.25, 0.0));
    }

    #[test]
    fn init_section_runs_once_per_pixel() {
        let mut vm = float_vm("z=pixel, n=0: n=n+1, z=z*z+pixel, |z| < 4");
        vm.per_pixel(&pixel(0.1, 0.1));
        assert_eq!(float(vm.var_named("n").unwrap()).x, 0.0);
        for i in 1..=3 {
            assert_eq!(vm.iterate(), Outcome::Continue);
            assert_eq!(float(vm.var_named("n").unwrap()).x, i as f64);
        }
        vm.per_pixel(&pixel(0.1, 0.1));
        assert_eq!(float(vm.var_named("n").unwrap()).x, 0.0);
    }

    #[test]
    fn escaping_orbit_bails_out() {
        let mut vm = float_vm("z=0: z=sqr(z)+pixel, |z| <= 4");
        let (outcome, n) = vm.orbit(&pixel(1.0, 1.0), 100);
        assert_eq!(outcome, Outcome::BailedOut);
        assert!(n < 5);
        let (outcome, n) = vm.orbit(&pixel(-0.1, 0.0), 100);
        assert_eq!((outcome, n), (Outcome::Continue, 100));
    }

    #[test]
    fn sqr_updates_lastsqr() {
        let mut vm = float_vm("z=sqr((3,4)), lastsqr");
        vm.per_pixel(&Pixel::default());
        vm.iterate();
        assert_eq!(float(vm.z()), Complex::new(-7.0, 24.0));
        assert_eq!(float(vm.top()), Complex::new(25.0, 0.0));
    }

    #[test]
    fn comparisons_use_real_parts() {
        assert_eq!(eval("(1,5) < (2,0)"), Complex::new(1.0, 0.0));
        assert_eq!(eval("3 == 3"), Complex::new(1.0, 0.0));
        assert_eq!(eval("3 != 3"), Complex::new(0.0, 0.0));
        assert_eq!(eval("0 || 2"), Complex::new(1.0, 0.0));
        assert_eq!(eval("1 && 0"), Complex::new(0.0, 0.0));
    }

    #[test]
    fn conditional_skips_negation() {
        let body = "z=pixel: if(real(z)<0)\nz=-z\nendif\nz=z*z+pixel";
        let mut vm = float_vm(body);
        vm.per_pixel(&pixel(0.25, 0.0));
        let mut z = Complex::new(0.25, 0.0);
        for _ in 0..3 {
            vm.iterate();
            z = Complex::new(z.x * z.x + 0.25, 0.0);
            assert_eq!(float(vm.z()), z);
        }
        // negative real part takes the branch
        vm.per_pixel(&pixel(-0.5, 0.0));
        vm.iterate();
        assert_eq!(float(vm.z()), Complex::new(-0.25, 0.0));
    }

    #[test]
    fn branch_cursors_line_up() {
        // every branch loads and stores different slots; a cursor slip
        // would write the wrong variable
        let body = "if(p1 == 1)\na=10\nelseif(p1 == 2)\nb=20\nelse\nc=30\nendif\nd=a+b+c";
        for (p, want) in [(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)] {
            let mut env = Environment::default();
            env.set_param(1, Complex::new(p, 0.0));
            let src = format!("{body}\n}}");
            let stats = prescan(&src, 0).unwrap();
            let mut prog = compile(&lex_body(&src, 0), &stats, &env);
            resolve(&mut prog).unwrap();
            let mut vm = Vm::new(
                Executable::<f64>::new(&prog, DEFAULT_FNS, (), None).unwrap(),
                RandState::default(),
            );
            vm.per_pixel(&Pixel::default());
            vm.iterate();
            assert_eq!(float(vm.var_named("d").unwrap()).x, want, "p1={p}");
        }
    }

    #[test]
    fn nested_branches() {
        let body = "if(p1 > 0)\nif(p2 > 0)\nk=1\nelseif(p2 < 0)\nk=2\nelse\nk=3\nendif\nelse\nif(p2 > 0)\nk=4\nelse\nk=5\nendif\nendif\nk";
        let cases = [
            ((1.0, 1.0), 1.0),
            ((1.0, -1.0), 2.0),
            ((1.0, 0.0), 3.0),
            ((-1.0, 1.0), 4.0),
            ((-1.0, -1.0), 5.0),
        ];
        for ((p1, p2), want) in cases {
            let mut env = Environment::default();
            env.set_param(1, Complex::new(p1, 0.0));
            env.set_param(2, Complex::new(p2, 0.0));
            let src = format!("{body}\n}}");
            let stats = prescan(&src, 0).unwrap();
            let mut prog = compile(&lex_body(&src, 0), &stats, &env);
            resolve(&mut prog).unwrap();
            let exe = Executable::<f64>::new(&prog, DEFAULT_FNS, (), None).unwrap();
            let mut vm = Vm::new(exe, RandState::default());
            vm.per_pixel(&Pixel::default());
            vm.iterate();
            assert_eq!(float(vm.top()).x, want, "p1={p1} p2={p2}");
        }
    }

    #[test]
    #[cfg(feature = "fixed")]
    fn division_by_zero_overflows_in_fixed() {
        let prog = program("z = 1/0, z = z + 1");
        let exe = Executable::<Fixed>::new(&prog, DEFAULT_FNS, FixedScale::new(16).unwrap(), None).unwrap();
        let mut vm = Vm::new(exe, RandState::default());
        vm.per_pixel(&Pixel::default());
        assert_eq!(vm.iterate(), Outcome::Overflow);
        assert!(vm.overflowed());
        // stopped before the second statement
        assert_eq!(float(vm.z()), Complex::new(0.0, 0.0));
    }

    #[test]
    fn overflow_in_init_sticks_until_next_pixel() {
        let prog = program("z = 1/0: z = z + 1");
        let exe = Executable::<f64>::new(&prog, DEFAULT_FNS, (), None).unwrap();
        let mut vm = Vm::new(exe, RandState::default());
        assert_eq!(vm.per_pixel(&Pixel::default()), Outcome::Overflow);
        assert_eq!(vm.iterate(), Outcome::Overflow);
    }

    #[test]
    #[cfg(all(feature = "fixed", feature = "mp"))]
    fn fixed_and_mp_agree_with_float() {
        let body = "z=pixel: z=z*z+pixel, |z| < 4";
        let prog = program(body);
        let px = pixel(-0.75, 0.125);

        let mut f = Vm::new(Executable::<f64>::new(&prog, DEFAULT_FNS, (), None).unwrap(), RandState::default());
        let scale = FixedScale::new(24).unwrap();
        let mut l = Vm::new(Executable::<Fixed>::new(&prog, DEFAULT_FNS, scale, None).unwrap(), RandState::default());
        let mut m = Vm::new(Executable::<Mp>::new(&prog, DEFAULT_FNS, (), None).unwrap(), RandState::default());
        f.per_pixel(&px);
        l.per_pixel(&px);
        m.per_pixel(&px);
        for _ in 0..5 {
            let want = f.iterate();
            assert_eq!(l.iterate(), want);
            assert_eq!(m.iterate(), want);
        }
        let (fz, lz, mz) = (float(f.z()), float(l.z()), float(m.z()));
        assert!((fz.x - lz.x).abs() < 1e-4 && (fz.y - lz.y).abs() < 1e-4);
        assert!((fz.x - mz.x).abs() < 1e-12 && (fz.y - mz.y).abs() < 1e-12);
        assert_eq!(l.z().mode(), MathMode::Fixed);
    }

    #[test]
    fn fn_parameters_follow_bindings() {
        let prog = program("fn1(pixel)");
        let bound = [Func::Sqr, Func::Sin, Func::Sin, Func::Sin];
        let mut vm = Vm::new(Executable::<f64>::new(&prog, bound, (), None).unwrap(), RandState::default());
        vm.per_pixel(&pixel(3.0, 0.0));
        vm.iterate();
        assert_eq!(float(vm.top()), Complex::new(9.0, 0.0));
    }

    #[test]
    fn screen_variables_follow_the_pixel() {
        let mut vm = float_vm("scrnpix + whitesq");
        let px = Pixel {
            col: 3,
            row: 4,
            coord: Complex::default(),
        };
        vm.per_pixel(&px);
        vm.iterate();
        assert_eq!(float(vm.top()), Complex::new(4.0, 4.0));
    }

    #[test]
    fn inversion_moves_pixel() {
        let prog = program("pixel");
        let inv = Inversion {
            radius: 1.0,
            center: Complex::default(),
        };
        let mut vm = Vm::new(Executable::<f64>::new(&prog, DEFAULT_FNS, (), Some(inv)).unwrap(), RandState::default());
        vm.per_pixel(&pixel(2.0, 0.0));
        vm.iterate();
        assert_eq!(float(vm.top()), Complex::new(0.5, 0.0));
    }

    #[test]
    #[cfg(feature = "fixed")]
    fn fixed_inversion_clamps_far_points() {
        let prog = program("pixel");
        let inv = Inversion {
            radius: 1.0,
            center: Complex::default(),
        };
        let scale = FixedScale::new(16).unwrap();
        let mut vm = Vm::new(Executable::<Fixed>::new(&prog, DEFAULT_FNS, scale, Some(inv)).unwrap(), RandState::default());
        vm.per_pixel(&pixel(0.01, 0.0));
        vm.iterate();
        assert_eq!(float(vm.top()), Complex::new(8.0, 8.0));
    }

    #[test]
    fn srand_makes_rand_repeatable() {
        let run = || {
            let mut vm = float_vm("z = srand(pixel): z = rand");
            vm.per_pixel(&pixel(0.5, 0.25));
            let mut seen = vec![float(vm.z())];
            for _ in 0..3 {
                vm.iterate();
                seen.push(float(vm.z()));
            }
            seen
        };
        let a = run();
        assert_eq!(a, run());
        assert!(a.iter().all(|c| (0.0..1.0).contains(&c.x) && (0.0..1.0).contains(&c.y)));
        assert_ne!(a[1], a[2]);
    }

    #[test]
    #[cfg(feature = "fixed")]
    fn unused_constant_out_of_fixed_range_is_tolerated() {
        let prog = program("z = pixel");
        let scale = FixedScale::new(29).unwrap();
        assert!(Executable::<Fixed>::new(&prog, DEFAULT_FNS, scale, None).is_ok());
        let prog = program("z = 100");
        let err = Executable::<Fixed>::new(&prog, DEFAULT_FNS, scale, None).unwrap_err();
        assert_eq!(err.name, "100");
    }

    #[test]
    fn clones_run_independently() {
        let exe = Executable::<f64>::new(&program("z=0: z=z+1, z"), DEFAULT_FNS, (), None).unwrap();
        let mut a = Vm::new(exe.clone(), RandState::default());
        let mut b = Vm::new(exe, RandState::default());
        a.per_pixel(&Pixel::default());
        b.per_pixel(&Pixel::default());
        a.iterate();
        a.iterate();
        b.iterate();
        assert_eq!(float(a.z()).x, 2.0);
        assert_eq!(float(b.z()).x, 1.0);
    }
}
