//! Loading a formula: header check, prescan, compile, jump resolution and
//! binding to a numeric backend, plus the bad-formula fallback.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

#[cfg(feature = "fixed")]
use crate::backend::{Fixed, FixedScale};
use crate::backend::{MathMode, Numeric, Value};
#[cfg(feature = "mp")]
use crate::backend::Mp;
use crate::compiler::{self, FormulaInfo, Program};
use crate::diagnostic::{MessageSink, Severity, classic};
use crate::entry::{self, Header, HeaderError, LocateError, Symmetry};
use crate::env::{Environment, Inversion, Pixel};
use crate::jumps::{self, JumpError};
use crate::lexer::{Func, lex_body};
use crate::prescan::{self, ParseError, ParseErrorKind};
use crate::vm::random::RandState;
use crate::vm::{ConstantOutOfRange, Executable, Outcome, Vm};

/// Longest formula, counted in token characters.
pub const MAX_FORMULA_CHARS: usize = 8190;

// ── Options ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct LoadOptions {
    pub math: MathMode,
    /// Fractional bits in fixed-point mode, 8..=29.
    pub bitshift: u32,
    /// Targets for `fn1..fn4`.
    pub functions: [Func; 4],
    pub env: Environment,
    pub inversion: Option<Inversion>,
    /// Warn when the header names an unknown symmetry.
    pub report_bad_symmetry: bool,
    /// Seed for `rand`. `None` seeds from the system.
    pub seed: Option<u64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            math: MathMode::Float,
            bitshift: 16,
            functions: [Func::Sin, Func::Sqr, Func::Sinh, Func::Cosh],
            env: Environment::default(),
            inversion: None,
            report_bad_symmetry: true,
            seed: None,
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("no formula named '{name}' in {path}")]
    NotFound { name: String, path: String },
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Header(#[from] HeaderError),
    #[error("{} syntax error(s) in formula", errors.len())]
    Prescan {
        errors: Vec<ParseError>,
        /// The library text the error offsets point into.
        text: String,
        entry_start: usize,
    },
    #[error("formula is too large ({chars} characters, at most {MAX_FORMULA_CHARS})")]
    TooLarge { chars: usize },
    #[error("formula has no instructions")]
    NoInstructions,
    #[error("error in parsing jump statements: {0}")]
    JumpStructure(#[from] JumpError),
    #[error("{0} math is not available in this build")]
    Unimplemented(MathMode),
    #[error("bitshift {0} is out of range (8..=29)")]
    Bitshift(u32),
    #[error(transparent)]
    ConstantOutOfRange(#[from] ConstantOutOfRange),
    #[error("fn{slot} cannot be bound to {func:?}")]
    UnbindableFunction { slot: usize, func: Func },
}

impl From<LocateError> for LoadError {
    fn from(e: LocateError) -> Self {
        match e {
            LocateError::Io { path, source } => LoadError::Io { path, source },
            LocateError::NotFound { name, path } => LoadError::NotFound { name, path },
        }
    }
}

// ── Machine ────────────────────────────────────────────────────────────────

/// A compiled formula bound to one backend.
#[derive(Debug, Clone)]
pub enum Machine {
    Float(Vm<f64>),
    #[cfg(feature = "fixed")]
    Fixed(Vm<Fixed>),
    #[cfg(feature = "mp")]
    Mp(Vm<Mp>),
}

macro_rules! each_vm {
    ($self:expr, $vm:ident => $body:expr) => {
        match $self {
            Machine::Float($vm) => $body,
            #[cfg(feature = "fixed")]
            Machine::Fixed($vm) => $body,
            #[cfg(feature = "mp")]
            Machine::Mp($vm) => $body,
        }
    };
}

impl Machine {
    fn build(program: &Program, opts: &LoadOptions) -> Result<Machine, LoadError> {
        match opts.math {
            MathMode::Float => Ok(Machine::Float(bind(program, opts, ())?)),
            MathMode::Fixed => Machine::build_fixed(program, opts),
            MathMode::Mp => Machine::build_mp(program, opts),
        }
    }

    #[cfg(feature = "fixed")]
    fn build_fixed(program: &Program, opts: &LoadOptions) -> Result<Machine, LoadError> {
        let scale = FixedScale::new(opts.bitshift).ok_or(LoadError::Bitshift(opts.bitshift))?;
        Ok(Machine::Fixed(bind(program, opts, scale)?))
    }

    #[cfg(not(feature = "fixed"))]
    fn build_fixed(_: &Program, _: &LoadOptions) -> Result<Machine, LoadError> {
        Err(LoadError::Unimplemented(MathMode::Fixed))
    }

    #[cfg(feature = "mp")]
    fn build_mp(program: &Program, opts: &LoadOptions) -> Result<Machine, LoadError> {
        Ok(Machine::Mp(bind(program, opts, ())?))
    }

    #[cfg(not(feature = "mp"))]
    fn build_mp(_: &Program, _: &LoadOptions) -> Result<Machine, LoadError> {
        Err(LoadError::Unimplemented(MathMode::Mp))
    }

    pub fn mode(&self) -> MathMode {
        match self {
            Machine::Float(_) => MathMode::Float,
            #[cfg(feature = "fixed")]
            Machine::Fixed(_) => MathMode::Fixed,
            #[cfg(feature = "mp")]
            Machine::Mp(_) => MathMode::Mp,
        }
    }

    pub fn per_pixel(&mut self, pixel: &Pixel) -> Outcome {
        each_vm!(self, vm => vm.per_pixel(pixel))
    }

    pub fn iterate(&mut self) -> Outcome {
        each_vm!(self, vm => vm.iterate())
    }

    pub fn orbit(&mut self, pixel: &Pixel, max: u32) -> (Outcome, u32) {
        each_vm!(self, vm => vm.orbit(pixel, max))
    }

    pub fn z(&self) -> Value {
        each_vm!(self, vm => vm.z())
    }

    pub fn top(&self) -> Value {
        each_vm!(self, vm => vm.top())
    }

    pub fn var_named(&self, name: &str) -> Option<Value> {
        each_vm!(self, vm => vm.var_named(name))
    }

    pub fn overflowed(&self) -> bool {
        each_vm!(self, vm => vm.overflowed())
    }
}

fn bind<N: Numeric>(program: &Program, opts: &LoadOptions, ctx: N::Ctx) -> Result<Vm<N>, LoadError> {
    let exe = Executable::<N>::new(program, opts.functions, ctx, opts.inversion)?;
    let mut rand = RandState::default();
    if program.info.uses_rand {
        rand.randomize(opts.seed);
    }
    Ok(Vm::new(exe, rand))
}

// ── Formula ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Formula {
    header: Header,
    program: Program,
    machine: Machine,
}

/// Serializable listing of a compiled formula.
#[derive(Debug, Serialize)]
struct Dump<'a> {
    name: &'a str,
    symmetry: Symmetry,
    math: MathMode,
    functions: [Func; 4],
    calls: Vec<Func>,
    info: &'a FormulaInfo,
    program: &'a Program,
}

impl Formula {
    /// Find `name` in the library at `path` and load it.
    pub fn load(
        path: &Path,
        name: &str,
        opts: &LoadOptions,
        sink: &mut dyn MessageSink,
    ) -> Result<Formula, LoadError> {
        let (text, loc) = entry::locate_entry(path, name)?;
        Formula::from_entry(&text, loc.start, opts, sink)
    }

    /// Find `name` in library text and load it.
    pub fn from_text(
        text: &str,
        name: &str,
        opts: &LoadOptions,
        sink: &mut dyn MessageSink,
    ) -> Result<Formula, LoadError> {
        let loc = entry::find_entry(text, name).ok_or_else(|| LoadError::NotFound {
            name: name.to_string(),
            path: "<text>".to_string(),
        })?;
        Formula::from_entry(text, loc.start, opts, sink)
    }

    /// Load the entry whose header starts at `start`.
    pub fn from_entry(
        text: &str,
        start: usize,
        opts: &LoadOptions,
        sink: &mut dyn MessageSink,
    ) -> Result<Formula, LoadError> {
        check_bindings(&opts.functions)?;
        let header = entry::parse_header(text, start)?;
        if let Some(sym) = &header.unknown_symmetry {
            if opts.report_bad_symmetry {
                let msg = ParseErrorKind::InvalidSymUsingNosym.message();
                sink.report(Severity::Warning, &format!("{msg}\n{sym}"));
            }
        }

        let stats = match prescan::prescan(text, header.body_start) {
            Ok(stats) => stats,
            Err(errors) => {
                sink.report(Severity::Error, &classic::report(text, start, &errors));
                return Err(LoadError::Prescan {
                    errors,
                    text: text.to_string(),
                    entry_start: start,
                });
            }
        };
        if stats.chars > MAX_FORMULA_CHARS {
            sink.report(Severity::Error, ParseErrorKind::FormulaTooLarge.message());
            return Err(LoadError::TooLarge { chars: stats.chars });
        }

        let tokens = lex_body(text, header.body_start);
        let mut program = compiler::compile(&tokens, &stats, &opts.env);
        if program.code.is_empty() {
            return Err(LoadError::NoInstructions);
        }
        if let Err(e) = jumps::resolve(&mut program) {
            sink.report(
                Severity::Error,
                ParseErrorKind::ErrorInParsingJumpStatements.message(),
            );
            return Err(e.into());
        }

        let machine = Machine::build(&program, opts)?;
        info!(
            target: "frm::compile",
            name = %header.name,
            math = %opts.math,
            ops = program.code.len(),
            "formula loaded"
        );
        Ok(Formula {
            header,
            program,
            machine,
        })
    }

    pub fn name(&self) -> &str {
        &self.header.name
    }

    pub fn symmetry(&self) -> Symmetry {
        self.header.symmetry
    }

    pub fn info(&self) -> &FormulaInfo {
        &self.program.info
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn per_pixel(&mut self, pixel: &Pixel) -> Outcome {
        self.machine.per_pixel(pixel)
    }

    pub fn iterate(&mut self) -> Outcome {
        self.machine.iterate()
    }

    pub fn orbit(&mut self, pixel: &Pixel, max: u32) -> (Outcome, u32) {
        self.machine.orbit(pixel, max)
    }

    pub fn z(&self) -> Value {
        self.machine.z()
    }

    pub fn disassemble(&self) -> String {
        self.program.disassemble()
    }

    /// The compiled program and its bindings as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let functions = each_vm!(&self.machine, vm => vm.executable().bindings());
        serde_json::to_string_pretty(&Dump {
            name: &self.header.name,
            symmetry: self.header.symmetry,
            math: self.machine.mode(),
            functions,
            calls: compiler::functions_used(&self.program),
            info: &self.program.info,
            program: &self.program,
        })
    }
}

fn check_bindings(functions: &[Func; 4]) -> Result<(), LoadError> {
    for (i, f) in functions.iter().enumerate() {
        if Func::PARAMS.contains(f) {
            return Err(LoadError::UnbindableFunction {
                slot: i + 1,
                func: *f,
            });
        }
    }
    Ok(())
}

// ── Active formula ─────────────────────────────────────────────────────────

/// The formula the renderer is currently using. A failed load leaves the
/// bad-formula sentinel in place, which bails out of every pixel at once.
#[derive(Debug, Clone, Default)]
pub enum ActiveFormula {
    #[default]
    Bad,
    Ready(Box<Formula>),
}

impl ActiveFormula {
    /// Install the result of a load. On failure the sentinel replaces
    /// whatever was active and the error is handed back.
    pub fn install(&mut self, result: Result<Formula, LoadError>) -> Result<(), LoadError> {
        match result {
            Ok(f) => {
                debug!(target: "frm::compile", name = f.name(), "formula installed");
                *self = ActiveFormula::Ready(Box::new(f));
                Ok(())
            }
            Err(e) => {
                warn!(target: "frm::compile", error = %e, "load failed, using bad-formula fallback");
                *self = ActiveFormula::Bad;
                Err(e)
            }
        }
    }

    pub fn is_bad(&self) -> bool {
        matches!(self, ActiveFormula::Bad)
    }

    pub fn formula(&self) -> Option<&Formula> {
        match self {
            ActiveFormula::Ready(f) => Some(f),
            ActiveFormula::Bad => None,
        }
    }

    pub fn per_pixel(&mut self, pixel: &Pixel) -> Outcome {
        match self {
            ActiveFormula::Ready(f) => f.per_pixel(pixel),
            ActiveFormula::Bad => Outcome::BailedOut,
        }
    }

    pub fn iterate(&mut self) -> Outcome {
        match self {
            ActiveFormula::Ready(f) => f.iterate(),
            ActiveFormula::Bad => Outcome::BailedOut,
        }
    }
}
