//! Compiler and bytecode VM for fractal formula (`.frm`) entries.
//!
//! Pipeline: [`lexer`] → [`prescan`] → [`compiler`] → [`jumps`] → [`vm`],
//! with [`backend`] supplying the float, fixed-point and extended-precision
//! arithmetic the compiled program runs on. [`entry`] finds a named entry in
//! a `.frm` library and [`formula`] ties the stages together behind a single
//! load call. Errors become [`diagnostic::Diagnostic`]s for rendering.

pub mod backend;
pub mod compiler;
pub mod diagnostic;
pub mod entry;
pub mod env;
pub mod formula;
pub mod jumps;
pub mod lexer;
pub mod opcode;
pub mod prescan;
pub mod source;
pub mod vm;

pub use backend::{Complex, MathMode, Value};
pub use env::{Environment, Inversion, Pixel};
pub use formula::{ActiveFormula, Formula, LoadError, LoadOptions, Machine};
pub use vm::Outcome;
