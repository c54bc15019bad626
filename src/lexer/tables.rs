//! Name tables for the formula language: functions, operators, predefined
//! variables and flow-control words. Table order is significant: opcodes,
//! slot indices and `fn1..fn4` binding all index into these.

use serde::Serialize;

// ── Functions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Func {
    Sin,
    Sinh,
    Cos,
    Cosh,
    Sqr,
    Log,
    Exp,
    Abs,
    Conj,
    Real,
    Imag,
    Fn1,
    Fn2,
    Fn3,
    Fn4,
    Flip,
    Tan,
    Tanh,
    Cotan,
    Cotanh,
    Cosxx,
    Srand,
    Asin,
    Asinh,
    Acos,
    Acosh,
    Atan,
    Atanh,
    Sqrt,
    Cabs,
    Floor,
    Ceil,
    Trunc,
    Round,
}

impl Func {
    pub const COUNT: usize = 34;

    pub const ALL: [Func; Func::COUNT] = [
        Func::Sin,
        Func::Sinh,
        Func::Cos,
        Func::Cosh,
        Func::Sqr,
        Func::Log,
        Func::Exp,
        Func::Abs,
        Func::Conj,
        Func::Real,
        Func::Imag,
        Func::Fn1,
        Func::Fn2,
        Func::Fn3,
        Func::Fn4,
        Func::Flip,
        Func::Tan,
        Func::Tanh,
        Func::Cotan,
        Func::Cotanh,
        Func::Cosxx,
        Func::Srand,
        Func::Asin,
        Func::Asinh,
        Func::Acos,
        Func::Acosh,
        Func::Atan,
        Func::Atanh,
        Func::Sqrt,
        Func::Cabs,
        Func::Floor,
        Func::Ceil,
        Func::Trunc,
        Func::Round,
    ];

    pub const PARAMS: [Func; 4] = [Func::Fn1, Func::Fn2, Func::Fn3, Func::Fn4];

    pub fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Sinh => "sinh",
            Func::Cos => "cos",
            Func::Cosh => "cosh",
            Func::Sqr => "sqr",
            Func::Log => "log",
            Func::Exp => "exp",
            Func::Abs => "abs",
            Func::Conj => "conj",
            Func::Real => "real",
            Func::Imag => "imag",
            Func::Fn1 => "fn1",
            Func::Fn2 => "fn2",
            Func::Fn3 => "fn3",
            Func::Fn4 => "fn4",
            Func::Flip => "flip",
            Func::Tan => "tan",
            Func::Tanh => "tanh",
            Func::Cotan => "cotan",
            Func::Cotanh => "cotanh",
            Func::Cosxx => "cosxx",
            Func::Srand => "srand",
            Func::Asin => "asin",
            Func::Asinh => "asinh",
            Func::Acos => "acos",
            Func::Acosh => "acosh",
            Func::Atan => "atan",
            Func::Atanh => "atanh",
            Func::Sqrt => "sqrt",
            Func::Cabs => "cabs",
            Func::Floor => "floor",
            Func::Ceil => "ceil",
            Func::Trunc => "trunc",
            Func::Round => "round",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn lookup(name: &str) -> Option<Func> {
        Func::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// `fn1..fn4` → `Some(0..=3)`.
    pub fn param_slot(self) -> Option<usize> {
        Func::PARAMS.iter().position(|&f| f == self)
    }

    /// Functions a `fnN` parameter may be bound to.
    pub fn bindable(self) -> bool {
        self.param_slot().is_none()
    }
}

// ── Operators ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Op {
    Comma,
    Ne,
    Assign,
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
    Modulus,
    Or,
    And,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
}

impl Op {
    pub const ALL: [Op; 17] = [
        Op::Comma,
        Op::Ne,
        Op::Assign,
        Op::Eq,
        Op::Lt,
        Op::Le,
        Op::Gt,
        Op::Ge,
        Op::Modulus,
        Op::Or,
        Op::And,
        Op::Colon,
        Op::Plus,
        Op::Minus,
        Op::Star,
        Op::Slash,
        Op::Caret,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Op::Comma => ",",
            Op::Ne => "!=",
            Op::Assign => "=",
            Op::Eq => "==",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Modulus => "|",
            Op::Or => "||",
            Op::And => "&&",
            Op::Colon => ":",
            Op::Plus => "+",
            Op::Minus => "-",
            Op::Star => "*",
            Op::Slash => "/",
            Op::Caret => "^",
        }
    }

    pub fn lookup(text: &str) -> Option<Op> {
        Op::ALL.iter().copied().find(|o| o.symbol() == text)
    }

    /// Statement separators: `,` and `:`.
    pub fn ends_statement(self) -> bool {
        matches!(self, Op::Comma | Op::Colon)
    }
}

// ── Predefined variables ───────────────────────────────────────────────────

/// Predefined variables, in slot order. Slot `i` of every compiled program
/// holds `Var::ALL[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Var {
    Pixel,
    P1,
    P2,
    Z,
    LastSqr,
    Pi,
    E,
    Rand,
    P3,
    WhiteSq,
    ScrnPix,
    ScrnMax,
    MaxIt,
    IsMand,
    Center,
    MagXMag,
    RotSkew,
    P4,
    P5,
}

impl Var {
    pub const COUNT: usize = 19;

    pub const ALL: [Var; Var::COUNT] = [
        Var::Pixel,
        Var::P1,
        Var::P2,
        Var::Z,
        Var::LastSqr,
        Var::Pi,
        Var::E,
        Var::Rand,
        Var::P3,
        Var::WhiteSq,
        Var::ScrnPix,
        Var::ScrnMax,
        Var::MaxIt,
        Var::IsMand,
        Var::Center,
        Var::MagXMag,
        Var::RotSkew,
        Var::P4,
        Var::P5,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Var::Pixel => "pixel",
            Var::P1 => "p1",
            Var::P2 => "p2",
            Var::Z => "z",
            Var::LastSqr => "lastsqr",
            Var::Pi => "pi",
            Var::E => "e",
            Var::Rand => "rand",
            Var::P3 => "p3",
            Var::WhiteSq => "whitesq",
            Var::ScrnPix => "scrnpix",
            Var::ScrnMax => "scrnmax",
            Var::MaxIt => "maxit",
            Var::IsMand => "ismand",
            Var::Center => "center",
            Var::MagXMag => "magxmag",
            Var::RotSkew => "rotskew",
            Var::P4 => "p4",
            Var::P5 => "p5",
        }
    }

    pub fn slot(self) -> usize {
        self as usize
    }

    pub fn lookup(name: &str) -> Option<Var> {
        Var::ALL
            .iter()
            .copied()
            .find(|v| v.name().eq_ignore_ascii_case(name))
    }

    /// User-settable parameters the front end asks for.
    pub fn is_param(self) -> bool {
        matches!(
            self,
            Var::P1 | Var::P2 | Var::P3 | Var::P4 | Var::P5 | Var::IsMand
        )
    }
}

// ── Flow control ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Jump {
    If,
    ElseIf,
    Else,
    EndIf,
}

impl Jump {
    pub const ALL: [Jump; 4] = [Jump::If, Jump::ElseIf, Jump::Else, Jump::EndIf];

    pub fn name(self) -> &'static str {
        match self {
            Jump::If => "if",
            Jump::ElseIf => "elseif",
            Jump::Else => "else",
            Jump::EndIf => "endif",
        }
    }

    pub fn lookup(name: &str) -> Option<Jump> {
        Jump::ALL
            .iter()
            .copied()
            .find(|j| j.name().eq_ignore_ascii_case(name))
    }

    /// `if` and `elseif` must be followed by a parenthesized condition.
    pub fn takes_condition(self) -> bool {
        matches!(self, Jump::If | Jump::ElseIf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn func_table_order() {
        for (i, f) in Func::ALL.iter().enumerate() {
            assert_eq!(f.index(), i, "{} out of order", f.name());
        }
        assert_eq!(Func::ALL[0], Func::Sin);
        assert_eq!(Func::ALL[Func::COUNT - 1], Func::Round);
    }

    #[test]
    fn var_slots_match_table_order() {
        for (i, v) in Var::ALL.iter().enumerate() {
            assert_eq!(v.slot(), i);
        }
        assert_eq!(Var::Z.slot(), 3);
        assert_eq!(Var::LastSqr.slot(), 4);
        assert_eq!(Var::WhiteSq.slot(), 9);
        assert_eq!(Var::ScrnPix.slot(), 10);
    }

    #[test]
    fn lookups_are_case_insensitive() {
        assert_eq!(Func::lookup("COSXX"), Some(Func::Cosxx));
        assert_eq!(Var::lookup("LastSqr"), Some(Var::LastSqr));
        assert_eq!(Jump::lookup("ElseIf"), Some(Jump::ElseIf));
        assert_eq!(Func::lookup("nope"), None);
    }

    #[test]
    fn operator_symbols_round_trip() {
        for op in Op::ALL {
            assert_eq!(Op::lookup(op.symbol()), Some(op));
        }
        assert!(Op::Colon.ends_statement());
        assert!(!Op::Plus.ends_statement());
    }

    #[test]
    fn param_functions() {
        assert_eq!(Func::Fn3.param_slot(), Some(2));
        assert_eq!(Func::Sin.param_slot(), None);
        assert!(!Func::Fn1.bindable());
        assert!(Func::Cosxx.bindable());
    }

    #[test]
    fn param_variables() {
        let params: Vec<_> = Var::ALL.iter().filter(|v| v.is_param()).collect();
        assert_eq!(params.len(), 6);
    }
}
