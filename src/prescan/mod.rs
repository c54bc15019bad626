//! Syntax check ahead of compilation.
//!
//! One pass over the token stream that validates statement structure and
//! counts what the compiler will emit. At most one error is recorded per
//! statement and scanning stops after [`MAX_ERRORS`].

use serde::Serialize;
use tracing::debug;

use crate::lexer::{Jump, Op, Paren, Scanner, TokenError, TokenKind};
use crate::source::Span;

pub const MAX_ERRORS: usize = 3;
/// Deepest parenthesis nesting; one bit of modulus state per level.
pub const MAX_PARENS: u32 = 64;
pub const MAX_JUMPS: usize = 200;

// ── Error kinds ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, thiserror::Error)]
#[error("{}", self.message())]
pub enum ParseErrorKind {
    ShouldBeArgument,
    ShouldBeOperator,
    NeedMatchingOpenParens,
    NeedMoreCloseParens,
    UndefinedOperator,
    UndefinedFunction,
    TableOverflow,
    NoMatchRightParen,
    NoLeftBracketFirstLine,
    UnexpectedEof,
    InvalidSymUsingNosym,
    FormulaTooLarge,
    InsufficientMemory,
    CouldNotOpenFile,
    JumpNotFirst,
    NoCharAfterThisJump,
    JumpNeedsBoolean,
    EndifRequiredAfterElse,
    EndifWithNoIf,
    MisplacedElseOrElseif,
    UnmatchedIfInInitSection,
    IfWithNoEndif,
    ErrorInParsingJumpStatements,
    TooManyJumps,
    FormulaNameTooLarge,
    IllegalAssignment,
    IllegalVarName,
    InvalidConst,
    IllegalChar,
    NestingTooDeep,
    UnmatchedModulus,
    FuncUsedAsVar,
    NoNegAfterExponent,
    TokenTooLong,
    SecondColon,
    InvalidParseErrsCode,
}

const MESSAGES: [&str; 36] = [
    "Should be an Argument",
    "Should be an Operator",
    "')' needs a matching '('",
    "Need more ')'",
    "Undefined Operator",
    "Undefined Function",
    "Table overflow",
    "Didn't find matching ')' in symmetry declaration",
    "No '{' found on first line",
    "Unexpected EOF!",
    "Symmetry below is invalid, will use NOSYM",
    "Formula is too large",
    "Insufficient memory to run fractal type 'formula'",
    "Could not open file where formula located",
    "No characters may precede jump instruction",
    "No characters may follow this jump instruction",
    "Jump instruction missing required (boolean argument)",
    "Next jump after \"else\" must be \"endif\"",
    "\"endif\" has no matching \"if\"",
    "Misplaced \"else\" or \"elseif()\"",
    "\"if ()\" in initialization has no matching \"endif\"",
    "\"if ()\" has no matching \"endif\"",
    "Error in parsing jump statements",
    "Formula has too many jump commands",
    "Formula name has too many characters",
    "Only variables are allowed to the left of assignment",
    "Illegal variable name",
    "Invalid constant expression",
    "This character not supported by parser",
    "Nesting of parentheses exceeds maximum depth",
    "Unmatched modulus operator \"|\" in this expression",
    "Can't use function name as variable",
    "Negative exponent must be enclosed in parens",
    "Variable or constant exceeds 32 character limit",
    "Only one \":\" permitted in a formula",
    "Invalid ParseErrs code",
];

impl ParseErrorKind {
    pub const ALL: [ParseErrorKind; 36] = [
        ParseErrorKind::ShouldBeArgument,
        ParseErrorKind::ShouldBeOperator,
        ParseErrorKind::NeedMatchingOpenParens,
        ParseErrorKind::NeedMoreCloseParens,
        ParseErrorKind::UndefinedOperator,
        ParseErrorKind::UndefinedFunction,
        ParseErrorKind::TableOverflow,
        ParseErrorKind::NoMatchRightParen,
        ParseErrorKind::NoLeftBracketFirstLine,
        ParseErrorKind::UnexpectedEof,
        ParseErrorKind::InvalidSymUsingNosym,
        ParseErrorKind::FormulaTooLarge,
        ParseErrorKind::InsufficientMemory,
        ParseErrorKind::CouldNotOpenFile,
        ParseErrorKind::JumpNotFirst,
        ParseErrorKind::NoCharAfterThisJump,
        ParseErrorKind::JumpNeedsBoolean,
        ParseErrorKind::EndifRequiredAfterElse,
        ParseErrorKind::EndifWithNoIf,
        ParseErrorKind::MisplacedElseOrElseif,
        ParseErrorKind::UnmatchedIfInInitSection,
        ParseErrorKind::IfWithNoEndif,
        ParseErrorKind::ErrorInParsingJumpStatements,
        ParseErrorKind::TooManyJumps,
        ParseErrorKind::FormulaNameTooLarge,
        ParseErrorKind::IllegalAssignment,
        ParseErrorKind::IllegalVarName,
        ParseErrorKind::InvalidConst,
        ParseErrorKind::IllegalChar,
        ParseErrorKind::NestingTooDeep,
        ParseErrorKind::UnmatchedModulus,
        ParseErrorKind::FuncUsedAsVar,
        ParseErrorKind::NoNegAfterExponent,
        ParseErrorKind::TokenTooLong,
        ParseErrorKind::SecondColon,
        ParseErrorKind::InvalidParseErrsCode,
    ];

    /// Stable numeric code, 0..=35.
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> ParseErrorKind {
        ParseErrorKind::ALL
            .get(code as usize)
            .copied()
            .unwrap_or(ParseErrorKind::InvalidParseErrsCode)
    }

    pub fn message(self) -> &'static str {
        MESSAGES[self as usize]
    }
}

impl From<TokenError> for ParseErrorKind {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::EndOfFile => ParseErrorKind::UnexpectedEof,
            TokenError::IllegalCharacter => ParseErrorKind::IllegalChar,
            TokenError::IllegalVariableName => ParseErrorKind::IllegalVarName,
            TokenError::TokenTooLong => ParseErrorKind::TokenTooLong,
            TokenError::FuncUsedAsVar => ParseErrorKind::FuncUsedAsVar,
            TokenError::JumpMissingBoolean => ParseErrorKind::JumpNeedsBoolean,
            TokenError::JumpWithIllegalChar => ParseErrorKind::NoCharAfterThisJump,
            TokenError::UndefinedFunction => ParseErrorKind::UndefinedFunction,
            TokenError::IllegalOperator => ParseErrorKind::UndefinedOperator,
            TokenError::IllFormedConstant => ParseErrorKind::InvalidConst,
        }
    }
}

/// One recorded syntax error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{kind} (at offset {})", .span.start)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// Offset where the offending statement starts.
    pub statement_start: usize,
    /// The token the error was detected at.
    pub span: Span,
}

// ── Scan ───────────────────────────────────────────────────────────────────

/// Upper bounds for the compiler's tables, gathered while checking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub ops: usize,
    pub loads: usize,
    pub stores: usize,
    pub jumps: usize,
    /// Characters across all tokens, including the closing `}`.
    pub chars: usize,
    pub uses_jump: bool,
}

struct State {
    errors: Vec<ParseError>,
    statement_pos: usize,
}

impl State {
    fn record(&mut self, kind: ParseErrorKind, span: Span) {
        let same_statement = self
            .errors
            .last()
            .is_some_and(|e| e.statement_start == self.statement_pos);
        if !same_statement {
            debug!(target: "frm::prescan", ?kind, at = span.start, "syntax error");
            self.errors.push(ParseError {
                kind,
                statement_start: self.statement_pos,
                span,
            });
        }
    }
}

/// Check the formula body starting at `body_start` (just past `{`).
pub fn prescan(src: &str, body_start: usize) -> Result<Stats, Vec<ParseError>> {
    let mut scanner = Scanner::at(src, body_start);
    let mut stats = Stats::default();
    let mut st = State {
        errors: Vec::new(),
        statement_pos: body_start,
    };
    let mut expecting_arg = true;
    let mut new_statement = true;
    let mut assignment_ok = true;
    let mut got_colon = false;
    let mut else_used: u64 = 0;
    let mut waiting_for_mod: u64 = 0;
    let mut waiting_for_endif: i32 = 0;
    let mut paren: u32 = 0;

    loop {
        let tok = scanner.next_token();
        stats.chars += tok.text.len();
        let span = tok.span;
        match tok.kind {
            TokenKind::NotAToken(TokenError::EndOfFile) => {
                return Err(vec![ParseError {
                    kind: ParseErrorKind::UnexpectedEof,
                    statement_start: st.statement_pos,
                    span,
                }]);
            }
            TokenKind::NotAToken(e) => {
                assignment_ok = false;
                st.record(e.into(), span);
            }
            TokenKind::Parens(p) => {
                assignment_ok = false;
                new_statement = false;
                match p {
                    Paren::Open => {
                        paren += 1;
                        if paren > MAX_PARENS {
                            st.record(ParseErrorKind::NestingTooDeep, span);
                        } else if !expecting_arg {
                            st.record(ParseErrorKind::ShouldBeOperator, span);
                        }
                        waiting_for_mod <<= 1;
                    }
                    Paren::Close => {
                        if paren > 0 {
                            paren -= 1;
                        } else {
                            st.record(ParseErrorKind::NeedMatchingOpenParens, span);
                        }
                        if waiting_for_mod & 1 != 0 {
                            st.record(ParseErrorKind::UnmatchedModulus, span);
                        } else {
                            waiting_for_mod >>= 1;
                        }
                        if expecting_arg {
                            st.record(ParseErrorKind::ShouldBeArgument, span);
                        }
                    }
                }
            }
            TokenKind::ParamVariable(_)
            | TokenKind::UserNamedVariable
            | TokenKind::PredefinedVariable(_)
            | TokenKind::RealConstant
            | TokenKind::ComplexConstant => {
                if tok.is_constant() {
                    assignment_ok = false;
                }
                stats.ops += 1;
                stats.loads += 1;
                new_statement = false;
                if !expecting_arg {
                    st.record(ParseErrorKind::ShouldBeOperator, span);
                }
                expecting_arg = false;
            }
            TokenKind::Function(_) | TokenKind::ParamFunction(_) => {
                assignment_ok = false;
                new_statement = false;
                stats.ops += 1;
                if !expecting_arg {
                    st.record(ParseErrorKind::ShouldBeOperator, span);
                }
            }
            TokenKind::FlowControl(jump) => {
                assignment_ok = false;
                stats.ops += 1;
                stats.jumps += 1;
                if !new_statement {
                    st.record(ParseErrorKind::JumpNotFirst, span);
                } else {
                    stats.uses_jump = true;
                    match jump {
                        Jump::If => {
                            else_used <<= 1;
                            waiting_for_endif += 1;
                        }
                        Jump::ElseIf | Jump::Else => {
                            if jump == Jump::ElseIf {
                                stats.ops += 3;
                                stats.jumps += 1;
                            }
                            if else_used & 1 != 0 {
                                st.record(ParseErrorKind::EndifRequiredAfterElse, span);
                            } else if waiting_for_endif == 0 {
                                st.record(ParseErrorKind::MisplacedElseOrElseif, span);
                            }
                            if jump == Jump::Else {
                                else_used |= 1;
                            }
                        }
                        Jump::EndIf => {
                            else_used >>= 1;
                            waiting_for_endif -= 1;
                            if waiting_for_endif < 0 {
                                st.record(ParseErrorKind::EndifWithNoIf, span);
                                waiting_for_endif = 0;
                            }
                        }
                    }
                }
            }
            TokenKind::Operator(op) => {
                stats.ops += 1;
                match op {
                    Op::Comma | Op::Colon => {
                        stats.ops += 1;
                        if paren > 0 {
                            st.record(ParseErrorKind::NeedMoreCloseParens, span);
                            paren = 0;
                        }
                        if waiting_for_mod != 0 {
                            st.record(ParseErrorKind::UnmatchedModulus, span);
                            waiting_for_mod = 0;
                        }
                        if !expecting_arg {
                            stats.ops += if op == Op::Colon { 2 } else { 1 };
                        } else if !new_statement {
                            st.record(ParseErrorKind::ShouldBeArgument, span);
                        }
                        if op == Op::Colon {
                            if waiting_for_endif != 0 {
                                st.record(ParseErrorKind::UnmatchedIfInInitSection, span);
                                waiting_for_endif = 0;
                            }
                            if got_colon {
                                st.record(ParseErrorKind::SecondColon, span);
                            }
                            got_colon = true;
                        }
                        new_statement = true;
                        expecting_arg = true;
                        assignment_ok = true;
                        st.statement_pos = scanner.tell();
                    }
                    Op::Assign => {
                        stats.ops -= 1;
                        stats.loads = stats.loads.saturating_sub(1);
                        stats.stores += 1;
                        if !assignment_ok {
                            st.record(ParseErrorKind::IllegalAssignment, span);
                        }
                        expecting_arg = true;
                    }
                    Op::Modulus => {
                        assignment_ok = false;
                        let closing = waiting_for_mod & 1 != 0;
                        if !closing {
                            stats.ops -= 1;
                        }
                        if !closing && !expecting_arg {
                            st.record(ParseErrorKind::ShouldBeOperator, span);
                        } else if closing && expecting_arg {
                            st.record(ParseErrorKind::ShouldBeArgument, span);
                        }
                        waiting_for_mod ^= 1;
                    }
                    Op::Minus => {
                        assignment_ok = false;
                        expecting_arg = true;
                    }
                    Op::Caret => {
                        assignment_ok = false;
                        if expecting_arg {
                            st.record(ParseErrorKind::ShouldBeArgument, span);
                        }
                        let back = scanner.tell();
                        let next = scanner.next_token();
                        if next.text.starts_with('-') {
                            st.record(ParseErrorKind::NoNegAfterExponent, next.span);
                        } else {
                            scanner.seek(back);
                        }
                        expecting_arg = true;
                    }
                    _ => {
                        assignment_ok = false;
                        if expecting_arg {
                            st.record(ParseErrorKind::ShouldBeArgument, span);
                        }
                        expecting_arg = true;
                    }
                }
            }
            TokenKind::EndOfFormula => {
                stats.ops += 3;
                if paren > 0 {
                    st.record(ParseErrorKind::NeedMoreCloseParens, span);
                }
                if waiting_for_mod != 0 {
                    st.record(ParseErrorKind::UnmatchedModulus, span);
                }
                if waiting_for_endif != 0 {
                    st.record(ParseErrorKind::IfWithNoEndif, span);
                }
                if expecting_arg && !new_statement {
                    st.record(ParseErrorKind::ShouldBeArgument, span);
                    st.statement_pos = scanner.tell();
                }
                if stats.jumps >= MAX_JUMPS {
                    st.record(ParseErrorKind::TooManyJumps, span);
                }
                break;
            }
        }
        if st.errors.len() >= MAX_ERRORS {
            break;
        }
    }

    if st.errors.is_empty() {
        debug!(target: "frm::prescan", ?stats, "prescan ok");
        Ok(stats)
    } else {
        Err(st.errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(body: &str) -> Vec<ParseErrorKind> {
        match prescan(body, 0) {
            Ok(_) => Vec::new(),
            Err(errs) => errs.into_iter().map(|e| e.kind).collect(),
        }
    }

    fn ok(body: &str) -> Stats {
        match prescan(body, 0) {
            Ok(stats) => stats,
            Err(errs) => panic!("unexpected errors for {body:?}: {errs:?}"),
        }
    }

    #[test]
    fn message_table_lines_up() {
        assert_eq!(ParseErrorKind::ShouldBeArgument.message(), "Should be an Argument");
        assert_eq!(ParseErrorKind::SecondColon.code(), 34);
        assert_eq!(
            ParseErrorKind::SecondColon.message(),
            "Only one \":\" permitted in a formula"
        );
        for (i, k) in ParseErrorKind::ALL.iter().enumerate() {
            assert_eq!(k.code() as usize, i);
            assert_eq!(ParseErrorKind::from_code(i as u8), *k);
        }
        assert_eq!(ParseErrorKind::from_code(200), ParseErrorKind::InvalidParseErrsCode);
    }

    #[test]
    fn accepts_classic_mandelbrot() {
        let s = ok("z = pixel:\n z = sqr(z) + pixel, |z| <= 4\n}");
        assert_eq!(s.stores, 2);
        assert!(s.loads >= 5);
        assert!(!s.uses_jump);
    }

    #[test]
    fn counts_jumps() {
        let s = ok("if(1)\nz=1\nelseif(2)\nz=2\nelse\nz=3\nendif\n}");
        assert_eq!(s.jumps, 5);
        assert!(s.uses_jump);
    }

    #[test]
    fn missing_operand() {
        assert_eq!(kinds("z = 1 +\n}"), vec![ParseErrorKind::ShouldBeArgument]);
        assert_eq!(kinds("z = * 2\n}"), vec![ParseErrorKind::ShouldBeArgument]);
    }

    #[test]
    fn missing_operator() {
        assert_eq!(kinds("z = 1 (2)\n}"), vec![ParseErrorKind::ShouldBeOperator]);
    }

    #[test]
    fn parens_must_balance() {
        assert_eq!(kinds("z = (1 + 2\n}"), vec![ParseErrorKind::NeedMoreCloseParens]);
        assert_eq!(kinds("z = 1 + 2)\n}"), vec![ParseErrorKind::NeedMatchingOpenParens]);
    }

    #[test]
    fn modulus_must_balance() {
        assert_eq!(kinds("z = |z\n}"), vec![ParseErrorKind::UnmatchedModulus]);
        assert_eq!(kinds("z = (|z)|\n}"), vec![ParseErrorKind::UnmatchedModulus]);
        ok("z = |z| + |pixel|\n}");
    }

    #[test]
    fn assignment_targets() {
        assert_eq!(kinds("1 = z\n}"), vec![ParseErrorKind::IllegalAssignment]);
        assert_eq!(kinds("z + 1 = z\n}"), vec![ParseErrorKind::IllegalAssignment]);
        ok("a = b = 1\n}");
    }

    #[test]
    fn second_colon() {
        assert_eq!(kinds("a = 1 : b = 2 : c = 3\n}"), vec![ParseErrorKind::SecondColon]);
    }

    #[test]
    fn negative_exponent() {
        assert_eq!(kinds("z = z ^ -2\n}"), vec![ParseErrorKind::NoNegAfterExponent]);
        ok("z = z ^ (-2)\n}");
    }

    #[test]
    fn jump_structure() {
        assert_eq!(kinds("z = 1 + if(z)\nendif\n}")[0], ParseErrorKind::JumpNotFirst);
        assert_eq!(kinds("endif\n}"), vec![ParseErrorKind::EndifWithNoIf]);
        assert_eq!(kinds("else\n}"), vec![ParseErrorKind::MisplacedElseOrElseif]);
        assert_eq!(kinds("if(1)\n}"), vec![ParseErrorKind::IfWithNoEndif]);
        assert_eq!(
            kinds("if(1)\nelse\nelse\nendif\n}"),
            vec![ParseErrorKind::EndifRequiredAfterElse]
        );
        assert_eq!(
            kinds("if(1)\nz=1:\nendif\n}"),
            vec![ParseErrorKind::UnmatchedIfInInitSection, ParseErrorKind::EndifWithNoIf]
        );
    }

    #[test]
    fn one_error_per_statement() {
        assert_eq!(kinds("z = $ + $ + $\n}"), vec![ParseErrorKind::IllegalChar]);
    }

    #[test]
    fn stops_after_three_errors() {
        let errs = kinds("a = $1\nb = $2\nc = $3\nd = $4\ne = $5\n}");
        assert_eq!(errs, vec![ParseErrorKind::IllegalChar; 3]);
    }

    #[test]
    fn errors_carry_statement_and_token() {
        let body = "z = 1\nw = $\n}";
        let errs = prescan(body, 0).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].statement_start, body.find('w').unwrap());
        assert_eq!(&body[errs[0].span.start..errs[0].span.end], "$");
    }

    #[test]
    fn unexpected_eof() {
        assert_eq!(kinds("z = 1 + 2"), vec![ParseErrorKind::UnexpectedEof]);
    }

    #[test]
    fn too_many_jumps() {
        let mut body = String::new();
        for _ in 0..100 {
            body.push_str("if(1)\nendif\n");
        }
        body.push('}');
        assert_eq!(kinds(&body), vec![ParseErrorKind::TooManyJumps]);
    }

    #[test]
    fn token_errors_map_to_messages() {
        assert_eq!(kinds("z = sin\n}"), vec![ParseErrorKind::FuncUsedAsVar]);
        assert_eq!(kinds("z = foo(1)\n}"), vec![ParseErrorKind::UndefinedFunction]);
        assert_eq!(kinds("z = 1.2.3\n}"), vec![ParseErrorKind::InvalidConst]);
    }

    #[test]
    fn errors_display_their_message() {
        let kind = ParseErrorKind::ShouldBeOperator;
        assert_eq!(kind.to_string(), "Should be an Operator");
        let err: &dyn std::error::Error = &kind;
        assert_eq!(err.to_string(), kind.message());

        let body = "z = 1 (2)\n}";
        let errs = prescan(body, 0).unwrap_err();
        assert_eq!(errs[0].to_string(), "Should be an Operator (at offset 6)");
    }
}
