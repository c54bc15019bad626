//! The traditional plain-text report for syntax errors: one block per error
//! with the line number, the message, the offending statement and a caret
//! underline.

use std::fmt::Write as _;

use crate::lexer::{Scanner, Token, TokenError, TokenKind};
use crate::prescan::{ParseError, ParseErrorKind};
use crate::source::SourceMap;

/// Widest statement excerpt shown.
pub const WIDTH: usize = 74;
/// Carets drawn under a token that was too long to read.
const LONG_TOKEN_CARETS: usize = 33;

fn ends_excerpt(tok: &Token) -> bool {
    tok.is_statement_end()
        || matches!(
            tok.kind,
            TokenKind::EndOfFormula | TokenKind::NotAToken(TokenError::EndOfFile)
        )
}

/// Format `errors` for the entry starting at `entry_start` in `text`.
/// Line numbers count from the entry's header line.
pub fn report(text: &str, entry_start: usize, errors: &[ParseError]) -> String {
    let map = SourceMap::new(text);
    let mut out = String::from("\n");
    for err in errors {
        let line = map.lines_between(entry_start, err.span.start);
        let _ = writeln!(out, "Error({}) at line {}:  {}", err.kind.code(), line, err.kind);
        block(&mut out, text, err);
    }
    out
}

fn block(out: &mut String, text: &str, err: &ParseError) {
    let initialization_error = err.kind == ParseErrorKind::SecondColon;

    let mut scanner = Scanner::at(text, err.statement_start);
    let mut tokens: Vec<Token> = Vec::new();
    let mut error_index = None;
    loop {
        let tok = scanner.next_token();
        if tokens.is_empty() && tok.is_statement_end() && tok.span.start < err.span.start {
            continue;
        }
        if error_index.is_none() && tok.span.start >= err.span.start {
            error_index = Some(tokens.len());
        }
        let done = ends_excerpt(&tok);
        tokens.push(tok);
        if done {
            break;
        }
    }
    if tokens.len() > 1 && !initialization_error {
        tokens.pop();
    }
    let error_index = error_index.unwrap_or(tokens.len().saturating_sub(1));

    let width = |toks: &[Token]| toks.iter().map(|t| t.text.len()).sum::<usize>();
    let mut chars_to_error = width(&tokens[..error_index.min(tokens.len())]);
    let mut chars_in_error = tokens.get(error_index).map_or(1, |t| t.text.len());

    // The underline is indented two columns past the excerpt start, so the
    // error token must end before column WIDTH for a caret to fit.
    let mut first = 0;
    if chars_in_error < WIDTH {
        while chars_to_error + chars_in_error >= WIDTH && first < error_index {
            chars_to_error -= tokens[first].text.len();
            first += 1;
        }
    } else {
        first = error_index;
        chars_to_error = 0;
    }

    let mut statement = String::new();
    for tok in &tokens[first.min(tokens.len())..] {
        if statement.len() > WIDTH {
            break;
        }
        statement.push_str(&tok.text);
    }
    statement.truncate(WIDTH);
    let _ = writeln!(out, "  {statement}");

    if err.kind == ParseErrorKind::TokenTooLong {
        chars_in_error = LONG_TOKEN_CARETS;
    }
    let mut underline = " ".repeat(chars_to_error + 2);
    while chars_in_error > 0 && underline.len() <= WIDTH {
        underline.push('^');
        chars_in_error -= 1;
    }
    let _ = writeln!(out, "{underline}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prescan::prescan;

    fn errors(text: &str) -> Vec<ParseError> {
        let body = text.find('{').unwrap() + 1;
        prescan(text, body).unwrap_err()
    }

    #[test]
    fn single_error_block() {
        let text = "bad {\n  z = 1 (2)\n}";
        let errs = errors(text);
        let out = report(text, 0, &errs);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "");
        assert_eq!(lines[1], "Error(1) at line 2:  Should be an Operator");
        assert_eq!(lines[2], "  z=1(2)");
        assert_eq!(lines[3], "     ^");
    }

    #[test]
    fn caret_sits_under_the_error_token() {
        let text = "bad {\n  z = sin(z) + * 1\n}";
        let errs = errors(text);
        let out = report(text, 0, &errs);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], "Error(0) at line 2:  Should be an Argument");
        let stmt = lines[2];
        let caret = lines[3].find('^').unwrap();
        assert_eq!(&stmt[caret..caret + 1], "*");
        assert_eq!(&stmt[..caret], "  z=sin(z)+");
    }

    #[test]
    fn one_block_per_error() {
        let text = "bad {\n  z = )\n  c = 1 (2)\n}";
        let errs = errors(text);
        assert_eq!(errs.len(), 2);
        let out = report(text, 0, &errs);
        assert_eq!(out.matches("Error(").count(), 2);
        assert!(out.contains("at line 3:"));
    }

    #[test]
    fn long_token_gets_fixed_underline() {
        let long = "a".repeat(40);
        let text = format!("bad {{\n  z = {long}\n}}");
        let errs = errors(&text);
        assert_eq!(errs[0].kind, ParseErrorKind::TokenTooLong);
        let out = report(&text, 0, &errs);
        let underline = out.lines().nth(3).unwrap();
        assert_eq!(underline.matches('^').count(), LONG_TOKEN_CARETS);
    }

    #[test]
    fn excerpt_is_capped() {
        let terms = vec!["z"; 60].join("+");
        let text = format!("bad {{\n  c = {terms} + * 2\n}}");
        let errs = errors(&text);
        let out = report(&text, 0, &errs);
        let lines: Vec<&str> = out.lines().collect();
        assert!(lines[2].len() <= WIDTH + 2);
        let caret = lines[3].find('^').unwrap();
        assert_eq!(&lines[2][caret..caret + 1], "*");
    }

    #[test]
    fn caret_fits_at_every_excerpt_width() {
        for lead in ["z", "zz"] {
            for terms in 25..45 {
                let sum = vec!["z"; terms].join("+");
                let text = format!("bad {{\n  c = {lead}+{sum} + * 2\n}}");
                let out = report(&text, 0, &errors(&text));
                let lines: Vec<&str> = out.lines().collect();
                let caret = lines[3]
                    .find('^')
                    .unwrap_or_else(|| panic!("no caret for {lead} + {terms} terms:\n{out}"));
                assert_eq!(&lines[2][caret..caret + 1], "*", "{out}");
            }
        }
    }
}
