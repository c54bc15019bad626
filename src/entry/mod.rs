//! Formula libraries: finding `name(sym) { ... }` entries in `.frm` text
//! and checking an entry's header line.

use std::fmt;
use std::path::Path;

use logos::Logos;
use serde::Serialize;
use tracing::debug;

use crate::prescan::ParseErrorKind;

/// Longest formula name accepted in a header.
pub const MAX_NAME_LEN: usize = 18;

// ── Library scanner ────────────────────────────────────────────────────────

#[derive(Logos, Debug, PartialEq, Clone, Copy)]
#[logos(skip r"[ \t\r]+")]
enum LibToken {
    #[regex(r";[^\n]*", allow_greedy = true)]
    Comment,
    #[token("\n")]
    Newline,
    #[token("{")]
    Open,
    #[token("}")]
    Close,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[regex(r"[^ \t\r\n;{}()]+")]
    Word,
}

/// Where an entry sits in its library text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryLocation {
    pub name: String,
    /// Offset of the first character of the name.
    pub start: usize,
    /// Offset just past the opening `{`.
    pub body_start: usize,
}

/// Every entry in a library, in file order. Braces inside a body are not
/// tracked: a body ends at its first `}` outside a comment.
pub fn scan_entries(text: &str) -> Vec<EntryLocation> {
    let mut out = Vec::new();
    let mut lex = LibToken::lexer(text);
    let mut name: Option<(String, usize)> = None;
    let mut in_body = false;
    while let Some(tok) = lex.next() {
        let Ok(tok) = tok else { continue };
        match (in_body, tok) {
            (true, LibToken::Close) => in_body = false,
            (true, _) => {}
            (false, LibToken::Newline) => name = None,
            (false, LibToken::Word) => {
                if name.is_none() {
                    name = Some((lex.slice().to_string(), lex.span().start));
                }
            }
            (false, LibToken::Open) => {
                if let Some((n, start)) = name.take() {
                    out.push(EntryLocation {
                        name: n,
                        start,
                        body_start: lex.span().end,
                    });
                }
                in_body = true;
            }
            (false, _) => {}
        }
    }
    out
}

/// Find `name` (case-insensitive) in library text.
pub fn find_entry(text: &str, name: &str) -> Option<EntryLocation> {
    scan_entries(text)
        .into_iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
}

/// All entry names in a library.
pub fn list_entries(text: &str) -> Vec<String> {
    scan_entries(text).into_iter().map(|e| e.name).collect()
}

#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("no formula named '{name}' in {path}")]
    NotFound { name: String, path: String },
}

/// Read a library file and find an entry in it. Returns the whole text and
/// the entry's position.
pub fn locate_entry(path: &Path, name: &str) -> Result<(String, EntryLocation), LocateError> {
    let text = std::fs::read_to_string(path).map_err(|source| LocateError::Io {
        path: path.display().to_string(),
        source,
    })?;
    match find_entry(&text, name) {
        Some(loc) => {
            debug!(target: "frm::entry", name = %loc.name, offset = loc.start, "entry located");
            Ok((text, loc))
        }
        None => Err(LocateError::NotFound {
            name: name.to_string(),
            path: path.display().to_string(),
        }),
    }
}

// ── Header ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Symmetry {
    #[default]
    NoSym,
    XAxisNoParm,
    XAxis,
    YAxisNoParm,
    YAxis,
    XyAxisNoParm,
    XyAxis,
    OriginNoParm,
    Origin,
    PiSymNoParm,
    PiSym,
    XAxisNoImag,
    XAxisNoReal,
    NoPlot,
}

impl Symmetry {
    pub const ALL: [Symmetry; 14] = [
        Symmetry::NoSym,
        Symmetry::XAxisNoParm,
        Symmetry::XAxis,
        Symmetry::YAxisNoParm,
        Symmetry::YAxis,
        Symmetry::XyAxisNoParm,
        Symmetry::XyAxis,
        Symmetry::OriginNoParm,
        Symmetry::Origin,
        Symmetry::PiSymNoParm,
        Symmetry::PiSym,
        Symmetry::XAxisNoImag,
        Symmetry::XAxisNoReal,
        Symmetry::NoPlot,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Symmetry::NoSym => "NOSYM",
            Symmetry::XAxisNoParm => "XAXIS_NOPARM",
            Symmetry::XAxis => "XAXIS",
            Symmetry::YAxisNoParm => "YAXIS_NOPARM",
            Symmetry::YAxis => "YAXIS",
            Symmetry::XyAxisNoParm => "XYAXIS_NOPARM",
            Symmetry::XyAxis => "XYAXIS",
            Symmetry::OriginNoParm => "ORIGIN_NOPARM",
            Symmetry::Origin => "ORIGIN",
            Symmetry::PiSymNoParm => "PI_SYM_NOPARM",
            Symmetry::PiSym => "PI_SYM",
            Symmetry::XAxisNoImag => "XAXIS_NOIMAG",
            Symmetry::XAxisNoReal => "XAXIS_NOREAL",
            Symmetry::NoPlot => "NOPLOT",
        }
    }

    pub fn lookup(name: &str) -> Option<Symmetry> {
        Symmetry::ALL
            .iter()
            .copied()
            .find(|s| s.name().eq_ignore_ascii_case(name))
    }
}

impl Serialize for Symmetry {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

impl fmt::Display for Symmetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A checked header line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Header {
    pub name: String,
    pub symmetry: Symmetry,
    /// The symmetry text when it named no known symmetry.
    pub unknown_symmetry: Option<String>,
    /// Offset just past `{`.
    pub body_start: usize,
}

/// A header problem: the kind and, for a long name, the first 25
/// characters of the name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}")]
pub struct HeaderError {
    pub kind: ParseErrorKind,
    pub detail: Option<String>,
}

impl From<ParseErrorKind> for HeaderError {
    fn from(kind: ParseErrorKind) -> Self {
        HeaderError { kind, detail: None }
    }
}

/// Check the header starting at `start`: a name of at most
/// [`MAX_NAME_LEN`] characters, an optional `(SYMMETRY)`, and a `{` on the
/// same line.
pub fn parse_header(text: &str, start: usize) -> Result<Header, HeaderError> {
    let bytes = text.as_bytes();
    let mut pos = start;
    let mut next = || {
        let c = bytes.get(pos).copied();
        pos += 1;
        c
    };

    let mut len = 0;
    let mut end_of_name = false;
    let opener = loop {
        match next() {
            None => return Err(ParseErrorKind::UnexpectedEof.into()),
            Some(b'\r' | b'\n') => return Err(ParseErrorKind::NoLeftBracketFirstLine.into()),
            Some(b' ' | b'\t') => end_of_name = true,
            Some(c @ (b'(' | b'{')) => break c,
            Some(_) if !end_of_name => len += 1,
            Some(_) => {}
        }
    };
    let name: String = text[start..].chars().take(len).collect();
    if len > MAX_NAME_LEN {
        return Err(HeaderError {
            kind: ParseErrorKind::FormulaNameTooLarge,
            detail: Some(text[start..].chars().take(len.min(25)).collect()),
        });
    }

    let mut symmetry = Symmetry::NoSym;
    let mut unknown_symmetry = None;
    let mut c = opener;
    if c == b'(' {
        let mut sym = String::new();
        loop {
            match next() {
                None => return Err(ParseErrorKind::UnexpectedEof.into()),
                Some(b'\r' | b'\n') => return Err(ParseErrorKind::NoLeftBracketFirstLine.into()),
                Some(b'{') => return Err(ParseErrorKind::NoMatchRightParen.into()),
                Some(b' ' | b'\t') => {}
                Some(b')') => break,
                Some(ch) => {
                    if sym.len() < 19 {
                        sym.push(ch.to_ascii_uppercase() as char);
                    }
                }
            }
        }
        match Symmetry::lookup(&sym) {
            Some(s) => symmetry = s,
            None => unknown_symmetry = Some(sym),
        }
        c = b')';
    }
    while c != b'{' {
        match next() {
            None => return Err(ParseErrorKind::UnexpectedEof.into()),
            Some(b'\r' | b'\n') => return Err(ParseErrorKind::NoLeftBracketFirstLine.into()),
            Some(ch) => c = ch,
        }
    }
    debug!(target: "frm::entry", %name, %symmetry, "header ok");
    Ok(Header {
        name,
        symmetry,
        unknown_symmetry,
        body_start: pos,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const LIBRARY: &str = "\
; a comment mentioning Fake { }
Mandel (XAXIS) {
  z = 0:   ; init } in a comment
  z = sqr(z) + pixel, |z| <= 4
}

julia {z = pixel: z = z*z + p1, |z| < 4}
Third(origin){
  z = 1 }
";

    #[test]
    fn finds_entries_in_order() {
        assert_eq!(list_entries(LIBRARY), ["Mandel", "julia", "Third"]);
    }

    #[test]
    fn lookup_ignores_case() {
        let loc = find_entry(LIBRARY, "MANDEL").unwrap();
        assert_eq!(&LIBRARY[loc.start..loc.start + 6], "Mandel");
        assert!(LIBRARY[loc.body_start..].starts_with("\n  z = 0:"));
        assert!(find_entry(LIBRARY, "fake").is_none());
    }

    #[test]
    fn comments_run_to_end_of_line() {
        let text = "; Fake { }\nReal { z = 1 ; not } here\n  z = 2 }\nAfter { }\n";
        assert_eq!(list_entries(text), ["Real", "After"]);
        let after = find_entry(text, "after").unwrap();
        assert_eq!(&text[after.start..after.body_start], "After {");
    }

    #[test]
    fn header_with_symmetry() {
        let loc = find_entry(LIBRARY, "mandel").unwrap();
        let h = parse_header(LIBRARY, loc.start).unwrap();
        assert_eq!(h.name, "Mandel");
        assert_eq!(h.symmetry, Symmetry::XAxis);
        assert_eq!(h.body_start, loc.body_start);
        let third = find_entry(LIBRARY, "third").unwrap();
        assert_eq!(parse_header(LIBRARY, third.start).unwrap().symmetry, Symmetry::Origin);
    }

    #[test]
    fn header_without_symmetry() {
        let loc = find_entry(LIBRARY, "julia").unwrap();
        let h = parse_header(LIBRARY, loc.start).unwrap();
        assert_eq!(h.symmetry, Symmetry::NoSym);
        assert_eq!(h.unknown_symmetry, None);
    }

    #[test]
    fn unknown_symmetry_falls_back() {
        let h = parse_header("f(sideways) {z}", 0).unwrap();
        assert_eq!(h.symmetry, Symmetry::NoSym);
        assert_eq!(h.unknown_symmetry.as_deref(), Some("SIDEWAYS"));
    }

    #[test]
    fn header_errors() {
        let kind = |t: &str| parse_header(t, 0).unwrap_err().kind;
        assert_eq!(kind("averyveryverylongformulaname {"), ParseErrorKind::FormulaNameTooLarge);
        assert_eq!(kind("f(xaxis {"), ParseErrorKind::NoMatchRightParen);
        assert_eq!(kind("f(xaxis)\n{"), ParseErrorKind::NoLeftBracketFirstLine);
        assert_eq!(kind("f\n{"), ParseErrorKind::NoLeftBracketFirstLine);
        assert_eq!(kind("f(xaxis"), ParseErrorKind::UnexpectedEof);
    }

    #[test]
    fn long_name_detail_is_truncated() {
        let err = parse_header("abcdefghijklmnopqrstuvwxyz0123 {", 0).unwrap_err();
        assert_eq!(err.detail.as_deref(), Some("abcdefghijklmnopqrstuvwxy"));
    }

    #[test]
    fn locate_reads_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(LIBRARY.as_bytes()).unwrap();
        let (text, loc) = locate_entry(f.path(), "julia").unwrap();
        assert_eq!(text, LIBRARY);
        assert_eq!(loc.name, "julia");
        assert!(matches!(
            locate_entry(f.path(), "nope"),
            Err(LocateError::NotFound { .. })
        ));
    }
}
