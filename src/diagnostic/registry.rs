use crate::formula::LoadError;
use crate::prescan::ParseErrorKind;

/// An entry in the error code registry.
pub struct ErrorEntry {
    pub code: &'static str,
    /// Brief description for tooling.
    pub short: &'static str,
    /// Full explanation for `--explain`.
    pub long: &'static str,
}

/// All stable error codes. `FRM-P###` follow the numbered parser messages;
/// `FRM-L###` cover failures while loading a formula.
pub static REGISTRY: &[ErrorEntry] = &[
    // ── Parser ───────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "FRM-P000",
        short: r#"Should be an Argument"#,
        long: r#"## FRM-P000: Should be an Argument

An operator appeared where a value was expected: two operators in a row, an operator at the start of a statement, or a statement ending in an operator.

**Example:**

    z = z * + pixel

**Fix:**

    z = z * pixel
"#,
    },
    ErrorEntry {
        code: "FRM-P001",
        short: r#"Should be an Operator"#,
        long: r#"## FRM-P001: Should be an Operator

Two values appeared next to each other with nothing joining them. Whitespace is ignored, so `z 2` reads as the single name `z2`; the error shows up when a value is followed by `(` or a literal.

**Example:**

    z = 2 (z)

**Fix:**

    z = 2 * (z)
"#,
    },
    ErrorEntry {
        code: "FRM-P002",
        short: r#"')' needs a matching '('"#,
        long: r#"## FRM-P002: ')' needs a matching '('

A closing parenthesis has no opening parenthesis before it in the same statement.

**Example:**

    z = sqr(z))

**Fix:**

    z = sqr(z)
"#,
    },
    ErrorEntry {
        code: "FRM-P003",
        short: r#"Need more ')'"#,
        long: r#"## FRM-P003: Need more ')'

A statement ended while parentheses were still open.

**Example:**

    z = (z + 1

**Fix:**

    z = (z + 1)
"#,
    },
    ErrorEntry {
        code: "FRM-P004",
        short: r#"Undefined Operator"#,
        long: r#"## FRM-P004: Undefined Operator

`!` must be followed by `=`, and `&` must be doubled.

**Example:**

    z = z & c

**Fix:**

    z = z && c
"#,
    },
    ErrorEntry {
        code: "FRM-P005",
        short: r#"Undefined Function"#,
        long: r#"## FRM-P005: Undefined Function

A name followed by `(` is not a known function. The function table covers sin, cos, sqr, log, exp, abs, flip, conj, real, imag, the fn1..fn4 placeholders and the rest of the standard set.

**Example:**

    z = sine(z)

**Fix:**

    z = sin(z)
"#,
    },
    ErrorEntry {
        code: "FRM-P006",
        short: r#"Table overflow"#,
        long: r#"## FRM-P006: Table overflow

The formula needs more constants or variables than the compiler can hold.
"#,
    },
    ErrorEntry {
        code: "FRM-P007",
        short: r#"Didn't find matching ')' in symmetry declaration"#,
        long: r#"## FRM-P007: Didn't find matching ')' in symmetry declaration

The header opened a symmetry with `(` but reached `{` before the closing `)`.

**Example:**

    mandel(XAXIS {

**Fix:**

    mandel(XAXIS) {
"#,
    },
    ErrorEntry {
        code: "FRM-P008",
        short: r#"No '{' found on first line"#,
        long: r#"## FRM-P008: No '{' found on first line

The header line must contain the opening brace. The body may not start on the next line.

**Example:**

    mandel
    {

**Fix:**

    mandel {
"#,
    },
    ErrorEntry {
        code: "FRM-P009",
        short: r#"Unexpected EOF!"#,
        long: r#"## FRM-P009: Unexpected EOF!

The file ended inside the formula, usually because the closing `}` is missing.
"#,
    },
    ErrorEntry {
        code: "FRM-P010",
        short: r#"Symmetry below is invalid, will use NOSYM"#,
        long: r#"## FRM-P010: Symmetry below is invalid, will use NOSYM

The symmetry in the header is not one of NOSYM, XAXIS_NOPARM, XAXIS, YAXIS_NOPARM, YAXIS, XYAXIS_NOPARM, XYAXIS, ORIGIN_NOPARM, ORIGIN, PI_SYM_NOPARM, PI_SYM, XAXIS_NOIMAG, XAXIS_NOREAL or NOPLOT. The formula still loads with no symmetry.
"#,
    },
    ErrorEntry {
        code: "FRM-P011",
        short: r#"Formula is too large"#,
        long: r#"## FRM-P011: Formula is too large

The formula's text, after comments and whitespace are removed, is longer than 8190 characters.
"#,
    },
    ErrorEntry {
        code: "FRM-P012",
        short: r#"Insufficient memory to run fractal type 'formula'"#,
        long: r#"## FRM-P012: Insufficient memory to run fractal type 'formula'

The compiler could not allocate its tables.
"#,
    },
    ErrorEntry {
        code: "FRM-P013",
        short: r#"Could not open file where formula located"#,
        long: r#"## FRM-P013: Could not open file where formula located

The formula file could not be read.
"#,
    },
    ErrorEntry {
        code: "FRM-P014",
        short: r#"No characters may precede jump instruction"#,
        long: r#"## FRM-P014: No characters may precede jump instruction

`if`, `elseif`, `else` and `endif` must start their statement.

**Example:**

    z = 1, c = 2 if(z)

**Fix:**

    z = 1, c = 2
    if(z)
"#,
    },
    ErrorEntry {
        code: "FRM-P015",
        short: r#"No characters may follow this jump instruction"#,
        long: r#"## FRM-P015: No characters may follow this jump instruction

`else` and `endif` must end their statement; `if` and `elseif` take only their condition.

**Example:**

    else z = 1

**Fix:**

    else
    z = 1
"#,
    },
    ErrorEntry {
        code: "FRM-P016",
        short: r#"Jump instruction missing required (boolean argument)"#,
        long: r#"## FRM-P016: Jump instruction missing required (boolean argument)

`if` and `elseif` need a parenthesized condition.

**Example:**

    if
    z = 1
    endif

**Fix:**

    if(|z| < 4)
    z = 1
    endif
"#,
    },
    ErrorEntry {
        code: "FRM-P017",
        short: r#"Next jump after "else" must be "endif""#,
        long: r#"## FRM-P017: Next jump after "else" must be "endif"

After `else` the only jump allowed in the same block is its closing `endif`.
"#,
    },
    ErrorEntry {
        code: "FRM-P018",
        short: r#""endif" has no matching "if""#,
        long: r#"## FRM-P018: "endif" has no matching "if"

An `endif` appeared with no open `if` block.
"#,
    },
    ErrorEntry {
        code: "FRM-P019",
        short: r#"Misplaced "else" or "elseif()""#,
        long: r#"## FRM-P019: Misplaced "else" or "elseif()"

`else` or `elseif` appeared outside an `if` block.
"#,
    },
    ErrorEntry {
        code: "FRM-P020",
        short: r#""if ()" in initialization has no matching "endif""#,
        long: r#"## FRM-P020: "if ()" in initialization has no matching "endif"

Every `if` block opened before the `:` must close before it.
"#,
    },
    ErrorEntry {
        code: "FRM-P021",
        short: r#""if ()" has no matching "endif""#,
        long: r#"## FRM-P021: "if ()" has no matching "endif"

The formula ended with an `if` block still open.
"#,
    },
    ErrorEntry {
        code: "FRM-P022",
        short: r#"Error in parsing jump statements"#,
        long: r#"## FRM-P022: Error in parsing jump statements

The jump structure could not be resolved after compilation.
"#,
    },
    ErrorEntry {
        code: "FRM-P023",
        short: r#"Formula has too many jump commands"#,
        long: r#"## FRM-P023: Formula has too many jump commands

The formula has 200 or more jump instructions.
"#,
    },
    ErrorEntry {
        code: "FRM-P024",
        short: r#"Formula name has too many characters"#,
        long: r#"## FRM-P024: Formula name has too many characters

Formula names are limited to 18 characters.
"#,
    },
    ErrorEntry {
        code: "FRM-P025",
        short: r#"Only variables are allowed to the left of assignment"#,
        long: r#"## FRM-P025: Only variables are allowed to the left of assignment

The target of `=` must be a single variable.

**Example:**

    z + 1 = c

**Fix:**

    z = c - 1
"#,
    },
    ErrorEntry {
        code: "FRM-P026",
        short: r#"Illegal variable name"#,
        long: r#"## FRM-P026: Illegal variable name

A variable name may not contain `.`.

**Example:**

    z.x = 1

**Fix:**

    zx = 1
"#,
    },
    ErrorEntry {
        code: "FRM-P027",
        short: r#"Invalid constant expression"#,
        long: r#"## FRM-P027: Invalid constant expression

A number is malformed: two decimal points, a letter after the digits, or an exponent with no digits.

**Example:**

    z = 1.2.3

**Fix:**

    z = 1.23
"#,
    },
    ErrorEntry {
        code: "FRM-P028",
        short: r#"This character not supported by parser"#,
        long: r#"## FRM-P028: This character not supported by parser

The formula contains a character outside the formula language.

**Example:**

    z = $z

**Fix:**

    z = z
"#,
    },
    ErrorEntry {
        code: "FRM-P029",
        short: r#"Nesting of parentheses exceeds maximum depth"#,
        long: r#"## FRM-P029: Nesting of parentheses exceeds maximum depth

Parentheses nest more than 64 deep.
"#,
    },
    ErrorEntry {
        code: "FRM-P030",
        short: r#"Unmatched modulus operator "|" in this expression"#,
        long: r#"## FRM-P030: Unmatched modulus operator "|" in this expression

A `|...|` modulus was opened but not closed in the same parentheses and statement.

**Example:**

    z = |z

**Fix:**

    z = |z|
"#,
    },
    ErrorEntry {
        code: "FRM-P031",
        short: r#"Can't use function name as variable"#,
        long: r#"## FRM-P031: Can't use function name as variable

A function name such as `sin` was used without an argument list.

**Example:**

    z = sin

**Fix:**

    z = sin(z)
"#,
    },
    ErrorEntry {
        code: "FRM-P032",
        short: r#"Negative exponent must be enclosed in parens"#,
        long: r#"## FRM-P032: Negative exponent must be enclosed in parens

`^` may not be followed directly by a negative number.

**Example:**

    z = z ^ -2

**Fix:**

    z = z ^ (-2)
"#,
    },
    ErrorEntry {
        code: "FRM-P033",
        short: r#"Variable or constant exceeds 32 character limit"#,
        long: r#"## FRM-P033: Variable or constant exceeds 32 character limit

Names and numbers are limited to 32 characters.
"#,
    },
    ErrorEntry {
        code: "FRM-P034",
        short: r#"Only one ":" permitted in a formula"#,
        long: r#"## FRM-P034: Only one ":" permitted in a formula

The `:` separating the init section from the iterated section may appear once.

**Example:**

    z = 0: c = 1: z = z*z + c

**Fix:**

    z = 0, c = 1: z = z*z + c
"#,
    },
    ErrorEntry {
        code: "FRM-P035",
        short: r#"Invalid ParseErrs code"#,
        long: r#"## FRM-P035: Invalid ParseErrs code

An error code outside the known range was reported.
"#,
    },

    // ── Loading ──────────────────────────────────────────────────────────────
    ErrorEntry {
        code: "FRM-L001",
        short: "no formula with that name",
        long: r#"## FRM-L001: no formula with that name

The file was read but no entry has the requested name. Names are compared without regard to case. `--list` shows every entry in a file.
"#,
    },
    ErrorEntry {
        code: "FRM-L002",
        short: "could not read the formula file",
        long: r#"## FRM-L002: could not read the formula file

The formula file could not be opened or read.
"#,
    },
    ErrorEntry {
        code: "FRM-L003",
        short: "formula too large",
        long: r#"## FRM-L003: formula too large

The formula's token text exceeds 8190 characters.
"#,
    },
    ErrorEntry {
        code: "FRM-L004",
        short: "formula has no instructions",
        long: r#"## FRM-L004: formula has no instructions

The formula body compiled to no instructions, for example `empty { }`.
"#,
    },
    ErrorEntry {
        code: "FRM-L005",
        short: "jump structure could not be resolved",
        long: r#"## FRM-L005: jump structure could not be resolved

The compiled `if`/`elseif`/`else`/`endif` structure did not match the jump table. Prescan normally rejects such formulas first.
"#,
    },
    ErrorEntry {
        code: "FRM-L006",
        short: "math mode not available",
        long: r#"## FRM-L006: math mode not available

The requested math mode was not compiled into this build. Enable the `fixed` or `mp` cargo feature.
"#,
    },
    ErrorEntry {
        code: "FRM-L007",
        short: "bitshift out of range",
        long: r#"## FRM-L007: bitshift out of range

Fixed-point mode needs a bitshift between 8 and 29.
"#,
    },
    ErrorEntry {
        code: "FRM-L008",
        short: "constant does not fit the math mode",
        long: r#"## FRM-L008: constant does not fit the math mode

A constant the formula reads cannot be represented in the chosen math mode, for example `1e12` in fixed point.
"#,
    },
    ErrorEntry {
        code: "FRM-L009",
        short: "function cannot be bound",
        long: r#"## FRM-L009: function cannot be bound

fn1..fn4 may be bound to any function in the table except fn1..fn4 themselves.
"#,
    },
];

/// Look up an error entry by code (e.g. `"FRM-P001"`), ignoring case.
pub fn lookup(code: &str) -> Option<&'static ErrorEntry> {
    REGISTRY.iter().find(|e| e.code.eq_ignore_ascii_case(code))
}

/// Code for a numbered parser message.
pub fn parse_code(kind: ParseErrorKind) -> Option<&'static str> {
    lookup(&format!("FRM-P{:03}", kind.code())).map(|e| e.code)
}

/// Code for a load failure. Header and syntax errors use their parser code.
pub fn load_code(err: &LoadError) -> Option<&'static str> {
    let code = match err {
        LoadError::Header(e) => return parse_code(e.kind),
        LoadError::Prescan { errors, .. } => return errors.first().and_then(|e| parse_code(e.kind)),
        LoadError::NotFound { .. } => "FRM-L001",
        LoadError::Io { .. } => "FRM-L002",
        LoadError::TooLarge { .. } => "FRM-L003",
        LoadError::NoInstructions => "FRM-L004",
        LoadError::JumpStructure(_) => "FRM-L005",
        LoadError::Unimplemented(_) => "FRM-L006",
        LoadError::Bitshift(_) => "FRM-L007",
        LoadError::ConstantOutOfRange(_) => "FRM-L008",
        LoadError::UnbindableFunction { .. } => "FRM-L009",
    };
    lookup(code).map(|e| e.code)
}
