use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use frm::diagnostic::{ansi::AnsiRenderer, json, registry, CollectSink, Diagnostic, Severity};
use frm::entry;
use frm::lexer::Func;
use frm::{Complex, Formula, LoadError, LoadOptions, MathMode, Outcome, Pixel};

#[derive(Parser, Debug)]
#[command(name = "frm", version, about = "Compile and run a fractal formula entry")]
struct Cli {
    /// Formula library (.frm)
    file: Option<PathBuf>,
    /// Entry to load
    name: Option<String>,

    #[arg(long, default_value = "float")]
    math: MathMode,
    /// Fractional bits in fixed-point mode (8..=29)
    #[arg(long, default_value_t = 16)]
    bitshift: u32,

    #[arg(long, value_parser = parse_func, default_value = "sin")]
    fn1: Func,
    #[arg(long, value_parser = parse_func, default_value = "sqr")]
    fn2: Func,
    #[arg(long, value_parser = parse_func, default_value = "sinh")]
    fn3: Func,
    #[arg(long, value_parser = parse_func, default_value = "cosh")]
    fn4: Func,

    #[arg(long, value_parser = parse_complex, allow_hyphen_values = true)]
    p1: Option<Complex<f64>>,
    #[arg(long, value_parser = parse_complex, allow_hyphen_values = true)]
    p2: Option<Complex<f64>>,
    #[arg(long, value_parser = parse_complex, allow_hyphen_values = true)]
    p3: Option<Complex<f64>>,
    #[arg(long, value_parser = parse_complex, allow_hyphen_values = true)]
    p4: Option<Complex<f64>>,
    #[arg(long, value_parser = parse_complex, allow_hyphen_values = true)]
    p5: Option<Complex<f64>>,

    /// Pixel coordinate as X,Y
    #[arg(long, value_parser = parse_complex, allow_hyphen_values = true, default_value = "0,0")]
    pixel: Complex<f64>,
    #[arg(long, default_value_t = 0)]
    col: u32,
    #[arg(long, default_value_t = 0)]
    row: u32,

    /// Iterations to run after the init section
    #[arg(long, default_value_t = 10)]
    iterations: u32,
    /// Value of `maxit` seen by the formula
    #[arg(long)]
    maxit: Option<u32>,
    /// Seed for `rand`
    #[arg(long)]
    seed: Option<u64>,

    /// Print the compiled program instead of running it
    #[arg(long)]
    dump: bool,
    /// Machine-readable output
    #[arg(long)]
    json: bool,
    /// Report syntax errors in the traditional plain-text layout
    #[arg(long)]
    classic: bool,
    /// Don't warn about an unknown symmetry
    #[arg(long)]
    quiet_symmetry: bool,
    /// Explain an error code, e.g. FRM-P001
    #[arg(long, value_name = "CODE")]
    explain: Option<String>,
    /// List the entries in FILE
    #[arg(long)]
    list: bool,
    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_func(s: &str) -> Result<Func, String> {
    Func::lookup(&s.to_ascii_lowercase()).ok_or_else(|| format!("unknown function '{s}'"))
}

fn parse_complex(s: &str) -> Result<Complex<f64>, String> {
    let num = |t: &str| {
        t.trim()
            .parse::<f64>()
            .map_err(|e| format!("bad number '{t}': {e}"))
    };
    match s.split_once(',') {
        Some((x, y)) => Ok(Complex::new(num(x)?, num(y)?)),
        None => Ok(Complex::new(num(s)?, 0.0)),
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "frm=debug",
        _ => "frm=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .try_init();
}

struct Reporter {
    json: bool,
    ansi: AnsiRenderer,
}

impl Reporter {
    fn emit(&self, d: &Diagnostic) {
        if self.json {
            eprintln!("{}", json::render(d));
        } else {
            eprint!("{}", self.ansi.render(d));
        }
    }
}

fn options(cli: &Cli) -> LoadOptions {
    let mut opts = LoadOptions {
        math: cli.math,
        bitshift: cli.bitshift,
        functions: [cli.fn1, cli.fn2, cli.fn3, cli.fn4],
        report_bad_symmetry: !cli.quiet_symmetry,
        seed: cli.seed,
        ..LoadOptions::default()
    };
    for (n, p) in [cli.p1, cli.p2, cli.p3, cli.p4, cli.p5].into_iter().enumerate() {
        if let Some(v) = p {
            opts.env.set_param(n + 1, v);
        }
    }
    if let Some(m) = cli.maxit {
        opts.env.max_iterations = m;
    }
    opts
}

fn outcome_name(outcome: Outcome, converged: bool) -> &'static str {
    match outcome {
        Outcome::BailedOut => "bailed-out",
        Outcome::Overflow => "overflow",
        Outcome::Continue if converged => "converged",
        Outcome::Continue => "max-iterations",
    }
}

enum Failure {
    Usage(Diagnostic),
    Load(LoadError),
}

impl From<LoadError> for Failure {
    fn from(e: LoadError) -> Self {
        Failure::Load(e)
    }
}

fn run(cli: &Cli, reporter: &Reporter) -> Result<(), Failure> {
    let Some(path) = &cli.file else {
        return Err(Failure::Usage(
            Diagnostic::error("a formula file is required").with_suggestion("frm <FILE> <NAME>"),
        ));
    };

    if cli.list {
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let names = entry::list_entries(&text);
        if cli.json {
            println!("{}", serde_json::json!(names));
        } else {
            for n in names {
                println!("{n}");
            }
        }
        return Ok(());
    }

    let Some(name) = &cli.name else {
        return Err(Failure::Usage(
            Diagnostic::error("no formula name given")
                .with_suggestion("run with --list to see the formulas in the file"),
        ));
    };

    let mut sink = CollectSink::default();
    let result = Formula::load(path, name, &options(cli), &mut sink);
    for (severity, text) in &sink.messages {
        match severity {
            Severity::Warning => reporter.emit(&Diagnostic::warning(text.replace('\n', ": "))),
            Severity::Error if cli.classic => eprint!("{text}"),
            Severity::Error => {}
        }
    }
    let mut formula = result?;

    if cli.dump {
        if cli.json {
            let s = formula.to_json().map_err(|e| {
                Failure::Usage(Diagnostic::error(format!("could not serialize program: {e}")))
            })?;
            println!("{s}");
        } else {
            print!("{}", formula.disassemble());
        }
        return Ok(());
    }

    let pixel = Pixel {
        col: cli.col,
        row: cli.row,
        coord: cli.pixel,
    };
    let mut orbit = Vec::new();
    let mut outcome = formula.per_pixel(&pixel);
    let mut converged = false;
    if outcome == Outcome::Continue {
        let mut last = formula.z().to_f64();
        for n in 1..=cli.iterations {
            outcome = formula.iterate();
            let z = formula.z();
            if cli.json {
                orbit.push([z.to_f64().x, z.to_f64().y]);
            } else {
                println!("{n:>5}  {z}");
            }
            if outcome.is_done() {
                break;
            }
            let now = z.to_f64();
            if now == last {
                converged = true;
                break;
            }
            last = now;
        }
    }

    let status = outcome_name(outcome, converged);
    if cli.json {
        let z = formula.z().to_f64();
        let out = serde_json::json!({
            "name": formula.name(),
            "math": formula.machine().mode(),
            "outcome": status,
            "iterations": orbit.len(),
            "z": [z.x, z.y],
            "orbit": orbit,
        });
        println!("{out}");
    } else {
        println!("{status}");
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let reporter = Reporter {
        json: cli.json,
        ansi: AnsiRenderer {
            use_color: std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
        },
    };

    if let Some(code) = &cli.explain {
        return match registry::lookup(code) {
            Some(e) => {
                println!("{}", e.long);
                ExitCode::SUCCESS
            }
            None => {
                reporter.emit(&Diagnostic::error(format!("unknown error code '{code}'")));
                ExitCode::FAILURE
            }
        };
    }

    match run(&cli, &reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(Failure::Usage(d)) => {
            reporter.emit(&d);
            ExitCode::FAILURE
        }
        Err(Failure::Load(e)) => {
            // --classic already printed the syntax error blocks
            if !(cli.classic && matches!(e, LoadError::Prescan { .. })) {
                for d in e.diagnostics() {
                    reporter.emit(&d);
                }
            }
            ExitCode::FAILURE
        }
    }
}
