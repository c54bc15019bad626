use std::io::Write;
use std::process::{Command, Output};

const LIBRARY: &str = "\
; sample formulas
Mandel (XAXIS) {
  z = 0:
  z = sqr(z) + pixel, |z| <= 4
}

Julia (sideways) { z = pixel: z = z*z + p1, |z| <= 4 }

Fixed { z = 0.5: z = z, 1 }

Broken {
  z = 0:
  z = z * + pixel
}

Blowup { z = pixel: z = z / 0, 1 }
";

fn library() -> tempfile::NamedTempFile {
    let mut f = tempfile::Builder::new().suffix(".frm").tempfile().unwrap();
    f.write_all(LIBRARY.as_bytes()).unwrap();
    f
}

fn frm(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_frm"))
        .args(args)
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1")
        .output()
        .expect("failed to run frm")
}

fn stdout(out: &Output) -> String {
    String::from_utf8_lossy(&out.stdout).into_owned()
}

fn stderr(out: &Output) -> String {
    String::from_utf8_lossy(&out.stderr).into_owned()
}

// --- Running formulas ---

#[test]
fn escaping_pixel_bails_out() {
    let lib = library();
    let path = lib.path().to_str().unwrap();
    let out = frm(&[path, "mandel", "--pixel", "1,1"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert_eq!(text.lines().last(), Some("bailed-out"));
    assert_eq!(text.lines().count(), 3, "{text}");
}

#[test]
fn bounded_pixel_runs_to_the_limit() {
    let lib = library();
    let path = lib.path().to_str().unwrap();
    let out = frm(&[path, "mandel", "--pixel", "-0.5,0.1", "--iterations", "25"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let text = stdout(&out);
    assert_eq!(text.lines().count(), 26);
    assert_eq!(text.lines().last(), Some("max-iterations"));
}

#[test]
fn fixed_point_is_reported_as_converged() {
    let lib = library();
    let path = lib.path().to_str().unwrap();
    let out = frm(&[path, "fixed"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out).lines().last(), Some("converged"));
}

#[test]
#[cfg(feature = "fixed")]
fn overflow_in_fixed_mode() {
    let lib = library();
    let path = lib.path().to_str().unwrap();
    let out = frm(&[path, "blowup", "--math", "fixed", "--pixel", "1,1"]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    assert_eq!(stdout(&out).lines().last(), Some("overflow"));
}

#[test]
fn params_reach_the_formula() {
    let lib = library();
    let path = lib.path().to_str().unwrap();
    let out = frm(&[
        path, "julia", "--p1", "0.25,0", "--pixel", "0,0", "--iterations", "1", "--json",
        "--quiet-symmetry",
    ]);
    assert!(out.status.success(), "stderr: {}", stderr(&out));
    let v: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
    assert_eq!(v["name"], "Julia");
    assert_eq!(v["z"][0], 0.25);
    assert_eq!(v["outcome"], "max-iterations");
    assert!(stderr(&out).is_empty(), "stderr: {}", stderr(&out));
}

#[test]
#[cfg(all(feature = "fixed", feature = "mp"))]
fn every_math_mode_agrees_on_escape() {
    let lib = library();
    let path = lib.path().to_str().unwrap();
    for math in ["float", "fixed", "mp"] {
        let out = frm(&[path, "mandel", "--pixel", "0.5,0.5", "--math", math, "--json"]);
        assert!(out.status.success(), "{math}: {}", stderr(&out));
        let v: serde_json::Value = serde_json::from_str(stdout(&out).trim()).unwrap();
        assert_eq!(v["outcome"], "bailed-out", "{math}");
        assert_eq!(v["iterations"], 5, "{math}");
    }
}

// --- Listing and dumping ---

#[test]
fn list_entries() {
    let lib = library();
    let out = frm(&[lib.path().to_str().unwrap(), "--list"]);
    assert!(out.status.success());
    assert_eq!(
        stdout(&out).lines().collect::<Vec<_>>(),
        ["Mandel", "Julia", "Fixed", "Broken", "Blowup"]
    );
}

#[test]
fn dump_disassembles() {
    let lib = library();
    let out = frm(&[lib.path().to_str().unwrap(), "mandel", "--dump"]);
    assert!(out.status.success());
    let text = stdout(&out);
    assert!(text.contains("end_init"), "{text}");
    assert!(text.contains("sqr"), "{text}");
}

#[test]
fn dump_json() {
    let lib = library();
    let out = frm(&[lib.path().to_str().unwrap(), "mandel", "--dump", "--json"]);
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_str(&stdout(&out)).unwrap();
    assert_eq!(v["symmetry"], "XAXIS");
    assert_eq!(v["functions"][0], "sin");
}

// --- Errors ---

#[test]
fn syntax_error_exits_nonzero() {
    let lib = library();
    let out = frm(&[lib.path().to_str().unwrap(), "broken"]);
    assert!(!out.status.success());
    let err = stderr(&out);
    assert!(err.contains("error[FRM-P000]: Should be an Argument"), "{err}");
    assert!(err.contains("z = z * + pixel"), "{err}");
}

#[test]
fn classic_error_report() {
    let lib = library();
    let out = frm(&[lib.path().to_str().unwrap(), "broken", "--classic"]);
    assert!(!out.status.success());
    let err = stderr(&out);
    assert!(err.contains("Error(0) at line 3:  Should be an Argument"), "{err}");
    assert!(err.contains("  z=z*+pixel"), "{err}");
}

#[test]
fn json_errors() {
    let lib = library();
    let out = frm(&[lib.path().to_str().unwrap(), "broken", "--json"]);
    assert!(!out.status.success());
    let v: serde_json::Value = serde_json::from_str(stderr(&out).trim()).unwrap();
    assert_eq!(v["code"], "FRM-P000");
    assert_eq!(v["labels"][0]["line"], 13);
}

#[test]
fn unknown_symmetry_warns() {
    let lib = library();
    let out = frm(&[lib.path().to_str().unwrap(), "julia", "--iterations", "1"]);
    assert!(out.status.success());
    let err = stderr(&out);
    assert!(err.contains("warning: Symmetry below is invalid, will use NOSYM: SIDEWAYS"), "{err}");
}

#[test]
fn missing_entry() {
    let lib = library();
    let out = frm(&[lib.path().to_str().unwrap(), "nope"]);
    assert!(!out.status.success());
    let err = stderr(&out);
    assert!(err.contains("no formula named 'nope'"), "{err}");
    assert!(err.contains("--list"), "{err}");
}

#[test]
fn missing_file() {
    let out = frm(&["/definitely/not/here.frm", "mandel"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("could not read"));
}

#[test]
#[cfg(feature = "fixed")]
fn bad_bitshift() {
    let lib = library();
    let out = frm(&[lib.path().to_str().unwrap(), "mandel", "--math", "fixed", "--bitshift", "3"]);
    assert!(!out.status.success());
    assert!(stderr(&out).contains("FRM-L007"));
}

#[test]
fn explain_code() {
    let out = frm(&["--explain", "FRM-P033"]);
    assert!(out.status.success());
    assert!(stdout(&out).contains("32 characters"));
}

#[test]
fn explain_unknown_code() {
    let out = frm(&["--explain", "FRM-Z001"]);
    assert!(!out.status.success());
}
