//! Shared helpers for integration tests
//!
//! Language cases live in TOML files under `tests/cases/`. Each case names a
//! source snippet and either the molded result or the error variant it must
//! raise.

use std::fs;
use std::path::{Path, PathBuf};

use reval::{ErrorKind, HostError, Interpreter, Value};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CaseFile {
    #[serde(rename = "case", default)]
    pub cases: Vec<Case>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Case {
    pub name: String,
    pub source: String,
    /// Molded form of the final value
    pub expect: Option<String>,
    /// `ErrorKind` variant name, e.g. `NoArg`
    pub error: Option<String>,
    /// Signal label when the case ends in an unhandled signal
    pub signal: Option<String>,
}

pub fn cases_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("cases")
}

pub fn load_cases(file: &str) -> Vec<Case> {
    let path = cases_dir().join(file);
    let text = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e));
    let parsed: CaseFile =
        toml::from_str(&text).unwrap_or_else(|e| panic!("bad case file {}: {}", path.display(), e));
    parsed.cases
}

/// Variant name of an error kind, without its payload
pub fn variant_name(kind: &ErrorKind) -> String {
    let debug = format!("{:?}", kind);
    debug
        .split(|c: char| c == '(' || c == ' ' || c == '{')
        .next()
        .unwrap_or_default()
        .to_string()
}

pub fn eval(source: &str) -> Result<Value, HostError> {
    Interpreter::new()
        .expect("standard library installs")
        .eval_text(source)
}

/// Run one case in a fresh interpreter; `Err` carries a failure description
pub fn check_case(case: &Case) -> Result<(), String> {
    let result = eval(&case.source);
    match (&case.expect, &case.error, &case.signal, result) {
        (Some(expected), _, _, Ok(value)) => {
            let molded = value.to_string();
            if &molded == expected {
                Ok(())
            } else {
                Err(format!("expected {}, got {}", expected, molded))
            }
        }
        (_, Some(expected), _, Err(HostError::Eval(err))) => {
            let got = variant_name(&err.kind);
            if &got == expected {
                Ok(())
            } else {
                Err(format!("expected {} error, got {}", expected, err))
            }
        }
        (_, _, Some(expected), Err(HostError::UnhandledSignal(signal))) => {
            let got = format!("{:?}", signal.label);
            if got.starts_with(expected.as_str()) {
                Ok(())
            } else {
                Err(format!("expected {} signal, got {}", expected, got))
            }
        }
        (_, _, _, other) => Err(format!("unexpected outcome {:?}", other)),
    }
}

/// Run every case in `file`, reporting all failures together
pub fn run_case_file(file: &str) {
    let cases = load_cases(file);
    assert!(!cases.is_empty(), "{} has no cases", file);
    let failures: Vec<String> = cases
        .iter()
        .filter_map(|case| {
            check_case(case)
                .err()
                .map(|why| format!("{}: {}", case.name, why))
        })
        .collect();
    assert!(
        failures.is_empty(),
        "{} of {} cases failed:\n{}",
        failures.len(),
        cases.len(),
        failures.join("\n")
    );
}
