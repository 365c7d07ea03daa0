//! Interactive read-eval-print loop
//!
//! Lines are accumulated until brackets balance (see [`helper`]), then
//! evaluated in the interpreter's user context. Results print molded after
//! `==`; void results print nothing.

pub mod helper;

use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use tracing::{debug, warn};

use crate::backend::eval::SignalLabel;
use crate::backend::models::Value;
use crate::interpreter::{HostError, Interpreter};

pub use helper::{check_completeness, CompletenessStatus, ReplHelper};

const PROMPT: &str = ">> ";

/// History file: the configured one, else `<data dir>/reval/history.txt`
pub fn history_path(configured: Option<&PathBuf>) -> Option<PathBuf> {
    configured
        .cloned()
        .or_else(|| dirs::data_dir().map(|dir| dir.join("reval").join("history.txt")))
}

/// Text shown for one evaluation result, `None` for void
pub fn render_result(result: &Result<Value, HostError>) -> Option<String> {
    match result {
        Ok(Value::Void) => None,
        Ok(value) => Some(format!("== {}", value)),
        Err(HostError::UnhandledSignal(signal)) if signal.label == SignalLabel::Halt => {
            Some("** halted".to_string())
        }
        Err(err) => Some(format!("** {}", err)),
    }
}

pub fn run(interp: &mut Interpreter) -> Result<(), ReadlineError> {
    println!("reval {}", env!("CARGO_PKG_VERSION"));
    println!("Type 'quit' or press Ctrl-D to leave.\n");

    let mut rl: Editor<ReplHelper, DefaultHistory> = Editor::new()?;
    let mut helper = ReplHelper::new();
    helper.update_words(interp.user_context().names());
    rl.set_helper(Some(helper));

    let history = history_path(interp.config().history_file.as_ref());
    if let Some(path) = &history {
        if let Some(parent) = path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(target: "reval::repl", path = %parent.display(), error = %err, "cannot create history directory");
            }
        }
        if rl.load_history(path).is_err() {
            debug!(target: "reval::repl", path = %path.display(), "no previous history");
        }
    }

    loop {
        match rl.readline(PROMPT) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "quit" || input == "exit" {
                    break;
                }
                rl.add_history_entry(input)?;

                let result = interp.eval_text(input);
                if let Some(text) = render_result(&result) {
                    match result {
                        Ok(_) => println!("{}", text),
                        Err(_) => eprintln!("{}", text),
                    }
                }
                if let Some(helper) = rl.helper_mut() {
                    helper.add_to_history(input.to_string());
                    helper.update_words(interp.user_context().names());
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err),
        }
    }

    if let Some(path) = &history {
        if let Err(err) = rl.save_history(path) {
            warn!(target: "reval::repl", path = %path.display(), error = %err, "cannot save history");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::eval::Signal;

    #[test]
    fn test_render_result() {
        assert_eq!(render_result(&Ok(Value::Void)), None);
        assert_eq!(
            render_result(&Ok(Value::Integer(3))),
            Some("== 3".to_string())
        );
        assert_eq!(
            render_result(&Err(HostError::UnhandledSignal(Signal::halt()))),
            Some("** halted".to_string())
        );
    }

    #[test]
    fn test_configured_history_wins() {
        let configured = PathBuf::from("/tmp/reval-history");
        assert_eq!(history_path(Some(&configured)), Some(configured));
    }
}
