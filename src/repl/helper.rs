//! Rustyline helper integration
//!
//! Word completion from the interpreter's bindings, history hints, and
//! multi-line input while brackets or strings are still open.

use std::borrow::Cow;

use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Helper};

/// Completeness status for a chunk of input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletenessStatus {
    Complete,
    Incomplete {
        open_brackets: usize,
        open_parens: usize,
        unclosed_text: bool,
    },
    /// Closing delimiter with nothing to close
    Invalid { reason: String },
}

/// Decide whether `input` can be scanned yet
pub fn check_completeness(input: &str) -> CompletenessStatus {
    let mut stack: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut brace_depth = 0usize;
    let mut in_comment = false;
    let mut escape_next = false;

    for ch in input.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if in_comment {
            in_comment = ch != '\n';
            continue;
        }
        if in_string {
            match ch {
                '^' | '\\' => escape_next = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if brace_depth > 0 {
            match ch {
                '^' => escape_next = true,
                '{' => brace_depth += 1,
                '}' => brace_depth -= 1,
                _ => {}
            }
            continue;
        }
        match ch {
            ';' => in_comment = true,
            '"' => in_string = true,
            '{' => brace_depth = 1,
            '[' | '(' => stack.push(ch),
            ']' | ')' => {
                let expected = if ch == ']' { '[' } else { '(' };
                if stack.pop() != Some(expected) {
                    return CompletenessStatus::Invalid {
                        reason: format!("unexpected {}", ch),
                    };
                }
            }
            _ => {}
        }
    }

    if stack.is_empty() && !in_string && brace_depth == 0 {
        CompletenessStatus::Complete
    } else {
        CompletenessStatus::Incomplete {
            open_brackets: stack.iter().filter(|c| **c == '[').count(),
            open_parens: stack.iter().filter(|c| **c == '(').count(),
            unclosed_text: in_string || brace_depth > 0,
        }
    }
}

/// REPL helper holding the words known to the interpreter
pub struct ReplHelper {
    words: Vec<String>,
    command_history: Vec<String>,
}

impl ReplHelper {
    pub fn new() -> Self {
        Self {
            words: Vec::new(),
            command_history: Vec::new(),
        }
    }

    /// Replace the completion candidates with the currently bound words
    pub fn update_words<I, S>(&mut self, words: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.words = words.into_iter().map(|w| w.as_ref().to_string()).collect();
        self.words.sort();
        self.words.dedup();
    }

    pub fn add_to_history(&mut self, cmd: String) {
        // Keep only last 100 commands for hints
        if self.command_history.len() >= 100 {
            self.command_history.remove(0);
        }
        self.command_history.push(cmd);
    }
}

impl Default for ReplHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line_before_cursor = &line[..pos];
        let word_start = line_before_cursor
            .rfind(|c: char| c.is_whitespace() || matches!(c, '[' | ']' | '(' | ')' | ':' | '\'' | '/'))
            .map(|i| i + 1)
            .unwrap_or(0);
        let partial = &line_before_cursor[word_start..];
        if partial.is_empty() {
            return Ok((pos, vec![]));
        }

        let matches = self
            .words
            .iter()
            .filter(|word| word.starts_with(partial))
            .map(|word| Pair {
                display: word.clone(),
                replacement: word.clone(),
            })
            .collect();
        Ok((word_start, matches))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        if pos < line.len() || line.is_empty() {
            return None;
        }
        self.command_history
            .iter()
            .rev()
            .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
            .map(|cmd| cmd[line.len()..].to_string())
    }
}

impl Highlighter for ReplHelper {
    fn highlight_hint<'h>(&self, hint: &'h str) -> Cow<'h, str> {
        // Dim the hint
        Cow::Owned(format!("\x1b[90m{}\x1b[0m", hint))
    }
}

impl Validator for ReplHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> rustyline::Result<ValidationResult> {
        match check_completeness(ctx.input()) {
            CompletenessStatus::Complete => Ok(ValidationResult::Valid(None)),
            CompletenessStatus::Incomplete { .. } => Ok(ValidationResult::Incomplete),
            CompletenessStatus::Invalid { reason } => Ok(ValidationResult::Invalid(Some(reason))),
        }
    }
}

impl Helper for ReplHelper {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completeness_balanced() {
        assert_eq!(check_completeness("if true [1]"), CompletenessStatus::Complete);
        assert_eq!(check_completeness(r#"print "]""#), CompletenessStatus::Complete);
        assert_eq!(check_completeness("x ; [ not code"), CompletenessStatus::Complete);
    }

    #[test]
    fn test_completeness_open() {
        assert_eq!(
            check_completeness("f: func [x] [\n  (x"),
            CompletenessStatus::Incomplete {
                open_brackets: 1,
                open_parens: 1,
                unclosed_text: false,
            }
        );
        assert!(matches!(
            check_completeness("{multi"),
            CompletenessStatus::Incomplete {
                unclosed_text: true,
                ..
            }
        ));
    }

    #[test]
    fn test_completeness_invalid() {
        assert!(matches!(
            check_completeness("[1 2)"),
            CompletenessStatus::Invalid { .. }
        ));
        assert!(matches!(check_completeness("]"), CompletenessStatus::Invalid { .. }));
    }

    #[test]
    fn test_update_words_sorted() {
        let mut helper = ReplHelper::new();
        helper.update_words(["if", "add", "if"]);
        assert_eq!(helper.words, vec!["add".to_string(), "if".to_string()]);
    }
}
