//! Operator confirmation before touching a database.

use std::io::{self, BufRead, Write};

/// Asks the operator a yes/no question.
pub trait Confirm {
    fn confirm(&self, question: &str) -> bool;
}

/// Reads the answer from stdin. Only `y` / `yes` count as consent.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsolePrompt;

impl Confirm for ConsolePrompt {
    fn confirm(&self, question: &str) -> bool {
        print!("{} (y/N): ", question);
        let _ = io::stdout().flush();

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer) {
            Ok(_) => is_yes(&answer),
            Err(_) => false,
        }
    }
}

/// Pre-approved run (`--yes`).
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl Confirm for AutoApprove {
    fn confirm(&self, _question: &str) -> bool {
        true
    }
}

impl<F> Confirm for F
where
    F: Fn(&str) -> bool,
{
    fn confirm(&self, question: &str) -> bool {
        self(question)
    }
}

/// `y` or `yes`, any case, surrounding whitespace ignored.
pub fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
