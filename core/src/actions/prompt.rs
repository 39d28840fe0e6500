use std::io::{self, BufRead, Write};

/// One-field modal prompt, shown on the command-execution context.
pub trait Prompt {
    /// `None` when the user cancelled.
    fn ask(&mut self, title: &str, message: &str) -> Option<String>;
}

/// Prompt on the controlling terminal. End of input counts as cancel.
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
    fn ask(&mut self, title: &str, message: &str) -> Option<String> {
        ask_with(io::stdin().lock(), io::stdout().lock(), title, message)
    }
}

fn ask_with<R: BufRead, W: Write>(mut input: R, mut output: W, title: &str, message: &str) -> Option<String> {
    let _ = write!(output, "[{}] {}: ", title, message);
    let _ = output.flush();

    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
    }
}
