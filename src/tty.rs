//! Terminal I/O utilities for CLI.
//!
//! Provides TTY detection and user prompting.

use std::io::{self, BufRead, IsTerminal, Write};

pub fn is_stdin_tty() -> bool {
    io::stdin().is_terminal()
}

pub fn prompt(message: &str) -> rollout::Result<String> {
    eprint!("{}", message);
    io::stderr().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    let read = stdin.lock().read_line(&mut line).map_err(|e| {
        rollout::Error::new(
            rollout::ErrorCode::InternalIoError,
            format!("Failed to read input: {}", e),
            serde_json::Value::Null,
        )
    })?;

    if read == 0 {
        return Err(rollout::Error::internal_io(
            "stdin closed",
            Some("read prompt answer".to_string()),
        ));
    }

    Ok(line.trim().to_string())
}

/// Numbered menu; re-prompts until a listed number is entered.
pub fn choose(items: &[String], message: &str) -> rollout::Result<usize> {
    for (index, item) in items.iter().enumerate() {
        eprintln!("{}) {}", index + 1, item);
    }
    eprintln!();

    loop {
        let answer = prompt(message)?;
        if let Ok(choice) = answer.parse::<usize>() {
            if (1..=items.len()).contains(&choice) {
                eprintln!();
                return Ok(choice - 1);
            }
        }
    }
}

/// `y` or `yes` (any case) confirms.
pub fn confirm(message: &str) -> rollout::Result<bool> {
    let answer = prompt(message)?.to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Print status message to stderr if running in a terminal.
pub fn status(message: &str) {
    if io::stderr().is_terminal() {
        eprintln!("{}", message);
    }
}

// log_status! macro is defined in lib.rs (#[macro_export]) and available crate-wide.
