//! Terminal front-end for setup dialogues

use console::style;
use std::io::{self, BufRead, Write};

use wiz_core::setup::{Question, SetupFlow};

use crate::error::{CliError, Result};

/// Ask every question of `flow` on the terminal until it finishes
///
/// Ctrl-C at a prompt ends the dialogue with [`CliError::Interrupted`].
pub async fn run_flow(flow: &mut SetupFlow) -> Result<()> {
    while let Some(question) = flow.current() {
        let answer = ask(question).await?;
        if let Err(reason) = flow.answer(&answer) {
            println!("  {} {}", style("✗").red(), reason);
        }
    }
    Ok(())
}

/// Read one answer off the runtime thread, racing it against Ctrl-C
async fn ask(question: Question) -> Result<String> {
    // A read still blocked after an interrupt is abandoned; the runtime is
    // shut down without waiting for it
    let read = tokio::task::spawn_blocking(move || read_answer(&question));
    tokio::select! {
        answer = read => answer.map_err(|e| CliError::internal(format!("prompt failed: {}", e)))?,
        _ = tokio::signal::ctrl_c() => {
            println!();
            Err(CliError::Interrupted)
        }
    }
}

fn label(question: &Question) -> String {
    match &question.default {
        Some(default) => format!("- {} [{}]: ", question.prompt, style(default).dim()),
        None => format!("- {}: ", question.prompt),
    }
}

fn read_answer(question: &Question) -> Result<String> {
    if question.secret {
        return Ok(rpassword::prompt_password(label(question))?);
    }

    print!("{}", label(question));
    io::stdout().flush()?;
    read_line(&mut io::stdin().lock())
}

fn read_line(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(CliError::usage_with_help(
            "Input ended before setup finished",
            "Run `wizk8s setup` from an interactive terminal",
        ));
    }
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_line_strips_newline() {
        let mut input = io::Cursor::new("kind-dev\r\nnext\n");
        assert_eq!(read_line(&mut input).unwrap(), "kind-dev");
        assert_eq!(read_line(&mut input).unwrap(), "next");
    }

    #[test]
    fn test_eof_is_usage_error() {
        let err = read_line(&mut io::Cursor::new("")).unwrap_err();
        assert_eq!(err.exit_code(), crate::exit_codes::USAGE_ERROR);
    }
}
