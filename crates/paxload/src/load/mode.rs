//! Load mode and the operator prompt that selects it.

use std::fmt;
use std::io::{BufRead, Write};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EtlError, Result};

/// Attempts the prompt allows before giving up.
pub const PROMPT_ATTEMPTS: usize = 3;

/// How staged rows reach the destination table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Delete every existing row, then insert.
    Full,
    /// Upsert keyed on the change hash.
    Incremental,
}

impl LoadMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadMode::Full => "full",
            LoadMode::Incremental => "incremental",
        }
    }

    /// Map the operator's menu choice, `1` or `2`.
    pub fn from_choice(choice: &str) -> Option<Self> {
        match choice.trim() {
            "1" => Some(LoadMode::Full),
            "2" => Some(LoadMode::Incremental),
            _ => None,
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadMode {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "full" | "1" => Ok(LoadMode::Full),
            "incremental" | "2" => Ok(LoadMode::Incremental),
            other => Err(EtlError::Config(format!("Unknown load mode: {}", other))),
        }
    }
}

/// Ask the operator for a load mode, re-prompting on bad input.
///
/// Gives up with a config error after `max_attempts` invalid answers or
/// when input ends.
pub fn prompt_load_mode<R: BufRead, W: Write>(
    mut input: R,
    mut output: W,
    max_attempts: usize,
) -> Result<LoadMode> {
    let io_err = |e| EtlError::io("<stdin>", e);

    for attempt in 1..=max_attempts {
        write!(output, "Select load mode - 1: full, 2: incremental: ").map_err(io_err)?;
        output.flush().map_err(io_err)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            return Err(EtlError::Config("No load mode given".to_string()));
        }

        if let Some(mode) = LoadMode::from_choice(&line) {
            return Ok(mode);
        }
        warn!(attempt, input = line.trim(), "Invalid load mode choice");
        writeln!(output, "Invalid choice '{}'", line.trim()).map_err(io_err)?;
    }

    Err(EtlError::Config(format!(
        "No valid load mode after {} attempts",
        max_attempts
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_parse_mode() {
        assert_eq!("full".parse::<LoadMode>().unwrap(), LoadMode::Full);
        assert_eq!("Incremental".parse::<LoadMode>().unwrap(), LoadMode::Incremental);
        assert!("merge".parse::<LoadMode>().is_err());
    }

    #[test]
    fn test_prompt_reprompts_until_valid() {
        let mut out = Vec::new();
        let mode = prompt_load_mode(Cursor::new("x\n2\n"), &mut out, PROMPT_ATTEMPTS).unwrap();

        assert_eq!(mode, LoadMode::Incremental);
        let shown = String::from_utf8(out).unwrap();
        assert_eq!(shown.matches("Select load mode").count(), 2);
        assert!(shown.contains("Invalid choice 'x'"));
    }

    #[test]
    fn test_prompt_exhaustion() {
        let err = prompt_load_mode(Cursor::new("a\nb\nc\n1\n"), Vec::new(), 3).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_prompt_end_of_input() {
        let err = prompt_load_mode(Cursor::new(""), Vec::new(), 3).unwrap_err();
        assert!(err.to_string().contains("No load mode"));
    }
}
