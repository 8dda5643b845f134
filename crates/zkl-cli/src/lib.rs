//! # zkl-cli — ZK Ledger Command-Line Interface
//!
//! ## Subcommands
//!
//! - `generate` — Zinc sources for every module of a schema
//! - `structure` — structure tree JSON of a schema
//! - `diff` — migration diagnostics between two structures
//! - `cache-check` — freshness of a circuit's compiled artifacts
//!
//! ## Crate Policy
//!
//! - Argument parsing lives next to each handler; handlers delegate to the
//!   domain crates.
//! - Results go to stdout, logs to stderr.
//! - Exit codes: 0 success, 1 a failed check (breaking diff, stale cache),
//!   2 an operational error.

pub mod cache;
pub mod diff;
pub mod generate;
pub mod structure;

/// Result of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// The command ran, and its check did not pass.
    Failure,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Success => 0,
            Outcome::Failure => 1,
        }
    }
}

/// Exit code for errors that stopped a command.
pub const ERROR_EXIT_CODE: u8 = 2;

/// Default log filter for a `-v` count.
pub fn log_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(2), "debug");
        assert_eq!(log_level(9), "trace");
        assert_eq!(Outcome::Failure.exit_code(), 1);
    }
}
