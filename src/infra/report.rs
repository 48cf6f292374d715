//! Console diagnostics for the user.
//!
//! Separate from logging: these lines are what `-v`/`-d` promise on the
//! command line, and nothing is printed in silent mode.

use crate::domain::response::Diagnostic;
use std::path::Path;

/// How much the reporter prints
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    #[default]
    Silent,
    Verbose,
    Debug,
}

impl Verbosity {
    #[must_use]
    pub fn from_flags(verbose: bool, debug: bool) -> Self {
        if debug {
            Verbosity::Debug
        } else if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Silent
        }
    }

    /// Default `env_logger` filter for this level.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        match self {
            Verbosity::Silent => "warn",
            Verbosity::Verbose => "info",
            Verbosity::Debug => "debug",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    verbosity: Verbosity,
}

impl Reporter {
    #[must_use]
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    #[must_use]
    pub fn verbosity(&self) -> Verbosity {
        self.verbosity
    }

    /// Result triple returned by the service.
    pub fn result(&self, diagnostic: &Diagnostic) {
        if self.verbosity < Verbosity::Verbose {
            return;
        }
        println!("📋 Result major: {}", diagnostic.major);
        if let Some(minor) = &diagnostic.minor {
            println!("   Result minor: {minor}");
        }
        if let Some(message) = &diagnostic.message {
            println!("   Result message: {message}");
        }
    }

    pub fn signed(&self, outputs: &[&Path]) {
        if self.verbosity >= Verbosity::Verbose {
            println!("✅ OK signing {}", join(outputs));
        }
    }

    pub fn failed(&self, inputs: &[&Path], reason: &str) {
        if self.verbosity >= Verbosity::Verbose {
            println!("❌ FAILED to sign {}: {reason}", join(inputs));
        }
    }

    /// Free-form detail, debug level only.
    pub fn detail(&self, text: &str) {
        if self.verbosity >= Verbosity::Debug {
            println!("   {text}");
        }
    }
}

fn join(paths: &[&Path]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
