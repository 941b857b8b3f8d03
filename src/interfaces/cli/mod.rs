//! Command-line interface of the `xtalsym` binary.

use std::path::PathBuf;

use clap::Parser;

use crate::io::format::{xtalsym_output, XTALSYM_BANNER_LENGTH};

const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// Logs a nicely formatted xtalsym heading to the `xtalsym-output` logger.
pub fn log_heading() {
    let version = if let Some(ver) = VERSION {
        format!("v{ver}")
    } else {
        "v unknown".to_string()
    };
    let width = XTALSYM_BANNER_LENGTH - 2;
    let lines = [
        String::new(),
        "x t a l s y m".to_string(),
        String::new(),
        "Symmetry of cluster orbits and degree-of-freedom spaces in crystals".to_string(),
        String::new(),
        version,
        String::new(),
    ];
    xtalsym_output!("╭{}╮", "─".repeat(width));
    for line in lines.iter() {
        xtalsym_output!("│{line:^width$}│");
    }
    xtalsym_output!("╰{}╯", "─".repeat(width));
    xtalsym_output!("");
}

/// Command-line arguments of the `xtalsym` binary.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// The YAML input file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// The file to which the output is written. If not given, the output goes to the standard
    /// output.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
