//! Nice xtalsym output formatting.

use std::fmt;

use log;

pub(crate) const XTALSYM_BANNER_LENGTH: usize = 103;

/// Logs an error to the `xtalsym-output` logger and to the root logger.
macro_rules! xtalsym_error {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::error!($fmt, $($($arg)*)?);
        log::error!(target: "xtalsym-output", $fmt, $($($arg)*)?);
    }
}

/// Logs a warning to the `xtalsym-output` logger.
macro_rules! xtalsym_warn {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::warn!(target: "xtalsym-output", $fmt, $($($arg)*)?); }
}

/// Logs a main output line to the `xtalsym-output` logger.
macro_rules! xtalsym_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "xtalsym-output", $fmt, $($($arg)*)?); }
}

pub(crate) use {xtalsym_error, xtalsym_output, xtalsym_warn};

/// Writes a nicely formatted section title.
pub(crate) fn write_title(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    let length = title.chars().count().max(XTALSYM_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    writeln!(f, "┌──{bar}──┐")?;
    writeln!(f, "│§ {title:^length$} §│")?;
    writeln!(f, "└──{bar}──┘")?;
    Ok(())
}

/// Writes a nicely formatted subtitle.
pub(crate) fn write_subtitle(f: &mut fmt::Formatter<'_>, subtitle: &str) -> fmt::Result {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    writeln!(f, "{subtitle}")?;
    writeln!(f, "{bar}")?;
    Ok(())
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging xtalsym outputs nicely.
pub(crate) trait XtalSymOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            xtalsym_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> XtalSymOutput for T where T: fmt::Debug + fmt::Display {}
