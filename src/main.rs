use std::path::Path;

use anyhow::{self, Context};
use clap::Parser;
use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use xtalsym::interfaces::cli::{log_heading, Cli};
use xtalsym::interfaces::input::Input;
use xtalsym::interfaces::InputHandle;
use xtalsym::io::read_xtalsym_yaml;

/// Sets up the `xtalsym-output` logger for the main output and a root logger for diagnostics.
///
/// The main output goes to `output` if given, or to the standard output otherwise. Diagnostics
/// are always written to the standard error.
fn configure_logging(output: Option<&Path>) -> Result<(), anyhow::Error> {
    let output_appender: Box<dyn log4rs::append::Append> = match output {
        Some(path) => Box::new(
            FileAppender::builder()
                .encoder(Box::new(PatternEncoder::new("{m}{n}")))
                .append(false)
                .build(path)
                .with_context(|| format!("Unable to open the output file {}", path.display()))?,
        ),
        None => Box::new(
            ConsoleAppender::builder()
                .encoder(Box::new(PatternEncoder::new("{m}{n}")))
                .build(),
        ),
    };
    let diagnostics_appender = ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("[{l}] {t}: {m}{n}")))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("output", output_appender))
        .appender(Appender::builder().build("diagnostics", Box::new(diagnostics_appender)))
        .logger(
            Logger::builder()
                .appender("output")
                .additive(false)
                .build("xtalsym-output", LevelFilter::Info),
        )
        .build(
            Root::builder()
                .appender("diagnostics")
                .build(LevelFilter::Warn),
        )
        .with_context(|| "Invalid logging configuration")?;
    log4rs::init_config(config).with_context(|| "Unable to initialise logging")?;
    Ok(())
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    configure_logging(cli.output.as_deref())?;
    log_heading();

    let config = cli
        .config
        .ok_or_else(|| anyhow::format_err!("No YAML input file has been specified."))?;
    let input = read_xtalsym_yaml::<Input, _>(&config)
        .with_context(|| format!("Unable to read the input file {}", config.display()))?;
    input.handle()
}
