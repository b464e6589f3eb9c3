use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Install the terminal logger.
///
/// Records from the http and sqlite internals are dropped.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    TermLogger::init(
        level,
        ConfigBuilder::default()
            .add_filter_ignore_str("hyper")
            .add_filter_ignore_str("rustls")
            .add_filter_ignore_str("sqlx")
            .set_time_format_rfc3339()
            .build(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
}

/// Parse a level name from the config file, falling back to `info`.
pub fn parse_level(name: &str) -> LevelFilter {
    match name.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" | "warning" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}
