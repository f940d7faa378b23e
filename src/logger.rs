use log::LevelFilter;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use std::str::FromStr;

/// Initializes terminal logging. The level comes from `RUST_LOG` (default:
/// Info). Must be called once, before any other crate code runs.
pub fn init() -> Result<(), log::SetLoggerError> {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| LevelFilter::from_str(&v).ok())
        .unwrap_or(LevelFilter::Info);

    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
}
