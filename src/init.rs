//! Process-wide lifecycle and optional logger wiring.
//!
//! `init`/`clear` exist as stable entry points even though neither
//! does real work on platforms without `WSAStartup`-style socket
//! library initialization — the original gates the body behind
//! `#ifdef _WIN32` while leaving the calls themselves unconditional.

use std::str::FromStr;

use anyhow::Result;
use fern::colors::{Color, ColoredLevelConfig};

/// Call once before issuing any request.
pub fn init() {}

/// Call once after all requests have completed.
pub fn clear() {}

/// Wire a colored `fern` dispatcher at the given level, logging to
/// stdout and to `log_file`. Not called automatically — the library
/// only emits through the `log` facade; wiring a subscriber is left to
/// the embedder, matching the crate's ambient logging convention.
pub fn init_logger(log_level: &str, log_file: &str, colored: bool) -> Result<()> {
    let colors = ColoredLevelConfig::new()
        .trace(Color::Magenta)
        .debug(Color::Blue)
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red);

    fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                chrono::Utc::now().to_rfc3339(),
                if colored {
                    colors.color(record.level()).to_string()
                } else {
                    record.level().to_string()
                },
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::from_str(log_level)?)
        .chain(std::io::stdout())
        .chain(fern::log_file(log_file)?)
        .apply()?;
    Ok(())
}
