use env_logger::Builder;
use log::Level;
use std::io::Write;

pub const LOG_LEVEL_ENV: &str = "PROMPT_WEAVER_LOG_LEVEL";

fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "error",
        1 => "warn",
        2 => "info",
        _ => "debug",
    }
}

/// ANSI color code for a level tag.
fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "31",
        Level::Warn => "33",
        Level::Info => "32",
        Level::Debug | Level::Trace => "36",
    }
}

/// `selection_store` for `prompt_weaver::core::selection_store`; only shown at debug
/// verbosity where several modules interleave.
fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

/// Logs go to stderr so they never mix into a prompt written to stdout.
pub fn setup_logger(verbosity: u8) -> Result<(), log::SetLoggerError> {
    let env = env_logger::Env::default().filter_or(LOG_LEVEL_ENV, level_for(verbosity));
    let show_target = verbosity >= 3;

    Builder::from_env(env)
        .format(move |buf, record| {
            let level = record.level();
            if show_target {
                writeln!(
                    buf,
                    "\x1B[{}m{:<5}\x1B[0m {} {}: {}",
                    level_color(level),
                    level,
                    buf.timestamp(),
                    short_target(record.target()),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "\x1B[{}m{:<5}\x1B[0m {}",
                    level_color(level),
                    level,
                    record.args()
                )
            }
        })
        .format_timestamp_millis()
        .target(env_logger::Target::Stderr)
        .try_init()
}
