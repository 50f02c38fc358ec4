use slog::Drain;
use slog_term::{CompactFormat, TermDecorator};
use std::io;
use std::sync::Mutex;
use time::OffsetDateTime;

use slog::*;

use crate::helpers::datetime::Timezone;

fn new_drain(level: Level) -> Fuse<Mutex<Fuse<LevelFilter<CompactFormat<TermDecorator>>>>> {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::CompactFormat::new(decorator)
        // .use_local_timestamp()
        .use_custom_timestamp(|w: &mut dyn io::Write| {
            write!(
                w,
                "{}",
                OffsetDateTime::now_utc()
                    .to_localtime()
                    .to_formatted_string()
            )
        })
        .build()
        .filter_level(level)
        .fuse();
    let drain = Mutex::new(drain).fuse();
    drain
}

fn level_from_u8(log_level: u8) -> Level {
    match log_level {
        0 => Level::Critical,
        1 => Level::Error,
        2 => Level::Warning,
        3 => Level::Info,
        4 => Level::Debug,
        5 => Level::Trace,
        // Default to debug
        _ => Level::Debug,
    }
}

/// Install the global slog -> log pipeline, the level is fixed for
/// the lifetime of the process
pub fn init(log_level: u8) {
    let drain = new_drain(level_from_u8(log_level));
    let logger = slog::Logger::root(drain, slog::o!("version" => env!("CARGO_PKG_VERSION")));
    // slog_stdlog uses the logger from slog_scope, so set a logger there
    let guard = slog_scope::set_global_logger(logger);
    // https://github.com/slog-rs/slog/issues/249
    guard.cancel_reset();
    slog_stdlog::init().unwrap();
}
