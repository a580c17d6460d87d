//! `env_logger` setup shared by both binaries.

use std::io::Write;

use env_logger::{Builder, Env};

/// `[timestamp level file:line] message`, `Info` unless the environment
/// filter in `env` says otherwise.
pub fn builder(env: Env<'_>) -> Builder {
    let mut builder = Builder::new();
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}:{}] {}",
                buf.timestamp_millis(),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .filter_level(log::LevelFilter::Info)
        .parse_env(env);
    builder
}

/// Install the logger, honouring `RUST_LOG`.
pub fn init() {
    builder(Env::default()).init();
}
