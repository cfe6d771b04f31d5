//! `fern` logging, initialized once from `ESSADB_LOG` (mirrors the
//! teacher's `SQRUFF_LOG`-driven dispatch). The engine only logs at
//! `debug`/`trace` around block allocation, remap and statement
//! dispatch; it never logs at `info`/`warn` on the hot path.

pub(crate) fn init() -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| out.finish(format_args!("[{}] {}", record.level(), message)))
        .level(
            std::env::var("ESSADB_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(log::LevelFilter::Off),
        )
        .chain(std::io::stderr())
        .apply()
}
