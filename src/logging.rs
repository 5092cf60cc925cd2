use env_logger::Env;

/// Logs to stderr at `info` unless `RUST_LOG` says otherwise; stdout carries frame results.
pub fn init() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init()
        .ok();
}
