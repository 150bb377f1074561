use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize the logging system. Safe to call more than once; only the
/// first call takes effect.
pub fn init(debug: bool) {
    INIT.call_once(|| {
        let default_level = if debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };

        env_logger::Builder::from_default_env()
            .filter_level(default_level)
            .filter_module("anicore", default_level)
            .filter_module("reqwest", log::LevelFilter::Warn)
            .filter_module("tokio", log::LevelFilter::Warn)
            .format_timestamp_secs()
            .format_target(false)
            .format_module_path(false)
            .init();

        // The `log` macros above cover ordinary line logging; the playback
        // race and the AniList client additionally carry `tracing` spans
        // (request/race duration, candidate counts) that need their own
        // subscriber to go anywhere. A bare `fmt` layer at the same level
        // keeps both textures live without pulling in a collector.
        let tracing_level = if debug { tracing::Level::DEBUG } else { tracing::Level::INFO };
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing_level)
            .with_target(false)
            .try_init();

        log::info!("logging initialized (debug={debug})");
    });
}
