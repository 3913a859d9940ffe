// common/src/utils.rs
use chrono::Utc;
use std::env;
use tracing::subscriber::SetGlobalDefaultError;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Install the global fmt subscriber. The level comes from `LOG_LEVEL`
/// (`trace`..`error`) and defaults to INFO.
pub fn setup_tracing() -> Result<(), SetGlobalDefaultError> {
    let level = env::var("LOG_LEVEL")
        .ok()
        .and_then(|value| value.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}

/// Wall clock in milliseconds since the epoch, the unit the canister stores
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
