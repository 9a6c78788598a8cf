//! Server command-line settings

use std::path::PathBuf;

use clap::Parser;

/// Pomelo configuration service
#[derive(Debug, Parser)]
#[command(name = "pomelo-server", version, about)]
pub struct ServerArgs {
    /// Listen address
    #[arg(long, env = "POMELO_LISTEN", default_value = "0.0.0.0:8070")]
    pub listen: String,

    /// Long-poll hold time in seconds
    #[arg(long, env = "POMELO_HOLD_TIMEOUT", default_value_t = 60)]
    pub hold_timeout_secs: u64,

    /// Bound on concurrent parked long-poll waiters
    #[arg(long, env = "POMELO_MAX_WAITERS", default_value_t = 10_000)]
    pub max_waiters: usize,

    /// Directory of `{appId}+{cluster}+{namespace}.properties` files to
    /// publish as initial releases
    #[arg(long, env = "POMELO_SEED_DIR")]
    pub seed_dir: Option<PathBuf>,
}
