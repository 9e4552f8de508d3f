/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL` (required)
/// - `DATABASE_MAX_CONNECTIONS` (default 2)
/// - `BLACKLIST_SWEEP_INTERVAL_SECS` (default 3600)

use std::env;
use std::time::Duration;

/// Default gap between blacklist sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub sweep_interval: Duration,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("DATABASE_MAX_CONNECTIONS is invalid: {}", e))?,
            None => 2,
        };

        let sweep_interval = match get("BLACKLIST_SWEEP_INTERVAL_SECS") {
            Some(v) => {
                let secs: u64 = v
                    .trim()
                    .parse()
                    .map_err(|e| anyhow::anyhow!("BLACKLIST_SWEEP_INTERVAL_SECS is invalid: {}", e))?;
                if secs == 0 {
                    anyhow::bail!("BLACKLIST_SWEEP_INTERVAL_SECS must be greater than zero");
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_SWEEP_INTERVAL,
        };

        Ok(Self {
            database_url,
            max_connections,
            sweep_interval,
        })
    }
}
