/// Blacklist sweeper
///
/// Revoked tokens only need to stay in `blacklisted_tokens` until the JWT
/// itself expires. The sweeper deletes those rows on a fixed interval so
/// the table stays small.
///
/// # Behavior
///
/// - First sweep runs immediately on start, then once per interval
/// - A failed sweep is logged and retried on the next tick
/// - The loop exits as soon as the shutdown token is cancelled
///
/// # Example
///
/// ```no_run
/// use vetconnect_worker::sweeper::BlacklistSweeper;
/// use std::time::Duration;
/// # use sqlx::PgPool;
/// # async fn example(pool: PgPool) {
/// let sweeper = BlacklistSweeper::new(pool, Duration::from_secs(3600));
/// let shutdown = sweeper.shutdown_token();
///
/// let handle = tokio::spawn(async move { sweeper.run().await });
///
/// shutdown.cancel();
/// handle.await.ok();
/// # }
/// ```

use sqlx::PgPool;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use vetconnect_shared::models::blacklisted_token::BlacklistedToken;

pub struct BlacklistSweeper {
    pool: PgPool,
    interval: Duration,
    shutdown_token: CancellationToken,
}

impl BlacklistSweeper {
    pub fn new(pool: PgPool, interval: Duration) -> Self {
        Self {
            pool,
            interval,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`run`](Self::run) when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Deletes expired revocations once and returns how many were removed
    pub async fn sweep_once(&self) -> Result<u64, sqlx::Error> {
        BlacklistedToken::delete_expired(&self.pool).await
    }

    /// Sweeps until shutdown, returning the number of completed sweeps
    pub async fn run(&self) -> u64 {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Blacklist sweeper starting"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut completed = 0;

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown_token.cancelled() => break,

                _ = ticker.tick() => {
                    let result = tokio::select! {
                        biased;
                        _ = self.shutdown_token.cancelled() => break,
                        result = self.sweep_once() => result,
                    };

                    match result {
                        Ok(0) => {
                            tracing::debug!("No expired tokens to remove");
                            completed += 1;
                        }
                        Ok(removed) => {
                            tracing::info!(removed, "Removed expired blacklisted tokens");
                            completed += 1;
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Blacklist sweep failed");
                        }
                    }
                }
            }
        }

        tracing::info!(sweeps = completed, "Blacklist sweeper shut down");
        completed
    }
}
