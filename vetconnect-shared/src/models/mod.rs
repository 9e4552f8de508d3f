/// Database models for VetConnect
///
/// # Models
///
/// - `user`: Client and admin accounts, email verification
/// - `appointment`: Bookings with workflow and schedule statuses
/// - `audit_log`: Append-only audit trail
/// - `blacklisted_token`: Revoked JWTs awaiting natural expiry
///
/// # Example
///
/// ```no_run
/// use vetconnect_shared::models::blacklisted_token::BlacklistedToken;
/// use vetconnect_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let removed = BlacklistedToken::delete_expired(&pool).await?;
/// println!("removed {} expired tokens", removed);
/// # Ok(())
/// # }
/// ```

pub mod appointment;
pub mod audit_log;
pub mod blacklisted_token;
pub mod user;
