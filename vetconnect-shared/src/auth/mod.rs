/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`jwt`]: HS256 session tokens
/// - [`middleware`]: Bearer extraction and blacklist-checked authentication
/// - [`authorization`]: Role and ownership checks
///
/// # Example
///
/// ```no_run
/// use vetconnect_shared::auth::password::{hash_password, verify_password};
/// use vetconnect_shared::auth::jwt::{create_token, Claims};
/// use vetconnect_shared::models::user::UserRole;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Fluffy&Rex2024!")?;
/// assert!(verify_password("Fluffy&Rex2024!", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), "owner@example.com".into(), UserRole::User);
/// let token = create_token(&claims, "secret-key-that-is-at-least-32-bytes")?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
