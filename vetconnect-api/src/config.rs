/// Configuration management for the API server
///
/// Loaded from environment variables, with `.env` support for development.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:5000`)
/// - `APP_ENV`: `production` turns on HSTS and `Secure` cookies
/// - `FRONTEND_URL`: CORS origin and base of verification links
/// - `DATABASE_URL` (required), `DATABASE_MAX_CONNECTIONS`
/// - `JWT_SECRET` (required, at least 32 characters), `JWT_EXPIRES_MINUTES`
/// - `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM`
/// - `VERIFICATION_TTL_MINUTES`
/// - `AUTH_RATE_LIMIT_PER_MINUTE`, `REDIS_URL`, `TRUST_PROXY`
/// - `CHAT_COOLDOWN_SECS`, `CHAT_LLM_URL`, `CHAT_LLM_API_KEY`, `CHAT_LLM_MODEL`

use std::env;
use std::str::FromStr;

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn is_production(&self) -> bool {
        *self == AppEnv::Production
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub rate_limit: RateLimitConfig,
    pub chat: ChatConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub environment: AppEnv,

    /// Origin of the web client, without trailing slash
    pub frontend_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub expires_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// `None` logs verification links instead of sending mail
    pub smtp: Option<SmtpConfig>,
    pub from: String,
    pub verification_ttl_minutes: i64,
}

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests per client IP per minute on register, login and resend
    pub auth_per_minute: u32,

    /// Shared Redis backend; in-process buckets when unset
    pub redis_url: Option<String>,

    /// Key on `X-Forwarded-For` instead of the peer address
    pub trust_proxy: bool,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible chat completions endpoint
    pub url: String,
    pub api_key: Option<String>,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub cooldown_secs: u64,
    pub llm: Option<LlmConfig>,
}

impl Config {
    /// Loads configuration from the environment
    ///
    /// # Errors
    ///
    /// Fails if a required variable is missing, a number does not parse or
    /// `JWT_SECRET` is shorter than 32 characters.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_source(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup
    pub fn from_source<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let environment = match or("APP_ENV", "development").to_lowercase().as_str() {
            "production" | "prod" => AppEnv::Production,
            _ => AppEnv::Development,
        };

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = get("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let smtp = match get("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: parse(&or("SMTP_PORT", "587"), "SMTP_PORT")?,
                username: or("SMTP_USERNAME", ""),
                password: or("SMTP_PASSWORD", ""),
            }),
            None => None,
        };

        let llm = get("CHAT_LLM_URL").map(|url| LlmConfig {
            url,
            api_key: get("CHAT_LLM_API_KEY"),
            model: or("CHAT_LLM_MODEL", "gpt-4o-mini"),
        });

        Ok(Self {
            api: ApiConfig {
                host: or("API_HOST", "0.0.0.0"),
                port: parse(&or("API_PORT", "5000"), "API_PORT")?,
                environment,
                frontend_url: or("FRONTEND_URL", "http://localhost:3000")
                    .trim_end_matches('/')
                    .to_string(),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse(&or("DATABASE_MAX_CONNECTIONS", "10"), "DATABASE_MAX_CONNECTIONS")?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                expires_minutes: parse(&or("JWT_EXPIRES_MINUTES", "60"), "JWT_EXPIRES_MINUTES")?,
            },
            email: EmailConfig {
                smtp,
                from: or("EMAIL_FROM", "VetConnect <no-reply@vetconnect.local>"),
                verification_ttl_minutes: parse(
                    &or("VERIFICATION_TTL_MINUTES", "60"),
                    "VERIFICATION_TTL_MINUTES",
                )?,
            },
            rate_limit: RateLimitConfig {
                auth_per_minute: parse(&or("AUTH_RATE_LIMIT_PER_MINUTE", "10"), "AUTH_RATE_LIMIT_PER_MINUTE")?,
                redis_url: get("REDIS_URL"),
                trust_proxy: parse(&or("TRUST_PROXY", "false"), "TRUST_PROXY")?,
            },
            chat: ChatConfig {
                cooldown_secs: parse(&or("CHAT_COOLDOWN_SECS", "3"), "CHAT_COOLDOWN_SECS")?,
                llm,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn is_production(&self) -> bool {
        self.api.environment.is_production()
    }
}

fn parse<T>(value: &str, key: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| anyhow::anyhow!("{} is invalid: {}", key, e))
}
