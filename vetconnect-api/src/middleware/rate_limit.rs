/// Rate limiting for the unauthenticated auth endpoints
///
/// Register, login and resend-verification are limited per client IP with a
/// token bucket: capacity `AUTH_RATE_LIMIT_PER_MINUTE`, refilled evenly over a
/// minute.
///
/// # Backends
///
/// - **Redis** (`REDIS_URL` set): an atomic Lua script keeps the bucket in a
///   hash so every API instance shares the same limit.
/// - **In-process** otherwise: a mutex-guarded map of buckets.
///
/// If Redis is unreachable the request is allowed and the failure logged.
///
/// # Client key
///
/// Buckets are keyed on the socket peer address. `X-Forwarded-For` and
/// `X-Real-IP` are only honoured when `TRUST_PROXY` is set, since clients
/// can send any value there.
///
/// The in-process map holds at most [`MAX_BUCKETS`] keys. Once full, new
/// keys share a single overflow bucket until refilled buckets are swept.
///
/// # Response
///
/// `429 Too Many Requests` with `Retry-After`; allowed responses carry
/// `X-RateLimit-Limit` and `X-RateLimit-Remaining`.

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::request_log::ClientIp;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{request::Parts, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Upper bound on in-process buckets
pub const MAX_BUCKETS: usize = 10_000;

/// Key shared by new clients while the bucket map is full
const OVERFLOW_KEY: &str = "overflow";

/// Minimum seconds between sweeps of refilled buckets
const SWEEP_INTERVAL_SECS: f64 = 1.0;

/// Bucket parameters
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    pub requests_per_minute: u32,

    /// Tokens per second
    pub refill_rate: f64,

    pub bucket_capacity: u32,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let requests_per_minute = requests_per_minute.max(1);
        RateLimit {
            requests_per_minute,
            refill_rate: requests_per_minute as f64 / 60.0,
            bucket_capacity: requests_per_minute,
        }
    }
}

/// Outcome of one check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitResult {
    pub ok: bool,
    pub remaining: u32,

    /// Seconds until a token is available (0 when allowed)
    pub reset_after: u64,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: f64,
}

impl TokenBucket {
    fn new(capacity: u32, now: f64) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    fn refill(&mut self, rate: f64, capacity: u32, now: f64) {
        let elapsed_secs = (now - self.last_refill).max(0.0);
        self.tokens = (self.tokens + elapsed_secs * rate).min(capacity as f64);
        self.last_refill = now;
    }

    fn try_consume(&mut self, count: f64) -> bool {
        if self.tokens >= count {
            self.tokens -= count;
            true
        } else {
            false
        }
    }

    fn seconds_until_available(&self, count: f64, rate: f64) -> u64 {
        let deficit = count - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

#[derive(Debug, Default)]
struct LocalBuckets {
    buckets: HashMap<String, TokenBucket>,
    last_sweep: f64,
}

/// Per-key token buckets backed by Redis or process memory
pub struct RateLimiter {
    limit: RateLimit,
    redis: Option<redis::Client>,
    local: Mutex<LocalBuckets>,
}

impl RateLimiter {
    /// In-process limiter
    pub fn in_memory(limit: RateLimit) -> Self {
        Self {
            limit,
            redis: None,
            local: Mutex::new(LocalBuckets::default()),
        }
    }

    /// Redis-backed limiter
    ///
    /// # Errors
    ///
    /// Fails if the URL cannot be parsed; no connection is made here.
    pub fn with_redis(limit: RateLimit, redis_url: &str) -> Result<Self, redis::RedisError> {
        Ok(Self {
            limit,
            redis: Some(redis::Client::open(redis_url)?),
            local: Mutex::new(LocalBuckets::default()),
        })
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Consumes one token for `key`
    pub async fn check(&self, key: &str) -> RateLimitResult {
        if let Some(client) = &self.redis {
            match check_rate_limit_redis(client, key, self.limit).await {
                Ok(result) => return result,
                Err(e) => {
                    tracing::warn!(error = %e, "Redis rate limit check failed, allowing request");
                    return RateLimitResult {
                        ok: true,
                        remaining: self.limit.bucket_capacity,
                        reset_after: 0,
                    };
                }
            }
        }

        self.check_local(key, now_secs())
    }

    fn check_local(&self, key: &str, now: f64) -> RateLimitResult {
        let limit = self.limit;
        let mut local = match self.local.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let LocalBuckets {
            buckets,
            last_sweep,
        } = &mut *local;

        let mut key = key;
        if buckets.len() >= MAX_BUCKETS && !buckets.contains_key(key) {
            // Fully refilled buckets carry no state worth keeping
            if now - *last_sweep >= SWEEP_INTERVAL_SECS {
                *last_sweep = now;
                let full_after = limit.bucket_capacity as f64 / limit.refill_rate;
                buckets.retain(|_, b| now - b.last_refill < full_after);
            }
            if buckets.len() >= MAX_BUCKETS {
                key = OVERFLOW_KEY;
            }
        }

        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(limit.bucket_capacity, now));
        bucket.refill(limit.refill_rate, limit.bucket_capacity, now);

        if bucket.try_consume(1.0) {
            RateLimitResult {
                ok: true,
                remaining: bucket.tokens.floor() as u32,
                reset_after: 0,
            }
        } else {
            RateLimitResult {
                ok: false,
                remaining: 0,
                reset_after: bucket.seconds_until_available(1.0, limit.refill_rate).max(1),
            }
        }
    }
}

fn now_secs() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

async fn check_rate_limit_redis(
    client: &redis::Client,
    key: &str,
    rate_limit: RateLimit,
) -> Result<RateLimitResult, redis::RedisError> {
    let mut conn = client.get_multiplexed_async_connection().await?;

    // Lua script for atomic token bucket operations
    let script = redis::Script::new(
        r#"
        local key = KEYS[1]
        local capacity = tonumber(ARGV[1])
        local refill_rate = tonumber(ARGV[2])
        local now = tonumber(ARGV[3])

        local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
        local tokens = tonumber(bucket[1])
        local last_refill = tonumber(bucket[2])

        if not tokens then
            tokens = capacity
            last_refill = now
        end

        local elapsed = math.max(0, now - last_refill)
        tokens = math.min(capacity, tokens + (elapsed * refill_rate))

        if tokens >= 1 then
            tokens = tokens - 1
            redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
            redis.call('EXPIRE', key, 120)
            return {1, math.floor(tokens), 0}
        else
            redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
            redis.call('EXPIRE', key, 120)
            return {0, 0, math.ceil((1 - tokens) / refill_rate)}
        end
        "#,
    );

    let result: Vec<i64> = script
        .key(format!("ratelimit:auth:{}", key))
        .arg(rate_limit.bucket_capacity)
        .arg(rate_limit.refill_rate)
        .arg(now_secs())
        .invoke_async(&mut conn)
        .await?;

    Ok(RateLimitResult {
        ok: result.first().copied() == Some(1),
        remaining: result.get(1).copied().unwrap_or(0).max(0) as u32,
        reset_after: result.get(2).copied().unwrap_or(1).max(0) as u64,
    })
}

fn create_rate_limit_error(result: RateLimitResult) -> ApiError {
    ApiError::RateLimitExceeded {
        retry_after: result.reset_after,
        message: format!(
            "Too many attempts. Try again in {} seconds.",
            result.reset_after
        ),
    }
}

/// Bucket key for a request
///
/// The peer address unless `trust_proxy` is set, in which case the
/// forwarded client address is used.
pub fn client_key(parts: &Parts, trust_proxy: bool) -> String {
    if trust_proxy {
        return ClientIp::from_parts(parts).0;
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware limiting requests per client IP
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (parts, body) = request.into_parts();
    let ip = client_key(&parts, state.config.rate_limit.trust_proxy);
    let request = Request::from_parts(parts, body);

    let result = state.rate_limiter.check(&ip).await;

    if !result.ok {
        tracing::warn!(ip = %ip, path = %request.uri().path(), "Rate limit exceeded");
        return Err(create_rate_limit_error(result));
    }

    let mut response = next.run(request).await;

    let limit = state.rate_limiter.limit();
    response.headers_mut().insert(
        "X-RateLimit-Limit",
        HeaderValue::from(limit.requests_per_minute),
    );
    response
        .headers_mut()
        .insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));

    Ok(response)
}
