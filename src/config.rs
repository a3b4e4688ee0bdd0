use std::{env, time::Duration};

/// Token lifetime used when `JWT_EXPIRE` is absent or unparsable.
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and
/// shared with handlers and services through the application state.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // S3-compatible storage endpoint URL (MinIO in local).
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_key: String,
    pub s3_secret: String,
    // Bucket holding thumbnails and lesson videos.
    pub s3_bucket: String,
    // Runtime environment marker. Controls the development bypass header.
    pub env: Env,
    // Shared secret used to sign and verify bearer tokens. Never rotated at runtime.
    pub jwt_secret: String,
    // Lifetime of every issued token.
    pub token_ttl: Duration,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Argon2id cost parameters for new credentials.
    pub password: PasswordParams,
    // Optional admin account ensured at startup.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Env
///
/// Defines the runtime context, used to switch between development conveniences
/// (in-memory store, MinIO, `x-user-id` bypass) and hardened production settings.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// PasswordParams
///
/// Argon2id cost. The `Default` matches the Argon2 crate's recommended values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PasswordParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            memory_kib: 19456,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl PasswordParams {
    /// Minimal cost, for test scaffolding only.
    pub fn light() -> Self {
        Self {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// BootstrapAdmin
#[derive(Clone, Debug)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl Default for AppConfig {
    /// default
    ///
    /// Provides a safe, non-panicking AppConfig instance primarily used for test setup.
    /// Uses the in-memory store and a light password-hash cost.
    fn default() -> Self {
        Self {
            db_url: None,
            s3_endpoint: "http://localhost:9000".to_string(),
            s3_region: "us-east-1".to_string(),
            s3_key: "admin".to_string(),
            s3_secret: "password".to_string(),
            s3_bucket: "lms-test".to_string(),
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            token_ttl: DEFAULT_TOKEN_TTL,
            bind_addr: "127.0.0.1:0".to_string(),
            password: PasswordParams::light(),
            bootstrap_admin: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads all parameters from environment variables and implements the
    /// **fail-fast** principle.
    ///
    /// # Panics
    /// Panics if a variable required for the current runtime environment
    /// (Production: `DATABASE_URL`, `JWT_SECRET`, S3 credentials) is not set.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = match env {
            Env::Production => {
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production.")
            }
            Env::Local => env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
        };

        let token_ttl = match env::var("JWT_EXPIRE") {
            Ok(raw) => parse_duration(&raw).unwrap_or_else(|| {
                tracing::warn!("JWT_EXPIRE='{}' is not a valid duration, using 30d", raw);
                DEFAULT_TOKEN_TTL
            }),
            Err(_) => DEFAULT_TOKEN_TTL,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let password = password_params_from_env();
        let bootstrap_admin = match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) => Some(BootstrapAdmin { email, password }),
            _ => None,
        };

        match env {
            Env::Local => Self {
                env: Env::Local,
                // Without a database URL the service runs on the in-memory store.
                db_url: env::var("DATABASE_URL").ok(),
                s3_endpoint: env::var("S3_ENDPOINT")
                    .unwrap_or_else(|_| "http://localhost:9000".to_string()),
                s3_region: "us-east-1".to_string(),
                s3_key: "admin".to_string(),
                s3_secret: "password".to_string(),
                s3_bucket: env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "lms-uploads".to_string()),
                jwt_secret,
                token_ttl,
                bind_addr,
                password,
                bootstrap_admin,
            },
            Env::Production => Self {
                env: Env::Production,
                db_url: Some(
                    env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod"),
                ),
                s3_endpoint: env::var("S3_ENDPOINT").expect("FATAL: S3_ENDPOINT required in prod"),
                s3_region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                s3_key: env::var("S3_ACCESS_KEY").expect("FATAL: S3_ACCESS_KEY required in prod"),
                s3_secret: env::var("S3_SECRET_KEY").expect("FATAL: S3_SECRET_KEY required in prod"),
                s3_bucket: env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "lms-uploads".to_string()),
                jwt_secret,
                token_ttl,
                bind_addr,
                password,
                bootstrap_admin,
            },
        }
    }
}

/// parse_duration
///
/// Accepts `30d`, `12h`, `45m`, `90s` or a bare number of seconds.
/// Returns `None` for anything else, including zero.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    let (digits, unit_secs) = match raw.char_indices().last() {
        Some((idx, 'd')) => (&raw[..idx], 24 * 60 * 60),
        Some((idx, 'h')) => (&raw[..idx], 60 * 60),
        Some((idx, 'm')) => (&raw[..idx], 60),
        Some((idx, 's')) => (&raw[..idx], 1),
        _ => (raw, 1),
    };

    let value: u64 = digits.parse().ok()?;
    let secs = value.checked_mul(unit_secs)?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn password_params_from_env() -> PasswordParams {
    let defaults = PasswordParams::default();
    let read = |key: &str, fallback: u32| {
        env::var(key)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(fallback)
    };
    PasswordParams {
        memory_kib: read("ARGON2_M", defaults.memory_kib),
        iterations: read("ARGON2_T", defaults.iterations),
        parallelism: read("ARGON2_P", defaults.parallelism),
    }
}
