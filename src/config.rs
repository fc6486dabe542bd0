use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    /// Requests per second allowed per client IP; 0 disables rate limiting.
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
    pub max_body_bytes: usize,
    /// How long a resolved API token stays cached.
    pub auth_cache_ttl_secs: u64,
    /// When set, an admin with this token is ensured at startup.
    pub bootstrap_admin_token: Option<String>,
    pub bootstrap_admin_email: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: std::env::var("DB_URL")
                .or_else(|_| std::env::var("DATABASE_URL"))
                .map_err(|_| {
                    anyhow::anyhow!("DB_URL or DATABASE_URL environment variable required")
                })
                .and_then(|url| {
                    if url.trim().is_empty() {
                        anyhow::bail!("DB_URL cannot be empty");
                    }
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            rate_limit_per_second: parse_or_default("RATE_LIMIT_PER_SECOND", 10)?,
            rate_limit_burst: parse_or_default("RATE_LIMIT_BURST", 20)?,
            max_body_bytes: parse_or_default("MAX_BODY_BYTES", 1024 * 1024)?,
            auth_cache_ttl_secs: parse_or_default("AUTH_CACHE_TTL_SECS", 300)?,
            bootstrap_admin_token: std::env::var("BOOTSTRAP_ADMIN_TOKEN")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|token| {
                    if token.len() < 16 {
                        anyhow::bail!("BOOTSTRAP_ADMIN_TOKEN must be at least 16 characters");
                    }
                    Ok(token)
                })
                .transpose()?,
            bootstrap_admin_email: std::env::var("BOOTSTRAP_ADMIN_EMAIL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "admin@localhost".to_string()),
        };

        if config.rate_limit_per_second > 0 && config.rate_limit_burst == 0 {
            anyhow::bail!("RATE_LIMIT_BURST must be greater than 0 when rate limiting is enabled");
        }

        // Log successful configuration load (without sensitive values)
        tracing::debug!("Database: {}", database_location(&config.database_url));
        tracing::debug!("Server Port: {}", config.port);
        if config.rate_limit_per_second == 0 {
            tracing::warn!("Rate limiting disabled (RATE_LIMIT_PER_SECOND=0)");
        }
        if config.bootstrap_admin_token.is_some() {
            tracing::info!(
                "Bootstrap admin configured for {}",
                config.bootstrap_admin_email
            );
        }

        Ok(config)
    }
}

fn parse_or_default<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} must be a valid non-negative number", key)),
        _ => Ok(default),
    }
}

/// Scheme, host and database name of a connection URL, with any
/// `user:password@` part removed.
fn database_location(url: &str) -> String {
    let (scheme, rest) = url.split_once("://").unwrap_or(("", url));
    let location = rest.rsplit_once('@').map_or(rest, |(_, host)| host);
    format!("{}://{}", scheme, location)
}
