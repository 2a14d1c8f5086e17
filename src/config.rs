use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    /// Tokens carry no `exp` claim unless this is set.
    pub ttl_minutes: Option<i64>,
}

/// Which persistence backend the service talks to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub enum StoreKind {
    Postgres { url: String },
    Memory,
}

impl StoreKind {
    /// Backend name safe to log; never includes the connection string.
    pub fn label(&self) -> &'static str {
        match self {
            StoreKind::Postgres { .. } => "postgres",
            StoreKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreKind,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("ACCOUNT_STORE")
            .unwrap_or_else(|_| "postgres".into())
            .to_lowercase()
            .as_str()
        {
            "postgres" => StoreKind::Postgres {
                url: std::env::var("DATABASE_URL")
                    .map_err(|_| anyhow::anyhow!("DATABASE_URL not set"))?,
            },
            "memory" => StoreKind::Memory,
            other => anyhow::bail!("unknown ACCOUNT_STORE: {}", other),
        };
        let jwt = JwtConfig {
            secret: std::env::var("TOKEN_SECRET")
                .map_err(|_| anyhow::anyhow!("TOKEN_SECRET not set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "inkpost".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "inkpost-users".into()),
            ttl_minutes: parse_ttl_minutes(std::env::var("JWT_TTL_MINUTES").ok())?,
        };
        Ok(Self { store, jwt })
    }
}

/// Longest accepted token lifetime: one year.
pub const MAX_TTL_MINUTES: i64 = 365 * 24 * 60;

/// Unset or blank means tokens never expire; anything else must be a whole
/// number of minutes in `1..=MAX_TTL_MINUTES`.
fn parse_ttl_minutes(raw: Option<String>) -> anyhow::Result<Option<i64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let minutes: i64 = match raw.parse() {
        Ok(m) => m,
        Err(_) => anyhow::bail!("JWT_TTL_MINUTES is not a number: {:?}", raw),
    };
    if !(1..=MAX_TTL_MINUTES).contains(&minutes) {
        anyhow::bail!(
            "JWT_TTL_MINUTES must be between 1 and {}, got {}",
            MAX_TTL_MINUTES,
            minutes
        );
    }
    Ok(Some(minutes))
}
