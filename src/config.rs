use std::collections::BTreeMap;
use std::env::var;
use std::time::Duration;

use anyhow::Context;
use dotenvy::dotenv;

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SMTP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_EMPTY_QUEUE_SLEEP_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-send timeout so a hung server cannot block a pass indefinitely.
    pub timeout: Duration,
    /// Headers applied to every outgoing message.
    pub extra_headers: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub smtp: SmtpConfig,
    /// Sleep between empty-queue checks in the service loop.
    pub empty_queue_sleep: Duration,
    /// How long a pass may wait for the send lock. Unset means no wait.
    pub lock_wait_timeout: Option<Duration>,
    /// Whitelist regex patterns. Unset means every address is allowed.
    pub whitelist_patterns: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from the environment, reading a `.env` file first
    /// when one is present.
    pub fn from_env() -> anyhow::Result<Config> {
        let _ = dotenv();

        Ok(Config {
            database_url: var("DATABASE_URL").context("DATABASE_URL must be set")?,
            smtp: SmtpConfig {
                host: var("SMTP_HOST").context("SMTP_HOST must be set")?,
                port: optional_parsed("SMTP_PORT")?.unwrap_or(DEFAULT_SMTP_PORT),
                username: var("SMTP_USERNAME").ok(),
                password: var("SMTP_PASSWORD").ok(),
                timeout: Duration::from_secs(
                    optional_parsed("SMTP_TIMEOUT")?.unwrap_or(DEFAULT_SMTP_TIMEOUT_SECS),
                ),
                extra_headers: parse_extra_headers()?,
            },
            empty_queue_sleep: Duration::from_secs(
                optional_parsed("MAILER_EMPTY_QUEUE_SLEEP")?
                    .unwrap_or(DEFAULT_EMPTY_QUEUE_SLEEP_SECS),
            ),
            lock_wait_timeout: optional_parsed("MAILER_LOCK_WAIT_TIMEOUT")?
                .map(Duration::from_secs),
            whitelist_patterns: var("MAILER_WHITELIST").ok().map(|raw| {
                raw.split(',')
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect()
            }),
        })
    }
}

fn optional_parsed<T: std::str::FromStr>(name: &str) -> anyhow::Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name) {
        Ok(raw) => {
            let parsed = raw
                .parse::<T>()
                .with_context(|| format!("failed to parse {name} env param"))?;
            Ok(Some(parsed))
        }
        Err(_) => Ok(None),
    }
}

/// `MAILER_EXTRA_HEADERS` is a JSON object of header name to value, e.g.
/// `{"X-MC-Track": "opens,clicks"}`.
fn parse_extra_headers() -> anyhow::Result<Vec<(String, String)>> {
    match var("MAILER_EXTRA_HEADERS") {
        Ok(raw) => {
            let headers: BTreeMap<String, String> = serde_json::from_str(&raw)
                .context("MAILER_EXTRA_HEADERS must be a JSON object of strings")?;
            Ok(headers.into_iter().collect())
        }
        Err(_) => Ok(Vec::new()),
    }
}
