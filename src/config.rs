use std::{env, fmt::Display, str::FromStr};

use tracing::{info, warn};

use crate::region::Region;

/// Runtime settings read from the environment (and `.env` when present).
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_korea: Option<String>,
    pub database_japan: Option<String>,
    pub database_us: Option<String>,
    pub database_taiwan: Option<String>,
    pub database_biz: Option<String>,
    pub youtube_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub mail_relay_url: Option<String>,
    pub mail_from: String,
    pub report_webhook_url: Option<String>,
    pub encryption_key: Option<String>,
    pub rate_limit_per_minute: Option<u32>,
    pub affiliated_bonus_rate: f64,
    pub unpaid_grace_days: i64,
}

impl Config {
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        Self {
            host: try_load("HOST", "0.0.0.0"),
            port: try_load("PORT", "3000"),
            database_korea: optional("DATABASE_URL_KOREA"),
            database_japan: optional("DATABASE_URL_JAPAN"),
            database_us: optional("DATABASE_URL_US"),
            database_taiwan: optional("DATABASE_URL_TAIWAN"),
            database_biz: optional("DATABASE_URL_BIZ"),
            youtube_api_key: optional("YOUTUBE_API_KEY"),
            gemini_api_key: optional("GEMINI_API_KEY"),
            gemini_model: try_load("GEMINI_MODEL", "gemini-2.5-flash"),
            mail_relay_url: optional("MAIL_RELAY_URL"),
            mail_from: try_load("MAIL_FROM", "noreply@cnec.co.kr"),
            report_webhook_url: optional("REPORT_WEBHOOK_URL"),
            encryption_key: optional("ENCRYPTION_KEY"),
            rate_limit_per_minute: optional("RATE_LIMIT_PER_MINUTE").and_then(|v| {
                v.parse()
                    .map_err(|e| warn!("Invalid RATE_LIMIT_PER_MINUTE value: {e}"))
                    .ok()
            }),
            affiliated_bonus_rate: try_load("AFFILIATED_BONUS_RATE", "10"),
            unpaid_grace_days: try_load("UNPAID_GRACE_DAYS", "3"),
        }
    }

    /// Connection string for a region, if one was configured.
    pub fn database_url(&self, region: Region) -> Option<&str> {
        match region {
            Region::Korea => self.database_korea.as_deref(),
            Region::Japan => self.database_japan.as_deref(),
            Region::Us => self.database_us.as_deref(),
            Region::Taiwan => self.database_taiwan.as_deref(),
            Region::Biz => self.database_biz.as_deref(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    match raw.parse() {
        Ok(value) => value,
        Err(e) => {
            warn!("Invalid {key} value ({e}), using default: {default}");
            // defaults are literals above and always parse
            default.parse().unwrap_or_else(|_| unreachable!("default for {key} must parse"))
        }
    }
}
