use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use dotenvy::dotenv;
use url::Url;

pub const DEFAULT_STATUS_TABLE: &str = "mastodon_statuses";
pub const DEFAULT_PAGE_SIZE: u32 = 40;
pub const DEFAULT_RETRY_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Origin of the Mastodon instance to poll.
    pub api_base_url: Url,
    /// Static bearer token. When absent, the auth service fields below must
    /// be set and tokens are fetched from the external auth service instead.
    pub access_token: Option<String>,
    pub auth_service_url: Option<Url>,
    pub user_email: Option<String>,
    pub user_pass: Option<String>,
    pub database_url: String,
    /// Logical collection the run writes into.
    pub status_table: String,
    pub run_id: String,
    pub page_size: u32,
    pub retry_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup so tests don't race on process env.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url: Url = var("MASTODON_API_URL")
            .context("MASTODON_API_URL must be set")?
            .parse()
            .context("MASTODON_API_URL must be a valid URL")?;

        let access_token = var("MASTODON_ACCESS_TOKEN");
        let auth_service_url = var("AUTH_SERVICE_URL")
            .map(|s| s.parse::<Url>().context("AUTH_SERVICE_URL must be a valid URL"))
            .transpose()?;
        let user_email = var("MASTODON_USER_EMAIL");
        let user_pass = var("MASTODON_USER_PASS");

        let has_auth_service =
            auth_service_url.is_some() && user_email.is_some() && user_pass.is_some();
        if access_token.is_none() && !has_auth_service {
            bail!(
                "no credential source configured: set MASTODON_ACCESS_TOKEN, or \
                 AUTH_SERVICE_URL with MASTODON_USER_EMAIL and MASTODON_USER_PASS"
            );
        }

        let status_table =
            var("STATUS_TABLE").unwrap_or_else(|| DEFAULT_STATUS_TABLE.to_string());
        if !valid_table_name(&status_table) {
            bail!("STATUS_TABLE `{status_table}` is not a valid SQL identifier");
        }

        let page_size: u32 = var("PAGE_SIZE")
            .unwrap_or_else(|| DEFAULT_PAGE_SIZE.to_string())
            .parse()
            .context("PAGE_SIZE must be a positive number")?;
        if page_size == 0 {
            bail!("PAGE_SIZE must be at least 1");
        }
        let retry_interval_secs: u64 = var("RETRY_INTERVAL_SECS")
            .unwrap_or_else(|| DEFAULT_RETRY_INTERVAL_SECS.to_string())
            .parse()
            .context("RETRY_INTERVAL_SECS must be a number of seconds")?;

        Ok(Self {
            api_base_url,
            access_token,
            auth_service_url,
            user_email,
            user_pass,
            database_url: var("DATABASE_URL").context("DATABASE_URL must be set")?,
            status_table,
            run_id: var("RUN_ID").unwrap_or_else(default_run_id),
            page_size,
            retry_interval: Duration::from_secs(retry_interval_secs),
        })
    }
}

/// Run ids default to the start timestamp, matching how operators partition
/// ingestion sessions: `20260824_153000`.
fn default_run_id() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Table names are interpolated into DDL/DML, so they must be plain
/// identifiers rather than bind parameters.
fn valid_table_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("MASTODON_API_URL", "https://mastodon.example"),
            ("MASTODON_ACCESS_TOKEN", "tok"),
            ("DATABASE_URL", "postgres://localhost/observatory"),
        ])
    }

    fn lookup<'a>(vars: &'a HashMap<&'a str, &'a str>) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| vars.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults_applied() {
        let vars = base_vars();
        let cfg = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(cfg.status_table, "mastodon_statuses");
        assert_eq!(cfg.page_size, 40);
        assert_eq!(cfg.retry_interval, Duration::from_secs(60));
        // Derived run id looks like 20260824_153000.
        assert_eq!(cfg.run_id.len(), 15);
        assert_eq!(cfg.run_id.as_bytes()[8], b'_');
    }

    #[test]
    fn missing_database_url_is_fatal() {
        let mut vars = base_vars();
        vars.remove("DATABASE_URL");
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));
    }

    #[test]
    fn missing_api_url_is_fatal() {
        let mut vars = base_vars();
        vars.remove("MASTODON_API_URL");
        assert!(Config::from_lookup(lookup(&vars)).is_err());
    }

    #[test]
    fn requires_some_credential_source() {
        let mut vars = base_vars();
        vars.remove("MASTODON_ACCESS_TOKEN");
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("credential source"));
    }

    #[test]
    fn auth_service_triple_is_accepted() {
        let mut vars = base_vars();
        vars.remove("MASTODON_ACCESS_TOKEN");
        vars.insert("AUTH_SERVICE_URL", "http://localhost:8000");
        vars.insert("MASTODON_USER_EMAIL", "op@example.com");
        vars.insert("MASTODON_USER_PASS", "hunter2");
        let cfg = Config::from_lookup(lookup(&vars)).unwrap();
        assert!(cfg.access_token.is_none());
        assert!(cfg.auth_service_url.is_some());
    }

    #[test]
    fn rejects_invalid_table_identifier() {
        let mut vars = base_vars();
        vars.insert("STATUS_TABLE", "statuses; drop table users");
        assert!(Config::from_lookup(lookup(&vars)).is_err());

        vars.insert("STATUS_TABLE", "1statuses");
        assert!(Config::from_lookup(lookup(&vars)).is_err());

        vars.insert("STATUS_TABLE", "toots_2026");
        assert!(Config::from_lookup(lookup(&vars)).is_ok());
    }

    #[test]
    fn rejects_zero_page_size() {
        let mut vars = base_vars();
        vars.insert("PAGE_SIZE", "0");
        let err = Config::from_lookup(lookup(&vars)).unwrap_err();
        assert!(err.to_string().contains("PAGE_SIZE"));

        vars.insert("PAGE_SIZE", "1");
        assert!(Config::from_lookup(lookup(&vars)).is_ok());
    }

    #[test]
    fn overrides_parsed() {
        let mut vars = base_vars();
        vars.insert("PAGE_SIZE", "100");
        vars.insert("RETRY_INTERVAL_SECS", "5");
        vars.insert("RUN_ID", "backfill_jan");
        let cfg = Config::from_lookup(lookup(&vars)).unwrap();
        assert_eq!(cfg.page_size, 100);
        assert_eq!(cfg.retry_interval, Duration::from_secs(5));
        assert_eq!(cfg.run_id, "backfill_jan");
    }
}
