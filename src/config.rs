use std::env;
use std::time::Duration;

use anyhow::{Context, anyhow};

use crate::session::{Role, SessionContext};

#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub request_timeout: Duration,
    pub session: SessionContext,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let api_base_url = lookup("API_BASE_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8080/api/v1".to_string())
            .trim_end_matches('/')
            .to_string();
        let access_token = lookup("ACCESS_TOKEN").ok_or_else(|| anyhow!("ACCESS_TOKEN is not set"))?;
        let user_id = lookup("USER_ID")
            .ok_or_else(|| anyhow!("USER_ID is not set"))?
            .trim()
            .parse::<i64>()
            .context("USER_ID must be an integer")?;
        let role = match lookup("USER_ROLE") {
            Some(raw) => raw.parse::<Role>().map_err(|e| anyhow!(e))?,
            None => Role::Student,
        };
        let timeout_secs = lookup("REQUEST_TIMEOUT_SECS")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(15);

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            session: SessionContext::new(access_token, user_id, role),
        })
    }
}
