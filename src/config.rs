use serde::Deserialize;

use crate::types::Credentials;

/// When the session token is requested during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPolicy {
    /// One token shared across instruments, replaced when it nears the end of
    /// the lifetime the provider gave it.
    PerRun,
    /// A fresh token before every instrument.
    PerInstrument,
}

#[derive(Clone, Deserialize)]
pub struct Settings {
    // Spreadsheet store
    pub airtable_url: String,
    pub airtable_base: String,
    pub airtable_key: String,
    pub epics_table: String,
    pub epic_field: String,
    pub flag_field: String,
    pub enabled_marker: String,
    pub results_table: String,

    // Trading-data provider
    pub ig_url: String,
    pub ig_user: String,
    pub ig_pw: String,
    pub ig_api_key: String,
    pub ig_account_id: String,

    // Pacing
    pub request_delay_ms: u64,
    pub token_policy: TokenPolicy,
    pub http_timeout_sec: u64,

    // Schedule
    pub run_interval_sec: u64,
    pub run_once: bool,

    // Stats
    pub stats_jsonl_path: Option<String>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let c = Self::defaults()?
            .add_source(config::Environment::default())
            .build()?;
        Ok(c.try_deserialize()?)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("airtable_url", "https://api.airtable.com/v0")?
            .set_default("epics_table", "EPICS")?
            .set_default("epic_field", "EPIC")?
            .set_default("flag_field", "Pull_Data")?
            .set_default("enabled_marker", "TRUE")?
            .set_default("results_table", "Indizes")?
            .set_default("ig_url", "https://api.ig.com/gateway/deal")?
            .set_default("request_delay_ms", 3000)?
            .set_default("token_policy", "per_run")?
            .set_default("http_timeout_sec", 30)?
            .set_default("run_interval_sec", 3600)?
            .set_default("run_once", false)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.ig_user.clone(),
            password: self.ig_pw.clone(),
            api_key: self.ig_api_key.clone(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("airtable_url", &self.airtable_url)
            .field("airtable_base", &self.airtable_base)
            .field("epics_table", &self.epics_table)
            .field("results_table", &self.results_table)
            .field("ig_url", &self.ig_url)
            .field("ig_user_len", &self.ig_user.len())
            .field("request_delay_ms", &self.request_delay_ms)
            .field("token_policy", &self.token_policy)
            .field("run_interval_sec", &self.run_interval_sec)
            .field("run_once", &self.run_once)
            .finish_non_exhaustive()
    }
}
