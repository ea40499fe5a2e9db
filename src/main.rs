mod config;
mod error;
mod http;
mod types;
mod stats;

mod ig;
mod pipeline;
mod schedule;
mod source;
mod store;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::ig::IgClient;
use crate::pipeline::{Pipeline, Sources};
use crate::stats::Stats;
use crate::store::{AirtableStore, TableLayout};

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}

async fn maybe_write_jsonl(path: &Option<String>, line: &str) {
    if let Some(p) = path.as_ref().map(|x| x.trim().to_string()).filter(|x| !x.is_empty()) {
        match tokio::fs::OpenOptions::new().create(true).append(true).open(&p).await {
            Ok(mut f) => {
                use tokio::io::AsyncWriteExt;
                if let Err(e) = f.write_all(format!("{line}\n").as_bytes()).await {
                    tracing::warn!(path = %p, error = %e, "stats write failed");
                }
            }
            Err(e) => tracing::warn!(path = %p, error = %e, "stats file open failed"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let s = Settings::from_env()?;
    tracing::debug!(settings = ?s, "settings loaded");
    let timeout = Duration::from_secs(s.http_timeout_sec);

    let ig = Arc::new(IgClient::new(
        s.ig_url.clone(),
        s.ig_account_id.clone(),
        s.credentials(),
        timeout,
    )?);
    let store = Arc::new(AirtableStore::new(
        &s.airtable_url,
        &s.airtable_base,
        s.airtable_key.clone(),
        TableLayout {
            epics_table: s.epics_table.clone(),
            epic_field: s.epic_field.clone(),
            flag_field: s.flag_field.clone(),
            enabled_marker: s.enabled_marker.clone(),
            results_table: s.results_table.clone(),
        },
        timeout,
    )?);

    let stats = Stats::new(now_ms());
    let pipeline = Pipeline::new(
        Sources {
            auth: ig.clone(),
            markets: ig,
            instruments: store.clone(),
            sink: store,
        },
        Duration::from_millis(s.request_delay_ms),
        s.token_policy,
        stats.clone(),
    );

    let every = Duration::from_secs(s.run_interval_sec.max(1));

    loop {
        pipeline.run().await;

        let snap = stats.snapshot(now_ms());
        tracing::info!(
            up_sec = snap.up_sec,
            runs = snap.runs,
            runs_failed = snap.runs_failed,
            instruments_listed = snap.instruments_listed,
            published = snap.published,
            skipped = snap.skipped,
            failed = snap.failed,
            "stats"
        );
        match serde_json::to_string(&snap) {
            Ok(line) => maybe_write_jsonl(&s.stats_jsonl_path, &line).await,
            Err(e) => tracing::warn!(error = %e, "stats encode failed"),
        }

        if s.run_once {
            return Ok(());
        }

        let wait = schedule::until_next_run(chrono::Utc::now(), every);
        tracing::info!(wait_sec = wait.as_secs(), "next run scheduled");
        tokio::time::sleep(wait).await;
    }
}
