use std::sync::Arc;
use std::time::Duration;

use crate::config::TokenPolicy;
use crate::error::{InstrumentError, JobError};
use crate::source::{Authenticator, InstrumentSource, MarketDataSource, ResultSink};
use crate::stats::Stats;
use crate::types::{AccessToken, Epic, MarketStatus, PublishAck, PublishedRecord};

/// A shared token is replaced once less than this much of its lifetime is left.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(10);

/// The I/O collaborators a pipeline runs against.
#[derive(Clone)]
pub struct Sources {
    pub auth: Arc<dyn Authenticator>,
    pub markets: Arc<dyn MarketDataSource>,
    pub instruments: Arc<dyn InstrumentSource>,
    pub sink: Arc<dyn ResultSink>,
}

/// What happened to one instrument that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Published(PublishedRecord, PublishAck),
    NotTradeable { market_id: String, status: MarketStatus },
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub listed: usize,
    pub published: usize,
    pub skipped: usize,
    pub failures: Vec<(Epic, InstrumentError)>,
}

/// Enriches each enabled instrument with price and sentiment and publishes it.
///
/// Instruments are processed one at a time in list order, each preceded by a
/// fixed delay. The delay is the only thing keeping us under the provider's
/// request-rate limit, so the loop must stay sequential.
pub struct Pipeline {
    sources: Sources,
    request_delay: Duration,
    token_policy: TokenPolicy,
    stats: Arc<Stats>,
}

impl Pipeline {
    pub fn new(sources: Sources, request_delay: Duration, token_policy: TokenPolicy, stats: Arc<Stats>) -> Self {
        Self {
            sources,
            request_delay,
            token_policy,
            stats,
        }
    }

    /// Entry point for the scheduler. Runs one job and logs how it ended.
    pub async fn run(&self) {
        self.stats.inc_run();
        match self.run_job().await {
            Ok(report) => tracing::info!(
                listed = report.listed,
                published = report.published,
                skipped = report.skipped,
                failed = report.failures.len(),
                "job finished"
            ),
            Err(e) => {
                self.stats.inc_run_failed();
                tracing::error!(error = %e, "job aborted");
            }
        }
    }

    pub async fn run_job(&self) -> Result<RunReport, JobError> {
        let epics = match self.sources.instruments.list_enabled_instruments().await {
            Ok(epics) => epics,
            Err(e) => {
                // nothing to work on; the next scheduled run tries again
                tracing::warn!(error = %e, "instrument list unavailable, running with no instruments");
                Vec::new()
            }
        };

        let mut report = RunReport {
            listed: epics.len(),
            ..RunReport::default()
        };
        self.stats.add_listed(epics.len() as u64);
        tracing::info!(instruments = epics.len(), "job started");

        let mut run_token: Option<AccessToken> = None;

        for (i, epic) in epics.iter().enumerate() {
            tokio::time::sleep(self.request_delay).await;

            let token = match (self.token_policy, &run_token) {
                (TokenPolicy::PerRun, Some(t)) if t.is_fresh(TOKEN_REFRESH_MARGIN) => t.clone(),
                _ => {
                    let t = self
                        .sources
                        .auth
                        .obtain_token()
                        .await
                        .map_err(|source| JobError::Auth { processed: i, source })?;
                    if self.token_policy == TokenPolicy::PerRun {
                        run_token = Some(t.clone());
                    }
                    t
                }
            };

            match self.process_instrument(&token, epic).await {
                Ok(Outcome::Published(record, ack)) => {
                    self.stats.inc_published();
                    report.published += 1;
                    tracing::info!(
                        epic = %epic,
                        market_id = %record.instrument,
                        record_id = %ack.record_id,
                        bid = %record.bid,
                        offer = %record.offer,
                        long = %record.long,
                        short = %record.short,
                        pushed_at = %chrono::Utc::now(),
                        "TRADEABLE, published"
                    );
                }
                Ok(Outcome::NotTradeable { market_id, status }) => {
                    self.stats.inc_skipped();
                    report.skipped += 1;
                    tracing::info!(epic = %epic, market_id = %market_id, %status, "not tradeable, no push");
                }
                Err(e) => {
                    self.stats.inc_failed();
                    tracing::warn!(epic = %epic, stage = e.stage(), error = %e, "instrument failed, continuing");
                    report.failures.push((epic.clone(), e));
                }
            }
        }

        Ok(report)
    }

    /// Market, price and sentiment for one epic; publishes only when tradeable.
    pub async fn process_instrument(&self, token: &AccessToken, epic: &Epic) -> Result<Outcome, InstrumentError> {
        let market = self.sources.markets.fetch_market(token, epic).await?;
        let price = self.sources.markets.fetch_price(token, epic).await?;
        let sentiment = self.sources.markets.fetch_sentiment(token, &market.market_id).await?;

        if !market.status.is_tradeable() {
            return Ok(Outcome::NotTradeable {
                market_id: market.market_id,
                status: market.status,
            });
        }

        let record = PublishedRecord::compose(epic, &market, price, sentiment)?;
        let ack = self.sources.sink.publish(&record).await?;
        Ok(Outcome::Published(record, ack))
    }
}
