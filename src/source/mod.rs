use async_trait::async_trait;

use crate::error::{AuthError, FetchError, ListError, PublishError};
use crate::types::{AccessToken, Epic, MarketSnapshot, PriceQuote, PublishAck, PublishedRecord, Sentiment};

/// Exchanges stored credentials for a session token.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn obtain_token(&self) -> Result<AccessToken, AuthError>;
}

/// Per-instrument market data from the trading-data provider.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Market id and trading status for an epic.
    async fn fetch_market(&self, token: &AccessToken, epic: &Epic) -> Result<MarketSnapshot, FetchError>;

    /// Current bid/offer for an epic.
    async fn fetch_price(&self, token: &AccessToken, epic: &Epic) -> Result<PriceQuote, FetchError>;

    /// Client sentiment, keyed by market id rather than epic.
    async fn fetch_sentiment(&self, token: &AccessToken, market_id: &str) -> Result<Sentiment, FetchError>;
}

/// User-curated list of instruments to process.
#[async_trait]
pub trait InstrumentSource: Send + Sync {
    async fn list_enabled_instruments(&self) -> Result<Vec<Epic>, ListError>;
}

/// Destination for composed records. Each call appends a new row.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn publish(&self, record: &PublishedRecord) -> Result<PublishAck, PublishError>;
}
