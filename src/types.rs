use std::fmt;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::FetchError;

/// Provider identifier for a tradable instrument (an IG "epic").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Epic(pub String);

impl Epic {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Epic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Short-lived bearer token, with the instant it stops being accepted when the
/// provider told us its lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    value: String,
    expires_at: Option<Instant>,
}

impl AccessToken {
    pub fn new(s: impl Into<String>) -> Self {
        Self {
            value: s.into(),
            expires_at: None,
        }
    }

    pub fn expiring_in(s: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            value: s.into(),
            expires_at: Some(Instant::now() + lifetime),
        }
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// True while more than `margin` of the lifetime is left. Tokens issued
    /// without a lifetime never go stale.
    pub fn is_fresh(&self, margin: Duration) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() + margin < at,
            None => true,
        }
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("len", &self.value.len())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub api_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username_len", &self.username.len())
            .field("password", &"<redacted>")
            .field("api_key_len", &self.api_key.len())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketStatus {
    Tradeable,
    Closed,
    EditsOnly,
    Offline,
    OnAuction,
    OnAuctionNoEdits,
    Suspended,
    #[serde(other)]
    Other,
}

impl MarketStatus {
    pub fn is_tradeable(self) -> bool {
        self == MarketStatus::Tradeable
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MarketStatus::Tradeable => "TRADEABLE",
            MarketStatus::Closed => "CLOSED",
            MarketStatus::EditsOnly => "EDITS_ONLY",
            MarketStatus::Offline => "OFFLINE",
            MarketStatus::OnAuction => "ON_AUCTION",
            MarketStatus::OnAuctionNoEdits => "ON_AUCTION_NO_EDITS",
            MarketStatus::Suspended => "SUSPENDED",
            MarketStatus::Other => "OTHER",
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    pub market_id: String,
    pub status: MarketStatus,
}

/// Current bid/offer. Either side is absent while a market is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub bid: Option<Decimal>,
    pub offer: Option<Decimal>,
}

/// Percentage of client positions that are long vs short, keyed by market id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sentiment {
    pub long_pct: Decimal,
    pub short_pct: Decimal,
}

/// Row appended to the results table. Field names are the table's column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedRecord {
    #[serde(rename = "Instrument")]
    pub instrument: String,
    #[serde(rename = "Bid")]
    pub bid: Decimal,
    #[serde(rename = "Offer")]
    pub offer: Decimal,
    #[serde(rename = "Long")]
    pub long: Decimal,
    #[serde(rename = "Short")]
    pub short: Decimal,
}

impl PublishedRecord {
    /// Fails when the quote is missing a side; a row is never written with a gap.
    pub fn compose(
        epic: &Epic,
        market: &MarketSnapshot,
        price: PriceQuote,
        sentiment: Sentiment,
    ) -> Result<Self, FetchError> {
        let bid = price.bid.ok_or_else(|| FetchError::MissingPrice {
            epic: epic.clone(),
            side: "bid",
        })?;
        let offer = price.offer.ok_or_else(|| FetchError::MissingPrice {
            epic: epic.clone(),
            side: "offer",
        })?;
        Ok(Self {
            instrument: market.market_id.clone(),
            bid,
            offer,
            long: sentiment.long_pct,
            short: sentiment.short_pct,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishAck {
    pub record_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn market_status_parses_known_and_unknown_values() {
        let s: MarketStatus = serde_json::from_str("\"TRADEABLE\"").unwrap();
        assert!(s.is_tradeable());
        let s: MarketStatus = serde_json::from_str("\"ON_AUCTION_NO_EDITS\"").unwrap();
        assert_eq!(s, MarketStatus::OnAuctionNoEdits);
        let s: MarketStatus = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(s, MarketStatus::Other);
        assert!(!s.is_tradeable());
    }

    #[test]
    fn published_record_uses_column_names() {
        let rec = PublishedRecord::compose(
            &Epic::new("US500"),
            &MarketSnapshot { market_id: "IX.D.SPTRD".into(), status: MarketStatus::Tradeable },
            PriceQuote { bid: Some(dec!(4500.0)), offer: Some(dec!(4500.5)) },
            Sentiment { long_pct: dec!(60), short_pct: dec!(40) },
        )
        .unwrap();
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "Instrument": "IX.D.SPTRD",
                "Bid": 4500.0,
                "Offer": 4500.5,
                "Long": 60.0,
                "Short": 40.0
            })
        );
    }

    #[test]
    fn compose_rejects_a_missing_side() {
        let err = PublishedRecord::compose(
            &Epic::new("US500"),
            &MarketSnapshot { market_id: "IX.D.SPTRD".into(), status: MarketStatus::Tradeable },
            PriceQuote { bid: Some(dec!(4500.0)), offer: None },
            Sentiment { long_pct: dec!(60), short_pct: dec!(40) },
        )
        .unwrap_err();
        assert!(matches!(err, FetchError::MissingPrice { side: "offer", .. }));
    }

    #[test]
    fn secrets_are_not_printed() {
        let c = Credentials { username: "jdoe".into(), password: "hunter2".into(), api_key: "k".into() };
        let dbg = format!("{:?}", c);
        assert!(!dbg.contains("hunter2"));
        assert!(!dbg.contains("jdoe"));
        assert!(dbg.contains("username_len: 4"));
        assert!(!format!("{:?}", AccessToken::new("abc")).contains("abc"));
    }

    #[tokio::test(start_paused = true)]
    async fn token_goes_stale_inside_the_margin() {
        let t = AccessToken::expiring_in("abc", Duration::from_secs(60));
        assert!(t.is_fresh(Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(49)).await;
        assert!(t.is_fresh(Duration::from_secs(10)));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!t.is_fresh(Duration::from_secs(10)));
        assert!(AccessToken::new("abc").is_fresh(Duration::from_secs(10)));
    }
}
