use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::MarketStatus;

/// POST /session body
#[derive(Debug, Serialize)]
pub struct SessionRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

/// POST /session (VERSION 3) response
#[derive(Debug, Deserialize)]
pub struct SessionResponse {
    #[serde(rename = "oauthToken")]
    pub oauth_token: OAuthToken,
}

#[derive(Debug, Deserialize)]
pub struct OAuthToken {
    pub access_token: String,
    // seconds; IG sends it as a string
    #[serde(default)]
    pub expires_in: Option<serde_json::Value>,
}

impl OAuthToken {
    pub fn lifetime(&self) -> Option<std::time::Duration> {
        let v = self.expires_in.as_ref()?;
        let secs = v.as_u64().or_else(|| v.as_str()?.trim().parse().ok())?;
        Some(std::time::Duration::from_secs(secs))
    }
}

/// GET /markets/{epic} response, trimmed to the fields we read
#[derive(Debug, Deserialize)]
pub struct MarketDetailsResponse {
    pub instrument: InstrumentDetails,
    pub snapshot: SnapshotDetails,
}

#[derive(Debug, Deserialize)]
pub struct InstrumentDetails {
    #[serde(rename = "marketId")]
    pub market_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SnapshotDetails {
    #[serde(rename = "marketStatus")]
    pub market_status: MarketStatus,
    // null while a market is closed
    #[serde(default)]
    pub bid: Option<Decimal>,
    #[serde(default)]
    pub offer: Option<Decimal>,
}

/// GET /clientsentiment?marketIds=... response
#[derive(Debug, Deserialize)]
pub struct ClientSentimentsResponse {
    #[serde(rename = "clientSentiments", default)]
    pub client_sentiments: Vec<ClientSentiment>,
}

#[derive(Debug, Deserialize)]
pub struct ClientSentiment {
    #[serde(rename = "marketId")]
    pub market_id: String,
    #[serde(rename = "longPositionPercentage")]
    pub long_position_percentage: Decimal,
    #[serde(rename = "shortPositionPercentage")]
    pub short_position_percentage: Decimal,
}
