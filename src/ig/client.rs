use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::error::{AuthError, FetchError, RequestError, Resource};
use crate::http::send_json;
use crate::source::{Authenticator, MarketDataSource};
use crate::types::{AccessToken, Credentials, Epic, MarketSnapshot, PriceQuote, Sentiment};
use super::types::*;

const API_KEY_HEADER: &str = "X-IG-API-KEY";
const ACCOUNT_HEADER: &str = "IG-ACCOUNT-ID";
const VERSION_HEADER: &str = "VERSION";
// oauthToken is only returned by session v3
const SESSION_VERSION: &str = "3";

/// IG REST client: session, market details and client sentiment.
#[derive(Clone)]
pub struct IgClient {
    base_url: String,
    account_id: String,
    credentials: Credentials,
    http: reqwest::Client,
}

impl IgClient {
    pub fn new(
        base_url: String,
        account_id: String,
        credentials: Credentials,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        tracing::debug!(
            base_url = %base_url,
            api_key_len = credentials.api_key.len(),
            "IgClient initialized"
        );
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id,
            credentials,
            http,
        })
    }

    fn authed_get(&self, token: &AccessToken, url: String) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .header(AUTHORIZATION, token.bearer())
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .header(ACCOUNT_HEADER, &self.account_id)
    }

    async fn market_details(
        &self,
        token: &AccessToken,
        epic: &Epic,
        resource: Resource,
    ) -> Result<MarketDetailsResponse, FetchError> {
        let url = format!("{}/markets/{}", self.base_url, epic);
        tracing::debug!(epic = %epic, %resource, "GET /markets");
        send_json(self.authed_get(token, url))
            .await
            .map_err(|source| FetchError::Request {
                resource,
                id: epic.to_string(),
                source,
            })
    }
}

pub(crate) fn snapshot_from(resp: &MarketDetailsResponse) -> MarketSnapshot {
    MarketSnapshot {
        market_id: resp.instrument.market_id.clone(),
        status: resp.snapshot.market_status,
    }
}

pub(crate) fn quote_from(resp: &MarketDetailsResponse) -> PriceQuote {
    PriceQuote {
        bid: resp.snapshot.bid,
        offer: resp.snapshot.offer,
    }
}

/// Only the first entry is used; an empty list is an error rather than a guess.
pub(crate) fn sentiment_from(market_id: &str, resp: ClientSentimentsResponse) -> Result<Sentiment, FetchError> {
    let first = resp
        .client_sentiments
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::EmptySentiment {
            market_id: market_id.to_string(),
        })?;
    if first.market_id != market_id {
        tracing::debug!(requested = %market_id, returned = %first.market_id, "sentiment market id differs");
    }
    Ok(Sentiment {
        long_pct: first.long_position_percentage,
        short_pct: first.short_position_percentage,
    })
}

#[async_trait]
impl Authenticator for IgClient {
    async fn obtain_token(&self) -> Result<AccessToken, AuthError> {
        let url = format!("{}/session", self.base_url);
        let body = SessionRequest {
            identifier: &self.credentials.username,
            password: &self.credentials.password,
        };

        let req = self
            .http
            .post(url)
            .header(VERSION_HEADER, SESSION_VERSION)
            .header(API_KEY_HEADER, &self.credentials.api_key)
            .json(&body);

        let resp: SessionResponse = send_json(req).await.map_err(AuthError::from)?;
        let lifetime = resp.oauth_token.lifetime();
        tracing::debug!(lifetime = ?lifetime, "session token obtained");
        Ok(match lifetime {
            Some(l) => AccessToken::expiring_in(resp.oauth_token.access_token, l),
            None => AccessToken::new(resp.oauth_token.access_token),
        })
    }
}

#[async_trait]
impl MarketDataSource for IgClient {
    async fn fetch_market(&self, token: &AccessToken, epic: &Epic) -> Result<MarketSnapshot, FetchError> {
        let resp = self.market_details(token, epic, Resource::Market).await?;
        Ok(snapshot_from(&resp))
    }

    async fn fetch_price(&self, token: &AccessToken, epic: &Epic) -> Result<PriceQuote, FetchError> {
        let resp = self.market_details(token, epic, Resource::Price).await?;
        Ok(quote_from(&resp))
    }

    async fn fetch_sentiment(&self, token: &AccessToken, market_id: &str) -> Result<Sentiment, FetchError> {
        let url = format!("{}/clientsentiment", self.base_url);
        tracing::debug!(market_id = %market_id, "GET /clientsentiment");
        let req = self.authed_get(token, url).query(&[("marketIds", market_id)]);
        let resp: ClientSentimentsResponse = send_json(req).await.map_err(|source: RequestError| {
            FetchError::Request {
                resource: Resource::Sentiment,
                id: market_id.to_string(),
                source,
            }
        })?;
        sentiment_from(market_id, resp)
    }
}
