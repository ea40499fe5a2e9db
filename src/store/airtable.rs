use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};

use crate::error::{ListError, PublishError};
use crate::http::send_json;
use crate::source::{InstrumentSource, ResultSink};
use crate::types::{Epic, PublishAck, PublishedRecord};
use super::types::*;

/// Table and column names the store is read and written through.
#[derive(Debug, Clone)]
pub struct TableLayout {
    pub epics_table: String,
    pub epic_field: String,
    pub flag_field: String,
    pub enabled_marker: String,
    pub results_table: String,
}

/// Airtable REST client. Reads the instrument table, appends result rows.
#[derive(Clone)]
pub struct AirtableStore {
    base_url: String,
    api_key: String,
    layout: TableLayout,
    http: reqwest::Client,
}

impl AirtableStore {
    pub fn new(
        api_url: &str,
        base_id: &str,
        api_key: String,
        layout: TableLayout,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            base_url: format!("{}/{}", api_url.trim_end_matches('/'), base_id),
            api_key,
            layout,
            http,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    async fn fetch_page(&self, offset: Option<&str>) -> Result<ListRecordsResponse, ListError> {
        let mut req = self
            .http
            .get(self.table_url(&self.layout.epics_table))
            .bearer_auth(&self.api_key);
        if let Some(o) = offset {
            req = req.query(&[("offset", o)]);
        }
        send_json(req).await.map_err(|source| ListError {
            table: self.layout.epics_table.clone(),
            source,
        })
    }
}

/// Epics from rows whose flag equals the enabled marker, in row order.
pub(crate) fn enabled_epics(layout: &TableLayout, records: &[Record]) -> Vec<Epic> {
    let mut out = Vec::new();
    for r in records {
        let epic = match r.fields.get(&layout.epic_field).and_then(|v| v.as_str()) {
            Some(e) if !e.is_empty() => e,
            _ => {
                tracing::debug!(record_id = %r.id, "skipping row without epic");
                continue;
            }
        };
        let flag = r.fields.get(&layout.flag_field).and_then(|v| v.as_str());
        if flag == Some(layout.enabled_marker.as_str()) {
            out.push(Epic::new(epic));
        } else {
            tracing::debug!(epic = %epic, flag = ?flag, "skipping epic, not enabled");
        }
    }
    out
}

#[async_trait]
impl InstrumentSource for AirtableStore {
    async fn list_enabled_instruments(&self) -> Result<Vec<Epic>, ListError> {
        let mut out: Vec<Epic> = vec![];
        let mut next: Option<String> = None;
        let mut rows = 0usize;

        loop {
            let page = self.fetch_page(next.as_deref()).await?;
            rows += page.records.len();
            out.extend(enabled_epics(&self.layout, &page.records));

            next = page.offset;
            if next.is_none() { break; }
        }

        tracing::debug!(table = %self.layout.epics_table, rows, enabled = out.len(), "instrument table read");
        Ok(out)
    }
}

#[async_trait]
impl ResultSink for AirtableStore {
    async fn publish(&self, record: &PublishedRecord) -> Result<PublishAck, PublishError> {
        let req = self
            .http
            .post(self.table_url(&self.layout.results_table))
            .bearer_auth(&self.api_key)
            .json(&CreateRecordRequest { fields: record });

        let created: CreatedRecord = send_json(req).await.map_err(|source| PublishError {
            instrument: record.instrument.clone(),
            source,
        })?;
        Ok(PublishAck { record_id: created.id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::serve;
    use crate::types::{MarketSnapshot, MarketStatus, PriceQuote, Sentiment};
    use rust_decimal_macros::dec;

    fn spx_record() -> PublishedRecord {
        PublishedRecord::compose(
            &Epic::new("US500"),
            &MarketSnapshot { market_id: "IX.D.SPTRD".into(), status: MarketStatus::Tradeable },
            PriceQuote { bid: Some(dec!(4500.0)), offer: Some(dec!(4500.5)) },
            Sentiment { long_pct: dec!(60), short_pct: dec!(40) },
        )
        .unwrap()
    }

    fn store(api_url: &str) -> AirtableStore {
        AirtableStore::new(api_url, "appXYZ", "keyABC".into(), layout(), Duration::from_secs(5)).unwrap()
    }

    fn layout() -> TableLayout {
        TableLayout {
            epics_table: "EPICS".into(),
            epic_field: "EPIC".into(),
            flag_field: "Pull_Data".into(),
            enabled_marker: "TRUE".into(),
            results_table: "Indizes".into(),
        }
    }

    fn records(body: &str) -> ListRecordsResponse {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn only_enabled_rows_are_listed() {
        let page = records(
            r#"{"records":[
                {"id":"rec1","createdTime":"2021-01-01T00:00:00.000Z","fields":{"EPIC":"A","Pull_Data":"TRUE"}},
                {"id":"rec2","createdTime":"2021-01-01T00:00:00.000Z","fields":{"EPIC":"B","Pull_Data":"FALSE"}}
            ]}"#,
        );
        assert_eq!(enabled_epics(&layout(), &page.records), vec![Epic::new("A")]);
        assert!(page.offset.is_none());
    }

    #[test]
    fn marker_must_match_exactly() {
        let page = records(
            r#"{"records":[
                {"id":"r1","fields":{"EPIC":"A","Pull_Data":"true"}},
                {"id":"r2","fields":{"EPIC":"B","Pull_Data":true}},
                {"id":"r3","fields":{"EPIC":"C"}},
                {"id":"r4","fields":{"Pull_Data":"TRUE"}},
                {"id":"r5","fields":{"EPIC":"D","Pull_Data":"TRUE"}}
            ],"offset":"itrNEXT/rec5"}"#,
        );
        assert_eq!(enabled_epics(&layout(), &page.records), vec![Epic::new("D")]);
        assert_eq!(page.offset.as_deref(), Some("itrNEXT/rec5"));
    }

    #[test]
    fn publish_body_wraps_fields() {
        let rec = spx_record();
        let v = serde_json::to_value(CreateRecordRequest { fields: &rec }).unwrap();
        assert_eq!(v["fields"]["Instrument"], "IX.D.SPTRD");
        assert_eq!(v["fields"]["Offer"], 4500.5);
    }

    #[test]
    fn table_urls_are_joined_under_base() {
        let s = AirtableStore::new(
            "https://api.airtable.com/v0/",
            "appXYZ",
            "key".into(),
            layout(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(s.table_url("EPICS"), "https://api.airtable.com/v0/appXYZ/EPICS");
    }

    #[test]
    fn epics_are_passed_through_unchanged() {
        let page = records(r#"{"records":[{"id":"r1","fields":{"EPIC":" IX.D.DAX.DAILY.IP ","Pull_Data":"TRUE"}}]}"#);
        assert_eq!(enabled_epics(&layout(), &page.records), vec![Epic::new(" IX.D.DAX.DAILY.IP ")]);
    }

    #[tokio::test]
    async fn listing_follows_offset_across_pages() {
        let (base, server) = serve(vec![
            (
                200,
                r#"{"records":[
                    {"id":"r1","fields":{"EPIC":"A","Pull_Data":"TRUE"}},
                    {"id":"r2","fields":{"EPIC":"B","Pull_Data":"FALSE"}}
                ],"offset":"itr1/r2"}"#.into(),
            ),
            (200, r#"{"records":[{"id":"r3","fields":{"EPIC":"C","Pull_Data":"TRUE"}}]}"#.into()),
        ])
        .await;

        let epics = store(&format!("{base}/v0")).list_enabled_instruments().await.unwrap();
        assert_eq!(epics, vec![Epic::new("A"), Epic::new("C")]);

        let reqs = server.await.unwrap();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].target, "/v0/appXYZ/EPICS");
        assert_eq!(reqs[1].target, "/v0/appXYZ/EPICS?offset=itr1%2Fr2");
        for r in &reqs {
            assert_eq!(r.method, "GET");
            assert_eq!(r.header("Authorization"), Some("Bearer keyABC"));
        }
    }

    #[tokio::test]
    async fn unreachable_table_is_a_list_error() {
        let (base, server) = serve(vec![(503, "{}".into())]).await;
        let err = store(&format!("{base}/v0")).list_enabled_instruments().await.unwrap_err();
        assert_eq!(err.table, "EPICS");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn publish_posts_fields_and_returns_record_id() {
        let (base, server) = serve(vec![(
            200,
            r#"{"id":"recNEW","createdTime":"2024-03-01T10:00:00.000Z","fields":{}}"#.into(),
        )])
        .await;

        let ack = store(&format!("{base}/v0")).publish(&spx_record()).await.unwrap();
        assert_eq!(ack.record_id, "recNEW");

        let reqs = server.await.unwrap();
        let r = &reqs[0];
        assert_eq!(r.method, "POST");
        assert_eq!(r.target, "/v0/appXYZ/Indizes");
        assert_eq!(r.header("Authorization"), Some("Bearer keyABC"));
        assert_eq!(
            r.json(),
            serde_json::json!({"fields": {
                "Instrument": "IX.D.SPTRD",
                "Bid": 4500.0,
                "Offer": 4500.5,
                "Long": 60.0,
                "Short": 40.0
            }})
        );
    }
}
