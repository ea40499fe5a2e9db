use serde::de::DeserializeOwned;

use crate::error::RequestError;

const SNIPPET_CHARS: usize = 512;

/// Sends the request, rejects non-2xx responses and decodes the body as JSON.
/// Bodies are read as text first so failures can carry a snippet of what came back.
pub async fn send_json<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T, RequestError> {
    let resp = req.send().await?;
    let status = resp.status();
    let body = resp.text().await?;
    decode_body(status, &body)
}

pub fn decode_body<T: DeserializeOwned>(status: reqwest::StatusCode, body: &str) -> Result<T, RequestError> {
    if !status.is_success() {
        return Err(RequestError::Status {
            status,
            snippet: snippet(body),
        });
    }
    serde_json::from_str(body).map_err(|source| RequestError::Decode {
        source,
        snippet: snippet(body),
    })
}

fn snippet(body: &str) -> String {
    body.chars().take(SNIPPET_CHARS).collect()
}
