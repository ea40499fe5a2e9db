//! Error types for the sync job.
//!
//! Every remote call returns one of these instead of logging and carrying on,
//! so the orchestrator decides what is fatal to a run and what only costs one
//! instrument.

use std::fmt;

use thiserror::Error;

use crate::types::Epic;

/// Failure of a single HTTP exchange.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("status={status} body_snippet={snippet}")]
    Status {
        status: reqwest::StatusCode,
        snippet: String,
    },

    #[error("decode json failed: {source} body_snippet={snippet}")]
    Decode {
        #[source]
        source: serde_json::Error,
        snippet: String,
    },
}

/// Credentials rejected or provider unreachable. Fatal to a run.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("session request failed: {0}")]
    Request(#[from] RequestError),
}

/// Instrument table could not be read. The run degrades to zero work.
#[derive(Error, Debug)]
#[error("listing table {table} failed: {source}")]
pub struct ListError {
    pub table: String,
    #[source]
    pub source: RequestError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Market,
    Price,
    Sentiment,
}

impl Resource {
    pub fn as_str(self) -> &'static str {
        match self {
            Resource::Market => "market",
            Resource::Price => "price",
            Resource::Sentiment => "sentiment",
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-identifier fetch failure. Always carries the identifier it was for.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("{resource} request for {id} failed: {source}")]
    Request {
        resource: Resource,
        id: String,
        #[source]
        source: RequestError,
    },

    #[error("no {side} price in snapshot for {epic}")]
    MissingPrice { epic: Epic, side: &'static str },

    #[error("no client sentiment returned for {market_id}")]
    EmptySentiment { market_id: String },
}

impl FetchError {
    pub fn resource(&self) -> Resource {
        match self {
            FetchError::Request { resource, .. } => *resource,
            FetchError::MissingPrice { .. } => Resource::Price,
            FetchError::EmptySentiment { .. } => Resource::Sentiment,
        }
    }
}

/// Row could not be appended. Not retried: the store has no natural key, so a
/// retry may duplicate the row.
#[derive(Error, Debug)]
#[error("publishing {instrument} failed: {source}")]
pub struct PublishError {
    pub instrument: String,
    #[source]
    pub source: RequestError,
}

/// Everything that can go wrong for one identifier without stopping the run.
#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl InstrumentError {
    /// Which step of the per-instrument procedure failed.
    pub fn stage(&self) -> &'static str {
        match self {
            InstrumentError::Fetch(e) => e.resource().as_str(),
            InstrumentError::Publish(_) => "publish",
        }
    }
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("authentication failed after {processed} instrument(s): {source}")]
    Auth {
        processed: usize,
        #[source]
        source: AuthError,
    },
}
