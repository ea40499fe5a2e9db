use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// GET /{base}/{table} page
#[derive(Debug, Deserialize)]
pub struct ListRecordsResponse {
    #[serde(default)]
    pub records: Vec<Record>,
    // cursor for the next page; absent on the last one
    #[serde(default)]
    pub offset: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub fields: HashMap<String, serde_json::Value>,
}

/// POST /{base}/{table} body
#[derive(Debug, Serialize)]
pub struct CreateRecordRequest<'a, T: Serialize> {
    pub fields: &'a T,
}

#[derive(Debug, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
}
