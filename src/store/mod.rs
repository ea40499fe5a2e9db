pub mod airtable;
pub mod types;

pub use airtable::{AirtableStore, TableLayout};
