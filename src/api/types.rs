//! Typed views of the registry's paginated responses
//!
//! Only the fields the crawler navigates by are typed; everything an entity
//! document carries is kept as raw JSON so nothing the registry returns is
//! lost on the way to disk.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of a company search
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub items: Vec<CompanySummary>,

    #[serde(default)]
    pub total_results: u64,

    #[serde(default)]
    pub items_per_page: Option<u64>,
}

/// A search hit: enough to identify and order an entity
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanySummary {
    #[serde(default)]
    pub company_number: Option<String>,

    #[serde(default)]
    pub title: Option<String>,
}

impl CompanySummary {
    /// Display title, empty when the registry omitted it
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("")
    }

    /// Company number, ignoring blank values
    pub fn company_number(&self) -> Option<&str> {
        self.company_number
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}

/// One page of a company's officer list
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OfficerPage {
    #[serde(default)]
    pub items: Vec<Value>,

    #[serde(default)]
    pub total_results: u64,

    #[serde(default)]
    pub items_per_page: Option<u64>,
}

/// One page of a company's filing history
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilingPage {
    #[serde(default)]
    pub items: Vec<Value>,

    #[serde(default)]
    pub total_count: u64,
}

/// The full detail of one entity
///
/// Only ever built once the profile and every officer and filing page have
/// been retrieved, so holding one means the entity is complete.
#[derive(Debug, Clone, Serialize)]
pub struct EntityRecord {
    pub profile: Value,
    pub officers: Vec<Value>,
    pub filing_history: Vec<Value>,
}

impl EntityRecord {
    /// The identifier carried by the profile document, if any
    pub fn company_number(&self) -> Option<&str> {
        self.profile
            .get("company_number")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|n| !n.is_empty())
    }
}
