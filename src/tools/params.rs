use schemars::JsonSchema;
use serde::Deserialize;

use crate::providers::Freshness;

#[derive(Deserialize, JsonSchema)]
pub struct SearchParams {
    /// Search query
    pub query: String,
    /// Number of results to return (default: 10; hosted providers cap it at their own maximum)
    pub count: Option<u32>,
    /// Only return results from the past "day", "week", or "month" (ignored by providers without date filters)
    pub freshness: Option<Freshness>,
}
