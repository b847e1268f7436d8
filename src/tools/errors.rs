use rmcp::ErrorData as McpError;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

use crate::search::SearchError;

/// Search failures are reported as a tool-level error carrying
/// `{error, lastError?}`; `lastError` is only present after exhaustion.
pub(super) fn search_error_result(e: &SearchError) -> Result<CallToolResult, McpError> {
    let last_error = match e {
        SearchError::EmptyQuery => None,
        SearchError::Exhausted { last_error } => last_error.as_deref(),
    };

    #[derive(Serialize)]
    #[serde(rename_all = "camelCase")]
    struct ErrorBody<'a> {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        last_error: Option<&'a str>,
    }

    let body = ErrorBody {
        error: e.to_string(),
        last_error,
    };
    Ok(CallToolResult::error(vec![Content::text(to_json(&body)?)]))
}

pub(super) fn to_json(value: &impl Serialize) -> Result<String, McpError> {
    serde_json::to_string_pretty(value).map_err(|e| McpError::internal_error(e.to_string(), None))
}
