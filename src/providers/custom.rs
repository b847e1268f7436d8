use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

use super::{ProviderError, SearchOptions, SearchPayload, SearchProvider, ensure_success};
use crate::credentials::Credential;

const FAMILY: &str = "custom";

/// Generic HTTP-JSON backend.
///
/// POSTs `{query, max_results, api_key, ...options}` to the configured
/// endpoint and returns the response body untouched, since the shape of an
/// arbitrary backend's response is unknown. Configured options are spread
/// last and may override the fixed keys.
#[derive(Debug, Clone)]
pub struct CustomAdapter {
    http: Client,
    endpoint: Option<String>,
    options: Map<String, Value>,
}

impl CustomAdapter {
    pub fn new(http: Client, endpoint: Option<String>, options: Map<String, Value>) -> Self {
        Self {
            http,
            endpoint,
            options,
        }
    }

    fn request_body(
        &self,
        credential: &Credential,
        query: &str,
        count: u32,
        options: &SearchOptions,
    ) -> Value {
        let mut body = Map::new();
        body.insert("query".into(), query.into());
        body.insert("max_results".into(), count.into());
        body.insert("api_key".into(), credential.expose().into());
        if let Some(freshness) = options.freshness {
            body.insert("freshness".into(), freshness.as_str().into());
        }
        body.extend(self.options.clone());
        Value::Object(body)
    }
}

impl SearchProvider for CustomAdapter {
    async fn search(
        &self,
        credential: &Credential,
        query: &str,
        count: u32,
        options: &SearchOptions,
    ) -> Result<SearchPayload, ProviderError> {
        let endpoint = self.endpoint.as_deref().ok_or(ProviderError::MissingEndpoint)?;

        let response = self
            .http
            .post(endpoint)
            .header("User-Agent", crate::USER_AGENT)
            .json(&self.request_body(credential, query, count, options))
            .send()
            .await?;
        let body: Value = ensure_success(FAMILY, response).await?.json().await?;

        debug!(endpoint, "custom search complete");
        Ok(SearchPayload::Raw(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::Freshness;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn key() -> Credential {
        Credential::new("custom-key").unwrap()
    }

    #[tokio::test]
    async fn posts_committed_body_shape_and_returns_raw_json() {
        let server = MockServer::start().await;
        let raw = serde_json::json!({"hits": [{"name": "a"}], "took": 3});
        Mock::given(method("POST"))
            .and(path("/api/search"))
            .and(body_json(serde_json::json!({
                "query": "vector db",
                "max_results": 4,
                "api_key": "custom-key",
                "index": "docs"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(raw.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let mut options = Map::new();
        options.insert("index".into(), "docs".into());
        let adapter = CustomAdapter::new(
            Client::new(),
            Some(format!("{}/api/search", server.uri())),
            options,
        );

        let payload = adapter
            .search(&key(), "vector db", 4, &SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(payload, SearchPayload::Raw(raw));
    }

    #[tokio::test]
    async fn missing_endpoint_fails_without_request() {
        let adapter = CustomAdapter::new(Client::new(), None, Map::new());
        let err = adapter
            .search(&key(), "q", 10, &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::MissingEndpoint));
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let adapter = CustomAdapter::new(Client::new(), Some(server.uri()), Map::new());
        let err = adapter
            .search(&key(), "q", 10, &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { provider: "custom", status: 500, .. }));
    }

    #[test]
    fn configured_options_override_fixed_keys() {
        let mut options = Map::new();
        options.insert("max_results".into(), 50.into());
        let adapter = CustomAdapter::new(Client::new(), None, options);

        let search_options = SearchOptions {
            freshness: Some(Freshness::Day),
        };
        let body = adapter.request_body(&key(), "q", 10, &search_options);
        assert_eq!(
            body,
            serde_json::json!({
                "query": "q",
                "max_results": 50,
                "api_key": "custom-key",
                "freshness": "day"
            })
        );
    }
}
